//! End-to-end runs of the analyser over generated WAV files

use media_analyser::{parse_stream_list, run, AnalyserError, AnalyserSettings, AnalysisOptions};
use ploud_loudness::{analyse, Compliance, FragmentSink, LoudnessProcess, PlanarBuffer, SampleFormat};
use ploud_media::{SymphoniaSource, WavSink};
use std::f32::consts::PI;
use std::path::Path;

// ============================================================================
// Helpers
// ============================================================================

fn write_tone(path: &Path, sample_rate: u32, channels: usize, amplitude: f32, seconds: u32) {
    let frames = (sample_rate * seconds) as usize;
    let plane: Vec<f32> = (0..frames)
        .map(|i| amplitude * (2.0 * PI * 997.0 * i as f32 / sample_rate as f32).sin())
        .collect();
    let mut sink = WavSink::create(path, channels, sample_rate, SampleFormat::S16).unwrap();
    sink.write(&PlanarBuffer::from_planes(vec![plane; channels]).unwrap()).unwrap();
    sink.finish().unwrap();
}

fn stream_list(entries: &[(&Path, &str)]) -> String {
    entries
        .iter()
        .map(|(path, selector)| format!("{}={}\n", path.display(), selector))
        .collect()
}

// ============================================================================
// Analysis
// ============================================================================

#[test]
fn test_two_mono_files_measured_as_stereo() {
    let dir = tempfile::tempdir().unwrap();
    let left = dir.path().join("left.wav");
    let right = dir.path().join("right.wav");
    write_tone(&left, 48_000, 1, 0.1, 6);
    write_tone(&right, 48_000, 1, 0.1, 6);

    let streams = parse_stream_list(&stream_list(&[(&left, "0"), (&right, "0")])).unwrap();
    let report = run(&streams, &AnalyserSettings::default(), &AnalysisOptions::default()).unwrap();

    assert_eq!(report.channels, "2 channels");
    assert_eq!(report.measurement.channels, 2);
    let integrated = report.measurement.integrated_loudness.unwrap();
    assert!((integrated + 20.0).abs() < 0.1, "integrated {}", integrated);
    assert_eq!(report.compliance, Compliance::Correctable);
    assert_eq!(report.applied_gain, 1.0);
    assert!(report.correction.is_none());
}

#[test]
fn test_channel_entries_of_one_file_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    write_tone(&path, 44_100, 2, 0.1, 4);

    let streams = parse_stream_list(&stream_list(&[(&path, "0.1"), (&path, "0.0")])).unwrap();
    assert_eq!(streams.len(), 1);
    let report = run(&streams, &AnalyserSettings::default(), &AnalysisOptions::default()).unwrap();
    assert_eq!(report.measurement.channels, 2);
    assert_eq!(report.measurement.sample_rate, 44_100);
}

#[test]
fn test_forced_duration_limits_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.wav");
    write_tone(&path, 48_000, 1, 0.1, 6);

    let streams = parse_stream_list(&stream_list(&[(&path, "0")])).unwrap();
    let options = AnalysisOptions {
        force_duration: Some(2.5),
        ..AnalysisOptions::default()
    };
    let report = run(&streams, &AnalyserSettings::default(), &options).unwrap();
    assert!((report.measurement.duration_seconds - 2.5).abs() < 1e-9);
}

#[test]
fn test_progress_file_reaches_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let progress = dir.path().join("progress.txt");
    write_tone(&path, 48_000, 1, 0.1, 2);

    let streams = parse_stream_list(&stream_list(&[(&path, "0")])).unwrap();
    let options = AnalysisOptions {
        progress_file: Some(progress.clone()),
        ..AnalysisOptions::default()
    };
    run(&streams, &AnalyserSettings::default(), &options).unwrap();
    assert_eq!(std::fs::read_to_string(&progress).unwrap(), "100");
}

// ============================================================================
// Correction
// ============================================================================

#[test]
fn test_correction_writes_program_at_target() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("quiet.wav");
    let output = dir.path().join("corrected.wav");
    write_tone(&input, 48_000, 2, 0.05, 8);

    let streams = parse_stream_list(&stream_list(&[(&input, "0")])).unwrap();
    let options = AnalysisOptions {
        correction_output: Some(output.clone()),
        ..AnalysisOptions::default()
    };
    let report = run(&streams, &AnalyserSettings::default(), &options).unwrap();

    let correction = report.correction.as_ref().unwrap();
    assert!(report.applied_gain > 1.0);
    assert_eq!(correction.outcome.compliance, Compliance::Valid);

    let mut source = SymphoniaSource::open(&output, 0, None).unwrap();
    let mut process = LoudnessProcess::new(2, 48_000).unwrap();
    analyse(&mut source, &mut process, None).unwrap();
    assert!((process.integrated_loudness().unwrap() + 23.0).abs() < 0.1);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert!(json["correction"]["outcome"]["result"]["integrated_loudness"].is_number());
}

#[test]
fn test_silent_program_is_not_corrected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("silence.wav");
    let output = dir.path().join("never.wav");
    write_tone(&input, 48_000, 1, 0.0, 3);

    let streams = parse_stream_list(&stream_list(&[(&input, "0")])).unwrap();
    let options = AnalysisOptions {
        correction_output: Some(output.clone()),
        ..AnalysisOptions::default()
    };
    let report = run(&streams, &AnalyserSettings::default(), &options).unwrap();

    assert!(report.measurement.integrated_loudness.is_none());
    assert!(report.measurement.momentary_max.is_none());
    assert!(report.measurement.short_term_max.is_none());
    assert_eq!(report.compliance, Compliance::Undetermined);
    assert!(report.correction.is_none());
    assert!(!output.exists());
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_mismatched_sample_rates_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.wav");
    let b = dir.path().join("b.wav");
    write_tone(&a, 48_000, 1, 0.1, 1);
    write_tone(&b, 44_100, 1, 0.1, 1);

    let streams = parse_stream_list(&stream_list(&[(&a, "0"), (&b, "0")])).unwrap();
    let err = run(&streams, &AnalyserSettings::default(), &AnalysisOptions::default()).unwrap_err();
    assert!(matches!(err, AnalyserError::Loudness(ref e) if e.is_configuration()));
}

#[test]
fn test_too_many_channels_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.wav");
    let b = dir.path().join("b.wav");
    write_tone(&a, 48_000, 3, 0.1, 1);
    write_tone(&b, 48_000, 3, 0.1, 1);

    let streams = parse_stream_list(&stream_list(&[(&a, "0"), (&b, "0")])).unwrap();
    let err = run(&streams, &AnalyserSettings::default(), &AnalysisOptions::default()).unwrap_err();
    assert!(matches!(err, AnalyserError::Loudness(ref e) if e.is_configuration()));
}
