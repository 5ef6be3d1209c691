//! Analysis and correction of a stream list

use crate::error::Result;
use crate::progress::ProgressSource;
use crate::report::{describe_channels, AnalysisReport, CorrectionReport};
use crate::settings::AnalyserSettings;
use crate::streams::StreamDesc;
use ploud_loudness::{analyse, Corrector, FragmentSource, LoudnessProcess, MultiStreamSource};
use ploud_media::{SymphoniaSource, WavSink};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Analyse only this many seconds; ignored unless positive
    pub force_duration: Option<f64>,
    /// Write the corrected program here when it needs correcting
    pub correction_output: Option<PathBuf>,
    /// Keep the latest progress percentage in this file
    pub progress_file: Option<PathBuf>,
}

/// Open every listed stream as one multichannel source
///
/// Also returns the number of frames the source will deliver, when every
/// container declares its length.
pub fn open_streams(streams: &[StreamDesc]) -> Result<(MultiStreamSource, Option<u64>)> {
    let mut sources: Vec<Box<dyn FragmentSource>> = Vec::with_capacity(streams.len());
    let mut total: Option<u64> = None;
    let mut known = true;

    for desc in streams {
        let source = SymphoniaSource::open(&desc.path, desc.stream_index, desc.channels.clone())?;
        match source.total_frames() {
            Some(frames) => total = Some(total.map_or(frames, |t| t.min(frames))),
            None => known = false,
        }
        info!(
            input = %desc,
            channels = source.channels(),
            sample_rate = source.sample_rate(),
            "Input stream"
        );
        sources.push(Box::new(source));
    }

    let source = MultiStreamSource::new(sources)?;
    Ok((source, total.filter(|_| known)))
}

/// Measure the streams and, if asked and needed, write a corrected copy
pub fn run(
    streams: &[StreamDesc],
    settings: &AnalyserSettings,
    options: &AnalysisOptions,
) -> Result<AnalysisReport> {
    let levels = settings.loudness_levels()?;
    let (source, total) = open_streams(streams)?;
    let channels = source.channels();
    let sample_rate = source.sample_rate();

    let max_frames = options
        .force_duration
        .filter(|seconds| *seconds > 0.0)
        .map(|seconds| (seconds * f64::from(sample_rate)).round() as u64);
    let expected = match (total, max_frames) {
        (Some(total), Some(limit)) => Some(total.min(limit)),
        (total, limit) => total.or(limit),
    };

    let mut source = ProgressSource::new(source, expected, options.progress_file.clone());
    let mut process = LoudnessProcess::new(channels, sample_rate)?;
    process.set_upsampling_frequency_for_true_peak(settings.upsampling_frequency);
    analyse(&mut source, &mut process, max_frames)?;

    let corrector = Corrector::new(levels.clone())
        .with_true_peak_limit(settings.limit_to_true_peak)
        .with_max_frames(max_frames);
    let measurement = corrector.measure(&process);
    let compliance = levels.assess(&measurement);
    let gain = corrector.gain_for(&process);
    info!(?compliance, gain, gain_db = measurement.correction_gain_db(), "Assessment");

    let correction = match &options.correction_output {
        Some(output) if corrector.needs_correction(gain) => {
            let mut sink = WavSink::create(output, channels, sample_rate, settings.output_format)?;
            corrector
                .correct(&mut source, &mut sink, &mut process, gain)?
                .map(|outcome| CorrectionReport {
                    output: output.clone(),
                    outcome,
                })
        }
        Some(output) => {
            info!(path = %output.display(), gain, "Already at target, no corrected output written");
            None
        }
        None => None,
    };

    Ok(AnalysisReport {
        inputs: streams.to_vec(),
        channels: describe_channels(channels),
        applied_gain: correction.as_ref().map_or(1.0, |c| c.outcome.gain),
        levels,
        measurement,
        compliance,
        correction,
    })
}
