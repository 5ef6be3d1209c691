//! Property-based tests for the loudness engine
//!
//! These tests use proptest to verify invariants across many random inputs.

use ploud_loudness::{
    db_to_linear, LoudnessHistogram, LoudnessLevels, LoudnessProcess, SampleFormat, Scan,
};
use proptest::prelude::*;

/// Deterministic noise (LCG) scaled per 100 ms segment by `levels_db`
fn segmented_noise(seed: u64, levels_db: &[f32], sample_rate: u32) -> Vec<f32> {
    let segment = (sample_rate / 10) as usize;
    let mut state = seed;
    let mut samples = Vec::with_capacity(segment * levels_db.len());
    for &level in levels_db {
        let amplitude = db_to_linear(level);
        for _ in 0..segment {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let white = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            samples.push(white * amplitude);
        }
    }
    samples
}

fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: loudness range is non-negative and bounded by the short-term spread
    #[test]
    fn loudness_range_is_bounded(
        seed in any::<u64>(),
        levels in prop::collection::vec(-60.0f32..12.0, 40..120)
    ) {
        let samples = segmented_noise(seed, &levels, 16_000);
        let mut process = LoudnessProcess::new(1, 16_000).unwrap();
        process.process(&[samples]).unwrap();

        if let Ok(lra) = process.loudness_range() {
            let spread = process.short_term_max().unwrap() - process.short_term_min().unwrap();
            prop_assert!(lra >= 0.0, "negative LRA {}", lra);
            prop_assert!(lra <= spread + 0.11, "LRA {} above spread {}", lra, spread);
        }
    }

    /// Property: true peak never reads below the largest raw sample
    #[test]
    fn true_peak_never_below_sample_peak(
        samples in prop::collection::vec(-1.0f32..1.0, 100..4000),
        rate in prop::sample::select(vec![22_050u32, 44_100, 48_000, 96_000])
    ) {
        let mut process = LoudnessProcess::new(1, rate).unwrap();
        process.process(&[&samples[..]]).unwrap();
        prop_assert!(process.true_peak() >= process.sample_peak());
        prop_assert_eq!(process.sample_peak(), peak(&samples));
    }

    /// Property: a uniform gain shifts integrated loudness by the same amount
    #[test]
    fn gain_shifts_integrated_loudness(
        seed in any::<u64>(),
        gain_db in -6.0f32..6.0
    ) {
        let samples = segmented_noise(seed, &[-20.0; 20], 8_000);
        let scaled: Vec<f32> = samples.iter().map(|s| s * db_to_linear(gain_db)).collect();

        let mut original = LoudnessProcess::new(1, 8_000).unwrap();
        original.process(&[samples]).unwrap();
        let mut corrected = LoudnessProcess::new(1, 8_000).unwrap();
        corrected.process(&[scaled]).unwrap();

        let delta = corrected.integrated_loudness().unwrap() - original.integrated_loudness().unwrap();
        prop_assert!((delta - gain_db).abs() < 0.01, "delta {} for gain {}", delta, gain_db);
    }

    /// Property: percentile queries are idempotent
    #[test]
    fn histogram_percentile_is_idempotent(
        values in prop::collection::vec(-80.0f32..10.0, 0..300),
        fraction in 0.0f32..1.0
    ) {
        let mut histogram = LoudnessHistogram::new();
        for v in &values {
            histogram.add(*v);
        }
        let below = histogram.percentile(fraction, Scan::FromBelow);
        let above = histogram.percentile(fraction, Scan::FromAbove);
        for _ in 0..3 {
            prop_assert_eq!(histogram.percentile(fraction, Scan::FromBelow), below);
            prop_assert_eq!(histogram.percentile(fraction, Scan::FromAbove), above);
        }
        prop_assert_eq!(below.is_none(), histogram.count() == 0);
    }

    /// Property: the correction gain lands the predicted loudness on target
    #[test]
    fn correction_gain_reaches_target(
        integrated in -60.0f32..0.0,
        true_peak in -30.0f32..0.0
    ) {
        let levels = LoudnessLevels::ebu_r128();
        let gain = levels.correction_gain(Some(integrated), true_peak, false);
        let corrected = integrated + 20.0 * gain.log10();
        prop_assert!((corrected - levels.target_lufs).abs() < 0.01);

        let limited = levels.correction_gain(Some(integrated), true_peak, true);
        prop_assert!(limited <= gain + 1e-6);
        prop_assert!(true_peak + 20.0 * limited.log10() <= levels.max_true_peak_dbtp + 0.01);
    }

    /// Property: quantization never leaves the format range and stays within one step
    #[test]
    fn quantization_error_is_bounded(sample in -1.0f32..1.0) {
        for format in [SampleFormat::S16, SampleFormat::S24] {
            let restored = format.dequantize(format.quantize(sample));
            let step = 1.0 / (1u32 << (format.bits() - 1)) as f32;
            prop_assert!((restored - sample).abs() <= step);
        }
    }
}
