//! Loudness measurement and correction for broadcast audio
//!
//! This crate provides:
//! - ITU-R BS.1770 / EBU R128 loudness measurement (momentary, short-term,
//!   integrated loudness, loudness range, true peak)
//! - Loudness levels (EBU R128, ATSC A/85, CST RT-017) and compliance checks
//! - A single-pass gain correction loop that re-measures the corrected audio
//! - Width-tagged sample format conversion for encoders and decoders
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Fragment    │ ──► │ ChannelFilter  │ ──► │ Accumulator  │ ──► Histogram
//! │ Source      │     │ (K-weighting)  │     │ (400ms / 3s) │
//! └─────────────┘     └────────────────┘     └──────────────┘
//!        │                                           │
//!        │            ┌────────────────┐             ▼
//!        └──────────► │ TruePeakMeter  │ ──► ┌──────────────────┐
//!                     └────────────────┘     │ MeasurementResult│
//!                                            └──────────────────┘
//!
//! Correction:
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source      │ ──► │ Gain Apply   │ ──► │ Fragment Sink │
//! └─────────────┘     └──────────────┘     └───────────────┘
//!                            │
//!                            ▼
//!                     LoudnessProcess (re-measure)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ploud_loudness::{analyse, Corrector, LoudnessLevels, LoudnessProcess, MemorySource};
//!
//! let mut source = MemorySource::new(48000, planes)?;
//! let mut process = LoudnessProcess::new(source.channels(), source.sample_rate())?;
//! analyse(&mut source, &mut process, None)?;
//!
//! let result = process.result();
//! println!("{}", result);
//!
//! let corrector = Corrector::new(LoudnessLevels::ebu_r128());
//! let gain = corrector.gain_for(&process);
//! ```

#![deny(unsafe_code)]

mod accumulator;
mod correction;
mod error;
mod filter;
mod histogram;
mod levels;
mod process;
mod result;
mod sample;
mod source;
mod true_peak;

pub use accumulator::{
    AccumulatorState, GatedLoudness, LoudnessAccumulator, LoudnessRange, ABSOLUTE_THRESHOLD_LUFS,
    INTEGRATION_RELATIVE_GATE_LU, RANGE_HIGH_PERCENTILE, RANGE_LOW_PERCENTILE,
    RANGE_RELATIVE_GATE_LU,
};
pub use correction::{analyse, CorrectionOutcome, Corrector, CORRECTION_EPSILON};
pub use error::{LoudnessError, Result};
pub use filter::{BiquadCoefficients, ChannelFilter, ANCHOR_SAMPLE_RATE};
pub use histogram::{LoudnessHistogram, Scan, HISTOGRAM_BINS, HISTOGRAM_RESOLUTION_LU};
pub use levels::{Compliance, LoudnessLevels};
pub use process::{
    ChannelGains, LoudnessProcess, FRAGMENTS_PER_SECOND, MAX_CHANNELS, MOMENTARY_FRAGMENTS,
    SHORT_TERM_FRAGMENTS, TRUE_PEAK_PERIOD_FRAGMENTS,
};
pub use result::MeasurementResult;
pub use sample::SampleFormat;
pub use source::{
    FragmentSink, FragmentSource, MemorySink, MemorySource, MultiStreamSource, PlanarBuffer,
};
pub use true_peak::{oversampling_factor, TruePeakMeter, DEFAULT_UPSAMPLING_FREQUENCY};

/// Lowest reportable loudness or level (LUFS / dB)
///
/// Zero power and zero amplitude map here instead of negative infinity.
pub const FLOOR_DB: f32 = -200.0;

/// EBU R128 target loudness (-23 LUFS)
pub const EBU_R128_TARGET_LUFS: f32 = -23.0;

/// ATSC A/85 target loudness (-24 LKFS)
pub const ATSC_A85_TARGET_LUFS: f32 = -24.0;

/// Lowest accepted sample rate in Hz
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest accepted sample rate in Hz
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Convert a linear amplitude to dB, clamped to [`FLOOR_DB`]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        (20.0 * amplitude.log10()).max(FLOOR_DB)
    } else {
        FLOOR_DB
    }
}

/// Convert a mean-square power to loudness (`-0.691 + 10 log10(power)`)
///
/// Zero or negative power clamps to [`FLOOR_DB`].
pub fn power_to_loudness(power: f64) -> f32 {
    if power > 0.0 {
        ((-0.691 + 10.0 * power.log10()) as f32).max(FLOOR_DB)
    } else {
        FLOOR_DB
    }
}

/// Inverse of [`power_to_loudness`]
pub fn loudness_to_power(loudness: f32) -> f64 {
    10.0_f64.powf((f64::from(loudness) + 0.691) / 10.0)
}

/// Convert a gain in dB to a linear multiplier
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear multiplier to dB, clamped to [`FLOOR_DB`]
pub fn linear_to_db(linear: f32) -> f32 {
    amplitude_to_db(linear)
}
