//! Measurement result snapshot

use crate::levels::LoudnessLevels;
use crate::process::LoudnessProcess;
use crate::{db_to_linear, linear_to_db};
use serde::Serialize;
use std::fmt;

/// Immutable snapshot of a completed measurement pass
///
/// Statistics that are undefined (no full block, or silent program) are
/// `None` rather than a plausible-looking number. Values are kept at full
/// precision; rounding happens only when displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    /// Integrated loudness (LUFS)
    pub integrated_loudness: Option<f32>,
    /// Relative gating threshold of the integrated loudness (LUFS)
    pub integrated_threshold: Option<f32>,
    /// Loudness range (LU)
    pub loudness_range: Option<f32>,
    /// Lower bound of the loudness range (LUFS)
    pub range_low: Option<f32>,
    /// Upper bound of the loudness range (LUFS)
    pub range_high: Option<f32>,
    /// Relative gating threshold of the loudness range (LUFS)
    pub range_threshold: Option<f32>,
    pub momentary_min: Option<f32>,
    pub momentary_max: Option<f32>,
    pub short_term_min: Option<f32>,
    pub short_term_max: Option<f32>,
    /// Maximum true peak over all channels (dBTP)
    pub true_peak_dbtp: f32,
    /// True peak of every 3 s window (dBTP)
    pub true_peak_values: Vec<f32>,
    /// Maximum raw sample over all channels (dBFS)
    pub sample_peak_dbfs: f32,
    /// Non-empty short-term histogram bins as `(LUFS, count)`
    pub short_term_histogram: Vec<(f32, u64)>,
    /// Suggested linear gain for the levels the result was taken against
    pub correction_gain: f32,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

impl MeasurementResult {
    pub(crate) fn from_process(
        process: &LoudnessProcess,
        levels: &LoudnessLevels,
        limit_to_true_peak: bool,
    ) -> Self {
        let integrated = process.integrated().ok();
        let range = process.range().ok();
        let true_peak_dbtp = process.true_peak_db();

        Self {
            integrated_loudness: integrated.map(|g| g.loudness),
            integrated_threshold: integrated.map(|g| g.threshold),
            loudness_range: range.map(|r| r.width()),
            range_low: range.map(|r| r.low),
            range_high: range.map(|r| r.high),
            range_threshold: range.map(|r| r.threshold),
            momentary_min: process.momentary_min(),
            momentary_max: process.momentary_max(),
            short_term_min: process.short_term_min(),
            short_term_max: process.short_term_max(),
            true_peak_dbtp,
            true_peak_values: process.true_peak_values().to_vec(),
            sample_peak_dbfs: process.sample_peak_db(),
            short_term_histogram: process.short_term_histogram().occupied_bins(),
            correction_gain: levels.correction_gain(
                integrated.map(|g| g.loudness),
                true_peak_dbtp,
                limit_to_true_peak,
            ),
            duration_seconds: process.duration_seconds(),
            sample_rate: process.sample_rate(),
            channels: process.channels(),
        }
    }

    /// Whether the integrated loudness is defined
    pub fn is_valid(&self) -> bool {
        self.integrated_loudness.is_some()
    }

    /// Correction gain in dB
    pub fn correction_gain_db(&self) -> f32 {
        linear_to_db(self.correction_gain)
    }

    /// Check if the audio would exceed `max_true_peak_dbtp` after applying `gain_db`
    pub fn will_exceed_at_gain(&self, gain_db: f32, max_true_peak_dbtp: f32) -> bool {
        self.true_peak_dbtp + gain_db > max_true_peak_dbtp
    }

    /// Predicted integrated loudness after a linear gain
    pub fn loudness_at_gain(&self, gain: f32) -> Option<f32> {
        self.integrated_loudness.map(|lufs| lufs + linear_to_db(gain))
    }
}

impl Default for MeasurementResult {
    fn default() -> Self {
        Self {
            integrated_loudness: None,
            integrated_threshold: None,
            loudness_range: None,
            range_low: None,
            range_high: None,
            range_threshold: None,
            momentary_min: None,
            momentary_max: None,
            short_term_min: None,
            short_term_max: None,
            true_peak_dbtp: crate::FLOOR_DB,
            true_peak_values: Vec::new(),
            sample_peak_dbfs: crate::FLOOR_DB,
            short_term_histogram: Vec::new(),
            correction_gain: db_to_linear(0.0),
            duration_seconds: 0.0,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

struct Lufs(Option<f32>);

impl fmt::Display for Lufs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.1}", value),
            None => f.write_str("undefined"),
        }
    }
}

impl fmt::Display for MeasurementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loudness: {} LUFS, Range: {} LU, True Peak: {:.1} dBTP, \
             Momentary Max: {} LUFS, Short-term Max: {} LUFS, Gain: {:.2} dB",
            Lufs(self.integrated_loudness),
            Lufs(self.loudness_range),
            self.true_peak_dbtp,
            Lufs(self.momentary_max),
            Lufs(self.short_term_max),
            self.correction_gain_db()
        )
    }
}
