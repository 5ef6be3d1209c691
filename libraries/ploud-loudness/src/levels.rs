//! Loudness levels and program compliance
//!
//! A level set defines the target loudness, the accepted tolerance around it
//! and the true-peak ceiling of a delivery standard.
//!
//! # Gain Calculation
//!
//! - Gain = Target Loudness - Integrated Loudness
//! - With true-peak limiting, the gain never pushes the true peak above the
//!   ceiling: Gain <= Max True Peak - True Peak
//!
//! An undefined integrated loudness (silence, too short) yields unity gain.

use crate::result::MeasurementResult;
use crate::{db_to_linear, ATSC_A85_TARGET_LUFS, EBU_R128_TARGET_LUFS};
use serde::{Deserialize, Serialize};

/// Outcome of checking a measurement against a level set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compliance {
    /// Within tolerance, true peak and short-term limits respected
    Valid,
    /// Out of tolerance, but a uniform gain brings it back within every limit
    Correctable,
    /// No uniform gain can make the program compliant
    Invalid,
    /// Integrated loudness is undefined
    Undetermined,
}

/// Target levels of a loudness standard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoudnessLevels {
    /// Short identifier
    pub name: String,
    /// Target integrated loudness (LUFS)
    pub target_lufs: f32,
    /// Accepted deviation from the target (LU)
    pub tolerance_lu: f32,
    /// Maximum true peak (dBTP)
    pub max_true_peak_dbtp: f32,
    /// Maximum short-term loudness (LUFS), if the standard sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_short_term_lufs: Option<f32>,
}

impl Default for LoudnessLevels {
    fn default() -> Self {
        Self::ebu_r128()
    }
}

impl LoudnessLevels {
    /// EBU R128: -23 LUFS +-1 LU, -1 dBTP
    pub fn ebu_r128() -> Self {
        Self {
            name: "ebu_r128".to_string(),
            target_lufs: EBU_R128_TARGET_LUFS,
            tolerance_lu: 1.0,
            max_true_peak_dbtp: -1.0,
            max_short_term_lufs: None,
        }
    }

    /// ATSC A/85: -24 LKFS +-2 LU, -2 dBTP
    pub fn atsc_a85() -> Self {
        Self {
            name: "atsc_a85".to_string(),
            target_lufs: ATSC_A85_TARGET_LUFS,
            tolerance_lu: 2.0,
            max_true_peak_dbtp: -2.0,
            max_short_term_lufs: None,
        }
    }

    /// CST RT-017: -23 LUFS +-1 LU, -3 dBTP, short-term at most -20 LUFS
    pub fn cst_rt017() -> Self {
        Self {
            name: "cst_rt017".to_string(),
            target_lufs: EBU_R128_TARGET_LUFS,
            tolerance_lu: 1.0,
            max_true_peak_dbtp: -3.0,
            max_short_term_lufs: Some(-20.0),
        }
    }

    /// Look up a preset by name (case-insensitive, `-` and `_` are equivalent)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "ebu_r128" | "r128" | "ebu" => Some(Self::ebu_r128()),
            "atsc_a85" | "a85" | "atsc" => Some(Self::atsc_a85()),
            "cst_rt017" | "rt017" | "cst" => Some(Self::cst_rt017()),
            _ => None,
        }
    }

    /// Correction gain in dB, `0.0` when the loudness is undefined
    pub fn correction_gain_db(
        &self,
        integrated_lufs: Option<f32>,
        true_peak_dbtp: f32,
        limit_to_true_peak: bool,
    ) -> f32 {
        let Some(integrated) = integrated_lufs else {
            return 0.0;
        };
        let gain_db = self.target_lufs - integrated;
        if limit_to_true_peak {
            gain_db.min(self.max_true_peak_dbtp - true_peak_dbtp)
        } else {
            gain_db
        }
    }

    /// Linear correction gain, unity when the loudness is undefined
    pub fn correction_gain(
        &self,
        integrated_lufs: Option<f32>,
        true_peak_dbtp: f32,
        limit_to_true_peak: bool,
    ) -> f32 {
        db_to_linear(self.correction_gain_db(integrated_lufs, true_peak_dbtp, limit_to_true_peak))
    }

    /// Whether every limit holds after shifting the program by `gain_db`
    fn within_limits(&self, result: &MeasurementResult, integrated: f32, gain_db: f32) -> bool {
        let loudness_ok = (integrated + gain_db - self.target_lufs).abs() <= self.tolerance_lu;
        let peak_ok = result.true_peak_dbtp + gain_db <= self.max_true_peak_dbtp;
        let short_term_ok = match (self.max_short_term_lufs, result.short_term_max) {
            (Some(limit), Some(max)) => max + gain_db <= limit,
            _ => true,
        };
        loudness_ok && peak_ok && short_term_ok
    }

    /// Check a measurement against these levels
    pub fn assess(&self, result: &MeasurementResult) -> Compliance {
        let Some(integrated) = result.integrated_loudness else {
            return Compliance::Undetermined;
        };
        if self.within_limits(result, integrated, 0.0) {
            return Compliance::Valid;
        }

        // Any gain within the tolerance window works; the true-peak and
        // short-term ceilings favour the lowest one
        let lowest = self.target_lufs - self.tolerance_lu - integrated;
        let target = self.target_lufs - integrated;
        if [target, lowest]
            .into_iter()
            .any(|gain_db| self.within_limits(result, integrated, gain_db))
        {
            Compliance::Correctable
        } else {
            Compliance::Invalid
        }
    }
}
