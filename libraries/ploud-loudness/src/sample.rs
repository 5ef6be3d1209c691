//! Sample format conversion
//!
//! Every conversion is explicit and tagged with the sample width; nothing
//! reinterprets one buffer type as another.

use crate::error::{LoudnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit integer
    S16,
    /// Signed 24-bit integer
    S24,
    /// Signed 32-bit integer
    S32,
    /// 32-bit IEEE float
    F32,
}

impl SampleFormat {
    /// Bits per sample
    pub fn bits(self) -> u16 {
        match self {
            Self::S16 => 16,
            Self::S24 => 24,
            Self::S32 | Self::F32 => 32,
        }
    }

    /// Whether the format is floating point
    pub fn is_float(self) -> bool {
        self == Self::F32
    }

    /// Integer full scale (`2^(bits - 1)`); float uses the 32-bit scale
    fn full_scale(self) -> f64 {
        f64::from(1_u32 << (self.bits() - 1))
    }

    /// Integer range of the format
    fn limits(self) -> (i64, i64) {
        let scale = self.full_scale() as i64;
        (-scale, scale - 1)
    }

    /// Convert a float sample to the integer grid of this format
    ///
    /// Out-of-range values clip to the format limits.
    pub fn quantize(self, sample: f32) -> i32 {
        let (min, max) = self.limits();
        let scaled = (f64::from(sample) * self.full_scale()).round();
        if scaled.is_nan() {
            return 0;
        }
        (scaled as i64).clamp(min, max) as i32
    }

    /// Convert an integer sample of this format back to float
    pub fn dequantize(self, sample: i32) -> f32 {
        (f64::from(sample) / self.full_scale()) as f32
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16 => "s16",
            Self::S24 => "s24",
            Self::S32 => "s32",
            Self::F32 => "f32",
        };
        f.write_str(name)
    }
}

impl FromStr for SampleFormat {
    type Err = LoudnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s16" | "16" => Ok(Self::S16),
            "s24" | "24" => Ok(Self::S24),
            "s32" | "32" => Ok(Self::S32),
            "f32" | "float" => Ok(Self::F32),
            other => Err(LoudnessError::InvalidBuffer(format!(
                "unknown sample format: {}",
                other
            ))),
        }
    }
}
