/// Analyser settings
use crate::error::{AnalyserError, Result};
use ploud_loudness::{LoudnessLevels, SampleFormat, DEFAULT_UPSAMPLING_FREQUENCY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File read when `--settings` is not given, if present
pub const DEFAULT_SETTINGS_FILE: &str = "media-analyser.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalyserSettings {
    /// Loudness levels preset (`ebu-r128`, `atsc-a85`, `cst-rt017`)
    #[serde(default = "default_levels")]
    pub levels: String,

    /// Overrides of the preset
    #[serde(default)]
    pub target_lufs: Option<f32>,
    #[serde(default)]
    pub tolerance_lu: Option<f32>,
    #[serde(default)]
    pub max_true_peak_dbtp: Option<f32>,

    /// Rate the true-peak meter oversamples towards
    #[serde(default = "default_upsampling_frequency")]
    pub upsampling_frequency: u32,

    /// Keep the corrected true peak under the ceiling
    #[serde(default)]
    pub limit_to_true_peak: bool,

    /// Sample format of corrected WAV output
    #[serde(default = "default_output_format")]
    pub output_format: SampleFormat,
}

impl AnalyserSettings {
    /// Load settings from an optional TOML file and the environment
    ///
    /// An explicit `path` must exist; otherwise `media-analyser.toml` in the
    /// working directory is used when present. Variables prefixed `PLOUD_`
    /// override the file (`PLOUD_LEVELS=atsc-a85`, `PLOUD_TARGET_LUFS=-24`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AnalyserError::Config(format!(
                        "settings file {} not found",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("PLOUD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = settings.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        let levels = self.loudness_levels()?;

        if !(-70.0..=0.0).contains(&levels.target_lufs) {
            return Err(AnalyserError::Config(format!(
                "target loudness {} LUFS outside -70..0",
                levels.target_lufs
            )));
        }

        if levels.tolerance_lu <= 0.0 {
            return Err(AnalyserError::Config(format!(
                "tolerance must be positive, got {} LU",
                levels.tolerance_lu
            )));
        }

        if self.upsampling_frequency == 0 {
            return Err(AnalyserError::Config(
                "upsampling frequency must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Preset named by `levels` with the overrides applied
    pub fn loudness_levels(&self) -> Result<LoudnessLevels> {
        let mut levels = LoudnessLevels::from_name(&self.levels).ok_or_else(|| {
            AnalyserError::Config(format!("unknown loudness levels '{}'", self.levels))
        })?;

        if let Some(target) = self.target_lufs {
            levels.target_lufs = target;
        }
        if let Some(tolerance) = self.tolerance_lu {
            levels.tolerance_lu = tolerance;
        }
        if let Some(ceiling) = self.max_true_peak_dbtp {
            levels.max_true_peak_dbtp = ceiling;
        }
        Ok(levels)
    }
}

// Default values
fn default_levels() -> String {
    "ebu-r128".to_string()
}

fn default_upsampling_frequency() -> u32 {
    DEFAULT_UPSAMPLING_FREQUENCY
}

fn default_output_format() -> SampleFormat {
    SampleFormat::S24
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            target_lufs: None,
            tolerance_lu: None,
            max_true_peak_dbtp: None,
            upsampling_frequency: default_upsampling_frequency(),
            limit_to_true_peak: false,
            output_format: default_output_format(),
        }
    }
}
