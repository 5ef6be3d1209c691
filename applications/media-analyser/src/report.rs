//! JSON analysis report

use crate::error::Result;
use crate::streams::StreamDesc;
use ploud_loudness::{Compliance, CorrectionOutcome, LoudnessLevels, MeasurementResult};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Corrected output and its measurement
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    pub output: PathBuf,
    pub outcome: CorrectionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub inputs: Vec<StreamDesc>,
    /// Human-readable layout, e.g. "2 channels"
    pub channels: String,
    pub levels: LoudnessLevels,
    pub measurement: MeasurementResult,
    pub compliance: Compliance,
    /// Gain written to the corrected output; 1.0 when nothing was written
    pub applied_gain: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionReport>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

pub fn describe_channels(channels: usize) -> String {
    if channels == 1 {
        "1 channel".to_string()
    } else {
        format!("{} channels", channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ploud_loudness::LoudnessProcess;

    fn silent_report() -> AnalysisReport {
        let mut process = LoudnessProcess::new(1, 48_000).unwrap();
        process.process(&[vec![0.0_f32; 48_000]]).unwrap();
        let levels = LoudnessLevels::ebu_r128();
        let measurement = process.result();
        AnalysisReport {
            inputs: vec![StreamDesc::new("silence.wav", 0, None)],
            channels: describe_channels(1),
            compliance: levels.assess(&measurement),
            levels,
            measurement,
            applied_gain: 1.0,
            correction: None,
        }
    }

    #[test]
    fn test_report_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&silent_report().to_json().unwrap()).unwrap();
        assert_eq!(json["channels"], "1 channel");
        assert_eq!(json["inputs"][0]["stream_index"], 0);
        assert_eq!(json["compliance"], "undetermined");
        assert!(json["measurement"]["integrated_loudness"].is_null());
        assert!(json.get("correction").is_none());
    }

    #[test]
    fn test_write_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PLoud.json");
        silent_report().write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"levels\""));
    }

    #[test]
    fn test_describe_channels() {
        assert_eq!(describe_channels(1), "1 channel");
        assert_eq!(describe_channels(5), "5 channels");
    }
}
