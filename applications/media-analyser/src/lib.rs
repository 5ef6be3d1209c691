//! Media analyser
//!
//! Measures the loudness of a list of audio streams as one program and
//! optionally writes a gain-corrected copy.

pub mod analysis;
pub mod error;
pub mod progress;
pub mod report;
pub mod settings;
pub mod streams;

pub use analysis::{open_streams, run, AnalysisOptions};
pub use error::{AnalyserError, Result};
pub use report::AnalysisReport;
pub use settings::AnalyserSettings;
pub use streams::{load_stream_list, parse_stream_list, StreamDesc};
