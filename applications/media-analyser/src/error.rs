/// Analyser errors
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyserError>;

#[derive(Error, Debug)]
pub enum AnalyserError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stream list line {line}: {message}")]
    StreamList { line: usize, message: String },

    #[error("Nothing to analyse: the stream list is empty")]
    NoStreams,

    #[error(transparent)]
    Loudness(#[from] ploud_loudness::LoudnessError),

    #[error(transparent)]
    Media(#[from] ploud_media::MediaError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AnalyserError {
    fn from(err: config::ConfigError) -> Self {
        AnalyserError::Config(err.to_string())
    }
}
