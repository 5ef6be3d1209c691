/// Media-specific errors
use ploud_loudness::LoudnessError;
use thiserror::Error;

/// Result type alias using `MediaError`
pub type Result<T> = std::result::Result<T, MediaError>;

/// Media error types
#[derive(Error, Debug)]
pub enum MediaError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Container has no audio stream at the requested index
    #[error("No audio stream {index} in {path}")]
    NoAudioStream { path: String, index: usize },

    /// Requested channel does not exist in the stream
    #[error("Channel {channel} out of range for {path} ({channels} channels)")]
    InvalidChannel {
        path: String,
        channel: usize,
        channels: usize,
    },

    /// Unsupported format or codec parameters
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),

    /// Output was already finalized
    #[error("Output closed: {0}")]
    OutputClosed(String),

    /// WAV writer error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for LoudnessError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Wav(_) | MediaError::OutputClosed(_) => LoudnessError::Sink(err.to_string()),
            MediaError::Io(io) => LoudnessError::IoError(io),
            other => LoudnessError::Source(other.to_string()),
        }
    }
}
