//! Error types for loudness measurement

use thiserror::Error;

/// Result type for loudness operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur while measuring or correcting loudness
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// Invalid sample rate
    #[error("Invalid sample rate: {0} Hz (must be between 8000 and 384000)")]
    InvalidSampleRate(u32),

    /// Invalid channel count
    #[error("Invalid channel count: {0} (must be 1-5)")]
    InvalidChannelCount(usize),

    /// Input streams disagree on their audio configuration
    #[error(
        "Stream {index} does not match the first stream: \
         {channels} channels at {sample_rate} Hz, expected {expected_channels} channels at {expected_sample_rate} Hz"
    )]
    StreamMismatch {
        index: usize,
        channels: usize,
        sample_rate: u32,
        expected_channels: usize,
        expected_sample_rate: u32,
    },

    /// Planar buffer does not fit the process configuration
    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    /// Not a single full block has been measured yet
    #[error("Not enough audio for a loudness block")]
    InsufficientData,

    /// Every measured block is below the absolute gating threshold
    #[error("All blocks are below the absolute gating threshold (silent audio)")]
    BelowAbsoluteThreshold,

    /// Decoding collaborator failed
    #[error("Source error: {0}")]
    Source(String),

    /// Encoding collaborator failed
    #[error("Sink error: {0}")]
    Sink(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LoudnessError {
    /// Whether the error is a configuration problem detected before processing
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidSampleRate(_)
                | Self::InvalidChannelCount(_)
                | Self::StreamMismatch { .. }
                | Self::InvalidBuffer(_)
        )
    }

    /// Whether the error flags an undefined statistic rather than a failure
    pub fn is_undefined_statistic(&self) -> bool {
        matches!(self, Self::InsufficientData | Self::BelowAbsoluteThreshold)
    }
}
