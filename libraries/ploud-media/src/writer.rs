//! WAV output of corrected audio
//!
//! Samples arrive planar and leave interleaved. Integer formats go through
//! [`SampleFormat::quantize`], so out-of-range samples clip instead of
//! wrapping.

use crate::error::{MediaError, Result};
use hound::{WavSpec, WavWriter};
use ploud_loudness::{FragmentSink, LoudnessError, PlanarBuffer, SampleFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fragment sink writing a WAV file
pub struct WavSink {
    path: PathBuf,
    channels: usize,
    format: SampleFormat,
    writer: Option<WavWriter<BufWriter<File>>>,
    frames: u64,
}

impl WavSink {
    /// Create (or truncate) `path` for `channels` channels at `sample_rate`
    ///
    /// # Errors
    /// Returns an error if the channel count does not fit a WAV header or
    /// the file cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        channels: usize,
        sample_rate: u32,
        format: SampleFormat,
    ) -> Result<Self> {
        let path = path.as_ref();
        let header_channels = u16::try_from(channels)
            .ok()
            .filter(|&c| c > 0)
            .ok_or_else(|| MediaError::UnsupportedFormat(format!("{} channels", channels)))?;

        let spec = WavSpec {
            channels: header_channels,
            sample_rate,
            bits_per_sample: format.bits(),
            sample_format: if format.is_float() {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };
        let writer = WavWriter::create(path, spec)?;
        debug!(path = %path.display(), channels, sample_rate, %format, "Created WAV output");

        Ok(Self {
            path: path.to_path_buf(),
            channels,
            format,
            writer: Some(writer),
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write_planes(&mut self, buffer: &PlanarBuffer) -> Result<()> {
        let format = self.format;
        let Some(writer) = self.writer.as_mut() else {
            return Err(MediaError::OutputClosed(self.path.display().to_string()));
        };

        for frame in 0..buffer.frames() {
            for plane in buffer.planes() {
                let sample = plane[frame];
                match format {
                    SampleFormat::F32 => writer.write_sample(sample)?,
                    SampleFormat::S16 => writer.write_sample(format.quantize(sample) as i16)?,
                    SampleFormat::S24 | SampleFormat::S32 => {
                        writer.write_sample(format.quantize(sample))?;
                    }
                }
            }
        }
        self.frames += buffer.frames() as u64;
        Ok(())
    }
}

impl FragmentSink for WavSink {
    fn write(&mut self, buffer: &PlanarBuffer) -> ploud_loudness::Result<()> {
        if buffer.channels() != self.channels {
            return Err(LoudnessError::InvalidBuffer(format!(
                "WAV output has {} channels, buffer has {}",
                self.channels,
                buffer.channels()
            )));
        }
        self.write_planes(buffer).map_err(LoudnessError::from)
    }

    fn finish(&mut self) -> ploud_loudness::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| LoudnessError::from(MediaError::Wav(e)))?;
            info!(path = %self.path.display(), frames = self.frames, "WAV output written");
        }
        Ok(())
    }
}
