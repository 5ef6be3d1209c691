/// Audio decoding source using Symphonia
use crate::error::{MediaError, Result};
use ploud_loudness::{FragmentSource, LoudnessError, PlanarBuffer, MAX_CHANNELS};
use std::path::{Path, PathBuf};
use symphonia::core::audio::{Channels, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Keep at most [`MAX_CHANNELS`] decoded channels
///
/// `channels` lists decoded channel indices in output order. When there are
/// too many, the LFE channel goes first, then the tail is cut off.
pub fn reduce_layout(mut channels: Vec<usize>, lfe: Option<usize>) -> Vec<usize> {
    if channels.len() > MAX_CHANNELS {
        if let Some(lfe) = lfe {
            channels.retain(|&c| c != lfe);
        }
        channels.truncate(MAX_CHANNELS);
    }
    channels
}

/// Decoded index of the LFE channel, if the layout carries one
fn lfe_position(layout: Channels) -> Option<usize> {
    if layout.contains(Channels::LFE1) {
        // Decoded planes follow the bit order of the layout
        Some((layout.bits() & (Channels::LFE1.bits() - 1)).count_ones() as usize)
    } else {
        None
    }
}

/// One audio stream of a media file, decoded to planar f32
///
/// Supports: MP3, FLAC, OGG/Vorbis, WAV, AAC/MP4
pub struct SymphoniaSource {
    path: PathBuf,
    stream_index: usize,
    selection: Option<Vec<usize>>,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    source_channels: usize,
    /// Decoded channel feeding each output channel
    channel_map: Vec<usize>,
    total_frames: Option<u64>,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_spec: Option<(SignalSpec, usize)>,
    /// Decoded frames not handed out yet, one plane per output channel
    pending: Vec<Vec<f32>>,
    ended: bool,
}

impl SymphoniaSource {
    /// Open the `stream_index`-th audio stream of `path`
    ///
    /// `selection` keeps only the listed decoded channels, in that order.
    /// Without it every channel is kept; layouts wider than five channels
    /// lose their LFE channel and are then truncated.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or probed, if it has no
    /// such audio stream, or if a selected channel does not exist.
    pub fn open(
        path: impl AsRef<Path>,
        stream_index: usize,
        selection: Option<Vec<usize>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| MediaError::Symphonia(format!("Failed to probe file: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .nth(stream_index)
            .ok_or_else(|| MediaError::NoAudioStream {
                path: path.display().to_string(),
                index: stream_index,
            })?;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            MediaError::UnsupportedFormat(format!("{}: unknown sample rate", path.display()))
        })?;
        let layout = track.codec_params.channels.ok_or_else(|| {
            MediaError::UnsupportedFormat(format!("{}: unknown channel layout", path.display()))
        })?;
        let source_channels = layout.count();
        let track_id = track.id;
        let total_frames = track.codec_params.n_frames;

        let wanted = match &selection {
            Some(channels) => {
                if let Some(&channel) = channels.iter().find(|&&c| c >= source_channels) {
                    return Err(MediaError::InvalidChannel {
                        path: path.display().to_string(),
                        channel,
                        channels: source_channels,
                    });
                }
                channels.clone()
            }
            None => (0..source_channels).collect(),
        };
        let channel_map = reduce_layout(wanted.clone(), lfe_position(layout));
        if channel_map.len() < wanted.len() {
            warn!(
                path = %path.display(),
                requested = wanted.len(),
                kept = channel_map.len(),
                "Too many channels, LFE dropped and layout truncated"
            );
        }

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| MediaError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        debug!(
            path = %path.display(),
            stream_index,
            sample_rate,
            source_channels,
            ?channel_map,
            "Opened audio stream"
        );

        Ok(Self {
            path: path.to_path_buf(),
            stream_index,
            pending: vec![Vec::new(); channel_map.len()],
            selection,
            format,
            decoder,
            track_id,
            sample_rate,
            source_channels,
            channel_map,
            total_frames,
            sample_buf: None,
            sample_spec: None,
            ended: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Channels in the decoded stream, before selection
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    /// Decoded channel index behind each delivered channel
    pub fn channel_map(&self) -> &[usize] {
        &self.channel_map
    }

    /// Stream length in frames, when the container declares it
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    /// Decode packets until one yields audio for our track
    ///
    /// Returns false at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(MediaError::Symphonia(format!("Error reading packet: {}", e)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(path = %self.path.display(), error = e, "Recoverable decode error, packet skipped");
                    continue;
                }
                Err(e) => return Err(MediaError::DecodeError(e.to_string())),
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let capacity = decoded.capacity();
            let reuse = matches!(self.sample_spec, Some((s, c)) if s == spec && c >= capacity);
            if !reuse {
                self.sample_buf = Some(SampleBuffer::new(capacity as u64, spec));
                self.sample_spec = Some((spec, capacity));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_planar_ref(decoded);

            let samples = buf.samples();
            let decoded_channels = spec.channels.count();
            for (plane, &channel) in self.pending.iter_mut().zip(&self.channel_map) {
                if channel < decoded_channels {
                    plane.extend_from_slice(&samples[channel * frames..(channel + 1) * frames]);
                } else {
                    // Layout shrank mid-stream
                    plane.resize(plane.len() + frames, 0.0);
                }
            }
            return Ok(true);
        }
    }
}

impl FragmentSource for SymphoniaSource {
    fn channels(&self) -> usize {
        self.channel_map.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> ploud_loudness::Result<usize> {
        while !self.ended && self.pending_frames() < max_frames {
            if !self.decode_next()? {
                self.ended = true;
            }
        }

        let frames = max_frames.min(self.pending_frames());
        buffer.reset(self.channel_map.len());
        for (channel, plane) in self.pending.iter_mut().enumerate() {
            buffer.plane_mut(channel).extend(plane.drain(..frames));
        }
        Ok(frames)
    }

    fn rewind(&mut self) -> ploud_loudness::Result<()> {
        debug!(path = %self.path.display(), "Rewinding audio stream");
        *self = Self::open(&self.path, self.stream_index, self.selection.clone())
            .map_err(LoudnessError::from)?;
        Ok(())
    }
}
