//! Fragment sources and sinks
//!
//! Decoders feed the process through [`FragmentSource`], encoders receive
//! corrected audio through [`FragmentSink`]. Both exchange planar buffers.

use crate::error::{LoudnessError, Result};
use crate::process::MAX_CHANNELS;
use tracing::debug;

/// Owned planar audio, one `Vec` per channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanarBuffer {
    planes: Vec<Vec<f32>>,
}

impl PlanarBuffer {
    /// Empty buffer with `channels` planes of `capacity` frames
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            planes: vec![Vec::with_capacity(capacity); channels],
        }
    }

    /// Wrap existing planes
    ///
    /// # Errors
    /// Returns error if the planes differ in length
    pub fn from_planes(planes: Vec<Vec<f32>>) -> Result<Self> {
        let frames = planes.first().map_or(0, Vec::len);
        if let Some(index) = planes.iter().position(|p| p.len() != frames) {
            return Err(LoudnessError::InvalidBuffer(format!(
                "channel {} has {} frames, channel 0 has {}",
                index,
                planes[index].len(),
                frames
            )));
        }
        Ok(Self { planes })
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Drop all samples and make room for `channels` planes
    pub fn reset(&mut self, channels: usize) {
        self.planes.resize_with(channels, Vec::new);
        self.planes.iter_mut().for_each(Vec::clear);
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }

    pub fn plane_mut(&mut self, channel: usize) -> &mut Vec<f32> {
        &mut self.planes[channel]
    }

    /// All planes, ready for [`crate::LoudnessProcess::process`]
    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        for plane in &mut self.planes {
            plane.iter_mut().for_each(|s| *s *= gain);
        }
    }

    /// Take the planes out of the buffer
    pub fn into_planes(self) -> Vec<Vec<f32>> {
        self.planes
    }
}

/// Sequential producer of planar audio
pub trait FragmentSource {
    /// Channels delivered per frame
    fn channels(&self) -> usize;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Replace the content of `buffer` with up to `max_frames` frames
    ///
    /// Returns the number of frames delivered; 0 means end of stream.
    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> Result<usize>;

    /// Restart from the first frame
    fn rewind(&mut self) -> Result<()> {
        Err(LoudnessError::Source("source cannot be rewound".to_string()))
    }
}

impl<T: FragmentSource + ?Sized> FragmentSource for Box<T> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> Result<usize> {
        (**self).read(buffer, max_frames)
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }
}

/// Consumer of planar audio
pub trait FragmentSink {
    /// Accept one buffer
    fn write(&mut self, buffer: &PlanarBuffer) -> Result<()>;

    /// Flush and close; no write may follow
    fn finish(&mut self) -> Result<()>;
}

impl<T: FragmentSink + ?Sized> FragmentSink for Box<T> {
    fn write(&mut self, buffer: &PlanarBuffer) -> Result<()> {
        (**self).write(buffer)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Source over planes held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    sample_rate: u32,
    planes: Vec<Vec<f32>>,
    position: usize,
}

impl MemorySource {
    /// # Errors
    /// Returns error if there are no planes or they differ in length
    pub fn new(sample_rate: u32, planes: Vec<Vec<f32>>) -> Result<Self> {
        if planes.is_empty() {
            return Err(LoudnessError::InvalidChannelCount(0));
        }
        let planes = PlanarBuffer::from_planes(planes)?.into_planes();
        Ok(Self {
            sample_rate,
            planes,
            position: 0,
        })
    }

    /// Total frames held
    pub fn len(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FragmentSource for MemorySource {
    fn channels(&self) -> usize {
        self.planes.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> Result<usize> {
        let frames = max_frames.min(self.len() - self.position);
        buffer.reset(self.planes.len());
        for (channel, plane) in self.planes.iter().enumerate() {
            buffer
                .plane_mut(channel)
                .extend_from_slice(&plane[self.position..self.position + frames]);
        }
        self.position += frames;
        Ok(frames)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// Sink collecting planes in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    planes: Vec<Vec<f32>>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected planes
    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Collected frames
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Whether [`FragmentSink::finish`] was called
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FragmentSink for MemorySink {
    fn write(&mut self, buffer: &PlanarBuffer) -> Result<()> {
        if self.finished {
            return Err(LoudnessError::Sink("write after finish".to_string()));
        }
        if self.planes.is_empty() {
            self.planes = vec![Vec::new(); buffer.channels()];
        } else if self.planes.len() != buffer.channels() {
            return Err(LoudnessError::InvalidBuffer(format!(
                "sink holds {} channels, buffer has {}",
                self.planes.len(),
                buffer.channels()
            )));
        }
        for (plane, input) in self.planes.iter_mut().zip(buffer.planes()) {
            plane.extend_from_slice(input);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

struct Stream {
    source: Box<dyn FragmentSource>,
    /// Decoded frames not handed out yet
    pending: Vec<Vec<f32>>,
    ended: bool,
}

impl Stream {
    fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }
}

/// Several synchronized streams presented as one multichannel source
///
/// Channels are concatenated in stream order. Every stream must share the
/// sample rate and channel count of the first one; the combined layout is
/// limited to five channels. The source ends as soon as any stream ends.
pub struct MultiStreamSource {
    streams: Vec<Stream>,
    channels: usize,
    sample_rate: u32,
    scratch: PlanarBuffer,
}

impl MultiStreamSource {
    /// Combine `sources`, rejecting mismatched layouts before any read
    pub fn new(sources: Vec<Box<dyn FragmentSource>>) -> Result<Self> {
        let first = sources.first().ok_or(LoudnessError::InvalidChannelCount(0))?;
        let expected_channels = first.channels();
        let expected_sample_rate = first.sample_rate();

        for (index, source) in sources.iter().enumerate().skip(1) {
            if source.channels() != expected_channels || source.sample_rate() != expected_sample_rate {
                return Err(LoudnessError::StreamMismatch {
                    index,
                    channels: source.channels(),
                    sample_rate: source.sample_rate(),
                    expected_channels,
                    expected_sample_rate,
                });
            }
        }

        let channels = expected_channels * sources.len();
        if !(1..=MAX_CHANNELS).contains(&channels) {
            return Err(LoudnessError::InvalidChannelCount(channels));
        }

        debug!(
            streams = sources.len(),
            channels,
            sample_rate = expected_sample_rate,
            "Multi-stream source ready"
        );

        Ok(Self {
            streams: sources
                .into_iter()
                .map(|source| Stream {
                    pending: vec![Vec::new(); source.channels()],
                    source,
                    ended: false,
                })
                .collect(),
            channels,
            sample_rate: expected_sample_rate,
            scratch: PlanarBuffer::default(),
        })
    }

    /// Number of combined streams
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

impl FragmentSource for MultiStreamSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> Result<usize> {
        for stream in &mut self.streams {
            while !stream.ended && stream.pending_frames() < max_frames {
                let wanted = max_frames - stream.pending_frames();
                let read = stream.source.read(&mut self.scratch, wanted)?;
                if read == 0 {
                    stream.ended = true;
                    continue;
                }
                for (pending, decoded) in stream.pending.iter_mut().zip(self.scratch.planes()) {
                    pending.extend_from_slice(decoded);
                }
            }
        }

        let frames = self
            .streams
            .iter()
            .map(Stream::pending_frames)
            .min()
            .unwrap_or(0)
            .min(max_frames);

        buffer.reset(self.channels);
        let mut channel = 0;
        for stream in &mut self.streams {
            for pending in &mut stream.pending {
                buffer.plane_mut(channel).extend(pending.drain(..frames));
                channel += 1;
            }
        }
        Ok(frames)
    }

    fn rewind(&mut self) -> Result<()> {
        for stream in &mut self.streams {
            stream.source.rewind()?;
            stream.pending.iter_mut().for_each(Vec::clear);
            stream.ended = false;
        }
        Ok(())
    }
}
