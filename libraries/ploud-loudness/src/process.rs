//! Loudness process
//!
//! Owns one K-weighting filter and one true-peak meter per channel plus the
//! momentary and short-term accumulators. Audio arrives as planar buffers of
//! any length; it is cut into 100 ms fragments internally, and a trailing
//! partial fragment is carried over to the next call.

use crate::accumulator::{GatedLoudness, LoudnessAccumulator, LoudnessRange};
use crate::error::{LoudnessError, Result};
use crate::filter::ChannelFilter;
use crate::histogram::LoudnessHistogram;
use crate::levels::LoudnessLevels;
use crate::result::MeasurementResult;
use crate::true_peak::{TruePeakMeter, DEFAULT_UPSAMPLING_FREQUENCY};
use crate::{amplitude_to_db, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use tracing::debug;

/// Maximum number of input channels
pub const MAX_CHANNELS: usize = 5;

/// Fragments per second (100 ms fragments)
pub const FRAGMENTS_PER_SECOND: u32 = 10;

/// Momentary block length in fragments (400 ms)
pub const MOMENTARY_FRAGMENTS: usize = 4;

/// Short-term block length in fragments (3 s)
pub const SHORT_TERM_FRAGMENTS: usize = 30;

/// True-peak reporting window in fragments (3 s)
pub const TRUE_PEAK_PERIOD_FRAGMENTS: usize = 30;

/// Per-channel power weights (L, R, C, Ls, Rs)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGains([f32; MAX_CHANNELS]);

impl ChannelGains {
    /// ITU-R BS.1770 weights: front channels 1.0, surround channels 1.41
    pub const BS1770: Self = Self([1.0, 1.0, 1.0, 1.41, 1.41]);

    /// Custom weights
    pub fn new(gains: [f32; MAX_CHANNELS]) -> Self {
        Self(gains)
    }

    /// Weight of channel `index`
    pub fn gain(&self, index: usize) -> f32 {
        self.0.get(index).copied().unwrap_or(0.0)
    }

    /// All weights
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Default for ChannelGains {
    fn default() -> Self {
        Self::BS1770
    }
}

fn validate(channels: usize, sample_rate: u32) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(LoudnessError::InvalidSampleRate(sample_rate));
    }
    if !(1..=MAX_CHANNELS).contains(&channels) {
        return Err(LoudnessError::InvalidChannelCount(channels));
    }
    Ok(())
}

/// BS.1770 loudness measurement of one multichannel program
#[derive(Debug, Clone)]
pub struct LoudnessProcess {
    channels: usize,
    sample_rate: u32,
    gains: ChannelGains,
    upsampling_frequency: u32,
    filters: Vec<ChannelFilter>,
    meters: Vec<TruePeakMeter>,
    momentary: LoudnessAccumulator,
    short_term: LoudnessAccumulator,
    fragment_frames: usize,
    /// Frames already in the current fragment
    fragment_fill: usize,
    /// Gain-weighted sum of squares of the current fragment
    fragment_energy: f64,
    fragments: u64,
    frames: u64,
    sample_peaks: Vec<f32>,
    true_peak_values: Vec<f32>,
}

impl LoudnessProcess {
    /// Create a process with the BS.1770 channel weights
    ///
    /// # Errors
    /// Returns error if the sample rate is outside 8000..=384000 Hz or the
    /// channel count outside 1..=5
    pub fn new(channels: usize, sample_rate: u32) -> Result<Self> {
        Self::with_channel_gains(channels, sample_rate, ChannelGains::default())
    }

    /// Create a process with custom channel weights
    pub fn with_channel_gains(channels: usize, sample_rate: u32, gains: ChannelGains) -> Result<Self> {
        validate(channels, sample_rate)?;
        let mut process = Self {
            channels,
            sample_rate,
            gains,
            upsampling_frequency: DEFAULT_UPSAMPLING_FREQUENCY,
            filters: Vec::new(),
            meters: Vec::new(),
            momentary: LoudnessAccumulator::new(MOMENTARY_FRAGMENTS),
            short_term: LoudnessAccumulator::new(SHORT_TERM_FRAGMENTS),
            fragment_frames: 0,
            fragment_fill: 0,
            fragment_energy: 0.0,
            fragments: 0,
            frames: 0,
            sample_peaks: Vec::new(),
            true_peak_values: Vec::new(),
        };
        process.configure();
        Ok(process)
    }

    /// Rebuild per-channel state for the current configuration
    fn configure(&mut self) {
        self.filters = (0..self.channels)
            .map(|_| ChannelFilter::new(self.sample_rate))
            .collect();
        self.meters = (0..self.channels)
            .map(|_| TruePeakMeter::with_upsampling_frequency(self.sample_rate, self.upsampling_frequency))
            .collect();
        self.fragment_frames = (self.sample_rate / FRAGMENTS_PER_SECOND) as usize;
        self.reset();
    }

    /// Reconfigure for a new stream layout and clear all state
    pub fn init(&mut self, channels: usize, sample_rate: u32) -> Result<()> {
        validate(channels, sample_rate)?;
        self.channels = channels;
        self.sample_rate = sample_rate;
        self.configure();
        debug!(channels, sample_rate, "Loudness process initialized");
        Ok(())
    }

    /// Clear all measurement state, keeping the configuration
    pub fn reset(&mut self) {
        self.filters.iter_mut().for_each(ChannelFilter::reset);
        self.meters.iter_mut().for_each(TruePeakMeter::reset);
        self.momentary.reset();
        self.short_term.reset();
        self.fragment_fill = 0;
        self.fragment_energy = 0.0;
        self.fragments = 0;
        self.frames = 0;
        self.sample_peaks = vec![0.0; self.channels];
        self.true_peak_values.clear();
    }

    /// Change the true-peak upsampling frequency
    ///
    /// Interpolation state restarts; peaks measured so far are kept.
    pub fn set_upsampling_frequency_for_true_peak(&mut self, frequency: u32) {
        self.upsampling_frequency = frequency;
        self.meters
            .iter_mut()
            .for_each(|meter| meter.set_upsampling_frequency(frequency));
        debug!(frequency, "True-peak upsampling frequency changed");
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel weights
    pub fn channel_gains(&self) -> &ChannelGains {
        &self.gains
    }

    /// Frames per 100 ms fragment
    pub fn fragment_frames(&self) -> usize {
        self.fragment_frames
    }

    /// Measure one planar buffer
    ///
    /// `input` holds one slice per channel, all of the same length.
    pub fn process<S: AsRef<[f32]>>(&mut self, input: &[S]) -> Result<()> {
        if input.len() != self.channels {
            return Err(LoudnessError::InvalidBuffer(format!(
                "expected {} channel planes, got {}",
                self.channels,
                input.len()
            )));
        }
        let len = input.first().map_or(0, |plane| plane.as_ref().len());
        if let Some(index) = input.iter().position(|plane| plane.as_ref().len() != len) {
            return Err(LoudnessError::InvalidBuffer(format!(
                "channel {} has {} frames, channel 0 has {}",
                index,
                input[index].as_ref().len(),
                len
            )));
        }

        let mut offset = 0;
        while offset < len {
            let take = (self.fragment_frames - self.fragment_fill).min(len - offset);
            for (channel, plane) in input.iter().enumerate() {
                let samples = &plane.as_ref()[offset..offset + take];
                let energy = self.filters[channel].sum_of_squares(samples);
                self.fragment_energy += f64::from(self.gains.gain(channel)) * energy;
                self.meters[channel].process(samples);

                let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
                self.sample_peaks[channel] = self.sample_peaks[channel].max(peak);
            }

            offset += take;
            self.fragment_fill += take;
            if self.fragment_fill == self.fragment_frames {
                self.complete_fragment();
            }
        }
        self.frames += len as u64;
        Ok(())
    }

    fn complete_fragment(&mut self) {
        let power = self.fragment_energy / self.fragment_frames as f64;
        self.momentary.push_fragment(power);
        self.short_term.push_fragment(power);
        self.fragment_energy = 0.0;
        self.fragment_fill = 0;
        self.fragments += 1;

        if self.fragments % TRUE_PEAK_PERIOD_FRAGMENTS as u64 == 0 {
            let window_peak = self
                .meters
                .iter_mut()
                .map(TruePeakMeter::take_window_peak)
                .fold(0.0_f32, f32::max);
            self.true_peak_values.push(amplitude_to_db(window_peak));
        }
    }

    /// Loudness of the latest momentary block
    pub fn momentary_loudness(&self) -> Option<f32> {
        self.momentary.loudness()
    }

    /// Quietest momentary block above the absolute threshold
    pub fn momentary_min(&self) -> Option<f32> {
        self.momentary.min_loudness()
    }

    /// Loudest momentary block
    pub fn momentary_max(&self) -> Option<f32> {
        self.momentary.max_loudness()
    }

    /// Loudness of the latest short-term block
    pub fn short_term_loudness(&self) -> Option<f32> {
        self.short_term.loudness()
    }

    /// Quietest short-term block above the absolute threshold
    pub fn short_term_min(&self) -> Option<f32> {
        self.short_term.min_loudness()
    }

    /// Loudest short-term block
    pub fn short_term_max(&self) -> Option<f32> {
        self.short_term.max_loudness()
    }

    /// Integrated loudness and its relative threshold
    ///
    /// # Errors
    /// `InsufficientData` before the first momentary block,
    /// `BelowAbsoluteThreshold` when every block is quieter than -70 LUFS
    pub fn integrated(&self) -> Result<GatedLoudness> {
        self.momentary.integrate()
    }

    /// Integrated loudness (LUFS)
    pub fn integrated_loudness(&self) -> Result<f32> {
        self.integrated().map(|gated| gated.loudness)
    }

    /// Relative gating threshold of the integrated loudness (LUFS)
    pub fn integrated_threshold(&self) -> Result<f32> {
        self.integrated().map(|gated| gated.threshold)
    }

    /// Loudness range bounds over the short-term blocks
    pub fn range(&self) -> Result<LoudnessRange> {
        self.short_term.range()
    }

    /// Loudness range (LU)
    pub fn loudness_range(&self) -> Result<f32> {
        self.range().map(|range| range.width())
    }

    /// True peak across all channels (linear)
    pub fn true_peak(&self) -> f32 {
        self.meters.iter().map(TruePeakMeter::peak).fold(0.0, f32::max)
    }

    /// True peak across all channels (dBTP)
    pub fn true_peak_db(&self) -> f32 {
        amplitude_to_db(self.true_peak())
    }

    /// True peak per channel (linear)
    pub fn channel_true_peaks(&self) -> Vec<f32> {
        self.meters.iter().map(TruePeakMeter::peak).collect()
    }

    /// True peak of every completed 3 s window (dBTP)
    pub fn true_peak_values(&self) -> &[f32] {
        &self.true_peak_values
    }

    /// Largest absolute raw sample (linear)
    pub fn sample_peak(&self) -> f32 {
        self.sample_peaks.iter().copied().fold(0.0, f32::max)
    }

    /// Largest absolute raw sample (dBFS)
    pub fn sample_peak_db(&self) -> f32 {
        amplitude_to_db(self.sample_peak())
    }

    /// Every short-term block loudness, 10 per second
    pub fn short_term_values(&self) -> &[f32] {
        self.short_term.temporal_values()
    }

    /// Every momentary block loudness, 10 per second
    pub fn momentary_values(&self) -> &[f32] {
        self.momentary.temporal_values()
    }

    /// Histogram of the short-term blocks
    pub fn short_term_histogram(&self) -> &LoudnessHistogram {
        self.short_term.histogram()
    }

    /// Histogram of the momentary blocks
    pub fn momentary_histogram(&self) -> &LoudnessHistogram {
        self.momentary.histogram()
    }

    /// Frames processed since the last reset
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Duration processed since the last reset
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate)
    }

    /// Snapshot with the correction gain for the EBU R128 levels
    pub fn result(&self) -> MeasurementResult {
        self.result_with_levels(&LoudnessLevels::default(), false)
    }

    /// Snapshot with the correction gain for `levels`
    pub fn result_with_levels(&self, levels: &LoudnessLevels, limit_to_true_peak: bool) -> MeasurementResult {
        MeasurementResult::from_process(self, levels, limit_to_true_peak)
    }
}
