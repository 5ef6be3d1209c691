//! Sliding-window loudness accumulator with two-stage gating
//!
//! One instance per window length: 4 fragments (400 ms, momentary) and 30
//! fragments (3 s, short-term). Every new fragment slides the window by
//! one fragment, so consecutive blocks overlap.

use crate::error::{LoudnessError, Result};
use crate::histogram::{LoudnessHistogram, Scan};
use crate::power_to_loudness;

/// Absolute gating threshold (LUFS)
pub const ABSOLUTE_THRESHOLD_LUFS: f32 = -70.0;

/// Relative gate below the absolute-gated mean for integrated loudness (LU)
pub const INTEGRATION_RELATIVE_GATE_LU: f32 = -10.0;

/// Relative gate below the absolute-gated mean for loudness range (LU)
pub const RANGE_RELATIVE_GATE_LU: f32 = -20.0;

/// Lower percentile of the loudness range distribution
pub const RANGE_LOW_PERCENTILE: f32 = 0.10;

/// Upper percentile of the loudness range distribution
pub const RANGE_HIGH_PERCENTILE: f32 = 0.95;

/// Where the accumulator stands after the last fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// The window is not full yet, or no fragment arrived
    Accumulating,
    /// The last fragment completed a block
    BlockReady,
}

/// Result of two-stage gating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedLoudness {
    /// Mean loudness of the blocks above the relative threshold (LUFS)
    pub loudness: f32,
    /// Relative gating threshold (LUFS)
    pub threshold: f32,
}

/// Loudness range bounds (EBU Tech 3342)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessRange {
    /// 10th percentile of the gated short-term distribution (LUFS)
    pub low: f32,
    /// 95th percentile of the gated short-term distribution (LUFS)
    pub high: f32,
    /// Relative gating threshold (LUFS)
    pub threshold: f32,
}

impl LoudnessRange {
    /// Loudness range in LU
    pub fn width(&self) -> f32 {
        (self.high - self.low).max(0.0)
    }
}

/// Gated mean-square power over a sliding window
#[derive(Debug, Clone)]
pub struct LoudnessAccumulator {
    window: usize,
    /// Fragment powers, oldest overwritten first
    ring: Vec<f64>,
    cursor: usize,
    filled: usize,
    state: AccumulatorState,
    loudness: Option<f32>,
    min: Option<f32>,
    max: Option<f32>,
    blocks: u64,
    histogram: LoudnessHistogram,
    values: Vec<f32>,
}

impl LoudnessAccumulator {
    /// Create an accumulator whose blocks span `window_fragments` fragments
    pub fn new(window_fragments: usize) -> Self {
        let window = window_fragments.max(1);
        Self {
            window,
            ring: vec![0.0; window],
            cursor: 0,
            filled: 0,
            state: AccumulatorState::Accumulating,
            loudness: None,
            min: None,
            max: None,
            blocks: 0,
            histogram: LoudnessHistogram::new(),
            values: Vec::new(),
        }
    }

    /// Block length in fragments
    pub fn window_fragments(&self) -> usize {
        self.window
    }

    /// Add the mean-square power of one fragment
    ///
    /// Returns the loudness of the block this fragment completes, if any.
    pub fn push_fragment(&mut self, power: f64) -> Option<f32> {
        self.ring[self.cursor] = power.max(0.0);
        self.cursor = (self.cursor + 1) % self.window;
        self.filled = (self.filled + 1).min(self.window);

        if self.filled < self.window {
            self.state = AccumulatorState::Accumulating;
            return None;
        }

        // Fragments have equal length, so the block mean is the mean of fragment means
        let block_power = self.ring.iter().sum::<f64>() / self.window as f64;
        let loudness = power_to_loudness(block_power);

        self.histogram.add(loudness);
        if loudness >= ABSOLUTE_THRESHOLD_LUFS {
            self.min = Some(self.min.map_or(loudness, |m| m.min(loudness)));
            self.max = Some(self.max.map_or(loudness, |m| m.max(loudness)));
        }
        self.loudness = Some(loudness);
        self.values.push(loudness);
        self.blocks += 1;
        self.state = AccumulatorState::BlockReady;

        Some(loudness)
    }

    /// Current state
    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Loudness of the most recent block
    pub fn loudness(&self) -> Option<f32> {
        self.loudness
    }

    /// Quietest block above the absolute threshold
    pub fn min_loudness(&self) -> Option<f32> {
        self.min
    }

    /// Loudest block above the absolute threshold
    pub fn max_loudness(&self) -> Option<f32> {
        self.max
    }

    /// Number of completed blocks
    pub fn block_count(&self) -> u64 {
        self.blocks
    }

    /// Histogram of block loudness values
    pub fn histogram(&self) -> &LoudnessHistogram {
        &self.histogram
    }

    /// Loudness of every completed block, in order
    pub fn temporal_values(&self) -> &[f32] {
        &self.values
    }

    /// Mean loudness of the blocks above the absolute threshold
    fn absolute_gated_mean(&self) -> Result<f32> {
        if self.blocks == 0 {
            return Err(LoudnessError::InsufficientData);
        }
        self.histogram
            .mean_loudness_from(ABSOLUTE_THRESHOLD_LUFS)
            .ok_or(LoudnessError::BelowAbsoluteThreshold)
    }

    /// Two-stage gated loudness and its relative threshold in one pass
    pub fn integrate(&self) -> Result<GatedLoudness> {
        let threshold = self.absolute_gated_mean()? + INTEGRATION_RELATIVE_GATE_LU;
        let loudness = self
            .histogram
            .mean_loudness_from(threshold.max(ABSOLUTE_THRESHOLD_LUFS))
            .ok_or(LoudnessError::BelowAbsoluteThreshold)?;
        Ok(GatedLoudness {
            loudness,
            threshold,
        })
    }

    /// Loudness range over the relatively gated block population
    pub fn range(&self) -> Result<LoudnessRange> {
        let threshold = self.absolute_gated_mean()? + RANGE_RELATIVE_GATE_LU;
        let floor = threshold.max(ABSOLUTE_THRESHOLD_LUFS);
        let low = self
            .histogram
            .percentile_from(floor, RANGE_LOW_PERCENTILE, Scan::FromBelow)
            .ok_or(LoudnessError::BelowAbsoluteThreshold)?;
        let high = self
            .histogram
            .percentile_from(floor, 1.0 - RANGE_HIGH_PERCENTILE, Scan::FromAbove)
            .ok_or(LoudnessError::BelowAbsoluteThreshold)?;
        Ok(LoudnessRange {
            low,
            high,
            threshold,
        })
    }

    /// Forget every fragment and block
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|p| *p = 0.0);
        self.cursor = 0;
        self.filled = 0;
        self.state = AccumulatorState::Accumulating;
        self.loudness = None;
        self.min = None;
        self.max = None;
        self.blocks = 0;
        self.histogram.reset();
        self.values.clear();
    }
}
