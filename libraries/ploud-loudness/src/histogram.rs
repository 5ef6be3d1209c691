//! Quantized loudness histogram
//!
//! Blocks are counted in 0.1 LU bins between -70 and +10 LUFS. Each bin
//! also keeps the exact power of the blocks it received, so gated means
//! are not affected by the quantization; only percentile queries are.
//! Louder blocks share the highest bin but keep their own power.

use crate::{loudness_to_power, power_to_loudness};

/// Bin width in LU
pub const HISTOGRAM_RESOLUTION_LU: f32 = 0.1;

/// Loudness at the center of the lowest bin
pub const HISTOGRAM_MIN_LUFS: f32 = -70.0;

/// Loudness at the center of the highest bin
pub const HISTOGRAM_MAX_LUFS: f32 = 10.0;

/// Number of bins, -70.0 ..= +10.0 in 0.1 LU steps
pub const HISTOGRAM_BINS: usize = 801;

/// End from which a percentile query accumulates counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Start at the quietest bin
    FromBelow,
    /// Start at the loudest bin
    FromAbove,
}

/// Loudness histogram with 0.1 LU resolution
#[derive(Debug, Clone)]
pub struct LoudnessHistogram {
    counts: Vec<u64>,
    powers: Vec<f64>,
    total: u64,
}

impl Default for LoudnessHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LoudnessHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            counts: vec![0; HISTOGRAM_BINS],
            powers: vec![0.0; HISTOGRAM_BINS],
            total: 0,
        }
    }

    /// Bin index for a loudness value, `None` below the lowest bin
    ///
    /// Values louder than the highest bin land in the highest bin.
    fn bin_index(loudness: f32) -> Option<usize> {
        if loudness.is_nan() || loudness < HISTOGRAM_MIN_LUFS {
            return None;
        }
        let offset = ((loudness - HISTOGRAM_MIN_LUFS) / HISTOGRAM_RESOLUTION_LU).round();
        Some((offset as usize).min(HISTOGRAM_BINS - 1))
    }

    /// First bin whose center is at or above `floor`
    fn first_bin_from(floor: f32) -> usize {
        if floor.is_nan() || floor <= HISTOGRAM_MIN_LUFS {
            return 0;
        }
        let offset = ((floor - HISTOGRAM_MIN_LUFS) / HISTOGRAM_RESOLUTION_LU).round();
        (offset as usize).min(HISTOGRAM_BINS - 1)
    }

    /// Count one block
    ///
    /// Returns `false` when the value is below the histogram range (or NaN)
    /// and was ignored.
    pub fn add(&mut self, loudness: f32) -> bool {
        match Self::bin_index(loudness) {
            Some(index) => {
                self.counts[index] += 1;
                self.powers[index] += loudness_to_power(loudness);
                self.total += 1;
                true
            }
            None => false,
        }
    }

    /// Zero all counts
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.powers.iter_mut().for_each(|p| *p = 0.0);
        self.total = 0;
    }

    /// Total number of counted blocks
    pub fn count(&self) -> u64 {
        self.total
    }

    /// Number of counted blocks at or above `floor`
    pub fn count_from(&self, floor: f32) -> u64 {
        self.counts[Self::first_bin_from(floor)..].iter().sum()
    }

    /// Mean power of the blocks at or above `floor`, `None` if there are none
    pub fn mean_power_from(&self, floor: f32) -> Option<f64> {
        let start = Self::first_bin_from(floor);
        let count: u64 = self.counts[start..].iter().sum();
        if count == 0 {
            return None;
        }
        let power: f64 = self.powers[start..].iter().sum();
        Some(power / count as f64)
    }

    /// Mean loudness (power domain) of the blocks at or above `floor`
    pub fn mean_loudness_from(&self, floor: f32) -> Option<f32> {
        self.mean_power_from(floor).map(power_to_loudness)
    }

    /// Raw bin counts, lowest bin first
    pub fn bins(&self) -> &[u64] {
        &self.counts
    }

    /// Loudness at the center of bin `index`
    pub fn bin_loudness(index: usize) -> f32 {
        HISTOGRAM_MIN_LUFS + index as f32 * HISTOGRAM_RESOLUTION_LU
    }

    /// Non-empty bins as `(loudness, count)` pairs, lowest first
    pub fn occupied_bins(&self) -> Vec<(f32, u64)> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(index, &count)| (Self::bin_loudness(index), count))
            .collect()
    }

    /// Percentile over the whole histogram
    ///
    /// See [`LoudnessHistogram::percentile_from`].
    pub fn percentile(&self, fraction: f32, scan: Scan) -> Option<f32> {
        self.percentile_from(HISTOGRAM_MIN_LUFS, fraction, scan)
    }

    /// Loudness of the bin where the cumulative count, scanned from one end
    /// of the population at or above `floor`, reaches `fraction` of it
    ///
    /// Returns `None` when the population is empty. At least one block is
    /// always accumulated, so a fraction of 0 yields the extreme bin.
    pub fn percentile_from(&self, floor: f32, fraction: f32, scan: Scan) -> Option<f32> {
        let start = Self::first_bin_from(floor);
        let population = &self.counts[start..];
        let total: u64 = population.iter().sum();
        if total == 0 {
            return None;
        }

        let target = (f64::from(fraction.clamp(0.0, 1.0)) * total as f64).max(1.0);
        let mut cumulative = 0_u64;
        let mut crossing = |(offset, &count): (usize, &u64)| {
            cumulative += count;
            (cumulative as f64 >= target).then_some(start + offset)
        };

        let index = match scan {
            Scan::FromBelow => population.iter().enumerate().find_map(&mut crossing),
            Scan::FromAbove => population.iter().enumerate().rev().find_map(&mut crossing),
        };
        index.map(Self::bin_loudness)
    }
}
