//! K-weighting channel filter
//!
//! Two cascaded biquads as defined by ITU-R BS.1770:
//! - Stage 1: high-frequency shelving pre-filter (head acoustics)
//! - Stage 2: RLB high-pass weighting curve
//!
//! The standard publishes coefficients for 48 kHz only. Every other sample
//! rate gets coefficients derived from the analog prototypes through the
//! bilinear transform, so the response matches the standard at any rate.

use std::f64::consts::PI;

/// Sample rate at which the standard publishes its coefficient table
pub const ANCHOR_SAMPLE_RATE: u32 = 48_000;

// Analog prototype of the pre-filter (shelf)
const SHELF_CENTER_HZ: f64 = 1_681.974_450_955_533;
const SHELF_GAIN_DB: f64 = 3.999_843_853_973_347;
const SHELF_Q: f64 = 0.707_175_236_955_419_6;
const SHELF_BANDWIDTH_EXP: f64 = 0.499_666_774_154_541_6;

// Analog prototype of the RLB weighting (high-pass)
const HIGH_PASS_CENTER_HZ: f64 = 38.135_470_876_024_44;
const HIGH_PASS_Q: f64 = 0.500_327_037_323_877_3;

/// Normalized biquad coefficients (a0 == 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pre-filter coefficients published for 48 kHz
    pub const SHELF_48K: Self = Self {
        b0: 1.535_124_859_586_97,
        b1: -2.691_696_189_406_38,
        b2: 1.198_392_810_852_85,
        a1: -1.690_659_293_182_41,
        a2: 0.732_480_774_215_85,
    };

    /// RLB weighting coefficients published for 48 kHz
    pub const HIGH_PASS_48K: Self = Self {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: -1.990_047_454_833_98,
        a2: 0.990_072_250_366_21,
    };

    /// Pre-filter (stage 1) for any sample rate
    pub fn shelf(sample_rate: u32) -> Self {
        if sample_rate == ANCHOR_SAMPLE_RATE {
            Self::SHELF_48K
        } else {
            Self::shelf_bilinear(sample_rate)
        }
    }

    fn shelf_bilinear(sample_rate: u32) -> Self {
        let k = (PI * SHELF_CENTER_HZ / f64::from(sample_rate)).tan();
        let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
        let vb = vh.powf(SHELF_BANDWIDTH_EXP);
        let a0 = 1.0 + k / SHELF_Q + k * k;

        Self {
            b0: (vh + vb * k / SHELF_Q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / SHELF_Q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / SHELF_Q + k * k) / a0,
        }
    }

    /// RLB weighting (stage 2) for any sample rate
    pub fn high_pass(sample_rate: u32) -> Self {
        if sample_rate == ANCHOR_SAMPLE_RATE {
            Self::HIGH_PASS_48K
        } else {
            Self::high_pass_bilinear(sample_rate)
        }
    }

    fn high_pass_bilinear(sample_rate: u32) -> Self {
        let k = (PI * HIGH_PASS_CENTER_HZ / f64::from(sample_rate)).tan();
        let a0 = 1.0 + k / HIGH_PASS_Q + k * k;

        Self {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / HIGH_PASS_Q + k * k) / a0,
        }
    }
}

/// Biquad section in transposed direct form II
#[derive(Debug, Clone)]
struct Biquad {
    coeffs: BiquadCoefficients,
    s1: f64,
    s2: f64,
}

impl Biquad {
    fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            s1: 0.0,
            s2: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.s1;
        self.s1 = c.b1 * x - c.a1 * y + self.s2;
        self.s2 = c.b2 * x - c.a2 * y;
        y
    }

    fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

/// Per-channel K-weighting filter
///
/// State persists across calls; only [`ChannelFilter::reset`] clears it.
/// None of the processing methods allocate.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    shelf: Biquad,
    high_pass: Biquad,
}

impl ChannelFilter {
    /// Create a filter for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shelf: Biquad::new(BiquadCoefficients::shelf(sample_rate)),
            high_pass: Biquad::new(BiquadCoefficients::high_pass(sample_rate)),
        }
    }

    /// Coefficients of both stages (pre-filter, RLB)
    pub fn coefficients(&self) -> (BiquadCoefficients, BiquadCoefficients) {
        (self.shelf.coeffs, self.high_pass.coeffs)
    }

    #[inline]
    fn tick(&mut self, x: f32) -> f64 {
        self.high_pass.tick(self.shelf.tick(f64::from(x)))
    }

    /// Filter `input` into `output`
    ///
    /// Only `min(input.len(), output.len())` samples are processed.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.tick(*x) as f32;
        }
    }

    /// Filter a fragment in place
    pub fn process_in_place(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.tick(*s) as f32;
        }
    }

    /// Filter a fragment and return the sum of the squared weighted samples
    ///
    /// The weighted samples themselves are discarded.
    pub fn sum_of_squares(&mut self, input: &[f32]) -> f64 {
        input
            .iter()
            .map(|&x| {
                let y = self.tick(x);
                y * y
            })
            .sum()
    }

    /// Clear the filter state
    pub fn reset(&mut self) {
        self.shelf.reset();
        self.high_pass.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_at(filter: &mut ChannelFilter, sample_rate: u32, frequency: f32) -> f64 {
        let n = sample_rate as usize * 2;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect();
        // Discard the first second (settling), measure the second one
        filter.sum_of_squares(&input[..n / 2]);
        let out = filter.sum_of_squares(&input[n / 2..]) / (n / 2) as f64;
        let inp: f64 = input[n / 2..].iter().map(|&x| f64::from(x * x)).sum::<f64>() / (n / 2) as f64;
        10.0 * (out / inp).log10()
    }

    fn assert_close(a: BiquadCoefficients, b: BiquadCoefficients) {
        for (x, y) in [(a.b0, b.b0), (a.b1, b.b1), (a.b2, b.b2), (a.a1, b.a1), (a.a2, b.a2)] {
            assert!((x - y).abs() < 1e-5, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_bilinear_matches_anchor_table() {
        assert_close(
            BiquadCoefficients::shelf_bilinear(48_000),
            BiquadCoefficients::SHELF_48K,
        );
        assert_close(
            BiquadCoefficients::high_pass_bilinear(48_000),
            BiquadCoefficients::HIGH_PASS_48K,
        );
    }

    #[test]
    fn test_coefficients_follow_sample_rate() {
        let at_44 = BiquadCoefficients::shelf(44_100);
        let at_48 = BiquadCoefficients::shelf(48_000);
        assert_ne!(at_44, at_48);
        assert_ne!(BiquadCoefficients::high_pass(96_000), BiquadCoefficients::HIGH_PASS_48K);
    }

    #[test]
    fn test_k_weighting_response() {
        // ~0 dB around 1 kHz, about +4 dB high shelf, strong low cut
        for rate in [44_100, 48_000, 96_000] {
            let mut filter = ChannelFilter::new(rate);
            let mid = gain_at(&mut filter, rate, 1000.0);
            assert!(mid.abs() < 1.0, "1 kHz gain at {} Hz: {:.2} dB", rate, mid);

            filter.reset();
            let high = gain_at(&mut filter, rate, 10_000.0);
            assert!((high - 4.0).abs() < 0.5, "10 kHz gain at {} Hz: {:.2} dB", rate, high);

            filter.reset();
            let low = gain_at(&mut filter, rate, 20.0);
            assert!(low < -10.0, "20 Hz gain at {} Hz: {:.2} dB", rate, low);
        }
    }

    #[test]
    fn test_process_variants_agree() {
        let input: Vec<f32> = (0..512).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();

        let mut a = ChannelFilter::new(48_000);
        let mut out = vec![0.0_f32; input.len()];
        a.process(&input, &mut out);

        let mut b = ChannelFilter::new(48_000);
        let mut in_place = input.clone();
        b.process_in_place(&mut in_place);

        assert_eq!(out, in_place);
    }

    #[test]
    fn test_state_persists_across_fragments() {
        let input: Vec<f32> = (0..960).map(|i| (i as f32 * 0.05).sin()).collect();

        let mut whole = ChannelFilter::new(48_000);
        let total = whole.sum_of_squares(&input);

        let mut split = ChannelFilter::new(48_000);
        let parts = split.sum_of_squares(&input[..333]) + split.sum_of_squares(&input[333..]);

        assert!((total - parts).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = ChannelFilter::new(48_000);
        filter.sum_of_squares(&[1.0; 64]);
        filter.reset();
        assert_eq!(filter.sum_of_squares(&[0.0; 64]), 0.0);
    }
}
