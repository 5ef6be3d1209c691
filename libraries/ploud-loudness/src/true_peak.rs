//! True-peak meter (ITU-R BS.1770 Annex 2)
//!
//! Each channel is upsampled with a polyphase FIR interpolator and the
//! largest absolute interpolated value is tracked. The raw samples are
//! part of the comparison too, so the reported true peak can never be
//! lower than the sample peak.

use crate::amplitude_to_db;
use std::f64::consts::PI;

/// Default upsampling frequency: 4x at 48 kHz
pub const DEFAULT_UPSAMPLING_FREQUENCY: u32 = 192_000;

/// FIR taps per polyphase branch
pub const TAPS_PER_PHASE: usize = 12;

/// BS.1770-4 Annex 2 interpolation filter, 4 phases of 12 taps
const ANNEX2_PHASES: [[f32; TAPS_PER_PHASE]; 4] = [
    [
        0.001_708_984_4,
        0.010_986_328,
        -0.019_653_32,
        0.033_203_125,
        -0.059_448_242,
        0.137_329_1,
        0.972_167_97,
        -0.102_294_92,
        0.047_607_42,
        -0.026_611_328,
        0.014_892_578,
        -0.008_300_781,
    ],
    [
        -0.029_174_805,
        0.029_296_875,
        -0.051_757_812,
        0.089_111_33,
        -0.166_503_9,
        0.465_087_9,
        0.779_785_16,
        -0.200_317_38,
        0.101_562_5,
        -0.058_227_54,
        0.033_081_055,
        -0.018_920_898,
    ],
    [
        -0.018_920_898,
        0.033_081_055,
        -0.058_227_54,
        0.101_562_5,
        -0.200_317_38,
        0.779_785_16,
        0.465_087_9,
        -0.166_503_9,
        0.089_111_33,
        -0.051_757_812,
        0.029_296_875,
        -0.029_174_805,
    ],
    [
        -0.008_300_781,
        0.014_892_578,
        -0.026_611_328,
        0.047_607_42,
        -0.102_294_92,
        0.972_167_97,
        0.137_329_1,
        -0.059_448_242,
        0.033_203_125,
        -0.019_653_32,
        0.010_986_328,
        0.001_708_984_4,
    ],
];

/// Oversampling factor for a sample rate and a target upsampling frequency
///
/// Rounded to the nearest integer, never below 1 (no interpolation).
pub fn oversampling_factor(sample_rate: u32, upsampling_frequency: u32) -> usize {
    let ratio = f64::from(upsampling_frequency) / f64::from(sample_rate.max(1));
    (ratio.round() as usize).max(1)
}

/// Polyphase branches for an oversampling factor
///
/// Factor 4 uses the Annex 2 reference table. Other factors use a
/// Hann-windowed sinc with the same number of taps per phase.
fn interpolation_phases(factor: usize) -> Vec<[f32; TAPS_PER_PHASE]> {
    match factor {
        1 => Vec::new(),
        4 => ANNEX2_PHASES.to_vec(),
        _ => {
            let taps = TAPS_PER_PHASE * factor;
            let center = (taps - 1) as f64 / 2.0;
            let mut phases = vec![[0.0_f32; TAPS_PER_PHASE]; factor];
            for j in 0..taps {
                let m = j as f64 - center;
                let x = PI * m / factor as f64;
                let sinc = if m.abs() < 1e-9 { 1.0 } else { x.sin() / x };
                let window = 0.5 * (1.0 - (2.0 * PI * j as f64 / (taps - 1) as f64).cos());
                phases[j % factor][j / factor] = (sinc * window) as f32;
            }
            phases
        }
    }
}

/// Per-channel true-peak meter
#[derive(Debug, Clone)]
pub struct TruePeakMeter {
    sample_rate: u32,
    upsampling_frequency: u32,
    phases: Vec<[f32; TAPS_PER_PHASE]>,
    /// Most recent input first
    history: [f32; TAPS_PER_PHASE],
    /// Maximum over the whole stream (linear)
    peak: f32,
    /// Maximum since the last `take_window_peak` (linear)
    window_peak: f32,
}

impl TruePeakMeter {
    /// Create a meter with the default upsampling frequency
    pub fn new(sample_rate: u32) -> Self {
        Self::with_upsampling_frequency(sample_rate, DEFAULT_UPSAMPLING_FREQUENCY)
    }

    /// Create a meter that interpolates up to `upsampling_frequency`
    pub fn with_upsampling_frequency(sample_rate: u32, upsampling_frequency: u32) -> Self {
        Self {
            sample_rate,
            upsampling_frequency,
            phases: interpolation_phases(oversampling_factor(sample_rate, upsampling_frequency)),
            history: [0.0; TAPS_PER_PHASE],
            peak: 0.0,
            window_peak: 0.0,
        }
    }

    /// Change the upsampling frequency
    ///
    /// The interpolation history is cleared; accumulated peaks are kept.
    pub fn set_upsampling_frequency(&mut self, upsampling_frequency: u32) {
        self.upsampling_frequency = upsampling_frequency;
        self.phases = interpolation_phases(self.factor());
        self.history = [0.0; TAPS_PER_PHASE];
    }

    /// Upsampling frequency in Hz
    pub fn upsampling_frequency(&self) -> u32 {
        self.upsampling_frequency
    }

    /// Effective oversampling factor
    pub fn factor(&self) -> usize {
        oversampling_factor(self.sample_rate, self.upsampling_frequency)
    }

    #[inline]
    fn push(&mut self, x: f32) -> f32 {
        self.history.copy_within(0..TAPS_PER_PHASE - 1, 1);
        self.history[0] = x;

        let mut peak = x.abs();
        for phase in &self.phases {
            let y: f32 = phase
                .iter()
                .zip(self.history.iter())
                .map(|(c, s)| c * s)
                .sum();
            peak = peak.max(y.abs());
        }
        peak
    }

    /// Run one fragment of raw samples through the interpolator
    ///
    /// Returns the largest absolute interpolated value within the fragment.
    pub fn process(&mut self, samples: &[f32]) -> f32 {
        let mut fragment_peak = 0.0_f32;
        for &x in samples {
            fragment_peak = fragment_peak.max(self.push(x));
        }
        self.peak = self.peak.max(fragment_peak);
        self.window_peak = self.window_peak.max(fragment_peak);
        fragment_peak
    }

    /// True peak over the whole stream (linear amplitude)
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// True peak over the whole stream in dBTP
    pub fn peak_db(&self) -> f32 {
        amplitude_to_db(self.peak)
    }

    /// Peak since the previous call, then start a new reporting window
    pub fn take_window_peak(&mut self) -> f32 {
        std::mem::take(&mut self.window_peak)
    }

    /// Clear interpolation history and all peaks
    pub fn reset(&mut self) {
        self.history = [0.0; TAPS_PER_PHASE];
        self.peak = 0.0;
        self.window_peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FLOOR_DB;

    fn sine(sample_rate: u32, frequency: f32, phase: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t + phase).sin()
            })
            .collect()
    }

    #[test]
    fn test_oversampling_factor() {
        assert_eq!(oversampling_factor(48_000, 192_000), 4);
        assert_eq!(oversampling_factor(44_100, 192_000), 4);
        assert_eq!(oversampling_factor(96_000, 192_000), 2);
        assert_eq!(oversampling_factor(192_000, 192_000), 1);
        assert_eq!(oversampling_factor(48_000, 8_000), 1);
    }

    #[test]
    fn test_annex2_phases_have_unity_gain() {
        for phase in ANNEX2_PHASES {
            let dc: f32 = phase.iter().sum();
            assert!((dc - 1.0).abs() < 0.03, "phase DC gain {}", dc);
        }
    }

    #[test]
    fn test_windowed_sinc_phases_have_near_unity_gain() {
        for factor in [2, 3, 8] {
            for phase in interpolation_phases(factor) {
                let dc: f32 = phase.iter().sum();
                assert!((dc - 1.0).abs() < 0.01, "factor {} DC gain {}", factor, dc);
            }
        }
    }

    #[test]
    fn test_inter_sample_peak_is_recovered() {
        // fs/4 sine at 45 degrees: every sample sits at +-0.707, the waveform reaches 1.0
        let samples = sine(48_000, 12_000.0, std::f32::consts::FRAC_PI_4, 1.0, 4800);
        let sample_peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(sample_peak < 0.72);

        let mut meter = TruePeakMeter::new(48_000);
        meter.process(&samples);
        assert!(meter.peak() > 0.9, "true peak {}", meter.peak());
        assert!(meter.peak() < 1.1, "true peak {}", meter.peak());
    }

    #[test]
    fn test_low_frequency_sine_matches_amplitude() {
        let samples = sine(48_000, 997.0, 0.0, 0.5, 48_000);
        let mut meter = TruePeakMeter::new(48_000);
        meter.process(&samples);
        assert!((meter.peak() - 0.5).abs() < 0.01, "true peak {}", meter.peak());
    }

    #[test]
    fn test_impulse_never_underestimated() {
        let mut samples = vec![0.0_f32; 256];
        samples[100] = 1.0;
        let mut meter = TruePeakMeter::new(48_000);
        let fragment_peak = meter.process(&samples);
        assert!(fragment_peak >= 1.0);
        assert!(meter.peak() >= 1.0);
    }

    #[test]
    fn test_silence_reports_floor() {
        let mut meter = TruePeakMeter::new(48_000);
        meter.process(&[0.0; 480]);
        assert_eq!(meter.peak(), 0.0);
        assert_eq!(meter.peak_db(), FLOOR_DB);
    }

    #[test]
    fn test_window_peak_is_taken_once() {
        let mut meter = TruePeakMeter::new(48_000);
        meter.process(&[0.25, -0.5, 0.1]);
        assert!(meter.take_window_peak() >= 0.5);
        assert_eq!(meter.take_window_peak(), 0.0);
        // Program peak survives the window reset
        assert!(meter.peak() >= 0.5);
    }

    #[test]
    fn test_changing_upsampling_frequency() {
        let mut meter = TruePeakMeter::new(48_000);
        assert_eq!(meter.factor(), 4);
        meter.set_upsampling_frequency(96_000);
        assert_eq!(meter.factor(), 2);
        assert_eq!(meter.upsampling_frequency(), 96_000);
        meter.set_upsampling_frequency(48_000);
        assert_eq!(meter.factor(), 1);

        // Without interpolation the meter degrades to a sample-peak meter
        let samples = sine(48_000, 12_000.0, std::f32::consts::FRAC_PI_4, 1.0, 480);
        meter.process(&samples);
        assert!(meter.peak() < 0.72);
    }

    #[test]
    fn test_reset() {
        let mut meter = TruePeakMeter::new(44_100);
        meter.process(&[0.9; 32]);
        meter.reset();
        assert_eq!(meter.peak(), 0.0);
        assert_eq!(meter.process(&[0.0; 32]), 0.0);
    }
}
