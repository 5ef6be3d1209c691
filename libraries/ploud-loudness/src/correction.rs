//! Analysis driver and single-pass gain correction
//!
//! Correction is open loop: one measurement, one gain, one pass that scales
//! the whole source into a sink while a fresh measurement runs on the scaled
//! samples. Whether to repeat when the result is still out of tolerance is up
//! to the caller.

use crate::error::Result;
use crate::levels::{Compliance, LoudnessLevels};
use crate::process::LoudnessProcess;
use crate::result::MeasurementResult;
use crate::source::{FragmentSink, FragmentSource, PlanarBuffer};
use serde::Serialize;
use tracing::{debug, info};

/// Gains closer to unity than this are not applied
pub const CORRECTION_EPSILON: f32 = 0.001;

fn fragment_budget(frames: u64, max_frames: Option<u64>, fragment: usize) -> usize {
    match max_frames {
        Some(limit) => limit.saturating_sub(frames).min(fragment as u64) as usize,
        None => fragment,
    }
}

/// Feed `source` through `process` until the end of the stream
///
/// `max_frames` stops the analysis early. The process is reinitialized if
/// its layout differs from the source's. Returns the frames analysed.
pub fn analyse<S: FragmentSource + ?Sized>(
    source: &mut S,
    process: &mut LoudnessProcess,
    max_frames: Option<u64>,
) -> Result<u64> {
    if process.channels() != source.channels() || process.sample_rate() != source.sample_rate() {
        process.init(source.channels(), source.sample_rate())?;
    }

    let fragment = process.fragment_frames();
    let mut buffer = PlanarBuffer::new(source.channels(), fragment);
    let mut frames = 0_u64;
    debug!(
        channels = source.channels(),
        sample_rate = source.sample_rate(),
        ?max_frames,
        "Analysis started"
    );

    loop {
        let wanted = fragment_budget(frames, max_frames, fragment);
        if wanted == 0 {
            break;
        }
        let read = source.read(&mut buffer, wanted)?;
        if read == 0 {
            break;
        }
        process.process(buffer.planes())?;
        frames += read as u64;
    }

    info!(
        frames,
        duration_seconds = process.duration_seconds(),
        integrated = ?process.integrated_loudness().ok(),
        true_peak_dbtp = process.true_peak_db(),
        "Analysis complete"
    );
    Ok(frames)
}

/// Result of a correction pass
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionOutcome {
    /// Linear gain that was applied
    pub gain: f32,
    /// Frames written to the sink
    pub frames: u64,
    /// Measurement of the corrected audio
    pub result: MeasurementResult,
    /// Compliance of the corrected audio
    pub compliance: Compliance,
}

/// Gain correction against a set of loudness levels
#[derive(Debug, Clone)]
pub struct Corrector {
    levels: LoudnessLevels,
    limit_to_true_peak: bool,
    max_frames: Option<u64>,
}

impl Corrector {
    /// Correct towards `levels`, without true-peak limiting
    pub fn new(levels: LoudnessLevels) -> Self {
        Self {
            levels,
            limit_to_true_peak: false,
            max_frames: None,
        }
    }

    /// Reduce the gain so the corrected true peak stays below the ceiling
    pub fn with_true_peak_limit(mut self, limit: bool) -> Self {
        self.limit_to_true_peak = limit;
        self
    }

    /// Stop every pass after `max_frames` frames
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn levels(&self) -> &LoudnessLevels {
        &self.levels
    }

    /// Snapshot of `process` against these levels
    pub fn measure(&self, process: &LoudnessProcess) -> MeasurementResult {
        process.result_with_levels(&self.levels, self.limit_to_true_peak)
    }

    /// Linear gain for a measured process; unity if loudness is undefined
    pub fn gain_for(&self, process: &LoudnessProcess) -> f32 {
        self.levels.correction_gain(
            process.integrated_loudness().ok(),
            process.true_peak_db(),
            self.limit_to_true_peak,
        )
    }

    /// Whether a gain differs enough from unity to be applied
    pub fn needs_correction(&self, gain: f32) -> bool {
        (1.0 - gain).abs() > CORRECTION_EPSILON
    }

    /// Rewind `source`, scale it by `gain` into `sink` and re-measure
    ///
    /// `process` is reset first and holds the corrected measurement after.
    /// A gain within [`CORRECTION_EPSILON`] of unity runs no pass: `source`,
    /// `sink` and `process` are left untouched and `None` is returned.
    pub fn correct<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        process: &mut LoudnessProcess,
        gain: f32,
    ) -> Result<Option<CorrectionOutcome>>
    where
        S: FragmentSource + ?Sized,
        K: FragmentSink + ?Sized,
    {
        if !self.needs_correction(gain) {
            debug!(gain, "Gain within epsilon of unity, correction skipped");
            return Ok(None);
        }

        source.rewind()?;
        if process.channels() != source.channels() || process.sample_rate() != source.sample_rate() {
            process.init(source.channels(), source.sample_rate())?;
        } else {
            process.reset();
        }
        info!(gain, gain_db = crate::linear_to_db(gain), "Correction started");

        let fragment = process.fragment_frames();
        let mut buffer = PlanarBuffer::new(source.channels(), fragment);
        let mut frames = 0_u64;
        loop {
            let wanted = fragment_budget(frames, self.max_frames, fragment);
            if wanted == 0 {
                break;
            }
            let read = source.read(&mut buffer, wanted)?;
            if read == 0 {
                break;
            }
            buffer.apply_gain(gain);
            sink.write(&buffer)?;
            process.process(buffer.planes())?;
            frames += read as u64;
        }
        sink.finish()?;

        let result = self.measure(process);
        let compliance = self.levels.assess(&result);
        info!(
            frames,
            integrated = ?result.integrated_loudness,
            true_peak_dbtp = result.true_peak_dbtp,
            ?compliance,
            "Correction complete"
        );

        Ok(Some(CorrectionOutcome {
            gain,
            frames,
            result,
            compliance,
        }))
    }
}
