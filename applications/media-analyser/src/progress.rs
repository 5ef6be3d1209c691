//! Analysis progress reporting
//!
//! Progress goes to the log every ten percent, or to a file that always
//! holds the latest whole percentage.

use ploud_loudness::{FragmentSource, PlanarBuffer, Result};
use std::path::PathBuf;
use tracing::info;

/// Source wrapper counting delivered frames against an expected total
pub struct ProgressSource<S> {
    inner: S,
    total: Option<u64>,
    done: u64,
    last_percent: Option<u32>,
    file: Option<PathBuf>,
}

impl<S: FragmentSource> ProgressSource<S> {
    /// Without a `total` nothing is reported
    pub fn new(inner: S, total: Option<u64>, file: Option<PathBuf>) -> Self {
        Self {
            inner,
            total,
            done: 0,
            last_percent: None,
            file,
        }
    }

    /// Whole percentage done, if the total is known
    pub fn percent(&self) -> Option<u32> {
        match self.total {
            Some(0) => Some(100),
            Some(total) => Some((self.done.saturating_mul(100) / total).min(100) as u32),
            None => None,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn report(&mut self) -> Result<()> {
        let Some(percent) = self.percent() else {
            return Ok(());
        };
        if self.last_percent == Some(percent) {
            return Ok(());
        }
        let previous = self.last_percent.replace(percent);

        match &self.file {
            Some(path) => std::fs::write(path, percent.to_string())?,
            None => {
                if previous.map_or(true, |p| p / 10 != percent / 10) {
                    info!(percent, "Progress");
                }
            }
        }
        Ok(())
    }
}

impl<S: FragmentSource> FragmentSource for ProgressSource<S> {
    fn channels(&self) -> usize {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn read(&mut self, buffer: &mut PlanarBuffer, max_frames: usize) -> Result<usize> {
        let frames = self.inner.read(buffer, max_frames)?;
        self.done += frames as u64;
        self.report()?;
        Ok(frames)
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()?;
        self.done = 0;
        self.last_percent = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ploud_loudness::MemorySource;

    fn source(frames: usize) -> MemorySource {
        MemorySource::new(8_000, vec![vec![0.0; frames]]).unwrap()
    }

    #[test]
    fn test_percent_follows_reads() {
        let mut progress = ProgressSource::new(source(1_000), Some(1_000), None);
        let mut buffer = PlanarBuffer::default();
        assert_eq!(progress.percent(), Some(0));
        progress.read(&mut buffer, 250).unwrap();
        assert_eq!(progress.percent(), Some(25));
        while progress.read(&mut buffer, 300).unwrap() > 0 {}
        assert_eq!(progress.percent(), Some(100));

        progress.rewind().unwrap();
        assert_eq!(progress.percent(), Some(0));
    }

    #[test]
    fn test_unknown_total_reports_nothing() {
        let progress = ProgressSource::new(source(10), None, None);
        assert_eq!(progress.percent(), None);
    }

    #[test]
    fn test_progress_file_holds_latest_percent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress");
        let mut progress = ProgressSource::new(source(400), Some(400), Some(path.clone()));
        let mut buffer = PlanarBuffer::default();

        progress.read(&mut buffer, 100).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "25");
        while progress.read(&mut buffer, 100).unwrap() > 0 {}
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "100");
    }
}
