use serde::Serialize;
use std::{
    fmt,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};
use tracing::{debug, info};

/// Stages of a single data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStage {
    Counting,
    SingleFetch,
    BatchFetching,
    Assembling,
    Done,
    Failed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Counting => "Counting",
            ProgressStage::SingleFetch => "SingleFetch",
            ProgressStage::BatchFetching => "BatchFetching",
            ProgressStage::Assembling => "Assembling",
            ProgressStage::Done => "Done",
            ProgressStage::Failed => "Failed",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports window completion for one request.
///
/// Verbose reporters log at `info`; quiet ones only at `debug`. Reporting
/// never feeds back into how windows are fetched or ordered.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    verbose: bool,
    total_windows: AtomicUsize,
    completed: AtomicUsize,
    rows: AtomicU64,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, verbose: bool) -> Self {
        Self {
            label: label.into(),
            verbose,
            total_windows: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            rows: AtomicU64::new(0),
        }
    }

    pub fn stage(&self, stage: ProgressStage) {
        debug!("{}: {}", self.label, stage);
    }

    pub fn start(&self, total_windows: usize) {
        self.total_windows.store(total_windows, Ordering::Relaxed);
        if self.verbose {
            info!("{}: fetching {} windows", self.label, total_windows);
        }
    }

    /// Records one finished window and returns how many have finished so far.
    pub fn window_done(&self, index: usize, rows: usize) -> usize {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let total_rows = self.rows.fetch_add(rows as u64, Ordering::Relaxed) + rows as u64;
        let total = self.total_windows.load(Ordering::Relaxed);

        if self.verbose {
            info!(
                "{}: window {} done ({}/{} windows, {} rows)",
                self.label, index, done, total, total_rows
            );
        } else {
            debug!("{}: window {} done ({}/{})", self.label, index, done, total);
        }
        done
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_windows_and_rows() {
        let reporter = ProgressReporter::new("Session", false);
        reporter.start(3);
        assert_eq!(reporter.window_done(2, 500), 1);
        assert_eq!(reporter.window_done(0, 1000), 2);
        assert_eq!(reporter.completed(), 2);
        assert_eq!(reporter.rows(), 1500);
    }

    #[test]
    fn stage_names() {
        assert_eq!(ProgressStage::BatchFetching.to_string(), "BatchFetching");
        assert_eq!(ProgressStage::Failed.as_str(), "Failed");
    }
}
