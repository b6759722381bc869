//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch orchestrator works through the discovered files.
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a terminal progress bar, a log file, or a GUI without
//! the library knowing anything about how the host application communicates.
//! The trait is `Send + Sync` so a callback can be shared with other tasks;
//! the orchestrator itself invokes it strictly sequentially.

use crate::batch::FileOutcome;
use crate::config::TargetFormat;
use std::path::Path;

/// Called by the batch orchestrator as it processes each (file, format) pair.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before any conversion starts.
    ///
    /// `total_jobs` is the number of (file, format) pairs that will be
    /// attempted, not the number of files.
    fn on_batch_start(&self, total_jobs: usize) {
        let _ = total_jobs;
    }

    /// Called before each conversion attempt.
    fn on_file_start(&self, source: &Path, format: TargetFormat) {
        let _ = (source, format);
    }

    /// Called after each conversion attempt with its recorded outcome.
    fn on_file_done(&self, outcome: &FileOutcome) {
        let _ = outcome;
    }

    /// Called once after the walk completes, before the result is returned.
    fn on_batch_complete(&self, succeeded: usize, skipped: usize, failed: usize) {
        let _ = (succeeded, skipped, failed);
    }
}
