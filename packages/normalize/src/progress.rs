//! Progress reporting for batch normalization.
//!
//! The pipeline only reports counts; rendering lives in the binary that
//! chooses a backend (an `indicatif` bar, log lines, or nothing).

use std::sync::Arc;

/// Receives batch progress. Called from rayon worker threads, so
/// implementations must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of inputs in the batch.
    fn set_total(&self, total: u64);

    /// One or more inputs finished.
    fn inc(&self, delta: u64);

    fn set_message(&self, msg: String);

    /// The batch is done.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
