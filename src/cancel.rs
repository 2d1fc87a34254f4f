//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is a shared flag. Cloning it shares the flag, so
//! the caller keeps one clone and hands another to the pipeline through
//! [`crate::ExtractionConfig`]. Workers poll it at explicit checkpoints
//! (job-queue pop, before each page, between font resolutions); a page that
//! is already being extracted runs to completion or to its next checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
