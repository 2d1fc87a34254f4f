//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch pipeline and the streaming extractor process pages.
//!
//! The trait is `Send + Sync` because batch workers report from several
//! threads at once.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftext::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// In batch mode `on_page_start`, `on_page_complete` and `on_page_error` may
/// be called concurrently from different worker threads and in any page
/// order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any page is extracted.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's runs are requested from the source.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is extracted successfully.
    ///
    /// `text_len` is the byte length of the page's text.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the run stops, whether it finished, failed or was
    /// cancelled.
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
