//! Error types for the edgequake-pdftext library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfTextError`]: **Fatal**: the requested operation cannot complete
//!   (a page's runs could not be produced, the caller cancelled, a stream was
//!   read past its end). Returned as `Err(PdfTextError)` from the extraction
//!   entry points.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed while the rest of the
//!   batch is fine. Stored inside [`crate::output::PageResult`] by the
//!   partial-result variants so callers can inspect what succeeded.
//!
//! Every page-level failure carries the offending 1-indexed page number.

use crate::source::ObjectRef;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdftext library.
#[derive(Debug, Error)]
pub enum PdfTextError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// The run source could not produce text runs for a page
    /// (missing page, corrupt content). Never retried by this crate.
    #[error("Page {page}: text runs unavailable: {detail}")]
    SourceUnavailable { page: usize, detail: String },

    /// A font referenced by one of the page's runs could not be resolved.
    #[error("Page {page}: failed to resolve font {font}: {detail}")]
    FontResolution {
        page: usize,
        font: ObjectRef,
        detail: String,
    },

    /// An object the page depends on could not be resolved.
    #[error("Page {page}: failed to resolve object {reference}: {detail}")]
    ObjectResolution {
        page: usize,
        reference: ObjectRef,
        detail: String,
    },

    /// Requested page number is outside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// A run dump could not be read or parsed.
    #[error("Failed to load run source '{path}': {detail}")]
    SourceLoad { path: PathBuf, detail: String },

    // ── Control-flow errors ───────────────────────────────────────────────
    /// Cooperative cancellation was observed.
    #[error("Extraction cancelled{}", page_suffix(.page))]
    Cancelled { page: Option<usize> },

    /// `next()` was called on a streaming extractor that already finished.
    #[error("Stream exhausted: all {total} pages have been emitted")]
    Exhausted { total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (worker task panicked, runtime creation failed).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn page_suffix(page: &Option<usize>) -> String {
    match page {
        Some(p) => format!(" on page {p}"),
        None => String::new(),
    }
}

impl PdfTextError {
    /// The page this error is attributed to, if any.
    pub fn page(&self) -> Option<usize> {
        match self {
            PdfTextError::SourceUnavailable { page, .. }
            | PdfTextError::FontResolution { page, .. }
            | PdfTextError::ObjectResolution { page, .. }
            | PdfTextError::PageOutOfRange { page, .. } => Some(*page),
            PdfTextError::Cancelled { page } => *page,
            _ => None,
        }
    }

    /// Whether this error is a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PdfTextError::Cancelled { .. })
    }

    /// Downgrade to a per-page error for the partial-result APIs.
    pub fn to_page_error(&self, page: usize) -> PageError {
        match self {
            PdfTextError::SourceUnavailable { detail, .. } => PageError::SourceUnavailable {
                page,
                detail: detail.clone(),
            },
            PdfTextError::Cancelled { .. } => PageError::Cancelled { page },
            other => PageError::Resolution {
                page,
                detail: other.to_string(),
            },
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails in the
/// partial-result variants; the other pages of the batch are unaffected.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The run source could not produce runs for this page.
    #[error("Page {page}: text runs unavailable: {detail}")]
    SourceUnavailable { page: usize, detail: String },

    /// Font or object resolution failed.
    #[error("Page {page}: resolution failed: {detail}")]
    Resolution { page: usize, detail: String },

    /// The page was not extracted because the batch was cancelled.
    #[error("Page {page}: cancelled before extraction")]
    Cancelled { page: usize },
}

impl PageError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::SourceUnavailable { page, .. }
            | PageError::Resolution { page, .. }
            | PageError::Cancelled { page } => *page,
        }
    }
}
