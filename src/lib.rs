//! # edgequake-pdftext
//!
//! Reconstruct reading-order text from positioned text runs.
//!
//! ## Why this crate?
//!
//! A document parser hands back text as runs: fragments with an (x, y)
//! position and a font, in whatever order the content stream drew them.
//! Concatenating them in that order scrambles anything but the simplest
//! page, and multi-column layouts come out interleaved line by line. This
//! crate groups runs into rows, detects columns from gaps in horizontal
//! coverage, and emits text in the order a person would read it, across
//! many pages at once with shared, bounded caches.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RunSource
//!  │
//!  ├─ 1. Runs     get_runs(page) from the source (CPU-bound, spawn_blocking)
//!  ├─ 2. Fonts    resolve each run's font through the shared font cache
//!  ├─ 3. Order    rows by baseline, columns by x-gaps (Simple | Smart)
//!  ├─ 4. Text     rows joined into pooled scratch buffers
//!  └─ 5. Output   per-page results in request order + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edgequake_pdftext::{extract_document, Document, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let doc = Arc::new(Document::open("runs.json", &config)?);
//!     let output = extract_document(&doc, &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("font cache hit rate: {:.0}%", output.stats.font_cache.hit_rate() * 100.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftext` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdftext = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing an API
//!
//! | Need | Use |
//! |------|-----|
//! | Whole document, one string | [`extract_document`] |
//! | Specific pages, fail on first error | [`extract_batch`] |
//! | Specific pages, keep going past failures | [`extract_batch_partial`] |
//! | Fonts and sizes per segment | [`extract_batch_styled`] |
//! | One page at a time, with progress | [`StreamingExtractor`] |
//! | Random access, bounded memory | [`LazyPageManager`] |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod lazy;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod source;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    extract_batch, extract_batch_partial, extract_batch_styled, extract_document,
    extract_sync, extract_to_file,
};
pub use cache::{CacheStats, LruCache};
pub use cancel::CancellationToken;
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, LayoutConfig, PageSelection, PageSeparator,
};
pub use document::Document;
pub use error::{PageError, PdfTextError};
pub use lazy::{LazyPageManager, PageManagerStats};
pub use output::{
    ExtractedPage, ExtractionOutput, ExtractionStats, PageResult, RowGroup, StreamedPage,
    StyledPage, StyledSegment,
};
pub use pipeline::order::OrderingMode;
pub use pipeline::page::{extract_page, extract_page_rows, extract_page_styled};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{MemorySource, RunSource, TextRun};
pub use stream::{extract_stream, PageStream, StreamState, StreamingExtractor};
