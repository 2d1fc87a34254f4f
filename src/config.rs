//! Configuration types for text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker tasks and to log exactly what a
//! run used.
//!
//! # Design choice: builder over constructor
//! Most callers touch two or three knobs. The builder lets them set only
//! those and rely on documented defaults for the rest.

use crate::cache::DEFAULT_FONT_CACHE_CAPACITY;
use crate::cancel::CancellationToken;
use crate::error::PdfTextError;
use crate::pipeline::order::OrderingMode;
use crate::pool::{DEFAULT_BUFFER_CAPACITY, DEFAULT_POOL_SIZE};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of decoded pages a [`crate::LazyPageManager`] keeps resident.
pub const DEFAULT_RESIDENT_PAGES: usize = 16;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdftext::{ExtractionConfig, OrderingMode};
///
/// let config = ExtractionConfig::builder()
///     .workers(4)
///     .ordering(OrderingMode::Smart)
///     .font_cache_capacity(128)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Worker count for batch extraction. `0` derives it from available
    /// parallelism. Never more workers than requested pages. Default: 0.
    pub workers: usize,

    /// Reading-order algorithm. Default: [`OrderingMode::Smart`].
    pub ordering: OrderingMode,

    /// Shared cancellation flag, polled between jobs and inside page
    /// extraction.
    pub cancellation: CancellationToken,

    /// Object cache capacity. `None` sizes it per batch from the requested
    /// page count (see [`crate::cache::object_cache_capacity`]); `Some(0)`
    /// means unbounded.
    pub object_cache_capacity: Option<usize>,

    /// Font cache capacity; `0` means unbounded. Default: 256.
    pub font_cache_capacity: usize,

    /// Pages kept resident by the lazy page manager. Default: 16.
    pub max_resident_pages: usize,

    /// Idle scratch buffers retained by the buffer pool. Default: 32.
    pub buffer_pool_size: usize,

    /// Initial capacity of a fresh scratch buffer, in bytes. Default: 4096.
    pub buffer_capacity: usize,

    /// Inserted between rows of one page. Default: `"\n"`.
    pub row_separator: String,

    /// Layout-analysis thresholds.
    pub layout: LayoutConfig,

    /// Page selection used by [`crate::extract_document`]. Default: all pages.
    pub pages: PageSelection,

    /// Separator between pages in assembled output. Default: blank line.
    pub page_separator: PageSeparator,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            ordering: OrderingMode::default(),
            cancellation: CancellationToken::new(),
            object_cache_capacity: None,
            font_cache_capacity: DEFAULT_FONT_CACHE_CAPACITY,
            max_resident_pages: DEFAULT_RESIDENT_PAGES,
            buffer_pool_size: DEFAULT_POOL_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            row_separator: "\n".to_string(),
            layout: LayoutConfig::default(),
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("workers", &self.workers)
            .field("ordering", &self.ordering)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("object_cache_capacity", &self.object_cache_capacity)
            .field("font_cache_capacity", &self.font_cache_capacity)
            .field("max_resident_pages", &self.max_resident_pages)
            .field("buffer_pool_size", &self.buffer_pool_size)
            .field("row_separator", &self.row_separator)
            .field("layout", &self.layout)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Worker count for a batch of `jobs` pages: the configured count, or
    /// available parallelism when unset, never above `jobs`.
    pub fn effective_workers(&self, jobs: usize) -> usize {
        let wanted = if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        };
        wanted.min(jobs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn ordering(mut self, mode: OrderingMode) -> Self {
        self.config.ordering = mode;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = token;
        self
    }

    pub fn object_cache_capacity(mut self, n: usize) -> Self {
        self.config.object_cache_capacity = Some(n);
        self
    }

    pub fn font_cache_capacity(mut self, n: usize) -> Self {
        self.config.font_cache_capacity = n;
        self
    }

    pub fn max_resident_pages(mut self, n: usize) -> Self {
        self.config.max_resident_pages = n.max(1);
        self
    }

    pub fn buffer_pool_size(mut self, n: usize) -> Self {
        self.config.buffer_pool_size = n;
        self
    }

    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer_capacity = bytes;
        self
    }

    pub fn row_separator(mut self, sep: impl Into<String>) -> Self {
        self.config.row_separator = sep.into();
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn column_gap_fraction(mut self, f: f32) -> Self {
        self.config.layout.column_gap_fraction = f.clamp(0.0, 1.0);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PdfTextError> {
        let c = &self.config;
        c.layout.validate()?;
        if c.max_resident_pages == 0 {
            return Err(PdfTextError::InvalidConfig(
                "max_resident_pages must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Layout thresholds ────────────────────────────────────────────────────

/// Thresholds for row grouping and column detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Row tolerance as a fraction of the page's modal font size. Default: 0.5.
    pub row_tolerance_factor: f32,

    /// Lower bound on the row tolerance, in user-space units. Default: 1.0.
    pub min_row_tolerance: f32,

    /// Minimum width of an x-gap, as a fraction of page width, for it to be
    /// treated as a column boundary. Default: 0.05.
    pub column_gap_fraction: f32,

    /// A histogram bin counts as empty when at most this fraction of the
    /// page's runs cover it. Default: 0.05.
    pub near_empty_fraction: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_tolerance_factor: 0.5,
            min_row_tolerance: 1.0,
            column_gap_fraction: 0.05,
            near_empty_fraction: 0.05,
        }
    }
}

impl LayoutConfig {
    fn validate(&self) -> Result<(), PdfTextError> {
        let finite_non_negative = |v: f32| v.is_finite() && v >= 0.0;
        if !finite_non_negative(self.row_tolerance_factor)
            || !finite_non_negative(self.min_row_tolerance)
        {
            return Err(PdfTextError::InvalidConfig(
                "row tolerance parameters must be finite and ≥ 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.column_gap_fraction)
            || !(0.0..=1.0).contains(&self.near_empty_fraction)
        {
            return Err(PdfTextError::InvalidConfig(format!(
                "layout fractions must be within 0–1, got gap={} near_empty={}",
                self.column_gap_fraction, self.near_empty_fraction
            )));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the document to extract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Extract all pages (default).
    #[default]
    All,
    /// Extract a single page (1-indexed).
    Single(usize),
    /// Extract a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Extract specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed
    /// page numbers that exist in a document of `total_pages`.
    pub fn to_page_numbers(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1);
                let e = (*end).min(total_pages);
                (s..=e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// How to separate pages in assembled text output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line between pages: "\n\n". (default)
    #[default]
    None,
    /// Form feed, the traditional plain-text page break: "\n\x0c\n"
    FormFeed,
    /// Marker line with the page number: "--- page N ---"
    Marker,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before page `page_num` (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::FormFeed => "\n\x0c\n".to_string(),
            PageSeparator::Marker => format!("\n\n--- page {} ---\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
