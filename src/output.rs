//! Output types returned by the extraction entry points.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::error::PageError;
use crate::pool::PoolStats;

/// Result of extracting one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,

    /// Page text; empty when `error` is set.
    pub text: String,

    /// Wall-clock time spent on this page.
    pub duration_ms: u64,

    /// Set when the page failed in a partial-result run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn ok(page_num: usize, text: String, duration_ms: u64) -> Self {
        Self {
            page_num,
            text,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num: error.page(),
            text: String::new(),
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A run's text with the font it is set in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSegment {
    pub text: String,
    pub font_name: String,
    pub font_size: f32,
}

/// Styled segments of one page, from [`crate::extract_batch_styled`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledPage {
    pub page_num: usize,
    pub segments: Vec<StyledSegment>,
}

/// One step of a [`crate::StreamingExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamedPage {
    pub page_num: usize,
    pub text: String,
    /// `false` on the last page; the next call returns `Exhausted`.
    pub has_more: bool,
}

/// Runs of one row, in reading order, tagged with their column.
///
/// `position_key` (`"{column}:{y:.2}"`) identifies the row within its page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroup {
    pub column: usize,
    pub y: f32,
    pub position_key: String,
    pub segments: Vec<StyledSegment>,
}

impl RowGroup {
    pub fn position_key(column: usize, y: f32) -> String {
        format!("{column}:{y:.2}")
    }

    /// Segment texts concatenated with no separator.
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// A page kept resident by [`crate::LazyPageManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedPage {
    pub page_num: usize,
    pub text: String,
    pub rows: Vec<RowGroup>,
}

/// Aggregate statistics for a document extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages selected for this run.
    pub requested_pages: usize,
    pub extracted_pages: usize,
    pub failed_pages: usize,
    pub total_chars: usize,
    pub total_duration_ms: u64,
    pub workers: usize,
    pub object_cache: CacheStats,
    pub font_cache: CacheStats,
    pub buffers: PoolStats,
}

/// The complete result of [`crate::extract_document`].
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    /// Page texts joined with the configured page separator.
    pub text: String,
    /// Per-page results, sorted by page number.
    pub pages: Vec<PageResult>,
    pub stats: ExtractionStats,
}
