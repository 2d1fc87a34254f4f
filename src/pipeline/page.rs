//! Single-page extraction: fetch runs, resolve fonts, order, assemble.
//!
//! These functions are synchronous and CPU-bound. The batch and streaming
//! layers call them from `spawn_blocking`.
//!
//! Per page: runs are fetched, the page's resource objects resolved through
//! the shared object cache, then each run's font through the font cache.
//!
//! Cancellation is polled before the source is asked for runs and between
//! font resolutions, so a cancelled batch stops mid-page rather than after
//! it.

use std::time::Instant;

use tracing::{debug, trace};

use crate::config::ExtractionConfig;
use crate::document::Document;
use crate::error::PdfTextError;
use crate::output::{ExtractedPage, RowGroup, StyledSegment};
use crate::pipeline::order::{order_page, OrderedPage};
use crate::source::TextRun;

/// Extract one page as plain text.
///
/// Runs within a row are concatenated with no separator; rows are joined
/// with `config.row_separator`.
pub fn extract_page(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<String, PdfTextError> {
    let start = Instant::now();
    let ordered = ordered_page(doc, page_num, config)?;
    let text = render_text(doc, &ordered, &config.row_separator);
    debug!(
        "Page {}: {} rows, {} chars in {}ms",
        page_num,
        ordered.row_count(),
        text.len(),
        start.elapsed().as_millis()
    );
    Ok(text)
}

/// Extract one page as styled segments in reading order.
pub fn extract_page_styled(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<Vec<StyledSegment>, PdfTextError> {
    let ordered = ordered_page(doc, page_num, config)?;
    Ok(ordered
        .into_runs()
        .into_iter()
        .map(|run| StyledSegment {
            text: run.text,
            font_name: run.font_name,
            font_size: run.font_size,
        })
        .collect())
}

/// Extract one page as row groups for row-based consumers.
pub fn extract_page_rows(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<Vec<RowGroup>, PdfTextError> {
    let ordered = ordered_page(doc, page_num, config)?;
    Ok(row_groups(&ordered))
}

/// Text and rows in one pass, for the lazy page manager.
pub(crate) fn extract_page_full(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<ExtractedPage, PdfTextError> {
    let ordered = ordered_page(doc, page_num, config)?;
    Ok(ExtractedPage {
        page_num,
        text: render_text(doc, &ordered, &config.row_separator),
        rows: row_groups(&ordered),
    })
}

fn ordered_page(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<OrderedPage, PdfTextError> {
    let runs = resolve_runs(doc, page_num, config)?;
    Ok(order_page(
        runs,
        config.ordering,
        &config.layout,
        doc.page_width(page_num),
    ))
}

/// Fetch the page's runs, resolve its resources, then each run's font.
///
/// Runs with empty text or non-finite coordinates are dropped.
fn resolve_runs(
    doc: &Document,
    page_num: usize,
    config: &ExtractionConfig,
) -> Result<Vec<TextRun>, PdfTextError> {
    let cancelled = || PdfTextError::Cancelled {
        page: Some(page_num),
    };
    if config.cancellation.is_cancelled() {
        return Err(cancelled());
    }

    let raw = doc.runs(page_num)?;
    let resources = doc.page_resources(page_num)?;
    if !resources.is_empty() {
        trace!("Page {}: {} resource objects resolved", page_num, resources.len());
    }
    let mut runs = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for run in raw {
        if config.cancellation.is_cancelled() {
            return Err(cancelled());
        }
        if run.text.is_empty() || !run.x.is_finite() || !run.y.is_finite() {
            dropped += 1;
            continue;
        }
        let font = doc.resolve_font(page_num, run.font)?;
        let width = font.metrics.text_width(&run.text, run.font_size);
        runs.push(TextRun {
            x: run.x,
            y: run.y,
            width,
            font_size: run.font_size,
            font_name: font.name.clone(),
            text: run.text,
        });
    }
    if dropped > 0 {
        trace!("Page {}: dropped {} empty or unplaceable runs", page_num, dropped);
    }
    Ok(runs)
}

fn render_text(doc: &Document, ordered: &OrderedPage, row_separator: &str) -> String {
    let mut buf = doc.buffers().acquire();
    for (i, row) in ordered.rows().enumerate() {
        if i > 0 {
            buf.push_str(row_separator);
        }
        for run in &row.runs {
            buf.push_str(&run.text);
        }
    }
    buf.as_str().to_owned()
}

fn row_groups(ordered: &OrderedPage) -> Vec<RowGroup> {
    ordered
        .rows_with_column()
        .map(|(column, row)| RowGroup {
            column,
            y: row.y,
            position_key: RowGroup::position_key(column, row.y),
            segments: row
                .runs
                .iter()
                .map(|run| StyledSegment {
                    text: run.text.clone(),
                    font_name: run.font_name.clone(),
                    font_size: run.font_size,
                })
                .collect(),
        })
        .collect()
}
