//! Streaming extraction: emit pages one at a time.
//!
//! ## Why stream?
//!
//! Large documents take a while. Pulling pages one by one lets callers show
//! partial results immediately, drive progress bars, or write text out
//! incrementally instead of holding the whole document in memory.
//!
//! Two flavours:
//!
//! * [`StreamingExtractor`]: a sequential pull API with an explicit state
//!   machine (`Idle → Emitting → Done`). One page per [`next`] call.
//! * [`extract_stream`]: a concurrent `Stream` that extracts up to
//!   `workers` pages at once and yields them in request order.
//!
//! Unlike the batch API, a failing page does not end the stream: its error
//! is handed to the caller, the cursor moves on, and the caller decides
//! whether to keep pulling. Cancellation does end it.
//!
//! [`next`]: StreamingExtractor::next

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::document::Document;
use crate::error::{PageError, PdfTextError};
use crate::output::{PageResult, StreamedPage};
use crate::pipeline::page::extract_page;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Lifecycle of a [`StreamingExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    /// Created, nothing emitted yet.
    Idle,
    /// At least one page emitted, more remain.
    Emitting,
    /// Terminal. Every further `next()` returns `Exhausted`.
    Done,
}

/// Sequential page-at-a-time extractor.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use edgequake_pdftext::source::{FontInfo, MemorySource, ObjectRef, PositionedRun};
/// use edgequake_pdftext::{Document, ExtractionConfig, PdfTextError, StreamingExtractor};
///
/// let mut source = MemorySource::new();
/// for text in ["first", "second"] {
///     source.push_page(vec![PositionedRun {
///         x: 0.0, y: 0.0, font_size: 10.0, font: ObjectRef::new(1, 0), text: text.into(),
///     }]);
/// }
/// source.add_font(ObjectRef::new(1, 0), FontInfo { name: "Helvetica".into(), metrics: Default::default() });
///
/// let config = ExtractionConfig::default();
/// let doc = Arc::new(Document::from_source(source, &config));
/// let mut pages = StreamingExtractor::new(doc, vec![1, 2], &config);
///
/// let first = pages.next().unwrap();
/// assert_eq!(first.text, "first");
/// assert!(first.has_more);
/// let last = pages.next().unwrap();
/// assert!(!last.has_more);
/// assert_eq!(pages.progress(), 1.0);
/// assert!(matches!(pages.next(), Err(PdfTextError::Exhausted { .. })));
/// ```
#[derive(Debug)]
pub struct StreamingExtractor {
    doc: Arc<Document>,
    pages: Vec<usize>,
    config: ExtractionConfig,
    cursor: usize,
    succeeded: usize,
    state: StreamState,
}

impl StreamingExtractor {
    /// Stream `pages` (1-indexed) in the given order.
    pub fn new(doc: Arc<Document>, pages: Vec<usize>, config: &ExtractionConfig) -> Self {
        Self {
            doc,
            pages,
            config: config.clone(),
            cursor: 0,
            succeeded: 0,
            state: StreamState::Idle,
        }
    }

    /// Stream the pages selected by `config.pages`.
    pub fn for_document(doc: Arc<Document>, config: &ExtractionConfig) -> Self {
        let pages = config.pages.to_page_numbers(doc.page_count());
        Self::new(doc, pages, config)
    }

    /// Extract and return the next page.
    ///
    /// # Errors
    /// - The page's own error; the extractor stays usable and the next call
    ///   moves on to the following page.
    /// - [`PdfTextError::Cancelled`]; the extractor is then `Done`.
    /// - [`PdfTextError::Exhausted`] once `Done`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<StreamedPage, PdfTextError> {
        let total = self.pages.len();
        if self.state == StreamState::Done || self.cursor >= total {
            self.state = StreamState::Done;
            return Err(PdfTextError::Exhausted { total });
        }

        let page_num = self.pages[self.cursor];
        if self.config.cancellation.is_cancelled() {
            info!("Stream cancelled before page {}", page_num);
            self.finish();
            return Err(PdfTextError::Cancelled {
                page: Some(page_num),
            });
        }

        if let Some(ref cb) = self.config.progress_callback {
            if self.cursor == 0 {
                cb.on_extraction_start(total);
            }
            cb.on_page_start(page_num, total);
        }

        self.cursor += 1;
        let has_more = self.cursor < total;
        self.state = if has_more {
            StreamState::Emitting
        } else {
            StreamState::Done
        };

        let result = extract_page(&self.doc, page_num, &self.config);
        if result.is_ok() {
            self.succeeded += 1;
        }
        let cb = self.config.progress_callback.clone();
        let report_done = |succeeded: usize| {
            if let Some(ref cb) = cb {
                if !has_more {
                    cb.on_extraction_complete(total, succeeded);
                }
            }
        };

        match result {
            Ok(text) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_page_complete(page_num, total, text.len());
                }
                report_done(self.succeeded);
                Ok(StreamedPage {
                    page_num,
                    text,
                    has_more,
                })
            }
            Err(e) => {
                warn!("Stream page {} failed: {}", page_num, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                report_done(self.succeeded);
                if e.is_cancelled() {
                    self.finish();
                }
                Err(e)
            }
        }
    }

    /// Pages consumed / pages requested, in `[0, 1]`. Never decreases.
    /// An empty request reports `1.0`.
    pub fn progress(&self) -> f32 {
        if self.pages.is_empty() {
            1.0
        } else {
            self.cursor as f32 / self.pages.len() as f32
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Pages not yet consumed.
    pub fn remaining(&self) -> usize {
        match self.state {
            StreamState::Done => 0,
            _ => self.pages.len() - self.cursor,
        }
    }

    /// Stop early. Further `next()` calls return `Exhausted`.
    pub fn close(&mut self) {
        if self.state != StreamState::Done {
            debug!("Stream closed with {} pages unread", self.remaining());
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.state = StreamState::Done;
    }

    /// Drive the extractor on the blocking pool as a `Stream`.
    ///
    /// Pages arrive in request order. Errors are yielded as items; the
    /// stream ends when the extractor is exhausted or cancelled.
    pub fn into_stream(self) -> PageStream {
        let s = stream::unfold(Some(self), |state| async move {
            let extractor = state?;
            if extractor.state == StreamState::Done {
                return None;
            }
            let page_num = extractor.pages.get(extractor.cursor).copied().unwrap_or(0);
            let joined = tokio::task::spawn_blocking(move || {
                let mut extractor = extractor;
                let start = Instant::now();
                let result = extractor.next();
                (extractor, result, start.elapsed().as_millis() as u64)
            })
            .await;

            match joined {
                Ok((_, Err(PdfTextError::Exhausted { .. }), _)) => None,
                Ok((extractor, Ok(page), duration_ms)) => Some((
                    Ok(PageResult::ok(page.page_num, page.text, duration_ms)),
                    Some(extractor),
                )),
                Ok((extractor, Err(e), _)) => {
                    Some((Err(e.to_page_error(page_num)), Some(extractor)))
                }
                Err(e) => Some((
                    Err(PageError::Resolution {
                        page: page_num,
                        detail: format!("extraction task failed: {e}"),
                    }),
                    None,
                )),
            }
        });
        Box::pin(s)
    }
}

/// Extract `pages` concurrently as a stream, in request order.
///
/// Up to `config.effective_workers(pages.len())` pages are in flight at
/// once. A failing page yields its [`PageError`] and the stream continues.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use edgequake_pdftext::{extract_stream, Document, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let doc = Arc::new(Document::open("dump.json", &config)?);
/// let mut pages = extract_stream(&doc, &[1, 2, 3], &config);
/// while let Some(page) = pages.next().await {
///     match page {
///         Ok(p) => println!("Page {}: {} chars", p.page_num, p.text.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_stream(
    doc: &Arc<Document>,
    pages: &[usize],
    config: &ExtractionConfig,
) -> PageStream {
    let concurrency = config.effective_workers(pages.len()).max(1);
    let total = pages.len();
    info!(
        "Starting streaming extraction: {} pages, {} in flight",
        total, concurrency
    );

    let doc = Arc::clone(doc);
    let config = Arc::new(config.clone());
    let s = stream::iter(pages.to_vec().into_iter().map(move |page_num| {
        let doc = Arc::clone(&doc);
        let config = Arc::clone(&config);
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page_num, total);
            }
            let start = Instant::now();
            let result = {
                let config = Arc::clone(&config);
                tokio::task::spawn_blocking(move || extract_page(&doc, page_num, &config))
                    .await
                    .unwrap_or_else(|e| {
                        Err(PdfTextError::Internal(format!("extraction task failed: {e}")))
                    })
            };
            let duration_ms = start.elapsed().as_millis() as u64;
            match result {
                Ok(text) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_complete(page_num, total, text.len());
                    }
                    Ok(PageResult::ok(page_num, text, duration_ms))
                }
                Err(e) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_error(page_num, total, &e.to_string());
                    }
                    Err(e.to_page_error(page_num))
                }
            }
        }
    }))
    .buffered(concurrency);

    Box::pin(s)
}
