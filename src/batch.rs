//! Batch extraction: a fixed worker pool over a shared job queue.
//!
//! ## Shape
//!
//! ```text
//!              ┌──────────┐  ExtractionJob  ┌──────────┐
//!  pages ────▶ │dispatcher│ ──▶ mpsc ─────▶ │ worker 1 │──┐
//!              └──────────┘   (bounded)  ├─▶│ worker 2 │──┤ spawn_blocking
//!                                        └─▶│ worker N │──┤ extract_page
//!                                            └──────────┘  ▼
//!                                   slots[0..len] (request order)
//! ```
//!
//! Every job carries the slot index of its page in the request, so output
//! order is request order no matter which worker finishes first.
//!
//! ## Failure policies
//!
//! * [`extract_batch`] / [`extract_batch_styled`]: **all-or-nothing**. The
//!   first error any worker observes is kept, dispatch stops, in-flight pages
//!   finish and are discarded, and that single error is returned.
//! * [`extract_batch_partial`]: every page gets a [`PageResult`]; failures
//!   are recorded in `PageResult::error` and the rest of the batch proceeds.
//!
//! Cancellation is checked by the dispatcher before each enqueue, by each
//! worker before each job, and inside page extraction.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::object_cache_capacity;
use crate::config::{ExtractionConfig, PageSelection};
use crate::document::Document;
use crate::error::{PageError, PdfTextError};
use crate::output::{ExtractionOutput, ExtractionStats, PageResult, StyledPage, StyledSegment};
use crate::pipeline::page::{extract_page, extract_page_styled};

/// One unit of work on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionJob {
    /// 1-indexed page to extract.
    pub page_num: usize,
    /// Position of the page in the request; index of its result slot.
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    AllOrNothing,
    Partial,
}

/// What a worker produces for one page.
trait PageOutput: Send + 'static {
    /// Size reported to progress callbacks.
    fn text_len(&self) -> usize;
}

impl PageOutput for String {
    fn text_len(&self) -> usize {
        self.len()
    }
}

impl PageOutput for Vec<StyledSegment> {
    fn text_len(&self) -> usize {
        self.iter().map(|s| s.text.len()).sum()
    }
}

type PageFn<T> = fn(&Document, usize, &ExtractionConfig) -> Result<T, PdfTextError>;

struct Completed<T> {
    result: Result<T, PdfTextError>,
    duration_ms: u64,
}

/// Slots plus first-error bookkeeping shared by all workers.
struct Shared<T> {
    slots: Mutex<Vec<Option<Completed<T>>>>,
    first_error: Mutex<Option<PdfTextError>>,
    abort: AtomicBool,
    started: AtomicUsize,
}

impl<T> Shared<T> {
    fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new((0..len).map(|_| None).collect()),
            first_error: Mutex::new(None),
            abort: AtomicBool::new(false),
            started: AtomicUsize::new(0),
        }
    }

    fn stopped(&self, config: &ExtractionConfig) -> bool {
        self.abort.load(Ordering::Acquire) || config.cancellation.is_cancelled()
    }

    /// Record `err` if no earlier error was recorded and stop dispatch.
    fn fail(&self, err: PdfTextError) {
        let mut first = self.first_error.lock().unwrap_or_else(|p| p.into_inner());
        if first.is_none() {
            warn!("Batch aborted: {}", err);
            *first = Some(err);
        }
        self.abort.store(true, Ordering::Release);
    }
}

// ── Public API ───────────────────────────────────────────────────────────

/// Extract `pages` concurrently, all-or-nothing.
///
/// `result[i].page_num == pages[i]` for every `i`. An empty request returns
/// immediately without starting any workers.
///
/// # Errors
/// - The first page error any worker observed.
/// - [`PdfTextError::Cancelled`] when the token fired before every page
///   completed (immediately, with nothing extracted, if it fired before the
///   call).
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use edgequake_pdftext::source::{FontInfo, MemorySource, ObjectRef, PositionedRun};
/// use edgequake_pdftext::{extract_batch, Document, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut source = MemorySource::new();
/// for text in ["one", "two", "three"] {
///     source.push_page(vec![PositionedRun {
///         x: 0.0, y: 0.0, font_size: 10.0, font: ObjectRef::new(1, 0), text: text.into(),
///     }]);
/// }
/// source.add_font(ObjectRef::new(1, 0), FontInfo { name: "Helvetica".into(), metrics: Default::default() });
///
/// let config = ExtractionConfig::builder().workers(2).build()?;
/// let doc = Arc::new(Document::from_source(source, &config));
/// let pages = extract_batch(&doc, &[3, 1, 2], &config).await?;
/// let texts: Vec<_> = pages.iter().map(|p| p.text.as_str()).collect();
/// assert_eq!(texts, ["three", "one", "two"]);
/// # Ok(())
/// # }
/// ```
pub async fn extract_batch(
    doc: &Arc<Document>,
    pages: &[usize],
    config: &ExtractionConfig,
) -> Result<Vec<PageResult>, PdfTextError> {
    let completed = run_pool(doc, pages, config, FailurePolicy::AllOrNothing, extract_page).await?;
    completed
        .into_iter()
        .zip(pages)
        .map(|(c, &page_num)| match c {
            Some(Completed {
                result: Ok(text),
                duration_ms,
            }) => Ok(PageResult::ok(page_num, text, duration_ms)),
            Some(Completed { result: Err(e), .. }) => Err(e),
            None => Err(PdfTextError::Cancelled { page: Some(page_num) }),
        })
        .collect()
}

/// Like [`extract_batch`], but styled segments instead of plain text.
pub async fn extract_batch_styled(
    doc: &Arc<Document>,
    pages: &[usize],
    config: &ExtractionConfig,
) -> Result<Vec<StyledPage>, PdfTextError> {
    let completed =
        run_pool(doc, pages, config, FailurePolicy::AllOrNothing, extract_page_styled).await?;
    completed
        .into_iter()
        .zip(pages)
        .map(|(c, &page_num)| match c {
            Some(Completed {
                result: Ok(segments),
                ..
            }) => Ok(StyledPage { page_num, segments }),
            Some(Completed { result: Err(e), .. }) => Err(e),
            None => Err(PdfTextError::Cancelled { page: Some(page_num) }),
        })
        .collect()
}

/// Extract `pages` concurrently, keeping going past page failures.
///
/// Every requested page gets a [`PageResult`] in request order. A failed
/// page carries its [`PageError`]; a page never started because the batch
/// was cancelled carries [`PageError::Cancelled`].
///
/// # Errors
/// Only [`PdfTextError::Cancelled`], when the token fired before any page
/// started.
pub async fn extract_batch_partial(
    doc: &Arc<Document>,
    pages: &[usize],
    config: &ExtractionConfig,
) -> Result<Vec<PageResult>, PdfTextError> {
    let completed = run_pool(doc, pages, config, FailurePolicy::Partial, extract_page).await?;
    Ok(completed
        .into_iter()
        .zip(pages)
        .map(|(c, &page_num)| match c {
            Some(Completed {
                result: Ok(text),
                duration_ms,
            }) => PageResult::ok(page_num, text, duration_ms),
            Some(Completed {
                result: Err(e),
                duration_ms,
            }) => PageResult::failed(e.to_page_error(page_num), duration_ms),
            None => PageResult::failed(PageError::Cancelled { page: page_num }, 0),
        })
        .collect())
}

/// Extract the pages selected by `config.pages` and assemble the text.
///
/// Pages are joined with `config.page_separator`. All-or-nothing, like
/// [`extract_batch`].
///
/// # Errors
/// [`PdfTextError::PageOutOfRange`] when the selection matches no page of a
/// non-empty document, plus everything [`extract_batch`] returns.
pub async fn extract_document(
    doc: &Arc<Document>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PdfTextError> {
    let start = Instant::now();
    let total_pages = doc.page_count();
    let pages = config.pages.to_page_numbers(total_pages);
    if pages.is_empty() && total_pages > 0 {
        return Err(PdfTextError::PageOutOfRange {
            page: first_requested(&config.pages),
            total: total_pages,
        });
    }
    debug!("Selected {} of {} pages", pages.len(), total_pages);

    let results = extract_batch(doc, &pages, config).await?;
    let text = assemble_text(&results, config);

    let stats = ExtractionStats {
        total_pages,
        requested_pages: pages.len(),
        extracted_pages: results.len(),
        failed_pages: 0,
        total_chars: results.iter().map(|p| p.text.chars().count()).sum(),
        total_duration_ms: start.elapsed().as_millis() as u64,
        workers: config.effective_workers(pages.len()),
        object_cache: doc.object_cache().stats(),
        font_cache: doc.font_cache().stats(),
        buffers: doc.buffers().stats(),
    };

    info!(
        "Extraction complete: {}/{} pages, {} chars, {}ms",
        stats.extracted_pages, total_pages, stats.total_chars, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        text,
        pages: results,
        stats,
    })
}

/// Extract a document and write its text to `output_path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a partial file behind.
pub async fn extract_to_file(
    doc: &Arc<Document>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, PdfTextError> {
    let output = extract_document(doc, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let text = output.text;

    tokio::task::spawn_blocking(move || write_atomic(&path, text.as_bytes()))
        .await
        .map_err(|e| PdfTextError::Internal(format!("writer task failed: {e}")))??;

    Ok(output.stats)
}

/// Synchronous wrapper around [`extract_document`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn extract_sync(
    doc: &Arc<Document>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PdfTextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfTextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_document(doc, config))
}

// ── Worker pool ──────────────────────────────────────────────────────────

async fn run_pool<T: PageOutput>(
    doc: &Arc<Document>,
    pages: &[usize],
    config: &ExtractionConfig,
    policy: FailurePolicy,
    work: PageFn<T>,
) -> Result<Vec<Option<Completed<T>>>, PdfTextError> {
    if pages.is_empty() {
        return Ok(Vec::new());
    }
    if config.cancellation.is_cancelled() {
        info!("Batch cancelled before start");
        return Err(PdfTextError::Cancelled { page: None });
    }

    // Page extraction resolves resource objects through this cache. Evicted
    // values stay alive for holders of their `Arc`.
    if config.object_cache_capacity.is_none() {
        doc.object_cache()
            .set_capacity(object_cache_capacity(pages.len()));
    }

    let total = pages.len();
    let workers = config.effective_workers(total);
    info!(
        "Starting batch extraction: {} pages, {} workers, {:?} ordering",
        total, workers, config.ordering
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total);
    }

    let shared = Arc::new(Shared::<T>::new(total));
    let config = Arc::new(config.clone());
    let (tx, rx) = mpsc::channel::<ExtractionJob>(workers);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let dispatcher = {
        let shared = Arc::clone(&shared);
        let config = Arc::clone(&config);
        let jobs: Vec<ExtractionJob> = pages
            .iter()
            .enumerate()
            .map(|(slot, &page_num)| ExtractionJob { page_num, slot })
            .collect();
        tokio::spawn(async move {
            for job in jobs {
                if shared.stopped(&config) {
                    debug!("Dispatcher stopping before page {}", job.page_num);
                    break;
                }
                // All workers gone: nothing left to feed.
                if tx.send(job).await.is_err() {
                    break;
                }
            }
        })
    };

    let handles: Vec<_> = (0..workers)
        .map(|worker_id| {
            let doc = Arc::clone(doc);
            let shared = Arc::clone(&shared);
            let config = Arc::clone(&config);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                worker_loop(worker_id, doc, shared, config, rx, policy, work, total).await
            })
        })
        .collect();
    // Workers own the receiver now; once they all exit a blocked dispatcher
    // sees the channel close.
    drop(rx);

    dispatcher
        .await
        .map_err(|e| PdfTextError::Internal(format!("dispatcher task failed: {e}")))?;
    for handle in handles {
        handle
            .await
            .map_err(|e| PdfTextError::Internal(format!("worker task failed: {e}")))?;
    }

    let shared = Arc::try_unwrap(shared)
        .map_err(|_| PdfTextError::Internal("worker state still shared after join".into()))?;
    let started = shared.started.load(Ordering::Acquire);
    let first_error = shared
        .first_error
        .into_inner()
        .unwrap_or_else(|p| p.into_inner());
    let slots = shared.slots.into_inner().unwrap_or_else(|p| p.into_inner());

    let successes = slots
        .iter()
        .filter(|s| matches!(s, Some(Completed { result: Ok(_), .. })))
        .count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(total, successes);
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    let incomplete = slots.iter().any(Option::is_none);
    if incomplete && config.cancellation.is_cancelled() {
        match policy {
            FailurePolicy::AllOrNothing => {
                info!("Batch cancelled: {}/{} pages completed", successes, total);
                return Err(PdfTextError::Cancelled { page: None });
            }
            FailurePolicy::Partial if started == 0 => {
                return Err(PdfTextError::Cancelled { page: None });
            }
            FailurePolicy::Partial => {}
        }
    }

    info!("Batch finished: {}/{} pages succeeded", successes, total);
    Ok(slots)
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop<T: PageOutput>(
    worker_id: usize,
    doc: Arc<Document>,
    shared: Arc<Shared<T>>,
    config: Arc<ExtractionConfig>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ExtractionJob>>>,
    policy: FailurePolicy,
    work: PageFn<T>,
    total: usize,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        if shared.stopped(&config) {
            debug!("Worker {} stopping; page {} not started", worker_id, job.page_num);
            break;
        }
        shared.started.fetch_add(1, Ordering::AcqRel);
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(job.page_num, total);
        }

        let start = Instant::now();
        let result = {
            let doc = Arc::clone(&doc);
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || work(&doc, job.page_num, &config))
                .await
                .unwrap_or_else(|e| {
                    Err(PdfTextError::Internal(format!(
                        "page {} task failed: {e}",
                        job.page_num
                    )))
                })
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(ref cb) = config.progress_callback {
            match &result {
                Ok(out) => cb.on_page_complete(job.page_num, total, out.text_len()),
                Err(e) => cb.on_page_error(job.page_num, total, &e.to_string()),
            }
        }

        let result = match (result, policy) {
            (Err(e), FailurePolicy::AllOrNothing) => {
                shared.fail(e);
                break;
            }
            (result, _) => result,
        };
        shared.slots.lock().unwrap_or_else(|p| p.into_inner())[job.slot] = Some(Completed {
            result,
            duration_ms,
        });
    }
}

// ── Assembly ─────────────────────────────────────────────────────────────

fn assemble_text(pages: &[PageResult], config: &ExtractionConfig) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().filter(|p| p.is_ok()).enumerate() {
        if i > 0 {
            out.push_str(&config.page_separator.render(page.page_num));
        }
        out.push_str(&page.text);
    }
    out
}

fn first_requested(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdfTextError> {
    use std::io::Write;

    let write_err = |source| PdfTextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::PageSeparator;
    use crate::progress::ExtractionProgressCallback;
    use crate::source::{
        FontInfo, FontRef, MemorySource, ObjectRef, ObjectValue, PositionedRun, RunSource,
        SourceError,
    };

    const F1: ObjectRef = ObjectRef::new(1, 0);

    fn source(n: usize) -> MemorySource {
        let mut src = MemorySource::new();
        for i in 1..=n {
            src.push_page(vec![PositionedRun {
                x: 0.0,
                y: 0.0,
                font_size: 10.0,
                font: F1,
                text: format!("page {i}"),
            }]);
        }
        src.add_font(
            F1,
            FontInfo {
                name: "Helvetica".into(),
                metrics: Default::default(),
            },
        );
        src
    }

    fn doc(src: impl RunSource + 'static) -> Arc<Document> {
        Arc::new(Document::from_source(src, &ExtractionConfig::default()))
    }

    fn workers(n: usize) -> ExtractionConfig {
        ExtractionConfig::builder().workers(n).build().unwrap()
    }

    #[tokio::test]
    async fn results_follow_request_order() {
        let d = doc(source(3));
        let out = extract_batch(&d, &[3, 1, 2], &workers(2)).await.unwrap();
        let nums: Vec<usize> = out.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![3, 1, 2]);
        assert_eq!(out[0].text, "page 3");
        assert_eq!(out[1].text, "page 1");
        assert!(out.iter().all(|p| p.error.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn order_holds_under_many_workers() {
        let d = doc(source(40));
        let request: Vec<usize> = (1..=40).rev().collect();
        let out = extract_batch(&d, &request, &workers(8)).await.unwrap();
        for (i, page) in out.iter().enumerate() {
            assert_eq!(page.page_num, request[i]);
            assert_eq!(page.text, format!("page {}", request[i]));
        }
    }

    #[tokio::test]
    async fn empty_request_is_empty_result() {
        let d = doc(source(2));
        assert!(extract_batch(&d, &[], &workers(4)).await.unwrap().is_empty());
        assert!(extract_batch_partial(&d, &[], &workers(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let d = doc(source(3));
        let token = CancellationToken::new();
        token.cancel();
        let config = ExtractionConfig::builder()
            .workers(2)
            .cancellation(token)
            .build()
            .unwrap();
        let err = extract_batch(&d, &[1, 2, 3], &config).await.unwrap_err();
        assert!(matches!(err, PdfTextError::Cancelled { page: None }));
        let err = extract_batch_partial(&d, &[1, 2, 3], &config).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(d.font_cache().stats().misses, 0);
    }

    #[tokio::test]
    async fn one_bad_page_fails_the_batch() {
        let mut src = source(4);
        src.mark_corrupt(3, "truncated stream");
        let d = doc(src);
        let err = extract_batch(&d, &[1, 2, 3, 4], &workers(2)).await.unwrap_err();
        match err {
            PdfTextError::SourceUnavailable { page, detail } => {
                assert_eq!(page, 3);
                assert!(detail.contains("truncated stream"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Counts `get_runs` calls through to an inner source.
    struct CountingRuns {
        inner: MemorySource,
        calls: Arc<AtomicUsize>,
    }

    impl RunSource for CountingRuns {
        fn page_count(&self) -> usize {
            self.inner.page_count()
        }
        fn get_runs(&self, page_num: usize) -> Result<Vec<PositionedRun>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_runs(page_num)
        }
        fn resolve_font(&self, font: FontRef) -> Result<FontInfo, SourceError> {
            self.inner.resolve_font(font)
        }
        fn resolve_object(&self, reference: ObjectRef) -> Result<ObjectValue, SourceError> {
            self.inner.resolve_object(reference)
        }
    }

    #[tokio::test]
    async fn first_error_stops_dispatch() {
        let mut inner = source(10);
        inner.mark_corrupt(1, "truncated stream");
        let calls = Arc::new(AtomicUsize::new(0));
        let d = doc(CountingRuns {
            inner,
            calls: Arc::clone(&calls),
        });
        let request: Vec<usize> = (1..=10).collect();
        let err = extract_batch(&d, &request, &workers(1)).await.unwrap_err();
        assert!(matches!(err, PdfTextError::SourceUnavailable { page: 1, .. }));
        // The lone worker stops at the failure; no later page reaches the source.
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The partial variant keeps going over the same document.
        let out = extract_batch_partial(&d, &request, &workers(1)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(out[0].error.is_some());
        assert!(out[1..].iter().all(PageResult::is_ok));
    }

    #[tokio::test]
    async fn partial_keeps_good_pages() {
        let mut src = source(3);
        src.mark_corrupt(2, "bad xref");
        let d = doc(src);
        let out = extract_batch_partial(&d, &[1, 2, 3], &workers(3)).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text, "page 1");
        assert!(matches!(
            out[1].error,
            Some(PageError::SourceUnavailable { page: 2, .. })
        ));
        assert!(out[1].text.is_empty());
        assert_eq!(out[2].text, "page 3");
    }

    #[tokio::test]
    async fn styled_batch() {
        let d = doc(source(2));
        let out = extract_batch_styled(&d, &[2], &workers(1)).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].page_num, 2);
        assert_eq!(out[0].segments[0].text, "page 2");
        assert_eq!(out[0].segments[0].font_name, "Helvetica");
    }

    /// Cancels the shared token once the first page has been served.
    struct CancelAfterFirst {
        inner: MemorySource,
        token: CancellationToken,
    }

    impl RunSource for CancelAfterFirst {
        fn page_count(&self) -> usize {
            self.inner.page_count()
        }
        fn get_runs(&self, page_num: usize) -> Result<Vec<PositionedRun>, SourceError> {
            let runs = self.inner.get_runs(page_num);
            self.token.cancel();
            runs
        }
        fn resolve_font(&self, font: FontRef) -> Result<FontInfo, SourceError> {
            self.inner.resolve_font(font)
        }
        fn resolve_object(&self, reference: ObjectRef) -> Result<ObjectValue, SourceError> {
            self.inner.resolve_object(reference)
        }
    }

    #[tokio::test]
    async fn cancellation_mid_batch() {
        let token = CancellationToken::new();
        let d = doc(CancelAfterFirst {
            inner: source(5),
            token: token.clone(),
        });
        let config = ExtractionConfig::builder()
            .workers(1)
            .cancellation(token)
            .build()
            .unwrap();
        let err = extract_batch(&d, &[1, 2, 3, 4, 5], &config).await.unwrap_err();
        assert!(err.is_cancelled());

        let out = extract_batch_partial(&d, &[1, 2, 3, 4, 5], &config).await;
        // token is still set from the first run
        assert!(out.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn partial_marks_unstarted_pages_cancelled() {
        let token = CancellationToken::new();
        let d = doc(CancelAfterFirst {
            inner: source(4),
            token: token.clone(),
        });
        let config = ExtractionConfig::builder()
            .workers(1)
            .cancellation(token)
            .build()
            .unwrap();
        let out = extract_batch_partial(&d, &[1, 2, 3, 4], &config).await.unwrap();
        assert_eq!(out.len(), 4);
        // page 1 observed the cancel between its font resolutions
        assert!(out.iter().all(|p| matches!(p.error, Some(PageError::Cancelled { .. }))));
        assert_eq!(out[3].page_num, 4);
    }

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        completed: AtomicUsize,
        errors: AtomicUsize,
        total: AtomicUsize,
        successes: AtomicUsize,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_extraction_start(&self, total_pages: usize) {
            self.total.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_extraction_complete(&self, _total_pages: usize, success_count: usize) {
            self.successes.store(success_count, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn progress_events_fire() {
        let mut src = source(3);
        src.mark_corrupt(3, "boom");
        let d = doc(src);
        let rec = Arc::new(Recorder::default());
        let config = ExtractionConfig::builder()
            .workers(2)
            .progress_callback(rec.clone())
            .build()
            .unwrap();
        let out = extract_batch_partial(&d, &[1, 2, 3], &config).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(rec.total.load(Ordering::SeqCst), 3);
        assert_eq!(rec.started.load(Ordering::SeqCst), 3);
        assert_eq!(rec.completed.load(Ordering::SeqCst), 2);
        assert_eq!(rec.errors.load(Ordering::SeqCst), 1);
        assert_eq!(rec.successes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn object_cache_sized_from_request() {
        let d = doc(source(3));
        extract_batch(&d, &[1, 2], &workers(2)).await.unwrap();
        assert_eq!(d.object_cache().capacity(), object_cache_capacity(2));
    }

    #[tokio::test]
    async fn document_assembly() {
        let d = doc(source(3));
        let config = ExtractionConfig::builder()
            .pages(PageSelection::Range(2, 3))
            .page_separator(PageSeparator::FormFeed)
            .build()
            .unwrap();
        let out = extract_document(&d, &config).await.unwrap();
        assert_eq!(out.text, "page 2\n\x0c\npage 3");
        assert_eq!(out.stats.total_pages, 3);
        assert_eq!(out.stats.requested_pages, 2);
        assert_eq!(out.stats.extracted_pages, 2);
        assert_eq!(out.stats.total_chars, 12);
    }

    #[tokio::test]
    async fn selection_outside_document() {
        let d = doc(source(2));
        let config = ExtractionConfig::builder()
            .pages(PageSelection::Single(9))
            .build()
            .unwrap();
        let err = extract_document(&d, &config).await.unwrap_err();
        assert!(matches!(err, PdfTextError::PageOutOfRange { page: 9, total: 2 }));
    }

    #[tokio::test]
    async fn writes_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        let d = doc(source(2));
        let stats = extract_to_file(&d, &path, &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(stats.extracted_pages, 2);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "page 1\n\npage 2");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn sync_wrapper() {
        let d = doc(source(1));
        let out = extract_sync(&d, &ExtractionConfig::default()).unwrap();
        assert_eq!(out.text, "page 1");
    }
}
