//! End-to-end tests over the public API.
//!
//! Fixtures are JSON run dumps in `./test_cases/`, loaded through
//! `Document::open` exactly as the CLI loads them.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use edgequake_pdftext::source::{FontInfo, MemorySource, ObjectRef, ObjectValue, PositionedRun};
use edgequake_pdftext::{
    extract_batch, extract_batch_partial, extract_document, extract_stream, extract_to_file,
    CancellationToken, Document, ExtractionConfig, ExtractionProgressCallback,
    LazyPageManager, NoopProgressCallback, OrderingMode, PageError, PageSelection,
    PageSeparator, PdfTextError, StreamingExtractor,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Route library logs through the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn report(config: &ExtractionConfig) -> Arc<Document> {
    let path = test_cases_dir().join("report.json");
    Arc::new(Document::open(&path, config).expect("fixture loads"))
}

const SMART_PAGE_1: &str = "Annual Report\n\
Revenue grew in every region.\n\
Margins improved slightly.\n\
Headcount was stable.\n\
Costs were flat year on year.\n\
Capital spend fell.\n\
Outlook remains positive.";

const SIMPLE_PAGE_1: &str = "Annual Report\n\
Revenue grew in every region.Costs were flat year on year.\n\
Margins improved slightly.Capital spend fell.\n\
Headcount was stable.Outlook remains positive.";

const PAGE_2: &str = "The quick brown fox\njumps over the lazy dog.";

/// A synthetic document of `n` single-run pages, each using one of four fonts.
fn synthetic(n: usize) -> MemorySource {
    let mut src = MemorySource::new();
    for i in 1..=n {
        src.push_page(vec![
            PositionedRun {
                x: 0.0,
                y: 20.0,
                font_size: 10.0,
                font: ObjectRef::new((i % 4) as u32 + 1, 0),
                text: format!("page {i}"),
            },
            PositionedRun {
                x: 0.0,
                y: 0.0,
                font_size: 10.0,
                font: ObjectRef::new(1, 0),
                text: "footer".into(),
            },
        ]);
    }
    for f in 1..=4u32 {
        src.add_font(
            ObjectRef::new(f, 0),
            FontInfo {
                name: format!("F{f}"),
                metrics: Default::default(),
            },
        );
    }
    src
}

// ── Fixture: reading order ───────────────────────────────────────────────

#[tokio::test]
async fn smart_ordering_reads_columns_in_turn() {
    init_tracing();
    let config = ExtractionConfig::default();
    let doc = report(&config);
    let pages = extract_batch(&doc, &[1], &config).await.unwrap();
    assert_eq!(pages[0].text, SMART_PAGE_1);
}

#[tokio::test]
async fn simple_ordering_interleaves_columns() {
    let config = ExtractionConfig::builder()
        .ordering(OrderingMode::Simple)
        .build()
        .unwrap();
    let doc = report(&config);
    let pages = extract_batch(&doc, &[1], &config).await.unwrap();
    assert_eq!(pages[0].text, SIMPLE_PAGE_1);
}

#[tokio::test]
async fn single_column_page_is_mode_independent() {
    for mode in [OrderingMode::Simple, OrderingMode::Smart] {
        let config = ExtractionConfig::builder().ordering(mode).build().unwrap();
        let doc = report(&config);
        let pages = extract_batch(&doc, &[2], &config).await.unwrap();
        assert_eq!(pages[0].text, PAGE_2, "mode {mode:?}");
    }
}

#[tokio::test]
async fn whole_document_with_markers() {
    // One worker, so no two pages race to resolve the same font.
    let config = ExtractionConfig::builder()
        .workers(1)
        .page_separator(PageSeparator::Marker)
        .build()
        .unwrap();
    let doc = report(&config);
    let out = extract_document(&doc, &config).await.unwrap();

    let expected = format!("{SMART_PAGE_1}\n\n--- page 2 ---\n\n{PAGE_2}\n\n--- page 3 ---\n\n");
    assert_eq!(out.text, expected);
    assert_eq!(out.pages.len(), 3);
    assert_eq!(out.pages[2].text, "");
    assert_eq!(out.stats.total_pages, 3);
    assert_eq!(out.stats.extracted_pages, 3);
    assert_eq!(out.stats.font_cache.misses, 2);
    // Object 10 is shared by pages 1 and 2; object 9 only by page 2.
    assert_eq!(out.stats.object_cache.misses, 2);
    assert_eq!(out.stats.object_cache.hits, 1);
}

#[tokio::test]
async fn output_is_json_serialisable() {
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(2))
        .build()
        .unwrap();
    let doc = report(&config);
    let out = extract_document(&doc, &config).await.unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["pages"][0]["page_num"], 2);
    assert_eq!(json["text"], PAGE_2);
    assert!(json["stats"]["font_cache"]["hits"].is_number());
}

#[test]
fn fixture_objects_resolve_and_cache() {
    let doc = report(&ExtractionConfig::default());
    assert_eq!(
        *doc.resolve_object(1, ObjectRef::new(9, 0)).unwrap(),
        ObjectValue::Integer(42)
    );
    match &*doc.resolve_object(1, ObjectRef::new(10, 0)).unwrap() {
        ObjectValue::Dictionary(d) => {
            assert_eq!(d.get("Type"), Some(&ObjectValue::Text("Page".into())));
        }
        other => panic!("expected a dictionary, got {other:?}"),
    }
    doc.resolve_object(2, ObjectRef::new(9, 0)).unwrap();
    let stats = doc.object_cache().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn missing_resource_fails_only_its_page() {
    let mut src = synthetic(3);
    src.set_resources(2, vec![ObjectRef::new(404, 0)]);
    let config = ExtractionConfig::builder().workers(2).build().unwrap();
    let doc = Arc::new(Document::from_source(src, &config));

    let err = extract_batch(&doc, &[1, 2, 3], &config).await.unwrap_err();
    assert!(matches!(err, PdfTextError::ObjectResolution { page: 2, .. }));
    assert_eq!(err.page(), Some(2));

    let out = extract_batch_partial(&doc, &[1, 2, 3], &config).await.unwrap();
    assert!(matches!(out[1].error, Some(PageError::Resolution { page: 2, .. })));
    assert!(out[0].is_ok() && out[2].is_ok());
}

#[test]
fn unreadable_dump_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = Document::open(&path, &ExtractionConfig::default()).unwrap_err();
    assert!(matches!(err, PdfTextError::SourceLoad { .. }));

    let err = Document::open(dir.path().join("missing.json"), &ExtractionConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("missing.json"));
}

// ── Batch behaviour ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn request_order_survives_concurrency() {
    let config = ExtractionConfig::builder().workers(2).build().unwrap();
    let doc = Arc::new(Document::from_source(synthetic(3), &config));
    let pages = extract_batch(&doc, &[3, 1, 2], &config).await.unwrap();
    let nums: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
    assert_eq!(nums, vec![3, 1, 2]);
    assert_eq!(pages[0].text, "page 3\nfooter");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_font_cache_across_workers() {
    init_tracing();
    let config = ExtractionConfig::builder().workers(8).build().unwrap();
    let doc = Arc::new(Document::from_source(synthetic(200), &config));
    let request: Vec<usize> = (1..=200).collect();
    let pages = extract_batch(&doc, &request, &config).await.unwrap();
    assert_eq!(pages.len(), 200);

    let stats = doc.font_cache().stats();
    assert_eq!(stats.size, 4);
    assert_eq!(stats.hits + stats.misses, 400);
    // Racing workers may each miss the same font once.
    assert!(stats.misses <= 4 * 8, "misses: {}", stats.misses);
    assert!(doc.buffers().stats().idle <= 8);
}

#[tokio::test]
async fn tiny_font_cache_still_extracts() {
    let config = ExtractionConfig::builder()
        .workers(3)
        .font_cache_capacity(1)
        .build()
        .unwrap();
    let doc = Arc::new(Document::from_source(synthetic(12), &config));
    let request: Vec<usize> = (1..=12).collect();
    let pages = extract_batch(&doc, &request, &config).await.unwrap();
    assert!(pages.iter().all(|p| p.text.ends_with("footer")));
    let stats = doc.font_cache().stats();
    assert!(stats.size <= 1);
    assert!(stats.evictions > 0);
}

#[tokio::test]
async fn pre_cancelled_batch_does_no_work() {
    let token = CancellationToken::new();
    token.cancel();
    let config = ExtractionConfig::builder()
        .cancellation(token)
        .build()
        .unwrap();
    let doc = Arc::new(Document::from_source(synthetic(5), &config));
    let err = extract_batch(&doc, &[1, 2, 3, 4, 5], &config).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(doc.font_cache().stats().misses, 0);
}

#[tokio::test]
async fn partial_results_report_failed_pages() {
    init_tracing();
    let mut src = synthetic(4);
    src.mark_corrupt(2, "broken content stream");
    let config = ExtractionConfig::builder().workers(2).build().unwrap();
    let doc = Arc::new(Document::from_source(src, &config));

    let err = extract_batch(&doc, &[1, 2, 3, 4], &config).await.unwrap_err();
    assert_eq!(err.page(), Some(2));

    let pages = extract_batch_partial(&doc, &[1, 2, 3, 4], &config).await.unwrap();
    assert_eq!(pages.len(), 4);
    assert!(pages[0].is_ok() && pages[2].is_ok() && pages[3].is_ok());
    match &pages[1].error {
        Some(PageError::SourceUnavailable { page, detail }) => {
            assert_eq!(*page, 2);
            assert!(detail.contains("broken content stream"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn file_output_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("dump.json");
    std::fs::copy(test_cases_dir().join("report.json"), &dump).unwrap();

    let config = ExtractionConfig::builder()
        .pages(PageSelection::Range(1, 2))
        .build()
        .unwrap();
    let doc = Arc::new(Document::open(&dump, &config).unwrap());
    let out_path = dir.path().join("report.txt");
    let stats = extract_to_file(&doc, &out_path, &config).await.unwrap();

    assert_eq!(stats.requested_pages, 2);
    let written = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(written, format!("{SMART_PAGE_1}\n\n{PAGE_2}"));
}

// ── Streaming and lazy access ────────────────────────────────────────────

#[test]
fn streaming_extractor_over_fixture() {
    init_tracing();
    let config = ExtractionConfig::default();
    let doc = report(&config);
    let mut ex = StreamingExtractor::for_document(doc, &config);

    let mut progress = Vec::new();
    let mut texts = Vec::new();
    loop {
        match ex.next() {
            Ok(page) => {
                texts.push(page.text);
                progress.push(ex.progress());
            }
            Err(PdfTextError::Exhausted { total }) => {
                assert_eq!(total, 3);
                break;
            }
            Err(e) => panic!("unexpected: {e}"),
        }
    }
    assert_eq!(texts, vec![SMART_PAGE_1.to_string(), PAGE_2.to_string(), String::new()]);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&1.0));
}

#[tokio::test]
async fn concurrent_stream_matches_batch() {
    let config = ExtractionConfig::builder().workers(3).build().unwrap();
    let doc = Arc::new(Document::from_source(synthetic(10), &config));
    let request: Vec<usize> = vec![10, 4, 7, 1, 9, 2];

    let batch = extract_batch(&doc, &request, &config).await.unwrap();
    let streamed: Vec<_> = extract_stream(&doc, &request, &config)
        .map(|r| r.unwrap())
        .collect()
        .await;
    let b: Vec<(usize, &str)> = batch.iter().map(|p| (p.page_num, p.text.as_str())).collect();
    let s: Vec<(usize, &str)> = streamed.iter().map(|p| (p.page_num, p.text.as_str())).collect();
    assert_eq!(b, s);
}

#[test]
fn lazy_manager_over_fixture() {
    let config = ExtractionConfig::builder()
        .max_resident_pages(2)
        .build()
        .unwrap();
    let manager = LazyPageManager::new(report(&config), &config);

    for p in [1, 2, 1, 3] {
        manager.get_page(p).unwrap();
    }
    let stats = manager.stats();
    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.resident_pages, 2);
    assert_eq!(stats.extractions, 3);
    assert!(!manager.is_resident(2));

    let page = manager.get_page(1).unwrap();
    assert_eq!(page.text, SMART_PAGE_1);
    assert_eq!(page.rows[0].position_key, "0:740.00");
    assert_eq!(page.rows.iter().filter(|r| r.column == 1).count(), 3);
    assert_eq!(manager.stats().extractions, 3);
}

// ── Callbacks ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counter {
    completed: AtomicUsize,
}

impl ExtractionProgressCallback for Counter {
    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn callback_is_usable_from_spawned_tasks() {
    let counter = Arc::new(Counter::default());
    let config = ExtractionConfig::builder()
        .workers(4)
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    let doc = Arc::new(Document::from_source(synthetic(6), &config));

    let handle = {
        let doc = Arc::clone(&doc);
        let config = config.clone();
        tokio::spawn(async move { extract_batch(&doc, &[1, 2, 3, 4, 5, 6], &config).await })
    };
    handle.await.unwrap().unwrap();
    assert_eq!(counter.completed.load(Ordering::SeqCst), 6);
}

#[test]
fn noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<Document>();
    assert_send_sync::<LazyPageManager>();
}
