//! CLI binary for edgequake-pdftext.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, loads a JSON run dump and prints the text.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdftext::{
    extract_batch_partial, extract_batch_styled, extract_document, extract_page_rows,
    extract_stream, extract_to_file, CancellationToken, Document, ExtractionConfig,
    ExtractionProgressCallback, OrderingMode, PageSelection, PageSeparator, ProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────

/// Live progress bar plus one log line per page. Pages may finish out of
/// order under several workers.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Length is set by `on_extraction_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading runs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} bytes")),
            dim(&format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed or skipped)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole document to stdout
  pdftext runs.json

  # To a file, four workers
  pdftext runs.json -o document.txt --workers 4

  # Specific pages, raw row-major order
  pdftext --pages 1-5 --ordering simple runs.json

  # Keep going past broken pages, JSON per-page results
  pdftext --partial --json runs.json > pages.json

  # Fonts per segment, or row groups with position keys
  pdftext --styled runs.json
  pdftext --rows --pages 3 runs.json

  # Print pages as they finish
  pdftext --stream runs.json

INPUT FORMAT (JSON run dump):
  {
    "pages":   [{ "width": 612, "runs": [{ "x": 72, "y": 700, "font_size": 10,
                                          "font": { "num": 5 }, "text": "Hello" }] }],
    "fonts":   [{ "reference": { "num": 5 }, "name": "Helvetica",
                  "metrics": { "avg_width": 520 } }],
    "objects": [{ "reference": { "num": 9 }, "value": 42 }]
  }

ENVIRONMENT VARIABLES:
  PDFTEXT_WORKERS     Worker count (0 = available parallelism)
  PDFTEXT_ORDERING    simple | smart
  PDFTEXT_PAGES       Page selection
  RUST_LOG            Log filter, overrides --verbose/--quiet
"#;

/// Extract reading-order text from a positioned-run dump.
#[derive(Parser, Debug)]
#[command(
    name = "pdftext",
    version,
    about = "Extract reading-order text from positioned text runs",
    long_about = "Reconstruct reading-order text from a JSON dump of positioned text runs. \
Groups runs into rows, detects columns from horizontal gaps, and extracts pages in parallel \
with shared font and object caches.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON run dump.
    input: PathBuf,

    /// Write text to this file instead of stdout.
    #[arg(short, long, env = "PDFTEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Reading-order algorithm.
    #[arg(long, env = "PDFTEXT_ORDERING", value_enum, default_value = "smart")]
    ordering: OrderingArg,

    /// Worker count; 0 uses available parallelism.
    #[arg(short, long, env = "PDFTEXT_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFTEXT_PAGES", default_value = "all")]
    pages: String,

    /// Page separator: none, ff, marker, or a custom string.
    #[arg(long, env = "PDFTEXT_SEPARATOR", default_value = "none")]
    separator: String,

    /// Separator between rows of one page.
    #[arg(long, env = "PDFTEXT_ROW_SEPARATOR", default_value = "\n")]
    row_separator: String,

    /// Minimum column gap as a fraction of page width (0–1).
    #[arg(long, env = "PDFTEXT_COLUMN_GAP", default_value_t = 0.05)]
    column_gap: f32,

    /// Font cache capacity; 0 is unbounded.
    #[arg(long, env = "PDFTEXT_FONT_CACHE", default_value_t = 256)]
    font_cache: usize,

    /// Object cache capacity; sized from the page count when unset.
    #[arg(long, env = "PDFTEXT_OBJECT_CACHE")]
    object_cache: Option<usize>,

    /// Keep going past failing pages; failures are reported per page.
    #[arg(long)]
    partial: bool,

    /// Print styled segments (font name and size per segment) as JSON.
    #[arg(long, conflicts_with_all = ["rows", "stream", "partial"])]
    styled: bool,

    /// Print row groups with position keys as JSON.
    #[arg(long, conflicts_with_all = ["stream", "partial"])]
    rows: bool,

    /// Print each page as soon as it is extracted.
    #[arg(long, conflicts_with = "output")]
    stream: bool,

    /// Output structured JSON instead of plain text.
    #[arg(long, env = "PDFTEXT_JSON")]
    json: bool,

    /// Print document and cache information only.
    #[arg(long)]
    info: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFTEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTEXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrderingArg {
    Simple,
    Smart,
}

impl From<OrderingArg> for OrderingMode {
    fn from(v: OrderingArg) -> Self {
        match v {
            OrderingArg::Simple => OrderingMode::Simple,
            OrderingArg::Smart => OrderingMode::Smart,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let structured = cli.json || cli.styled || cli.rows;
    let show_progress =
        !cli.quiet && !cli.no_progress && !structured && !cli.stream && !cli.info;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight pages");
                token.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, token, progress_cb)?;

    let doc = Arc::new(
        Document::open(&cli.input, &config)
            .with_context(|| format!("Failed to load {}", cli.input.display()))?,
    );

    // ── Info-only mode ───────────────────────────────────────────────────
    if cli.info {
        let total = doc.page_count();
        let runs: usize = (1..=total)
            .filter_map(|p| doc.runs(p).ok())
            .map(|r| r.len())
            .sum();
        println!("File:          {}", cli.input.display());
        println!("Pages:         {}", total);
        println!("Text runs:     {}", runs);
        println!("Font cache:    {} entries max", doc.font_cache().capacity());
        println!("Object cache:  {} entries max", doc.object_cache().capacity());
        return Ok(());
    }

    let pages = config.pages.to_page_numbers(doc.page_count());

    // ── Styled / rows ────────────────────────────────────────────────────
    if cli.styled {
        let styled = extract_batch_styled(&doc, &pages, &config)
            .await
            .context("Extraction failed")?;
        println!("{}", serde_json::to_string_pretty(&styled).context("Failed to serialise output")?);
        return Ok(());
    }

    if cli.rows {
        let mut all = Vec::with_capacity(pages.len());
        for &page in &pages {
            let doc = Arc::clone(&doc);
            let cfg = config.clone();
            let rows = tokio::task::spawn_blocking(move || extract_page_rows(&doc, page, &cfg))
                .await
                .context("Extraction task failed")?
                .with_context(|| format!("Extraction failed on page {page}"))?;
            all.push(serde_json::json!({ "page_num": page, "rows": rows }));
        }
        println!("{}", serde_json::to_string_pretty(&all).context("Failed to serialise output")?);
        return Ok(());
    }

    // ── Streaming ────────────────────────────────────────────────────────
    if cli.stream {
        let mut stream = extract_stream(&doc, &pages, &config);
        let stdout = io::stdout();
        let mut failed = 0usize;
        let mut first = true;
        while let Some(item) = stream.next().await {
            match item {
                Ok(page) => {
                    let mut handle = stdout.lock();
                    if cli.json {
                        let line = serde_json::to_string(&page).context("Failed to serialise page")?;
                        writeln!(handle, "{line}").context("Failed to write to stdout")?;
                    } else {
                        if !first {
                            write!(handle, "{}", config.page_separator.render(page.page_num))
                                .context("Failed to write to stdout")?;
                        }
                        write!(handle, "{}", page.text).context("Failed to write to stdout")?;
                        handle.flush().context("Failed to write to stdout")?;
                    }
                    first = false;
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}", red("✗"), e);
                }
            }
        }
        if !cli.json && !first {
            println!();
        }
        if failed > 0 {
            anyhow::bail!("{failed} pages failed");
        }
        return Ok(());
    }

    // ── Partial ──────────────────────────────────────────────────────────
    if cli.partial {
        let results = extract_batch_partial(&doc, &pages, &config)
            .await
            .context("Extraction failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&results).context("Failed to serialise output")?);
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let mut first = true;
            for page in &results {
                match &page.error {
                    None => {
                        if !first {
                            handle
                                .write_all(config.page_separator.render(page.page_num).as_bytes())
                                .context("Failed to write to stdout")?;
                        }
                        handle
                            .write_all(page.text.as_bytes())
                            .context("Failed to write to stdout")?;
                        first = false;
                    }
                    Some(e) if !show_progress && !cli.quiet => eprintln!("{} {}", red("✗"), e),
                    Some(_) => {}
                }
            }
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    // ── Whole document ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = extract_to_file(&doc, output_path, &config)
            .await
            .context("Extraction failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {} chars  {}ms  →  {}",
                green("✔"),
                stats.extracted_pages,
                stats.requested_pages,
                stats.total_chars,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   font cache {:.0}% hits  /  object cache {:.0}% hits",
                stats.font_cache.hit_rate() * 100.0,
                stats.object_cache.hit_rate() * 100.0,
            );
        }
    } else {
        let output = extract_document(&doc, &config)
            .await
            .context("Extraction failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !show_progress && !cli.json {
            eprintln!(
                "Extracted {}/{} pages in {}ms",
                output.stats.extracted_pages,
                output.stats.requested_pages,
                output.stats.total_duration_ms
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    token: CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;
    let separator = parse_separator(&cli.separator);

    let mut builder = ExtractionConfig::builder()
        .workers(cli.workers)
        .ordering(cli.ordering.into())
        .cancellation(token)
        .pages(pages)
        .page_separator(separator)
        .row_separator(unescape(&cli.row_separator))
        .column_gap_fraction(cli.column_gap)
        .font_cache_capacity(cli.font_cache);

    if let Some(n) = cli.object_cache {
        builder = builder.object_cache_capacity(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "ff" | "formfeed" => PageSeparator::FormFeed,
        "marker" => PageSeparator::Marker,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

/// `\n` and `\t` typed literally on the command line.
fn unescape(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t")
}
