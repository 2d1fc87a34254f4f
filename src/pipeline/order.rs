//! Reading-order reconstruction.
//!
//! Turns an unordered set of [`TextRun`]s into rows (shared baseline, left to
//! right) and, in [`OrderingMode::Smart`], columns (left to right, each read
//! top to bottom).
//!
//! ## Simple
//!
//! Runs are grouped into rows by y-proximity, rows are read top to bottom
//! (descending `y`, since y grows upward in page space) and runs within a
//! row left to right. Multi-column pages come out interleaved; that is the
//! documented behaviour of this mode.
//!
//! ## Smart
//!
//! ```text
//!   x-coverage histogram     ▇▇▇▇▇▇▇▇▁▁▁▁▁▁▁▁▁▇▇▇▇▇▇▇▇
//!                                    └─ gap ─┘
//!   columns                  [  col 0  ]       [  col 1  ]
//! ```
//!
//! 1. Build a histogram of run x-extents, with bins sized from the gap
//!    threshold, and find interior stretches with (near-)zero coverage wider
//!    than a fraction of the page width. On short pages one straddling run
//!    is tolerated when both sides still hold runs of their own.
//! 2. Split the page at the middle of each such gap.
//! 3. Assign each run to the column holding the larger part of its extent.
//! 4. Order each column with the Simple row logic; concatenate columns.
//!
//! When no gap qualifies the page is ordered by exactly the Simple code path
//! with the same tolerance, so single-column output is identical in both
//! modes.
//!
//! Nothing here can fail, and nothing iterates a hash container: every sort
//! breaks ties on the run's original index, so output is a pure function of
//! input order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LayoutConfig;
use crate::source::TextRun;

/// Upper bound on histogram resolution.
const MAX_HISTOGRAM_BINS: usize = 4096;

/// Histogram bins per minimum gap width. A gap loses at most two partially
/// covered bins to quantisation.
const BINS_PER_MIN_GAP: f32 = 8.0;

/// Reading-order algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderingMode {
    /// Row-major y/x sort. Assumes a single column.
    Simple,
    /// Column-aware ordering with guaranteed Simple fallback. (default)
    #[default]
    Smart,
}

/// Runs sharing an approximate baseline, sorted left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Baseline of the row's seed (topmost) run.
    pub y: f32,
    pub runs: Vec<TextRun>,
}

impl Row {
    /// Run texts concatenated with no separator.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A horizontal band of the page read as one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub left: f32,
    pub right: f32,
    /// Top to bottom.
    pub rows: Vec<Row>,
}

/// Result of ordering one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderedPage {
    /// Left to right. Exactly one column for Simple mode and single-column
    /// pages; empty when the page had no runs.
    pub columns: Vec<Column>,
}

impl OrderedPage {
    /// Rows in reading order across all columns.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.columns.iter().flat_map(|c| c.rows.iter())
    }

    /// Rows in reading order, tagged with their column index.
    pub fn rows_with_column(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.columns
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.rows.iter().map(move |r| (i, r)))
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.rows.len()).sum()
    }

    pub fn is_multi_column(&self) -> bool {
        self.columns.len() > 1
    }

    /// Flatten into runs in reading order.
    pub fn into_runs(self) -> Vec<TextRun> {
        self.columns
            .into_iter()
            .flat_map(|c| c.rows)
            .flat_map(|r| r.runs)
            .collect()
    }
}

/// The x-range of one detected column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpan {
    pub left: f32,
    pub right: f32,
}

impl ColumnSpan {
    fn overlap(&self, run: &TextRun) -> f32 {
        run.right().min(self.right) - run.x.max(self.left)
    }

    /// Whether the run lies wholly inside this span.
    fn contains(&self, run: &TextRun) -> bool {
        run.x >= self.left && run.right() <= self.right
    }
}

#[derive(Debug, Clone)]
struct Indexed {
    idx: usize,
    run: TextRun,
}

/// Order runs and flatten: the sequence a plain-text consumer reads.
pub fn order_runs(
    runs: Vec<TextRun>,
    mode: OrderingMode,
    layout: &LayoutConfig,
    page_width: Option<f32>,
) -> Vec<TextRun> {
    order_page(runs, mode, layout, page_width).into_runs()
}

/// Order runs into columns of rows.
pub fn order_page(
    runs: Vec<TextRun>,
    mode: OrderingMode,
    layout: &LayoutConfig,
    page_width: Option<f32>,
) -> OrderedPage {
    if runs.is_empty() {
        return OrderedPage::default();
    }

    let tolerance = row_tolerance(&runs, layout);
    let spans = match mode {
        OrderingMode::Simple => Vec::new(),
        OrderingMode::Smart => detect_columns(&runs, layout, page_width),
    };

    let items: Vec<Indexed> = runs
        .into_iter()
        .enumerate()
        .map(|(idx, run)| Indexed { idx, run })
        .collect();

    if spans.len() < 2 {
        return single_column(items, tolerance);
    }

    let assigned: Vec<usize> = items
        .iter()
        .map(|item| assign_column(&item.run, &spans))
        .collect();
    if assigned.iter().all(|&c| c == assigned[0]) {
        // Every run landed in one column.
        return single_column(items, tolerance);
    }

    let mut buckets: Vec<Vec<Indexed>> = vec![Vec::new(); spans.len()];
    for (item, col) in items.into_iter().zip(assigned) {
        buckets[col].push(item);
    }

    let columns: Vec<Column> = spans
        .iter()
        .zip(buckets)
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(span, bucket)| Column {
            left: span.left,
            right: span.right,
            rows: group_indexed(bucket, tolerance),
        })
        .collect();

    debug!(
        "Smart ordering: {} columns, tolerance {:.2}",
        columns.len(),
        tolerance
    );
    OrderedPage { columns }
}

fn single_column(items: Vec<Indexed>, tolerance: f32) -> OrderedPage {
    if items.is_empty() {
        return OrderedPage::default();
    }
    let (left, right) = extent(items.iter().map(|i| &i.run));
    OrderedPage {
        columns: vec![Column {
            left,
            right,
            rows: group_indexed(items, tolerance),
        }],
    }
}

/// Group runs into rows with Simple-mode ordering.
///
/// Rows come out top to bottom; runs within a row left to right. Equal
/// coordinates keep input order.
pub fn group_rows(runs: Vec<TextRun>, tolerance: f32) -> Vec<Row> {
    let items = runs
        .into_iter()
        .enumerate()
        .map(|(idx, run)| Indexed { idx, run })
        .collect();
    group_indexed(items, tolerance)
}

fn group_indexed(mut items: Vec<Indexed>, tolerance: f32) -> Vec<Row> {
    items.sort_by(|a, b| b.run.y.total_cmp(&a.run.y).then(a.idx.cmp(&b.idx)));

    let mut rows: Vec<Vec<Indexed>> = Vec::new();
    let mut seed_y = f32::NAN;
    for item in items {
        let joins = match rows.last() {
            Some(_) => (seed_y - item.run.y).abs() <= tolerance,
            None => false,
        };
        if joins {
            if let Some(row) = rows.last_mut() {
                row.push(item);
            }
        } else {
            seed_y = item.run.y;
            rows.push(vec![item]);
        }
    }

    rows.into_iter()
        .map(|mut row| {
            let y = row[0].run.y;
            row.sort_by(|a, b| a.run.x.total_cmp(&b.run.x).then(a.idx.cmp(&b.idx)));
            Row {
                y,
                runs: row.into_iter().map(|i| i.run).collect(),
            }
        })
        .collect()
}

/// Baseline tolerance for one page: a fraction of the modal font size, never
/// below the configured minimum.
///
/// Sizes are quantised to 0.5 units before counting; ties prefer the smaller
/// size.
pub fn row_tolerance(runs: &[TextRun], layout: &LayoutConfig) -> f32 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for run in runs {
        if run.font_size.is_finite() && run.font_size > 0.0 {
            *counts.entry((run.font_size * 2.0).round() as i64).or_default() += 1;
        }
    }

    let mut modal: Option<(i64, usize)> = None;
    for (&key, &count) in &counts {
        if modal.is_none_or(|(_, best)| count > best) {
            modal = Some((key, count));
        }
    }

    match modal {
        Some((key, _)) => (layout.row_tolerance_factor * key as f32 / 2.0)
            .max(layout.min_row_tolerance),
        None => layout.min_row_tolerance,
    }
}

/// Find column x-ranges from gaps in x-coverage.
///
/// Returns an empty or single-element vector when the page has no
/// qualifying gap.
pub fn detect_columns(
    runs: &[TextRun],
    layout: &LayoutConfig,
    page_width: Option<f32>,
) -> Vec<ColumnSpan> {
    if runs.len() < 2 {
        return Vec::new();
    }
    let (left, right) = extent(runs.iter());
    let span = right - left;
    if !span.is_finite() || span <= 0.0 {
        return Vec::new();
    }

    let reference_width = page_width.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(span);
    let min_gap = layout.column_gap_fraction * reference_width;

    // Resolution follows the gap threshold, not the coordinate unit.
    let bins = if min_gap > 0.0 {
        (span / (min_gap / BINS_PER_MIN_GAP)).ceil() as usize
    } else {
        MAX_HISTOGRAM_BINS
    }
    .clamp(1, MAX_HISTOGRAM_BINS);
    let bin_width = span / bins as f32;
    let to_bin = |x: f32| (((x - left) / bin_width) as usize).min(bins - 1);

    // Difference array: +1 at the first covered bin, -1 after the last.
    let mut delta = vec![0i64; bins + 1];
    for run in runs {
        let first = to_bin(run.x);
        let last = if run.width > 0.0 {
            let end = ((run.right() - left) / bin_width).ceil() as usize;
            end.saturating_sub(1).clamp(first, bins - 1)
        } else {
            first
        };
        delta[first] += 1;
        delta[last + 1] -= 1;
    }
    let mut coverage = Vec::with_capacity(bins);
    let mut running = 0i64;
    for d in &delta[..bins] {
        running += d;
        coverage.push(running);
    }

    let gaps = GapScan {
        coverage: &coverage,
        left,
        bin_width,
        min_gap,
    };
    let noise = (runs.len() as f32 * layout.near_empty_fraction).floor() as i64;
    let boundaries = gaps.boundaries(noise);
    if !boundaries.is_empty() {
        return spans_between(left, boundaries, right);
    }
    if noise >= 1 || runs.len() < 3 {
        return Vec::new();
    }

    // Too few runs for the fractional floor to absorb a single run
    // straddling the gap (a full-width title). Tolerate one, but only when
    // every resulting column still holds at least two runs of its own.
    let boundaries = gaps.boundaries(1);
    if boundaries.is_empty() {
        return Vec::new();
    }
    let spans = spans_between(left, boundaries, right);
    let populated = spans
        .iter()
        .all(|span| runs.iter().filter(|r| span.contains(r)).count() >= 2);
    if populated {
        spans
    } else {
        Vec::new()
    }
}

fn spans_between(left: f32, boundaries: Vec<f32>, right: f32) -> Vec<ColumnSpan> {
    let mut edges = Vec::with_capacity(boundaries.len() + 2);
    edges.push(left);
    edges.extend(boundaries);
    edges.push(right);
    edges
        .windows(2)
        .map(|w| ColumnSpan {
            left: w[0],
            right: w[1],
        })
        .collect()
}

/// A coverage histogram and what counts as a wide enough gap in it.
struct GapScan<'a> {
    coverage: &'a [i64],
    left: f32,
    bin_width: f32,
    min_gap: f32,
}

impl GapScan<'_> {
    /// Midpoints of interior stretches covered by at most `noise` runs and
    /// wider than `min_gap`.
    fn boundaries(&self, noise: i64) -> Vec<f32> {
        let occupied = |c: i64| c > noise;
        let (Some(first), Some(last)) = (
            self.coverage.iter().position(|&c| occupied(c)),
            self.coverage.iter().rposition(|&c| occupied(c)),
        ) else {
            return Vec::new();
        };

        let mut boundaries = Vec::new();
        let mut gap_start: Option<usize> = None;
        for (bin, &c) in self.coverage.iter().enumerate().take(last + 1).skip(first) {
            match (occupied(c), gap_start) {
                (false, None) => gap_start = Some(bin),
                (true, Some(start)) => {
                    let len = bin - start;
                    if len as f32 * self.bin_width > self.min_gap {
                        boundaries
                            .push(self.left + (start as f32 + len as f32 / 2.0) * self.bin_width);
                    }
                    gap_start = None;
                }
                _ => {}
            }
        }
        boundaries
    }
}

/// Column holding the larger part of the run's extent; leftmost on ties.
/// A zero-width run goes to the column containing its `x`.
fn assign_column(run: &TextRun, spans: &[ColumnSpan]) -> usize {
    if run.width > 0.0 {
        let mut best: Option<(usize, f32)> = None;
        for (i, span) in spans.iter().enumerate() {
            let overlap = span.overlap(run);
            if overlap > 0.0 && best.is_none_or(|(_, b)| overlap > b) {
                best = Some((i, overlap));
            }
        }
        if let Some((i, _)) = best {
            return i;
        }
    }
    spans
        .iter()
        .position(|s| run.x < s.right)
        .unwrap_or(spans.len() - 1)
}

fn extent<'a>(runs: impl Iterator<Item = &'a TextRun>) -> (f32, f32) {
    runs.fold((f32::INFINITY, f32::NEG_INFINITY), |(l, r), run| {
        (l.min(run.x), r.max(run.right()))
    })
}

/// Compare two runs by reading position under Simple ordering, ignoring
/// tolerance: top first, then left first.
pub fn reading_cmp(a: &TextRun, b: &TextRun) -> Ordering {
    b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        TextRun::new(x, y, 10.0, "Helvetica", text)
    }

    fn texts(runs: &[TextRun]) -> Vec<&str> {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn page_text(page: &OrderedPage) -> String {
        page.rows().map(Row::text).collect::<Vec<_>>().join("\n")
    }

    fn layout() -> LayoutConfig {
        LayoutConfig::default()
    }

    #[test]
    fn simple_rows_top_to_bottom_left_to_right() {
        let runs = vec![run("A", 0.0, 10.0), run("B", 5.0, 10.0), run("C", 0.0, 0.0)];
        let page = order_page(runs, OrderingMode::Simple, &layout(), None);
        assert_eq!(page.row_count(), 2);
        let rows: Vec<_> = page.rows().collect();
        assert_eq!(rows[0].y, 10.0);
        assert_eq!(rows[0].text(), "AB");
        assert_eq!(rows[1].y, 0.0);
        assert_eq!(page_text(&page), "AB\nC");
    }

    #[test]
    fn runs_within_tolerance_share_a_row() {
        // modal size 10 → tolerance 5
        let runs = vec![run("b", 20.0, 99.0), run("a", 0.0, 100.0), run("c", 40.0, 96.0)];
        let rows = group_rows(runs, 5.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(), "abc");
        assert_eq!(rows[0].y, 100.0);
    }

    #[test]
    fn tolerance_is_measured_from_the_seed() {
        // 100 → 96 joins (4 ≤ 5), 100 → 93 does not (7 > 5) even though 96 → 93 is 3.
        let runs = vec![run("a", 0.0, 100.0), run("b", 10.0, 96.0), run("c", 20.0, 93.0)];
        let rows = group_rows(runs, 5.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(), "ab");
        assert_eq!(rows[1].text(), "c");
    }

    #[test]
    fn row_tolerance_uses_modal_size_with_floor() {
        let mut runs = vec![run("a", 0.0, 0.0), run("b", 0.0, 0.0)];
        runs.push(TextRun::new(0.0, 0.0, 24.0, "Bold", "Title"));
        assert!((row_tolerance(&runs, &layout()) - 5.0).abs() < 1e-6);

        let tiny = vec![TextRun::new(0.0, 0.0, 1.0, "X", "x")];
        assert_eq!(row_tolerance(&tiny, &layout()), 1.0);
        assert_eq!(row_tolerance(&[], &layout()), 1.0);
    }

    #[test]
    fn modal_tie_prefers_smaller_size() {
        let runs = vec![
            TextRun::new(0.0, 0.0, 12.0, "F", "a"),
            TextRun::new(0.0, 0.0, 8.0, "F", "b"),
        ];
        assert!((row_tolerance(&runs, &layout()) - 4.0).abs() < 1e-6);
    }

    fn two_column_runs() -> Vec<TextRun> {
        // left column x∈[0,5], right column x∈[50,55]; interleaved in stream order
        vec![
            run("L1", 0.0, 100.0).with_width(5.0),
            run("R1", 50.0, 100.0).with_width(5.0),
            run("L2", 0.0, 80.0).with_width(5.0),
            run("R2", 50.0, 80.0).with_width(5.0),
            run("L3", 0.0, 60.0).with_width(5.0),
            run("R3", 50.0, 60.0).with_width(5.0),
        ]
    }

    #[test]
    fn smart_reads_left_column_first() {
        let page = order_page(two_column_runs(), OrderingMode::Smart, &layout(), None);
        assert!(page.is_multi_column());
        assert_eq!(page_text(&page), "L1\nL2\nL3\nR1\nR2\nR3");
    }

    #[test]
    fn simple_interleaves_columns() {
        let page = order_page(two_column_runs(), OrderingMode::Simple, &layout(), None);
        assert!(!page.is_multi_column());
        assert_eq!(page_text(&page), "L1R1\nL2R2\nL3R3");
    }

    #[test]
    fn detects_gap_boundary_in_the_middle() {
        let spans = detect_columns(&two_column_runs(), &layout(), None);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].left, 0.0);
        assert!(spans[0].right > 5.0 && spans[0].right < 50.0);
        assert_eq!(spans[1].right, 55.0);
    }

    #[test]
    fn narrow_gap_relative_to_page_is_not_a_column() {
        // 45-unit gap on a 2000-unit wide page is below 5%.
        let spans = detect_columns(&two_column_runs(), &layout(), Some(2000.0));
        assert!(spans.is_empty());
        let smart = order_runs(two_column_runs(), OrderingMode::Smart, &layout(), Some(2000.0));
        let simple = order_runs(two_column_runs(), OrderingMode::Simple, &layout(), Some(2000.0));
        assert_eq!(smart, simple);
    }

    #[test]
    fn single_column_smart_equals_simple() {
        let runs = vec![
            run("The quick", 72.0, 700.0),
            run(" brown fox", 117.0, 700.0),
            run("jumps over", 72.0, 686.0),
            run("the lazy dog", 72.0, 672.0),
            TextRun::new(72.0, 720.0, 18.0, "Helvetica-Bold", "Heading"),
        ];
        let smart = order_page(runs.clone(), OrderingMode::Smart, &layout(), Some(612.0));
        let simple = order_page(runs, OrderingMode::Simple, &layout(), Some(612.0));
        assert_eq!(smart, simple);
        assert_eq!(
            page_text(&smart),
            "Heading\nThe quick brown fox\njumps over\nthe lazy dog"
        );
    }

    #[test]
    fn smart_is_deterministic() {
        let runs = two_column_runs();
        let first = order_runs(runs.clone(), OrderingMode::Smart, &layout(), None);
        for _ in 0..10 {
            assert_eq!(order_runs(runs.clone(), OrderingMode::Smart, &layout(), None), first);
        }
    }

    #[test]
    fn equal_coordinates_keep_input_order() {
        let runs = vec![run("first", 0.0, 10.0), run("second", 0.0, 10.0), run("third", 0.0, 10.0)];
        let ordered = order_runs(runs, OrderingMode::Smart, &layout(), None);
        assert_eq!(texts(&ordered), vec!["first", "second", "third"]);
    }

    #[test]
    fn straddling_run_goes_to_larger_overlap() {
        let mut runs = Vec::new();
        for i in 0..10 {
            let y = 100.0 - i as f32 * 10.0;
            runs.push(run(&format!("l{i}"), 0.0, y).with_width(20.0));
            runs.push(run(&format!("r{i}"), 60.0, y).with_width(20.0));
        }
        // A heading spanning most of the page; with 21 runs one stray run
        // over the gap is tolerated as noise.
        runs.push(run("Heading", 0.0, 120.0).with_width(75.0));

        let page = order_page(runs, OrderingMode::Smart, &layout(), None);
        assert_eq!(page.columns.len(), 2);
        let left: Vec<String> = page.columns[0].rows.iter().map(Row::text).collect();
        assert_eq!(left[0], "Heading");
        assert_eq!(left.len(), 11);
        let right: Vec<String> = page.columns[1].rows.iter().map(Row::text).collect();
        assert_eq!(right[0], "r0");
        assert_eq!(right.len(), 10);
    }

    #[test]
    fn straddling_title_on_a_short_page() {
        let mut runs = Vec::new();
        for i in 0..3 {
            let y = 100.0 - i as f32 * 10.0;
            runs.push(run(&format!("L{}", i + 1), 0.0, y).with_width(20.0));
            runs.push(run(&format!("R{}", i + 1), 60.0, y).with_width(20.0));
        }
        runs.push(run("Heading", 0.0, 120.0).with_width(75.0));

        let page = order_page(runs, OrderingMode::Smart, &layout(), None);
        assert_eq!(page.columns.len(), 2);
        // 40 units of the title fall in the left column, 35 in the right.
        assert_eq!(page_text(&page), "Heading\nL1\nL2\nL3\nR1\nR2\nR3");
    }

    #[test]
    fn lone_bridging_run_without_real_columns_is_not_split() {
        // A single short run, then a tab-separated run further along the
        // same line: one run each side of the gap is not a column layout.
        let runs = vec![
            run("The", 0.0, 100.0).with_width(20.0),
            run("total", 70.0, 100.0).with_width(30.0),
            run("spanning line of prose", 0.0, 90.0).with_width(100.0),
        ];
        assert!(detect_columns(&runs, &layout(), None).is_empty());
        let smart = order_runs(runs.clone(), OrderingMode::Smart, &layout(), None);
        let simple = order_runs(runs, OrderingMode::Simple, &layout(), None);
        assert_eq!(smart, simple);
    }

    #[test]
    fn column_detection_is_scale_free() {
        let scaled: Vec<TextRun> = two_column_runs()
            .into_iter()
            .map(|r| {
                let width = r.width * 0.01;
                TextRun::new(r.x * 0.01, r.y * 0.01, 0.1, "Helvetica", r.text).with_width(width)
            })
            .collect();

        let spans = detect_columns(&scaled, &layout(), None);
        assert_eq!(spans.len(), 2);
        let full = detect_columns(&two_column_runs(), &layout(), None);
        assert!((spans[0].right * 100.0 - full[0].right).abs() < 0.5);

        // The fixed 1.0 minimum tolerance merges each column's rows.
        let page = order_page(scaled, OrderingMode::Smart, &layout(), None);
        assert_eq!(page.columns.len(), 2);
        assert_eq!(page_text(&page), "L1L2L3\nR1R2R3");
    }

    #[test]
    fn three_columns() {
        let runs = vec![
            run("c", 200.0, 50.0).with_width(40.0),
            run("a", 0.0, 50.0).with_width(40.0),
            run("b", 100.0, 50.0).with_width(40.0),
            run("a2", 0.0, 30.0).with_width(40.0),
            run("b2", 100.0, 30.0).with_width(40.0),
            run("c2", 200.0, 30.0).with_width(40.0),
        ];
        let page = order_page(runs, OrderingMode::Smart, &layout(), None);
        assert_eq!(page.columns.len(), 3);
        assert_eq!(page_text(&page), "a\na2\nb\nb2\nc\nc2");
    }

    #[test]
    fn zero_width_runs_use_containing_column() {
        let spans = vec![
            ColumnSpan { left: 0.0, right: 30.0 },
            ColumnSpan { left: 30.0, right: 60.0 },
        ];
        let r = run("x", 45.0, 0.0).with_width(0.0);
        assert_eq!(assign_column(&r, &spans), 1);
        let r = run("x", 10.0, 0.0).with_width(0.0);
        assert_eq!(assign_column(&r, &spans), 0);
    }

    #[test]
    fn overlap_ties_go_left() {
        let spans = vec![
            ColumnSpan { left: 0.0, right: 30.0 },
            ColumnSpan { left: 30.0, right: 60.0 },
        ];
        let r = run("x", 20.0, 0.0).with_width(20.0);
        assert_eq!(assign_column(&r, &spans), 0);
    }

    #[test]
    fn empty_input_yields_empty_page() {
        let page = order_page(Vec::new(), OrderingMode::Smart, &layout(), None);
        assert_eq!(page.row_count(), 0);
        assert!(page.columns.is_empty());
    }

    #[test]
    fn reading_cmp_orders_top_then_left() {
        let a = run("a", 0.0, 10.0);
        let b = run("b", 5.0, 10.0);
        let c = run("c", 0.0, 0.0);
        assert_eq!(reading_cmp(&a, &b), Ordering::Less);
        assert_eq!(reading_cmp(&b, &c), Ordering::Less);
    }
}
