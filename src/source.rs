//! The positioned-run source: the boundary between this crate and whatever
//! parses the document.
//!
//! Parsing cross-reference tables, decoding streams and reading font
//! programs all happen behind [`RunSource`]. The extraction pipeline only
//! ever sees, per page, a list of [`PositionedRun`]s plus font and object
//! lookups by reference.
//!
//! [`MemorySource`] is a complete in-memory implementation, loadable from a
//! JSON run dump. The `pdftext` binary and the test-suite both use it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::error::PdfTextError;

/// An indirect object reference (`num gen R`).
///
/// Unknown keys are rejected so that, inside an untagged [`ObjectValue`], a
/// dictionary that merely has a `num` entry is not taken for a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectRef {
    pub num: u32,
    #[serde(default)]
    pub gen: u16,
}

impl ObjectRef {
    pub const fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// Fonts are addressed by their object reference, which is unique within a
/// document (resource names such as `/F1` are only unique per page).
pub type FontRef = ObjectRef;

/// A run exactly as the source reports it, font still unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedRun {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font: FontRef,
    pub text: String,
}

/// Glyph metrics in 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    #[serde(default = "FontMetrics::default_ascent")]
    pub ascent: f32,
    #[serde(default = "FontMetrics::default_descent")]
    pub descent: f32,
    /// Average advance width, used to estimate a run's horizontal extent.
    #[serde(default = "FontMetrics::default_avg_width")]
    pub avg_width: f32,
}

impl FontMetrics {
    fn default_ascent() -> f32 {
        750.0
    }
    fn default_descent() -> f32 {
        -250.0
    }
    fn default_avg_width() -> f32 {
        500.0
    }

    /// Estimated width of `text` set at `font_size`.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * self.avg_width / 1000.0 * font_size
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            ascent: Self::default_ascent(),
            descent: Self::default_descent(),
            avg_width: Self::default_avg_width(),
        }
    }
}

/// A resolved font: what the extractor needs to label and measure runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub name: String,
    #[serde(default)]
    pub metrics: FontMetrics,
}

/// A decoded document object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Reference(ObjectRef),
    Text(String),
    Array(Vec<ObjectValue>),
    Dictionary(BTreeMap<String, ObjectValue>),
}

/// A text run with its font resolved; the unit the reading-order
/// reconstructor works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    /// Estimated horizontal extent, from the font's average glyph width.
    pub width: f32,
    pub font_size: f32,
    pub font_name: String,
    pub text: String,
}

impl TextRun {
    pub fn new(
        x: f32,
        y: f32,
        font_size: f32,
        font_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let width = FontMetrics::default().text_width(&text, font_size);
        Self {
            x,
            y,
            width,
            font_size,
            font_name: font_name.into(),
            text,
        }
    }

    /// Override the estimated width.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width.max(0.0);
        self
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Failures reported by a [`RunSource`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("page {0} does not exist")]
    MissingPage(usize),

    #[error("unknown font reference {0}")]
    UnknownFont(FontRef),

    #[error("unknown object reference {0}")]
    UnknownObject(ObjectRef),

    #[error("corrupt content: {0}")]
    Corrupt(String),
}

/// The positioned-run source collaborator.
///
/// Implementations must be `Send + Sync`: the batch pipeline calls them from
/// several worker threads at once. Page numbers are 1-indexed.
pub trait RunSource: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// The page's runs in document-native (content stream) order.
    fn get_runs(&self, page_num: usize) -> Result<Vec<PositionedRun>, SourceError>;

    fn resolve_font(&self, font: FontRef) -> Result<FontInfo, SourceError>;

    fn resolve_object(&self, reference: ObjectRef) -> Result<ObjectValue, SourceError>;

    /// Resource objects the page's content depends on (page dictionary,
    /// resource dictionaries, XObjects). The page extractor resolves them
    /// through the shared object cache; any failure fails the page.
    fn page_resources(&self, page_num: usize) -> Result<Vec<ObjectRef>, SourceError> {
        let _ = page_num;
        Ok(Vec::new())
    }

    /// Page width in user-space units, when the source knows it.
    fn page_width(&self, page_num: usize) -> Option<f32> {
        let _ = page_num;
        None
    }
}

// ── In-memory source ─────────────────────────────────────────────────────

/// One page of a run dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPage {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub runs: Vec<PositionedRun>,
    #[serde(default)]
    pub resources: Vec<ObjectRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FontEntry {
    reference: FontRef,
    #[serde(flatten)]
    info: FontInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectEntry {
    reference: ObjectRef,
    value: ObjectValue,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RunDump {
    #[serde(default)]
    pages: Vec<MemoryPage>,
    #[serde(default)]
    fonts: Vec<FontEntry>,
    #[serde(default)]
    objects: Vec<ObjectEntry>,
}

/// A [`RunSource`] backed by plain vectors and maps.
///
/// # Example
/// ```rust
/// use edgequake_pdftext::source::{MemorySource, ObjectRef, RunSource};
///
/// let json = r#"{
///   "pages": [{ "runs": [{ "x": 0, "y": 10, "font_size": 10, "font": { "num": 1 }, "text": "Hi" }] }],
///   "fonts": [{ "reference": { "num": 1 }, "name": "Helvetica" }]
/// }"#;
/// let source = MemorySource::from_json_str(json).unwrap();
/// assert_eq!(source.page_count(), 1);
/// assert_eq!(source.resolve_font(ObjectRef::new(1, 0)).unwrap().name, "Helvetica");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<MemoryPage>,
    fonts: HashMap<FontRef, FontInfo>,
    objects: HashMap<ObjectRef, ObjectValue>,
    broken_pages: HashMap<usize, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON run dump.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let dump: RunDump = serde_json::from_str(json)?;
        Ok(Self {
            pages: dump.pages,
            fonts: dump.fonts.into_iter().map(|f| (f.reference, f.info)).collect(),
            objects: dump
                .objects
                .into_iter()
                .map(|o| (o.reference, o.value))
                .collect(),
            broken_pages: HashMap::new(),
        })
    }

    /// Load a JSON run dump from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PdfTextError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| PdfTextError::SourceLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_json_str(&raw).map_err(|e| PdfTextError::SourceLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Append a page; returns its 1-indexed page number.
    pub fn push_page(&mut self, runs: Vec<PositionedRun>) -> usize {
        self.pages.push(MemoryPage {
            runs,
            ..MemoryPage::default()
        });
        self.pages.len()
    }

    pub fn push_page_with_width(&mut self, runs: Vec<PositionedRun>, width: f32) -> usize {
        self.pages.push(MemoryPage {
            width: Some(width),
            runs,
            ..MemoryPage::default()
        });
        self.pages.len()
    }

    pub fn add_font(&mut self, reference: FontRef, info: FontInfo) {
        self.fonts.insert(reference, info);
    }

    pub fn add_object(&mut self, reference: ObjectRef, value: ObjectValue) {
        self.objects.insert(reference, value);
    }

    /// Declare the resource objects of `page_num`. No-op for a page that
    /// does not exist.
    pub fn set_resources(&mut self, page_num: usize, resources: Vec<ObjectRef>) {
        if let Some(page) = page_num.checked_sub(1).and_then(|i| self.pages.get_mut(i)) {
            page.resources = resources;
        }
    }

    /// Make `get_runs` fail for `page_num` with a corrupt-content error.
    pub fn mark_corrupt(&mut self, page_num: usize, detail: impl Into<String>) {
        self.broken_pages.insert(page_num, detail.into());
    }
}

impl RunSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn get_runs(&self, page_num: usize) -> Result<Vec<PositionedRun>, SourceError> {
        if let Some(detail) = self.broken_pages.get(&page_num) {
            return Err(SourceError::Corrupt(detail.clone()));
        }
        page_num
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(|p| p.runs.clone())
            .ok_or(SourceError::MissingPage(page_num))
    }

    fn resolve_font(&self, font: FontRef) -> Result<FontInfo, SourceError> {
        self.fonts
            .get(&font)
            .cloned()
            .ok_or(SourceError::UnknownFont(font))
    }

    fn resolve_object(&self, reference: ObjectRef) -> Result<ObjectValue, SourceError> {
        self.objects
            .get(&reference)
            .cloned()
            .ok_or(SourceError::UnknownObject(reference))
    }

    fn page_resources(&self, page_num: usize) -> Result<Vec<ObjectRef>, SourceError> {
        page_num
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(|p| p.resources.clone())
            .ok_or(SourceError::MissingPage(page_num))
    }

    fn page_width(&self, page_num: usize) -> Option<f32> {
        page_num
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .and_then(|p| p.width)
    }
}
