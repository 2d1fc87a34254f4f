//! A run source plus the shared per-document state extraction needs.
//!
//! ## Why a wrapper?
//!
//! Every worker extracting a page of the same document should share one
//! object cache, one font cache and one scratch-buffer pool. [`Document`]
//! owns all of them next to the [`RunSource`] and is handed to workers as an
//! `Arc<Document>`. The caches lock internally, so `&Document` is all a
//! worker needs.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{object_cache_capacity, FontCache, ObjectCache};
use crate::config::ExtractionConfig;
use crate::error::PdfTextError;
use crate::pool::BufferPool;
use crate::source::{
    FontInfo, FontRef, MemorySource, ObjectRef, ObjectValue, PositionedRun, RunSource,
    SourceError,
};

pub struct Document {
    source: Arc<dyn RunSource>,
    objects: ObjectCache,
    fonts: FontCache,
    buffers: BufferPool,
}

impl Document {
    /// Wrap `source`, sizing caches and the buffer pool from `config`.
    ///
    /// With no explicit object-cache capacity the cache is sized for the
    /// whole document; batch calls narrow it to the pages they request.
    pub fn new(source: Arc<dyn RunSource>, config: &ExtractionConfig) -> Self {
        let object_capacity = config
            .object_cache_capacity
            .unwrap_or_else(|| object_cache_capacity(source.page_count()));
        Self {
            objects: ObjectCache::new(object_capacity),
            fonts: FontCache::new(config.font_cache_capacity),
            buffers: BufferPool::new(config.buffer_pool_size, config.buffer_capacity),
            source,
        }
    }

    pub fn from_source(source: impl RunSource + 'static, config: &ExtractionConfig) -> Self {
        Self::new(Arc::new(source), config)
    }

    /// Load a JSON run dump from disk.
    pub fn open(path: impl AsRef<Path>, config: &ExtractionConfig) -> Result<Self, PdfTextError> {
        let source = MemorySource::from_path(path)?;
        Ok(Self::from_source(source, config))
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    pub fn page_width(&self, page_num: usize) -> Option<f32> {
        self.source.page_width(page_num)
    }

    pub fn source(&self) -> &Arc<dyn RunSource> {
        &self.source
    }

    pub fn check_page(&self, page_num: usize) -> Result<(), PdfTextError> {
        let total = self.page_count();
        if page_num == 0 || page_num > total {
            return Err(PdfTextError::PageOutOfRange {
                page: page_num,
                total,
            });
        }
        Ok(())
    }

    /// The page's raw runs, in source order.
    pub fn runs(&self, page_num: usize) -> Result<Vec<PositionedRun>, PdfTextError> {
        self.source
            .get_runs(page_num)
            .map_err(|e| PdfTextError::SourceUnavailable {
                page: page_num,
                detail: e.to_string(),
            })
    }

    /// Resolve a font through the font cache.
    pub fn resolve_font(
        &self,
        page_num: usize,
        font: FontRef,
    ) -> Result<Arc<FontInfo>, PdfTextError> {
        self.fonts.get_or_try_insert_with(&font, || {
            debug!("Font cache miss: {}", font);
            self.source
                .resolve_font(font)
                .map(Arc::new)
                .map_err(|e| PdfTextError::FontResolution {
                    page: page_num,
                    font,
                    detail: e.to_string(),
                })
        })
    }

    /// Resolve an object through the object cache. `page_num` is the page
    /// the lookup is made for and tags any error.
    pub fn resolve_object(
        &self,
        page_num: usize,
        reference: ObjectRef,
    ) -> Result<Arc<ObjectValue>, PdfTextError> {
        self.objects.get_or_try_insert_with(&reference, || {
            debug!("Object cache miss: {}", reference);
            self.source
                .resolve_object(reference)
                .map(Arc::new)
                .map_err(|e: SourceError| PdfTextError::ObjectResolution {
                    page: page_num,
                    reference,
                    detail: e.to_string(),
                })
        })
    }

    /// Resolve every resource object the page declares, in declaration
    /// order. Pages sharing resources decode each object once.
    pub fn page_resources(
        &self,
        page_num: usize,
    ) -> Result<Vec<Arc<ObjectValue>>, PdfTextError> {
        let refs = self
            .source
            .page_resources(page_num)
            .map_err(|e| PdfTextError::SourceUnavailable {
                page: page_num,
                detail: e.to_string(),
            })?;
        refs.into_iter()
            .map(|r| self.resolve_object(page_num, r))
            .collect()
    }

    pub fn object_cache(&self) -> &ObjectCache {
        &self.objects
    }

    pub fn font_cache(&self) -> &FontCache {
        &self.fonts
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("page_count", &self.page_count())
            .field("objects", &self.objects)
            .field("fonts", &self.fonts)
            .field("buffers", &self.buffers.stats())
            .finish()
    }
}
