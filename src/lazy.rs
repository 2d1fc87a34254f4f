//! On-demand page access with a bounded set of resident pages.
//!
//! [`LazyPageManager`] extracts a page the first time it is asked for and
//! keeps the result, up to `max_resident_pages` of them. Past the bound the
//! least-recently-requested page is dropped and will be re-extracted if
//! requested again. The resident set is an [`LruCache`], so eviction follows
//! the same use-counter discipline as the object and font caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::LruCache;
use crate::config::ExtractionConfig;
use crate::document::Document;
use crate::error::PdfTextError;
use crate::output::ExtractedPage;
use crate::pipeline::page::extract_page_full;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageManagerStats {
    pub total_pages: usize,
    pub resident_pages: usize,
    pub max_resident: usize,
    /// Pages extracted so far, re-extractions included.
    pub extractions: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct LazyPageManager {
    doc: Arc<Document>,
    config: ExtractionConfig,
    resident: LruCache<usize, Arc<ExtractedPage>>,
    extractions: AtomicU64,
}

impl LazyPageManager {
    pub fn new(doc: Arc<Document>, config: &ExtractionConfig) -> Self {
        Self {
            doc,
            resident: LruCache::new(config.max_resident_pages.max(1)),
            config: config.clone(),
            extractions: AtomicU64::new(0),
        }
    }

    /// Return page `page_num`, extracting it if it is not resident.
    ///
    /// # Errors
    /// [`PdfTextError::PageOutOfRange`] for a page outside the document, or
    /// whatever page extraction fails with. Failures are not cached.
    pub fn get_page(&self, page_num: usize) -> Result<Arc<ExtractedPage>, PdfTextError> {
        self.doc.check_page(page_num)?;
        self.resident.get_or_try_insert_with(&page_num, || {
            self.extractions.fetch_add(1, Ordering::Relaxed);
            debug!("Lazy load of page {}", page_num);
            extract_page_full(&self.doc, page_num, &self.config).map(Arc::new)
        })
    }

    /// Shorthand for the page's text.
    pub fn get_text(&self, page_num: usize) -> Result<String, PdfTextError> {
        Ok(self.get_page(page_num)?.text.clone())
    }

    pub fn is_resident(&self, page_num: usize) -> bool {
        self.resident.contains(&page_num)
    }

    /// Resident page numbers, least recently used first.
    pub fn resident_pages(&self) -> Vec<usize> {
        self.resident.keys_by_recency()
    }

    /// Drop one page. Returns whether it was resident.
    pub fn evict(&self, page_num: usize) -> bool {
        self.resident.remove(&page_num).is_some()
    }

    pub fn clear(&self) {
        self.resident.clear();
    }

    /// Change the bound (minimum 1), evicting down to it immediately.
    /// Returns the evicted page numbers, oldest first.
    pub fn set_max_resident(&self, n: usize) -> Vec<usize> {
        self.resident.set_capacity(n.max(1))
    }

    pub fn total_pages(&self) -> usize {
        self.doc.page_count()
    }

    pub fn stats(&self) -> PageManagerStats {
        let cache = self.resident.stats();
        PageManagerStats {
            total_pages: self.doc.page_count(),
            resident_pages: cache.size,
            max_resident: cache.capacity,
            extractions: self.extractions.load(Ordering::Relaxed),
            hits: cache.hits,
            misses: cache.misses,
        }
    }
}
