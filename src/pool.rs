//! Reusable string-building buffers.
//!
//! Assembling page text allocates a growing `String` per page. Under a wide
//! worker pool that churns the allocator; instead workers borrow a buffer
//! from a [`BufferPool`], build into it, copy the finished text out once and
//! hand the buffer back with its capacity intact.
//!
//! Acquisition is scoped: [`PooledBuffer`] returns its buffer on drop, so
//! early returns and `?` on error paths release it too. A buffer is owned by
//! exactly one guard at a time; the pool only ever holds idle buffers.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftext::pool::BufferPool;
//!
//! let pool = BufferPool::new(4, 256);
//! {
//!     let mut buf = pool.acquire();
//!     buf.push_str("hello");
//!     assert_eq!(buf.as_str(), "hello");
//! } // returned here
//! let buf = pool.acquire();
//! assert!(buf.is_empty());
//! assert!(buf.capacity() >= 256);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Default number of idle buffers retained.
pub const DEFAULT_POOL_SIZE: usize = 32;

/// Default initial capacity of a fresh buffer (bytes).
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// Buffers that grew past this are dropped instead of pooled so one huge
/// page cannot pin memory for the life of the document.
pub const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub idle: usize,
}

#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    max_idle: usize,
    initial_capacity: usize,
    created: AtomicU64,
    reused: AtomicU64,
}

impl BufferPool {
    pub fn new(max_idle: usize, initial_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            initial_capacity,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Borrow a cleared buffer; it is released when the guard drops.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        PooledBuffer {
            pool: self,
            buf: self.take(),
        }
    }

    /// Take a buffer out of the pool without a guard. Pair with
    /// [`BufferPool::release`].
    pub fn take(&self) -> String {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop();
        match recycled {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                String::with_capacity(self.initial_capacity)
            }
        }
    }

    /// Return a buffer. It is cleared here; capacity is kept.
    pub fn release(&self, mut buf: String) {
        if buf.capacity() == 0 || buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(|p| p.into_inner());
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle.lock().unwrap_or_else(|p| p.into_inner()).len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE, DEFAULT_BUFFER_CAPACITY)
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer<'pool> {
    pool: &'pool BufferPool,
    buf: String,
}

impl PooledBuffer<'_> {
    /// Keep the buffer instead of returning it to the pool.
    pub fn detach(mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    // A detached guard holds an empty, unallocated string, which `release`
    // discards.
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
