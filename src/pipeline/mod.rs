//! Per-page extraction stages.
//!
//! ## Data Flow
//!
//! ```text
//! RunSource ──▶ resolve fonts ──▶ order ──▶ assemble
//! (runs)        (font cache)      (rows,    (pooled buffer)
//!                                  columns)
//! ```
//!
//! 1. [`page`]: fetch a page's runs, resolve each run's font through the
//!    document's font cache, then assemble plain text, styled segments or
//!    row groups
//! 2. [`order`]: reading-order reconstruction; pure and infallible
//!
//! Both stages are synchronous. Concurrency lives one level up in
//! [`crate::batch`] and [`crate::stream`].

pub mod order;
pub mod page;
