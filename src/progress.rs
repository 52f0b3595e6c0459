//! Progress-callback trait for per-page reflow events.
//!
//! Inject an [`Arc<dyn ReflowProgressCallback>`] via
//! [`crate::config::ReflowConfigBuilder::progress_callback`] to receive
//! events as the orchestrator processes each page.
//!
//! # Example
//!
//! ```rust
//! use pdf_reflow::{ReflowProgressCallback, ReflowConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     plans: Arc<AtomicUsize>,
//! }
//!
//! impl ReflowProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, plans: usize) {
//!         self.plans.fetch_add(plans, Ordering::SeqCst);
//!         eprintln!("Page {}/{} reflowed ({} plans)", page_num, total_pages, plans);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     plans: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ReflowConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReflowProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `page_concurrency > 1` the page events may
/// arrive concurrently from different tasks; protect shared state with
/// `Mutex` or atomics.
pub trait ReflowProgressCallback: Send + Sync {
    /// Called once before any page is processed.
    fn on_reflow_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when grouping starts on a page.
    ///
    /// # Arguments
    /// * `page_num`    : 1-indexed page number
    /// * `total_pages`: pages selected for this run
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page produced its render plans.
    ///
    /// # Arguments
    /// * `plans`: number of render plans on the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, plans: usize) {
        let _ = (page_num, total_pages, plans);
    }

    /// Called when a page was aborted by a fatal error.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_reflow_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReflowConfig`].
pub type ProgressCallback = Arc<dyn ReflowProgressCallback>;
