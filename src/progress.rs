//! Progress-callback trait for per-file and per-page run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to be told as each
//! stage begins work on a file or page. The CLI renders these events as an
//! `indicatif` progress bar; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use book_ocr::{RunConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_sub_page_complete(&self, name: &str, degraded: bool) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {name}{}", if degraded { " (no text)" } else { "" });
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::RunStats;
use crate::pipeline::orientation::Orientation;
use std::sync::Arc;

/// Called by the pipeline as each stage starts and finishes work.
///
/// All methods have default no-op implementations. With `concurrency > 1`
/// the sub-page methods may be called from several threads at once.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after the input directory has been listed.
    fn on_run_start(&self, intake_files: usize) {
        let _ = intake_files;
    }

    /// Called before an intake file is normalised (1-indexed).
    fn on_intake_file(&self, name: &str, index: usize, total: usize) {
        let _ = (name, index, total);
    }

    /// Called after a canonical page has been classified, before splitting.
    fn on_page_classified(&self, page: &str, orientation: Orientation) {
        let _ = (page, orientation);
    }

    /// Called once before the first Sub-Page is enriched.
    fn on_enrich_start(&self, total_sub_pages: usize) {
        let _ = total_sub_pages;
    }

    /// Called before a Sub-Page enters the enrichment pipeline.
    fn on_sub_page_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a Sub-Page artifact has been written.
    ///
    /// `degraded` is true when the page was embedded without recognised text.
    fn on_sub_page_complete(&self, name: &str, degraded: bool) {
        let _ = (name, degraded);
    }

    /// Called once after the final document is in place.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
