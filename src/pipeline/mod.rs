//! Pipeline stages for directory-to-searchable-PDF conversion.
//!
//! Each submodule implements exactly one stage. Stages hand each other typed
//! values naming files inside the [`staging::StagingArea`]; every stage
//! deletes its inputs once its outputs are on disk.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ orientation ──▶ split ──▶ enrich ──▶ assemble
//! (tif/pdf)   (h/w ratio)    (1 or 2)  (OCR+PDF)  (join+move)
//! ```
//!
//! 1. [`intake`]      — stage each matched file as `.tif`, explode multi-page
//!    containers into `{base}{n}.tif`
//! 2. [`orientation`] — classify each sheet as single, double or ambiguous
//! 3. [`split`]       — drive the page splitter, yielding `{page}-A[,-B]`
//! 4. [`enrich`]      — normalise, OCR, recompress and embed per Sub-Page
//! 5. [`assemble`]    — join every artifact in name order, move it out
//!
//! [`staging`] owns the working directory; [`hocr`] holds the text-layer
//! helpers used by [`enrich`].

pub mod assemble;
pub mod enrich;
pub mod hocr;
pub mod intake;
pub mod orientation;
pub mod split;
pub mod staging;

use crate::error::BookOcrError;

/// Run blocking tool work on tokio's blocking pool and wait for it.
pub(crate) async fn blocking<T, F>(task: F) -> Result<T, BookOcrError>
where
    F: FnOnce() -> Result<T, BookOcrError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| BookOcrError::Internal(format!("Blocking task panicked: {}", e)))?
}
