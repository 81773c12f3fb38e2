//! # book-ocr
//!
//! Turn a directory of scanned book pages into one searchable PDF.
//!
//! ## Why this crate?
//!
//! Scanning a book produces a pile of mixed files: single TIFFs, multi-page
//! TIFFs, PDFs straight off the scanner, some with one page per sheet and
//! some with two-page spreads. This crate normalises all of it into
//! single-page rasters, splits spreads into logical pages, OCRs each page
//! into a positioned text layer and joins the results in reading order, so
//! the final PDF looks like the scan and can be searched and copied from.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir (*.tif, *.tiff, *.pdf)
//!  │
//!  ├─ 1. Intake    stage as .tif, explode multi-page containers
//!  ├─ 2. Classify  single / double / ambiguous from height÷width
//!  ├─ 3. Split     deskew + crop into {page}-A[, {page}-B]
//!  ├─ 4. Enrich    normalise → OCR (hOCR) → JPEG → one-page PDF
//!  └─ 5. Assemble  join in natural name order, move to output
//! ```
//!
//! All pixel and PDF work is delegated to external tools behind the traits
//! in [`tools`]; [`tools::SystemTools`] drives ImageMagick, unpaper,
//! Tesseract, ExactImage `hocr2pdf` and qpdf.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use book_ocr::{convert_directory, RunConfig, SystemTools, Toolchain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::builder().input_dir("scans").dpi(300).build()?;
//!     let tools = SystemTools::default();
//!     tools.preflight()?;
//!     let output = convert_directory(&config, &Toolchain::system(&tools)).await?;
//!     eprintln!(
//!         "{} pages, {} without text",
//!         output.stats.sub_pages, output.stats.degraded_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `book-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! book-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RunConfig, RunConfigBuilder, UnsupportedPolicy};
pub use convert::{convert_directory, convert_sync};
pub use error::{BookOcrError, PageIssue, ToolError};
pub use output::{RunOutput, RunStats, SubPageResult};
pub use pipeline::orientation::Orientation;
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use tools::{SystemTools, Toolchain};
