//! Error types for the book-ocr library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`BookOcrError`] — **Fatal**: the run cannot produce a document (bad
//!   container, splitter or joiner produced nothing, staging area could not
//!   be created). Returned as `Err(BookOcrError)` from
//!   [`crate::convert::convert_directory`]. The staging area is already gone
//!   by the time the caller sees it.
//!
//! * [`PageIssue`] — **Non-fatal**: one Sub-Page came out degraded (OCR
//!   produced no text) or one page needed a judgement call (ambiguous
//!   orientation). Stored in [`crate::output::SubPageResult`] and counted in
//!   [`crate::output::RunStats`]; the run carries on.
//!
//! * [`ToolError`] — what an external-collaborator adapter reports. The
//!   pipeline stages wrap it into a [`BookOcrError`] variant that names the
//!   offending file, so adapters never need to know which stage called them.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the book-ocr library.
#[derive(Debug, Error)]
pub enum BookOcrError {
    // ── Pre-flight errors ─────────────────────────────────────────────────
    /// The staging directory already exists or could not be created.
    #[error("Cannot create staging area '{path}': {source}\nRemove it or pass a different --staging-dir.")]
    StagingCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input directory could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required external binary is not on PATH.
    #[error("Required tool '{tool}' was not found.\n{hint}")]
    ToolNotFound { tool: String, hint: String },

    /// Two intake files would land on the same staging name.
    #[error("Input files '{first}' and '{second}' both normalise to page name '{base}'\nRename one of them.")]
    DuplicateBaseName {
        base: String,
        first: PathBuf,
        second: PathBuf,
    },

    // ── Intake errors ─────────────────────────────────────────────────────
    /// A matched input file has an extension the pipeline cannot ingest
    /// (only raised when unsupported inputs are configured to fail).
    #[error("Unsupported input file '{path}': extension '{extension}' is not tif, tiff or pdf")]
    UnsupportedInput { path: PathBuf, extension: String },

    /// Rasterising a PDF (or copying a TIFF) into the staging area failed.
    #[error("Failed to normalise '{file}': {detail}")]
    IntakeConvert {
        file: PathBuf,
        detail: String,
        status: Option<i32>,
    },

    /// The normalised raster reports zero pages (or cannot be counted).
    #[error("'{file}' is not a valid page container: it reports 0 pages")]
    InvalidContainer { file: PathBuf },

    // ── Page errors ───────────────────────────────────────────────────────
    /// The raster header could not be read to classify orientation.
    #[error("Cannot read dimensions of '{path}': {detail}")]
    Probe { path: PathBuf, detail: String },

    /// The page splitter failed or did not produce the expected outputs.
    #[error("Splitting page '{page}' failed: {detail}")]
    Split {
        page: String,
        detail: String,
        status: Option<i32>,
    },

    /// A conversion or embed step for one Sub-Page failed.
    #[error("Enriching sub-page '{sub_page}' failed during {stage}: {detail}")]
    Enrich {
        sub_page: String,
        stage: &'static str,
        detail: String,
        status: Option<i32>,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// No artifacts to join, or the joiner produced no document.
    #[error("Assembling the final document failed: {detail}")]
    Assemble { detail: String, status: Option<i32> },

    /// The joined document could not be moved to its final location.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// File-system error on a staging-area file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookOcrError {
    /// Process exit status for this error.
    ///
    /// `1` is reserved for the invalid-container abort. Failures reported by
    /// an external tool propagate that tool's own status; everything else
    /// exits with `2`.
    pub fn exit_code(&self) -> u8 {
        match self {
            BookOcrError::InvalidContainer { .. } => 1,
            BookOcrError::IntakeConvert { status, .. }
            | BookOcrError::Split { status, .. }
            | BookOcrError::Enrich { status, .. }
            | BookOcrError::Assemble { status, .. } => match status {
                Some(code) if (1..=255).contains(code) => *code as u8,
                _ => 2,
            },
            _ => 2,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BookOcrError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal problem attached to one page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageIssue {
    /// OCR failed or found no text; the artifact carries an empty text layer.
    #[error("{sub_page}: OCR degraded, page embedded without text: {detail}")]
    OcrDegraded { sub_page: String, detail: String },

    /// The height/width ratio fell between the single and double thresholds;
    /// the page was split as a double spread.
    #[error("{page}: ambiguous orientation (height/width = {ratio:.2}), split as double")]
    AmbiguousOrientation { page: String, ratio: f64 },
}

/// Failure reported by an external-collaborator adapter.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be spawned because it does not exist.
    #[error("{tool} not found")]
    NotFound { tool: String },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} exited with {}: {stderr}", status.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    Failed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The tool exited successfully but an expected output file is missing.
    #[error("{tool} did not produce '{path}'")]
    MissingOutput { tool: String, path: PathBuf },

    /// The tool's stdout could not be interpreted.
    #[error("{tool} returned unparsable output: {detail}")]
    Parse { tool: String, detail: String },

    /// Spawning or talking to the tool failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Exit status of the failed tool, when it ran at all.
    pub fn status(&self) -> Option<i32> {
        match self {
            ToolError::Failed { status, .. } => *status,
            _ => None,
        }
    }
}
