//! Run configuration.
//!
//! Every knob of a run lives in [`RunConfig`], built via
//! [`RunConfigBuilder`]. The configuration is immutable once the run starts;
//! stages receive it by reference and never mutate it.

use crate::error::BookOcrError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default input pattern: `tif`, `tiff` and `pdf` files, any case.
pub const DEFAULT_INPUT_PATTERN: &str = r"(?i)\.(tiff?|pdf)$";

/// Default name of the joined output document.
pub const DEFAULT_OUTPUT_NAME: &str = "book-ocr.pdf";

/// Configuration for one directory-to-PDF run.
///
/// # Example
/// ```rust
/// use book_ocr::RunConfig;
///
/// let config = RunConfig::builder()
///     .input_dir("scans")
///     .dpi(400)
///     .output_name("volume-1.pdf")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 400);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Directory scanned for intake files. Default: `.`.
    pub input_dir: PathBuf,

    /// Regex matched against each file name in `input_dir`.
    pub input_pattern: Regex,

    /// Rasterisation and output density. Default: 300.
    pub dpi: u32,

    /// File name of the final document. Default: `book-ocr.pdf`.
    pub output_name: String,

    /// Directory the final document is moved to. Default: `.`.
    pub output_dir: PathBuf,

    /// Explicit staging directory. It must not exist yet.
    /// Default: `{output_dir}/.book-ocr-{pid}`.
    pub staging_dir: Option<PathBuf>,

    /// Sub-Pages enriched at once. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// OCR language code. Default: `eng`.
    pub ocr_language: String,

    /// OCR page segmentation mode. Default: 1 (automatic, with orientation
    /// and script detection).
    pub ocr_segmentation_mode: u8,

    /// Quality of the lossy image embedded in each page. Default: 90.
    pub jpeg_quality: u8,

    /// What to do with matched files that are not tif/tiff/pdf.
    pub unsupported: UnsupportedPolicy,

    /// Receives per-file and per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            input_pattern: default_pattern(),
            dpi: 300,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            output_dir: PathBuf::from("."),
            staging_dir: None,
            concurrency: 1,
            ocr_language: "eng".to_string(),
            ocr_segmentation_mode: 1,
            jpeg_quality: 90,
            unsupported: UnsupportedPolicy::default(),
            progress_callback: None,
        }
    }
}

static DEFAULT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_INPUT_PATTERN).unwrap());

fn default_pattern() -> Regex {
    DEFAULT_PATTERN.clone()
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("input_dir", &self.input_dir)
            .field("input_pattern", &self.input_pattern.as_str())
            .field("dpi", &self.dpi)
            .field("output_name", &self.output_name)
            .field("output_dir", &self.output_dir)
            .field("staging_dir", &self.staging_dir)
            .field("concurrency", &self.concurrency)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_segmentation_mode", &self.ocr_segmentation_mode)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("unsupported", &self.unsupported)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
            pattern: None,
        }
    }

    /// Staging directory this run will create.
    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(|| {
            self.output_dir
                .join(format!(".book-ocr-{}", std::process::id()))
        })
    }

    /// Final location of the joined document.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
    pattern: Option<String>,
}

impl RunConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    /// Input file-name regex; compiled and validated in [`build`](Self::build).
    pub fn input_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = name.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.ocr_segmentation_mode = psm;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn unsupported(mut self, policy: UnsupportedPolicy) -> Self {
        self.config.unsupported = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<RunConfig, BookOcrError> {
        if let Some(pattern) = self.pattern.take() {
            self.config.input_pattern = Regex::new(&pattern).map_err(|e| {
                BookOcrError::InvalidConfig(format!("input pattern '{pattern}' is not a valid regex: {e}"))
            })?;
        }

        let c = &self.config;
        if c.dpi == 0 || c.dpi > 2400 {
            return Err(BookOcrError::InvalidConfig(format!(
                "DPI must be 1–2400, got {}",
                c.dpi
            )));
        }
        if c.output_name.is_empty()
            || c.output_name.contains('/')
            || c.output_name.contains(std::path::MAIN_SEPARATOR)
        {
            return Err(BookOcrError::InvalidConfig(format!(
                "output name must be a plain file name, got '{}'",
                c.output_name
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(BookOcrError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.ocr_segmentation_mode > 13 {
            return Err(BookOcrError::InvalidConfig(format!(
                "OCR segmentation mode must be 0–13, got {}",
                c.ocr_segmentation_mode
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Handling of matched input files whose extension is not tif/tiff/pdf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnsupportedPolicy {
    /// Log a warning and leave the file alone. (default)
    #[default]
    Skip,
    /// Abort the run before anything is staged.
    Fail,
}
