//! External collaborators: the tools that do the actual pixel and PDF work.
//!
//! The pipeline never shells out directly. Each collaborator is a trait with
//! a blocking method that returns a typed handle naming the file it produced,
//! so stages pass handles forward instead of re-deriving file names:
//!
//! | Trait | Handle | System implementation |
//! |-------|--------|-----------------------|
//! | [`ImageConvert`]   | [`RasterFile`] | ImageMagick `convert` / `identify` |
//! | [`PageSplitter`]   | [`SplitOutput`] | `unpaper` |
//! | [`OcrEngine`]      | [`TextLayer`] | `tesseract … hocr` |
//! | [`TextLayerEmbed`] | [`PdfPage`] | ExactImage `hocr2pdf` |
//! | [`PdfJoin`]        | [`JoinedPdf`] | `qpdf --empty --pages` |
//!
//! All methods block; the orchestrator runs them on `spawn_blocking`
//! threads. Implementations must be `Send + Sync` so one [`Toolchain`] can be
//! shared by concurrently enriched Sub-Pages.

pub mod command;
pub mod system;

use crate::error::ToolError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use system::SystemTools;

// ── Handles ──────────────────────────────────────────────────────────────

/// A raster file written by [`ImageConvert::convert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFile {
    pub path: PathBuf,
}

/// The sub-page images written by [`PageSplitter::split`], left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub pages: Vec<PathBuf>,
}

/// An hOCR text layer written by [`OcrEngine::recognize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayer {
    pub path: PathBuf,
}

/// A single-page PDF written by [`TextLayerEmbed::embed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    pub path: PathBuf,
}

/// The document written by [`PdfJoin::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedPdf {
    pub path: PathBuf,
    /// Number of input documents that went into it.
    pub inputs: usize,
}

// ── Requests ─────────────────────────────────────────────────────────────

/// Options for one image-convert invocation. Unset fields leave the
/// tool's defaults alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Sampling/output density in DPI.
    pub density: Option<u32>,
    /// Stretch levels to the full range.
    pub normalize: bool,
    /// Convert to a single gray channel.
    pub grayscale: bool,
    /// Bits per channel.
    pub depth: Option<u8>,
    /// Compression quality (1–100).
    pub quality: Option<u8>,
}

impl ConvertOptions {
    pub fn density(dpi: u32) -> Self {
        Self {
            density: Some(dpi),
            ..Default::default()
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn grayscale(mut self) -> Self {
        self.grayscale = true;
        self
    }

    pub fn depth(mut self, bits: u8) -> Self {
        self.depth = Some(bits);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }
}

/// How many logical pages the splitter should cut out of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Layout {
    /// One page per sheet.
    Single,
    /// Two pages side by side, emitted left then right.
    Double,
}

impl Layout {
    /// Number of output files the splitter must produce.
    pub fn pages(self) -> usize {
        match self {
            Layout::Single => 1,
            Layout::Double => 2,
        }
    }
}

/// One call to the page splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRequest {
    /// Intermediate raster in the splitter's input format.
    pub source: PathBuf,
    pub dpi: u32,
    pub layout: Layout,
    /// Output paths, left to right; `outputs.len() == layout.pages()`.
    pub outputs: Vec<PathBuf>,
}

// ── Traits ───────────────────────────────────────────────────────────────

/// Raster format conversion and page counting.
pub trait ImageConvert: Send + Sync {
    /// Convert `src` into `dst`; the output format follows `dst`'s extension.
    fn convert(&self, src: &Path, dst: &Path, options: &ConvertOptions)
        -> Result<RasterFile, ToolError>;

    /// Number of pages (frames) in a raster container.
    fn page_count(&self, path: &Path) -> Result<usize, ToolError>;

    /// Write each page of `src` to `{dir}/{base}{n}.tif`, `n` starting at 1.
    fn explode(&self, src: &Path, dir: &Path, base: &str, pages: usize)
        -> Result<Vec<PathBuf>, ToolError>;
}

/// Deskew, crop and split one sheet into one or two page images.
pub trait PageSplitter: Send + Sync {
    fn split(&self, request: &SplitRequest) -> Result<SplitOutput, ToolError>;
}

/// Optical character recognition producing a positioned hOCR layer.
pub trait OcrEngine: Send + Sync {
    /// Recognise `image` and write the layer to `{output_base}.html`.
    fn recognize(
        &self,
        image: &Path,
        output_base: &Path,
        language: &str,
        segmentation_mode: u8,
    ) -> Result<TextLayer, ToolError>;
}

/// Merge an image and its hOCR layer into a single-page searchable PDF.
pub trait TextLayerEmbed: Send + Sync {
    fn embed(&self, image: &Path, text_layer: &Path, output: &Path) -> Result<PdfPage, ToolError>;
}

/// Concatenate PDFs in the given order without rotating any page.
pub trait PdfJoin: Send + Sync {
    fn join(&self, inputs: &[PathBuf], output: &Path) -> Result<JoinedPdf, ToolError>;
}

/// The full set of collaborators a run needs.
#[derive(Clone)]
pub struct Toolchain {
    pub convert: Arc<dyn ImageConvert>,
    pub splitter: Arc<dyn PageSplitter>,
    pub ocr: Arc<dyn OcrEngine>,
    pub embed: Arc<dyn TextLayerEmbed>,
    pub join: Arc<dyn PdfJoin>,
}

impl Toolchain {
    /// Collaborators backed by the command-line tools named in `tools`.
    pub fn system(tools: &SystemTools) -> Self {
        let tools = Arc::new(tools.clone());
        Self {
            convert: tools.clone(),
            splitter: tools.clone(),
            ocr: tools.clone(),
            embed: tools.clone(),
            join: tools,
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}
