//! Collaborators backed by the classic scan-to-PDF command-line tools.
//!
//! One [`SystemTools`] value implements every collaborator trait; each method
//! builds a [`Command`], runs it through [`command::run`] and checks that the
//! promised output exists before handing back a typed handle.

use super::command::{self, expect_output};
use super::{
    ConvertOptions, ImageConvert, JoinedPdf, Layout, OcrEngine, PageSplitter, PdfJoin, PdfPage,
    RasterFile, SplitOutput, SplitRequest, TextLayer, TextLayerEmbed,
};
use crate::error::{BookOcrError, ToolError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Binaries used by the system toolchain. Each may be a bare name (searched
/// on `PATH`) or an explicit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTools {
    /// ImageMagick converter.
    pub convert: PathBuf,
    /// ImageMagick identifier (page counting).
    pub identify: PathBuf,
    /// Deskew/crop/split tool.
    pub unpaper: PathBuf,
    /// OCR engine.
    pub tesseract: PathBuf,
    /// hOCR + image → PDF merger (ExactImage).
    pub hocr2pdf: PathBuf,
    /// PDF joiner; never rotates pages.
    pub qpdf: PathBuf,
}

impl Default for SystemTools {
    fn default() -> Self {
        Self {
            convert: PathBuf::from("convert"),
            identify: PathBuf::from("identify"),
            unpaper: PathBuf::from("unpaper"),
            tesseract: PathBuf::from("tesseract"),
            hocr2pdf: PathBuf::from("hocr2pdf"),
            qpdf: PathBuf::from("qpdf"),
        }
    }
}

impl SystemTools {
    /// Verify every binary resolves before a long run starts.
    pub fn preflight(&self) -> Result<(), BookOcrError> {
        let checks: [(&Path, &str); 6] = [
            (&self.convert, "Install ImageMagick: apt install imagemagick"),
            (&self.identify, "Install ImageMagick: apt install imagemagick"),
            (&self.unpaper, "Install unpaper: apt install unpaper"),
            (&self.tesseract, "Install Tesseract: apt install tesseract-ocr tesseract-ocr-eng"),
            (&self.hocr2pdf, "Install ExactImage: apt install exactimage"),
            (&self.qpdf, "Install qpdf: apt install qpdf"),
        ];
        for (binary, hint) in checks {
            match which::which(binary) {
                Ok(resolved) => debug!("Found {} at {}", binary.display(), resolved.display()),
                Err(e) => {
                    debug!("Lookup of {} failed: {}", binary.display(), e);
                    return Err(BookOcrError::ToolNotFound {
                        tool: binary.display().to_string(),
                        hint: hint.to_string(),
                    });
                }
            }
        }
        info!("All external tools found");
        Ok(())
    }
}

/// `path` with `suffix` appended to the full file name (`a.pdf` → `a.pdf.html`).
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

// ── ImageMagick ──────────────────────────────────────────────────────────

impl ImageConvert for SystemTools {
    fn convert(
        &self,
        src: &Path,
        dst: &Path,
        options: &ConvertOptions,
    ) -> Result<RasterFile, ToolError> {
        let mut cmd = Command::new(&self.convert);
        // Density must precede the input so PDFs are sampled at that resolution.
        if let Some(dpi) = options.density {
            cmd.arg("-density").arg(dpi.to_string());
        }
        cmd.arg(src);
        if options.normalize {
            cmd.arg("-normalize");
        }
        if options.grayscale {
            cmd.args(["-colorspace", "Gray"]);
        }
        if let Some(depth) = options.depth {
            cmd.arg("-depth").arg(depth.to_string());
        }
        if let Some(quality) = options.quality {
            cmd.arg("-quality").arg(quality.to_string());
        }
        if let Some(dpi) = options.density {
            cmd.args(["-units", "PixelsPerInch", "-density"]).arg(dpi.to_string());
        }
        cmd.arg(dst);

        command::run("convert", &mut cmd)?;
        expect_output("convert", dst)?;
        Ok(RasterFile {
            path: dst.to_path_buf(),
        })
    }

    fn page_count(&self, path: &Path) -> Result<usize, ToolError> {
        let output = command::run(
            "identify",
            Command::new(&self.identify).args(["-format", "%n\\n"]).arg(path),
        )?;
        parse_page_count(&String::from_utf8_lossy(&output.stdout))
    }

    fn explode(
        &self,
        src: &Path,
        dir: &Path,
        base: &str,
        pages: usize,
    ) -> Result<Vec<PathBuf>, ToolError> {
        // `%d` is ImageMagick's frame placeholder; literal `%` must be doubled.
        let pattern = dir.join(format!("{}%d.tif", base.replace('%', "%%")));
        command::run(
            "convert",
            Command::new(&self.convert)
                .arg(src)
                .args(["-scene", "1"])
                .arg(&pattern),
        )?;

        let written: Vec<PathBuf> = (1..=pages)
            .map(|n| dir.join(format!("{base}{n}.tif")))
            .collect();
        for path in &written {
            expect_output("convert", path)?;
        }
        Ok(written)
    }
}

/// First line of `identify -format "%n\n"` output (it repeats once per frame).
fn parse_page_count(stdout: &str) -> Result<usize, ToolError> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty());
    match first {
        None => Ok(0),
        Some(line) => line.parse().map_err(|_| ToolError::Parse {
            tool: "identify".into(),
            detail: format!("expected a page count, got '{line}'"),
        }),
    }
}

// ── unpaper ──────────────────────────────────────────────────────────────

impl PageSplitter for SystemTools {
    fn split(&self, request: &SplitRequest) -> Result<SplitOutput, ToolError> {
        command::run(
            "unpaper",
            Command::new(&self.unpaper).args(unpaper_args(request)),
        )?;

        for path in &request.outputs {
            expect_output("unpaper", path)?;
        }
        Ok(SplitOutput {
            pages: request.outputs.clone(),
        })
    }
}

/// PGM carries no density, so the scan resolution is passed explicitly;
/// unpaper's size and margin defaults are measured against it.
fn unpaper_args(request: &SplitRequest) -> Vec<OsString> {
    let (layout, pages) = match request.layout {
        Layout::Single => ("single", "1"),
        Layout::Double => ("double", "2"),
    };
    let dpi = request.dpi.to_string();
    let mut args: Vec<OsString> = [
        "--overwrite",
        "--dpi",
        dpi.as_str(),
        "--layout",
        layout,
        "--output-pages",
        pages,
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(request.source.clone().into_os_string());
    args.extend(request.outputs.iter().map(|p| p.clone().into_os_string()));
    args
}

// ── tesseract ────────────────────────────────────────────────────────────

impl OcrEngine for SystemTools {
    fn recognize(
        &self,
        image: &Path,
        output_base: &Path,
        language: &str,
        segmentation_mode: u8,
    ) -> Result<TextLayer, ToolError> {
        command::run(
            "tesseract",
            Command::new(&self.tesseract)
                .arg(image)
                .arg(output_base)
                .args(["-l", language, "--psm"])
                .arg(segmentation_mode.to_string())
                .arg("hocr"),
        )?;

        // Tesseract 4+ writes `.hocr`; 3.x wrote `.html`.
        let layer = with_suffix(output_base, ".html");
        let modern = with_suffix(output_base, ".hocr");
        if modern.exists() {
            std::fs::rename(&modern, &layer)?;
        }
        expect_output("tesseract", &layer)?;
        Ok(TextLayer { path: layer })
    }
}

// ── hocr2pdf ─────────────────────────────────────────────────────────────

impl TextLayerEmbed for SystemTools {
    fn embed(&self, image: &Path, text_layer: &Path, output: &Path) -> Result<PdfPage, ToolError> {
        let hocr = File::open(text_layer)?;
        command::run(
            "hocr2pdf",
            Command::new(&self.hocr2pdf)
                .arg("-i")
                .arg(image)
                .arg("-o")
                .arg(output)
                .stdin(Stdio::from(hocr)),
        )?;
        expect_output("hocr2pdf", output)?;
        Ok(PdfPage {
            path: output.to_path_buf(),
        })
    }
}

// ── qpdf ─────────────────────────────────────────────────────────────────

/// qpdf's "succeeded with warnings" status.
const QPDF_WARNINGS: i32 = 3;

impl PdfJoin for SystemTools {
    fn join(&self, inputs: &[PathBuf], output: &Path) -> Result<JoinedPdf, ToolError> {
        let result = command::run(
            "qpdf",
            Command::new(&self.qpdf)
                .args(["--empty", "--pages"])
                .args(inputs)
                .arg("--")
                .arg(output),
        );
        match result {
            Ok(_) => {}
            Err(ToolError::Failed {
                status: Some(QPDF_WARNINGS),
                stderr,
                ..
            }) => debug!("qpdf finished with warnings: {}", stderr),
            Err(e) => return Err(e),
        }
        expect_output("qpdf", output)?;
        Ok(JoinedPdf {
            path: output.to_path_buf(),
            inputs: inputs.len(),
        })
    }
}
