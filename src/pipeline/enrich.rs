//! Per-Sub-Page enrichment: raw split image in, searchable one-page PDF out.
//!
//! ```text
//! {sub}.pgm ─normalise─▶ {sub}.png ─OCR─▶ {sub}.pdf.html
//!                             └─recompress─▶ {sub}.jpg ─embed─▶ {sub}.pdf
//! ```
//!
//! Every intermediate is held by a [`ScratchFile`] guard, so whichever way
//! this function returns only `{sub}.pdf` is left in the staging area. OCR
//! trouble never fails the page: an empty text layer is embedded instead and
//! reported as [`PageIssue::OcrDegraded`].

use super::blocking;
use super::hocr;
use super::orientation::probe_dimensions;
use super::split::SubPage;
use super::staging::{remove_if_exists, ScratchFile};
use crate::config::RunConfig;
use crate::error::{BookOcrError, PageIssue, ToolError};
use crate::tools::system::with_suffix;
use crate::tools::{ConvertOptions, PdfPage, Toolchain};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of enriching one Sub-Page.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPage {
    pub name: String,
    pub artifact: PdfPage,
    pub issue: Option<PageIssue>,
    pub duration_ms: u64,
}

/// The run settings enrichment needs, detached from the config so they can
/// move onto a blocking thread.
#[derive(Debug, Clone)]
struct EnrichSettings {
    dpi: u32,
    language: String,
    segmentation_mode: u8,
    jpeg_quality: u8,
}

/// Enrich one Sub-Page into its artifact `{staging}/{sub}.pdf`.
pub async fn enrich(
    sub_page: SubPage,
    config: &RunConfig,
    tools: &Toolchain,
) -> Result<EnrichedPage, BookOcrError> {
    let settings = EnrichSettings {
        dpi: config.dpi,
        language: config.ocr_language.clone(),
        segmentation_mode: config.ocr_segmentation_mode,
        jpeg_quality: config.jpeg_quality,
    };
    let tools = tools.clone();
    blocking(move || enrich_blocking(&sub_page, &settings, &tools)).await
}

fn enrich_blocking(
    sub_page: &SubPage,
    settings: &EnrichSettings,
    tools: &Toolchain,
) -> Result<EnrichedPage, BookOcrError> {
    let start = Instant::now();
    let name = sub_page.name.as_str();
    let dir = sub_page
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let stage_err = |stage: &'static str, e: ToolError| BookOcrError::Enrich {
        sub_page: name.to_string(),
        stage,
        detail: e.to_string(),
        status: e.status(),
    };

    // 1. Normalise levels into an 8-bit grayscale PNG.
    let raw = ScratchFile::new(&sub_page.path);
    let normalized = ScratchFile::new(dir.join(format!("{name}.png")));
    tools
        .convert
        .convert(
            raw.path(),
            normalized.path(),
            &ConvertOptions::density(settings.dpi)
                .normalized()
                .grayscale()
                .depth(8)
                .quality(100),
        )
        .map_err(|e| stage_err("normalisation", e))?;
    drop(raw);

    // 2. OCR into `{sub}.pdf.html`.
    let artifact_path = dir.join(format!("{name}.pdf"));
    let expected_layer = ScratchFile::new(with_suffix(&artifact_path, ".html"));
    let (text_layer, issue) = recognize(
        name,
        normalized.path(),
        &artifact_path,
        expected_layer.path(),
        settings,
        tools,
    )?;
    let _layer_guard = ScratchFile::new(&text_layer);

    // 3. Recompress for embedding.
    let compressed = ScratchFile::new(dir.join(format!("{name}.jpg")));
    tools
        .convert
        .convert(
            normalized.path(),
            compressed.path(),
            &ConvertOptions::density(settings.dpi).quality(settings.jpeg_quality),
        )
        .map_err(|e| stage_err("recompression", e))?;
    drop(normalized);

    // 4. Merge image and text layer into the artifact.
    let artifact = match tools
        .embed
        .embed(compressed.path(), &text_layer, &artifact_path)
    {
        Ok(page) => page,
        Err(e) => {
            let _ = remove_if_exists(&artifact_path);
            return Err(stage_err("embedding", e));
        }
    };
    if !artifact.path.is_file() {
        return Err(BookOcrError::Enrich {
            sub_page: name.to_string(),
            stage: "embedding",
            detail: format!("no PDF written at {}", artifact.path.display()),
            status: None,
        });
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!("{} enriched in {}ms", name, duration_ms);
    Ok(EnrichedPage {
        name: name.to_string(),
        artifact,
        issue,
        duration_ms,
    })
}

/// Run OCR, falling back to a blank layer sized to the image.
///
/// Returns the layer's path and the degradation issue, if any. Only a
/// failure to write the fallback layer itself is fatal.
fn recognize(
    name: &str,
    image: &Path,
    output_base: &Path,
    expected_layer: &Path,
    settings: &EnrichSettings,
    tools: &Toolchain,
) -> Result<(PathBuf, Option<PageIssue>), BookOcrError> {
    let detail = match tools.ocr.recognize(
        image,
        output_base,
        &settings.language,
        settings.segmentation_mode,
    ) {
        Ok(layer) => match std::fs::read_to_string(&layer.path) {
            Ok(text) if hocr::word_count(&text) > 0 => return Ok((layer.path, None)),
            Ok(_) => "no words recognised".to_string(),
            Err(e) => format!("unreadable text layer: {e}"),
        },
        Err(e) => e.to_string(),
    };

    warn!("{}: OCR degraded ({}); embedding page without text", name, detail);
    let (width, height) = probe_dimensions(image).unwrap_or((0, 0));
    std::fs::write(expected_layer, hocr::blank_page(width, height))
        .map_err(|e| BookOcrError::io(expected_layer, e))?;
    Ok((
        expected_layer.to_path_buf(),
        Some(PageIssue::OcrDegraded {
            sub_page: name.to_string(),
            detail,
        }),
    ))
}
