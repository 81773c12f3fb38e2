//! Splitter invocation: one canonical page in, one or two Sub-Pages out.
//!
//! The page is first converted to a grayscale intermediate at the run's DPI
//! (the splitter's native input format), the splitter writes
//! `{page}-A.pgm` and, for spreads, `{page}-B.pgm`, and both the
//! intermediate and the canonical page are deleted afterwards. A failure at
//! any step removes whatever the step left behind and reports the page.

use super::blocking;
use super::intake::CanonicalPage;
use super::orientation::Orientation;
use super::staging::{remove_if_exists, ScratchFile};
use crate::error::{BookOcrError, ToolError};
use crate::tools::{ConvertOptions, ImageConvert, Layout, PageSplitter, SplitRequest, Toolchain};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A logical page image awaiting enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPage {
    /// `{page}-A` or `{page}-B`.
    pub name: String,
    pub path: PathBuf,
}

/// Sub-Page names for `page`, left to right.
pub fn sub_page_names(page: &str, layout: Layout) -> Vec<String> {
    ["A", "B"]
        .iter()
        .take(layout.pages())
        .map(|side| format!("{page}-{side}"))
        .collect()
}

/// Split one canonical page according to its orientation.
///
/// Ambiguous pages are split as spreads; logging that decision is the
/// caller's job.
pub async fn split(
    page: CanonicalPage,
    orientation: Orientation,
    dpi: u32,
    staging_dir: &Path,
    tools: &Toolchain,
) -> Result<Vec<SubPage>, BookOcrError> {
    let convert = Arc::clone(&tools.convert);
    let splitter = Arc::clone(&tools.splitter);
    let staging_dir = staging_dir.to_path_buf();
    blocking(move || {
        split_blocking(
            &page,
            orientation.layout(),
            dpi,
            &staging_dir,
            convert.as_ref(),
            splitter.as_ref(),
        )
    })
    .await
}

fn split_blocking(
    page: &CanonicalPage,
    layout: Layout,
    dpi: u32,
    staging_dir: &Path,
    convert: &dyn ImageConvert,
    splitter: &dyn PageSplitter,
) -> Result<Vec<SubPage>, BookOcrError> {
    let names = sub_page_names(&page.name, layout);
    let outputs: Vec<PathBuf> = names
        .iter()
        .map(|n| staging_dir.join(format!("{n}.pgm")))
        .collect();

    // `.split.pgm` cannot collide with any `{x}-A.pgm` / `{x}-B.pgm` output.
    let intermediate = ScratchFile::new(staging_dir.join(format!("{}.split.pgm", page.name)));
    let request = SplitRequest {
        source: intermediate.path().to_path_buf(),
        dpi,
        layout,
        outputs: outputs.clone(),
    };

    if let Err(e) = run_split(page, &request, convert, splitter) {
        for path in &outputs {
            let _ = remove_if_exists(path);
        }
        return Err(e);
    }
    drop(intermediate);
    remove_if_exists(&page.path)?;

    debug!("{} → {}", page.name, names.join(", "));
    Ok(names
        .into_iter()
        .zip(outputs)
        .map(|(name, path)| SubPage { name, path })
        .collect())
}

fn run_split(
    page: &CanonicalPage,
    request: &SplitRequest,
    convert: &dyn ImageConvert,
    splitter: &dyn PageSplitter,
) -> Result<(), BookOcrError> {
    let split_err = |e: ToolError| BookOcrError::Split {
        page: page.name.clone(),
        detail: e.to_string(),
        status: e.status(),
    };

    convert
        .convert(
            &page.path,
            &request.source,
            &ConvertOptions::density(request.dpi).grayscale(),
        )
        .map_err(split_err)?;

    let written = splitter.split(request).map_err(split_err)?;
    if written.pages.len() != request.layout.pages() {
        return Err(BookOcrError::Split {
            page: page.name.clone(),
            detail: format!(
                "expected {} output page(s), got {}",
                request.layout.pages(),
                written.pages.len()
            ),
            status: None,
        });
    }
    if let Some(missing) = request.outputs.iter().find(|p| !p.is_file()) {
        return Err(BookOcrError::Split {
            page: page.name.clone(),
            detail: format!("splitter did not write {}", missing.display()),
            status: None,
        });
    }
    Ok(())
}
