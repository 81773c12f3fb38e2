//! Intake normalisation: turn a directory of scans into single-page TIFFs.
//!
//! Every matched file is resolved once into an [`IntakeKind`] from its
//! extension, staged as `{base}.tif`, and then resolved again into a
//! [`PageSource`] from its page count. Multi-page containers are exploded
//! into `{base}1.tif … {base}N.tif` and the container is deleted.
//!
//! A container that reports zero pages aborts the whole run: a scan set
//! with a silently missing file is worse than no output at all.

use super::blocking;
use super::staging::{remove_if_exists, StagingArea};
use crate::config::{RunConfig, UnsupportedPolicy};
use crate::error::BookOcrError;
use crate::tools::{ConvertOptions, ImageConvert, Toolchain};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Input type, decided once from the lower-cased extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeKind {
    Tif,
    Tiff,
    Pdf,
    Unsupported(String),
}

impl IntakeKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "tif" => IntakeKind::Tif,
            "tiff" => IntakeKind::Tiff,
            "pdf" => IntakeKind::Pdf,
            _ => IntakeKind::Unsupported(ext),
        }
    }
}

/// A matched file in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeFile {
    pub path: PathBuf,
    pub base_name: String,
    pub kind: IntakeKind,
}

/// What a staged `.tif` turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    SinglePageTiff(PathBuf),
    MultiPageContainer { path: PathBuf, pages: usize },
}

/// One single-page raster in the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPage {
    /// `{base}` or `{base}{n}`.
    pub name: String,
    pub path: PathBuf,
}

/// The single-page rasters derived from one intake file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPageGroup {
    pub base_name: String,
    pub origin: PathBuf,
    pub pages: Vec<CanonicalPage>,
}

/// Result of the intake stage.
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub groups: Vec<CanonicalPageGroup>,
    /// Files that matched the input pattern.
    pub matched: usize,
    /// Matched files skipped for an unsupported extension.
    pub skipped: usize,
}

impl IntakeReport {
    pub fn page_count(&self) -> usize {
        self.groups.iter().map(|g| g.pages.len()).sum()
    }
}

/// List regular files in `dir` whose name matches `pattern`, sorted by name.
///
/// `exclude` is the run's own output file: when the output lands in the input
/// directory, a previous run's document must not be fed back in.
pub fn discover(
    dir: &Path,
    pattern: &regex::Regex,
    exclude: Option<&Path>,
) -> Result<Vec<IntakeFile>, BookOcrError> {
    let unreadable = |source| BookOcrError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };
    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !pattern.is_match(&name) {
            continue;
        }
        if exclude.is_some() && path.canonicalize().ok() == exclude {
            debug!("Skipping previous output {}", path.display());
            continue;
        }
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.clone());
        files.push(IntakeFile {
            kind: IntakeKind::from_path(&path),
            path,
            base_name,
        });
    }
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Normalise every matched file in `config.input_dir` into the staging area.
pub async fn normalize(
    config: &RunConfig,
    staging: &StagingArea,
    tools: &Toolchain,
) -> Result<IntakeReport, BookOcrError> {
    let output_path = config.output_path();
    let files = discover(
        &config.input_dir,
        &config.input_pattern,
        Some(output_path.as_path()),
    )?;
    info!(
        "Found {} matching file(s) in {}",
        files.len(),
        config.input_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(files.len());
    }

    let mut report = IntakeReport {
        matched: files.len(),
        ..Default::default()
    };

    let mut supported = Vec::with_capacity(files.len());
    for file in files {
        if let IntakeKind::Unsupported(ref ext) = file.kind {
            match config.unsupported {
                UnsupportedPolicy::Skip => {
                    warn!("Skipping {} (unsupported extension '{}')", file.path.display(), ext);
                    report.skipped += 1;
                    continue;
                }
                UnsupportedPolicy::Fail => {
                    return Err(BookOcrError::UnsupportedInput {
                        path: file.path.clone(),
                        extension: ext.clone(),
                    })
                }
            }
        }
        supported.push(file);
    }

    // Page names must stay unique across all groups: `doc.pdf` explodes to
    // `doc1`, which would collide with a separate `doc1.tif`.
    let mut claims: HashMap<String, PathBuf> = HashMap::new();
    for file in &supported {
        claim(&mut claims, &file.base_name, &file.path)?;
    }

    let total = supported.len();
    for (i, file) in supported.into_iter().enumerate() {
        info!("Normalising {}", file.path.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_intake_file(&display_name(&file.path), i + 1, total);
        }

        let convert = Arc::clone(&tools.convert);
        let staging_dir = staging.path().to_path_buf();
        let dpi = config.dpi;
        let staged_file = file.clone();
        let source = blocking(move || {
            let staged = stage_file(&staged_file, &staging_dir, dpi, convert.as_ref())?;
            resolve_source(&staged_file, staged, convert.as_ref())
        })
        .await?;

        if let PageSource::MultiPageContainer { pages, .. } = source {
            claims.remove(&file.base_name);
            for n in 1..=pages {
                claim(&mut claims, &format!("{}{}", file.base_name, n), &file.path)?;
            }
        }

        let convert = Arc::clone(&tools.convert);
        let staging_dir = staging.path().to_path_buf();
        let group = blocking(move || expand(&file, source, &staging_dir, convert.as_ref())).await?;
        debug!("{} → {} page(s)", group.base_name, group.pages.len());
        report.groups.push(group);
    }

    Ok(report)
}

fn claim(
    claims: &mut HashMap<String, PathBuf>,
    name: &str,
    origin: &Path,
) -> Result<(), BookOcrError> {
    if let Some(first) = claims.get(name) {
        return Err(BookOcrError::DuplicateBaseName {
            base: name.to_string(),
            first: first.clone(),
            second: origin.to_path_buf(),
        });
    }
    claims.insert(name.to_string(), origin.to_path_buf());
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Copy or rasterise one intake file into `{staging}/{base}.tif`.
fn stage_file(
    file: &IntakeFile,
    staging_dir: &Path,
    dpi: u32,
    convert: &dyn ImageConvert,
) -> Result<PathBuf, BookOcrError> {
    let dst = staging_dir.join(format!("{}.tif", file.base_name));
    match file.kind {
        IntakeKind::Tif | IntakeKind::Tiff => {
            std::fs::copy(&file.path, &dst).map_err(|e| BookOcrError::IntakeConvert {
                file: file.path.clone(),
                detail: format!("copy into staging area failed: {e}"),
                status: None,
            })?;
        }
        IntakeKind::Pdf => {
            convert
                .convert(&file.path, &dst, &ConvertOptions::density(dpi))
                .map_err(|e| BookOcrError::IntakeConvert {
                    file: file.path.clone(),
                    detail: format!("rasterising at {dpi} dpi failed: {e}"),
                    status: e.status(),
                })?;
        }
        IntakeKind::Unsupported(ref ext) => {
            return Err(BookOcrError::UnsupportedInput {
                path: file.path.clone(),
                extension: ext.clone(),
            })
        }
    }
    Ok(dst)
}

/// Decide what the staged raster contains from its page count.
fn resolve_source(
    file: &IntakeFile,
    staged: PathBuf,
    convert: &dyn ImageConvert,
) -> Result<PageSource, BookOcrError> {
    let pages = match convert.page_count(&staged) {
        Ok(n) => n,
        Err(e) => {
            warn!("Page count of {} failed: {}", staged.display(), e);
            0
        }
    };
    match pages {
        0 => {
            error!("{} reports 0 pages; aborting run", file.path.display());
            Err(BookOcrError::InvalidContainer {
                file: file.path.clone(),
            })
        }
        1 => Ok(PageSource::SinglePageTiff(staged)),
        n => Ok(PageSource::MultiPageContainer {
            path: staged,
            pages: n,
        }),
    }
}

/// Turn a resolved source into its canonical page group.
fn expand(
    file: &IntakeFile,
    source: PageSource,
    staging_dir: &Path,
    convert: &dyn ImageConvert,
) -> Result<CanonicalPageGroup, BookOcrError> {
    let pages = match source {
        PageSource::SinglePageTiff(path) => vec![CanonicalPage {
            name: file.base_name.clone(),
            path,
        }],
        PageSource::MultiPageContainer { path, pages } => {
            info!("Splitting {} into {} pages", file.path.display(), pages);
            let written = convert
                .explode(&path, staging_dir, &file.base_name, pages)
                .map_err(|e| BookOcrError::IntakeConvert {
                    file: file.path.clone(),
                    detail: format!("splitting {pages} pages failed: {e}"),
                    status: e.status(),
                })?;
            if written.len() != pages {
                return Err(BookOcrError::IntakeConvert {
                    file: file.path.clone(),
                    detail: format!("expected {pages} pages, got {}", written.len()),
                    status: None,
                });
            }
            remove_if_exists(&path)?;
            written
                .into_iter()
                .enumerate()
                .map(|(i, path)| CanonicalPage {
                    name: format!("{}{}", file.base_name, i + 1),
                    path,
                })
                .collect()
        }
    };

    Ok(CanonicalPageGroup {
        base_name: file.base_name.clone(),
        origin: file.path.clone(),
        pages,
    })
}
