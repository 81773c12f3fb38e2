//! Final assembly: join every artifact in page order and move it out.

use super::blocking;
use super::staging::StagingArea;
use crate::error::{BookOcrError, ToolError};
use crate::tools::{PdfJoin, Toolchain};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The finished document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub path: PathBuf,
    /// Number of per-Sub-Page artifacts that were joined.
    pub artifacts: usize,
    /// Pages counted in the joined file, when it could be parsed.
    pub page_count: Option<usize>,
}

/// Compare file names so that digit runs order numerically (`doc2` < `doc10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ord = cmp_digit_runs(&ln, &rn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Every `*.pdf` in `dir`, in natural file-name order.
pub fn collect_artifacts(dir: &Path) -> Result<Vec<PathBuf>, BookOcrError> {
    let mut artifacts: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| BookOcrError::io(dir, e))? {
        let entry = entry.map_err(|e| BookOcrError::io(dir, e))?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            artifacts.push((entry.file_name().to_string_lossy().to_string(), path));
        }
    }
    artifacts.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
    Ok(artifacts.into_iter().map(|(_, p)| p).collect())
}

/// Join all artifacts in `staging` and move the result to
/// `output_dir/output_name`.
///
/// `expected` is the number of Sub-Pages that were enriched; a staging area
/// holding any other number of artifacts is refused before anything is joined.
pub async fn assemble(
    staging: &StagingArea,
    output_name: &str,
    output_dir: &Path,
    expected: usize,
    tools: &Toolchain,
) -> Result<AssembledDocument, BookOcrError> {
    let artifacts = collect_artifacts(staging.path())?;
    if artifacts.is_empty() {
        return Err(BookOcrError::Assemble {
            detail: "no page artifacts to join".into(),
            status: None,
        });
    }
    if artifacts.len() != expected {
        return Err(BookOcrError::Assemble {
            detail: format!(
                "found {} artifact(s) but {} sub-page(s) were enriched",
                artifacts.len(),
                expected
            ),
            status: None,
        });
    }
    info!("Joining {} page(s) into {}", artifacts.len(), output_name);

    // Dot-prefixed and not `.pdf`, so it is never mistaken for an artifact.
    let joined = staging.join(format!(".{output_name}.joining"));
    let final_path = output_dir.join(output_name);
    let join = Arc::clone(&tools.join);
    let count = artifacts.len();

    blocking(move || {
        join_blocking(join.as_ref(), &artifacts, &joined)?;
        let page_count = count_pages(&joined);
        match page_count {
            Some(n) if n != count => warn!(
                "Joined document has {} page(s) but {} artifact(s) went in",
                n, count
            ),
            Some(n) => debug!("Joined document has {} page(s)", n),
            None => warn!("Could not parse joined document to count its pages"),
        }
        move_into_place(&joined, &final_path)?;
        Ok(AssembledDocument {
            path: final_path,
            artifacts: count,
            page_count,
        })
    })
    .await
}

fn join_blocking(
    join: &dyn PdfJoin,
    artifacts: &[PathBuf],
    output: &Path,
) -> Result<(), BookOcrError> {
    let assemble_err = |e: ToolError| BookOcrError::Assemble {
        detail: e.to_string(),
        status: e.status(),
    };
    let joined = join.join(artifacts, output).map_err(assemble_err)?;
    if !joined.path.is_file() {
        return Err(BookOcrError::Assemble {
            detail: format!("joiner wrote no document at {}", joined.path.display()),
            status: None,
        });
    }
    Ok(())
}

/// Page count of a PDF, or `None` if it cannot be parsed.
pub fn count_pages(path: &Path) -> Option<usize> {
    lopdf::Document::load(path)
        .map(|doc| doc.get_pages().len())
        .ok()
}

/// Rename `from` to `to`, copying when they sit on different file systems.
fn move_into_place(from: &Path, to: &Path) -> Result<(), BookOcrError> {
    let write_err = |source| BookOcrError::OutputWrite {
        path: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(write_err)?;
    std::fs::remove_file(from).map_err(|e| BookOcrError::io(from, e))?;
    Ok(())
}
