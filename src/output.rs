//! Result types returned by a completed run.

use crate::error::PageIssue;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// Where the joined document now lives.
    pub output_path: PathBuf,
    /// One entry per Sub-Page, in join order.
    pub pages: Vec<SubPageResult>,
    /// Run-level counters and timings.
    pub stats: RunStats,
}

impl RunOutput {
    /// Sub-Pages that were embedded without recognised text.
    pub fn degraded_pages(&self) -> impl Iterator<Item = &SubPageResult> {
        self.pages.iter().filter(|p| p.is_degraded())
    }
}

/// Outcome of one Sub-Page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPageResult {
    /// Sub-Page name, e.g. `spread-B`.
    pub name: String,
    /// Issues attached to this Sub-Page or the page it was split from.
    pub issues: Vec<PageIssue>,
    /// Wall-clock time spent enriching this Sub-Page.
    pub duration_ms: u64,
}

impl SubPageResult {
    pub fn is_degraded(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, PageIssue::OcrDegraded { .. }))
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Files in the input directory that matched the pattern.
    pub intake_files: usize,
    /// Matched files skipped because of an unsupported extension.
    pub skipped_files: usize,
    /// Single-page rasters after intake normalisation.
    pub canonical_pages: usize,
    /// Canonical pages whose orientation was ambiguous (split as double).
    pub ambiguous_pages: usize,
    /// Sub-Pages produced by the splitter (= artifacts joined).
    pub sub_pages: usize,
    /// Sub-Pages embedded with an empty text layer.
    pub degraded_pages: usize,
    /// Page count of the joined document, when it could be read back.
    pub final_page_count: Option<usize>,
    pub intake_duration_ms: u64,
    pub split_duration_ms: u64,
    pub enrich_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}
