//! Directory conversion entry points.
//!
//! [`convert_directory`] runs the five stages strictly one after another;
//! only enrichment fans out, up to [`RunConfig::concurrency`] Sub-Pages at a
//! time. Join order comes from artifact file names, never from completion
//! order, so concurrency cannot reorder the book.

use crate::config::RunConfig;
use crate::error::{BookOcrError, PageIssue};
use crate::output::{RunOutput, RunStats, SubPageResult};
use crate::pipeline::assemble::{self, natural_cmp};
use crate::pipeline::enrich::{self, EnrichedPage};
use crate::pipeline::orientation::{self, Orientation};
use crate::pipeline::split::{self, SubPage};
use crate::pipeline::staging::StagingArea;
use crate::pipeline::{blocking, intake};
use crate::tools::Toolchain;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert every matching scan in `config.input_dir` into one searchable PDF.
///
/// # Returns
/// `Ok(RunOutput)` once the document is at [`RunConfig::output_path`],
/// even if some Sub-Pages were embedded without text (check
/// `output.stats.degraded_pages`).
///
/// # Errors
/// Returns `Err(BookOcrError)` for fatal errors:
/// - staging area already exists or cannot be created
/// - an intake file cannot be normalised, or reports zero pages
/// - the splitter, a conversion, the embedder or the joiner fails
///
/// The staging area is removed before any error is returned.
pub async fn convert_directory(
    config: &RunConfig,
    tools: &Toolchain,
) -> Result<RunOutput, BookOcrError> {
    let total_start = Instant::now();
    info!("Starting run: {}", config.input_dir.display());

    let staging = StagingArea::open(config.staging_path())?;
    let mut stats = RunStats::default();

    // ── Step 1: Intake ───────────────────────────────────────────────────
    let step = Instant::now();
    let report = intake::normalize(config, &staging, tools).await?;
    stats.intake_files = report.matched;
    stats.skipped_files = report.skipped;
    stats.canonical_pages = report.page_count();
    stats.intake_duration_ms = step.elapsed().as_millis() as u64;
    info!(
        "Normalised {} file(s) into {} page(s) in {}ms",
        report.groups.len(),
        stats.canonical_pages,
        stats.intake_duration_ms
    );

    // ── Step 2: Classify and split ───────────────────────────────────────
    let step = Instant::now();
    let mut sub_pages: Vec<SubPage> = Vec::new();
    let mut issues: HashMap<String, Vec<PageIssue>> = HashMap::new();
    for group in report.groups {
        for page in group.pages {
            let probe_path = page.path.clone();
            let (width, height) =
                blocking(move || orientation::probe_dimensions(&probe_path)).await?;
            let orientation = orientation::classify(width, height);
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_classified(&page.name, orientation);
            }

            let ambiguous = if orientation == Orientation::Ambiguous {
                let ratio = orientation::ratio(width, height);
                warn!(
                    "{}: ambiguous orientation (height/width = {:.2}), splitting as double",
                    page.name, ratio
                );
                stats.ambiguous_pages += 1;
                Some(PageIssue::AmbiguousOrientation {
                    page: page.name.clone(),
                    ratio,
                })
            } else {
                debug!("{}: {:?} ({}x{})", page.name, orientation, width, height);
                None
            };

            let produced =
                split::split(page, orientation, config.dpi, staging.path(), tools).await?;
            for sub in &produced {
                issues
                    .entry(sub.name.clone())
                    .or_default()
                    .extend(ambiguous.clone());
            }
            sub_pages.extend(produced);
        }
    }
    stats.sub_pages = sub_pages.len();
    stats.split_duration_ms = step.elapsed().as_millis() as u64;
    info!(
        "Split {} page(s) into {} sub-page(s) in {}ms",
        stats.canonical_pages, stats.sub_pages, stats.split_duration_ms
    );

    // ── Step 3: Enrich ───────────────────────────────────────────────────
    let step = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_enrich_start(sub_pages.len());
    }
    let enriched = enrich_all(sub_pages, config, tools).await?;
    stats.enrich_duration_ms = step.elapsed().as_millis() as u64;

    let mut pages: Vec<SubPageResult> = enriched
        .into_iter()
        .map(|page| {
            let mut page_issues = issues.remove(&page.name).unwrap_or_default();
            page_issues.extend(page.issue);
            SubPageResult {
                name: page.name,
                issues: page_issues,
                duration_ms: page.duration_ms,
            }
        })
        .collect();
    pages.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    stats.degraded_pages = pages.iter().filter(|p| p.is_degraded()).count();
    info!(
        "Enriched {} sub-page(s) ({} degraded) in {}ms",
        pages.len(),
        stats.degraded_pages,
        stats.enrich_duration_ms
    );

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let step = Instant::now();
    let document = assemble::assemble(
        &staging,
        &config.output_name,
        &config.output_dir,
        stats.sub_pages,
        tools,
    )
    .await?;
    stats.final_page_count = document.page_count;
    stats.assemble_duration_ms = step.elapsed().as_millis() as u64;

    if let Err(e) = staging.close() {
        warn!("{}", e);
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} page(s) → {} in {}ms",
        stats.sub_pages,
        document.path.display(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&stats);
    }

    Ok(RunOutput {
        output_path: document.path,
        pages,
        stats,
    })
}

/// Synchronous wrapper around [`convert_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(config: &RunConfig, tools: &Toolchain) -> Result<RunOutput, BookOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BookOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_directory(config, tools))
}

/// Enrich Sub-Pages, up to `config.concurrency` at a time.
///
/// After the first failure no further Sub-Page is started; those already in
/// flight finish before the error is returned.
async fn enrich_all(
    sub_pages: Vec<SubPage>,
    config: &RunConfig,
    tools: &Toolchain,
) -> Result<Vec<EnrichedPage>, BookOcrError> {
    let failed = AtomicBool::new(false);
    let failed = &failed;

    let results: Vec<Option<Result<EnrichedPage, BookOcrError>>> =
        stream::iter(sub_pages.into_iter().map(|sub| async move {
            if failed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_sub_page_start(&sub.name);
            }
            let name = sub.name.clone();
            let result = enrich::enrich(sub, config, tools).await;
            match &result {
                Ok(page) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_sub_page_complete(&name, page.issue.is_some());
                    }
                }
                Err(_) => failed.store(true, Ordering::SeqCst),
            }
            Some(result)
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut enriched = Vec::with_capacity(results.len());
    for result in results.into_iter().flatten() {
        enriched.push(result?);
    }
    Ok(enriched)
}
