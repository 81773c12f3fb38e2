//! Integration tests for the full directory → PDF pipeline.
//!
//! The external tools are replaced by in-process fakes that behave like the
//! real ones on the file system: rasters are real TIFFs written with the
//! `image` crate (so orientation probing sees real headers), and the fake
//! joiner writes a manifest of the artifact names it received, one per
//! line, so tests can assert on join order.
//!
//! Run with:
//!   cargo test --test pipeline

use book_ocr::error::ToolError;
use book_ocr::tools::{
    ConvertOptions, ImageConvert, JoinedPdf, Layout, OcrEngine, PageSplitter, PdfJoin, PdfPage,
    RasterFile, SplitOutput, SplitRequest, TextLayer, TextLayerEmbed,
};
use book_ocr::{
    convert_directory, BookOcrError, Orientation, PageIssue, RunConfig, RunProgressCallback,
    RunStats, Toolchain, UnsupportedPolicy,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake collaborators ───────────────────────────────────────────────────────

#[derive(Default)]
struct FakeTools {
    /// Staged base name → page dimensions, for multi-page (or zero-page)
    /// containers. Anything not listed has exactly one page.
    containers: HashMap<String, Vec<(u32, u32)>>,
    /// Sub-Page names whose OCR fails.
    ocr_fails: HashSet<String>,
    /// Per-Sub-Page OCR delay, to shuffle completion order.
    ocr_delay_ms: HashMap<String, u64>,
    /// Canonical page names the splitter rejects, with its exit status.
    split_fails: HashMap<String, i32>,
    /// Sub-Page names the embedder rejects, with its exit status.
    embed_fails: HashMap<String, i32>,
    splits: Mutex<Vec<(String, Layout)>>,
    ocr_in_flight: AtomicUsize,
    ocr_peak: AtomicUsize,
}

impl FakeTools {
    fn into_toolchain(self) -> (Toolchain, Arc<FakeTools>) {
        let fakes = Arc::new(self);
        let tools = Toolchain {
            convert: fakes.clone(),
            splitter: fakes.clone(),
            ocr: fakes.clone(),
            embed: fakes.clone(),
            join: fakes.clone(),
        };
        (tools, fakes)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().to_string()
}

fn write_tiff(path: &Path, width: u32, height: u32) -> std::io::Result<()> {
    image::GrayImage::new(width, height)
        .save_with_format(path, image::ImageFormat::Tiff)
        .map_err(std::io::Error::other)
}

impl ImageConvert for FakeTools {
    fn convert(
        &self,
        src: &Path,
        dst: &Path,
        _options: &ConvertOptions,
    ) -> Result<RasterFile, ToolError> {
        // Every fake input, PDF or not, already holds TIFF bytes.
        std::fs::copy(src, dst)?;
        Ok(RasterFile {
            path: dst.to_path_buf(),
        })
    }

    fn page_count(&self, path: &Path) -> Result<usize, ToolError> {
        Ok(self.containers.get(&stem(path)).map_or(1, Vec::len))
    }

    fn explode(
        &self,
        src: &Path,
        dir: &Path,
        base: &str,
        pages: usize,
    ) -> Result<Vec<PathBuf>, ToolError> {
        let dims = &self.containers[&stem(src)];
        assert_eq!(dims.len(), pages);
        dims.iter()
            .enumerate()
            .map(|(i, (w, h))| {
                let path = dir.join(format!("{base}{}.tif", i + 1));
                write_tiff(&path, *w, *h)?;
                Ok(path)
            })
            .collect()
    }
}

impl PageSplitter for FakeTools {
    fn split(&self, request: &SplitRequest) -> Result<SplitOutput, ToolError> {
        let page = stem(&request.source).trim_end_matches(".split").to_string();
        self.splits.lock().unwrap().push((page.clone(), request.layout));
        if let Some(status) = self.split_fails.get(&page) {
            return Err(ToolError::Failed {
                tool: "unpaper".into(),
                status: Some(*status),
                stderr: "unpaper: cannot process sheet".into(),
            });
        }
        for out in &request.outputs {
            std::fs::copy(&request.source, out)?;
        }
        Ok(SplitOutput {
            pages: request.outputs.clone(),
        })
    }
}

impl OcrEngine for FakeTools {
    fn recognize(
        &self,
        _image: &Path,
        output_base: &Path,
        _language: &str,
        _segmentation_mode: u8,
    ) -> Result<TextLayer, ToolError> {
        let sub = stem(output_base);
        let now = self.ocr_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.ocr_peak.fetch_max(now, Ordering::SeqCst);
        if let Some(ms) = self.ocr_delay_ms.get(&sub) {
            std::thread::sleep(Duration::from_millis(*ms));
        }
        self.ocr_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.ocr_fails.contains(&sub) {
            return Err(ToolError::Failed {
                tool: "tesseract".into(),
                status: Some(1),
                stderr: "Error during processing.".into(),
            });
        }
        let mut path = output_base.as_os_str().to_owned();
        path.push(".html");
        let path = PathBuf::from(path);
        std::fs::write(
            &path,
            format!("<span class='ocrx_word' title='bbox 1 1 9 9'>{sub}</span>"),
        )?;
        Ok(TextLayer { path })
    }
}

impl TextLayerEmbed for FakeTools {
    fn embed(&self, image: &Path, text_layer: &Path, output: &Path) -> Result<PdfPage, ToolError> {
        assert!(image.is_file() && text_layer.is_file());
        if let Some(status) = self.embed_fails.get(&stem(output)) {
            // hocr2pdf leaves a truncated file behind when it dies.
            std::fs::write(output, b"%PDF-")?;
            return Err(ToolError::Failed {
                tool: "hocr2pdf".into(),
                status: Some(*status),
                stderr: "hocr2pdf: premature end of hOCR".into(),
            });
        }
        std::fs::write(output, b"%PDF-fake")?;
        Ok(PdfPage {
            path: output.to_path_buf(),
        })
    }
}

impl PdfJoin for FakeTools {
    fn join(&self, inputs: &[PathBuf], output: &Path) -> Result<JoinedPdf, ToolError> {
        let manifest: String = inputs
            .iter()
            .map(|p| format!("{}\n", p.file_name().unwrap().to_string_lossy()))
            .collect();
        std::fs::write(output, manifest)?;
        Ok(JoinedPdf {
            path: output.to_path_buf(),
            inputs: inputs.len(),
        })
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Workspace {
    input: tempfile::TempDir,
    output: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        }
    }

    fn scan(&self, name: &str, width: u32, height: u32) -> &Self {
        write_tiff(&self.input.path().join(name), width, height).unwrap();
        self
    }

    fn config(&self) -> book_ocr::RunConfigBuilder {
        RunConfig::builder()
            .input_dir(self.input.path())
            .output_dir(self.output.path())
    }

    fn manifest(&self) -> Vec<String> {
        std::fs::read_to_string(self.output.path().join("book-ocr.pdf"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn output_entries(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(self.output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn input_entries(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(self.input.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_portrait_tiff() {
    init_logging();
    let ws = Workspace::new();
    ws.scan("scan.tif", 200, 300);
    let (tools, fakes) = FakeTools::default().into_toolchain();

    let output = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(ws.manifest(), strings(&["scan-A.pdf"]));
    assert_eq!(
        *fakes.splits.lock().unwrap(),
        vec![("scan".to_string(), Layout::Single)]
    );
    assert_eq!(output.output_path, ws.output.path().join("book-ocr.pdf"));
    assert_eq!(output.stats.intake_files, 1);
    assert_eq!(output.stats.canonical_pages, 1);
    assert_eq!(output.stats.sub_pages, 1);
    assert_eq!(output.stats.degraded_pages, 0);
    // The fake joiner writes a manifest, not a parsable PDF.
    assert_eq!(output.stats.final_page_count, None);
}

#[tokio::test]
async fn landscape_tiff_is_split_left_then_right() {
    let ws = Workspace::new();
    ws.scan("spread.tif", 300, 150);
    let (tools, fakes) = FakeTools::default().into_toolchain();

    convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(ws.manifest(), strings(&["spread-A.pdf", "spread-B.pdf"]));
    assert_eq!(fakes.splits.lock().unwrap()[0].1, Layout::Double);
}

#[tokio::test]
async fn multi_page_pdf_with_a_spread() {
    init_logging();
    let ws = Workspace::new();
    // The fake rasteriser copies bytes, so the "PDF" carries TIFF bytes.
    ws.scan("doc.pdf", 200, 300);
    let (tools, _) = FakeTools {
        containers: HashMap::from([(
            "doc".to_string(),
            vec![(200, 300), (400, 200), (200, 300)],
        )]),
        ..Default::default()
    }
    .into_toolchain();

    let output = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(
        ws.manifest(),
        strings(&["doc1-A.pdf", "doc2-A.pdf", "doc2-B.pdf", "doc3-A.pdf"])
    );
    assert_eq!(output.stats.canonical_pages, 3);
    assert_eq!(output.stats.sub_pages, 4);
    let names: Vec<_> = output.pages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["doc1-A", "doc2-A", "doc2-B", "doc3-A"]);
}

#[tokio::test]
async fn zero_page_container_aborts_everything() {
    init_logging();
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("broken.tif", 200, 300);
    let (tools, _) = FakeTools {
        containers: HashMap::from([("broken".to_string(), Vec::new())]),
        ..Default::default()
    }
    .into_toolchain();

    let err = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap_err();

    match &err {
        BookOcrError::InvalidContainer { file } => {
            assert_eq!(file, &ws.input.path().join("broken.tif"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), 1);
    assert!(
        ws.output_entries().is_empty(),
        "no output and no staging area may survive: {:?}",
        ws.output_entries()
    );
}

#[tokio::test]
async fn degraded_ocr_keeps_the_page() {
    init_logging();
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("b.tif", 200, 300);
    let (tools, _) = FakeTools {
        ocr_fails: HashSet::from(["b-A".to_string()]),
        ..Default::default()
    }
    .into_toolchain();

    let output = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(ws.manifest(), strings(&["a-A.pdf", "b-A.pdf"]));
    assert_eq!(output.stats.degraded_pages, 1);
    let degraded: Vec<_> = output.degraded_pages().map(|p| p.name.as_str()).collect();
    assert_eq!(degraded, vec!["b-A"]);
}

#[tokio::test]
async fn ambiguous_page_is_split_as_double_and_reported() {
    let ws = Workspace::new();
    ws.scan("square.tif", 200, 200);
    let (tools, fakes) = FakeTools::default().into_toolchain();

    let output = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(fakes.splits.lock().unwrap()[0].1, Layout::Double);
    assert_eq!(output.stats.ambiguous_pages, 1);
    assert_eq!(ws.manifest(), strings(&["square-A.pdf", "square-B.pdf"]));
    assert!(output.pages.iter().all(|p| p.issues.iter().any(|i| matches!(
        i,
        PageIssue::AmbiguousOrientation { page, .. } if page == "square"
    ))));
}

// ── Properties ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn join_order_ignores_completion_order() {
    init_logging();
    let ws = Workspace::new();
    let mut delays = HashMap::new();
    for n in 1..=12u64 {
        ws.scan(&format!("p{n}.tif"), 200, 300);
        // Later pages finish first.
        delays.insert(format!("p{n}-A"), (13 - n) * 15);
    }
    let (tools, fakes) = FakeTools {
        ocr_delay_ms: delays,
        ..Default::default()
    }
    .into_toolchain();

    let config = ws.config().concurrency(4).build().unwrap();
    let output = convert_directory(&config, &tools).await.unwrap();

    let expected: Vec<String> = (1..=12).map(|n| format!("p{n}-A.pdf")).collect();
    assert_eq!(ws.manifest(), expected);
    let names: Vec<String> = output.pages.iter().map(|p| format!("{}.pdf", p.name)).collect();
    assert_eq!(names, expected);
    assert!(fakes.ocr_peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn nothing_but_the_output_survives() {
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300)
        .scan("b.tiff", 300, 150)
        .scan("c.pdf", 200, 300);
    let before = ws.input_entries();
    let (tools, _) = FakeTools {
        containers: HashMap::from([("c".to_string(), vec![(200, 300), (200, 300)])]),
        ..Default::default()
    }
    .into_toolchain();

    convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap();

    assert_eq!(ws.output_entries(), vec!["book-ocr.pdf"]);
    assert_eq!(ws.input_entries(), before, "inputs must be left untouched");
    assert_eq!(
        ws.manifest(),
        strings(&["a-A.pdf", "b-A.pdf", "b-B.pdf", "c1-A.pdf", "c2-A.pdf"])
    );
}

#[tokio::test]
async fn repeated_runs_produce_the_same_pages() {
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("b.tif", 400, 200);

    let mut manifests = Vec::new();
    for _ in 0..2 {
        let (tools, _) = FakeTools::default().into_toolchain();
        convert_directory(&ws.config().build().unwrap(), &tools)
            .await
            .unwrap();
        manifests.push(ws.manifest());
    }
    assert_eq!(manifests[0], manifests[1]);
    assert_eq!(manifests[0].len(), 3);
}

#[tokio::test]
async fn rerun_in_the_input_directory_ignores_the_previous_output() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_tiff(&dir.path().join("a.tif"), 200, 300).unwrap();
    write_tiff(&dir.path().join("b.tif"), 400, 200).unwrap();
    let config = RunConfig::builder()
        .input_dir(dir.path())
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut manifests = Vec::new();
    for _ in 0..2 {
        let (tools, _) = FakeTools::default().into_toolchain();
        let output = convert_directory(&config, &tools).await.unwrap();
        assert_eq!(output.stats.intake_files, 2);
        manifests.push(std::fs::read_to_string(dir.path().join("book-ocr.pdf")).unwrap());
    }
    assert_eq!(manifests[0], manifests[1]);
    assert_eq!(manifests[0].lines().count(), 3);
}

#[tokio::test]
async fn embed_failure_aborts_the_run_and_cleans_up() {
    init_logging();
    let ws = Workspace::new();
    for n in 1..=8 {
        ws.scan(&format!("p{n}.tif"), 200, 300);
    }
    let before = ws.input_entries();
    let (tools, _) = FakeTools {
        embed_fails: HashMap::from([("p5-A".to_string(), 4)]),
        ..Default::default()
    }
    .into_toolchain();

    let config = ws.config().concurrency(4).build().unwrap();
    let err = convert_directory(&config, &tools).await.unwrap_err();

    assert!(
        matches!(
            err,
            BookOcrError::Enrich { ref sub_page, stage: "embedding", status: Some(4), .. }
                if sub_page == "p5-A"
        ),
        "unexpected error: {err}"
    );
    assert_eq!(err.exit_code(), 4);
    assert!(ws.output_entries().is_empty(), "no output and no staging dir");
    assert_eq!(ws.input_entries(), before);
}

#[tokio::test]
async fn split_failure_propagates_tool_status() {
    init_logging();
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("torn.tif", 200, 300);
    let (tools, _) = FakeTools {
        split_fails: HashMap::from([("torn".to_string(), 3)]),
        ..Default::default()
    }
    .into_toolchain();

    let err = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap_err();

    assert!(matches!(err, BookOcrError::Split { ref page, .. } if page == "torn"));
    assert_eq!(err.exit_code(), 3);
    assert!(ws.output_entries().is_empty());
}

#[tokio::test]
async fn duplicate_base_names_are_rejected_up_front() {
    let ws = Workspace::new();
    ws.scan("scan.tif", 200, 300).scan("scan.pdf", 200, 300);
    let (tools, fakes) = FakeTools::default().into_toolchain();

    let err = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap_err();

    assert!(matches!(err, BookOcrError::DuplicateBaseName { ref base, .. } if base == "scan"));
    assert!(fakes.splits.lock().unwrap().is_empty());
    assert!(ws.output_entries().is_empty());
}

#[tokio::test]
async fn unsupported_files_are_skipped_or_fatal() {
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("cover.png", 200, 300);
    let pattern = r"\.(tif|png)$";

    let (tools, _) = FakeTools::default().into_toolchain();
    let config = ws.config().input_pattern(pattern).build().unwrap();
    let output = convert_directory(&config, &tools).await.unwrap();
    assert_eq!(output.stats.intake_files, 2);
    assert_eq!(output.stats.skipped_files, 1);
    assert_eq!(ws.manifest(), strings(&["a-A.pdf"]));

    let (tools, _) = FakeTools::default().into_toolchain();
    let config = ws
        .config()
        .input_pattern(pattern)
        .output_name("strict.pdf")
        .unsupported(UnsupportedPolicy::Fail)
        .build()
        .unwrap();
    let err = convert_directory(&config, &tools).await.unwrap_err();
    assert!(matches!(err, BookOcrError::UnsupportedInput { ref extension, .. } if extension == "png"));
    assert!(!ws.output.path().join("strict.pdf").exists());
}

#[tokio::test]
async fn empty_directory_is_an_assemble_error() {
    let ws = Workspace::new();
    let (tools, _) = FakeTools::default().into_toolchain();

    let err = convert_directory(&ws.config().build().unwrap(), &tools)
        .await
        .unwrap_err();

    assert!(matches!(err, BookOcrError::Assemble { .. }));
    assert!(ws.output_entries().is_empty());
}

#[tokio::test]
async fn existing_staging_dir_is_refused() {
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300);
    let staging = ws.output.path().join("busy");
    std::fs::create_dir(&staging).unwrap();
    std::fs::write(staging.join("keep.txt"), b"not ours").unwrap();
    let (tools, _) = FakeTools::default().into_toolchain();

    let config = ws.config().staging_dir(&staging).build().unwrap();
    let err = convert_directory(&config, &tools).await.unwrap_err();

    assert!(matches!(err, BookOcrError::StagingCreate { .. }));
    assert!(staging.join("keep.txt").exists());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl RunProgressCallback for Recorder {
    fn on_run_start(&self, intake_files: usize) {
        self.events.lock().unwrap().push(format!("start {intake_files}"));
    }
    fn on_page_classified(&self, page: &str, orientation: Orientation) {
        self.events
            .lock()
            .unwrap()
            .push(format!("classify {page} {orientation:?}"));
    }
    fn on_enrich_start(&self, total_sub_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("enrich {total_sub_pages}"));
    }
    fn on_sub_page_complete(&self, name: &str, degraded: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {name} {degraded}"));
    }
    fn on_run_complete(&self, stats: &RunStats) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {}", stats.sub_pages));
    }
}

#[tokio::test]
async fn progress_events_follow_the_stages() {
    let ws = Workspace::new();
    ws.scan("a.tif", 200, 300).scan("b.tif", 300, 150);
    let recorder = Arc::new(Recorder::default());
    let (tools, _) = FakeTools::default().into_toolchain();

    let config = ws
        .config()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    convert_directory(&config, &tools).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        strings(&[
            "start 2",
            "classify a Single",
            "classify b Double",
            "enrich 3",
            "done a-A false",
            "done b-A false",
            "done b-B false",
            "complete 3",
        ])
    );
}
