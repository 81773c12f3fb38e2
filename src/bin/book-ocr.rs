//! CLI binary for book-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `RunConfig`
//! and `SystemTools`, renders progress and turns fatal errors into exit
//! statuses.

use anyhow::{Context, Result};
use book_ocr::{
    convert_directory, BookOcrError, Orientation, ProgressCallback, RunConfig,
    RunProgressCallback, RunStats, SystemTools, Toolchain, UnsupportedPolicy,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner during intake and splitting, then a bar over Sub-Pages while they
/// are enriched. Sub-Pages may complete out of order when `--jobs` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Listing input directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, intake_files: usize) {
        self.bar.set_prefix("Intake");
        self.bar
            .set_message(format!("{intake_files} file(s) to normalise"));
    }

    fn on_intake_file(&self, name: &str, index: usize, total: usize) {
        self.bar.set_message(format!("{name} ({index}/{total})"));
    }

    fn on_page_classified(&self, page: &str, orientation: Orientation) {
        self.bar.set_prefix("Splitting");
        match orientation {
            Orientation::Ambiguous => self.bar.println(format!(
                "  {} {}  ambiguous orientation, split as two pages",
                yellow("⚠"),
                page
            )),
            _ => self.bar.set_message(page.to_string()),
        }
    }

    fn on_enrich_start(&self, total_sub_pages: usize) {
        self.activate_bar(total_sub_pages);
    }

    fn on_sub_page_start(&self, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(name.to_string(), Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_sub_page_complete(&self, name: &str, degraded: bool) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(name)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        let (mark, note) = if degraded {
            (yellow("⚠"), yellow("no text recognised"))
        } else {
            (green("✓"), String::new())
        };
        self.bar.println(format!(
            "  {} {:<16}  {}  {}",
            mark,
            name,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            note,
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        if stats.degraded_pages == 0 {
            eprintln!(
                "{} {} pages recognised",
                green("✔"),
                bold(&stats.sub_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages  ({} without text)",
                yellow("⚠"),
                bold(&stats.sub_pages.to_string()),
                yellow(&stats.degraded_pages.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every tif/tiff/pdf in the current directory into book-ocr.pdf
  book-ocr

  # Scans in ./scans, 400 dpi, custom output name
  book-ocr scans -d 400 -o my-book.pdf

  # Only files named page-*.tif, German OCR, four pages at a time
  book-ocr scans -i '^page-.*\.tif$' --lang deu -j 4

  # Machine-readable run report
  book-ocr scans --json > report.json

EXIT STATUS:
  0    success
  1    an input container reported zero pages
  N    an external tool failed with status N (split, convert, embed, join)
  2    any other error

REQUIRED TOOLS:
  convert, identify   ImageMagick          apt install imagemagick
  unpaper             deskew/crop/split    apt install unpaper
  tesseract           OCR (hOCR output)    apt install tesseract-ocr
  hocr2pdf            ExactImage           apt install exactimage
  qpdf                PDF join             apt install qpdf
"#;

/// Convert a directory of scanned pages into one searchable PDF.
#[derive(Parser, Debug)]
#[command(
    name = "book-ocr",
    version,
    about = "Convert a directory of scanned pages into one searchable PDF",
    long_about = "Normalise TIFF and PDF scans into single pages, split two-page spreads, \
OCR every page and join the results, in file-name order, into one PDF with an invisible \
text layer.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding the scanned files.
    #[arg(default_value = ".", env = "BOOK_OCR_INPUT_DIR")]
    input_dir: PathBuf,

    /// Regular expression selecting input files by name.
    #[arg(short, long, env = "BOOK_OCR_INPUT_PATTERN",
          default_value = book_ocr::config::DEFAULT_INPUT_PATTERN)]
    input_pattern: String,

    /// File name of the joined PDF.
    #[arg(short, long, env = "BOOK_OCR_OUTPUT",
          default_value = book_ocr::config::DEFAULT_OUTPUT_NAME)]
    output: String,

    /// Resolution for rasterising and processing, in DPI.
    #[arg(short, long, env = "BOOK_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..=2400))]
    dpi: u32,

    /// Directory the joined PDF is written to (default: current directory).
    #[arg(long, env = "BOOK_OCR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Working directory for intermediates; must not exist yet.
    #[arg(long, env = "BOOK_OCR_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Number of pages OCR'd concurrently.
    #[arg(short, long, env = "BOOK_OCR_JOBS", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    jobs: u16,

    /// Tesseract language(s), e.g. `eng` or `deu+eng`.
    #[arg(long, env = "BOOK_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "BOOK_OCR_PSM", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// JPEG quality of the embedded page images (1–100).
    #[arg(long, env = "BOOK_OCR_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Fail on matched files that are not tif, tiff or pdf instead of skipping them.
    #[arg(long, env = "BOOK_OCR_STRICT")]
    strict: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "BOOK_OCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BOOK_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BOOK_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BOOK_OCR_QUIET")]
    quiet: bool,

    /// ImageMagick `convert` binary.
    #[arg(long, env = "BOOK_OCR_CONVERT_BIN", default_value = "convert")]
    convert_bin: PathBuf,

    /// ImageMagick `identify` binary.
    #[arg(long, env = "BOOK_OCR_IDENTIFY_BIN", default_value = "identify")]
    identify_bin: PathBuf,

    /// `unpaper` binary.
    #[arg(long, env = "BOOK_OCR_UNPAPER_BIN", default_value = "unpaper")]
    unpaper_bin: PathBuf,

    /// `tesseract` binary.
    #[arg(long, env = "BOOK_OCR_TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// ExactImage `hocr2pdf` binary.
    #[arg(long, env = "BOOK_OCR_HOCR2PDF_BIN", default_value = "hocr2pdf")]
    hocr2pdf_bin: PathBuf,

    /// `qpdf` binary.
    #[arg(long, env = "BOOK_OCR_QPDF_BIN", default_value = "qpdf")]
    qpdf_bin: PathBuf,

    /// Do not check that every tool is installed before starting.
    #[arg(long, env = "BOOK_OCR_SKIP_PREFLIGHT")]
    skip_preflight: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            let code = e
                .downcast_ref::<BookOcrError>()
                .map(BookOcrError::exit_code)
                .unwrap_or(2);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let tools = system_tools(cli);
    if !cli.skip_preflight {
        tools.preflight()?;
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb)?;

    let output = convert_directory(&config, &Toolchain::system(&tools)).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages from {} file(s)  {}ms  →  {}",
            if stats.degraded_pages == 0 {
                green("✔")
            } else {
                yellow("⚠")
            },
            stats.sub_pages,
            stats.intake_files - stats.skipped_files,
            stats.total_duration_ms,
            bold(&output.output_path.display().to_string()),
        );
        for page in output.degraded_pages() {
            eprintln!("   {} {}", yellow("no text:"), page.name);
        }
        if stats.skipped_files > 0 {
            eprintln!("   {}", dim(&format!("{} unsupported file(s) skipped", stats.skipped_files)));
        }
        if let Some(found) = stats.final_page_count.filter(|n| *n != stats.sub_pages) {
            eprintln!(
                "   {} joined PDF has {} pages, expected {}",
                yellow("⚠"),
                found,
                stats.sub_pages
            );
        }
    }

    Ok(())
}

fn system_tools(cli: &Cli) -> SystemTools {
    SystemTools {
        convert: cli.convert_bin.clone(),
        identify: cli.identify_bin.clone(),
        unpaper: cli.unpaper_bin.clone(),
        tesseract: cli.tesseract_bin.clone(),
        hocr2pdf: cli.hocr2pdf_bin.clone(),
        qpdf: cli.qpdf_bin.clone(),
    }
}

/// Map CLI args to `RunConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let mut builder = RunConfig::builder()
        .input_dir(&cli.input_dir)
        .input_pattern(&cli.input_pattern)
        .dpi(cli.dpi)
        .output_name(&cli.output)
        .concurrency(usize::from(cli.jobs))
        .ocr_language(&cli.lang)
        .ocr_segmentation_mode(cli.psm)
        .jpeg_quality(cli.jpeg_quality)
        .unsupported(if cli.strict {
            UnsupportedPolicy::Fail
        } else {
            UnsupportedPolicy::Skip
        });

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    Ok(builder.build()?)
}
