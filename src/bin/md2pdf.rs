//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to configuration
//! overrides, runs the batch against a pool of external renderers and
//! prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md2pdf::config::layer::{
    AuthorLayer, CoverLayer, DocumentLayer, FooterLayer, PageLayer, StyleLayer, TocLayer,
    WatermarkLayer,
};
use edgequake_md2pdf::config::{load, Orientation, PageSize};
use edgequake_md2pdf::{
    batch, discover_jobs, load_config_file, resolve, BatchProgressCallback, BatchResult,
    CommandConverter, ConfigLayer, ConverterPool, Environment, Feature, Job, Overrides,
    ProgressCallback, RequestBuilder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished file. Files finish out
/// of order, so start times are tracked per input path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<PathBuf, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, job: &Job) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job.input)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_jobs: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_jobs as u64);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_jobs} files…"))
        ));
    }

    fn on_job_start(&self, job: &Job) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.input.clone(), Instant::now());
        self.bar.set_message(job.input.display().to_string());
    }

    fn on_job_complete(&self, job: &Job, bytes_written: usize) {
        let secs = self.elapsed_secs(job);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            job.output.display(),
            dim(&format!("{:>8} bytes", bytes_written)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_error(&self, job: &Job, error: &str) {
        let secs = self.elapsed_secs(job);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = match error.char_indices().nth(80) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            job.input.display(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_jobs: usize, succeeded: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total_jobs {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_jobs,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Convert one file next to its source (docs/guide.pdf)
  md2pdf --renderer md-render docs/guide.md

  # Convert a whole tree, mirroring it under build/pdf
  md2pdf --renderer md-render docs/ -o build/pdf

  # Single file to an explicit target
  md2pdf --renderer md-render README.md -o dist/handbook.pdf

  # Shared settings from a file, cover and TOC on, watermark off
  md2pdf -c md2pdf.toml --with cover --with toc --no-watermark docs/

  # Machine-readable summary
  md2pdf --json --renderer md-render docs/ -o out > result.json

RENDERER PROTOCOL:
  Each worker owns a scratch directory and runs, once per file:
      <renderer> [--renderer-arg ...] request.json output.pdf
  request.json holds the Markdown source and the resolved settings for that
  file. The renderer must write output.pdf and exit 0.

CONFIG FILE (TOML, every key optional):
  [author]      name, title, email, organization
  [document]    title, subtitle, version, date ("auto" = today)
  [page]        size (letter|a4|legal), orientation, margin_inches
  [style]       enabled, name, css_file
  [cover]       enabled, title, subtitle, logo
  [signature]   enabled, image, links = [{ label, url }]
  [footer]      enabled, position (left|center|right), show_page_number,
                text, status, date
  [watermark]   enabled, text, color ("#rrggbb"), opacity, angle
  [toc]         enabled, title, min_depth, max_depth
  [page_breaks] enabled, before_h1, before_h2, before_h3, orphans, widows

  Precedence: command-line flags > config file > built-in defaults.

ENVIRONMENT VARIABLES:
  MD2PDF_RENDERER   Renderer executable
  MD2PDF_CONFIG     Config file path
  MD2PDF_WORKERS    Number of renderer instances
  RUST_LOG          Log filter (overrides -v / -q)
"##;

/// Convert Markdown files and directories to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files and directories to PDF",
    long_about = "Convert a Markdown file, or every Markdown file under a directory, to PDF. \
Files are rendered in parallel by a fixed pool of external renderer processes; one failing \
file never stops the others, and every failure is reported at the end.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file or directory.
    input: PathBuf,

    /// Output directory, or a .pdf path when converting a single file.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// TOML config file.
    #[arg(short, long, env = "MD2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Number of renderer instances (and concurrent conversions).
    #[arg(short, long, env = "MD2PDF_WORKERS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=256))]
    workers: u16,

    /// Renderer executable.
    #[arg(long, env = "MD2PDF_RENDERER")]
    renderer: PathBuf,

    /// Extra argument passed to the renderer before the file names (repeatable).
    #[arg(long = "renderer-arg", value_name = "ARG", allow_hyphen_values = true)]
    renderer_args: Vec<String>,

    // ── Identity ─────────────────────────────────────────────────────────
    /// Author name.
    #[arg(long, env = "MD2PDF_AUTHOR_NAME")]
    author_name: Option<String>,

    /// Author job title.
    #[arg(long, env = "MD2PDF_AUTHOR_TITLE")]
    author_title: Option<String>,

    /// Author email.
    #[arg(long, env = "MD2PDF_AUTHOR_EMAIL")]
    author_email: Option<String>,

    /// Author organization.
    #[arg(long, env = "MD2PDF_AUTHOR_ORGANIZATION")]
    author_organization: Option<String>,

    /// Document title (default: first heading, else file name).
    #[arg(long, env = "MD2PDF_DOC_TITLE")]
    doc_title: Option<String>,

    /// Document subtitle.
    #[arg(long, env = "MD2PDF_DOC_SUBTITLE")]
    doc_subtitle: Option<String>,

    /// Document version.
    #[arg(long, env = "MD2PDF_DOC_VERSION")]
    doc_version: Option<String>,

    /// Document date, or "auto" for today.
    #[arg(long, env = "MD2PDF_DOC_DATE")]
    doc_date: Option<String>,

    // ── Layout ───────────────────────────────────────────────────────────
    /// Paper size.
    #[arg(long, env = "MD2PDF_PAGE_SIZE", value_enum)]
    page_size: Option<PageSizeArg>,

    /// Paper orientation.
    #[arg(long, env = "MD2PDF_ORIENTATION", value_enum)]
    orientation: Option<OrientationArg>,

    /// Page margin in inches (0–3).
    #[arg(long, env = "MD2PDF_MARGIN")]
    margin: Option<f32>,

    /// Named stylesheet.
    #[arg(long, env = "MD2PDF_STYLE")]
    style: Option<String>,

    /// Extra CSS file for the stylesheet.
    #[arg(long, env = "MD2PDF_CSS")]
    css: Option<PathBuf>,

    /// Cover logo image.
    #[arg(long, env = "MD2PDF_COVER_LOGO")]
    cover_logo: Option<PathBuf>,

    /// Free text shown in the footer.
    #[arg(long, env = "MD2PDF_FOOTER_TEXT")]
    footer_text: Option<String>,

    /// Watermark text.
    #[arg(long, env = "MD2PDF_WATERMARK_TEXT")]
    watermark_text: Option<String>,

    /// Table of contents heading.
    #[arg(long, env = "MD2PDF_TOC_TITLE")]
    toc_title: Option<String>,

    // ── Feature switches ─────────────────────────────────────────────────
    /// Turn a feature on (repeatable): cover, signature, footer, watermark,
    /// toc, page-breaks, style.
    #[arg(long = "with", value_name = "FEATURE", value_enum)]
    with: Vec<FeatureArg>,

    /// Omit the cover page.
    #[arg(long)]
    no_cover: bool,

    /// Omit the signature block.
    #[arg(long)]
    no_signature: bool,

    /// Omit the footer.
    #[arg(long)]
    no_footer: bool,

    /// Omit the watermark.
    #[arg(long)]
    no_watermark: bool,

    /// Omit the table of contents.
    #[arg(long)]
    no_toc: bool,

    /// Disable page-break rules.
    #[arg(long)]
    no_page_breaks: bool,

    /// Render without a stylesheet.
    #[arg(long)]
    no_style: bool,

    // ── Output ───────────────────────────────────────────────────────────
    /// Print the batch result as JSON on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    Letter,
    A4,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FeatureArg {
    Cover,
    Signature,
    Footer,
    Watermark,
    Toc,
    PageBreaks,
    Style,
}

impl From<FeatureArg> for Feature {
    fn from(v: FeatureArg) -> Self {
        match v {
            FeatureArg::Cover => Feature::Cover,
            FeatureArg::Signature => Feature::Signature,
            FeatureArg::Footer => Feature::Footer,
            FeatureArg::Watermark => Feature::Watermark,
            FeatureArg::Toc => Feature::Toc,
            FeatureArg::PageBreaks => Feature::PageBreaks,
            FeatureArg::Style => Feature::Style,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
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

    // ── Resolve configuration ────────────────────────────────────────────
    let file_layer = match cli.config {
        Some(ref path) => load_config_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLayer::default(),
    };
    let overrides = build_overrides(&cli);
    load::validate(&overrides.layer).context("Invalid command-line settings")?;

    let mut env = Environment::system();
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        env = env.with_progress(cb);
    }
    let config = Arc::new(resolve(
        &ConfigLayer::builtin(),
        &file_layer,
        &overrides,
        &env,
    ));

    // ── Discover ─────────────────────────────────────────────────────────
    let jobs = discover_jobs(&cli.input, cli.output.as_deref())
        .await
        .with_context(|| format!("Failed to collect input from {}", cli.input.display()))?;

    // ── Start renderers ──────────────────────────────────────────────────
    let workers = usize::from(cli.workers).min(jobs.len()).max(1);
    let converters = CommandConverter::instances(workers, &cli.renderer, &cli.renderer_args)
        .context("Failed to prepare renderer workers")?;
    let pool = ConverterPool::new(converters).context("Failed to create renderer pool")?;

    // ── Run, cancelling on Ctrl-C ────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let builder = RequestBuilder::new(config);
    let result = batch::run(&cancel, jobs, &pool, &builder, &env).await;
    if cancel.is_cancelled() {
        eprintln!("{} interrupted; unfinished files were skipped", cyan("⚠"));
    }

    if let Err(e) = pool.close().await {
        tracing::warn!("Renderer shutdown incomplete: {}", e);
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else if !cli.quiet && !show_progress {
        print_summary(&result, cli.output.as_deref());
    }

    result.into_result().context("Conversion failed")?;
    Ok(())
}

/// Map CLI flags to the override layer.
fn build_overrides(cli: &Cli) -> Overrides {
    let mut layer = ConfigLayer {
        author: AuthorLayer {
            name: cli.author_name.clone(),
            title: cli.author_title.clone(),
            email: cli.author_email.clone(),
            organization: cli.author_organization.clone(),
        },
        document: DocumentLayer {
            title: cli.doc_title.clone(),
            subtitle: cli.doc_subtitle.clone(),
            version: cli.doc_version.clone(),
            date: cli.doc_date.clone(),
        },
        page: PageLayer {
            size: cli.page_size.map(Into::into),
            orientation: cli.orientation.map(Into::into),
            margin_inches: cli.margin,
        },
        style: StyleLayer {
            name: cli.style.clone(),
            css_file: cli.css.clone(),
            ..Default::default()
        },
        cover: CoverLayer {
            logo: cli.cover_logo.clone(),
            ..Default::default()
        },
        footer: FooterLayer {
            text: cli.footer_text.clone(),
            ..Default::default()
        },
        watermark: WatermarkLayer {
            text: cli.watermark_text.clone(),
            ..Default::default()
        },
        toc: TocLayer {
            title: cli.toc_title.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    for feature in cli.with.iter().copied().map(Feature::from) {
        set_enabled(&mut layer, feature);
    }

    let switches = [
        (cli.no_cover, Feature::Cover),
        (cli.no_signature, Feature::Signature),
        (cli.no_footer, Feature::Footer),
        (cli.no_watermark, Feature::Watermark),
        (cli.no_toc, Feature::Toc),
        (cli.no_page_breaks, Feature::PageBreaks),
        (cli.no_style, Feature::Style),
    ];
    switches
        .into_iter()
        .filter(|(off, _)| *off)
        .fold(Overrides::new(layer), |o, (_, feature)| o.disable(feature))
}

fn set_enabled(layer: &mut ConfigLayer, feature: Feature) {
    let switch = match feature {
        Feature::Cover => &mut layer.cover.enabled,
        Feature::Signature => &mut layer.signature.enabled,
        Feature::Footer => &mut layer.footer.enabled,
        Feature::Watermark => &mut layer.watermark.enabled,
        Feature::Toc => &mut layer.toc.enabled,
        Feature::PageBreaks => &mut layer.page_breaks.enabled,
        Feature::Style => &mut layer.style.enabled,
    };
    *switch = Some(true);
}

fn print_summary(result: &BatchResult, output: Option<&Path>) {
    let stats = &result.stats;
    let target = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "beside sources".to_string());
    eprintln!(
        "{}  {}/{} files  {}  {}ms  →  {}",
        if stats.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.succeeded,
        stats.total,
        dim(&format!("{} bytes", stats.bytes_written)),
        stats.duration_ms,
        bold(&target),
    );
    for failure in result.failures() {
        eprintln!(
            "   {} {}: {}",
            red("✗"),
            failure.input.display(),
            failure.error
        );
    }
}
