//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2img::detect::{self, GutterPosition};
use edgequake_pdf2img::{
    convert, inspect, split_pages, suggest_margin, suggest_markers, ConversionConfig,
    ConversionConfigBuilder, ConversionProgressCallback, ConvertOptions, CropRegion, ExternalTool,
    GutterConfig, MarkerConfig, PageSelection, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages finish out of order, so start times are keyed by page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    reused: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` sets the length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF info…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            reused: AtomicUsize::new(0),
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
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: usize, _total: usize) {
        self.start_times.lock().unwrap().insert(page, Instant::now());
        self.bar.set_message(format!("page {}", page + 1));
    }

    fn on_page_complete(&self, page: usize, total: usize, path: &Path, regenerated: bool) {
        let secs = self.elapsed_secs(page);
        let tag = if regenerated {
            green("✓")
        } else {
            self.reused.fetch_add(1, Ordering::SeqCst);
            dim("=")
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            tag,
            page + 1,
            total,
            path.display(),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page);
        // First line only; tool stderr follows on the next lines.
        let msg = error.lines().next().unwrap_or(error);
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        let reused = self.reused.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages ready {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("({reused} up to date)"))
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as PNG next to the PDF (form-0.png, form-1.png, …)
  pdf2img convert form.pdf

  # 300 DPI JPEGs of pages 2-5 into ./pages
  pdf2img convert --density 300 --ext jpg --pages 2-5 -o pages form.pdf

  # One tall image of the whole document
  pdf2img convert --combine form.pdf

  # Extra tool options, GraphicsMagick instead of ImageMagick
  pdf2img --gm --option -flatten --option -quality=90 convert form.pdf

  # Pages 3-6 into a smaller PDF
  pdf2img split --ext pdf book.pdf 3-6

  # Horizontal marker lines in the left strip of a scan
  pdf2img markers --crop 277x2111+0+0 scan.jpg

  # Gutter position, falling back to 40% of the width
  pdf2img gutter --override 0.4 scan.jpg

  # Feed already-captured "h x y" lines to the marker clusterer
  cat components.txt | pdf2img markers --raw -

REQUIRED TOOLS:
  convert     ImageMagick (default image tool)
  gm          GraphicsMagick (with --gm)
  pdfinfo     poppler-utils (page count)

ENVIRONMENT VARIABLES:
  Every flag can be set as PDF2IMG_<FLAG>, e.g. PDF2IMG_DENSITY=300.
  RUST_LOG overrides the log filter.
"#;

/// Convert PDF pages to images and detect marker lines in scans.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Convert PDF pages to images and detect marker lines in scans",
    long_about = "Convert PDF documents (local files or URLs) into page images with ImageMagick \
or GraphicsMagick, split PDFs, and find horizontal markers and vertical gutters in scanned forms.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    tools: ToolArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

/// Flags shared by every subcommand that runs a tool.
#[derive(Args, Debug)]
struct ToolArgs {
    /// Use GraphicsMagick (`gm convert`) instead of ImageMagick.
    #[arg(long, global = true, env = "PDF2IMG_GM")]
    gm: bool,

    /// Path to the ImageMagick/GraphicsMagick binary.
    #[arg(long, global = true, env = "PDF2IMG_CONVERT_BIN")]
    convert_bin: Option<PathBuf>,

    /// Path to `pdfinfo`.
    #[arg(long, global = true, env = "PDF2IMG_PDFINFO_BIN")]
    pdfinfo_bin: Option<PathBuf>,

    /// Extra tool option, repeatable: `-flatten` or `-quality=90`.
    #[arg(
        long = "option",
        value_name = "NAME[=VALUE]",
        global = true,
        allow_hyphen_values = true,
        env = "PDF2IMG_OPTIONS",
        value_delimiter = ','
    )]
    options: Vec<String>,

    /// Rasterisation density in DPI (shorthand for `--option -density=N`).
    #[arg(long, global = true, env = "PDF2IMG_DENSITY")]
    density: Option<u32>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert PDF pages into images.
    Convert(ConvertArgs),
    /// Extract a page list (`1,3,7` or `3-6`) into one output file.
    Split(SplitArgs),
    /// Print `pdfinfo` entries.
    Info(InfoArgs),
    /// Suggest horizontal marker positions (y) in a scan.
    Markers(MarkersArgs),
    /// Suggest the vertical gutter position (x) in a scan.
    Gutter(GutterArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output directory. Default: next to the PDF (current dir for URLs).
    #[arg(short, long, env = "PDF2IMG_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Base name of output files. Default: PDF file name without `.pdf`.
    #[arg(long, env = "PDF2IMG_BASE_NAME")]
    base_name: Option<String>,

    /// Output extension; selects the image format.
    #[arg(long, env = "PDF2IMG_EXT", default_value = "png")]
    ext: String,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    #[command(flatten)]
    output: OutputArgs,

    /// Page selection (1-indexed): all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2IMG_PAGES", default_value = "all")]
    pages: String,

    /// Append all pages into `<base>.<ext>` and delete the page images.
    #[arg(long, env = "PDF2IMG_COMBINE")]
    combine: bool,

    /// Number of tool processes running at once.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Output structured JSON (ConversionOutput) instead of paths.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Pages in the tool's 0-based frame syntax: `1,3,7` or `3-6`.
    page_list: String,

    /// Name the output `<base>-<N>.<ext>` instead of `<base>.<ext>`.
    #[arg(long, env = "PDF2IMG_PAGE")]
    page: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output JSON instead of `Key: value` lines.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct MarkersArgs {
    /// Scan image or PDF (local path or URL).
    #[arg(required_unless_present = "raw")]
    input: Option<String>,

    /// Region to analyse as WxH+X+Y. Default: the whole image.
    #[arg(long, env = "PDF2IMG_CROP")]
    crop: Option<String>,

    /// Merge radius in pixels.
    #[arg(long, env = "PDF2IMG_MERGE_MARGIN", default_value_t = 50)]
    merge_margin: i64,

    /// Skip the tool; read `h x y` lines from FILE, or stdin with `-`.
    #[arg(long, value_name = "FILE|-", env = "PDF2IMG_RAW")]
    raw: Option<String>,

    /// Output a JSON array.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct GutterArgs {
    /// Scan image or PDF (local path or URL).
    #[arg(required_unless_present = "raw")]
    input: Option<String>,

    /// Region to analyse as WxH+X+Y. Default: the whole image.
    /// Required with --raw, where it supplies row count and width.
    #[arg(long, env = "PDF2IMG_CROP")]
    crop: Option<String>,

    /// Columns at or left of this x are ignored.
    #[arg(long, env = "PDF2IMG_GHOST_MARGIN", default_value_t = 50)]
    ghost_margin: i64,

    /// Fraction of rows a column must appear in, (0, 1].
    #[arg(long, env = "PDF2IMG_FUZZ", default_value_t = 1.0)]
    fuzz: f64,

    /// Fallback position as a fraction of the width, [0, 1].
    #[arg(long = "override", env = "PDF2IMG_OVERRIDE")]
    override_fraction: Option<f64>,

    /// Skip the tool; read `x y` lines from FILE, or stdin with `-`.
    #[arg(long, value_name = "FILE|-", env = "PDF2IMG_RAW", requires = "crop")]
    raw: Option<String>,

    /// Output JSON with the detection kind.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is visible.
    let show_progress = match &cli.command {
        Command::Convert(a) => !cli.quiet && !a.no_progress && !a.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let base = base_builder(&cli.tools)?;

    match cli.command {
        Command::Convert(args) => run_convert(args, base, show_progress, cli.quiet).await,
        Command::Split(args) => run_split(args, base).await,
        Command::Info(args) => run_info(args, base).await,
        Command::Markers(args) => run_markers(args, base).await,
        Command::Gutter(args) => run_gutter(args, base).await,
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────

async fn run_convert(
    args: ConvertArgs,
    base: ConversionConfigBuilder,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let mut builder = with_output(base, &args.output)
        .pages(parse_pages(&args.pages)?)
        .combined_image(args.combine)
        .concurrency(args.concurrency);

    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output = convert(&args.input, &config)
        .await
        .context("Conversion failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        for path in output.image_paths() {
            println!("{}", path.display());
        }
    }

    if !quiet && !show_progress && !args.json {
        eprintln!(
            "Converted {} and reused {} of {} pages in {}ms",
            output.stats.converted_pages,
            output.stats.reused_pages,
            output.stats.selected_pages,
            output.stats.total_duration_ms
        );
    }
    if output.stats.failed_pages > 0 {
        for err in output.pages.iter().filter_map(|p| p.error.as_ref()) {
            eprintln!("  {} {}", red("✗"), err);
        }
        anyhow::bail!("{} pages failed", output.stats.failed_pages);
    }
    Ok(())
}

async fn run_split(args: SplitArgs, base: ConversionConfigBuilder) -> Result<()> {
    let config = with_output(base, &args.output)
        .build()
        .context("Invalid configuration")?;
    let out = split_pages(&args.input, &args.page_list, args.page, &config)
        .await
        .context("Split failed")?;
    println!("{}", out.display());
    Ok(())
}

async fn run_info(args: InfoArgs, base: ConversionConfigBuilder) -> Result<()> {
    let config = base.build().context("Invalid configuration")?;
    let info = inspect(&args.input, &config)
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info.entries).context("Failed to serialize info")?
        );
    } else {
        let width = info.entries.keys().map(|k| k.len()).max().unwrap_or(0) + 1;
        for (key, value) in &info.entries {
            println!("{:<width$} {}", format!("{key}:"), value, width = width);
        }
    }
    Ok(())
}

async fn run_markers(args: MarkersArgs, base: ConversionConfigBuilder) -> Result<()> {
    let markers_cfg = MarkerConfig {
        merge_margin: args.merge_margin,
    };
    let config = base
        .markers(markers_cfg)
        .build()
        .context("Invalid configuration")?;

    let markers = if let Some(ref raw) = args.raw {
        detect::parse_marker_output(&read_raw(raw)?, &config.markers)
    } else {
        let crop = parse_crop(args.crop.as_deref())?;
        let input = args.input.as_deref().context("No input given")?;
        suggest_markers(input, crop, &config)
            .await
            .context("Marker detection failed")?
    };

    if args.json {
        println!("{}", serde_json::to_string(&markers)?);
    } else {
        for y in markers {
            println!("{y}");
        }
    }
    Ok(())
}

async fn run_gutter(args: GutterArgs, base: ConversionConfigBuilder) -> Result<()> {
    let gutter_cfg = GutterConfig {
        ghost_margin: args.ghost_margin,
        fuzz_margin: args.fuzz,
        override_fraction: args.override_fraction,
    };
    let config = base
        .gutter(gutter_cfg)
        .build()
        .context("Invalid configuration")?;
    let crop = parse_crop(args.crop.as_deref())?;

    let position = if let Some(ref raw) = args.raw {
        let crop = crop.context("--raw needs --crop for row count and width")?;
        detect::parse_vertical_position_output(
            &read_raw(raw)?,
            crop.height,
            crop.width,
            &config.gutter,
        )
    } else {
        let input = args.input.as_deref().context("No input given")?;
        suggest_margin(input, crop, &config)
            .await
            .context("Gutter detection failed")?
    };

    if args.json {
        let kind = match position {
            GutterPosition::Detected(_) => "detected",
            GutterPosition::Fallback(_) => "fallback",
            GutterPosition::NotFound => "not_found",
        };
        println!(
            "{}",
            serde_json::json!({ "position": position.value(), "kind": kind })
        );
    } else {
        println!("{}", position.value());
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Builder pre-loaded with the tool flags shared by every subcommand.
fn base_builder(tools: &ToolArgs) -> Result<ConversionConfigBuilder> {
    let mut image_tool = if tools.gm {
        ExternalTool::graphicsmagick()
    } else {
        ExternalTool::imagemagick()
    };
    if let Some(ref bin) = tools.convert_bin {
        image_tool.program = bin.clone();
    }
    let info_tool = match tools.pdfinfo_bin {
        Some(ref bin) => ExternalTool::custom(bin.clone(), Vec::<String>::new()),
        None => ExternalTool::pdfinfo(),
    };

    let mut options: ConvertOptions = tools
        .options
        .iter()
        .map(|s| parse_option(s))
        .collect::<Result<_>>()?;
    if let Some(dpi) = tools.density {
        options.set("-density", Some(dpi.to_string().as_str()));
    }

    Ok(ConversionConfig::builder()
        .image_tool(image_tool)
        .info_tool(info_tool)
        .convert_options(options)
        .download_timeout_secs(tools.download_timeout))
}

fn with_output(mut builder: ConversionConfigBuilder, out: &OutputArgs) -> ConversionConfigBuilder {
    if let Some(ref dir) = out.output_dir {
        builder = builder.output_directory(dir);
    }
    if let Some(ref name) = out.base_name {
        builder = builder.base_name(name);
    }
    builder.extension(&out.ext)
}

/// `-quality=90` → (`-quality`, `90`); `-flatten` → (`-flatten`, none).
fn parse_option(s: &str) -> Result<(String, Option<String>)> {
    let s = s.trim();
    let (name, value) = match s.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (s, None),
    };
    if !name.starts_with(['-', '+']) || name.len() < 2 {
        anyhow::bail!("Tool option must start with '-' or '+', got '{}'", s);
    }
    Ok((name.to_string(), value))
}

fn parse_crop(s: Option<&str>) -> Result<Option<CropRegion>> {
    s.map(|g| g.parse::<CropRegion>().context("Invalid --crop"))
        .transpose()
}

/// Read already-captured tool output from a file, or stdin for `-`.
fn read_raw(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))
    }
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
