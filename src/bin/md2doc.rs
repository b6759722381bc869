//! CLI binary for md2doc.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `ConvertJob` / `BatchOptions` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2doc::{
    convert_batch, parse_format_list, BatchOptions, BatchProgressCallback, ConversionConfig,
    Converter, ConvertJob, FileOutcome, OutcomeStatus, PdfEngine, ProfileRegistry, TargetFormat,
    UnknownKeyPolicy,
};
use std::io;
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar plus one log line
/// per (file, format) attempt. The orchestrator is strictly sequential, so a
/// single start-time slot is enough for elapsed reporting.
struct CliProgress {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgress {
    fn on_batch_start(&self, total_jobs: usize) {
        self.bar.set_length(total_jobs as u64);
    }

    fn on_file_start(&self, source: &Path, format: TargetFormat) {
        *self.started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!(
            "{} -> {format}",
            source.file_name().unwrap_or_default().to_string_lossy()
        ));
    }

    fn on_file_done(&self, outcome: &FileOutcome) {
        let elapsed = self.elapsed_secs();
        let name = outcome
            .source
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let line = match outcome.status {
            OutcomeStatus::Succeeded => format!(
                "  {} {:<32} {:<5} {}",
                green("✓"),
                name,
                outcome.format,
                dim(&format!("{elapsed:.1}s"))
            ),
            OutcomeStatus::Skipped => format!(
                "  {} {:<32} {:<5} {}",
                yellow("→"),
                name,
                outcome.format,
                dim("skipped (exists)")
            ),
            OutcomeStatus::Failed => {
                let error = outcome.error.as_deref().unwrap_or("unknown error");
                let first_line = error.lines().next().unwrap_or(error);
                let msg = if first_line.len() > 80 {
                    format!("{}\u{2026}", &first_line[..79])
                } else {
                    first_line.to_string()
                };
                format!("  {} {:<32} {:<5} {}", red("✗"), name, outcome.format, red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _succeeded: usize, _skipped: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single file conversion
  md2doc input.md output.docx
  md2doc input.md output.docx --template corporate.docx

  # Single file with profile
  md2doc input.md output.docx --profile bericht

  # PDF export (needs a LaTeX engine)
  md2doc input.md output.pdf --format pdf
  md2doc input.md output.pdf --format pdf --pdf-engine xelatex

  # Batch conversion
  md2doc --batch docs/ out/
  md2doc --batch docs/ out/ --recursive --overwrite
  md2doc --batch docs/ out/ --profile angebot --formats docx,pdf

  # Metadata overrides (win over frontmatter)
  md2doc input.md output.docx --meta title="Final Report" --meta version=2.0

FRONTMATTER:
  A leading block delimited by `---` lines supplies document metadata:

    ---
    title: Technical Offer
    author: Jane Doe
    date: 2024-03-01
    ---

  Recognized keys: title, subtitle, author, version, date, customer, project.

ENVIRONMENT VARIABLES:
  PANDOC_PATH       Path to the pandoc executable (skips PATH lookup)
  MD2DOC_TEMPLATE   Default docx reference template

SETUP:
  1. Install pandoc:        https://pandoc.org/installing.html
  2. For PDF output:        install a LaTeX engine (xelatex, lualatex, or pdflatex)
  3. For mermaid diagrams:  npm install -g @mermaid-js/mermaid-cli   (optional)
"#;

/// Convert Markdown files to Word documents (.docx) or PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2doc",
    version,
    about = "Convert Markdown files to Word documents (.docx) or PDF via pandoc",
    long_about = "Convert Markdown documents to Word or PDF by orchestrating the external \
pandoc engine. Frontmatter metadata, preset profiles, and collision-safe batch \
conversion included.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input Markdown file, or input directory in batch mode.
    input: Option<PathBuf>,

    /// Output document path, or output directory in batch mode.
    output: Option<PathBuf>,

    /// Batch mode: convert every .md file in the input directory.
    #[arg(long)]
    batch: bool,

    /// Path to a docx reference template (docx output only).
    #[arg(long, env = "MD2DOC_TEMPLATE")]
    template: Option<PathBuf>,

    /// Preset profile (see --list-profiles).
    #[arg(long)]
    profile: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "docx")]
    format: FormatArg,

    /// Comma-separated list of output formats (e.g. 'docx,pdf').
    /// Overrides --format; useful in batch mode.
    #[arg(long)]
    formats: Option<String>,

    /// PDF engine. Auto-detected (xelatex > lualatex > pdflatex) if not set.
    #[arg(long, value_enum)]
    pdf_engine: Option<PdfEngineArg>,

    /// Path to the pandoc executable (searches PATH by default).
    #[arg(long, env = "PANDOC_PATH")]
    pandoc_path: Option<PathBuf>,

    /// Metadata override as key=value; repeatable, wins over frontmatter.
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    meta: Vec<String>,

    /// What to do with unrecognized frontmatter keys.
    #[arg(long, value_enum, default_value = "drop")]
    unknown_keys: UnknownKeysArg,

    /// Do not render mermaid diagram blocks.
    #[arg(long)]
    no_diagrams: bool,

    /// Kill an engine call after this many seconds (default: unbounded).
    #[arg(long, value_name = "SECS")]
    engine_timeout: Option<u64>,

    /// Process subdirectories recursively (batch mode only).
    #[arg(short, long)]
    recursive: bool,

    /// Overwrite existing output files (batch mode only).
    #[arg(long)]
    overwrite: bool,

    /// List available profiles and exit.
    #[arg(long)]
    list_profiles: bool,

    /// Print the batch result (or profile list) as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Docx,
    Pdf,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Docx => TargetFormat::Docx,
            FormatArg::Pdf => TargetFormat::Pdf,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PdfEngineArg {
    Xelatex,
    Lualatex,
    Pdflatex,
}

impl From<PdfEngineArg> for PdfEngine {
    fn from(v: PdfEngineArg) -> Self {
        match v {
            PdfEngineArg::Xelatex => PdfEngine::Xelatex,
            PdfEngineArg::Lualatex => PdfEngine::Lualatex,
            PdfEngineArg::Pdflatex => PdfEngine::Pdflatex,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum UnknownKeysArg {
    Drop,
    Passthrough,
}

impl From<UnknownKeysArg> for UnknownKeyPolicy {
    fn from(v: UnknownKeysArg) -> Self {
        match v {
            UnknownKeysArg::Drop => UnknownKeyPolicy::Drop,
            UnknownKeysArg::Passthrough => UnknownKeyPolicy::Passthrough,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar and the per-file lines are the feedback that matters.
    let show_progress = cli.batch && !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Profile listing ──────────────────────────────────────────────────
    if cli.list_profiles {
        let registry = ProfileRegistry::with_builtins();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.list())
                    .context("Failed to serialise profiles")?
            );
        } else {
            for profile in registry.list() {
                println!(
                    "{:<10} {:<10} {}",
                    profile.name,
                    profile.display_name,
                    dim(&profile.description)
                );
            }
        }
        return Ok(());
    }

    // ── Formats ──────────────────────────────────────────────────────────
    let formats: Vec<TargetFormat> = match &cli.formats {
        Some(list) => parse_format_list(list)?,
        None => vec![cli.format.into()],
    };

    // ── Build config and converter ───────────────────────────────────────
    let overrides = parse_meta_overrides(&cli.meta)?;
    let progress: Option<Arc<dyn BatchProgressCallback>> = if show_progress {
        Some(CliProgress::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .render_diagrams(!cli.no_diagrams)
        .unknown_keys(cli.unknown_keys.into());
    if let Some(path) = &cli.pandoc_path {
        builder = builder.pandoc_path(path);
    }
    if let Some(engine) = cli.pdf_engine {
        builder = builder.pdf_engine(engine.into());
    }
    if let Some(secs) = cli.engine_timeout {
        builder = builder.engine_timeout(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build()?;

    let converter = Converter::new(config)?;

    // Fail on unknown profile names before touching any file.
    if let Some(name) = &cli.profile {
        converter.profiles().get(name)?;
    }

    if cli.batch {
        run_batch(&cli, &converter, formats).await
    } else {
        run_single(&cli, &converter, formats, overrides).await
    }
}

/// Single-file mode: convert `input` to `output`, once per requested format.
async fn run_single(
    cli: &Cli,
    converter: &Converter,
    formats: Vec<TargetFormat>,
    overrides: Vec<(String, String)>,
) -> Result<()> {
    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        bail!("Both input and output paths are required in single mode");
    };
    if output.is_dir() {
        bail!("Output path must be a file, not a directory: {}", output.display());
    }

    let multi = formats.len() > 1;
    let mut produced: Vec<PathBuf> = Vec::new();

    for format in formats {
        // With several formats the extension is adjusted per format.
        let target = if multi {
            output.with_extension(format.extension())
        } else {
            output.clone()
        };

        let job = ConvertJob {
            input: input.clone(),
            output: Some(target),
            template: cli.template.clone(),
            profile: cli.profile.clone(),
            overrides: overrides.clone(),
            extra_args: Vec::new(),
            format,
            pdf_engine: cli.pdf_engine.map(Into::into),
        };

        let path = converter.convert(&job).await?;
        produced.push(path);
    }

    if !cli.quiet {
        if let [only] = produced.as_slice() {
            println!(
                "{} Successfully converted {} to {}",
                green("✓"),
                input.display(),
                bold(&only.display().to_string())
            );
        } else {
            println!(
                "{} Successfully converted {} to {} format(s):",
                green("✓"),
                input.display(),
                produced.len()
            );
            for path in &produced {
                println!("  - {}", path.display());
            }
        }
    }
    Ok(())
}

/// Batch mode: convert a whole directory, print outcomes and a summary.
async fn run_batch(cli: &Cli, converter: &Converter, formats: Vec<TargetFormat>) -> Result<()> {
    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        bail!("Both input and output directories are required in batch mode");
    };

    let options = BatchOptions {
        recursive: cli.recursive,
        overwrite: cli.overwrite,
        profile: cli.profile.clone(),
        template: cli.template.clone(),
        formats,
        pdf_engine: cli.pdf_engine.map(Into::into),
    };

    let result = convert_batch(converter, input, output, &options).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise batch result")?
        );
    } else if !cli.quiet {
        println!("\n{result}");
        let failures: Vec<&FileOutcome> = result
            .outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .collect();
        if !failures.is_empty() {
            println!("\nErrors:");
            for outcome in failures {
                let detail = outcome.error.as_deref().unwrap_or("unknown error");
                let first_line = detail.lines().next().unwrap_or(detail);
                println!(
                    "  - {} ({}): {}",
                    outcome.source.display(),
                    outcome.format,
                    red(first_line)
                );
            }
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Parse repeated `--meta key=value` flags.
fn parse_meta_overrides(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .with_context(|| format!("Invalid --meta '{entry}': expected KEY=VALUE"))
        })
        .collect()
}
