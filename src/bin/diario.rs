//! CLI binary for diario-leiloes.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use diario_leiloes::{
    check_new_editions, normalize_directory, parse_time_of_day, process_directory, process_path,
    split_directory, split_file, verify_all, watch, BatchReport, ClassifierKind, DocumentReport,
    Lexicon, PipelineConfig, PipelineProgressCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the batch, one log line per finished item.
struct CliProgressCallback {
    bar: ProgressBar,
    auction_blocks: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            auction_blocks: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Working");
        self.bar.reset_eta();
    }

    fn finish_line(&self, name: &str, error: Option<&str>) {
        match error {
            None => self.bar.println(format!("  {} {}", green("✓"), name)),
            Some(e) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                let msg = if e.chars().count() > 80 {
                    format!("{}\u{2026}", e.chars().take(79).collect::<String>())
                } else {
                    e.to_string()
                };
                self.bar
                    .println(format!("  {} {}  {}", red("✗"), name, red(&msg)));
            }
        }
        self.bar.inc(1);
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total} items to process…"))
        ));
    }

    fn on_document_start(&self, name: &str, total_blocks: usize) {
        self.bar
            .set_message(format!("{name} ({total_blocks} blocks)"));
    }

    fn on_block_written(&self, _seq: usize, _total: usize, auction: bool, _path: &str) {
        if auction {
            self.auction_blocks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_block_error(&self, seq: usize, total: usize, error: &str) {
        self.bar.println(format!(
            "    {} block {}/{}  {}",
            red("✗"),
            seq,
            total,
            dim(error)
        ));
    }

    fn on_document_complete(&self, name: &str, error: Option<&str>) {
        self.finish_line(name, error);
    }

    fn on_item_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, name: &str, error: Option<&str>) {
        self.finish_line(name, error);
    }

    fn on_batch_complete(&self, total: usize, failed: usize) {
        self.bar.finish_and_clear();
        let auction = self.auction_blocks.load(Ordering::SeqCst);
        let ok = total.saturating_sub(failed);
        if failed == 0 {
            eprintln!("{} {} items done", green("✔"), bold(&ok.to_string()));
        } else {
            eprintln!(
                "{} {}/{} items done  ({} failed)",
                if ok == 0 { red("✘") } else { cyan("⚠") },
                bold(&ok.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
        if auction > 0 {
            eprintln!("   {} auction blocks", dim(&auction.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF in "00 - para leitura"
  diario process

  # Process a single edition
  diario process PR_diario_3851_10_01_2023.pdf

  # Re-split existing summaries
  diario split "01 - arquivos lidos"

  # Download new editions, then the last 170 with 3 parallel downloads
  diario fetch
  diario fetch --verify-all

  # Check the portal every day at 09:00 until Ctrl-C
  diario watch --at 09:00

  # Normalize auction notices with a specific model
  diario --provider openai --model gpt-4o-mini normalize

DIRECTORIES (below --base-dir):
  00 - para leitura                               PDFs to process (download target)
  01 - arquivos lidos                             processed PDFs and full-text summaries
  02 - arquivos com leilões/separados             auction blocks
  02 - arquivos com leilões/classificado não leilão  non-auction blocks
  02 - arquivos com leilões/norm                  normalized answers (<stem>_NORM.txt / .json)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory holding an existing libpdfium
"#;

/// Find auction notices in the Paraná court gazette.
#[derive(Parser, Debug)]
#[command(
    name = "diario",
    version,
    about = "Download, split, classify and normalize TJPR gazette editions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the working directory layout.
    #[arg(long, global = true, env = "DIARIO_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Jurisdiction code used as the file name prefix.
    #[arg(long, global = true, env = "DIARIO_JURISDICTION", default_value = "PR")]
    jurisdiction: String,

    /// JSON lexicon file replacing the built-in auction vocabulary.
    #[arg(long, global = true, env = "DIARIO_LEXICON")]
    lexicon: Option<PathBuf>,

    /// Classification strategy.
    #[arg(long, global = true, env = "DIARIO_CLASSIFIER", value_enum, default_value = "scored")]
    classifier: ClassifierArg,

    /// Directory holding the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Number of concurrent LLM calls.
    #[arg(short, long, global = true, env = "DIARIO_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Leave processed PDFs in the reading directory.
    #[arg(long, global = true, env = "DIARIO_KEEP_INPUTS")]
    keep_inputs: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, global = true, env = "DIARIO_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DIARIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DIARIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DIARIO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, classify and write the blocks of one PDF or the reading directory.
    Process {
        /// PDF file; defaults to every PDF in the reading directory.
        path: Option<PathBuf>,
    },
    /// Re-split full-text summaries into blocks.
    Split {
        /// Summary file or directory; defaults to the processed directory.
        path: Option<PathBuf>,
    },
    /// Send auction blocks to the LLM and save structured lots.
    Normalize {
        /// Directory of auction blocks; defaults to the auction directory.
        dir: Option<PathBuf>,
    },
    /// Download editions missing from the registry.
    Fetch {
        /// Walk the deep listing with concurrent downloads.
        #[arg(long)]
        verify_all: bool,
    },
    /// Check the portal now and then daily at a fixed time.
    Watch {
        /// Local time of day, HH:MM.
        #[arg(long, default_value = "09:00")]
        at: String,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum ClassifierArg {
    Keyword,
    Scored,
}

impl From<ClassifierArg> for ClassifierKind {
    fn from(v: ClassifierArg) -> Self {
        match v {
            ClassifierArg::Keyword => ClassifierKind::Keyword,
            ClassifierArg::Scored => ClassifierKind::Scored,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar replaces INFO logs; the long-running watch keeps them.
    let is_watch = matches!(cli.command, Command::Watch { .. });
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !is_watch;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    match &cli.command {
        Command::Process { path: Some(path) } => {
            let report = process_path(path, &config)
                .await
                .with_context(|| format!("Failed to process {}", path.display()))?;
            print_document(&cli, &report)?;
        }
        Command::Process { path: None } => {
            let report = process_directory(&config)
                .await
                .context("Batch processing failed")?;
            print_batch(&cli, &report)?;
        }
        Command::Split { path } => match path {
            Some(p) if p.is_file() => {
                let report = split_file(p, &config)
                    .with_context(|| format!("Failed to split {}", p.display()))?;
                print_document(&cli, &report)?;
            }
            other => {
                let report = split_directory(other.as_deref(), &config)
                    .await
                    .context("Split failed")?;
                print_batch(&cli, &report)?;
            }
        },
        Command::Normalize { dir } => {
            let results = normalize_directory(dir.as_deref(), &config)
                .await
                .context("Normalization failed")?;
            if cli.json {
                print_json(&results)?;
            } else if !cli.quiet {
                let lots: usize = results.iter().map(|r| r.lots).sum();
                let tokens_in: usize = results.iter().map(|r| r.input_tokens).sum();
                let tokens_out: usize = results.iter().map(|r| r.output_tokens).sum();
                let failed = results.iter().filter(|r| r.error.is_some()).count();
                eprintln!(
                    "{}  {}/{} notices  {} lots",
                    status(failed),
                    results.len() - failed,
                    results.len(),
                    bold(&lots.to_string())
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&tokens_in.to_string()),
                    dim(&tokens_out.to_string())
                );
            }
        }
        Command::Fetch { verify_all: deep } => {
            let report = if *deep {
                verify_all(&config).await
            } else {
                check_new_editions(&config).await
            }
            .context("Portal check failed")?;
            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} listed  {} downloaded  {} failed  →  last edition {}",
                    status(report.failed.len()),
                    report.listed,
                    report.downloaded.len(),
                    report.failed.len(),
                    bold(&report.last_edition.to_string())
                );
            }
        }
        Command::Watch { at } => {
            let at = parse_time_of_day(at).context("Invalid --at value")?;
            watch(&config, at).await.context("Scheduler failed")?;
        }
    }

    Ok(())
}

fn status(failed: usize) -> String {
    if failed == 0 {
        green("✔")
    } else {
        cyan("⚠")
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}

fn print_document(cli: &Cli, report: &DocumentReport) -> Result<()> {
    if cli.json {
        return print_json(report);
    }
    if !cli.quiet {
        eprintln!(
            "{}  {} blocks  {} auction  {} other  →  {}",
            status(report.failed_count()),
            report.blocks.len(),
            bold(&report.auction_count().to_string()),
            report.non_auction_count(),
            display_name(&report.source),
        );
    }
    Ok(())
}

fn print_batch(cli: &Cli, report: &BatchReport) -> Result<()> {
    if cli.json {
        return print_json(report);
    }
    if !cli.quiet {
        let s = &report.stats;
        eprintln!(
            "{}  {} documents  {} blocks  {} auction  {}ms",
            status(s.failed_documents + s.failed_blocks),
            s.documents,
            s.blocks,
            bold(&s.auction_blocks.to_string()),
            s.total_duration_ms,
        );
        for (path, err) in &report.failures {
            eprintln!("   {} {}  {}", red("✗"), display_name(path), dim(err));
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .base_dir(&cli.base_dir)
        .jurisdiction(cli.jurisdiction.clone())
        .classifier(cli.classifier.clone().into())
        .concurrency(cli.concurrency)
        .move_processed(!cli.keep_inputs);

    if let Some(ref path) = cli.lexicon {
        let lexicon = Lexicon::from_json_file(path)
            .with_context(|| format!("Failed to load lexicon from {}", path.display()))?;
        builder = builder.lexicon(lexicon);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_dir(dir.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
