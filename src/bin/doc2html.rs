//! CLI binary for doc2html.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `convert` runs one batch over local files and writes the ZIP archive.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc2html::server::{self, AppState, ServerConfig};
use doc2html::{
    build_archive, run_batch, BatchConfig, BatchProgressCallback, ConversionEngine, EmbedMode,
    PandocConfig, PandocEngine, ProgressCallback, UploadItem,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};
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

/// Terminal progress callback: one bar for the batch plus a log line per
/// document. Documents may finish out of order when `--concurrency > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} documents…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{:>8} bytes", html_len)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // First line only, capped, to keep the log tidy.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if success_count == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on 0.0.0.0:8080
  doc2html serve --host 0.0.0.0 --port 8080

  # Upload with curl
  curl -F 'files[]=@report.docx' -F 'files[]=@notes.md' \
       http://127.0.0.1:5000/convert -o converted_documents.zip

  # Convert local files into a ZIP
  doc2html convert report.docx notes.md -o out.zip

  # Only accept Word documents (the legacy upload policy)
  doc2html serve --allow-ext docx

  # Older pandoc (< 2.19) without --embed-resources
  doc2html serve --legacy-embed

ENVIRONMENT VARIABLES:
  DOC2HTML_PANDOC         pandoc executable (default: pandoc on PATH)
  DOC2HTML_TIMEOUT        Per-document timeout in seconds
  DOC2HTML_CONCURRENCY    Documents converted at once per request
  DOC2HTML_ALLOW_EXT      Comma-separated extension allow-list
  DOC2HTML_LEGACY_EMBED   Use --self-contained instead of --embed-resources
  DOC2HTML_TEMP_DIR       Parent directory for conversion workspaces
  DOC2HTML_HOST / DOC2HTML_PORT / DOC2HTML_MAX_UPLOAD_MB
  RUST_LOG                Overrides the log filter (e.g. doc2html=debug)

SETUP:
  pandoc must be installed: https://pandoc.org/installing.html
  Check with: curl http://127.0.0.1:5000/health
"#;

/// Convert uploaded documents to self-contained HTML with pandoc.
#[derive(Parser, Debug)]
#[command(
    name = "doc2html",
    version,
    about = "Batch-convert documents to self-contained HTML, packaged as a ZIP",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2HTML_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[command(flatten)]
        engine: EngineArgs,

        /// Address to bind.
        #[arg(long, env = "DOC2HTML_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind.
        #[arg(long, env = "DOC2HTML_PORT", default_value_t = 5000)]
        port: u16,

        /// Largest accepted request body, in MiB.
        #[arg(long, env = "DOC2HTML_MAX_UPLOAD_MB", default_value_t = 64)]
        max_upload_mb: usize,
    },

    /// Convert local files and write a ZIP archive.
    Convert {
        #[command(flatten)]
        engine: EngineArgs,

        /// Input documents.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Where to write the archive.
        #[arg(short, long, env = "DOC2HTML_OUTPUT", default_value = "converted_documents.zip")]
        output: PathBuf,

        /// Print a JSON summary to stdout.
        #[arg(long, env = "DOC2HTML_JSON")]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "DOC2HTML_NO_PROGRESS")]
        no_progress: bool,
    },
}

/// Engine and batch flags shared by both subcommands.
#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// pandoc executable name or path.
    #[arg(long, env = "DOC2HTML_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// Per-document conversion timeout in seconds.
    #[arg(long, env = "DOC2HTML_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Documents converted at once within one batch.
    #[arg(short, long, env = "DOC2HTML_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Only convert these extensions (e.g. docx,odt). Default: any.
    #[arg(long, env = "DOC2HTML_ALLOW_EXT", value_delimiter = ',')]
    allow_ext: Vec<String>,

    /// Pass --self-contained instead of --embed-resources (pandoc < 2.19).
    #[arg(long, env = "DOC2HTML_LEGACY_EMBED")]
    legacy_embed: bool,

    /// Parent directory for per-document temp workspaces.
    #[arg(long, env = "DOC2HTML_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Extra argument appended to every pandoc call (repeatable).
    #[arg(long = "pandoc-arg", env = "DOC2HTML_PANDOC_ARGS", value_delimiter = ' ',
          allow_hyphen_values = true)]
    pandoc_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs during `convert`.
    let show_progress = match &cli.command {
        Command::Convert {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
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

    match cli.command {
        Command::Serve {
            engine,
            host,
            port,
            max_upload_mb,
        } => run_serve(&engine, host, port, max_upload_mb).await,
        Command::Convert {
            engine,
            files,
            output,
            json,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            run_convert(&engine, &files, &output, json, cli.quiet, progress).await
        }
    }
}

async fn run_serve(args: &EngineArgs, host: String, port: u16, max_upload_mb: usize) -> Result<()> {
    let engine = build_engine(args)?;
    let config = build_batch_config(args, None)?;

    // A missing pandoc is reported by /health rather than refusing to start.
    match engine.probe().await {
        Ok(version) => info!("Using {}", version),
        Err(e) => warn!("{}", e),
    }

    let server_config = ServerConfig {
        host,
        port,
        body_limit: max_upload_mb.saturating_mul(1024 * 1024),
    };
    info!("Batch settings: {:?}", config);

    server::serve(server_config, AppState::new(engine, config))
        .await
        .context("HTTP server failed")
}

async fn run_convert(
    args: &EngineArgs,
    files: &[PathBuf],
    output: &Path,
    json: bool,
    quiet: bool,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let start = Instant::now();
    let engine = build_engine(args)?;
    let config = build_batch_config(args, progress)?;

    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        items.push(UploadItem::new(name, content));
    }

    let result = run_batch(items, engine, &config)
        .await
        .context("Conversion failed")?;
    let summary = result.summary();

    let converted = match result.settle() {
        Ok(converted) => converted,
        Err(e) => {
            if let Some(details) = e.details() {
                eprintln!("{details}");
            }
            return Err(e).context("Nothing to archive");
        }
    };
    let archive = build_archive(&converted).context("Failed to build archive")?;
    write_atomic(output, &archive.bytes).await?;

    if json {
        let report = serde_json::json!({
            "output": output.display().to_string(),
            "entries": archive.entries,
            "summary": summary,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise summary")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {}/{} documents  {}ms  →  {}",
            if summary.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            summary.converted,
            summary.attempted,
            start.elapsed().as_millis(),
            bold(&output.display().to_string()),
        );
        if summary.skipped > 0 {
            eprintln!("   {}", dim(&format!("{} skipped", summary.skipped)));
        }
    }

    Ok(())
}

/// Write `bytes` via a sibling temp file and rename, so a failed run never
/// leaves a truncated archive behind.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("zip.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move archive to {}", path.display()))?;
    Ok(())
}

/// Map CLI args to a `PandocEngine`.
fn build_engine(args: &EngineArgs) -> Result<Arc<dyn ConversionEngine>> {
    let mut builder = PandocConfig::builder()
        .program(&args.pandoc)
        .timeout_secs(args.timeout)
        .embed(if args.legacy_embed {
            EmbedMode::SelfContained
        } else {
            EmbedMode::EmbedResources
        });

    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_root(dir);
    }
    for arg in args.pandoc_args.iter().filter(|a| !a.is_empty()) {
        builder = builder.extra_arg(arg);
    }

    let config = builder.build().context("Invalid pandoc configuration")?;
    Ok(Arc::new(PandocEngine::new(config)))
}

/// Map CLI args to `BatchConfig`.
fn build_batch_config(args: &EngineArgs, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder().concurrency(args.concurrency);

    if !args.allow_ext.is_empty() {
        builder = builder.allow_extensions(&args.allow_ext);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
