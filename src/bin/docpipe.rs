//! CLI binary for docpipe.
//!
//! A thin shim over the library crate: the files given on the command line
//! become the queue, in order, and CLI flags map to `PipelineConfig`.

use anyhow::{Context, Result};
use clap::Parser;
use docpipe::{
    classify, execute_to_file, read_files, requires_remote, ItemId, ItemStatus, JsonFileStore,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, Queue, Strategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
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

/// Terminal progress callback: one bar over the whole queue plus a ✓/✗ line
/// per finished item.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Display names, since events only carry the item id.
    names: HashMap<ItemId, String>,
}

impl CliProgressCallback {
    fn new(queue: &Queue) -> Arc<Self> {
        let bar = ProgressBar::new(queue.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Merging");
        bar.enable_steady_tick(Duration::from_millis(80));

        let names = queue
            .items()
            .iter()
            .map(|item| (item.id, item.file.name.clone()))
            .collect();

        Arc::new(Self {
            bar,
            names,
        })
    }

    fn name(&self, id: ItemId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("?")
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_items: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Merging {total_items} files…"))
        ));
    }

    fn on_item_status(
        &self,
        id: ItemId,
        status: ItemStatus,
        error: Option<&str>,
        upload_percent: Option<u8>,
    ) {
        let name = self.name(id);
        match status {
            ItemStatus::Uploading => {
                let pct = upload_percent.unwrap_or(0);
                self.bar.set_message(format!("{name}: uploading {pct}%"));
            }
            ItemStatus::Converting => self.bar.set_message(format!("{name}: converting")),
            ItemStatus::Merging => self.bar.set_message(format!("{name}: merging")),
            ItemStatus::Done => {
                self.bar.println(format!("  {} {}", green("✓"), name));
                self.bar.inc(1);
            }
            ItemStatus::Error => {
                let msg = error.unwrap_or("unknown error");
                self.bar
                    .println(format!("  {} {}  {}", red("✗"), name, red(msg)));
                self.bar.abandon();
            }
            ItemStatus::Pending => {}
        }
    }

    fn on_compress_start(&self) {
        self.bar.set_prefix("Compressing");
        self.bar.set_message("uploading merged PDF");
    }

    fn on_run_complete(&self, _output_len: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge local files (no API key needed)
  docpipe cover.png report.pdf scan.jpg -o bundle.pdf

  # Office documents are converted remotely first
  docpipe --api-key $KEY intro.docx figures.xlsx slides.pptx -o deck.pdf

  # Compress the merged document
  docpipe --compress report.pdf appendix.pdf

  # Show what each file would go through, without running
  docpipe --plan notes.txt photo.jpeg paper.pdf

SUPPORTED FORMATS:
  Extension              Strategy     API key
  ─────────────────────  ───────────  ───────
  pdf                    Local        no
  png, jpg, jpeg         Local        no
  docx, xlsx, pptx, txt  ConvertAPI   yes
  (--compress)           ConvertAPI   yes

ENVIRONMENT VARIABLES:
  CONVERT_API_KEY       ConvertAPI secret
  DOCPIPE_CREDENTIALS   JSON credential file, e.g. {"convertapi": "secret"}
  DOCPIPE_API_URL       Override the ConvertAPI base URL
  RUST_LOG              Override log filtering (e.g. docpipe=debug)
"#;

/// Merge PDFs, images and office documents into one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "docpipe",
    version,
    about = "Merge PDFs, images and office documents into one PDF",
    long_about = "Merge an ordered list of files into a single PDF. PDFs and PNG/JPEG images \
are merged locally; DOCX, XLSX, PPTX and TXT files are converted to PDF through ConvertAPI \
first. Pages follow the order of the files on the command line.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files, in output order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF path. Default: docpipe-merged-<unix time>.pdf
    #[arg(short, long, env = "DOCPIPE_OUTPUT")]
    output: Option<PathBuf>,

    /// Compress the merged PDF through ConvertAPI.
    #[arg(long, env = "DOCPIPE_COMPRESS")]
    compress: bool,

    /// ConvertAPI secret.
    #[arg(long, env = "CONVERT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// JSON credential file mapping service names to secrets.
    #[arg(long, env = "DOCPIPE_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// ConvertAPI base URL.
    #[arg(long, env = "DOCPIPE_API_URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DOCPIPE_TIMEOUT")]
    timeout: Option<u64>,

    /// Print each file's strategy and exit without converting.
    #[arg(long)]
    plan: bool,

    /// Print the plan as JSON (with --plan).
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCPIPE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCPIPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCPIPE_QUIET")]
    quiet: bool,
}

#[derive(Serialize)]
struct PlanEntry<'a> {
    position: usize,
    name: &'a str,
    #[serde(flatten)]
    strategy: Strategy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.plan;
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

    // ── Build queue ──────────────────────────────────────────────────────
    let files = read_files(&cli.inputs)
        .await
        .context("Failed to read input files")?;
    let mut queue = Queue::new();
    queue.enqueue(files);

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan {
        print_plan(&queue, cli.compress, cli.json)?;
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(&queue));
    let progress_cb = progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let output_path = cli.output.clone().unwrap_or_else(default_output);
    let result = execute_to_file(&mut queue, &output_path, &config).await;
    if let (Err(_), Some(cb)) = (&result, &progress) {
        // Covers failures after the last item, e.g. compression.
        if !cb.bar.is_finished() {
            cb.bar.abandon();
        }
    }
    let written = result.context("Merge failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} files  {} bytes  {}  →  {}",
            green("✔"),
            queue.len(),
            written,
            dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
            bold(&output_path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder().compress_output(cli.compress);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref path) = cli.credentials {
        builder = builder.credential_store(Arc::new(JsonFileStore::new(path.clone())));
    }
    if let Some(ref url) = cli.api_url {
        builder = builder.api_base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_plan(queue: &Queue, compress: bool, json: bool) -> Result<()> {
    let entries: Vec<PlanEntry<'_>> = queue
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| PlanEntry {
            position: i + 1,
            name: &item.file.name,
            strategy: classify(&item.file),
        })
        .collect();
    let needs_key = requires_remote(queue.items().iter().map(|i| &i.file), compress);

    if json {
        let doc = serde_json::json!({
            "items": entries,
            "compress": compress,
            "requires_api_key": needs_key,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise plan")?
        );
        return Ok(());
    }

    for entry in &entries {
        let strategy = entry.strategy.to_string();
        let strategy = match entry.strategy {
            Strategy::Unsupported(_) => red(&strategy),
            Strategy::Remote(_) => cyan(&strategy),
            Strategy::Local(_) => strategy,
        };
        println!("{:>3}. {:<40} {}", entry.position, entry.name, strategy);
    }
    if compress {
        println!("     {:<40} {}", dim("(compress output)"), cyan("ConvertAPI"));
    }
    println!(
        "API key required: {}",
        if needs_key { bold("yes") } else { "no".to_string() }
    );
    Ok(())
}

fn default_output() -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("docpipe-merged-{ts}.pdf"))
}
