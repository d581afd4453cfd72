use anyhow::{Context as AnyhowContext, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use flags::{MetricFlag, UpstreamFlag};
use recall_index::{IndexManager, DEFAULT_TOP_K};
use recall_protocol::{serialize_json_pretty, DescribeResponse};
use recall_upstream::Backends;
use serde::Serialize;
use settings::{Overrides, Settings};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod flags;
mod http_api;
mod http_server;
mod server_security;
mod settings;

pub use http_server::build_router;

const DEFAULT_MAX_UPLOAD_MB: usize = 20;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serialize_json_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Image similarity search over generated descriptions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Snapshot directory (env: RECALL_SNAPSHOT_DIR, default .recall)
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Distance metric for a new index (env: RECALL_METRIC)
    #[arg(long, global = true, value_enum)]
    metric: Option<MetricFlag>,

    /// Describer/embedder backend (env: RECALL_UPSTREAM)
    #[arg(long, global = true, value_enum)]
    upstream: Option<UpstreamFlag>,

    /// Timeout per upstream call in seconds (env: RECALL_UPSTREAM_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Descriptions indexed per image, 1-5 (env: RECALL_VARIANTS)
    #[arg(long, global = true)]
    variants: Option<u8>,

    /// Embedding width for the stub backend or an unknown model (env: RECALL_EMBEDDING_DIM)
    #[arg(long, global = true)]
    embedding_dim: Option<usize>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            snapshot_dir: self.snapshot_dir.clone(),
            metric: self.metric.map(MetricFlag::as_domain),
            upstream: self.upstream.map(UpstreamFlag::as_domain),
            timeout_secs: self.timeout_secs,
            variants: self.variants,
            embedding_dim: self.embedding_dim,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    ServeHttp(ServeArgs),

    /// Describe an image without indexing it
    Describe(ImageArgs),

    /// Index an image and save the snapshot
    Add(AddArgs),

    /// Find indexed images similar to an image
    Search(SearchArgs),

    /// Show index statistics
    Stats,

    /// List every indexed description in insertion order
    List,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:7710
    #[arg(long, default_value = "127.0.0.1:7710")]
    bind: String,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,

    /// Largest accepted upload in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,
}

#[derive(Args)]
struct ImageArgs {
    /// Image file
    file: PathBuf,
}

#[derive(Args)]
struct AddArgs {
    /// Image file
    file: PathBuf,

    /// Source label (defaults to the file name; a leading "<id>_" enables dedup)
    #[arg(long)]
    label: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    /// Image file
    file: PathBuf,

    /// Number of results
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K,
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    top_k: usize,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);
    let settings = Settings::from_env(cli.overrides())?;

    match cli.command {
        Commands::ServeHttp(args) => serve_http(args, settings).await?,
        Commands::Describe(args) => run_describe(args, settings).await?,
        Commands::Add(args) => run_add(args, settings).await?,
        Commands::Search(args) => run_search(args, settings).await?,
        Commands::Stats => run_stats(settings).await?,
        Commands::List => run_list(settings).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // HTTP stack internals stay quiet unless verbose
    if !verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();
}

async fn open_manager(settings: Settings) -> Result<Arc<IndexManager>> {
    let backends = Backends::build(settings.upstream, settings.embedding_dim)
        .context("Failed to configure upstream backends")?;
    let manager = IndexManager::open(settings.manager, backends.describer, backends.embedder)
        .await
        .context("Failed to open index")?;
    Ok(Arc::new(manager))
}

/// Snapshot view for `stats` and `list`; builds no upstream client.
async fn open_snapshot(settings: Settings) -> Result<IndexManager> {
    let dimension = Backends::dimension_hint(settings.upstream, settings.embedding_dim);
    IndexManager::open_read_only(settings.manager, dimension)
        .await
        .context("Failed to open index")
}

async fn read_image(path: &Path) -> Result<Bytes> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Image file is empty: {}", path.display());
    }
    Ok(Bytes::from(bytes))
}

fn default_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn serve_http(args: ServeArgs, settings: Settings) -> Result<()> {
    if args.max_upload_mb == 0 {
        anyhow::bail!("--max-upload-mb must be greater than zero");
    }
    // Fail on a bad bind before touching upstream configuration
    server_security::resolve_guarded_bind_addrs(&args.bind, args.public).await?;

    let manager = open_manager(settings).await?;
    http_server::serve(
        manager,
        &args.bind,
        args.public,
        args.max_upload_mb.saturating_mul(1024 * 1024),
    )
    .await
}

async fn run_describe(args: ImageArgs, settings: Settings) -> Result<()> {
    let image = read_image(&args.file).await?;
    let manager = open_manager(settings).await?;
    let description = manager.describe(&image).await?;
    print_json(&DescribeResponse { description })
}

async fn run_add(args: AddArgs, settings: Settings) -> Result<()> {
    let image = read_image(&args.file).await?;
    let label = args.label.unwrap_or_else(|| default_label(&args.file));
    let manager = open_manager(settings).await?;

    let result = manager.add(image, &label).await?;
    if result.added() {
        manager
            .checkpoint()
            .await
            .context("Failed to save index snapshot")?;
    }
    print_json(&result)
}

async fn run_search(args: SearchArgs, settings: Settings) -> Result<()> {
    let image = read_image(&args.file).await?;
    let manager = open_manager(settings).await?;
    let result = manager.search(&image, args.top_k).await?;
    print_json(&result)
}

async fn run_stats(settings: Settings) -> Result<()> {
    let manager = open_snapshot(settings).await?;
    print_json(&manager.stats().await)
}

async fn run_list(settings: Settings) -> Result<()> {
    let manager = open_snapshot(settings).await?;
    print_json(&manager.list().await)
}
