use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use imgfind_indexer::{ImageIngestor, IngestConfig, IngestStats, ScanOptions};
use imgfind_search::RetrievalPipeline;
use imgfind_vector_store::{
    Captioner, ImageEmbedder, RetrievedImage, SharedCatalog, SnapshotPaths, StubProvider,
    TextEmbedder,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod flags;
mod vision;

use config::{AppConfig, ProviderKind};
use flags::ProviderFlag;
use vision::VisionClient;

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

#[derive(Parser)]
#[command(name = "imgfind")]
#[command(about = "Find images by describing them", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (default: ./imgfind.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding/caption provider (overrides IMGFIND_PROVIDER and the config file)
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderFlag>,

    /// Directory holding index.bin and records.json
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Embedding dimension
    #[arg(long, global = true)]
    dimension: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and caption every image in a folder, then save the snapshot
    Ingest(IngestArgs),

    /// Search the snapshot with a text query
    Search(SearchArgs),

    /// Show what the snapshot holds
    Info(InfoArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Image folder (overrides image.folder)
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Process at most this many images
    #[arg(long)]
    limit: Option<usize>,

    /// Output stats as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// What the image shows
    query: String,

    /// Number of results
    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Settings after applying flags and environment on top of the config file.
struct Settings {
    config: AppConfig,
    provider: ProviderKind,
    paths: SnapshotPaths,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = AppConfig::load(cli.config.as_deref())?;
        if let Some(dimension) = cli.dimension {
            config.index.dimension = dimension;
        }
        if let Some(dir) = &cli.snapshot_dir {
            config.index.snapshot_dir = dir.clone();
        }
        config.validate()?;

        let provider = cli
            .provider
            .or_else(ProviderFlag::from_env)
            .map_or(config.provider.kind, ProviderFlag::as_domain);
        let paths = SnapshotPaths::in_dir(&config.index.snapshot_dir);
        Ok(Self {
            config,
            provider,
            paths,
        })
    }

    fn dimension(&self) -> usize {
        self.config.index.dimension
    }
}

struct Providers {
    image: Arc<dyn ImageEmbedder>,
    text: Arc<dyn TextEmbedder>,
    captioner: Arc<dyn Captioner>,
}

fn build_providers(settings: &Settings) -> Result<Providers> {
    match settings.provider {
        ProviderKind::Stub => {
            log::debug!("Using stub provider (dimension {})", settings.dimension());
            let stub = Arc::new(StubProvider::new(settings.dimension())?);
            Ok(Providers {
                image: stub.clone(),
                text: stub.clone(),
                captioner: stub,
            })
        }
        ProviderKind::Azure => {
            let section = &settings.config.provider;
            let Some(endpoint) = section.endpoint.as_deref() else {
                bail!("provider.endpoint must be set in the config file for the azure provider");
            };
            let client = Arc::new(VisionClient::new(
                endpoint,
                section.api_key()?,
                settings.dimension(),
                section.timeout(),
            )?);
            log::debug!("Using vision service at {endpoint}");
            Ok(Providers {
                image: client.clone(),
                text: client.clone(),
                captioner: client,
            })
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Ingest(args) => args.json,
        Commands::Search(args) => args.json,
        Commands::Info(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if !cli.verbose {
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, &settings).await?,
        Commands::Search(args) => run_search(args, &settings).await?,
        Commands::Info(args) => run_info(args, &settings).await?,
    }

    Ok(())
}

/// Start empty only when nothing was ever saved; a partial snapshot must fail to load
/// rather than be overwritten.
async fn open_or_create(settings: &Settings) -> Result<SharedCatalog> {
    if settings.paths.is_absent() {
        log::info!(
            "No snapshot in {}, starting an empty catalog",
            settings.config.index.snapshot_dir.display()
        );
        return Ok(SharedCatalog::empty(settings.dimension())?);
    }
    open_existing(settings).await
}

async fn open_existing(settings: &Settings) -> Result<SharedCatalog> {
    let catalog = SharedCatalog::open(&settings.paths)
        .await
        .with_context(|| format!("Failed to load snapshot from {}", describe(&settings.paths)))?;
    let stored = catalog.dimension().await;
    if stored != settings.dimension() {
        bail!(
            "Snapshot dimension is {stored} but the provider is configured for {}; pass --dimension {stored} or rebuild the snapshot",
            settings.dimension()
        );
    }
    Ok(catalog)
}

fn describe(paths: &SnapshotPaths) -> String {
    paths
        .index
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .display()
        .to_string()
}

async fn run_ingest(args: IngestArgs, settings: &Settings) -> Result<()> {
    let image = &settings.config.image;
    let folder = args.folder.unwrap_or_else(|| image.folder.clone());
    let catalog = open_or_create(settings).await?;
    let providers = build_providers(settings)?;

    let checkpoint = settings
        .config
        .index
        .checkpoint_every
        .filter(|every| *every > 0)
        .map(|every| (settings.paths.clone(), every));
    let config = IngestConfig {
        scan: ScanOptions {
            extensions: image.extensions.clone(),
            limit: args.limit.or(image.limit),
        },
        provider_timeout: settings.config.provider.timeout(),
        request_interval: settings.config.provider.request_interval(),
        checkpoint,
    };

    let ingestor = ImageIngestor::new(catalog.clone(), providers.image, providers.captioner, config);
    let stats = ingestor
        .ingest_folder(&folder)
        .await
        .with_context(|| format!("Failed to ingest {}", folder.display()))?;

    catalog
        .save(&settings.paths)
        .await
        .with_context(|| format!("Failed to save snapshot to {}", describe(&settings.paths)))?;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&stats)?)?;
    } else {
        print_ingest_summary(&stats, catalog.len().await);
    }
    Ok(())
}

fn print_ingest_summary(stats: &IngestStats, total: usize) {
    eprintln!("Ingestion complete");
    eprintln!("  Scanned:         {}", stats.scanned);
    eprintln!("  Added:           {}", stats.added);
    eprintln!("  Captioned:       {}", stats.captioned);
    eprintln!("  Already indexed: {}", stats.already_indexed);
    eprintln!("  Failed:          {}", stats.failed);
    eprintln!("  Catalog size:    {total}");
    eprintln!("  Time:            {}ms", stats.time_ms);
    for error in &stats.errors {
        eprintln!("  ! {error}");
    }
}

async fn run_search(args: SearchArgs, settings: &Settings) -> Result<()> {
    if settings.paths.is_absent() {
        bail!(
            "No snapshot found in {}; run `imgfind ingest` first",
            describe(&settings.paths)
        );
    }
    let top_n = args.top_n.unwrap_or(settings.config.index.top_n);
    if top_n == 0 {
        bail!("--top-n must be greater than zero");
    }

    let catalog = open_existing(settings).await?;
    let providers = build_providers(settings)?;
    let pipeline = RetrievalPipeline::new(catalog, top_n)
        .with_provider_timeout(settings.config.provider.timeout());
    let results = pipeline
        .search_text(providers.text.as_ref(), &args.query)
        .await?;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&results)?)?;
    } else {
        print_results(&args.query, &results)?;
    }
    Ok(())
}

fn print_results(query: &str, results: &[RetrievedImage]) -> Result<()> {
    eprintln!("Found {} images for '{}'", results.len(), query.trim());
    for (rank, result) in results.iter().enumerate() {
        print_stdout(&format!(
            "{:>2}. {:<40} {:>10.4}  {}",
            rank + 1,
            result.image_id,
            result.distance,
            result.caption.as_deref().unwrap_or("-")
        ))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum SnapshotStatus {
    Present,
    Missing,
    Corrupt,
}

impl SnapshotStatus {
    const fn as_str(self) -> &'static str {
        match self {
            SnapshotStatus::Present => "present",
            SnapshotStatus::Missing => "missing",
            SnapshotStatus::Corrupt => "corrupt",
        }
    }
}

#[derive(Serialize)]
struct InfoOutput {
    snapshot_dir: PathBuf,
    index_file: PathBuf,
    records_file: PathBuf,
    exists: bool,
    status: SnapshotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    dimension: usize,
    records: usize,
    captioned: usize,
    provider: ProviderKind,
}

async fn run_info(args: InfoArgs, settings: &Settings) -> Result<()> {
    let mut error = None;
    let (status, dimension, records, captioned) = if settings.paths.is_absent() {
        (SnapshotStatus::Missing, settings.dimension(), 0, 0)
    } else {
        match SharedCatalog::open(&settings.paths).await {
            Ok(catalog) => {
                let guard = catalog.read().await;
                let captioned = guard
                    .records()
                    .iter()
                    .filter(|record| record.caption.is_some())
                    .count();
                (
                    SnapshotStatus::Present,
                    guard.dimension(),
                    guard.len(),
                    captioned,
                )
            }
            Err(err) => {
                log::warn!("Snapshot in {} does not load: {err}", describe(&settings.paths));
                error = Some(err.to_string());
                (SnapshotStatus::Corrupt, settings.dimension(), 0, 0)
            }
        }
    };

    let info = InfoOutput {
        snapshot_dir: settings.config.index.snapshot_dir.clone(),
        index_file: settings.paths.index.clone(),
        records_file: settings.paths.records.clone(),
        exists: status == SnapshotStatus::Present,
        status,
        error,
        dimension,
        records,
        captioned,
        provider: settings.provider,
    };

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&info)?)?;
    } else {
        print_stdout(&format!("Snapshot:  {}", info.snapshot_dir.display()))?;
        print_stdout(&format!("Status:    {}", status.as_str()))?;
        if let Some(error) = &info.error {
            print_stdout(&format!("Error:     {error}"))?;
        }
        print_stdout(&format!("Dimension: {dimension}"))?;
        print_stdout(&format!("Records:   {records} ({captioned} captioned)"))?;
    }
    Ok(())
}
