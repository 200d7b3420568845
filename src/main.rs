use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tex_inspector::record::Codecs;
use tex_inspector::{gpu, ImageInfo, ImageList, ImageRecord, LoadState, Settings, ThumbnailCache, ThumbnailScheduler};

#[derive(Debug, Parser)]
#[command(name = "tex-inspector", version, about = "Inspect images and DDS textures")]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Decode containers on the CPU even when a GPU is available
    #[arg(long, global = true)]
    no_gpu: bool,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load files and print their metadata as JSON
    Info {
        #[arg(required = true, value_name = "FILE")]
        paths: Vec<PathBuf>,
    },
    /// Generate thumbnails for every image under a directory
    Thumbs {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Maintain the thumbnail cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// Drop the oldest entries beyond the limit
    Prune {
        /// Entries to keep (defaults to max_cache_files)
        #[arg(long)]
        max: Option<usize>,
    },
    /// Remove every entry
    Clear,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    path: &'a Path,
    state: LoadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<&'a ImageInfo>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "tex_inspector=info,wgpu=warn",
        1 => "tex_inspector=debug,wgpu=warn",
        _ => "tex_inspector=trace,wgpu=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    if args.no_gpu {
        settings.use_gpu = false;
    }

    match args.command {
        Command::Info { paths } => run_info(&settings, paths),
        Command::Thumbs { dir } => run_thumbs(&settings, &dir),
        Command::Cache { action } => run_cache(&settings, action),
    }
}

fn run_info(settings: &Settings, paths: Vec<PathBuf>) -> Result<()> {
    let device = gpu::default_device(settings.use_gpu);
    tracing::debug!(device = device.name(), "using graphics device");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let records = runtime.block_on(async {
        let mut set = tokio::task::JoinSet::new();
        for (i, path) in paths.into_iter().enumerate() {
            let record = ImageRecord::new(path, Arc::clone(&device));
            set.spawn(async move { (i, record.load_detached().await) });
        }
        let mut done = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (i, record) = joined.context("load task panicked")?;
            done.push((i, record?));
        }
        done.sort_by_key(|(i, _)| *i);
        anyhow::Ok(done.into_iter().map(|(_, r)| r).collect::<Vec<_>>())
    })?;

    let reports: Vec<_> = records
        .iter()
        .map(|r| InfoReport {
            path: r.path(),
            state: r.state(),
            error: r.load_error(),
            info: r.info(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn run_thumbs(settings: &Settings, dir: &Path) -> Result<()> {
    let scheduler = ThumbnailScheduler::from_settings(settings)
        .context("failed to open thumbnail cache")?;
    let device = gpu::default_device(settings.use_gpu);
    let mut list = ImageList::scan_dir(dir, device, Codecs::default())
        .with_context(|| format!("failed to scan {}", dir.display()))?;
    tracing::info!(count = list.len(), workers = scheduler.max_workers(), "generating thumbnails");

    // Polling loop: request what the pool has room for, collect what finished
    loop {
        let mut pending = 0;
        for record in list.iter_mut() {
            if record.thumbnail().is_some() {
                continue;
            }
            if !record.is_thumbnail_requested() {
                record.request_thumbnail(&scheduler);
                pending += 1;
            } else if record.is_thumbnail_running() {
                pending += 1;
            }
        }
        if pending == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let mut ok = 0;
    for record in list.iter_mut() {
        if record.thumbnail().is_some() {
            ok += 1;
        } else {
            println!("failed: {}", record.path().display());
        }
    }
    println!("{ok}/{} thumbnails ready in {}", list.len(), scheduler.cache().dir().display());

    let pruned = scheduler.cache().prune(settings.max_cache_files)?;
    if pruned > 0 {
        println!("pruned {pruned} old cache entries");
    }
    Ok(())
}

fn run_cache(settings: &Settings, action: CacheAction) -> Result<()> {
    let dir = settings.cache_dir()?;
    let cache = ThumbnailCache::open(&dir)
        .with_context(|| format!("failed to open cache at {}", dir.display()))?;
    match action {
        CacheAction::Prune { max } => {
            let removed = cache.prune(max.unwrap_or(settings.max_cache_files))?;
            println!("removed {removed} entries, {} left", cache.len()?);
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("removed {removed} entries from {}", dir.display());
        }
    }
    Ok(())
}
