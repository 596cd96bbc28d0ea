mod args;
mod audio;
mod background;
mod batch;
mod cleanup;
mod config;
mod error;
mod media;
mod narration;
mod partition;
mod pipeline;
mod reddit;
mod render;
mod segment;
mod story;
mod subtitle;
mod timeline;
mod tts;

use crate::args::{Args, BackgroundsArgs, Command, FetchArgs, RenderArgs};
use crate::background::{BackgroundSelector, load_pool};
use crate::cleanup::CleanupRegistry;
use crate::config::Config;
use crate::error::StartupError;
use crate::media::Toolchain;
use crate::pipeline::Pipeline;
use crate::reddit::FetchOptions;
use crate::story::{load_stories, load_used_ids, save_stories, save_used_ids};
use crate::tts::Piper;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => fatal_on_err(Config::load(path)),
        None => Config::default(),
    };

    match args.command {
        Command::Render(r) => render(config, r).await,
        Command::Fetch(f) => fetch(f).await,
        Command::Backgrounds(b) => backgrounds(config, b).await,
    }
}

/// Print the diagnosis and stop before any output is written.
fn fatal_on_err<T>(result: Result<T, StartupError>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn batch_dir(out: &Path) -> anyhow::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = out.join(format!("batch_{}", stamp));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

async fn render(mut config: Config, args: RenderArgs) -> anyhow::Result<()> {
    info!("Starting story video generation pipeline");
    if let Some(model) = args.piper_model {
        config.narration.piper_model = model;
    }

    let mut stories = fatal_on_err(load_stories(&args.stories));
    info!("Loaded {} stories from {}", stories.len(), args.stories.display());
    let mut used = match &args.used {
        Some(path) => load_used_ids(path)?,
        None => Default::default(),
    };
    stories.retain(|s| !used.contains(s.source_id()));
    stories.truncate(args.limit);

    let tools = fatal_on_err(Toolchain::discover(&config.tools).await);
    let piper = fatal_on_err(Piper::locate(
        config.narration.piper_bin.as_deref(),
        &config.narration.piper_model,
    ));
    let pool = fatal_on_err(load_pool(&args.backgrounds, &tools, 1.0).await);
    let selector = fatal_on_err(BackgroundSelector::new(pool));
    info!("Background pool: {} clips", selector.len());

    if stories.is_empty() {
        warn!("No unused stories left to render");
        return Ok(());
    }

    let batch = batch_dir(&args.out)?;
    let work_root = batch.join(".work");
    fs::create_dir_all(&work_root)?;
    let cleanup = CleanupRegistry::new();
    cleanup.register(&work_root);
    cleanup.sweep_on_interrupt();
    info!("Writing batch to {}", batch.display());

    let pipeline = Pipeline::new(&config, &piper, &tools, &selector);
    let summary = pipeline.run(&stories, &batch, &work_root).await;
    cleanup.sweep();

    if let Some(path) = &args.used {
        for (source, _) in &summary.rendered {
            used.insert(source.clone());
        }
        save_used_ids(path, &used)?;
    }

    info!(
        "Process complete: {} clips written, {} parts failed",
        summary.rendered.len(),
        summary.failed_parts
    );
    for (_, clip) in &summary.rendered {
        info!("  {} ({:.1}s)", clip.path.display(), clip.duration);
    }
    Ok(())
}

async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let opts = FetchOptions {
        subreddits: args.subreddits,
        tags: args.tags,
        sort: args.sort,
        timeframe: args.timeframe,
        limit_per_sub: args.limit_per_sub,
        min_score: args.min_score,
        top_comments: args.top_comments,
    };
    let stories = reddit::fetch_stories(&opts).await?;
    if stories.is_empty() {
        warn!("No stories found. Try relaxing filters.");
        return Ok(());
    }
    save_stories(&args.out, &stories)?;
    info!("Stories saved to {}", args.out.display());
    Ok(())
}

async fn backgrounds(config: Config, args: BackgroundsArgs) -> anyhow::Result<()> {
    let tools = fatal_on_err(Toolchain::discover(&config.tools).await);
    let pool = fatal_on_err(load_pool(&args.input, &tools, config.batch.min_source_seconds).await);
    let batch = batch_dir(&args.out)?;

    let jobs = batch::plan_jobs(&pool, args.count, config.batch.clip_seconds, &batch);
    info!(
        "Processing {} videos with up to {} workers into {}",
        jobs.len(),
        config.batch.workers,
        batch.display()
    );
    let total = jobs.len();
    let results = batch::run_jobs(&tools, jobs, config.batch.workers).await;

    for r in &results {
        info!(
            "  worker {:02}: {} ({:.1} MB, {:.1}s)",
            r.worker_id,
            r.output.display(),
            r.size_mb,
            r.encode_secs
        );
    }
    let size: f64 = results.iter().map(|r| r.size_mb).sum();
    info!(
        "Created {}/{} background clips ({:.1} MB) in {}",
        results.len(),
        total,
        size,
        batch.display()
    );
    Ok(())
}
