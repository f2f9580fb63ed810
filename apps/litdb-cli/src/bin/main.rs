use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use litdb_cache::AnswerCache;
use litdb_core::config::{Config, Settings};
use litdb_core::data_processor::{write_processed, DataProcessor};
use litdb_core::types::ContentFilter;
use litdb_embed::get_default_embedder;
use litdb_hybrid::{cited_search, CitedSearch, EngineOptions, HybridRetrievalEngine};

#[derive(Parser)]
#[command(name = "litdb", version, about = "Hybrid BM25 + vector search over a local literature collection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every supported file under DIR and rebuild the index
    Index {
        /// Defaults to `data.raw_dir`
        dir: Option<PathBuf>,
    },
    /// Rank documents for QUERY
    Search {
        query: String,
        /// table | formula | none (also 表格 / 公式 / 全部)
        #[arg(long, short, value_parser = parse_filter, default_value = "none")]
        filter: ContentFilter,
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        #[arg(long)]
        no_cache: bool,
        /// Print the hits as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete expired answer cache entries
    SweepCache,
}

fn parse_filter(s: &str) -> Result<ContentFilter, String> {
    s.parse().map_err(|e: litdb_core::Error| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

fn open_cache(settings: &Settings) -> AnswerCache {
    match AnswerCache::open(settings.cache_dir(), settings.cache.enabled) {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "answer cache unavailable; continuing without it");
            AnswerCache::disabled()
        }
    }
}

fn open_engine(settings: &Settings) -> anyhow::Result<HybridRetrievalEngine> {
    let embedder = get_default_embedder(&settings.embedding).context("creating embedder")?;
    let options = EngineOptions { embed_batch_size: settings.embedding.batch_size, ..EngineOptions::default() };
    Ok(HybridRetrievalEngine::with_options(embedder, settings.index_dir(), options))
}

fn run_index(settings: &Settings, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| settings.raw_dir());
    let records = DataProcessor::new()
        .process_directory(&dir)
        .with_context(|| format!("reading {}", dir.display()))?;
    println!("Extracted {} documents from {}", records.len(), dir.display());

    if let Some(processed) = settings.processed_dir() {
        for record in &records {
            if let Err(e) = write_processed(&processed, record) {
                warn!(file = %record.file_path, error = %e, "failed to write processed record");
            }
        }
    }

    let engine = open_engine(settings)?;
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message(format!("embedding and indexing {} documents", records.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = engine.build_index(records);
    spinner.finish_and_clear();
    let snapshot = result.context("building index")?;
    println!("✅ Index generation {} ready ({} documents) at {}", snapshot.generation(), snapshot.len(), settings.index_dir().display());
    Ok(())
}

fn run_search(settings: &Settings, query: &str, filter: ContentFilter, top_k: Option<usize>, use_cache: bool, json: bool) -> anyhow::Result<()> {
    let top_k = top_k.unwrap_or(settings.search.top_k);
    let cache = open_cache(settings);
    let engine = open_engine(settings)?;
    let CitedSearch { sources, from_cache } = cited_search(&engine, &cache, query, top_k, filter, use_cache)
        .context("search failed; run `litdb index` first?")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }
    if sources.is_empty() {
        println!("No documents matched (filter: {filter}).");
        return Ok(());
    }
    println!("Top {} for \"{query}\"{}:", sources.len(), if from_cache { " (cached)" } else { "" });
    for (i, s) in sources.iter().enumerate() {
        println!("{}. {}《{}》 (score: {:.4})  {}", i + 1, s.format_source, s.title, s.score, s.file_path);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load().context("loading configuration")?.settings()?;

    match cli.command {
        Command::Index { dir } => run_index(&settings, dir),
        Command::Search { query, filter, top_k, no_cache, json } => run_search(&settings, &query, filter, top_k, !no_cache, json),
        Command::SweepCache => {
            let report = open_cache(&settings).clear_expired();
            println!("Scanned {} entries, removed {}, {} failed", report.scanned, report.removed, report.failed);
            Ok(())
        }
    }
}
