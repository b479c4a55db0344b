//! `scholar_search bulk-index`
//!
//! One-time (or rebuild-time) corpus ingestion: walks a directory of
//! per-paper JSON files, builds the lexicon, cold barrels, forward index,
//! document authority scores, and both autocomplete indexes.
//!
//! Usage:
//!   cargo run --bin bulk-index -- --corpus ./data/pmc-json --out ./data

use std::path::PathBuf;

use clap::Parser;
use scholar_search::bulk::build_corpus;
use scholar_search::config::Config;

#[derive(Parser, Debug)]
#[command(name = "bulk-index")]
struct Args {
    /// Directory of per-paper `*.json` files to ingest.
    #[arg(long)]
    corpus: PathBuf,

    /// Output data directory (will contain indexes/, barrels/, config.json).
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.out)?;
    let config = Config::load(&args.out.join(scholar_search::constants::CONFIG_FILE))?;

    tracing::info!(corpus = %args.corpus.display(), out = %args.out.display(), "starting bulk index");
    let stats = build_corpus(&args.out, &config, &args.corpus)
        .map_err(|e| anyhow::anyhow!("bulk index failed: {e}"))?;

    println!("Indexed {} documents", stats.documents_indexed);
    println!("Unique words: {}", stats.unique_words);
    println!("Unique lemmas assigned to barrels: {}", stats.unique_lemmas);
    println!("Elapsed: {} ms", stats.elapsed_ms);

    Ok(())
}
