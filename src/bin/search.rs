//! `scholar_search search`
//!
//! Loads a built index once, then answers queries instantly.
//!
//! Usage (single query):
//!   cargo run --bin search -- "vaccine trial"
//!
//! Usage (interactive REPL):
//!   cargo run --bin search

use std::io::{self, BufRead, Write};

use clap::Parser;
use scholar_search::query::{QueryMode, RankWeights};
use scholar_search::Engine;

#[derive(Parser, Debug)]
#[command(name = "search")]
struct Args {
    /// Data directory containing indexes/, barrels/, config.json, etc.
    #[arg(long, default_value = ".")]
    data_dir: std::path::PathBuf,

    /// Require every query term to be present (default: any term).
    #[arg(long)]
    and: bool,

    #[arg(long, default_value_t = 10)]
    top_k: usize,

    /// Disable embedding-based query expansion.
    #[arg(long)]
    no_semantic: bool,

    /// Single query; omit for an interactive REPL.
    query: Vec<String>,
}

fn run_query(engine: &Engine, query: &str, mode: QueryMode, top_k: usize, semantic: bool) {
    match engine.search(query, mode, RankWeights::default(), top_k, semantic) {
        Ok(hits) if hits.is_empty() => println!("  (no results)"),
        Ok(hits) => {
            for (rank, hit) in hits.iter().enumerate() {
                println!("  {:>2}. [{:.3}] {}  ({})", rank + 1, hit.score, hit.title, hit.doc_id);
            }
        }
        Err(e) => eprintln!("  search failed: {e}"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    eprint!("Loading engine from '{}'… ", args.data_dir.display());
    let engine = Engine::open(args.data_dir.clone())
        .map_err(|e| anyhow::anyhow!("failed to open engine: {e}"))?;
    eprintln!("OK");

    let mode = if args.and { QueryMode::And } else { QueryMode::Or };
    let semantic = !args.no_semantic;

    if !args.query.is_empty() {
        let query = args.query.join(" ");
        run_query(&engine, &query, mode, args.top_k, semantic);
        return Ok(());
    }

    println!("Type a query and press Enter. Ctrl-D / empty line to exit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        run_query(&engine, line.trim(), mode, args.top_k, semantic);
    }

    Ok(())
}
