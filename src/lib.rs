//! Incremental, sharded full-text search over a corpus of scientific
//! papers: lexicon/lemma identity, a barrelled inverted index with a
//! single hot partition, an append-only forward index, document authority
//! scoring, optional semantic query expansion, and autocomplete.

pub mod authority;
pub mod autocomplete;
pub mod barrel;
pub mod bulk;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod forward_index;
pub mod indexer;
pub mod io_util;
pub mod lexicon;
pub mod metadata;
pub mod query;
pub mod text;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use query::{QueryMode, RankWeights, SearchHit};
