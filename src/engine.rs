use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::authority;
use crate::autocomplete::{NgramIndex, PhraseSuggestion, WordPrefixIndex, WordSuggestion};
use crate::barrel::{BarrelLookup, BarrelStore};
use crate::config::Config;
use crate::embeddings::Embeddings;
use crate::error::Result;
use crate::indexer::{IndexStats, Indexer};
use crate::lexicon::Lexicon;
use crate::metadata::Metadata;
use crate::query::{QueryEngine, QueryMode, RankWeights, SearchHit};

/// Top-level facade: owns every persisted subsystem and is the only thing
/// request handlers (HTTP or CLI) talk to. Holds no global/static state —
/// constructed once at startup and passed down, per spec §9's "no
/// singleton" resolution.
pub struct Engine {
    root: PathBuf,
    config: Config,
    indexer: Indexer,
    embeddings: RwLock<Option<Arc<Embeddings>>>,
    authority: RwLock<Arc<HashMap<String, f32>>>,
    word_index: RwLock<Arc<WordPrefixIndex>>,
    ngram_index: RwLock<Arc<NgramIndex>>,
}

impl Engine {
    pub fn open(root: PathBuf) -> Result<Self> {
        let config = Config::load(&root.join(crate::constants::CONFIG_FILE))?;
        std::fs::create_dir_all(config.barrels_root(&root))?;

        let lexicon = if config.lexicon_path(&root).exists() {
            Lexicon::load(&config.lexicon_path(&root))?
        } else {
            Lexicon::new()
        };
        let barrel_lookup = BarrelLookup::load(&config.barrel_lookup_path(&root))?;
        let barrels = Arc::new(BarrelStore::open(&config.barrels_root(&root), barrel_lookup)?);
        let metadata = Metadata::load(&config.metadata_path(&root))?;

        let embeddings = load_embeddings(&config, &root);
        let authority = authority::load(&config.doc_scores_path(&root))?;
        let word_index = WordPrefixIndex::load(&config.autocomplete_path(&root))?;
        let ngram_index = NgramIndex::load(&config.ngram_autocomplete_path(&root))?;

        let indexer = Indexer::new(root.clone(), config.clone(), lexicon, barrels, metadata);

        Ok(Engine {
            root,
            config,
            indexer,
            embeddings: RwLock::new(embeddings.map(Arc::new)),
            authority: RwLock::new(Arc::new(authority)),
            word_index: RwLock::new(Arc::new(word_index)),
            ngram_index: RwLock::new(Arc::new(ngram_index)),
        })
    }

    pub async fn index_document(
        &self,
        doc_id: Option<String>,
        title: &str,
        abstract_text: &str,
        body: &str,
        authors: Vec<String>,
    ) -> Result<IndexStats> {
        self.indexer
            .index_document(doc_id, title, abstract_text, body, authors)
            .await
    }

    pub fn search(
        &self,
        query: &str,
        mode: QueryMode,
        weights: RankWeights,
        top_k: usize,
        semantic: bool,
    ) -> Result<Vec<SearchHit>> {
        let lexicon = self.indexer.lexicon_snapshot();
        let barrels = self.indexer.barrels();
        let metadata = self.indexer.metadata_snapshot();
        let embeddings = self.embeddings.read().unwrap().clone();
        let authority = self.authority.read().unwrap().clone();

        let qe = QueryEngine::new(
            &lexicon,
            &barrels,
            embeddings.as_deref(),
            &authority,
            &metadata,
            metadata.len().max(1),
        );
        qe.search(query, mode, weights, top_k, semantic)
    }

    pub fn similar(&self, word: &str) -> Vec<(String, f32)> {
        let lexicon = self.indexer.lexicon_snapshot();
        let barrels = self.indexer.barrels();
        let metadata = self.indexer.metadata_snapshot();
        let embeddings = self.embeddings.read().unwrap().clone();
        let authority = self.authority.read().unwrap().clone();

        let qe = QueryEngine::new(&lexicon, &barrels, embeddings.as_deref(), &authority, &metadata, 1);
        qe.similar(word)
    }

    /// Autocomplete a partial query: multi-word inputs are matched against
    /// the phrase index first, falling back to single-word suggestions for
    /// the trailing (possibly-partial) word.
    pub fn autocomplete(&self, partial: &str) -> (Vec<WordSuggestion>, Vec<PhraseSuggestion>) {
        let partial = partial.to_lowercase();
        let ngram_index = self.ngram_index.read().unwrap().clone();
        let word_index = self.word_index.read().unwrap().clone();

        let phrases = ngram_index.suggest(&partial).to_vec();
        let last_word = partial.rsplit(' ').next().unwrap_or(&partial);
        let words = word_index.suggest(last_word);
        (words, phrases)
    }

    /// Re-read the derived (bulk-only) artifacts from disk: authority
    /// scores and both autocomplete indexes. Call after a bulk rebuild so a
    /// long-lived server picks up the new corpus without a restart.
    pub fn reload_derived(&self) -> Result<()> {
        let authority = authority::load(&self.config.doc_scores_path(&self.root))?;
        *self.authority.write().unwrap() = Arc::new(authority);

        let word_index = WordPrefixIndex::load(&self.config.autocomplete_path(&self.root))?;
        *self.word_index.write().unwrap() = Arc::new(word_index);

        let ngram_index = NgramIndex::load(&self.config.ngram_autocomplete_path(&self.root))?;
        *self.ngram_index.write().unwrap() = Arc::new(ngram_index);

        let embeddings = load_embeddings(&self.config, &self.root);
        *self.embeddings.write().unwrap() = embeddings.map(Arc::new);

        Ok(())
    }
}

fn load_embeddings(config: &Config, root: &std::path::Path) -> Option<Embeddings> {
    let bin_path = config.embeddings_bin_path(root);
    let vocab_path = config.vocab_path(root);
    if !bin_path.exists() || !vocab_path.exists() {
        return None;
    }
    match Embeddings::load(&bin_path, &vocab_path) {
        Ok(e) => Some(e),
        Err(e) => {
            tracing::warn!(error = %e, "embeddings unavailable, semantic expansion disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_engine_indexes_and_searches_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().to_path_buf()).unwrap();

        engine
            .index_document(
                Some("DOC_A".to_string()),
                "Vaccine Trial",
                "A randomized trial of vaccine efficacy.",
                "Participants showed strong immune response.",
                vec![],
            )
            .await
            .unwrap();

        let hits = engine
            .search("vaccine", QueryMode::Or, RankWeights::default(), 10, true)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "DOC_A");
    }

    #[tokio::test]
    async fn engine_reopen_reloads_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = Engine::open(dir.path().to_path_buf()).unwrap();
            engine
                .index_document(Some("DOC_A".to_string()), "Vaccine", "Trial text.", "", vec![])
                .await
                .unwrap();
        }
        let engine = Engine::open(dir.path().to_path_buf()).unwrap();
        let hits = engine
            .search("vaccine", QueryMode::Or, RankWeights::default(), 10, true)
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
