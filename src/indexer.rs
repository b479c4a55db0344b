use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use rand::Rng;
use rust_stemmers::Stemmer;

use crate::barrel::{BarrelLookup, BarrelStore};
use crate::config::Config;
use crate::constants::HOT_BARREL_ID;
use crate::error::{EngineError, Result};
use crate::forward_index::{self, ForwardRecord};
use crate::lexicon::Lexicon;
use crate::metadata::{DocMetadata, Metadata};
use crate::text;

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub doc_id: String,
    pub total_terms: usize,
    pub unique_terms: usize,
    pub new_terms_added: usize,
    pub barrels_updated: Vec<u32>,
    pub indexing_time_ms: u64,
}

/// Single-writer incremental indexer. `write_lock` serializes the whole
/// `index_document` critical section; everything it touches (lexicon,
/// barrel lookup, metadata) is published as a fresh `Arc` snapshot at the
/// end so concurrent readers never block on it and never see a torn state.
pub struct Indexer {
    root: PathBuf,
    config: Config,
    write_lock: tokio::sync::Mutex<()>,
    lexicon: RwLock<Arc<Lexicon>>,
    barrels: Arc<BarrelStore>,
    metadata: RwLock<Arc<Metadata>>,
    stemmer: Stemmer,
}

impl Indexer {
    pub fn new(
        root: PathBuf,
        config: Config,
        lexicon: Lexicon,
        barrels: Arc<BarrelStore>,
        metadata: Metadata,
    ) -> Self {
        Indexer {
            root,
            config,
            write_lock: tokio::sync::Mutex::new(()),
            lexicon: RwLock::new(Arc::new(lexicon)),
            barrels,
            metadata: RwLock::new(Arc::new(metadata)),
            stemmer: text::make_stemmer(),
        }
    }

    pub fn lexicon_snapshot(&self) -> Arc<Lexicon> {
        self.lexicon.read().unwrap().clone()
    }

    pub fn metadata_snapshot(&self) -> Arc<Metadata> {
        self.metadata.read().unwrap().clone()
    }

    pub fn barrels(&self) -> Arc<BarrelStore> {
        self.barrels.clone()
    }

    /// Index one document. Accepts raw title/abstract/body text; an absent
    /// `doc_id` is generated as `DOC_<12 uppercase hex>`.
    pub async fn index_document(
        &self,
        doc_id: Option<String>,
        title: &str,
        abstract_text: &str,
        body: &str,
        authors: Vec<String>,
    ) -> Result<IndexStats> {
        let _guard = self.write_lock.lock().await;
        let start = std::time::Instant::now();

        let doc_id = doc_id.unwrap_or_else(generate_doc_id);
        forward_index::validate_doc_id(&doc_id)?;

        let full_text = format!("{title} {abstract_text} {body}");
        if full_text.trim().is_empty() {
            return Err(EngineError::InputError("no text content found".into()));
        }

        let mut lexicon = (*self.lexicon_snapshot()).clone();
        let mut new_terms = 0usize;

        let mut intern_section = |text: &str| -> Result<Vec<u32>> {
            let mut ids = Vec::new();
            for (surface, lemma) in crate::text::tokenize(text, &self.stemmer) {
                let before = lexicon.len();
                let (_, lemma_id) = lexicon.intern_word(&surface, &lemma)?;
                if lexicon.len() > before {
                    new_terms += 1;
                }
                ids.push(lemma_id);
            }
            Ok(ids)
        };

        let title_ids = intern_section(title)?;
        let abstract_ids = intern_section(abstract_text)?;
        let body_ids = intern_section(body)?;

        let mut all_ids = Vec::with_capacity(title_ids.len() + abstract_ids.len() + body_ids.len());
        all_ids.extend_from_slice(&title_ids);
        all_ids.extend_from_slice(&abstract_ids);
        all_ids.extend_from_slice(&body_ids);

        if all_ids.is_empty() {
            return Err(EngineError::InputError(
                "no valid terms found after tokenization".into(),
            ));
        }

        let mut term_freqs: HashMap<u32, u32> = HashMap::new();
        for &lemma_id in &all_ids {
            *term_freqs.entry(lemma_id).or_insert(0) += 1;
        }

        let barrel_lookup_before = self.barrels.lookup_snapshot();
        let mut barrel_lookup = (*barrel_lookup_before).clone();
        let mut barrels_updated = std::collections::HashSet::new();
        for (&lemma_id, &tf) in &term_freqs {
            self.barrels.append_hot(lemma_id, &doc_id, tf);
            barrel_lookup.record_if_absent(lemma_id, HOT_BARREL_ID);
            barrels_updated.insert(HOT_BARREL_ID);
        }

        let forward_path = self.config.forward_index_path(&self.root);
        forward_index::append(
            &forward_path,
            ForwardRecord {
                doc_id: doc_id.clone(),
                total_terms: all_ids.len(),
                title_lemmas: title_ids.iter().map(|id| id.to_string()).collect(),
                abstract_lemmas: abstract_ids.iter().map(|id| id.to_string()).collect(),
                body_lemmas: body_ids.iter().map(|id| id.to_string()).collect(),
            },
        )?;

        let meta_snapshot = self.metadata_snapshot();
        let mut metadata = (*meta_snapshot).clone();
        metadata.insert(
            doc_id.clone(),
            DocMetadata::new(&doc_id, title, authors, abstract_text),
        );
        metadata.save(&self.config.metadata_path(&self.root))?;
        *self.metadata.write().unwrap() = Arc::new(metadata);

        if new_terms > 0 {
            lexicon.save(&self.config.lexicon_path(&self.root))?;
            lexicon.rebuild_binary_cache(&self.config.lexicon_bin_path(&self.root))?;
            barrel_lookup.save(&self.config.barrel_lookup_path(&self.root))?;
            self.barrels.publish_lookup(barrel_lookup);
        }
        *self.lexicon.write().unwrap() = Arc::new(lexicon);

        // Postings are durable once the forward-index append above returns;
        // the binary mirror rebuild for touched barrels follows last.
        self.barrels.flush_hot()?;

        Ok(IndexStats {
            doc_id,
            total_terms: all_ids.len(),
            unique_terms: term_freqs.len(),
            new_terms_added: new_terms,
            barrels_updated: barrels_updated.into_iter().collect(),
            indexing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn generate_doc_id() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    let mut hex = String::with_capacity(12);
    for b in bytes {
        hex.push_str(&format!("{b:02X}"));
    }
    format!("DOC_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::BarrelStore;

    fn fresh_indexer(root: &std::path::Path) -> Indexer {
        let config = Config::default();
        std::fs::create_dir_all(config.barrels_root(root)).unwrap();
        let barrels = Arc::new(BarrelStore::open(&config.barrels_root(root), BarrelLookup::default()).unwrap());
        Indexer::new(root.to_path_buf(), config, Lexicon::new(), barrels, Metadata::default())
    }

    #[tokio::test]
    async fn indexing_a_document_makes_its_terms_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = fresh_indexer(dir.path());

        let stats = indexer
            .index_document(
                Some("DOC_TEST1".to_string()),
                "Vaccine Trial Results",
                "A randomized trial of a new vaccine.",
                "The vaccine showed strong immune response in participants.",
                vec!["A. Researcher".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(stats.doc_id, "DOC_TEST1");
        assert!(stats.unique_terms > 0);
        assert!(stats.new_terms_added > 0);

        let lexicon = indexer.lexicon_snapshot();
        let lemma_id = lexicon.lemma_id_of_surface("vaccin").or_else(|| {
            lexicon.word_id_of("vaccine").and_then(|wid| lexicon.lemma_id_of_word(wid))
        });
        let lemma_id = lemma_id.expect("vaccine should have been interned");

        let (df, postings) = indexer.barrels().read_postings(lemma_id).unwrap().unwrap();
        assert_eq!(df, 1);
        assert_eq!(postings[0].0, "DOC_TEST1");
    }

    #[tokio::test]
    async fn empty_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = fresh_indexer(dir.path());
        let result = indexer
            .index_document(Some("DOC_EMPTY".to_string()), "", "", "", vec![])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reindexing_same_doc_id_does_not_duplicate_postings() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = fresh_indexer(dir.path());
        for _ in 0..2 {
            indexer
                .index_document(
                    Some("DOC_DUP".to_string()),
                    "vaccine",
                    "",
                    "",
                    vec![],
                )
                .await
                .unwrap();
        }
        let lexicon = indexer.lexicon_snapshot();
        let wid = lexicon.word_id_of("vaccine").unwrap();
        let lemma_id = lexicon.lemma_id_of_word(wid).unwrap();
        let (df, _) = indexer.barrels().read_postings(lemma_id).unwrap().unwrap();
        assert_eq!(df, 1);
    }

    #[test]
    fn generated_doc_ids_have_the_expected_shape() {
        let id = generate_doc_id();
        assert!(id.starts_with("DOC_"));
        assert_eq!(id.len(), 16);
    }
}
