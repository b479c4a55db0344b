use std::collections::{HashMap, HashSet};

use rust_stemmers::Stemmer;
use serde::Serialize;

use crate::barrel::BarrelStore;
use crate::constants::{
    DEFAULT_ALPHA, DEFAULT_BETA, DEFAULT_GAMMA, DEFAULT_SEMANTIC_NEIGHBORS,
    DEFAULT_SEMANTIC_THRESHOLD, EMPTY_DOC_SCORE, SIMILAR_WORDS_K,
};
use crate::embeddings::Embeddings;
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::metadata::Metadata;
use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    And,
    Or,
}

/// Tunable ranking weights: `final = alpha*term_score + beta*authority +
/// gamma*matched_ratio`. Fields, not constants, so callers (and the HTTP
/// surface) can tune without a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
    pub semantic_neighbors: usize,
    pub semantic_threshold: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        RankWeights {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            semantic_neighbors: DEFAULT_SEMANTIC_NEIGHBORS,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub title: String,
    pub score: f32,
    pub matched_ratio: f32,
}

/// Ties the lexicon, sharded postings, authority scores, and optional
/// embeddings together into the query-time read path. Holds no mutable
/// state of its own; every field is a read-only snapshot handed in by the
/// engine facade.
pub struct QueryEngine<'a> {
    pub lexicon: &'a Lexicon,
    pub barrels: &'a BarrelStore,
    pub embeddings: Option<&'a Embeddings>,
    pub authority: &'a HashMap<String, f32>,
    pub metadata: &'a Metadata,
    pub total_docs: usize,
    stemmer: Stemmer,
}

struct WeightedLemma {
    lemma_id: u32,
    weight: f32,
    is_original: bool,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        lexicon: &'a Lexicon,
        barrels: &'a BarrelStore,
        embeddings: Option<&'a Embeddings>,
        authority: &'a HashMap<String, f32>,
        metadata: &'a Metadata,
        total_docs: usize,
    ) -> Self {
        QueryEngine {
            lexicon,
            barrels,
            embeddings,
            authority,
            metadata,
            total_docs,
            stemmer: text::make_stemmer(),
        }
    }

    /// Expand the raw query into `(lemma_id, weight, is_original)` triples.
    /// Terms absent from the lexicon are silently dropped (not an error).
    fn expand_query(&self, query: &str, weights: &RankWeights, semantic: bool) -> Vec<WeightedLemma> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for (surface, lemma) in text::tokenize(query, &self.stemmer) {
            let Some(lemma_id) = self
                .lexicon
                .lemma_id_of_surface(&lemma)
                .or_else(|| self.lexicon.word_id_of(&surface).and_then(|wid| self.lexicon.lemma_id_of_word(wid)))
            else {
                continue;
            };
            if seen.insert(lemma_id) {
                out.push(WeightedLemma {
                    lemma_id,
                    weight: 1.0,
                    is_original: true,
                });
            }

            if !semantic {
                continue;
            }
            if let Some(embeddings) = self.embeddings {
                for (neighbor, similarity) in
                    embeddings.expand(&lemma, weights.semantic_neighbors, weights.semantic_threshold)
                {
                    let Some(neighbor_id) = self.lexicon.lemma_id_of_surface(&neighbor) else {
                        continue;
                    };
                    if seen.insert(neighbor_id) {
                        out.push(WeightedLemma {
                            lemma_id: neighbor_id,
                            weight: similarity,
                            is_original: false,
                        });
                    }
                }
            }
        }
        out
    }

    fn idf(&self, df: u32) -> f32 {
        let df = df.max(1) as f32;
        ((self.total_docs.max(1) as f32) / df).ln().max(0.0)
    }

    pub fn search(
        &self,
        query: &str,
        mode: QueryMode,
        weights: RankWeights,
        top_k: usize,
        semantic: bool,
    ) -> Result<Vec<SearchHit>> {
        let lemmas = self.expand_query(query, &weights, semantic);
        let original_count = lemmas.iter().filter(|l| l.is_original).count();
        if lemmas.is_empty() || original_count == 0 {
            return Ok(Vec::new());
        }

        // doc_id -> (term_score accumulator, count of distinct original lemmas matched)
        let mut doc_term_score: HashMap<String, f32> = HashMap::new();
        let mut doc_original_matches: HashMap<String, HashSet<u32>> = HashMap::new();
        let mut original_doc_sets: Vec<HashSet<String>> = Vec::new();

        for wl in &lemmas {
            let Some((df, postings)) = self.barrels.read_postings(wl.lemma_id)? else {
                if wl.is_original {
                    original_doc_sets.push(HashSet::new());
                }
                continue;
            };
            let idf = self.idf(df);
            let mut docs_for_lemma = HashSet::new();
            for (doc_id, tf) in &postings {
                let tf_component = 1.0 + (*tf as f32).max(1.0).ln();
                *doc_term_score.entry(doc_id.clone()).or_insert(0.0) += wl.weight * tf_component * idf;
                if wl.is_original {
                    doc_original_matches
                        .entry(doc_id.clone())
                        .or_default()
                        .insert(wl.lemma_id);
                    docs_for_lemma.insert(doc_id.clone());
                }
            }
            if wl.is_original {
                original_doc_sets.push(docs_for_lemma);
            }
        }

        let candidate_docs: HashSet<String> = match mode {
            QueryMode::And => {
                let mut iter = original_doc_sets.into_iter();
                let Some(first) = iter.next() else {
                    return Ok(Vec::new());
                };
                iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect())
            }
            QueryMode::Or => original_doc_sets.into_iter().flatten().collect(),
        };

        let mut hits: Vec<SearchHit> = candidate_docs
            .into_iter()
            .map(|doc_id| {
                let term_score = doc_term_score.get(&doc_id).copied().unwrap_or(0.0);
                let authority = self.authority.get(&doc_id).copied().unwrap_or(EMPTY_DOC_SCORE);
                let matched = doc_original_matches
                    .get(&doc_id)
                    .map(|s| s.len())
                    .unwrap_or(0) as f32;
                let matched_ratio = matched / original_count as f32;
                let score = weights.alpha * term_score + weights.beta * authority + weights.gamma * matched_ratio;
                let title = self
                    .metadata
                    .get(&doc_id)
                    .map(|m| m.title.clone())
                    .unwrap_or_else(|| doc_id.clone());
                SearchHit { doc_id, title, score, matched_ratio }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Nearest semantic neighbors of `word`, for the `/similar` surface.
    pub fn similar(&self, word: &str) -> Vec<(String, f32)> {
        let lemma = self.stemmer.stem(&word.to_lowercase()).into_owned();
        self.embeddings
            .map(|e| e.nearest(&lemma, SIMILAR_WORDS_K))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::BarrelLookup;

    fn fixture() -> (Lexicon, std::path::PathBuf) {
        let mut lex = Lexicon::new();
        lex.intern_word("vaccine", "vaccin").unwrap();
        lex.intern_word("trial", "trial").unwrap();
        let dir = tempfile::tempdir().unwrap();
        (lex, dir.path().to_path_buf())
    }

    #[test]
    fn and_query_requires_every_original_lemma() {
        let (lex, root) = fixture();
        let barrels = BarrelStore::open(&root, BarrelLookup::default()).unwrap();
        let vaccine_id = lex.lemma_id_of_surface("vaccin").unwrap();
        let trial_id = lex.lemma_id_of_surface("trial").unwrap();
        barrels.append_hot(vaccine_id, "DOC_A", 2);
        barrels.append_hot(vaccine_id, "DOC_B", 1);
        barrels.append_hot(trial_id, "DOC_A", 3);

        let authority = HashMap::new();
        let metadata = Metadata::default();
        let qe = QueryEngine::new(&lex, &barrels, None, &authority, &metadata, 2);
        let hits = qe.search("vaccine trial", QueryMode::And, RankWeights::default(), 10, true).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "DOC_A");
    }

    #[test]
    fn or_query_is_a_superset_of_and_query() {
        let (lex, root) = fixture();
        let barrels = BarrelStore::open(&root, BarrelLookup::default()).unwrap();
        let vaccine_id = lex.lemma_id_of_surface("vaccin").unwrap();
        let trial_id = lex.lemma_id_of_surface("trial").unwrap();
        barrels.append_hot(vaccine_id, "DOC_A", 2);
        barrels.append_hot(trial_id, "DOC_B", 1);

        let authority = HashMap::new();
        let metadata = Metadata::default();
        let qe = QueryEngine::new(&lex, &barrels, None, &authority, &metadata, 2);
        let and_hits: HashSet<String> = qe
            .search("vaccine trial", QueryMode::And, RankWeights::default(), 10, true)
            .unwrap()
            .into_iter()
            .map(|h| h.doc_id)
            .collect();
        let or_hits: HashSet<String> = qe
            .search("vaccine trial", QueryMode::Or, RankWeights::default(), 10, true)
            .unwrap()
            .into_iter()
            .map(|h| h.doc_id)
            .collect();
        assert!(and_hits.is_subset(&or_hits));
    }

    #[test]
    fn unknown_query_term_yields_no_results_without_error() {
        let (lex, root) = fixture();
        let barrels = BarrelStore::open(&root, BarrelLookup::default()).unwrap();
        let authority = HashMap::new();
        let metadata = Metadata::default();
        let qe = QueryEngine::new(&lex, &barrels, None, &authority, &metadata, 1);
        let hits = qe.search("zzzznotaword", QueryMode::Or, RankWeights::default(), 10, true).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn results_are_sorted_descending_by_score() {
        let (lex, root) = fixture();
        let barrels = BarrelStore::open(&root, BarrelLookup::default()).unwrap();
        let vaccine_id = lex.lemma_id_of_surface("vaccin").unwrap();
        barrels.append_hot(vaccine_id, "DOC_LOW", 1);
        barrels.append_hot(vaccine_id, "DOC_HIGH", 50);

        let authority = HashMap::new();
        let metadata = Metadata::default();
        let qe = QueryEngine::new(&lex, &barrels, None, &authority, &metadata, 2);
        let hits = qe.search("vaccine", QueryMode::Or, RankWeights::default(), 10, true).unwrap();
        assert_eq!(hits[0].doc_id, "DOC_HIGH");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn semantic_false_skips_embedding_expansion_even_when_loaded() {
        let (lex, root) = fixture();
        let barrels = BarrelStore::open(&root, BarrelLookup::default()).unwrap();
        let vaccine_id = lex.lemma_id_of_surface("vaccin").unwrap();
        let trial_id = lex.lemma_id_of_surface("trial").unwrap();
        barrels.append_hot(vaccine_id, "DOC_A", 2);
        barrels.append_hot(trial_id, "DOC_B", 1);

        let dir = tempfile::tempdir().unwrap();
        let bin_path = dir.path().join("embeddings.bin");
        let vocab_path = dir.path().join("vocab.json");
        let mut buf = Vec::new();
        crate::io_util::write_u32(&mut buf, 2).unwrap();
        crate::io_util::write_u32(&mut buf, 2).unwrap();
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        buf.extend_from_slice(&0.0f32.to_le_bytes());
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        buf.extend_from_slice(&0.0f32.to_le_bytes());
        std::fs::write(&bin_path, &buf).unwrap();
        let vocab = serde_json::json!({"vaccin": 0, "trial": 1});
        std::fs::write(&vocab_path, serde_json::to_vec(&vocab).unwrap()).unwrap();
        let embeddings = Embeddings::load(&bin_path, &vocab_path).unwrap();

        let authority = HashMap::new();
        let metadata = Metadata::default();
        let qe = QueryEngine::new(&lex, &barrels, Some(&embeddings), &authority, &metadata, 2);

        // With semantic expansion on, "vaccine" pulls in "trial" as a
        // neighbor (identical vectors, similarity 1.0) and DOC_B surfaces.
        let with_expansion = qe.search("vaccine", QueryMode::Or, RankWeights::default(), 10, true).unwrap();
        assert!(with_expansion.iter().any(|h| h.doc_id == "DOC_B"));

        // With semantic expansion off, only the literal term is queried.
        let without_expansion = qe.search("vaccine", QueryMode::Or, RankWeights::default(), 10, false).unwrap();
        assert!(!without_expansion.iter().any(|h| h.doc_id == "DOC_B"));
    }
}
