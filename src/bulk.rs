use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;

use crate::authority;
use crate::autocomplete::{NgramIndex, WordPrefixIndex};
use crate::barrel::{write_barrel, BarrelLookup};
use crate::config::Config;
use crate::constants::HOT_BARREL_ID;
use crate::error::{EngineError, Result};
use crate::forward_index::{self, ForwardRecord};
use crate::lexicon::Lexicon;
use crate::metadata::{DocMetadata, Metadata};
use crate::text;

#[derive(Debug, Clone)]
pub struct BulkStats {
    pub documents_indexed: usize,
    pub unique_words: usize,
    pub unique_lemmas: usize,
    pub elapsed_ms: u64,
}

struct ExtractedDoc {
    doc_id: String,
    title: String,
    abstract_text: String,
    body_text: String,
}

/// `{"abstract": [{"text": ...}], "body_text": [{"text": ...}], "title": ...}`
/// — the corpus's native per-paper JSON shape, ported from the original
/// `extract_text_from_json`.
fn extract_one(path: &Path) -> Option<ExtractedDoc> {
    let bytes = std::fs::read(path).ok()?;
    let data: Value = serde_json::from_slice(&bytes).ok()?;

    let join_section = |key: &str| -> String {
        data.get(key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    };

    let title = data
        .get("metadata")
        .and_then(|m| m.get("title"))
        .or_else(|| data.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("doc");
    let doc_id = format!("DOC_{}", stem.to_uppercase());

    Some(ExtractedDoc {
        doc_id,
        title,
        abstract_text: join_section("abstract"),
        body_text: join_section("body_text"),
    })
}

/// Walk every `*.json` file directly under `json_dir`, build the full
/// lexicon, cold barrels, forward index, authority scores, and both
/// autocomplete indexes. Unlike [`crate::indexer::Indexer`], this performs
/// no incremental locking — it assumes exclusive access to `root`.
pub fn build_corpus(root: &Path, config: &Config, json_dir: &Path) -> Result<BulkStats> {
    let start = std::time::Instant::now();

    let paths: Vec<_> = std::fs::read_dir(json_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    // Extraction and tokenization are embarrassingly parallel per file;
    // only the lexicon interning step below must run sequentially.
    let extracted: Vec<ExtractedDoc> = paths.par_iter().filter_map(|p| extract_one(p)).collect();

    let stemmer = text::make_stemmer();
    let mut lexicon = Lexicon::new();
    let mut barrel_lookup = BarrelLookup::default();
    let mut cold_postings: HashMap<u32, HashMap<u32, HashMap<String, u32>>> = HashMap::new();
    let mut metadata = Metadata::default();
    let mut ngram_docs: Vec<Vec<String>> = Vec::with_capacity(extracted.len());
    let forward_path = config.forward_index_path(root);

    let mut documents_indexed = 0usize;
    for doc in &extracted {
        let title_ids = intern_section(&mut lexicon, &doc.title, &stemmer);
        let abstract_ids = intern_section(&mut lexicon, &doc.abstract_text, &stemmer);
        let body_ids = intern_section(&mut lexicon, &doc.body_text, &stemmer);

        let mut all_ids = Vec::with_capacity(title_ids.len() + abstract_ids.len() + body_ids.len());
        all_ids.extend_from_slice(&title_ids);
        all_ids.extend_from_slice(&abstract_ids);
        all_ids.extend_from_slice(&body_ids);
        if all_ids.is_empty() {
            continue;
        }

        let mut term_freqs: HashMap<u32, u32> = HashMap::new();
        for &lemma_id in &all_ids {
            *term_freqs.entry(lemma_id).or_insert(0) += 1;
        }

        for (&lemma_id, &tf) in &term_freqs {
            let barrel_id = barrel_lookup
                .get(lemma_id)
                .unwrap_or_else(|| lemma_id % HOT_BARREL_ID);
            barrel_lookup.record_if_absent(lemma_id, barrel_id);
            cold_postings
                .entry(barrel_id)
                .or_default()
                .entry(lemma_id)
                .or_default()
                .insert(doc.doc_id.clone(), tf);
        }

        forward_index::append(
            &forward_path,
            ForwardRecord {
                doc_id: doc.doc_id.clone(),
                total_terms: all_ids.len(),
                title_lemmas: title_ids.iter().map(|id| id.to_string()).collect(),
                abstract_lemmas: abstract_ids.iter().map(|id| id.to_string()).collect(),
                body_lemmas: body_ids.iter().map(|id| id.to_string()).collect(),
            },
        )?;

        metadata.insert(
            doc.doc_id.clone(),
            DocMetadata::new(&doc.doc_id, &doc.title, Vec::new(), &doc.abstract_text),
        );

        ngram_docs.push(text::tokenize_lemmas(
            &format!("{} {}", doc.title, doc.abstract_text),
            &stemmer,
        ));
        documents_indexed += 1;
    }

    for (&barrel_id, postings) in &cold_postings {
        let bin_path = config.barrels_root(root).join(format!("barrel_{barrel_id}.bin"));
        let idx_path = config.barrels_root(root).join(format!("barrel_{barrel_id}.idx"));
        write_barrel(postings, &bin_path, &idx_path)?;
    }

    lexicon.save(&config.lexicon_path(root))?;
    lexicon.rebuild_binary_cache(&config.lexicon_bin_path(root))?;
    barrel_lookup.save(&config.barrel_lookup_path(root))?;
    metadata.save(&config.metadata_path(root))?;

    let records = forward_index::scan(&forward_path)?;
    let scores = authority::compute_scores(&records);
    authority::save(&config.doc_scores_path(root), &scores)?;

    let words_with_df: Vec<(String, u32)> = lexicon
        .iter_words()
        .filter_map(|(surface, word_id)| {
            let lemma_id = lexicon.lemma_id_of_word(word_id)?;
            let barrel_id = barrel_lookup.get(lemma_id)?;
            let df = cold_postings
                .get(&barrel_id)
                .and_then(|b| b.get(&lemma_id))
                .map(|docs| docs.len() as u32)
                .unwrap_or(1);
            Some((surface.to_string(), df))
        })
        .collect();
    let word_index = WordPrefixIndex::build(&words_with_df);
    word_index.save(&config.autocomplete_path(root))?;

    let ngram_index = NgramIndex::build(&ngram_docs);
    ngram_index.save(&config.ngram_autocomplete_path(root))?;

    if documents_indexed == 0 {
        return Err(EngineError::InputError(format!(
            "no indexable documents found under {}",
            json_dir.display()
        )));
    }

    Ok(BulkStats {
        documents_indexed,
        unique_words: lexicon.len(),
        unique_lemmas: barrel_lookup_len(&cold_postings),
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

fn barrel_lookup_len(cold_postings: &HashMap<u32, HashMap<u32, HashMap<String, u32>>>) -> usize {
    cold_postings.values().map(|m| m.len()).sum()
}

fn intern_section(lexicon: &mut Lexicon, text: &str, stemmer: &rust_stemmers::Stemmer) -> Vec<u32> {
    text::tokenize(text, stemmer)
        .into_iter()
        .filter_map(|(surface, lemma)| lexicon.intern_word(&surface, &lemma).ok().map(|(_, lid)| lid))
        .collect()
}
