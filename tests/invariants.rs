//! Cross-module invariants that don't belong to any single unit: every
//! lemma recorded in a forward-index entry must be retrievable as a
//! posting for that document, a just-indexed document is immediately
//! findable by any of its own terms, and the indexer's input-validation
//! boundary (malformed doc_ids) is enforced at the `Engine` level, not
//! just deep in `forward_index::validate_doc_id`.

use std::sync::Arc;

use scholar_search::barrel::{BarrelLookup, BarrelStore};
use scholar_search::config::Config;
use scholar_search::forward_index;
use scholar_search::indexer::Indexer;
use scholar_search::lexicon::Lexicon;
use scholar_search::metadata::Metadata;
use scholar_search::query::{QueryMode, RankWeights};
use scholar_search::Engine;

fn fresh_engine() -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path().to_path_buf()).unwrap();
    (dir, engine)
}

#[tokio::test]
async fn every_lemma_in_the_forward_index_has_a_matching_posting() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    std::fs::create_dir_all(config.barrels_root(dir.path())).unwrap();
    let barrels = Arc::new(BarrelStore::open(&config.barrels_root(dir.path()), BarrelLookup::default()).unwrap());
    let indexer = Indexer::new(dir.path().to_path_buf(), config.clone(), Lexicon::new(), barrels, Metadata::default());

    indexer
        .index_document(
            Some("DOC_ONE".to_string()),
            "Immune Response",
            "",
            "Vaccines trigger an immune response in the body.",
            vec![],
        )
        .await
        .unwrap();

    let records = forward_index::scan(&config.forward_index_path(dir.path())).unwrap();
    let record = records.iter().find(|r| r.doc_id == "DOC_ONE").unwrap();

    for lemma_str in record.body_lemmas.iter().chain(record.title_lemmas.iter()) {
        let lemma_id: u32 = lemma_str.parse().unwrap();
        let (_, postings) = indexer.barrels().read_postings(lemma_id).unwrap().unwrap();
        assert!(
            postings.iter().any(|(doc_id, _)| doc_id == "DOC_ONE"),
            "lemma {lemma_id} from the forward index has no posting for DOC_ONE"
        );
    }
}

#[tokio::test]
async fn a_just_indexed_document_is_findable_by_every_one_of_its_own_terms() {
    let (_dir, engine) = fresh_engine();
    engine
        .index_document(
            Some("DOC_FRESH".to_string()),
            "Quantum Entanglement Experiment",
            "Researchers demonstrate long distance quantum entanglement.",
            "The experiment used photon pairs to verify entanglement survives transmission.",
            vec![],
        )
        .await
        .unwrap();

    for term in ["quantum", "entanglement", "photon", "transmission"] {
        let hits = engine
            .search(term, QueryMode::Or, RankWeights::default(), 10, true)
            .unwrap();
        assert!(
            hits.iter().any(|h| h.doc_id == "DOC_FRESH"),
            "term '{term}' should retrieve the document that contains it"
        );
    }
}

#[tokio::test]
async fn doc_id_containing_the_forward_index_delimiter_is_rejected() {
    let (_dir, engine) = fresh_engine();
    let result = engine
        .index_document(
            Some("DOC|BAD".to_string()),
            "Title",
            "",
            "Some body text here.",
            vec![],
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn reindexing_the_same_doc_id_does_not_inflate_document_frequency() {
    let (_dir, engine) = fresh_engine();
    for _ in 0..3 {
        engine
            .index_document(
                Some("DOC_REPEAT".to_string()),
                "Repeated Submission",
                "",
                "The same manuscript submitted three times.",
                vec![],
            )
            .await
            .unwrap();
    }

    let hits = engine
        .search("manuscript", QueryMode::Or, RankWeights::default(), 10, true)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "DOC_REPEAT");
}

#[tokio::test]
async fn empty_document_is_rejected_through_the_engine() {
    let (_dir, engine) = fresh_engine();
    let result = engine
        .index_document(Some("DOC_EMPTY".to_string()), "", "", "", vec![])
        .await;
    assert!(result.is_err());
}
