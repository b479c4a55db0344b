use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::constants::EMPTY_DOC_SCORE;
use crate::error::{EngineError, Result};
use crate::forward_index::ForwardRecord;
use crate::io_util::atomic_write;

struct DocStats {
    total_terms: usize,
    unique_terms: usize,
    has_title: bool,
    has_abstract: bool,
}

/// Document authority scores, keyed by doc_id, persisted as a flat JSON
/// object. Ported from the original corpus-wide PageRank-like scorer:
/// `score = 0.4*diversity + 0.3*completeness + 0.3*length_norm`.
pub fn compute_scores(records: &[ForwardRecord]) -> HashMap<String, f32> {
    let mut stats: HashMap<String, DocStats> = HashMap::with_capacity(records.len());

    for r in records {
        let mut unique: HashSet<&str> = HashSet::new();
        unique.extend(r.title_lemmas.iter().map(|s| s.as_str()));
        unique.extend(r.abstract_lemmas.iter().map(|s| s.as_str()));
        unique.extend(r.body_lemmas.iter().map(|s| s.as_str()));
        unique.remove("");

        stats.insert(
            r.doc_id.clone(),
            DocStats {
                total_terms: r.total_terms,
                unique_terms: unique.len(),
                has_title: !r.title_lemmas.is_empty(),
                has_abstract: !r.abstract_lemmas.is_empty(),
            },
        );
    }

    let total_terms_list: Vec<usize> = stats
        .values()
        .map(|s| s.total_terms)
        .filter(|&t| t > 0)
        .collect();

    if total_terms_list.is_empty() {
        return HashMap::new();
    }
    let avg_length = total_terms_list.iter().sum::<usize>() as f32 / total_terms_list.len() as f32;

    let mut scores = HashMap::with_capacity(stats.len());
    for (doc_id, s) in &stats {
        if s.total_terms == 0 {
            scores.insert(doc_id.clone(), EMPTY_DOC_SCORE);
            continue;
        }

        let diversity = (s.unique_terms as f32 / s.total_terms.max(1) as f32).min(1.0);

        let mut completeness = 0.5;
        if s.has_title {
            completeness += 0.25;
        }
        if s.has_abstract {
            completeness += 0.25;
        }

        let length_norm = (1.0 / (1.0 + 0.5 * (s.total_terms as f32 / avg_length - 1.0)))
            .clamp(0.5, 1.5);

        let score = 0.4 * diversity + 0.3 * completeness + 0.3 * length_norm;
        scores.insert(doc_id.clone(), round4(score));
    }
    scores
}

fn round4(v: f32) -> f32 {
    (v * 10_000.0).round() / 10_000.0
}

pub fn save(path: &Path, scores: &HashMap<String, f32>) -> Result<()> {
    let json = serde_json::to_vec(scores).map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
    atomic_write(path, &json)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<HashMap<String, f32>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| EngineError::CorruptIndex(format!("doc_scores.json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(doc_id: &str, total: usize, title: &[&str], abs: &[&str], body: &[&str]) -> ForwardRecord {
        ForwardRecord {
            doc_id: doc_id.to_string(),
            total_terms: total,
            title_lemmas: title.iter().map(|s| s.to_string()).collect(),
            abstract_lemmas: abs.iter().map(|s| s.to_string()).collect(),
            body_lemmas: body.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn zero_term_doc_gets_empty_score() {
        let records = vec![rec("DOC_A", 0, &[], &[], &[])];
        let scores = compute_scores(&records);
        assert_eq!(scores["DOC_A"], EMPTY_DOC_SCORE);
    }

    #[test]
    fn title_and_abstract_raise_completeness() {
        let records = vec![
            rec("DOC_BARE", 10, &[], &[], &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]),
            rec(
                "DOC_FULL",
                10,
                &["a"],
                &["b"],
                &["c", "d", "e", "f", "g", "h", "i", "j"],
            ),
        ];
        let scores = compute_scores(&records);
        assert!(scores["DOC_FULL"] > scores["DOC_BARE"]);
    }

    #[test]
    fn scores_are_rounded_to_four_decimals() {
        let records = vec![rec("DOC_A", 7, &["a"], &["b"], &["c", "d", "e"])];
        let scores = compute_scores(&records);
        let s = scores["DOC_A"];
        assert_eq!(round4(s), s);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_scores.json");
        let mut scores = HashMap::new();
        scores.insert("DOC_A".to_string(), 0.7123);
        save(&path, &scores).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded["DOC_A"], 0.7123);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let scores = load(&dir.path().join("nope.json")).unwrap();
        assert!(scores.is_empty());
    }
}
