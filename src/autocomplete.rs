use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTOCOMPLETE_K, NGRAM_MAX_PER_PREFIX, NGRAM_MAX_TOTAL, NGRAM_MIN_FREQ, PREFIX2_LIMIT,
    PREFIX3_LIMIT,
};
use crate::error::{EngineError, Result};
use crate::io_util::atomic_write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSuggestion {
    pub word: String,
    pub df: u32,
}

/// Multi-level (2-char / 3-char) prefix index over single words, grouped
/// and truncated by document frequency.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WordPrefixIndex {
    prefixes: HashMap<String, Vec<WordSuggestion>>,
}

impl WordPrefixIndex {
    /// `words_with_df` need not be pre-sorted or pre-filtered; alphabetic,
    /// length-2+ words are grouped by their 2- and 3-char prefixes and each
    /// group kept to the top df entries.
    pub fn build(words_with_df: &[(String, u32)]) -> Self {
        let mut groups: HashMap<String, Vec<WordSuggestion>> = HashMap::new();

        for (word, df) in words_with_df {
            let word = word.to_lowercase();
            if word.len() < 2 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            let p2: String = word.chars().take(2).collect();
            groups
                .entry(p2)
                .or_default()
                .push(WordSuggestion { word: word.clone(), df: *df });

            if word.len() >= 3 {
                let p3: String = word.chars().take(3).collect();
                groups
                    .entry(p3)
                    .or_default()
                    .push(WordSuggestion { word: word.clone(), df: *df });
            }
        }

        for (prefix, entries) in groups.iter_mut() {
            entries.sort_by(|a, b| b.df.cmp(&a.df));
            let limit = if prefix.len() == 2 { PREFIX2_LIMIT } else { PREFIX3_LIMIT };
            entries.truncate(limit);
        }

        WordPrefixIndex { prefixes: groups }
    }

    /// Longer prefixes fall back to the 3-char (or 2-char) group they were
    /// built into, then filter to entries that actually start with the full
    /// prefix. Groups only exist for prefixes of length 2 or 3, so anything
    /// shorter has nothing to look up.
    pub fn suggest(&self, prefix: &str) -> Vec<WordSuggestion> {
        let group_len = if prefix.len() >= 3 { 3 } else { prefix.len() };
        if group_len < 2 {
            return Vec::new();
        }
        let key: String = prefix.chars().take(group_len).collect();
        let Some(entries) = self.prefixes.get(&key) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|s| s.word.starts_with(prefix))
            .take(AUTOCOMPLETE_K)
            .cloned()
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
        atomic_write(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(WordPrefixIndex::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("autocomplete.json: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseSuggestion {
    pub phrase: String,
    pub count: u32,
}

/// Bigram/trigram phrase autocomplete, built by a rayon map-reduce over
/// per-document token streams (mirrors the original's process-pool sharding
/// across documents, one counter pair per shard then merged).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NgramIndex {
    prefixes: HashMap<String, Vec<PhraseSuggestion>>,
}

impl NgramIndex {
    /// `docs` is one token stream per document (already tokenized/lemma'd,
    /// stopwords already removed).
    pub fn build(docs: &[Vec<String>]) -> Self {
        let (bigrams, trigrams) = docs
            .par_iter()
            .map(|tokens| count_ngrams(tokens))
            .reduce(
                || (HashMap::new(), HashMap::new()),
                |mut acc, (b, t)| {
                    merge_counts(&mut acc.0, b);
                    merge_counts(&mut acc.1, t);
                    acc
                },
            );

        let bigrams = filter_and_truncate(bigrams);
        let trigrams = filter_and_truncate(trigrams);

        let mut phrases: Vec<(String, u32)> = bigrams
            .into_iter()
            .chain(trigrams)
            .collect();
        phrases.sort_by(|a, b| b.1.cmp(&a.1));

        let mut prefixes: HashMap<String, Vec<PhraseSuggestion>> = HashMap::new();
        let mut prefix_counts: HashMap<String, usize> = HashMap::new();

        for (phrase, count) in phrases {
            let words: Vec<&str> = phrase.split(' ').collect();
            if words.is_empty() {
                continue;
            }

            for i in 2..=words[0].len() {
                let prefix: String = words[0].chars().take(i).collect();
                push_if_room(&mut prefixes, &mut prefix_counts, prefix, &phrase, count);
            }

            if words.len() > 1 {
                for i in 1..=words[1].len() {
                    let suffix: String = words[1].chars().take(i).collect();
                    let prefix = format!("{} {}", words[0], suffix);
                    push_if_room(&mut prefixes, &mut prefix_counts, prefix, &phrase, count);
                }
            }
        }

        NgramIndex { prefixes }
    }

    pub fn suggest(&self, prefix: &str) -> &[PhraseSuggestion] {
        self.prefixes
            .get(prefix)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
        atomic_write(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(NgramIndex::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("ngram_autocomplete.json: {e}")))
    }
}

fn push_if_room(
    prefixes: &mut HashMap<String, Vec<PhraseSuggestion>>,
    prefix_counts: &mut HashMap<String, usize>,
    prefix: String,
    phrase: &str,
    count: u32,
) {
    let n = prefix_counts.entry(prefix.clone()).or_insert(0);
    if *n < NGRAM_MAX_PER_PREFIX {
        prefixes
            .entry(prefix)
            .or_default()
            .push(PhraseSuggestion { phrase: phrase.to_string(), count });
        *n += 1;
    }
}

fn count_ngrams(tokens: &[String]) -> (HashMap<(String, String), u32>, HashMap<(String, String, String), u32>) {
    let mut bigrams = HashMap::new();
    let mut trigrams = HashMap::new();
    let n = tokens.len();
    if n < 2 {
        return (bigrams, trigrams);
    }
    for i in 0..n - 1 {
        *bigrams
            .entry((tokens[i].clone(), tokens[i + 1].clone()))
            .or_insert(0) += 1;
    }
    for i in 0..n.saturating_sub(2) {
        *trigrams
            .entry((tokens[i].clone(), tokens[i + 1].clone(), tokens[i + 2].clone()))
            .or_insert(0) += 1;
    }
    (bigrams, trigrams)
}

fn merge_counts<K: std::hash::Hash + Eq>(dst: &mut HashMap<K, u32>, src: HashMap<K, u32>) {
    for (k, v) in src {
        *dst.entry(k).or_insert(0) += v;
    }
}

fn filter_and_truncate<T: NgramKey>(counts: HashMap<T, u32>) -> Vec<(String, u32)> {
    let mut kept: Vec<(String, u32)> = counts
        .into_iter()
        .filter(|(_, c)| *c >= NGRAM_MIN_FREQ)
        .map(|(k, c)| (k.phrase(), c))
        .collect();
    kept.sort_by(|a, b| b.1.cmp(&a.1));
    kept.truncate(NGRAM_MAX_TOTAL);
    kept
}

trait NgramKey {
    fn phrase(&self) -> String;
}

impl NgramKey for (String, String) {
    fn phrase(&self) -> String {
        format!("{} {}", self.0, self.1)
    }
}

impl NgramKey for (String, String, String) {
    fn phrase(&self) -> String {
        format!("{} {} {}", self.0, self.1, self.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_prefix_index_groups_and_limits_by_df() {
        let words = vec![
            ("vaccine".to_string(), 100),
            ("vaccination".to_string(), 50),
            ("van".to_string(), 10),
            ("123".to_string(), 99), // rejected: not alphabetic
        ];
        let idx = WordPrefixIndex::build(&words);
        let va = idx.suggest("va");
        assert!(va.iter().any(|s| s.word == "vaccine"));
        assert!(va.iter().any(|s| s.word == "van"));
        assert!(va[0].df >= va[1].df);
        assert!(idx.suggest("12").is_empty());
    }

    #[test]
    fn ngram_index_respects_min_freq() {
        let docs: Vec<Vec<String>> = (0..10)
            .map(|_| vec!["clinical".to_string(), "trial".to_string()])
            .collect();
        let idx = NgramIndex::build(&docs);
        let suggestions = idx.suggest("cl");
        assert!(suggestions.iter().any(|s| s.phrase == "clinical trial"));
    }

    #[test]
    fn ngram_below_min_freq_is_dropped() {
        let docs = vec![vec!["rare".to_string(), "phrase".to_string()]];
        let idx = NgramIndex::build(&docs);
        assert!(idx.suggest("ra").is_empty());
    }

    #[test]
    fn save_load_roundtrip_word_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autocomplete.json");
        let idx = WordPrefixIndex::build(&[("vaccine".to_string(), 10)]);
        idx.save(&path).unwrap();
        let loaded = WordPrefixIndex::load(&path).unwrap();
        assert_eq!(loaded.suggest("va").len(), idx.suggest("va").len());
    }
}
