use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::constants::{DEFAULT_SEMANTIC_NEIGHBORS, DEFAULT_SEMANTIC_THRESHOLD};
use crate::error::{EngineError, Result};
use crate::io_util::{read_f32, read_u32};

/// L2-normalized word vectors: `[num_words:4][dim:4][vectors f32 …]`,
/// paired with a `word -> row index` vocabulary. Vectors are normalized at
/// build time so cosine similarity reduces to a dot product at query time.
pub struct Embeddings {
    vocab: HashMap<String, u32>,
    dim: usize,
    vectors: Vec<f32>, // row-major, len == vocab.len() * dim
}

impl Embeddings {
    pub fn load(bin_path: &Path, vocab_path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(vocab_path)?;
        let vocab: HashMap<String, u32> = serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("vocab.json: {e}")))?;

        let bytes = std::fs::read(bin_path)?;
        let mut r = Cursor::new(&bytes);
        let num_words = read_u32(&mut r).map_err(bin_corrupt)? as usize;
        let dim = read_u32(&mut r).map_err(bin_corrupt)? as usize;

        let mut vectors = Vec::with_capacity(num_words * dim);
        for _ in 0..num_words * dim {
            vectors.push(read_f32(&mut r).map_err(bin_corrupt)?);
        }

        if vocab.values().any(|&idx| idx as usize >= num_words) {
            return Err(EngineError::CorruptIndex(
                "vocab.json references a row past embeddings.bin".into(),
            ));
        }

        Ok(Embeddings {
            vocab,
            dim,
            vectors,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    fn row(&self, idx: u32) -> &[f32] {
        let start = idx as usize * self.dim;
        &self.vectors[start..start + self.dim]
    }

    fn cosine(&self, a: u32, b: u32) -> f32 {
        // Both rows are pre-normalized at build time, so the dot product
        // alone is the cosine similarity.
        self.row(a).iter().zip(self.row(b)).map(|(x, y)| x * y).sum()
    }

    /// Expand `lemma` to up to `k` semantically related lemmas whose cosine
    /// similarity clears `threshold`, most similar first. Words absent from
    /// the embedding vocabulary expand to nothing — not an error.
    pub fn expand(&self, lemma: &str, k: usize, threshold: f32) -> Vec<(String, f32)> {
        let Some(&origin) = self.vocab.get(lemma) else {
            return Vec::new();
        };

        let mut scored: Vec<(String, f32)> = self
            .vocab
            .iter()
            .filter(|(_, &idx)| idx != origin)
            .map(|(word, &idx)| (word.clone(), self.cosine(origin, idx)))
            .filter(|(_, sim)| *sim >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn expand_default(&self, lemma: &str) -> Vec<(String, f32)> {
        self.expand(lemma, DEFAULT_SEMANTIC_NEIGHBORS, DEFAULT_SEMANTIC_THRESHOLD)
    }

    /// Nearest neighbors of `lemma` for the `/similar` surface, independent
    /// of the expansion threshold used during query-time scoring.
    pub fn nearest(&self, lemma: &str, k: usize) -> Vec<(String, f32)> {
        self.expand(lemma, k, f32::MIN)
    }
}

fn bin_corrupt(e: std::io::Error) -> EngineError {
    EngineError::CorruptIndex(format!("embeddings.bin: {e}"))
}
