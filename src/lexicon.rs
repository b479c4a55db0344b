use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::NUMBER_SENTINEL_LEMMA_ID;
use crate::error::{EngineError, Result};
use crate::io_util::{atomic_write, read_str16, read_u32, write_str16, write_u32};

/// Canonical surface-word → integer-identifier mapping, plus the
/// word→lemma collapse every other subsystem relies on. Identifiers are
/// monotonic and dense: once assigned, never reused or reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    word_id: HashMap<String, u32>,
    lemma_id: HashMap<String, u32>,
    word_to_lemma: HashMap<u32, u32>,
    next_word_id: u32,
    next_lemma_id: u32,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon {
            word_id: HashMap::new(),
            lemma_id: HashMap::new(),
            word_to_lemma: HashMap::new(),
            next_word_id: 0,
            next_lemma_id: NUMBER_SENTINEL_LEMMA_ID + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.word_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_id.is_empty()
    }

    pub fn word_id_of(&self, surface: &str) -> Option<u32> {
        self.word_id.get(surface).copied()
    }

    pub fn lemma_id_of_surface(&self, lemma_surface: &str) -> Option<u32> {
        self.lemma_id.get(lemma_surface).copied()
    }

    /// Total lookup: every `word_id` has a `word_to_lemma` entry (invariant
    /// enforced by `intern_word` and checked at `load` time).
    pub fn lemma_id_of_word(&self, word_id: u32) -> Option<u32> {
        self.word_to_lemma.get(&word_id).copied()
    }

    /// Every interned surface paired with its `word_id`, for building
    /// derived artifacts (autocomplete prefix groups) that need to walk the
    /// whole vocabulary.
    pub fn iter_words(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.word_id.iter().map(|(s, &id)| (s.as_str(), id))
    }

    /// Idempotent: the first sighting of `surface` allocates fresh
    /// identifiers; subsequent calls return the existing pair. A purely
    /// numeric `surface` always collapses to the number sentinel lemma.
    pub fn intern_word(&mut self, surface: &str, lemma: &str) -> Result<(u32, u32)> {
        let surface = surface.to_lowercase();
        let is_numeric = surface.chars().all(|c| c.is_ascii_digit()) && !surface.is_empty();

        if let Some(&wid) = self.word_id.get(&surface) {
            let lid = self
                .word_to_lemma
                .get(&wid)
                .copied()
                .unwrap_or(NUMBER_SENTINEL_LEMMA_ID);
            return Ok((wid, lid));
        }

        let wid = self.next_word_id;
        self.next_word_id = self
            .next_word_id
            .checked_add(1)
            .ok_or(EngineError::LexiconFull)?;
        self.word_id.insert(surface.clone(), wid);

        let lid = if is_numeric {
            NUMBER_SENTINEL_LEMMA_ID
        } else {
            let lemma = lemma.to_lowercase();
            if let Some(&lid) = self.lemma_id.get(&lemma) {
                lid
            } else {
                let lid = self.next_lemma_id;
                self.next_lemma_id = self
                    .next_lemma_id
                    .checked_add(1)
                    .ok_or(EngineError::LexiconFull)?;
                self.lemma_id.insert(lemma, lid);
                lid
            }
        };

        self.word_to_lemma.insert(wid, lid);
        Ok((wid, lid))
    }

    /// Atomic replace: write to a temp file then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
        atomic_write(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let lex: Lexicon = serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("lexicon.json: {e}")))?;
        lex.validate()?;
        Ok(lex)
    }

    fn validate(&self) -> Result<()> {
        for &wid in self.word_id.values() {
            if !self.word_to_lemma.contains_key(&wid) {
                return Err(EngineError::CorruptIndex(format!(
                    "word_id {wid} has no word_to_lemma entry"
                )));
            }
        }
        Ok(())
    }

    /// Emit the sorted binary form consumed by the query engine:
    /// `[u32 count][(u16 len, bytes) …][i32 lemma_id …]`, entries sorted by
    /// surface so the reader can binary-search without parsing JSON.
    pub fn rebuild_binary_cache(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<(&str, i32)> = self
            .word_id
            .iter()
            .map(|(surface, &wid)| {
                let lemma_id = self.word_to_lemma.get(&wid).copied().unwrap_or(wid) as i32;
                (surface.as_str(), lemma_id)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut buf = Vec::new();
        write_u32(&mut buf, entries.len() as u32)?;
        for (surface, _) in &entries {
            write_str16(&mut buf, surface)?;
        }
        for (_, lemma_id) in &entries {
            buf.extend_from_slice(&lemma_id.to_le_bytes());
        }
        atomic_write(path, &buf)?;
        Ok(())
    }
}

/// Sorted binary lexicon cache, loaded read-only for query-time lookups.
pub struct BinaryLexicon {
    words: Vec<String>,
    lemma_ids: Vec<i32>,
}

impl BinaryLexicon {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut r = Cursor::new(&bytes);
        let count = read_u32(&mut r)? as usize;

        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(read_str16(&mut r).map_err(io_corrupt)?);
        }

        let mut lemma_ids = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buf = [0u8; 4];
            std::io::Read::read_exact(&mut r, &mut buf).map_err(io_corrupt)?;
            lemma_ids.push(i32::from_le_bytes(buf));
        }

        Ok(BinaryLexicon { words, lemma_ids })
    }

    /// Binary search on the sorted surface list. Absent surfaces yield
    /// `None` — not an error, per spec §4.8/§7.
    pub fn lemma_id_of(&self, surface: &str) -> Option<u32> {
        self.words
            .binary_search_by(|w| w.as_str().cmp(surface))
            .ok()
            .map(|idx| self.lemma_ids[idx] as u32)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn io_corrupt(e: io::Error) -> EngineError {
    EngineError::CorruptIndex(format!("lexicon.bin: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent_and_monotonic() {
        let mut lex = Lexicon::new();
        let (w1, l1) = lex.intern_word("vaccine", "vaccin").unwrap();
        let (w2, l2) = lex.intern_word("vaccine", "vaccin").unwrap();
        assert_eq!((w1, l1), (w2, l2));
        let (w3, _) = lex.intern_word("trial", "trial").unwrap();
        assert_ne!(w1, w3);
    }

    #[test]
    fn numeric_surface_maps_to_sentinel() {
        let mut lex = Lexicon::new();
        let (_, lid) = lex.intern_word("1984", "1984").unwrap();
        assert_eq!(lid, NUMBER_SENTINEL_LEMMA_ID);
    }

    #[test]
    fn every_word_id_has_a_lemma() {
        let mut lex = Lexicon::new();
        lex.intern_word("vaccines", "vaccin").unwrap();
        lex.intern_word("vaccine", "vaccin").unwrap();
        for &wid in lex.word_id.values() {
            assert!(lex.lemma_id_of_word(wid).is_some());
        }
    }

    #[test]
    fn save_load_roundtrip_and_binary_cache_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut lex = Lexicon::new();
        lex.intern_word("zebra", "zebra").unwrap();
        lex.intern_word("apple", "appl").unwrap();
        lex.intern_word("mango", "mango").unwrap();

        let json_path = dir.path().join("lexicon.json");
        lex.save(&json_path).unwrap();
        let loaded = Lexicon::load(&json_path).unwrap();
        assert_eq!(loaded.len(), lex.len());

        let bin_path = dir.path().join("lexicon.bin");
        lex.rebuild_binary_cache(&bin_path).unwrap();
        let bin = BinaryLexicon::load(&bin_path).unwrap();
        assert_eq!(bin.len(), 3);
        assert!(bin.lemma_id_of("apple").is_some());
        assert!(bin.lemma_id_of("nonexistent").is_none());
    }

    #[test]
    fn binary_cache_roundtrip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut lex = Lexicon::new();
        lex.intern_word("alpha", "alpha").unwrap();
        lex.intern_word("beta", "beta").unwrap();

        let path1 = dir.path().join("a.bin");
        let path2 = dir.path().join("b.bin");
        lex.rebuild_binary_cache(&path1).unwrap();
        lex.rebuild_binary_cache(&path2).unwrap();
        assert_eq!(
            std::fs::read(&path1).unwrap(),
            std::fs::read(&path2).unwrap()
        );
    }

    #[test]
    fn corrupt_word_to_lemma_gap_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        std::fs::write(
            &path,
            r#"{"word_id":{"x":0},"lemma_id":{},"word_to_lemma":{},"next_word_id":1,"next_lemma_id":10000}"#,
        )
        .unwrap();
        assert!(Lexicon::load(&path).is_err());
    }
}
