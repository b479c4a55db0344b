use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_ABSTRACT_CHARS, MAX_TITLE_CHARS};
use crate::error::{EngineError, Result};
use crate::io_util::atomic_write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl DocMetadata {
    pub fn new(doc_id: &str, title: &str, authors: Vec<String>, abstract_text: &str) -> Self {
        let title = if title.is_empty() {
            format!("Document {doc_id}")
        } else {
            truncate_chars(title, MAX_TITLE_CHARS)
        };
        DocMetadata {
            title,
            authors,
            abstract_text: truncate_chars(abstract_text, MAX_ABSTRACT_CHARS),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// `doc_id -> DocMetadata`, persisted as one JSON object (`document_metadata.json`).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Metadata {
    docs: HashMap<String, DocMetadata>,
}

impl Metadata {
    pub fn get(&self, doc_id: &str) -> Option<&DocMetadata> {
        self.docs.get(doc_id)
    }

    pub fn insert(&mut self, doc_id: String, meta: DocMetadata) {
        self.docs.insert(doc_id, meta);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
        atomic_write(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Metadata::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("document_metadata.json: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_falls_back_to_doc_id() {
        let m = DocMetadata::new("DOC_A", "", vec![], "");
        assert_eq!(m.title, "Document DOC_A");
    }

    #[test]
    fn title_and_abstract_are_truncated() {
        let long = "x".repeat(2_000);
        let m = DocMetadata::new("DOC_A", &long, vec![], &long);
        assert_eq!(m.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(m.abstract_text.chars().count(), MAX_ABSTRACT_CHARS);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("document_metadata.json");
        let mut meta = Metadata::default();
        meta.insert(
            "DOC_A".to_string(),
            DocMetadata::new("DOC_A", "Title", vec!["A. Author".into()], "Abstract"),
        );
        meta.save(&path).unwrap();
        let loaded = Metadata::load(&path).unwrap();
        assert_eq!(loaded.get("DOC_A").unwrap().title, "Title");
    }
}
