use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Result;

/// Path layout, mirroring the original `config.json` table. Everything is
/// relative to `root` unless already absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub indexes_dir: String,
    pub barrels_dir: String,
    pub barrels_binary_dir: String,
    pub lexicon_file: String,
    pub forward_index_file: String,
    pub barrel_lookup: String,
    pub json_data: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: "data".into(),
            indexes_dir: "indexes".into(),
            barrels_dir: "barrels".into(),
            barrels_binary_dir: "barrels_binary".into(),
            lexicon_file: LEXICON_FILE.into(),
            forward_index_file: FORWARD_INDEX_FILE.into(),
            barrel_lookup: BARREL_LOOKUP_FILE.into(),
            json_data: "pmc-json".into(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults if the file is absent.
    /// A present-but-malformed file is a hard error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config.json found, using defaults");
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&text)
            .map_err(|e| crate::error::EngineError::CorruptIndex(format!("config.json: {e}")))?;
        Ok(cfg)
    }

    pub fn indexes_root(&self, root: &Path) -> PathBuf {
        root.join(&self.indexes_dir)
    }

    pub fn barrels_root(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(&self.barrels_dir)
    }

    pub fn lexicon_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(&self.lexicon_file)
    }

    pub fn barrel_lookup_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(&self.barrel_lookup)
    }

    pub fn forward_index_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(&self.forward_index_file)
    }

    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(DOC_METADATA_FILE)
    }

    pub fn lexicon_bin_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(LEXICON_BIN_FILE)
    }

    pub fn embeddings_bin_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(EMBEDDINGS_BIN_FILE)
    }

    pub fn vocab_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(VOCAB_FILE)
    }

    pub fn autocomplete_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(AUTOCOMPLETE_FILE)
    }

    pub fn ngram_autocomplete_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(NGRAM_AUTOCOMPLETE_FILE)
    }

    pub fn doc_scores_path(&self, root: &Path) -> PathBuf {
        self.indexes_root(root).join(DOC_SCORES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_relative_layout() {
        let cfg = Config::default();
        let root = Path::new("/tmp/nonexistent-root");
        assert_eq!(cfg.indexes_root(root), root.join("indexes"));
        assert_eq!(
            cfg.barrels_root(root),
            root.join("indexes").join("barrels")
        );
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let cfg = Config::load(Path::new("/tmp/definitely-not-a-config.json")).unwrap();
        assert_eq!(cfg.lexicon_file, LEXICON_FILE);
    }
}
