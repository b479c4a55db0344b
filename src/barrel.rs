use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};

use crate::constants::{DOC_ID_BYTES, HOT_BARREL_ID};
use crate::error::{EngineError, Result};
use crate::io_util::{
    atomic_write, read_fixed, read_i64, read_u32, write_fixed, write_i64, write_u32,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub tf: u32,
}

/// `lemma_id -> barrel_id`, the global routing table. Cold-barrel
/// assignments are produced once by the bulk pipeline and never
/// overwritten; a lemma seen for the first time by the indexer is recorded
/// as belonging to the hot barrel.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BarrelLookup {
    map: HashMap<u32, u32>,
}

impl BarrelLookup {
    pub fn get(&self, lemma_id: u32) -> Option<u32> {
        self.map.get(&lemma_id).copied()
    }

    /// Record `lemma_id -> barrel_id` only if absent; cold assignments are
    /// never overwritten by the incremental path.
    pub fn record_if_absent(&mut self, lemma_id: u32, barrel_id: u32) -> bool {
        if self.map.contains_key(&lemma_id) {
            false
        } else {
            self.map.insert(lemma_id, barrel_id);
            true
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| EngineError::CorruptIndex(e.to_string()))?;
        atomic_write(path, &json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(BarrelLookup::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::CorruptIndex(format!("barrel_lookup.json: {e}")))
    }
}

/// An immutable, memory-mapped cold barrel: `barrel_b.bin` + `barrel_b.idx`.
pub struct ColdBarrel {
    mmap: Mmap,
    index: HashMap<u32, (i64, i64)>, // lemma_id -> (offset, length)
}

impl ColdBarrel {
    pub fn open(bin_path: &Path, idx_path: &Path) -> Result<Self> {
        let bin_file = File::open(bin_path)?;
        let mmap = unsafe { MmapOptions::new().map(&bin_file)? };

        let idx_bytes = std::fs::read(idx_path)?;
        let mut r = Cursor::new(&idx_bytes);
        let num_entries = read_u32(&mut r).map_err(idx_corrupt)?;
        let mut index = HashMap::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let lemma_id = read_u32(&mut r).map_err(idx_corrupt)?;
            let offset = read_i64(&mut r).map_err(idx_corrupt)?;
            let length = read_i64(&mut r).map_err(idx_corrupt)?;
            index.insert(lemma_id, (offset, length));
        }

        Ok(ColdBarrel { mmap, index })
    }

    fn slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn read_postings(&self, lemma_id: u32) -> Result<Option<Vec<(String, u32)>>> {
        let Some(&(offset, length)) = self.index.get(&lemma_id) else {
            return Ok(None);
        };
        let start = offset as usize;
        let end = start + length as usize;
        if end > self.mmap.len() {
            return Err(EngineError::CorruptIndex(
                "posting record out of bounds".into(),
            ));
        }
        let mut r = Cursor::new(&self.slice()[start..end]);
        let _lemma_id = read_u32(&mut r).map_err(idx_corrupt)?;
        let df = read_u32(&mut r).map_err(idx_corrupt)?;
        let num_docs = read_u32(&mut r).map_err(idx_corrupt)?;
        if num_docs != df {
            // df must equal the number of postings (spec invariant); a
            // mismatch indicates a corrupt record rather than a bug here.
            return Err(EngineError::CorruptIndex(format!(
                "lemma {lemma_id}: df {df} != num_docs {num_docs}"
            )));
        }
        let mut postings = Vec::with_capacity(num_docs as usize);
        for _ in 0..num_docs {
            let doc_id = read_fixed(&mut r, DOC_ID_BYTES).map_err(idx_corrupt)?;
            let tf = read_u32(&mut r).map_err(idx_corrupt)?;
            postings.push((doc_id, tf));
        }
        Ok(Some(postings))
    }
}

fn idx_corrupt(e: std::io::Error) -> EngineError {
    EngineError::CorruptIndex(format!("barrel index/postings: {e}"))
}

/// Emit a `.bin`/`.idx` pair for an arbitrary `lemma_id -> (doc_id -> tf)`
/// map, sorted by lemma_id. Shared by [`HotBarrel::flush`] and the bulk
/// pipeline's cold-barrel writer so both sides agree on one binary layout.
pub fn write_barrel(
    postings: &HashMap<u32, HashMap<String, u32>>,
    bin_path: &Path,
    idx_path: &Path,
) -> Result<()> {
    let mut bin_buf = Vec::new();
    let mut entries: Vec<(u32, i64, i64)> = Vec::with_capacity(postings.len());

    let mut lemma_ids: Vec<&u32> = postings.keys().collect();
    lemma_ids.sort();

    for &lemma_id in &lemma_ids {
        let docs = &postings[lemma_id];
        let offset = bin_buf.len() as i64;
        write_u32(&mut bin_buf, *lemma_id)?;
        write_u32(&mut bin_buf, docs.len() as u32)?;
        write_u32(&mut bin_buf, docs.len() as u32)?;
        let mut doc_ids: Vec<&String> = docs.keys().collect();
        doc_ids.sort();
        for doc_id in doc_ids {
            write_fixed(&mut bin_buf, doc_id, DOC_ID_BYTES)?;
            write_u32(&mut bin_buf, docs[doc_id])?;
        }
        let length = bin_buf.len() as i64 - offset;
        entries.push((*lemma_id, offset, length));
    }

    let mut idx_buf = Vec::new();
    write_u32(&mut idx_buf, entries.len() as u32)?;
    for (lemma_id, offset, length) in &entries {
        write_u32(&mut idx_buf, *lemma_id)?;
        write_i64(&mut idx_buf, *offset)?;
        write_i64(&mut idx_buf, *length)?;
    }

    atomic_write(bin_path, &bin_buf)?;
    atomic_write(idx_path, &idx_buf)?;
    Ok(())
}

/// The single mutable partition. Owned solely by the indexer; queries only
/// ever read through `BarrelStore::read_postings`.
#[derive(Default)]
pub struct HotBarrel {
    // lemma_id -> (df, doc_id -> tf), insertion order doesn't matter: the
    // binary mirror is rebuilt wholesale on every flush.
    postings: HashMap<u32, HashMap<String, u32>>,
}

impl HotBarrel {
    /// Idempotent per `(lemma_id, doc_id)`: re-adding the same pair
    /// overwrites `tf` rather than duplicating the posting (Open Question
    /// (b): "merge, hot wins").
    pub fn append(&mut self, lemma_id: u32, doc_id: &str, tf: u32) {
        let truncated = truncate_doc_id(doc_id);
        self.postings
            .entry(lemma_id)
            .or_default()
            .insert(truncated, tf);
    }

    pub fn get(&self, lemma_id: u32) -> Option<Vec<(String, u32)>> {
        self.postings
            .get(&lemma_id)
            .map(|m| m.iter().map(|(d, &tf)| (d.clone(), tf)).collect())
    }

    /// Serialize to the spec's binary `.bin`/`.idx` pair.
    pub fn flush(&self, bin_path: &Path, idx_path: &Path) -> Result<()> {
        write_barrel(&self.postings, bin_path, idx_path)
    }

    /// Re-initialize empty. Used when the persisted hot-barrel form is
    /// corrupt: data loss is bounded to unflushed updates.
    pub fn reset(&mut self) {
        self.postings.clear();
    }

    /// Best-effort load from a previously flushed `.bin`/`.idx` pair. A
    /// corrupt pair is tolerated: the hot barrel re-initializes empty
    /// rather than failing startup (spec §4.3 failure policy).
    pub fn load_or_empty(bin_path: &Path, idx_path: &Path) -> Self {
        match Self::try_load(bin_path, idx_path) {
            Ok(hot) => hot,
            Err(e) => {
                tracing::warn!(error = %e, "hot barrel corrupt, re-initializing empty");
                HotBarrel::default()
            }
        }
    }

    fn try_load(bin_path: &Path, idx_path: &Path) -> Result<Self> {
        if !bin_path.exists() || !idx_path.exists() {
            return Ok(HotBarrel::default());
        }
        let bin_bytes = std::fs::read(bin_path)?;
        let idx_bytes = std::fs::read(idx_path)?;
        let mut ir = Cursor::new(&idx_bytes);
        let num_entries = read_u32(&mut ir).map_err(idx_corrupt)?;

        let mut postings = HashMap::new();
        for _ in 0..num_entries {
            let lemma_id = read_u32(&mut ir).map_err(idx_corrupt)?;
            let offset = read_i64(&mut ir).map_err(idx_corrupt)? as usize;
            let _length = read_i64(&mut ir).map_err(idx_corrupt)?;

            let mut br = Cursor::new(&bin_bytes[offset..]);
            let _lemma_id = read_u32(&mut br).map_err(idx_corrupt)?;
            let df = read_u32(&mut br).map_err(idx_corrupt)?;
            let num_docs = read_u32(&mut br).map_err(idx_corrupt)?;
            let mut docs = HashMap::with_capacity(num_docs as usize);
            for _ in 0..num_docs {
                let doc_id = read_fixed(&mut br, DOC_ID_BYTES).map_err(idx_corrupt)?;
                let tf = read_u32(&mut br).map_err(idx_corrupt)?;
                docs.insert(doc_id, tf);
            }
            if docs.len() as u32 != df {
                return Err(EngineError::CorruptIndex("hot barrel df mismatch".into()));
            }
            postings.insert(lemma_id, docs);
        }
        Ok(HotBarrel { postings })
    }
}

fn truncate_doc_id(doc_id: &str) -> String {
    if doc_id.len() <= DOC_ID_BYTES {
        doc_id.to_string()
    } else {
        doc_id
            .char_indices()
            .take_while(|&(i, _)| i < DOC_ID_BYTES)
            .map(|(_, c)| c)
            .collect()
    }
}

/// Facade over the N cold barrels plus the single hot barrel.
pub struct BarrelStore {
    barrels_dir: PathBuf,
    lookup: RwLock<Arc<BarrelLookup>>,
    cold: Vec<Option<ColdBarrel>>, // index == barrel_id, sparse if a cold barrel hasn't been bulk-built yet
    hot: RwLock<HotBarrel>,
}

impl BarrelStore {
    pub fn open(barrels_dir: &Path, lookup: BarrelLookup) -> Result<Self> {
        let mut cold = Vec::new();
        for barrel_id in 0..HOT_BARREL_ID {
            let bin = barrels_dir.join(format!("barrel_{barrel_id}.bin"));
            let idx = barrels_dir.join(format!("barrel_{barrel_id}.idx"));
            if bin.exists() && idx.exists() {
                cold.push(Some(ColdBarrel::open(&bin, &idx)?));
            } else {
                cold.push(None);
            }
        }

        let hot_bin = barrels_dir.join(format!("barrel_{HOT_BARREL_ID}.bin"));
        let hot_idx = barrels_dir.join(format!("barrel_{HOT_BARREL_ID}.idx"));
        let hot = HotBarrel::load_or_empty(&hot_bin, &hot_idx);

        Ok(BarrelStore {
            barrels_dir: barrels_dir.to_path_buf(),
            lookup: RwLock::new(Arc::new(lookup)),
            cold,
            hot: RwLock::new(hot),
        })
    }

    pub fn lookup_snapshot(&self) -> Arc<BarrelLookup> {
        self.lookup.read().unwrap().clone()
    }

    pub fn publish_lookup(&self, lookup: BarrelLookup) {
        *self.lookup.write().unwrap() = Arc::new(lookup);
    }

    /// Reads the lemma's recorded cold barrel (if any) and always also
    /// reads the hot barrel, merging by doc_id with hot winning ties.
    pub fn read_postings(&self, lemma_id: u32) -> Result<Option<(u32, Vec<(String, u32)>)>> {
        let mut merged: HashMap<String, u32> = HashMap::new();

        let lookup = self.lookup_snapshot();
        if let Some(barrel_id) = lookup.get(lemma_id) {
            if barrel_id != HOT_BARREL_ID {
                if let Some(Some(cold)) = self.cold.get(barrel_id as usize) {
                    if let Some(postings) = cold.read_postings(lemma_id)? {
                        for (doc_id, tf) in postings {
                            merged.insert(doc_id, tf);
                        }
                    }
                }
            }
        }

        if let Some(hot_postings) = self.hot.read().unwrap().get(lemma_id) {
            for (doc_id, tf) in hot_postings {
                merged.insert(doc_id, tf); // hot wins on conflict
            }
        }

        if merged.is_empty() {
            return Ok(None);
        }
        let df = merged.len() as u32;
        Ok(Some((df, merged.into_iter().collect())))
    }

    /// Append a posting to the hot barrel; idempotent per `(lemma_id, doc_id)`.
    pub fn append_hot(&self, lemma_id: u32, doc_id: &str, tf: u32) {
        self.hot.write().unwrap().append(lemma_id, doc_id, tf);
    }

    pub fn flush_hot(&self) -> Result<()> {
        let bin = self.barrels_dir.join(format!("barrel_{HOT_BARREL_ID}.bin"));
        let idx = self.barrels_dir.join(format!("barrel_{HOT_BARREL_ID}.idx"));
        self.hot.read().unwrap().flush(&bin, &idx)
    }
}
