use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::constants::MAX_BODY_LEMMAS;
use crate::error::{EngineError, Result};

/// One line of the append-only forward index:
/// `doc_id|total_terms|title_csv|abstract_csv|body_csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRecord {
    pub doc_id: String,
    pub total_terms: usize,
    pub title_lemmas: Vec<String>,
    pub abstract_lemmas: Vec<String>,
    pub body_lemmas: Vec<String>,
}

impl ForwardRecord {
    fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.doc_id,
            self.total_terms,
            self.title_lemmas.join(","),
            self.abstract_lemmas.join(","),
            self.body_lemmas.join(","),
        )
    }

    fn parse_line(line: &str) -> Result<Self> {
        let mut parts = line.splitn(5, '|');
        let doc_id = parts
            .next()
            .ok_or_else(|| EngineError::CorruptIndex("forward index: missing doc_id".into()))?
            .to_string();
        let total_terms: usize = parts
            .next()
            .ok_or_else(|| EngineError::CorruptIndex("forward index: missing total_terms".into()))?
            .parse()
            .map_err(|_| EngineError::CorruptIndex("forward index: bad total_terms".into()))?;
        let title_lemmas = split_csv(parts.next().unwrap_or(""));
        let abstract_lemmas = split_csv(parts.next().unwrap_or(""));
        let body_lemmas = split_csv(parts.next().unwrap_or(""));
        Ok(ForwardRecord {
            doc_id,
            total_terms,
            title_lemmas,
            abstract_lemmas,
            body_lemmas,
        })
    }
}

fn split_csv(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|t| t.to_string()).collect()
    }
}

/// Validate a candidate doc_id is safe for the `|`-delimited line format
/// before it ever reaches the index. Rejects the delimiter itself and
/// embedded newlines, which would otherwise corrupt every later scan.
pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(EngineError::InputError("doc_id must not be empty".into()));
    }
    if doc_id.contains('|') || doc_id.contains('\n') || doc_id.contains('\r') {
        return Err(EngineError::InputError(
            "doc_id must not contain '|' or a newline".into(),
        ));
    }
    Ok(())
}

/// Append one record, capping the body to [`MAX_BODY_LEMMAS`] per spec.
/// A single `write_all` of the full line plus flush is the atomicity
/// boundary: under the indexer's single-writer lock no two appends ever
/// interleave.
pub fn append(path: &Path, mut record: ForwardRecord) -> Result<()> {
    validate_doc_id(&record.doc_id)?;
    if record.body_lemmas.len() > MAX_BODY_LEMMAS {
        record.body_lemmas.truncate(MAX_BODY_LEMMAS);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let line = record.to_line();
    writeln!(f, "{line}")?;
    f.flush()?;
    Ok(())
}

/// Read every record, in append order. A missing file scans as empty —
/// freshly initialized data directories have no forward index yet.
pub fn scan(path: &Path) -> Result<Vec<ForwardRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let f = std::fs::File::open(path)?;
    let reader = BufReader::new(f);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        records.push(ForwardRecord::parse_line(&line)?);
    }
    Ok(records)
}
