//! Chunks as handed over by an external chunker: ordered text spans with a
//! source reference. Read from JSON Lines, one chunk object per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::{MetaValue, Metadata};

/// A chunk of text from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Document the chunk came from (file name, URL, ...).
    pub source: String,
    /// Page number, when the source has pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Index of this chunk within its source (0, 1, 2, …).
    #[serde(default)]
    pub index: u32,
}

impl Chunk {
    /// Metadata stored alongside the chunk's vector: `source`, `chunk`, and
    /// `page` when known.
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("source".into(), MetaValue::from(self.source.as_str()));
        meta.insert("chunk".into(), MetaValue::from(self.index));
        if let Some(page) = self.page {
            meta.insert("page".into(), MetaValue::from(page));
        }
        meta
    }
}

/// Reads chunks from a JSON Lines file. Blank lines are skipped.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>, ChunkError> {
    let file = File::open(path).map_err(|e| ChunkError::Read(path.to_path_buf(), e))?;
    let mut chunks = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ChunkError::Read(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk = serde_json::from_str(&line).map_err(|e| ChunkError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source: e,
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{}:{line}: invalid chunk: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"P1","source":"a.pdf","page":1,"index":0}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text":"P2","source":"notes.md"}}"#).unwrap();
        let chunks = read_chunks(file.path()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].text, "P2");
        assert_eq!(chunks[1].page, None);
        assert_eq!(chunks[1].index, 0);
    }

    #[test]
    fn reports_bad_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"ok","source":"a"}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        let err = read_chunks(file.path()).unwrap_err();
        assert!(matches!(err, ChunkError::Parse { line: 2, .. }));
    }

    #[test]
    fn metadata_skips_unknown_page() {
        let chunk = Chunk {
            text: "x".into(),
            source: "notes.md".into(),
            page: None,
            index: 2,
        };
        let meta = chunk.metadata();
        assert_eq!(meta["source"], MetaValue::from("notes.md"));
        assert_eq!(meta["chunk"], MetaValue::Int(2));
        assert!(!meta.contains_key("page"));
    }
}
