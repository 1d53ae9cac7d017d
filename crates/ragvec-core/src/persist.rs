//! On-disk form of a [`NormalizedStore`]: a directory holding two files.
//!
//! - `index.bin`: bincode-encoded vectors (row-major, `count * dimension`).
//! - `documents.json`: `{text, metadata}` per record, in the same order.
//!
//! Both carry the same `generation`, fresh for every save. Each file is written
//! to a temp file in the target directory and renamed into place, so a torn
//! save shows up as a generation mismatch on load instead of a mixed index.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::normalized::{Entry, NormalizedStore};
use crate::store::{SimilarityIndex, StoreError};

pub const VECTORS_FILE: &str = "index.bin";
pub const DOCUMENTS_FILE: &str = "documents.json";

const MAGIC: [u8; 6] = *b"RAGVEC";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct VectorFileRef<'a> {
    magic: [u8; 6],
    version: u32,
    generation: u64,
    dimension: u64,
    vectors: &'a [f32],
}

#[derive(Deserialize)]
struct VectorFile {
    magic: [u8; 6],
    version: u32,
    generation: u64,
    dimension: u64,
    vectors: Vec<f32>,
}

#[derive(Serialize)]
struct SidecarRef<'a> {
    version: u32,
    generation: u64,
    documents: &'a [Entry],
}

#[derive(Deserialize)]
struct Sidecar {
    version: u32,
    generation: u64,
    documents: Vec<Entry>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

fn next_generation() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos.wrapping_add(COUNTER.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn save(store: &NormalizedStore, dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let generation = next_generation();

    let vectors = codec()
        .serialize(&VectorFileRef {
            magic: MAGIC,
            version: FORMAT_VERSION,
            generation,
            dimension: store.dimension().unwrap_or(0) as u64,
            vectors: store.raw_vectors(),
        })
        .map_err(StoreError::Encode)?;
    let documents = serde_json::to_vec(&SidecarRef {
        version: FORMAT_VERSION,
        generation,
        documents: store.entries(),
    })?;

    write_atomic(dir, VECTORS_FILE, &vectors)?;
    write_atomic(dir, DOCUMENTS_FILE, &documents)?;
    tracing::info!(path = %dir.display(), records = store.count(), generation, "saved index");
    Ok(())
}

pub(crate) fn load(dir: &Path) -> Result<NormalizedStore, StoreError> {
    let vectors_path = dir.join(VECTORS_FILE);
    let documents_path = dir.join(DOCUMENTS_FILE);
    let vector_bytes = read(&vectors_path)?;
    let document_bytes = read(&documents_path)?;

    let file: VectorFile = codec()
        .with_limit(vector_bytes.len() as u64)
        .deserialize(&vector_bytes)
        .map_err(StoreError::Decode)?;
    if file.magic != MAGIC {
        return Err(StoreError::Corrupt(format!(
            "{} is not a ragvec vector file",
            vectors_path.display()
        )));
    }
    if file.version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported vector file version {}",
            file.version
        )));
    }

    let sidecar: Sidecar = serde_json::from_slice(&document_bytes)?;
    if sidecar.version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!("unsupported sidecar version {}", sidecar.version)));
    }
    if sidecar.generation != file.generation {
        return Err(StoreError::Corrupt(format!(
            "artifacts come from different saves ({} vs {})",
            file.generation, sidecar.generation
        )));
    }

    let dimension = usize::try_from(file.dimension)
        .map_err(|_| StoreError::Corrupt(format!("dimension {} out of range", file.dimension)))?;
    let count = sidecar.documents.len();
    if dimension == 0 && count > 0 {
        return Err(StoreError::Corrupt("records stored with zero dimension".into()));
    }
    let expected = count.checked_mul(dimension);
    if expected != Some(file.vectors.len()) {
        return Err(StoreError::Corrupt(format!(
            "{} vector components for {count} documents of dimension {dimension}",
            file.vectors.len()
        )));
    }
    if file.vectors.iter().any(|x| !x.is_finite()) {
        return Err(StoreError::Corrupt("non-finite vector component".into()));
    }

    tracing::info!(path = %dir.display(), records = count, dimension, "loaded index");
    let dimension = (dimension > 0).then_some(dimension);
    Ok(NormalizedStore::from_parts(dimension, file.vectors, sidecar.documents))
}

fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
    let target = dir.join(name);
    let io_err = |source| StoreError::Io {
        path: target.clone(),
        source,
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(name)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&target).map_err(|e| io_err(e.error))?;
    Ok(())
}
