//! Normalized inner-product store. Every vector is scaled to unit length on
//! insertion, so ranking by dot product equals ranking by cosine similarity.
//! Vectors live in one flat row-major buffer; text and metadata live in a
//! position-aligned list. The store can be saved to and loaded from a directory
//! (see [`crate::persist`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persist;
use crate::record::{DocId, Metadata};
use crate::similarity::{dot, normalize, normalize_in_place};
use crate::store::{
    check_batch, check_embedding, check_query, rank, SearchHit, SimilarityIndex, StoreError,
};

/// Text and metadata for one stored vector. This is what the sidecar file lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// In-memory normalized store with directory persistence.
#[derive(Debug, Default)]
pub struct NormalizedStore {
    dimension: Option<usize>,
    /// `entries.len() * dimension` unit-length (or all-zero) components.
    vectors: Vec<f32>,
    entries: Vec<Entry>,
}

impl NormalizedStore {
    /// Empty store; the dimension is taken from the first embedding added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store that only accepts vectors of length `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Loads a store previously written with [`NormalizedStore::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    pub(crate) fn from_parts(
        dimension: Option<usize>,
        vectors: Vec<f32>,
        entries: Vec<Entry>,
    ) -> Self {
        Self {
            dimension,
            vectors,
            entries,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Text and metadata of the record at `id`.
    pub fn entry(&self, id: DocId) -> Option<&Entry> {
        usize::try_from(id).ok().and_then(|i| self.entries.get(i))
    }

    /// The stored (normalized) vector of the record at `id`.
    pub fn vector(&self, id: DocId) -> Option<&[f32]> {
        let dim = self.dimension?;
        let i = usize::try_from(id).ok()?;
        self.vectors.get(i * dim..(i + 1) * dim)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Writes the store to the directory `path`, creating it if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        persist::save(self, path.as_ref())
    }

    /// Replaces the whole in-memory state with the store saved at `path`.
    /// On error the current state is left untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        *self = persist::load(path.as_ref())?;
        Ok(())
    }
}

impl SimilarityIndex for NormalizedStore {
    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn add(
        &mut self,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<DocId, StoreError> {
        let dim = check_embedding(self.dimension, &embedding)?;
        self.dimension = Some(dim);
        self.vectors.extend(normalize(&embedding));
        self.entries.push(Entry { text, metadata });
        Ok((self.entries.len() - 1) as DocId)
    }

    fn add_batch(
        &mut self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<DocId>, StoreError> {
        let Some(dim) = check_batch(self.dimension, &texts, &embeddings, &metadatas)? else {
            return Ok(Vec::new());
        };
        self.dimension = Some(dim);

        let first = self.entries.len();
        let start = self.vectors.len();
        self.vectors.reserve(embeddings.len() * dim);
        for embedding in &embeddings {
            self.vectors.extend_from_slice(embedding);
        }
        for row in self.vectors[start..].chunks_exact_mut(dim) {
            normalize_in_place(row);
        }

        let mut metadatas = metadatas.into_iter();
        self.entries.extend(texts.into_iter().map(|text| Entry {
            text,
            metadata: metadatas.next().unwrap_or_default(),
        }));
        tracing::debug!(
            added = self.entries.len() - first,
            total = self.entries.len(),
            "normalized batch insert"
        );
        Ok((first..self.entries.len()).map(|i| i as DocId).collect())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<'_>>, StoreError> {
        let Some(dim) = self.dimension else {
            return Ok(Vec::new());
        };
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        check_query(self.dimension, query)?;
        let q = normalize(query);
        let scored = self
            .vectors
            .chunks_exact(dim)
            .enumerate()
            .map(|(pos, row)| (pos, dot(&q, row)));
        Ok(rank(scored, top_k.min(self.entries.len()))
            .into_iter()
            .map(|(pos, score)| {
                let entry = &self.entries[pos];
                SearchHit {
                    id: pos as DocId,
                    text: &entry.text,
                    metadata: &entry.metadata,
                    score,
                }
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
