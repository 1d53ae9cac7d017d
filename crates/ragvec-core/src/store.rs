//! In-memory exact vector store: linear scan with cosine similarity computed
//! at query time. Nothing is normalized at rest.
//!
//! Also home of [`SimilarityIndex`], the capability both stores implement, and
//! [`StoreError`], shared by every store and by persistence.

use std::path::PathBuf;

use crate::record::{DocId, Document, Metadata};
use crate::similarity::cosine_similarity;

/// One search result. Borrows text and metadata from the store it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub id: DocId,
    pub text: &'a str,
    pub metadata: &'a Metadata,
    pub score: f32,
}

/// What both stores offer: append-only insertion and top-k similarity search.
pub trait SimilarityIndex {
    /// Fixed vector length, or `None` until the first insert decides it.
    fn dimension(&self) -> Option<usize>;

    /// Appends one record and returns its id.
    fn add(
        &mut self,
        text: String,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<DocId, StoreError>;

    /// Appends records in order. `metadatas` may be shorter than `texts`; missing
    /// entries become empty maps. The whole batch is validated before anything
    /// is stored.
    fn add_batch(
        &mut self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<DocId>, StoreError>;

    /// Up to `top_k` records ranked by descending similarity to `query`.
    /// Equal scores keep insertion order.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<'_>>, StoreError>;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory exact store. Holds records with their raw embeddings.
#[derive(Debug, Default)]
pub struct VectorStore {
    items: Vec<Document>,
    dimension: Option<usize>,
    next_id: DocId,
}

impl VectorStore {
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

    /// Look up a record by id.
    pub fn get(&self, id: DocId) -> Option<&Document> {
        // ids are dense and start at zero since nothing is ever removed
        usize::try_from(id).ok().and_then(|i| self.items.get(i))
    }

    /// All records in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}

impl SimilarityIndex for VectorStore {
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
        let id = self.next_id;
        self.items.push(Document {
            id,
            text,
            embedding,
            metadata,
        });
        self.next_id += 1;
        Ok(id)
    }

    fn add_batch(
        &mut self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<DocId>, StoreError> {
        let dim = check_batch(self.dimension, &texts, &embeddings, &metadatas)?;
        if dim.is_some() {
            self.dimension = dim;
        }
        let mut metadatas = metadatas.into_iter();
        let mut ids = Vec::with_capacity(texts.len());
        for (text, embedding) in texts.into_iter().zip(embeddings) {
            let id = self.next_id;
            self.items.push(Document {
                id,
                text,
                embedding,
                metadata: metadatas.next().unwrap_or_default(),
            });
            self.next_id += 1;
            ids.push(id);
        }
        tracing::debug!(added = ids.len(), total = self.items.len(), "exact store batch insert");
        Ok(ids)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<'_>>, StoreError> {
        if self.items.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        check_query(self.dimension, query)?;
        let scored = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, doc)| (pos, cosine_similarity(query, &doc.embedding)));
        Ok(rank(scored, top_k)
            .into_iter()
            .map(|(pos, score)| {
                let doc = &self.items[pos];
                SearchHit {
                    id: doc.id,
                    text: &doc.text,
                    metadata: &doc.metadata,
                    score,
                }
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Sorts `(position, score)` pairs by descending score and keeps the first
/// `top_k`. The sort is stable, so ties stay in ascending position order.
pub(crate) fn rank(scored: impl Iterator<Item = (usize, f32)>, top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = scored.collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

/// Checks a vector to be stored against the index dimension. Returns the
/// dimension the index has after accepting it.
pub(crate) fn check_embedding(
    dimension: Option<usize>,
    embedding: &[f32],
) -> Result<usize, StoreError> {
    if embedding.is_empty() {
        return Err(StoreError::EmptyEmbedding);
    }
    if let Some(expected) = dimension {
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
    }
    check_finite(embedding)?;
    Ok(embedding.len())
}

/// Checks a query vector. Only called when the index holds records, so the
/// dimension is known.
pub(crate) fn check_query(dimension: Option<usize>, query: &[f32]) -> Result<(), StoreError> {
    if let Some(expected) = dimension {
        if query.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
    }
    check_finite(query)
}

/// Validates a whole batch up front. Returns the dimension the index has after
/// accepting it (`None` only for an empty batch into an undecided index).
pub(crate) fn check_batch(
    dimension: Option<usize>,
    texts: &[String],
    embeddings: &[Vec<f32>],
    metadatas: &[Metadata],
) -> Result<Option<usize>, StoreError> {
    if texts.len() != embeddings.len() {
        return Err(StoreError::BatchLength {
            what: "embeddings",
            expected: texts.len(),
            actual: embeddings.len(),
        });
    }
    if metadatas.len() > texts.len() {
        return Err(StoreError::BatchLength {
            what: "metadatas",
            expected: texts.len(),
            actual: metadatas.len(),
        });
    }
    let mut dim = dimension;
    for embedding in embeddings {
        dim = Some(check_embedding(dim, embedding)?);
    }
    Ok(dim)
}

fn check_finite(v: &[f32]) -> Result<(), StoreError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(position) => Err(StoreError::NonFinite { position }),
        None => Ok(()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding is empty")]
    EmptyEmbedding,
    #[error("embedding has a non-finite value at position {position}")]
    NonFinite { position: usize },
    #[error("batch has {actual} {what} for {expected} texts")]
    BatchLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("index artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("io error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode vectors: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode vectors: {0}")]
    Decode(#[source] bincode::Error),
    #[error("document sidecar error: {0}")]
    Sidecar(#[from] serde_json::Error),
    #[error("corrupt index: {0}")]
    Corrupt(String),
}
