//! Index pipeline: chunks → embed → store.

use std::path::Path;

use crate::chunks::{read_chunks, Chunk, ChunkError};
use crate::provider::{Embedder, ProviderError};
use crate::record::{DocId, Metadata};
use crate::store::{SimilarityIndex, StoreError};

/// Embeds all chunk texts in one batch call and appends them to `index` with
/// their source metadata. Returns the ids of the new records.
pub async fn index_chunks<I, E>(
    index: &mut I,
    embedder: &E,
    chunks: &[Chunk],
) -> Result<Vec<DocId>, IndexError>
where
    I: SimilarityIndex + ?Sized,
    E: Embedder + ?Sized,
{
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != texts.len() {
        return Err(ProviderError::CountMismatch {
            expected: texts.len(),
            actual: embeddings.len(),
        }
        .into());
    }
    let metadatas: Vec<Metadata> = chunks.iter().map(Chunk::metadata).collect();

    let ids = index.add_batch(texts, embeddings, metadatas)?;
    tracing::info!(added = ids.len(), total = index.len(), "indexed chunks");
    Ok(ids)
}

/// Reads a JSON Lines chunk file and indexes it with [`index_chunks`].
pub async fn index_file<I, E>(
    index: &mut I,
    embedder: &E,
    path: &Path,
) -> Result<Vec<DocId>, IndexError>
where
    I: SimilarityIndex + ?Sized,
    E: Embedder + ?Sized,
{
    let chunks = read_chunks(path)?;
    tracing::debug!(path = %path.display(), chunks = chunks.len(), "read chunk file");
    index_chunks(index, embedder, &chunks).await
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("chunk input error: {0}")]
    Chunks(#[from] ChunkError),
    #[error("embedding error: {0}")]
    Provider(#[from] ProviderError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::normalized::NormalizedStore;
    use crate::record::MetaValue;
    use crate::store::VectorStore;

    /// Embeds by text length, so the test never needs a real model.
    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    /// Drops the last embedding of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(vec![vec![1.0]; texts.len().saturating_sub(1)])
        }
    }

    fn chunk(text: &str, page: Option<u32>, index: u32) -> Chunk {
        Chunk {
            text: text.into(),
            source: "doc.pdf".into(),
            page,
            index,
        }
    }

    #[tokio::test]
    async fn indexes_with_source_metadata() {
        let mut store = NormalizedStore::new();
        let chunks = [chunk("first", Some(1), 0), chunk("second one", Some(2), 1)];
        let ids = index_chunks(&mut store, &LengthEmbedder, &chunks).await.unwrap();
        assert_eq!(ids, [0, 1]);
        assert_eq!(store.count(), 2);
        let meta = &store.entries()[1].metadata;
        assert_eq!(meta["page"], MetaValue::Int(2));
        assert_eq!(meta["source"], MetaValue::from("doc.pdf"));
        assert_eq!(meta["chunk"], MetaValue::Int(1));
    }

    #[tokio::test]
    async fn works_with_exact_store() {
        let mut store = VectorStore::new();
        index_chunks(&mut store, &LengthEmbedder, &[chunk("abc", None, 0)]).await.unwrap();
        assert_eq!(store.documents()[0].embedding, vec![3.0, 1.0]);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let mut store = NormalizedStore::new();
        assert!(index_chunks(&mut store, &ShortEmbedder, &[]).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn indexes_a_chunk_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"one","source":"a.md","index":0}}"#).unwrap();
        writeln!(file, r#"{{"text":"three","source":"a.md","index":1}}"#).unwrap();
        let mut store = NormalizedStore::new();
        let ids = index_file(&mut store, &LengthEmbedder, file.path()).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.entries()[1].text, "three");

        let err = index_file(&mut store, &LengthEmbedder, Path::new("/no/such/chunks.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Chunks(ChunkError::Read(..))));
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn provider_count_mismatch_is_an_error() {
        let mut store = NormalizedStore::new();
        let chunks = [chunk("a", None, 0), chunk("b", None, 1)];
        let err = index_chunks(&mut store, &ShortEmbedder, &chunks).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Provider(ProviderError::CountMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(store.is_empty());
    }
}
