//! Query side: embed a question, search an index, and hand ranked passages
//! (optionally an answer) back to the caller.

use crate::provider::{Embedder, Generator, ProviderError};
use crate::record::Metadata;
use crate::store::{SimilarityIndex, StoreError};

/// Returned by [`Retriever::answer`] when nothing is indexed or requested.
pub const NO_RESULTS: &str = "No relevant documents found.";

/// One ranked passage: text, metadata and similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Pairs an embedder with an index for the duration of some queries.
/// Holds shared borrows only; the index cannot change while a retriever exists.
pub struct Retriever<'a, E: ?Sized, I: ?Sized> {
    embedder: &'a E,
    index: &'a I,
}

impl<'a, E, I> Retriever<'a, E, I>
where
    E: Embedder + ?Sized,
    I: SimilarityIndex + ?Sized,
{
    pub fn new(embedder: &'a E, index: &'a I) -> Self {
        Self { embedder, index }
    }

    /// Top `top_k` passages for `query`, best first. Empty when the index is
    /// empty or `top_k` is zero; the embedder is not called in that case.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Retrieved>, RetrieveError> {
        if top_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_embedding, top_k)?;
        tracing::debug!(top_k, hits = hits.len(), "retrieved");
        Ok(hits
            .into_iter()
            .map(|hit| Retrieved {
                text: hit.text.to_string(),
                metadata: hit.metadata.clone(),
                score: hit.score,
            })
            .collect())
    }

    /// Retrieves context for `question` and answers it with `generator`. Without
    /// a generator the assembled context itself is returned.
    pub async fn answer(
        &self,
        question: &str,
        top_k: usize,
        generator: Option<&dyn Generator>,
    ) -> Result<String, RetrieveError> {
        let retrieved = self.retrieve(question, top_k).await?;
        if retrieved.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }
        let context = build_context(&retrieved);
        match generator {
            Some(generator) => Ok(generator.generate(question, &context).await?),
            None => Ok(format!("Retrieved Context:\n{}\n{context}", "-".repeat(40))),
        }
    }
}

/// Joins passages into one context block, each headed by its source and page.
pub fn build_context(retrieved: &[Retrieved]) -> String {
    retrieved
        .iter()
        .map(|r| {
            let source = r.metadata.get("source").map(|v| v.to_string());
            let page = r.metadata.get("page").map(|v| v.to_string());
            format!(
                "[{}, Page {}]\n{}",
                source.as_deref().unwrap_or("unknown"),
                page.as_deref().unwrap_or("?"),
                r.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("embedding error: {0}")]
    Provider(#[from] ProviderError),
    #[error("search error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::normalized::NormalizedStore;
    use crate::record::MetaValue;
    use crate::store::VectorStore;

    /// Looks texts up in a fixed table and counts calls.
    struct TableEmbedder {
        table: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&'static str, [f32; 2])]) -> Self {
            Self {
                table: entries.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table.get(text).cloned().ok_or(ProviderError::EmptyResponse)
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, question: &str, context: &str) -> Result<String, ProviderError> {
            Ok(format!("{question} <- {}", context.lines().count()))
        }
    }

    fn page(source: &str, page: u32) -> Metadata {
        let mut m = Metadata::new();
        m.insert("source".into(), MetaValue::from(source));
        m.insert("page".into(), MetaValue::from(page));
        m
    }

    fn abc() -> NormalizedStore {
        let mut store = NormalizedStore::new();
        store
            .add_batch(
                vec!["A".into(), "B".into(), "C".into()],
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                vec![page("a.pdf", 1), page("b.pdf", 2)],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn retrieve_projects_hits_in_rank_order() {
        let store = abc();
        let embedder = TableEmbedder::new(&[("about a", [1.0, 0.0])]);
        let retriever = Retriever::new(&embedder, &store);
        let got = retriever.retrieve("about a", 2).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].text, "A");
        assert_eq!(got[0].metadata, page("a.pdf", 1));
        assert_eq!(got[1].text, "C");
        assert!(got[1].metadata.is_empty());
        assert!((got[1].score - 0.70710677).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_index_skips_the_embedder() {
        let store = VectorStore::new();
        let embedder = TableEmbedder::new(&[]);
        let retriever = Retriever::new(&embedder, &store);
        assert!(retriever.retrieve("anything", 3).await.unwrap().is_empty());
        assert_eq!(retriever.answer("anything", 3, None).await.unwrap(), NO_RESULTS);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_top_k_returns_nothing() {
        let store = abc();
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        let retriever = Retriever::new(&embedder, &store);
        assert!(retriever.retrieve("q", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_errors_surface() {
        let store = abc();
        let embedder = TableEmbedder::new(&[]);
        let retriever = Retriever::new(&embedder, &store);
        let err = retriever.retrieve("unknown", 1).await.unwrap_err();
        assert!(matches!(err, RetrieveError::Provider(ProviderError::EmptyResponse)));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_a_store_error() {
        let mut store = VectorStore::new();
        store.add("x".into(), vec![1.0, 0.0, 0.0], Metadata::new()).unwrap();
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        let err = Retriever::new(&embedder, &store).retrieve("q", 1).await.unwrap_err();
        assert!(matches!(err, RetrieveError::Store(StoreError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn answer_without_generator_returns_context() {
        let store = abc();
        let embedder = TableEmbedder::new(&[("q", [0.0, 1.0])]);
        let answer = Retriever::new(&embedder, &store).answer("q", 1, None).await.unwrap();
        assert_eq!(
            answer,
            format!("Retrieved Context:\n{}\n[b.pdf, Page 2]\nB", "-".repeat(40))
        );
    }

    #[tokio::test]
    async fn answer_with_generator() {
        let store = abc();
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        let answer = Retriever::new(&embedder, &store)
            .answer("q", 2, Some(&EchoGenerator))
            .await
            .unwrap();
        // two passages of two lines each, separated by one blank line
        assert_eq!(answer, "q <- 5");
    }

    #[test]
    fn context_defaults_missing_keys() {
        let retrieved = [Retrieved {
            text: "body".into(),
            metadata: Metadata::new(),
            score: 0.5,
        }];
        assert_eq!(build_context(&retrieved), "[unknown, Page ?]\nbody");
    }
}
