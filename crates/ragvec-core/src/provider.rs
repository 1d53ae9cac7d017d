//! Capabilities the engine needs from outside: turning text into vectors and
//! turning (question, context) into an answer. Anything implementing these
//! traits can back a [`crate::retrieve::Retriever`].

use async_trait::async_trait;

use crate::ollama::OllamaError;

/// Produces embeddings. Every call for one index must return vectors of the
/// same length.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// One embedding per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Answers a question from an assembled context block.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Ollama(#[from] OllamaError),
    #[error("provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("provider returned an empty response")]
    EmptyResponse,
}
