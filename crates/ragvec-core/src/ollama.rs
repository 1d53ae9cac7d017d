//! Ollama client for embeddings and answer generation. Wraps ollama-rs and
//! implements [`Embedder`] and [`Generator`].

use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;

use crate::provider::{Embedder, Generator, ProviderError};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_GENERATE_MODEL: &str = "llama3.2";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    generate_model: String,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the model used to answer questions.
    pub fn with_generate_model(mut self, model: impl Into<String>) -> Self {
        self.generate_model = model.into();
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    async fn embeddings(&self, input: EmbeddingsInput) -> Result<Vec<Vec<f32>>, OllamaError> {
        let req = GenerateEmbeddingsRequest::new(self.embed_model.clone(), input);
        let res = self.inner.generate_embeddings(req).await?;
        Ok(res.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let embeddings = self.embeddings(EmbeddingsInput::Single(text.to_string())).await?;
        embeddings.into_iter().next().ok_or(ProviderError::EmptyResponse)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(model = %self.embed_model, inputs = texts.len(), "embedding batch");
        let embeddings = self.embeddings(EmbeddingsInput::Multiple(texts.to_vec())).await?;
        if embeddings.len() != texts.len() {
            return Err(ProviderError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, question: &str, context: &str) -> Result<String, ProviderError> {
        let prompt = format!(
            "Answer the question using only the context below. \
             If the context does not contain the answer, say so.\n\n\
             Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        );
        let req = GenerationRequest::new(self.generate_model.clone(), prompt);
        let res = self.inner.generate(req).await.map_err(OllamaError::Request)?;
        Ok(res.response)
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_models() {
        let client = OllamaClient::from_url(DEFAULT_BASE_URL)
            .unwrap()
            .with_embed_model("all-minilm")
            .with_generate_model("mistral");
        assert_eq!(client.embed_model(), "all-minilm");
        assert_eq!(client.generate_model, "mistral");
    }

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(OllamaClient::from_url("not a url"), Err(OllamaError::ParseUrl(_))));
    }
}
