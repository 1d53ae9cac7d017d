//! All engine logic independent of how it is run.
//!
//! Two in-memory vector indexes over text chunks: [`VectorStore`] scans with
//! raw cosine similarity, [`NormalizedStore`] keeps unit vectors and can be
//! saved to a directory. [`Retriever`] turns a question into ranked passages
//! through any [`Embedder`].

pub mod app_data;
pub mod chunks;
pub mod config;
pub mod index;
pub mod normalized;
pub mod ollama;
pub mod persist;
pub mod provider;
pub mod record;
pub mod retrieve;
pub mod similarity;
pub mod store;

pub use app_data::{app_data_dir, default_index_dir};
pub use chunks::{read_chunks, Chunk, ChunkError};
pub use config::{load_config, save_config, set_index_dir, Config, ConfigError};
pub use index::{index_chunks, index_file, IndexError};
pub use normalized::{Entry, NormalizedStore};
pub use ollama::{OllamaClient, OllamaError};
pub use provider::{Embedder, Generator, ProviderError};
pub use record::{DocId, Document, MetaValue, Metadata};
pub use retrieve::{build_context, RetrieveError, Retrieved, Retriever, NO_RESULTS};
pub use similarity::cosine_similarity;
pub use store::{SearchHit, SimilarityIndex, StoreError, VectorStore};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "ragvec-core ready"
}
