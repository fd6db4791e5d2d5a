//! Vector store for the viral technique library.
//!
//! The retrieval subagent only needs three operations ([`VectorStore`]):
//! upsert a document, query by text, count documents. The bundled
//! [`InMemoryVectorStore`] embeds with [`HashEmbedder`] and can persist its
//! documents as JSON between runs.

pub mod embeddings;
pub mod memory;
pub mod techniques;

pub use embeddings::{cosine_similarity, HashEmbedder};
pub use memory::{InMemoryVectorStore, LibraryStats};
pub use techniques::{seed_techniques, starter_library, ViralTechnique};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VectorStoreError;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub document: String,
    pub metadata: Map<String, Value>,
    /// Similarity in `[0, 1]`, higher is closer.
    pub similarity: f64,
}

/// Embedding-backed nearest-neighbour text search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the document stored under `id`.
    async fn upsert(
        &self,
        document: &str,
        id: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), VectorStoreError>;

    /// Up to `top_k` documents ordered by descending similarity.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize, VectorStoreError>;
}
