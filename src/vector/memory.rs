//! In-process vector store with optional JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::embeddings::{cosine_similarity, HashEmbedder};
use super::{VectorMatch, VectorStore};
use crate::error::VectorStoreError;

/// Persisted form of one document; embeddings are recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    document: String,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(skip)]
    embedding: Array1<f64>,
}

/// Summary of the technique library.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub count: usize,
    /// Documents per `category` metadata value (`uncategorized` if absent).
    pub by_category: BTreeMap<String, usize>,
    /// Mean of numeric `effectiveness` metadata, if any document has one.
    pub avg_effectiveness: Option<f64>,
}

/// Vector store holding every document in memory.
///
/// Documents are kept in id order so equal similarities always rank the
/// same way.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    embedder: HashEmbedder,
    documents: RwLock<BTreeMap<String, StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(embedder: HashEmbedder) -> Self {
        Self {
            embedder,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Loads documents saved with [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// IO errors reading the file and JSON errors parsing it.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VectorStoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let docs: Vec<StoredDocument> = serde_json::from_str(&raw)?;

        let store = Self::new();
        {
            let mut guard = store.documents.write().await;
            for mut doc in docs {
                if doc.id.trim().is_empty() {
                    return Err(VectorStoreError::EmptyId);
                }
                doc.embedding = store.embedder.embed(&doc.document);
                guard.insert(doc.id.clone(), doc);
            }
        }
        tracing::info!(path = %path.display(), count = store.len().await, "Loaded technique library");
        Ok(store)
    }

    /// Loads from `path` if it exists, otherwise starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VectorStoreError> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "No technique library on disk, starting empty");
            Ok(Self::new())
        }
    }

    /// Writes every document as pretty JSON, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), VectorStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let docs: Vec<StoredDocument> = self.documents.read().await.values().cloned().collect();
        let json = serde_json::to_string_pretty(&docs)?;
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), count = docs.len(), "Saved technique library");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Counts by category and average effectiveness.
    pub async fn stats(&self) -> LibraryStats {
        let docs = self.documents.read().await;
        let mut by_category = BTreeMap::new();
        let mut effectiveness = Vec::new();

        for doc in docs.values() {
            let category = doc
                .metadata
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or("uncategorized");
            *by_category.entry(category.to_string()).or_insert(0) += 1;

            if let Some(score) = doc.metadata.get("effectiveness").and_then(Value::as_f64) {
                effectiveness.push(score);
            }
        }

        LibraryStats {
            count: docs.len(),
            by_category,
            avg_effectiveness: crate::scoring::mean(&effectiveness),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        document: &str,
        id: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), VectorStoreError> {
        if id.trim().is_empty() {
            return Err(VectorStoreError::EmptyId);
        }
        let doc = StoredDocument {
            id: id.to_string(),
            document: document.to_string(),
            metadata,
            embedding: self.embedder.embed(document),
        };
        self.documents.write().await.insert(id.to_string(), doc);
        tracing::debug!(id, "Upserted document");
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorMatch>, VectorStoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(text);
        let docs = self.documents.read().await;

        let mut scored = Vec::with_capacity(docs.len());
        for doc in docs.values() {
            let similarity = cosine_similarity(&query, &doc.embedding)?;
            scored.push((similarity, doc));
        }
        // Stable sort keeps id order among equal similarities.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, doc)| VectorMatch {
                id: doc.id.clone(),
                document: doc.document.clone(),
                metadata: doc.metadata.clone(),
                similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.len().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(category: &str, effectiveness: f64) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("category".into(), json!(category));
        map.insert("effectiveness".into(), json!(effectiveness));
        map
    }

    #[tokio::test]
    async fn test_upsert_and_query_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("Open loop curiosity gap retention", "loop", meta("retention", 9.0))
            .await
            .expect("upsert");
        store
            .upsert("Colour grading and lighting for b-roll", "light", meta("visual", 7.0))
            .await
            .expect("upsert");

        let hits = store.query("curiosity loop for retention", 5).await.expect("query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "loop");
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.similarity)));

        let top1 = store.query("curiosity", 1).await.expect("query");
        assert_eq!(top1.len(), 1);
        assert!(store.query("curiosity", 0).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_rejects_empty_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", "x", Map::new()).await.expect("upsert");
        store.upsert("b", "x", Map::new()).await.expect("upsert");
        assert_eq!(store.count().await.expect("count"), 1);

        let err = store.upsert("c", "  ", Map::new()).await.expect_err("empty id");
        assert!(matches!(err, VectorStoreError::EmptyId));
    }

    #[tokio::test]
    async fn test_empty_store_returns_no_matches() {
        let store = InMemoryVectorStore::new();
        assert!(store.query("anything", 8).await.expect("query").is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("library").join("techniques.json");

        let store = InMemoryVectorStore::new();
        store
            .upsert("Identity framing", "id1", meta("psychology", 8.8))
            .await
            .expect("upsert");
        store.save(&path).await.expect("save");

        let loaded = InMemoryVectorStore::load(&path).await.expect("load");
        let original = store.query("identity", 1).await.expect("query");
        let reloaded = loaded.query("identity", 1).await.expect("query");
        assert_eq!(original, reloaded);

        let missing = InMemoryVectorStore::open(dir.path().join("nope.json"))
            .await
            .expect("open");
        assert!(missing.is_empty().await);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", "1", meta("hook", 8.0)).await.expect("upsert");
        store.upsert("b", "2", meta("hook", 6.0)).await.expect("upsert");
        store.upsert("c", "3", Map::new()).await.expect("upsert");

        let stats = store.stats().await;
        assert_eq!(stats.count, 3);
        assert_eq!(stats.by_category.get("hook"), Some(&2));
        assert_eq!(stats.by_category.get("uncategorized"), Some(&1));
        assert_eq!(stats.avg_effectiveness, Some(7.0));
    }
}
