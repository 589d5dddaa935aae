//! In-memory vector store — the reference implementation.
//!
//! Backs tests and the offline CLI. Real deployments plug a proper engine in
//! behind the [`VectorStore`] trait; the semantics here (cosine scoring,
//! threshold, k, exact-match metadata filter, dimension checking) are the
//! contract every implementation is expected to honor.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use mindloop_core::error::VectorStoreError;
use mindloop_core::provider::Embedder;
use mindloop_core::vector::{Document, MemoryHit, RecallConfig, StoredPoint, VectorStore};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

struct StoredRecord {
    id: String,
    page_content: String,
    embedding: Vec<f32>,
    metadata: Map<String, Value>,
}

/// Collections held as plain vectors of records, embedded on upsert via the
/// configured embedder.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(
        &self,
        collection: &str,
        config: &RecallConfig,
    ) -> Result<Vec<MemoryHit>, VectorStoreError> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for record in records {
            if record.embedding.len() != config.embedding.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    stored: record.embedding.len(),
                    query: config.embedding.len(),
                });
            }
            if let Some(filter) = &config.filter {
                if !filter.matches(&record.metadata) {
                    continue;
                }
            }
            let score = cosine_similarity(&record.embedding, &config.embedding);
            if score >= config.threshold {
                hits.push(MemoryHit {
                    document: Document {
                        page_content: record.page_content.clone(),
                        metadata: record.metadata.clone(),
                    },
                    score,
                    distance: 1.0 - score,
                    id: record.id.clone(),
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(config.k);
        Ok(hits)
    }

    async fn upsert(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
    ) -> Result<Vec<String>, VectorStoreError> {
        if texts.len() != metadatas.len() {
            return Err(VectorStoreError::Storage(format!(
                "{} texts but {} metadatas",
                texts.len(),
                metadatas.len()
            )));
        }

        let mut ids = Vec::with_capacity(texts.len());
        let mut records = Vec::with_capacity(texts.len());
        for (text, metadata) in texts.into_iter().zip(metadatas) {
            let embedding = self
                .embedder
                .embed(&text)
                .await
                .map_err(|e| VectorStoreError::Storage(e.to_string()))?;
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            records.push(StoredRecord {
                id,
                page_content: text,
                embedding,
                metadata,
            });
        }

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        Ok(ids)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        if let Some(records) = collections.get_mut(collection) {
            records.retain(|r| !ids.contains(&r.id));
        }
        Ok(())
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<StoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|r| StoredPoint {
                        id: r.id.clone(),
                        page_content: r.page_content.clone(),
                        metadata: r.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
