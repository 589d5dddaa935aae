//! Vector store contract — the abstraction over similarity-search storage.
//!
//! Long-term memory lives in three named collections, one per [`Tier`].
//! The storage engine itself (qdrant, sqlite-vec, an in-memory reference
//! implementation, ...) is an external collaborator; this module only fixes
//! the capability surface the pipeline needs: query-by-similarity, upsert,
//! batched delete, and a full scan for reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VectorStoreError;

/// The three semantic memory tiers.
///
/// `ALL` fixes the canonical ordering (episodic, declarative, procedural);
/// recall results are always written back in this order so downstream
/// consumers can rely on slot identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// User-specific past exchanges.
    Episodic,
    /// Ingested documents and shared knowledge.
    Declarative,
    /// Embedded tool descriptions for semantic tool selection.
    Procedural,
}

impl Tier {
    /// Canonical tier order. Do not reorder: the recall engine zips per-tier
    /// hook results against this sequence.
    pub const ALL: [Tier; 3] = [Tier::Episodic, Tier::Declarative, Tier::Procedural];

    /// The vector-store collection name backing this tier.
    pub fn collection(&self) -> &'static str {
        match self {
            Tier::Episodic => "episodic",
            Tier::Declarative => "declarative",
            Tier::Procedural => "procedural",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// A retrievable document: text plus free-form metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }
}

/// A single similarity-search result: (document, score, distance, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub document: Document,

    /// Relevance in [0, 1], higher is better.
    pub score: f32,

    /// Raw distance as reported by the storage engine.
    pub distance: f32,

    /// Vector-store point id.
    pub id: String,
}

/// A persisted point, as returned by a full collection scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: String,
    pub page_content: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Exact-match metadata filter: every listed key must be present with the
/// listed value for a point to pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter(pub Map<String, Value>);

impl MetadataFilter {
    /// Restrict to points whose `source` metadata equals `source`.
    pub fn by_source(source: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("source".into(), Value::String(source.into()));
        Self(map)
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.0.iter().all(|(k, v)| metadata.get(k) == Some(v))
    }
}

/// Per-tier, per-request retrieval parameters.
///
/// Built once per tier with the shared query embedding, then handed to the
/// tier's customization hook, which may swap any field — including the
/// vector, though hooks are expected to reuse the already-computed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Query embedding. Computed once per request and shared across tiers.
    pub embedding: Vec<f32>,

    /// Maximum number of results.
    pub k: usize,

    /// Minimum similarity score for a hit to be returned.
    pub threshold: f32,

    /// Optional metadata restriction (episodic defaults to the requesting
    /// user; declarative and procedural default to none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
}

/// The vector store capability consumed by the memory system.
///
/// All operations are scoped by collection name (see [`Tier::collection`]).
/// Each call is an independent, immediately-committed operation; no
/// cross-request transaction boundary exists.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity search: up to `config.k` hits at or above
    /// `config.threshold`, ordered by descending score, filtered by
    /// `config.filter` when present.
    async fn query(
        &self,
        collection: &str,
        config: &RecallConfig,
    ) -> std::result::Result<Vec<MemoryHit>, VectorStoreError>;

    /// Embed and store the given texts with their metadata. Returns the new
    /// point ids, one per text.
    async fn upsert(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
    ) -> std::result::Result<Vec<String>, VectorStoreError>;

    /// Delete the given point ids in one batch.
    async fn delete(
        &self,
        collection: &str,
        ids: &[String],
    ) -> std::result::Result<(), VectorStoreError>;

    /// Scan the whole collection. Used by tool-index reconciliation.
    async fn list_all(
        &self,
        collection: &str,
    ) -> std::result::Result<Vec<StoredPoint>, VectorStoreError>;
}
