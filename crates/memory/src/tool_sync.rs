//! Tool-index synchronization.
//!
//! Reconciles the live tool set against the persisted procedural
//! collection. Identity is the description string: renaming a tool without
//! touching its description is a no-op, editing a description retires the
//! old record and indexes a new one. Safe to call repeatedly; an unchanged
//! tool set produces no writes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use mindloop_core::error::MemoryError;
use mindloop_core::tool::ToolRegistry;
use mindloop_core::vector::{Tier, VectorStore};

/// What one sync pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub deleted: usize,
}

/// Reconciles tools against the procedural embedding index.
pub struct ToolIndexSynchronizer {
    vectors: Arc<dyn VectorStore>,
}

impl ToolIndexSynchronizer {
    pub fn new(vectors: Arc<dyn VectorStore>) -> Self {
        Self { vectors }
    }

    /// Bring the procedural collection in line with `tools`.
    ///
    /// New descriptions are embedded and upserted in one batch; stale
    /// records are removed in one batched delete, not one round-trip per
    /// tool.
    pub async fn sync(&self, tools: &ToolRegistry) -> Result<SyncReport, MemoryError> {
        let collection = Tier::Procedural.collection();
        let persisted = self.vectors.list_all(collection).await?;

        let persisted_descriptions: HashSet<&str> =
            persisted.iter().map(|p| p.page_content.as_str()).collect();

        // Live tools whose description the index has never seen.
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();
        for tool in tools.iter() {
            if persisted_descriptions.contains(tool.description()) {
                continue;
            }
            info!(tool = tool.name(), "newly embedded tool: {}", tool.description());
            texts.push(tool.description().to_string());
            metadatas.push(tool_metadata(tool.name(), tool.docstring()));
        }
        let added = texts.len();
        if !texts.is_empty() {
            self.vectors.upsert(collection, texts, metadatas).await?;
        }

        // Persisted records no loaded tool claims anymore.
        let live_descriptions: HashSet<&str> = tools.descriptions().into_iter().collect();
        let stale: Vec<String> = persisted
            .iter()
            .filter(|p| !live_descriptions.contains(p.page_content.as_str()))
            .map(|p| {
                info!("deleting embedded tool: {}", p.page_content);
                p.id.clone()
            })
            .collect();
        let deleted = stale.len();
        if !stale.is_empty() {
            self.vectors.delete(collection, &stale).await?;
        }

        Ok(SyncReport { added, deleted })
    }
}

fn tool_metadata(name: &str, docstring: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".into(), Value::String("tool".into()));
    metadata.insert("when".into(), Value::String(Utc::now().to_rfc3339()));
    metadata.insert("name".into(), Value::String(name.into()));
    metadata.insert("docstring".into(), Value::String(docstring.into()));
    metadata
}
