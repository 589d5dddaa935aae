//! The tiered memory-recall engine.
//!
//! One request, one embedding, three collections. The engine extracts the
//! recall query from the current message, lets hooks rewrite it, embeds it
//! once, lets per-tier hooks tune the retrieval parameters, queries all
//! tiers concurrently, and writes the results into working memory in
//! canonical tier order.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use mindloop_config::RecallSettings;
use mindloop_core::error::{HookError, MemoryError};
use mindloop_core::hook::{HookPayload, HookPoint, HookRegistry};
use mindloop_core::provider::Embedder;
use mindloop_core::session::WorkingMemory;
use mindloop_core::vector::{MetadataFilter, RecallConfig, Tier, VectorStore};

/// Recall failures, split by who should handle them.
///
/// `Memory` marks the terminal "reset your store" path; `Hook` failures are
/// extension bugs and propagate like any other hook failure.
#[derive(Debug, Error)]
pub enum RecallError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Computes per-tier retrieval parameters and runs the queries.
pub struct RecallEngine {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    hooks: Arc<dyn HookRegistry>,
    defaults: RecallSettings,
}

impl RecallEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        hooks: Arc<dyn HookRegistry>,
        defaults: RecallSettings,
    ) -> Self {
        Self {
            embedder,
            vectors,
            hooks,
            defaults,
        }
    }

    /// Default retrieval parameters for `tier`. Episodic memories are scoped
    /// to the requesting user; the other tiers are shared knowledge.
    fn default_config(&self, tier: Tier, embedding: Vec<f32>, user_id: &str) -> RecallConfig {
        RecallConfig {
            embedding,
            k: self.defaults.k,
            threshold: self.defaults.threshold,
            filter: match tier {
                Tier::Episodic => Some(MetadataFilter::by_source(user_id)),
                Tier::Declarative | Tier::Procedural => None,
            },
        }
    }

    /// Retrieve relevant memories into `memory`'s recall slots.
    ///
    /// Side-effects only the given working memory. Tier queries run
    /// concurrently, but results land in the fixed (episodic, declarative,
    /// procedural) order.
    pub async fn recall(&self, memory: &mut WorkingMemory) -> Result<(), RecallError> {
        let user_id = memory.user_id().to_string();
        let base_query = memory.current_text().unwrap_or_default().to_string();

        // Hooks may replace the query wholesale (rewriting, summarization).
        let payload = self
            .hooks
            .execute(HookPoint::RecallQuery, HookPayload::Query(base_query), memory)
            .await?;
        let query = payload.into_query(HookPoint::RecallQuery)?;
        info!(query = %query, "recall query");

        // Embed once; every tier reuses this vector unless its hook swaps it.
        let embedding = self
            .embedder
            .embed(&query)
            .await
            .map_err(MemoryError::Embedding)?;
        memory.recall_query = Some(query);
        memory.recall_embedding = Some(embedding.clone());

        self.hooks
            .execute(HookPoint::BeforeRecalls, HookPayload::None, memory)
            .await?;

        // Per-tier configs, each customized independently by its own hook.
        let episodic_cfg = self
            .tier_config(Tier::Episodic, &embedding, &user_id, memory)
            .await?;
        let declarative_cfg = self
            .tier_config(Tier::Declarative, &embedding, &user_id, memory)
            .await?;
        let procedural_cfg = self
            .tier_config(Tier::Procedural, &embedding, &user_id, memory)
            .await?;

        let (episodic, declarative, procedural) = futures::future::try_join3(
            self.vectors.query(Tier::Episodic.collection(), &episodic_cfg),
            self.vectors.query(Tier::Declarative.collection(), &declarative_cfg),
            self.vectors.query(Tier::Procedural.collection(), &procedural_cfg),
        )
        .await
        .map_err(MemoryError::Incompatible)?;

        debug!(
            episodic = episodic.len(),
            declarative = declarative.len(),
            procedural = procedural.len(),
            "recalled memories"
        );
        memory.set_recalled(Tier::Episodic, episodic);
        memory.set_recalled(Tier::Declarative, declarative);
        memory.set_recalled(Tier::Procedural, procedural);

        self.hooks
            .execute(HookPoint::AfterRecalls, HookPayload::None, memory)
            .await?;
        Ok(())
    }

    /// Build the default config for `tier` and pass it through the tier's
    /// customization hook.
    async fn tier_config(
        &self,
        tier: Tier,
        embedding: &[f32],
        user_id: &str,
        memory: &mut WorkingMemory,
    ) -> Result<RecallConfig, RecallError> {
        let point = HookPoint::for_tier(tier);
        let default = self.default_config(tier, embedding.to_vec(), user_id);
        let payload = self
            .hooks
            .execute(point, HookPayload::Recall(default), memory)
            .await?;
        Ok(payload.into_recall(point)?)
    }
}
