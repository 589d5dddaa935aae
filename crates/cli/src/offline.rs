//! Offline providers — deterministic stand-ins for real backends.
//!
//! These let the binary run with no credentials and no services: a hashing
//! embedder, an echoing model, an echoing agent, and an ingestor that
//! writes straight into the declarative collection. The embedder is not a
//! trained model and its vectors carry no semantic meaning; it exists so the
//! whole pipeline (recall included) is exercisable end to end.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use mindloop_core::agent::{AgentReply, ReasoningAgent};
use mindloop_core::error::{AgentError, IngestError, ProviderError};
use mindloop_core::ingest::DocumentStore;
use mindloop_core::provider::{Embedder, TextModel, TokenSink};
use mindloop_core::session::WorkingMemory;
use mindloop_core::vector::{Tier, VectorStore};

/// Byte-bucket hashing embedder. Deterministic, fixed-dimension, unit-norm.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "offline-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dimension];
        for (position, byte) in text.bytes().enumerate() {
            vector[(byte as usize + position) % self.dimension] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

/// A model that completes by echoing, streaming word by word.
pub struct OfflineModel;

#[async_trait]
impl TextModel for OfflineModel {
    fn name(&self) -> &str {
        "offline-echo"
    }

    async fn generate(
        &self,
        prompt: &str,
        tokens: Option<&dyn TokenSink>,
    ) -> Result<String, ProviderError> {
        if let Some(sink) = tokens {
            for word in prompt.split_whitespace() {
                sink.on_token(word);
            }
        }
        Ok(prompt.to_string())
    }
}

/// An agent that answers from working memory alone: it echoes the input and
/// reports what recall surfaced.
pub struct EchoAgent;

#[async_trait]
impl ReasoningAgent for EchoAgent {
    async fn run(&self, memory: &WorkingMemory) -> Result<AgentReply, AgentError> {
        let input = memory.current_text().unwrap_or_default().to_string();
        let episodic = memory.recalled(Tier::Episodic).len();
        let declarative = memory.recalled(Tier::Declarative).len();
        let procedural = memory.recalled(Tier::Procedural).len();

        let mut output = format!("You said: \"{input}\".");
        if episodic + declarative + procedural > 0 {
            output.push_str(&format!(
                " I recalled {episodic} episodic, {declarative} declarative and \
                 {procedural} procedural memories."
            ));
        }

        Ok(AgentReply {
            input,
            intermediate_steps: vec![],
            output,
        })
    }
}

/// Ingestion that upserts plain text directly into the declarative
/// collection, one document per call.
pub struct DeclarativeIngestor {
    vectors: Arc<dyn VectorStore>,
}

impl DeclarativeIngestor {
    pub fn new(vectors: Arc<dyn VectorStore>) -> Self {
        Self { vectors }
    }
}

#[async_trait]
impl DocumentStore for DeclarativeIngestor {
    async fn ingest(
        &self,
        text: &str,
        content_type: &str,
        source: &str,
    ) -> Result<(), IngestError> {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(source.into()));
        metadata.insert("content_type".into(), Value::String(content_type.into()));
        metadata.insert("when".into(), Value::String(Utc::now().to_rfc3339()));
        self.vectors
            .upsert(
                Tier::Declarative.collection(),
                vec![text.to_string()],
                vec![metadata],
            )
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// The one built-in tool: tells the current UTC time. Mostly here so the
/// procedural tier has something to index and recall out of the box.
pub struct ClockTool;

#[async_trait]
impl mindloop_core::tool::Tool for ClockTool {
    fn name(&self) -> &str {
        "get_the_time"
    }

    fn description(&self) -> &str {
        "Replies with the current date and time"
    }

    fn docstring(&self) -> &str {
        "Input: none. Output: the current UTC timestamp in RFC 3339 format."
    }

    async fn execute(&self, _input: &str) -> Result<String, mindloop_core::error::ToolError> {
        Ok(Utc::now().to_rfc3339())
    }
}
