//! # Mindloop Core
//!
//! Domain types, traits, and error definitions for the Mindloop assistant
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model providers, vector store, hook
//! registry, document ingestion, reasoning agent) is defined as a trait
//! here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod hook;
pub mod ingest;
pub mod message;
pub mod notify;
pub mod provider;
pub mod session;
pub mod tool;
pub mod vector;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentReply, IntermediateStep, ReasoningAgent, extract_unparsable_output};
pub use error::{Error, Result};
pub use hook::{HookPayload, HookPoint, HookRegistry, LocalHookRegistry, NoopHooks};
pub use ingest::DocumentStore;
pub use message::{
    ConversationTurn, DEFAULT_USER_ID, FinalOutput, MemoryCitation, RecalledMemories,
    UserMessage, Who, Why,
};
pub use notify::{Notification, NotifyKind};
pub use provider::{Embedder, TextModel, TokenSink};
pub use session::WorkingMemory;
pub use tool::{Tool, ToolRegistry};
pub use vector::{Document, MemoryHit, MetadataFilter, RecallConfig, StoredPoint, Tier, VectorStore};
