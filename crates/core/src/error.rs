//! Error types for the Mindloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::hook::HookPoint;

/// The top-level error type for all Mindloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Hook errors ---
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Ingestion errors ---
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    // --- Notification errors ---
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum VectorStoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Embedding dimension mismatch: collection holds {stored}, query has {query}")]
    DimensionMismatch { stored: usize, query: usize },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from the recall/persistence side of the memory system.
///
/// `Incompatible` is the one variant callers are expected to branch on: it
/// marks a vector store that no longer matches the active embedder (typically
/// after a provider swap) and the only remediation is wiping the store.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(
        "vector memory is incompatible with the current embedder: {0}; \
         reset the long-term memory store to rebuild it"
    )]
    Incompatible(#[source] VectorStoreError),

    #[error("embedding the recall query failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("memory storage failed: {0}")]
    Storage(#[from] VectorStoreError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model ignored the structured-output instructions. The raw model
    /// text is carried verbatim between backticks so callers can salvage it.
    #[error("Could not parse LLM output: `{raw}`")]
    OutputParse { raw: String },

    #[error("Agent execution failed: {0}")]
    Execution(String),

    #[error("Provider error during agent run: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook {point} returned {got} but {expected} was expected")]
    PayloadMismatch {
        point: HookPoint,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Hook {point} failed in handler `{handler}`: {reason}")]
    HandlerFailed {
        point: HookPoint,
        handler: String,
        reason: String,
    },

    #[error("Hook registry unavailable: {0}")]
    RegistryUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Document storage failed: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("`{0}` is not a valid message type. Valid types: notification, chat, chat_token, error")]
    UnknownKind(String),
}
