//! Document-ingestion contract.
//!
//! The ingestion subsystem chunks, embeds and stores arbitrary documents
//! into declarative memory. It is an external collaborator; the pipeline
//! only needs to hand it text (notably the overflow from oversized user
//! messages).

use async_trait::async_trait;

use crate::error::IngestError;

/// The ingestion capability consumed by the pipeline.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a plain-text document for later declarative recall.
    ///
    /// `source` may be empty for text with no meaningful origin, such as
    /// message overflow.
    async fn ingest(
        &self,
        text: &str,
        content_type: &str,
        source: &str,
    ) -> std::result::Result<(), IngestError>;
}
