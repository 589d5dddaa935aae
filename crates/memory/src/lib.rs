//! Memory system for Mindloop: per-user working memory, the tiered recall
//! engine, tool-index synchronization, and an in-memory vector store used as
//! the reference implementation.

pub mod in_memory;
pub mod recall;
pub mod tool_sync;
pub mod working;

pub use in_memory::{InMemoryVectorStore, cosine_similarity};
pub use recall::{RecallEngine, RecallError};
pub use tool_sync::{SyncReport, ToolIndexSynchronizer};
pub use working::{SharedWorkingMemory, WorkingMemoryStore};
