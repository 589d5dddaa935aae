//! The Mindloop request cycle.
//!
//! One user message flows through a fixed sequence:
//!
//! 1. **Resolve** the per-user working memory
//! 2. **Hook** the inbound message (rewriting, metadata injection)
//! 3. **Bound** the text, routing overflow to document ingestion
//! 4. **Recall** from the three memory tiers
//! 5. **Reason** via the agent collaborator
//! 6. **Persist** the exchange into episodic memory
//! 7. **Assemble** the structured output, hook it, update history
//!
//! Everything here is request orchestration; the heavy lifting (retrieval,
//! generation, storage) happens behind the trait contracts in
//! `mindloop-core`.

pub mod notify;
pub mod pipeline;
pub mod runtime;

pub use notify::{NotificationChannel, QueueTokenSink};
pub use pipeline::{ConversationPipeline, MAX_TEXT_INPUT, split_oversize};
pub use runtime::{Runtime, RuntimeBuilder};
