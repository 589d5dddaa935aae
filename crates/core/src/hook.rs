//! Hook chain — the pipeline's named extension points.
//!
//! Every stage of the request cycle passes its payload through a hook point.
//! Registered handlers run in priority order, each receiving the previous
//! handler's output, and the final payload flows back into the pipeline.
//! Handlers are trusted but not isolated: a failing handler aborts the
//! request.
//!
//! The registry that discovers and loads plugin handlers is an external
//! collaborator. This module fixes the narrow capability the core consumes
//! ([`HookRegistry`]) and ships two implementations: [`NoopHooks`] (no
//! handlers) and [`LocalHookRegistry`] (in-process registration, used by
//! embedders and tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HookError;
use crate::message::{FinalOutput, UserMessage};
use crate::session::WorkingMemory;
use crate::vector::{RecallConfig, Tier};

/// The named extension points of the request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before the component graph is assembled.
    BeforeBootstrap,
    /// After the component graph is assembled and tools are synced.
    AfterBootstrap,
    /// Inbound message transformation (message → message).
    BeforeReadsMessage,
    /// Recall query rewriting (string → string).
    RecallQuery,
    /// Just before recall begins; side effects only.
    BeforeRecalls,
    /// Episodic tier customization (RecallConfig → RecallConfig).
    BeforeRecallsEpisodic,
    /// Declarative tier customization (RecallConfig → RecallConfig).
    BeforeRecallsDeclarative,
    /// Procedural tier customization (RecallConfig → RecallConfig).
    BeforeRecallsProcedural,
    /// After all tiers are written back; may mutate working memory freely.
    AfterRecalls,
    /// Outbound output transformation (output → output).
    BeforeSendsMessage,
}

impl HookPoint {
    /// The per-tier customization point for `tier`.
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Episodic => HookPoint::BeforeRecallsEpisodic,
            Tier::Declarative => HookPoint::BeforeRecallsDeclarative,
            Tier::Procedural => HookPoint::BeforeRecallsProcedural,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeBootstrap => "before_bootstrap",
            HookPoint::AfterBootstrap => "after_bootstrap",
            HookPoint::BeforeReadsMessage => "before_reads_message",
            HookPoint::RecallQuery => "recall_query",
            HookPoint::BeforeRecalls => "before_recalls",
            HookPoint::BeforeRecallsEpisodic => "before_recalls_episodic",
            HookPoint::BeforeRecallsDeclarative => "before_recalls_declarative",
            HookPoint::BeforeRecallsProcedural => "before_recalls_procedural",
            HookPoint::AfterRecalls => "after_recalls",
            HookPoint::BeforeSendsMessage => "before_sends_message",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed payload flowing through a hook point.
#[derive(Debug, Clone)]
pub enum HookPayload {
    /// No payload; the point exists for its side effects on working memory.
    None,
    Message(UserMessage),
    Query(String),
    Recall(RecallConfig),
    Output(FinalOutput),
}

impl HookPayload {
    pub fn variant_name(&self) -> &'static str {
        match self {
            HookPayload::None => "none",
            HookPayload::Message(_) => "message",
            HookPayload::Query(_) => "query",
            HookPayload::Recall(_) => "recall_config",
            HookPayload::Output(_) => "output",
        }
    }

    pub fn into_message(self, point: HookPoint) -> Result<UserMessage, HookError> {
        match self {
            HookPayload::Message(m) => Ok(m),
            other => Err(mismatch(point, "message", &other)),
        }
    }

    pub fn into_query(self, point: HookPoint) -> Result<String, HookError> {
        match self {
            HookPayload::Query(q) => Ok(q),
            other => Err(mismatch(point, "query", &other)),
        }
    }

    pub fn into_recall(self, point: HookPoint) -> Result<RecallConfig, HookError> {
        match self {
            HookPayload::Recall(c) => Ok(c),
            other => Err(mismatch(point, "recall_config", &other)),
        }
    }

    pub fn into_output(self, point: HookPoint) -> Result<FinalOutput, HookError> {
        match self {
            HookPayload::Output(o) => Ok(o),
            other => Err(mismatch(point, "output", &other)),
        }
    }
}

fn mismatch(point: HookPoint, expected: &'static str, got: &HookPayload) -> HookError {
    HookError::PayloadMismatch {
        point,
        expected,
        got: got.variant_name(),
    }
}

/// The hook capability consumed by the pipeline.
///
/// `execute` runs every handler registered for `point` in priority order,
/// threading the payload through each, with read/write access to the
/// session's working memory.
#[async_trait]
pub trait HookRegistry: Send + Sync {
    async fn execute(
        &self,
        point: HookPoint,
        payload: HookPayload,
        memory: &mut WorkingMemory,
    ) -> Result<HookPayload, HookError>;
}

/// A registry with no handlers: every payload passes through unchanged.
#[derive(Debug, Default)]
pub struct NoopHooks;

#[async_trait]
impl HookRegistry for NoopHooks {
    async fn execute(
        &self,
        _point: HookPoint,
        payload: HookPayload,
        _memory: &mut WorkingMemory,
    ) -> Result<HookPayload, HookError> {
        Ok(payload)
    }
}

type HandlerFn =
    Box<dyn Fn(HookPayload, &mut WorkingMemory) -> Result<HookPayload, HookError> + Send + Sync>;

struct RegisteredHandler {
    name: String,
    priority: i32,
    func: HandlerFn,
}

/// In-process hook registry with priority-ordered handlers.
///
/// Handlers with higher priority run first; ties run in registration order.
/// Registration happens before the registry is shared (`&mut self`), so
/// execution needs no locking.
#[derive(Default)]
pub struct LocalHookRegistry {
    handlers: std::collections::HashMap<HookPoint, Vec<RegisteredHandler>>,
}

impl LocalHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at `point`.
    pub fn register<F>(&mut self, point: HookPoint, name: impl Into<String>, priority: i32, func: F)
    where
        F: Fn(HookPayload, &mut WorkingMemory) -> Result<HookPayload, HookError>
            + Send
            + Sync
            + 'static,
    {
        let handlers = self.handlers.entry(point).or_default();
        handlers.push(RegisteredHandler {
            name: name.into(),
            priority,
            func: Box::new(func),
        });
        // Stable: equal priorities keep registration order.
        handlers.sort_by_key(|h| std::cmp::Reverse(h.priority));
    }

    pub fn handler_count(&self, point: HookPoint) -> usize {
        self.handlers.get(&point).map_or(0, Vec::len)
    }
}

#[async_trait]
impl HookRegistry for LocalHookRegistry {
    async fn execute(
        &self,
        point: HookPoint,
        mut payload: HookPayload,
        memory: &mut WorkingMemory,
    ) -> Result<HookPayload, HookError> {
        let Some(handlers) = self.handlers.get(&point) else {
            return Ok(payload);
        };
        for handler in handlers {
            tracing::trace!(point = %point, handler = %handler.name, "running hook handler");
            payload = (handler.func)(payload, memory)?;
        }
        Ok(payload)
    }
}
