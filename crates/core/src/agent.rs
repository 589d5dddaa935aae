//! Reasoning-agent contract.
//!
//! The agent is an external collaborator: it receives the full working
//! memory (current message plus the three recall sets) and produces a reply
//! with its reasoning trace. Mindloop does not prescribe how the agent
//! prompts the model or selects tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::session::WorkingMemory;

/// One tool invocation in the agent's reasoning trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateStep {
    pub tool: String,
    pub tool_input: String,
    pub observation: String,
}

/// The agent's answer for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// The input the agent worked from.
    pub input: String,

    /// Tool invocations made along the way, in order.
    pub intermediate_steps: Vec<IntermediateStep>,

    /// The reply text.
    pub output: String,
}

impl AgentReply {
    /// The degraded reply used when the model ignored structured-output
    /// instructions: the raw model text stands in for the parsed answer.
    pub fn from_raw_output(input: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            intermediate_steps: Vec::new(),
            output: raw.into(),
        }
    }
}

/// The reasoning agent consumed by the pipeline.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    async fn run(
        &self,
        memory: &WorkingMemory,
    ) -> std::result::Result<AgentReply, AgentError>;
}

const PARSE_FAILURE_MARKER: &str = "Could not parse LLM output: `";

/// Extract the raw model text from a structured-output parse failure.
///
/// Parse failures embed the unparsable output between a known delimiter
/// pattern; whatever raised them, the text is recoverable from the error
/// message alone. Returns `None` for any other failure message.
pub fn extract_unparsable_output(error_message: &str) -> Option<String> {
    if !error_message.contains(PARSE_FAILURE_MARKER) {
        return None;
    }
    let raw = error_message
        .replace(PARSE_FAILURE_MARKER, "")
        .replace('`', "");
    Some(raw)
}
