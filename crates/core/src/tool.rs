//! Tool trait — callable capabilities exposed to the reasoning agent.
//!
//! Tools are indexed in the procedural memory tier by their natural-language
//! description, so the agent can select them semantically. Two tools with
//! identical descriptions are the same indexed entity; renaming a tool
//! without touching its description does not move its index entry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;

/// A callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique tool name (e.g. "get_the_time").
    fn name(&self) -> &str;

    /// Natural-language description — the embeddable text and the tool's
    /// indexing identity.
    fn description(&self) -> &str;

    /// Longer usage documentation shown to the model alongside the
    /// description. Defaults to empty.
    fn docstring(&self) -> &str {
        ""
    }

    /// Execute the tool with a plain-text input.
    async fn execute(&self, input: &str) -> std::result::Result<String, ToolError>;
}

/// The set of currently loaded tools.
///
/// Plugins register tools here; the tool-index synchronizer reconciles this
/// set against the procedural collection, and the agent looks tools up by
/// name when executing them.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All registered descriptions — the live side of index reconciliation.
    pub fn descriptions(&self) -> Vec<&str> {
        self.tools.values().map(|t| t.description()).collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: &str,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.into()))?;
        tool.execute(input).await
    }
}
