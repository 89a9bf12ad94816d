//! Tool registry
//!
//! Name -> tool lookup plus the function definition lists handed to the
//! realtime session and the replay client. Execution validates arguments
//! against the tool's schema first, so a malformed model call surfaces as
//! an error string instead of a panic deep in a tool.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::interface::{Tool, ToolError, ToolSpec};

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Tool registered twice, replacing");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether `name` is a write-classified tool. Unknown names are treated
    /// as writes, the conservative answer for the replay gate.
    pub fn is_write_action(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map_or(true, |tool| tool.is_write_action())
    }

    /// Specs for every registered tool, in stable name order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Specs filtered to the names a business has enabled.
    pub fn specs_for(&self, enabled: &[String]) -> Vec<ToolSpec> {
        self.tools
            .values()
            .filter(|tool| enabled.iter().any(|name| name == tool.name()))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Validate and run a tool by name.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.validate(&arguments)?;

        tracing::debug!(tool = name, "Executing tool");
        let result = tool.execute(arguments).await?;
        tracing::debug!(tool = name, result_len = result.len(), "Tool completed");
        Ok(result)
    }
}
