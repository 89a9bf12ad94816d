//! Tool interface
//!
//! Function-calling contract shared by the live realtime session and the
//! shadow replay client. The schema types serialize directly into the
//! JSON-Schema fragments both APIs expect.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Tool execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// JSON-Schema property for a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub prop_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            prop_type: "string".to_string(),
            description: Some(description.into()),
            enum_values: None,
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self {
            prop_type: "integer".to_string(),
            description: Some(description.into()),
            enum_values: None,
        }
    }
}

/// JSON-Schema object describing a tool's parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: &str, schema: PropertySchema, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }
}

/// Declarative description of a tool, as handed to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: InputSchema,
    /// True for tools with caller-visible side effects
    #[serde(default)]
    pub write_action: bool,
}

impl ToolSpec {
    /// Function definition in the realtime session format.
    pub fn to_realtime_json(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }

    /// Function definition in the chat-completion format used for replay.
    pub fn to_chat_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            },
        })
    }
}

/// A tool the receptionist may call during a conversation
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> InputSchema;

    /// Whether this tool performs a caller-visible side effect.
    /// Write-classified tools are never executed during shadow replay.
    fn is_write_action(&self) -> bool {
        false
    }

    /// Run the tool. The returned string is handed back to the model
    /// verbatim, and recorded verbatim in the conversation frame.
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            write_action: self.is_write_action(),
        }
    }

    /// Check required fields before execution.
    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let schema = self.parameters();
        match arguments {
            Value::Object(obj) => {
                for field in &schema.required {
                    if !obj.contains_key(field) {
                        return Err(ToolError::InvalidParams(format!(
                            "missing required field: {field}"
                        )));
                    }
                }
                Ok(())
            }
            Value::Null if schema.required.is_empty() => Ok(()),
            _ if schema.required.is_empty() => Ok(()),
            _ => Err(ToolError::InvalidParams(
                "arguments must be an object".to_string(),
            )),
        }
    }
}

/// Extract a required string argument.
pub fn required_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidParams(format!("'{field}' must be a string")))
}
