//! Replay client
//!
//! The shadow evaluator asks a chat-completion model, at temperature zero,
//! what it would do at each assistant turn given the conversation so far.
//! The trait exists so tests can script the decisions and assert on the
//! evaluator's logic without a network.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use receptionist_core::ToolCall;
use receptionist_tools::ToolSpec;

use crate::EvalError;

/// Message role in the replay history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Simulated tool result fed back verbatim from the frame
    Function,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

/// One message of the replayed conversation
#[derive(Debug, Clone)]
pub struct ReplayMessage {
    pub role: Role,
    pub content: String,
    /// Tool name, for `Function` messages
    pub name: Option<String>,
}

impl ReplayMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }

    fn to_json(&self) -> Value {
        let mut msg = json!({
            "role": self.role.as_str(),
            "content": self.content,
        });
        if let Some(name) = &self.name {
            msg["name"] = json!(name);
        }
        msg
    }
}

/// What the shadow model would do at one assistant turn
#[derive(Debug, Clone, Default)]
pub struct ReplayDecision {
    pub text: Option<String>,
    pub tool_call: Option<ToolCall>,
}

/// Source of shadow decisions
#[async_trait]
pub trait ReplayClient: Send + Sync {
    async fn decide(
        &self,
        history: &[ReplayMessage],
        tools: &[ToolSpec],
    ) -> Result<ReplayDecision, EvalError>;
}

/// Chat-completion backed client, temperature pinned to zero
pub struct OpenAiReplayClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiReplayClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

#[async_trait]
impl ReplayClient for OpenAiReplayClient {
    async fn decide(
        &self,
        history: &[ReplayMessage],
        tools: &[ToolSpec],
    ) -> Result<ReplayDecision, EvalError> {
        let functions: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        let messages: Vec<Value> = history.iter().map(ReplayMessage::to_json).collect();

        let body = json!({
            "model": self.model,
            "messages": messages,
            "functions": functions,
            "function_call": "auto",
            "temperature": 0,
        });

        let response: Value = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let message = &response["choices"][0]["message"];
        let text = message["content"].as_str().map(str::to_string);
        let tool_call = message["function_call"].as_object().and_then(|fc| {
            let name = fc.get("name")?.as_str()?.to_string();
            let arguments = fc
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(Value::Object(Default::default()));
            Some(ToolCall { name, arguments })
        });

        Ok(ReplayDecision { text, tool_call })
    }
}

/// Test client returning pre-scripted decisions in order
#[derive(Default)]
pub struct ScriptedReplayClient {
    decisions: Mutex<VecDeque<ReplayDecision>>,
}

impl ScriptedReplayClient {
    pub fn new(decisions: Vec<ReplayDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
        }
    }
}

#[async_trait]
impl ReplayClient for ScriptedReplayClient {
    async fn decide(
        &self,
        _history: &[ReplayMessage],
        _tools: &[ToolSpec],
    ) -> Result<ReplayDecision, EvalError> {
        self.decisions
            .lock()
            .pop_front()
            .ok_or_else(|| EvalError::Replay("scripted decisions exhausted".to_string()))
    }
}
