//! Tool-call record and result shapes exchanged between the dispatcher and
//! the LLM session (C4/C5). See §3 and §4.5.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a dispatched tool call. `Structured` is returned to the model
/// as the tool result; `Handoff` additionally triggers the handoff path in
/// the mediator regardless of what the model does with the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResult {
    Text(String),
    Structured {
        success: bool,
        message: String,
        #[serde(default)]
        requires_handoff: bool,
    },
    Handoff {
        reason: String,
        summary: String,
        priority: HandoffPriority,
    },
}

impl ToolResult {
    /// The tool result always needs to be fed back to the model as a single
    /// string (the realtime API's `tool_result` payload is text).
    pub fn as_model_text(&self) -> String {
        match self {
            ToolResult::Text(s) => s.clone(),
            ToolResult::Structured { message, .. } => message.clone(),
            ToolResult::Handoff { summary, .. } => summary.clone(),
        }
    }

    pub fn requires_handoff(&self) -> bool {
        matches!(self, ToolResult::Handoff { .. })
            || matches!(self, ToolResult::Structured { requires_handoff: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffPriority {
    Normal,
    High,
    Urgent,
}

impl Default for HandoffPriority {
    fn default() -> Self {
        HandoffPriority::Normal
    }
}

/// A single tool invocation, tracked from dispatch to completion for
/// transcript/trace purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, call_id: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            arguments,
            result: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, result: ToolResult) {
        self.result = Some(result);
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_requires_handoff_flag_propagates() {
        let r = ToolResult::Structured {
            success: false,
            message: "the backend is down".into(),
            requires_handoff: true,
        };
        assert!(r.requires_handoff());
    }

    #[test]
    fn handoff_variant_always_requires_handoff() {
        let r = ToolResult::Handoff {
            reason: "customer angry".into(),
            summary: "escalate to human agent".into(),
            priority: HandoffPriority::Urgent,
        };
        assert!(r.requires_handoff());
    }

    #[test]
    fn tool_call_lifecycle() {
        let mut call = ToolCall::new("check_order_status", "call_1", serde_json::json!({"order_id": "R-42"}));
        assert!(!call.is_complete());
        call.complete(ToolResult::Text("shipped".into()));
        assert!(call.is_complete());
        assert!(call.completed_at.unwrap() >= call.started_at);
    }
}
