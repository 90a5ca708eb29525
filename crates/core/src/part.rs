//! Content parts — the typed fragments a canonical message is made of.
//!
//! Serialized with a `type` discriminant so stored messages stay
//! compatible with the parts-based UI message convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One typed fragment of a message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },

    /// Marks the start of a generation step. Purely structural.
    #[serde(rename = "step-start")]
    StepBoundary,

    /// A tool call, possibly already resolved to a result
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },

    /// Model reasoning, in order
    Reasoning { details: Vec<ReasoningDetail> },

    /// Inline file payload (base64) or a URL
    File {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool(tool_invocation: ToolInvocation) -> Self {
        Self::ToolInvocation { tool_invocation }
    }

    /// The tool invocation carried by this part, if any.
    pub fn tool_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Self::ToolInvocation { tool_invocation } => Some(tool_invocation),
            _ => None,
        }
    }

    /// True for tool invocations still in `call` / `partial-call` state.
    pub fn is_pending_tool_call(&self) -> bool {
        self.tool_invocation()
            .is_some_and(|inv| !inv.state.is_result())
    }

    /// Short discriminant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::StepBoundary => "step-start",
            Self::ToolInvocation { .. } => "tool-invocation",
            Self::Reasoning { .. } => "reasoning",
            Self::File { .. } => "file",
        }
    }
}

/// Lifecycle of a tool invocation. Only ever moves forward to `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

impl ToolInvocationState {
    pub fn is_result(self) -> bool {
        matches!(self, Self::Result)
    }

    /// Ordering used when two views of the same call disagree.
    pub fn rank(self) -> u8 {
        match self {
            Self::PartialCall => 0,
            Self::Call => 1,
            Self::Result => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartialCall => "partial-call",
            Self::Call => "call",
            Self::Result => "result",
        }
    }
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,

    pub tool_name: String,

    /// Call arguments. `null` when only the result has been seen.
    #[serde(default)]
    pub args: Value,

    pub state: ToolInvocationState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Generation step this call belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

impl ToolInvocation {
    /// A new call awaiting its result.
    pub fn call(tool_call_id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            state: ToolInvocationState::Call,
            result: None,
            step: None,
        }
    }

    /// A resolved call.
    pub fn resolved(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
        result: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            state: ToolInvocationState::Result,
            result: Some(result),
            step: None,
        }
    }

    /// A result whose originating call has not been seen.
    pub fn is_unmatched_result(&self) -> bool {
        self.state.is_result() && self.args.is_null()
    }

    /// Fold a later view of the same call into this one.
    ///
    /// Arguments are merged shallowly (incoming keys win), and the state is
    /// upgraded to `result` when the incoming view is resolved. A resolved
    /// invocation is never downgraded.
    pub fn upgraded_with(&self, incoming: &ToolInvocation) -> ToolInvocation {
        let mut next = self.clone();
        next.args = merge_args(&self.args, &incoming.args);
        if incoming.state.rank() > self.state.rank() {
            next.state = incoming.state;
        }
        if incoming.state.is_result() {
            next.result = incoming.result.clone();
        }
        next.step = incoming.step.or(self.step);
        next
    }
}

fn merge_args(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(update)) => {
            let mut merged = base.clone();
            for (key, value) in update {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (existing, Value::Null) => existing.clone(),
        (_, incoming) => incoming.clone(),
    }
}

/// One entry in a reasoning part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReasoningDetail {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    Redacted { data: String },
}

/// A file attached to a message, addressed by URL (possibly a `data:` URL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    pub url: String,
}
