//! Accepted input shapes.
//!
//! Callers name the shape of every message they hand to the store by
//! wrapping it in [`MessageInput`]. On the wire the tag is explicit:
//!
//! ```json
//! {"format": "core", "message": {"role": "user", "content": "hi"}}
//! ```

use crate::message::CanonicalMessage;
use crate::part::{Attachment, ContentPart, ToolInvocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in one of the accepted shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "message", rename_all = "snake_case")]
pub enum MessageInput {
    /// Bare text, treated as a user turn
    Text(String),
    /// Role plus string or typed content items
    Core(CoreMessage),
    /// UI message with parts and attachments
    Ui(UiMessage),
    /// Current-generation stored message
    Canonical(CanonicalMessage),
    /// Previous-generation stored message
    Legacy(LegacyMessage),
}

impl MessageInput {
    /// Shape name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Core(_) => "core",
            Self::Ui(_) => "ui",
            Self::Canonical(_) => "canonical",
            Self::Legacy(_) => "legacy",
        }
    }
}

impl From<&str> for MessageInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<CoreMessage> for MessageInput {
    fn from(message: CoreMessage) -> Self {
        Self::Core(message)
    }
}

impl From<UiMessage> for MessageInput {
    fn from(message: UiMessage) -> Self {
        Self::Ui(message)
    }
}

impl From<CanonicalMessage> for MessageInput {
    fn from(message: CanonicalMessage) -> Self {
        Self::Canonical(message)
    }
}

impl From<LegacyMessage> for MessageInput {
    fn from(message: LegacyMessage) -> Self {
        Self::Legacy(message)
    }
}

// ── Role + content ────────────────────────────────────────────────────────

/// A role-tagged message. Also the shape of prompt projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreMessage {
    /// `system`, `user`, `assistant` or `tool`
    pub role: String,
    pub content: CoreContent,
}

impl CoreMessage {
    pub fn new(role: impl Into<String>, content: CoreContent) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", CoreContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", CoreContent::Text(text.into()))
    }

    pub fn assistant(items: Vec<CoreItem>) -> Self {
        Self::new("assistant", CoreContent::Items(items))
    }

    pub fn tool(items: Vec<CoreItem>) -> Self {
        Self::new("tool", CoreContent::Items(items))
    }

    /// Concatenated text of the message (string content or text items).
    pub fn text(&self) -> String {
        match &self.content {
            CoreContent::Text(text) => text.clone(),
            CoreContent::Items(items) => items
                .iter()
                .filter_map(|item| match item {
                    CoreItem::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// String content or an ordered list of typed items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoreContent {
    Text(String),
    Items(Vec<CoreItem>),
}

/// One typed item of role-tagged content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum CoreItem {
    Text {
        text: String,
    },
    /// Step boundary. Only legacy content carries it; prompts never do.
    StepStart,
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: Value,
    },
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedReasoning {
        data: String,
    },
    Image {
        image: DataContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    File {
        data: DataContent,
        mime_type: String,
    },
}

/// Binary payload: raw bytes, base64 text, or a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataContent {
    Text(String),
    Bytes(Vec<u8>),
}

// ── UI messages ───────────────────────────────────────────────────────────

/// A UI-oriented message: parts, attachments and a flattened text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    #[serde(default)]
    pub id: String,

    pub role: String,

    /// Flattened text
    #[serde(default)]
    pub content: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::timestamp::deserialize_option"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,

    /// Tool calls, for producers that do not emit parts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,

    #[serde(default, rename = "experimental_attachments", skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

impl UiMessage {
    pub fn new(id: impl Into<String>, role: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            content: String::new(),
            created_at: None,
            parts,
            tool_invocations: Vec::new(),
            attachments: Vec::new(),
            metadata: None,
        }
    }
}

// ── Legacy stored messages ────────────────────────────────────────────────

/// What a legacy message carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyKind {
    #[default]
    Text,
    ToolCall,
    ToolResult,
}

/// Previous-generation stored message: role-tagged content plus identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMessage {
    pub id: String,

    pub role: String,

    pub content: CoreContent,

    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: LegacyKind,

    /// Exact invocation records (state, step) for the calls in `content`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,

    #[serde(default, rename = "experimental_attachments", skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}
