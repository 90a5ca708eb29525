//! Canonical message domain types.
//!
//! A [`CanonicalMessage`] is the store's unified representation of one
//! conversational turn. Every accepted input shape is normalized into it.

use crate::part::{Attachment, ContentPart, ToolInvocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into every canonical content payload.
pub const CONTENT_FORMAT: u8 = 2;

/// The role of a stored message. Tool output is folded into `Assistant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant, including tool results
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_format() -> u8 {
    CONTENT_FORMAT
}

/// Versioned content of a canonical message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(default = "default_format")]
    pub format: u8,

    /// Ordered content parts
    #[serde(default)]
    pub parts: Vec<ContentPart>,

    /// Flattened mirror of the latest textual content
    #[serde(default, rename = "content", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// One entry per tool call id, mirroring the tool-invocation parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,

    /// Caller-supplied metadata, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl MessageContent {
    /// Content made of the given parts, with the tool aggregate derived.
    pub fn from_parts(parts: Vec<ContentPart>) -> Self {
        let mut content = Self {
            format: CONTENT_FORMAT,
            parts,
            text: None,
            tool_invocations: None,
            attachments: None,
            metadata: None,
        };
        content.sync_tool_invocations();
        content
    }

    /// Rebuild the `tool_invocations` aggregate from the parts.
    ///
    /// Entries keep first-seen order; when a call id appears more than once
    /// the most progressed state wins.
    pub fn sync_tool_invocations(&mut self) {
        let mut aggregate: Vec<ToolInvocation> = Vec::new();
        for invocation in self.parts.iter().filter_map(ContentPart::tool_invocation) {
            match aggregate
                .iter_mut()
                .find(|existing| existing.tool_call_id == invocation.tool_call_id)
            {
                Some(existing) => {
                    if invocation.state.rank() >= existing.state.rank() {
                        *existing = existing.upgraded_with(invocation);
                    }
                }
                None => aggregate.push(invocation.clone()),
            }
        }
        self.tool_invocations = if aggregate.is_empty() { None } else { Some(aggregate) };
    }

    /// Attachments, or an empty slice.
    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or(&[])
    }

    /// Text of the last text part, if any.
    pub fn last_text(&self) -> Option<&str> {
        self.parts.iter().rev().find_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// True when there is nothing to show: no parts and no attachments.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.attachments().is_empty()
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::from_parts(Vec::new())
    }
}

/// A single message in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMessage {
    /// Unique within a store
    pub id: String,

    pub role: Role,

    pub content: MessageContent,

    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl CanonicalMessage {
    pub fn new(id: impl Into<String>, role: Role, content: MessageContent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role,
            content,
            created_at,
            thread_id: None,
            resource_id: None,
        }
    }

    /// Find a tool invocation by call id.
    pub fn tool_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.content
            .parts
            .iter()
            .filter_map(ContentPart::tool_invocation)
            .find(|inv| inv.tool_call_id == tool_call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{ToolInvocation, ToolInvocationState};
    use serde_json::json;

    #[test]
    fn aggregate_keeps_most_progressed_state() {
        let content = MessageContent::from_parts(vec![
            ContentPart::tool(ToolInvocation::call("c1", "search", json!({"q": "x"}))),
            ContentPart::text("searching"),
            ContentPart::tool(ToolInvocation::resolved("c1", "search", json!({}), json!("hit"))),
            ContentPart::tool(ToolInvocation::call("c2", "fetch", json!({}))),
        ]);
        let aggregate = content.tool_invocations.unwrap();
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate[0].tool_call_id, "c1");
        assert_eq!(aggregate[0].state, ToolInvocationState::Result);
        assert_eq!(aggregate[0].args, json!({"q": "x"}));
        assert_eq!(aggregate[1].state, ToolInvocationState::Call);
    }

    #[test]
    fn text_only_content_has_no_aggregate() {
        let content = MessageContent::from_parts(vec![ContentPart::text("hi")]);
        assert!(content.tool_invocations.is_none());
        assert_eq!(content.last_text(), Some("hi"));
        assert!(!content.is_empty());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = CanonicalMessage::new(
            "msg_1",
            Role::Assistant,
            MessageContent::from_parts(vec![ContentPart::StepBoundary, ContentPart::text("hello")]),
            Utc::now(),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""format":2"#));
        assert!(json.contains(r#""createdAt""#));
        let back: CanonicalMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn created_at_accepts_epoch_millis() {
        let raw = json!({
            "id": "m1",
            "role": "user",
            "content": {"format": 2, "parts": [{"type": "text", "text": "hi"}]},
            "createdAt": 1_700_000_000_000i64
        });
        let msg: CanonicalMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.created_at.timestamp_millis(), 1_700_000_000_000);
    }
}
