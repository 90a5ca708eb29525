//! Conversions from canonical messages into the outward shapes.
//!
//! - legacy: one previous-generation message per canonical message
//! - UI: parts + attachments + flattened text, pending calls removed
//! - prompt: role-tagged turns ready for a generation call

use threadloom_core::{
    Attachment, CanonicalMessage, ContentPart, CoreContent, CoreItem, CoreMessage, DataContent,
    LegacyKind, LegacyMessage, MessageContent, ReasoningDetail, Role, UiMessage,
};

/// How strictly to filter tool invocations before sending content out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitize {
    /// Remove calls still waiting for a result
    PendingCalls,
    /// Also remove results whose call was never seen
    ForPrompt,
}

/// Strip unsendable tool invocations.
///
/// Returns `None` when nothing sendable remains. Attachment-only content
/// keeps an empty text part so it stays visible.
pub fn sanitize(content: &MessageContent, mode: Sanitize) -> Option<MessageContent> {
    let parts: Vec<ContentPart> = content
        .parts
        .iter()
        .filter(|part| match part.tool_invocation() {
            Some(inv) if !inv.state.is_result() => false,
            Some(inv) if mode == Sanitize::ForPrompt => !inv.is_unmatched_result(),
            _ => true,
        })
        .cloned()
        .collect();

    let mut sanitized = MessageContent {
        parts,
        ..content.clone()
    };
    sanitized.sync_tool_invocations();

    let only_structure = sanitized
        .parts
        .iter()
        .all(|part| matches!(part, ContentPart::StepBoundary));
    if only_structure {
        if sanitized.attachments().is_empty() {
            return None;
        }
        sanitized.parts = vec![ContentPart::text("")];
    }
    Some(sanitized)
}

// ── Legacy ────────────────────────────────────────────────────────────────

/// Downgrade to the previous generation. Re-ingesting the result restores
/// the same parts, attachments and metadata.
///
/// Plain `[step-start, text]` content collapses to string content; anything
/// richer keeps its step boundaries as `step-start` items. The exact tool
/// records travel in `toolInvocations`, since call and result items cannot
/// express `partial-call` or the step number.
pub fn to_legacy(message: &CanonicalMessage) -> LegacyMessage {
    let content = &message.content;
    let simple_text = match content.parts.as_slice() {
        [ContentPart::StepBoundary, ContentPart::Text { text }]
            if content.text.as_deref() == Some(text.as_str()) && content.attachments().is_empty() =>
        {
            Some(text.clone())
        }
        _ => None,
    };

    let mut kind = LegacyKind::Text;
    let core_content = match simple_text {
        Some(text) => CoreContent::Text(text),
        None => {
            let mut items = Vec::with_capacity(content.parts.len());
            for part in &content.parts {
                match part {
                    ContentPart::Text { text } => items.push(CoreItem::Text { text: text.clone() }),
                    ContentPart::StepBoundary => items.push(CoreItem::StepStart),
                    ContentPart::ToolInvocation { tool_invocation: inv } => {
                        if kind == LegacyKind::Text {
                            kind = LegacyKind::ToolCall;
                        }
                        if !inv.is_unmatched_result() {
                            items.push(CoreItem::ToolCall {
                                tool_call_id: inv.tool_call_id.clone(),
                                tool_name: inv.tool_name.clone(),
                                args: inv.args.clone(),
                            });
                        }
                        if let (true, Some(result)) = (inv.state.is_result(), &inv.result) {
                            kind = LegacyKind::ToolResult;
                            items.push(CoreItem::ToolResult {
                                tool_call_id: inv.tool_call_id.clone(),
                                tool_name: inv.tool_name.clone(),
                                result: result.clone(),
                            });
                        }
                    }
                    ContentPart::Reasoning { details } => items.extend(details.iter().map(reasoning_item)),
                    ContentPart::File { mime_type, data } => items.push(CoreItem::File {
                        data: DataContent::Text(data.clone()),
                        mime_type: mime_type.clone(),
                    }),
                }
            }
            CoreContent::Items(items)
        }
    };

    LegacyMessage {
        id: message.id.clone(),
        role: message.role.as_str().to_string(),
        content: core_content,
        created_at: message.created_at,
        thread_id: message.thread_id.clone(),
        resource_id: message.resource_id.clone(),
        kind,
        tool_invocations: content
            .parts
            .iter()
            .filter_map(ContentPart::tool_invocation)
            .cloned()
            .collect(),
        attachments: content.attachments().to_vec(),
        metadata: content.metadata.clone(),
    }
}

// ── UI ────────────────────────────────────────────────────────────────────

/// UI form, or `None` when nothing displayable remains.
pub fn to_ui(message: &CanonicalMessage) -> Option<UiMessage> {
    let content = sanitize(&message.content, Sanitize::PendingCalls)?;
    let text = match &content.text {
        Some(text) => text.clone(),
        None => content
            .parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    Some(UiMessage {
        id: message.id.clone(),
        role: message.role.as_str().to_string(),
        content: text,
        created_at: Some(message.created_at),
        tool_invocations: content.tool_invocations.clone().unwrap_or_default(),
        attachments: content.attachments.clone().unwrap_or_default(),
        metadata: content.metadata.clone(),
        parts: content.parts,
    })
}

// ── Prompt ────────────────────────────────────────────────────────────────

/// Prompt turns for one message. Empty when nothing sendable remains.
///
/// Assistant content is cut into blocks at step boundaries; each block
/// yields an `assistant` turn followed by a `tool` turn carrying that
/// block's results.
pub fn to_prompt(message: &CanonicalMessage) -> Vec<CoreMessage> {
    let Some(content) = sanitize(&message.content, Sanitize::ForPrompt) else {
        return Vec::new();
    };
    match message.role {
        Role::User => vec![user_turn(&content)],
        Role::Assistant => assistant_turns(&content),
    }
}

fn user_turn(content: &MessageContent) -> CoreMessage {
    let mut items = Vec::new();
    for part in &content.parts {
        match part {
            ContentPart::Text { text } => items.push(CoreItem::Text { text: text.clone() }),
            ContentPart::File { mime_type, data } => items.push(file_item(mime_type, data)),
            _ => {}
        }
    }
    items.extend(content.attachments().iter().map(attachment_item));

    match items.as_slice() {
        [CoreItem::Text { text }] => CoreMessage::user(text.clone()),
        _ => CoreMessage::new("user", CoreContent::Items(items)),
    }
}

fn assistant_turns(content: &MessageContent) -> Vec<CoreMessage> {
    let mut turns = Vec::new();
    for block in content.parts.split(|part| matches!(part, ContentPart::StepBoundary)) {
        let mut said = Vec::new();
        let mut results = Vec::new();
        for part in block {
            match part {
                ContentPart::Text { text } if !text.is_empty() => {
                    said.push(CoreItem::Text { text: text.clone() })
                }
                ContentPart::Text { .. } | ContentPart::StepBoundary => {}
                ContentPart::Reasoning { details } => said.extend(details.iter().map(reasoning_item)),
                ContentPart::File { mime_type, data } => said.push(file_item(mime_type, data)),
                ContentPart::ToolInvocation { tool_invocation: inv } => {
                    said.push(CoreItem::ToolCall {
                        tool_call_id: inv.tool_call_id.clone(),
                        tool_name: inv.tool_name.clone(),
                        args: inv.args.clone(),
                    });
                    results.push(CoreItem::ToolResult {
                        tool_call_id: inv.tool_call_id.clone(),
                        tool_name: inv.tool_name.clone(),
                        result: inv.result.clone().unwrap_or_default(),
                    });
                }
            }
        }
        if !said.is_empty() {
            turns.push(CoreMessage::assistant(said));
        }
        if !results.is_empty() {
            turns.push(CoreMessage::tool(results));
        }
    }
    turns
}

fn reasoning_item(detail: &ReasoningDetail) -> CoreItem {
    match detail {
        ReasoningDetail::Text { text, signature } => CoreItem::Reasoning {
            text: text.clone(),
            signature: signature.clone(),
        },
        ReasoningDetail::Redacted { data } => CoreItem::RedactedReasoning { data: data.clone() },
    }
}

fn file_item(mime_type: &str, data: &str) -> CoreItem {
    if mime_type.starts_with("image/") {
        CoreItem::Image {
            image: DataContent::Text(data.to_string()),
            mime_type: Some(mime_type.to_string()),
        }
    } else {
        CoreItem::File {
            data: DataContent::Text(data.to_string()),
            mime_type: mime_type.to_string(),
        }
    }
}

fn attachment_item(attachment: &Attachment) -> CoreItem {
    let mime_type = attachment
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    file_item(&mime_type, &attachment.url)
}
