//! Format normalizer — every accepted input shape into a [`CanonicalMessage`].
//!
//! Normalization is pure apart from two injected collaborators: the id
//! generator and a timestamp stamper (the store's sequencer). Nothing is
//! stamped until the input has passed validation, so a rejected message
//! never advances the sequencer.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use threadloom_core::error::OwnershipField;
use threadloom_core::{
    Attachment, CanonicalMessage, ContentPart, CoreContent, CoreItem, CoreMessage, DataContent,
    LegacyMessage, MessageContent, MessageError, MessageInput, Provenance, ReasoningDetail, Role,
    ToolInvocation, UiMessage,
};
use tracing::warn;

use crate::list::IdGenerator;

/// Store identity plus the id generator, borrowed from the message list.
pub struct Normalizer<'a> {
    pub thread_id: Option<&'a str>,
    pub resource_id: Option<&'a str>,
    pub id_generator: &'a IdGenerator,
}

impl Normalizer<'_> {
    /// Convert one input into a canonical message.
    ///
    /// `stamp` receives the input's own timestamp (if it has one) and returns
    /// the `createdAt` to record.
    pub fn normalize<F>(
        &self,
        input: MessageInput,
        source: Provenance,
        stamp: F,
    ) -> Result<CanonicalMessage, MessageError>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> DateTime<Utc>,
    {
        match input {
            MessageInput::Text(text) => self.from_core(CoreMessage::user(text), stamp),
            MessageInput::Core(message) => self.from_core(message, stamp),
            MessageInput::Ui(message) => self.from_ui(message, stamp),
            MessageInput::Canonical(message) => self.from_canonical(message, source, stamp),
            MessageInput::Legacy(message) => self.from_legacy(message, source, stamp),
        }
    }

    fn from_core<F>(&self, message: CoreMessage, stamp: F) -> Result<CanonicalMessage, MessageError>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> DateTime<Utc>,
    {
        let role = map_role(&message.role, None)?;
        let content = content_from_core(&message.content, None)?;
        Ok(self.assemble((self.id_generator)(), role, content, stamp(None)))
    }

    fn from_ui<F>(&self, message: UiMessage, stamp: F) -> Result<CanonicalMessage, MessageError>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> DateTime<Utc>,
    {
        let id = non_empty_id(message.id, self.id_generator);
        let role = map_role(&message.role, Some(&id))?;

        let mut parts = Vec::with_capacity(message.parts.len() + 1);
        let mut attachments = message.attachments;
        for part in message.parts {
            match part {
                ContentPart::File { mime_type, data } => attachments.push(Attachment {
                    name: None,
                    url: as_url(&data, &mime_type),
                    content_type: Some(mime_type),
                }),
                other => parts.push(other),
            }
        }

        if parts.is_empty() && !message.content.is_empty() {
            parts.push(ContentPart::text(message.content.clone()));
        }
        for invocation in message.tool_invocations {
            upsert_tool_part(&mut parts, invocation);
        }

        let mut content = MessageContent::from_parts(parts);
        if !message.content.is_empty() {
            content.text = Some(message.content);
        }
        if !attachments.is_empty() {
            content.attachments = Some(attachments);
        }
        content.metadata = message.metadata;
        let content = finish(content, Some(&id))?;

        Ok(self.assemble(id, role, content, stamp(message.created_at)))
    }

    fn from_canonical<F>(
        &self,
        mut message: CanonicalMessage,
        source: Provenance,
        stamp: F,
    ) -> Result<CanonicalMessage, MessageError>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> DateTime<Utc>,
    {
        self.check_ownership(
            message.thread_id.as_deref(),
            message.resource_id.as_deref(),
            &message.id,
            source,
        )?;
        message.id = non_empty_id(message.id, self.id_generator);
        message.content.format = threadloom_core::message::CONTENT_FORMAT;
        message.content.sync_tool_invocations();
        message.content = finish(message.content, Some(&message.id))?;
        message.created_at = stamp(Some(message.created_at));
        self.fill_identity(&mut message);
        Ok(message)
    }

    fn from_legacy<F>(
        &self,
        message: LegacyMessage,
        source: Provenance,
        stamp: F,
    ) -> Result<CanonicalMessage, MessageError>
    where
        F: FnOnce(Option<DateTime<Utc>>) -> DateTime<Utc>,
    {
        self.check_ownership(
            message.thread_id.as_deref(),
            message.resource_id.as_deref(),
            &message.id,
            source,
        )?;
        let id = non_empty_id(message.id, self.id_generator);
        let role = map_role(&message.role, Some(&id))?;
        let mut content = content_from_core(&message.content, Some(&id))?;

        // Call and result items lose the exact state and step; the records win.
        for record in message.tool_invocations {
            let mut matched = false;
            for part in &mut content.parts {
                if let ContentPart::ToolInvocation { tool_invocation } = part {
                    if tool_invocation.tool_call_id == record.tool_call_id {
                        *tool_invocation = record.clone();
                        matched = true;
                    }
                }
            }
            if !matched {
                content.parts.push(ContentPart::tool(record));
            }
        }
        content.sync_tool_invocations();
        if !message.attachments.is_empty() {
            content.attachments = Some(message.attachments);
        }
        content.metadata = message.metadata;
        let content = finish(content, Some(&id))?;

        let mut upgraded = CanonicalMessage::new(id, role, content, stamp(Some(message.created_at)));
        upgraded.thread_id = message.thread_id;
        upgraded.resource_id = message.resource_id;
        self.fill_identity(&mut upgraded);
        Ok(upgraded)
    }

    fn assemble(
        &self,
        id: String,
        role: Role,
        content: MessageContent,
        created_at: DateTime<Utc>,
    ) -> CanonicalMessage {
        let mut message = CanonicalMessage::new(id, role, content, created_at);
        self.fill_identity(&mut message);
        message
    }

    fn fill_identity(&self, message: &mut CanonicalMessage) {
        if message.thread_id.is_none() {
            message.thread_id = self.thread_id.map(str::to_string);
        }
        if message.resource_id.is_none() {
            message.resource_id = self.resource_id.map(str::to_string);
        }
    }

    /// Recalled messages may come from another thread (cross-thread recall),
    /// so the check is skipped for `memory`.
    fn check_ownership(
        &self,
        thread_id: Option<&str>,
        resource_id: Option<&str>,
        id: &str,
        source: Provenance,
    ) -> Result<(), MessageError> {
        if source == Provenance::Memory {
            return Ok(());
        }
        for (field, expected, found) in [
            (OwnershipField::Thread, self.thread_id, thread_id),
            (OwnershipField::Resource, self.resource_id, resource_id),
        ] {
            if let (Some(expected), Some(found)) = (expected, found) {
                if expected != found {
                    return Err(MessageError::OwnershipMismatch {
                        field,
                        expected: expected.to_string(),
                        found: found.to_string(),
                        id: Some(id.to_string()),
                    });
                }
            }
        }
        Ok(())
    }
}

/// `user` stays `user`; `assistant` and `tool` both become `assistant`.
pub fn map_role(role: &str, id: Option<&str>) -> Result<Role, MessageError> {
    match role {
        "user" => Ok(Role::User),
        "assistant" | "tool" => Ok(Role::Assistant),
        other => Err(MessageError::UnknownRole {
            role: other.to_string(),
            id: id.map(str::to_string),
        }),
    }
}

/// Walk string or item content into parts.
pub fn content_from_core(content: &CoreContent, id: Option<&str>) -> Result<MessageContent, MessageError> {
    let items = match content {
        CoreContent::Text(text) => {
            let mut content =
                MessageContent::from_parts(vec![ContentPart::StepBoundary, ContentPart::text(text.clone())]);
            content.text = Some(text.clone());
            return Ok(content);
        }
        CoreContent::Items(items) if items.is_empty() => {
            return Err(MessageError::MissingContent {
                id: id.map(str::to_string),
            });
        }
        CoreContent::Items(items) => items,
    };

    let mut parts: Vec<ContentPart> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            CoreItem::Text { text } => parts.push(ContentPart::text(text.clone())),
            CoreItem::StepStart => parts.push(ContentPart::StepBoundary),
            CoreItem::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => parts.push(ContentPart::tool(ToolInvocation::call(
                tool_call_id.clone(),
                tool_name.clone(),
                args.clone(),
            ))),
            CoreItem::ToolResult {
                tool_call_id,
                tool_name,
                result,
            } => {
                // Args are unknown until paired with the call.
                let resolved = ToolInvocation::resolved(
                    tool_call_id.clone(),
                    tool_name.clone(),
                    serde_json::Value::Null,
                    result.clone(),
                );
                upsert_tool_part(&mut parts, resolved);
            }
            CoreItem::Reasoning { text, signature } => parts.push(ContentPart::Reasoning {
                details: vec![ReasoningDetail::Text {
                    text: text.clone(),
                    signature: signature.clone(),
                }],
            }),
            CoreItem::RedactedReasoning { data } => parts.push(ContentPart::Reasoning {
                details: vec![ReasoningDetail::Redacted { data: data.clone() }],
            }),
            CoreItem::Image { image, mime_type } => {
                let mime_type = mime_type.clone().unwrap_or_else(|| "image/*".into());
                if let Some(data) = encode_data(image, &mime_type) {
                    parts.push(ContentPart::File { mime_type, data });
                }
            }
            CoreItem::File { data, mime_type } => {
                if let Some(data) = encode_data(data, mime_type) {
                    parts.push(ContentPart::File {
                        mime_type: mime_type.clone(),
                        data,
                    });
                }
            }
        }
    }

    Ok(MessageContent::from_parts(parts))
}

/// Pair a tool invocation with an earlier part for the same call, or append it.
fn upsert_tool_part(parts: &mut Vec<ContentPart>, invocation: ToolInvocation) {
    let existing = parts.iter().rposition(|part| {
        part.tool_invocation()
            .is_some_and(|inv| inv.tool_call_id == invocation.tool_call_id)
    });
    match existing.and_then(|index| parts[index].tool_invocation().map(|inv| (index, inv.clone()))) {
        Some((index, current)) => parts[index] = ContentPart::tool(current.upgraded_with(&invocation)),
        None => parts.push(ContentPart::tool(invocation)),
    }
}

/// Apply the non-empty invariant to freshly built content.
fn finish(mut content: MessageContent, id: Option<&str>) -> Result<MessageContent, MessageError> {
    if content.parts.is_empty() {
        if content.attachments().is_empty() {
            return Err(MessageError::MissingContent {
                id: id.map(str::to_string),
            });
        }
        // Keeps attachment-only messages visible to downstream conversion.
        content.parts.push(ContentPart::text(""));
    }
    Ok(content)
}

fn non_empty_id(id: String, generator: &IdGenerator) -> String {
    if id.trim().is_empty() { generator() } else { id }
}

/// True for anything that should be passed through instead of base64-checked.
pub(crate) fn is_url(data: &str) -> bool {
    data.starts_with("data:") || data.contains("://")
}

/// Base64-encode binary data; URLs pass through as-is.
///
/// Text that is neither a URL nor valid base64 cannot be represented and is
/// dropped with a warning.
fn encode_data(data: &DataContent, mime_type: &str) -> Option<String> {
    match data {
        DataContent::Bytes(bytes) => Some(STANDARD.encode(bytes)),
        DataContent::Text(text) if is_url(text) => Some(text.clone()),
        DataContent::Text(text) => match STANDARD.decode(text.trim()) {
            Ok(_) => Some(text.trim().to_string()),
            Err(e) => {
                warn!(mime_type, error = %e, "Dropping binary part that is neither a URL nor base64");
                None
            }
        },
    }
}

/// File part payload as an attachment URL.
fn as_url(data: &str, mime_type: &str) -> String {
    if is_url(data) {
        data.to_string()
    } else {
        format!("data:{mime_type};base64,{data}")
    }
}
