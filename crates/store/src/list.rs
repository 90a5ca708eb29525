//! The message list — one conversation's ordered, deduplicated log.
//!
//! Every `add` runs the same pipeline:
//!
//! 1. **Route** system-role input to the system registry
//! 2. **Normalize** the input into a canonical message (validation, ownership)
//! 3. **Stamp** it with the sequencer
//! 4. **Merge** it into the last assistant message, replace an existing
//!    message with the same id, or append it
//! 5. **Re-sort** by `createdAt`, ties by insertion order
//!
//! The list is a plain single-owner value with no interior locking. Callers
//! that feed it from concurrent streams must serialize their calls.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use threadloom_config::StoreConfig;
use threadloom_core::{
    CanonicalMessage, CoreMessage, MessageError, MessageInput, Provenance, Role,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fingerprint::content_fingerprint;
use crate::merge::merge_into;
use crate::normalize::Normalizer;
use crate::projection::{Subset, View};
use crate::sequencer::TimestampSequencer;
use crate::system::SystemRegistry;

/// Produces ids for messages that arrive without one.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Construction options for a [`MessageList`].
#[derive(Clone)]
pub struct ListOptions {
    pub thread_id: Option<String>,
    pub resource_id: Option<String>,
    /// Defaults to random UUIDs
    pub id_generator: Option<IdGenerator>,
    pub merge_across_recall: bool,
    pub placeholder_user_text: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            thread_id: None,
            resource_id: None,
            id_generator: None,
            merge_across_recall: true,
            placeholder_user_text: " ".into(),
        }
    }
}

impl std::fmt::Debug for ListOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListOptions")
            .field("thread_id", &self.thread_id)
            .field("resource_id", &self.resource_id)
            .field("id_generator", &self.id_generator.as_ref().map(|_| "custom"))
            .field("merge_across_recall", &self.merge_across_recall)
            .field("placeholder_user_text", &self.placeholder_user_text)
            .finish()
    }
}

/// A stored message plus its provenance tag.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub message: CanonicalMessage,
    pub source: Provenance,
    /// Part of the delta not yet handed to persistence
    pub unsaved: bool,
    seq: u64,
}

impl Record {
    fn retag(&mut self, source: Provenance) {
        self.source = source;
        self.unsaved = source.is_unsaved();
    }
}

/// Ordered log of canonical messages for one conversation.
pub struct MessageList {
    records: Vec<Record>,
    system: SystemRegistry,
    sequencer: TimestampSequencer,
    thread_id: Option<String>,
    resource_id: Option<String>,
    id_generator: IdGenerator,
    merge_across_recall: bool,
    placeholder_user_text: String,
    next_seq: u64,
}

impl std::fmt::Debug for MessageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageList")
            .field("records", &self.records)
            .field("system", &self.system)
            .field("sequencer", &self.sequencer)
            .field("thread_id", &self.thread_id)
            .field("resource_id", &self.resource_id)
            .field("id_generator", &"custom")
            .field("merge_across_recall", &self.merge_across_recall)
            .field("placeholder_user_text", &self.placeholder_user_text)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl MessageList {
    /// An unbound list with default options.
    pub fn new() -> Self {
        Self::with_options(ListOptions::default())
    }

    pub fn with_options(options: ListOptions) -> Self {
        Self {
            records: Vec::new(),
            system: SystemRegistry::new(),
            sequencer: TimestampSequencer::new(),
            thread_id: options.thread_id,
            resource_id: options.resource_id,
            id_generator: options
                .id_generator
                .unwrap_or_else(|| Arc::new(|| Uuid::new_v4().to_string())),
            merge_across_recall: options.merge_across_recall,
            placeholder_user_text: options.placeholder_user_text,
            next_seq: 0,
        }
    }

    /// Build a list from configuration, registering its system messages.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut list = Self::with_options(ListOptions {
            thread_id: config.thread_id.clone(),
            resource_id: config.resource_id.clone(),
            id_generator: None,
            merge_across_recall: config.merge_across_recall,
            placeholder_user_text: config.placeholder_user_text.clone(),
        });
        for prompt in &config.system {
            list.add_system(prompt.content.clone(), prompt.tag.as_deref());
        }
        debug!(
            thread_id = ?list.thread_id,
            system_messages = list.system.len(),
            "Message list configured"
        );
        list
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub(crate) fn placeholder_user_text(&self) -> &str {
        &self.placeholder_user_text
    }

    // ── Ingestion ──

    /// Add one message under the given provenance.
    ///
    /// Malformed input (unknown role, no content) and foreign thread or
    /// resource ids are rejected without touching the list.
    pub fn add(&mut self, input: impl Into<MessageInput>, source: Provenance) -> Result<&mut Self, MessageError> {
        let input = input.into();
        if let Some(text) = system_text(&input) {
            debug!(%source, "Routing system message to registry");
            self.system.add(text, None);
            return Ok(self);
        }

        let kind = input.kind();
        let latest_stored = self.records.iter().map(|r| r.message.created_at).max();
        let normalizer = Normalizer {
            thread_id: self.thread_id.as_deref(),
            resource_id: self.resource_id.as_deref(),
            id_generator: &self.id_generator,
        };
        let sequencer = &mut self.sequencer;
        let message = normalizer
            .normalize(input, source, |supplied| sequencer.next(source, supplied, latest_stored))
            .inspect_err(|e| warn!(error = %e, kind, %source, "Rejected message"))?;

        if message.content.is_empty() {
            warn!(id = %message.id, kind, "Message has no content left after normalization, dropping");
            return Ok(self);
        }

        self.integrate(message, source);
        Ok(self)
    }

    /// Add several messages in order, stopping at the first error.
    pub fn add_many<I, M>(&mut self, inputs: I, source: Provenance) -> Result<&mut Self, MessageError>
    where
        I: IntoIterator<Item = M>,
        M: Into<MessageInput>,
    {
        for input in inputs {
            self.add(input, source)?;
        }
        Ok(self)
    }

    fn integrate(&mut self, message: CanonicalMessage, source: Provenance) {
        if let Some(index) = self.records.len().checked_sub(1) {
            if self.should_merge(&self.records[index], &message, source) {
                let mut merged = self.records[index].message.clone();
                let outcome = merge_into(&mut merged, &message);
                debug!(
                    id = %merged.id,
                    incoming = %message.id,
                    inserted = outcome.inserted,
                    upgraded = outcome.upgraded,
                    skipped = outcome.skipped,
                    "Merged assistant message"
                );
                let record = &mut self.records[index];
                record.message = merged;
                record.retag(source);
                self.sort();
                return;
            }
        }

        match self.records.iter().position(|r| r.message.id == message.id) {
            Some(index) => {
                let record = &mut self.records[index];
                if content_fingerprint(&record.message.content) != content_fingerprint(&message.content) {
                    debug!(id = %message.id, %source, "Replacing message with changed content");
                    record.message = message;
                } else {
                    debug!(id = %message.id, %source, "Message already stored, unchanged");
                }
                record.retag(source);
            }
            None => {
                debug!(
                    id = %message.id,
                    role = %message.role,
                    %source,
                    high_water = ?self.sequencer.high_water_mark(),
                    "Appending message"
                );
                let seq = self.next_seq;
                self.next_seq += 1;
                self.records.push(Record {
                    message,
                    source,
                    unsaved: source.is_unsaved(),
                    seq,
                });
            }
        }
        self.sort();
    }

    fn should_merge(&self, latest: &Record, incoming: &CanonicalMessage, source: Provenance) -> bool {
        latest.message.role == Role::Assistant
            && incoming.role == Role::Assistant
            && latest.message.thread_id == incoming.thread_id
            && source != Provenance::Memory
            && (self.merge_across_recall || latest.source != Provenance::Memory)
    }

    fn sort(&mut self) {
        self.records.sort_by(|a, b| {
            a.message
                .created_at
                .cmp(&b.message.created_at)
                .then(a.seq.cmp(&b.seq))
        });
    }

    // ── System messages ──

    /// Register a system message. Returns `false` for a duplicate.
    pub fn add_system(&mut self, content: impl Into<String>, tag: Option<&str>) -> bool {
        self.system.add(content, tag)
    }

    /// System messages for one tag (`None` = untagged).
    pub fn system_messages(&self, tag: Option<&str>) -> Vec<CoreMessage> {
        self.system.messages(tag)
    }

    pub fn clear_system_messages(&mut self, tag: Option<&str>) {
        self.system.clear(tag);
    }

    pub(crate) fn system_registry(&self) -> &SystemRegistry {
        &self.system
    }

    // ── Unsaved delta ──

    /// Take the new user input and responses added since the last drain.
    ///
    /// The messages stay in the list; only their unsaved marker is cleared.
    pub fn drain_unsaved_messages(&mut self) -> Vec<CanonicalMessage> {
        let drained: Vec<CanonicalMessage> = self
            .records
            .iter_mut()
            .filter(|r| r.unsaved)
            .map(|r| {
                r.unsaved = false;
                r.message.clone()
            })
            .collect();
        debug!(count = drained.len(), "Drained unsaved messages");
        drained
    }

    /// Earliest `createdAt` among unsaved messages.
    pub fn earliest_unsaved_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter(|r| r.unsaved)
            .map(|r| r.message.created_at)
            .min()
    }

    // ── Reading ──

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalMessage> {
        self.records.iter().find(|r| r.message.id == id).map(|r| &r.message)
    }

    /// Provenance recorded for a message.
    pub fn source_of(&self, id: &str) -> Option<Provenance> {
        self.records.iter().find(|r| r.message.id == id).map(|r| r.source)
    }

    /// Text of the most recent user message.
    pub fn latest_user_text(&self) -> Option<String> {
        self.records
            .iter()
            .rev()
            .find(|r| r.message.role == Role::User)
            .and_then(|r| {
                r.message
                    .content
                    .text
                    .clone()
                    .or_else(|| r.message.content.last_text().map(str::to_string))
            })
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// Projection over one provenance subset.
    pub fn view(&self, subset: Subset) -> View<'_> {
        View::new(self, subset)
    }

    /// Every message.
    pub fn all(&self) -> View<'_> {
        self.view(Subset::All)
    }

    /// Messages recalled from memory.
    pub fn remembered(&self) -> View<'_> {
        self.view(Subset::Memory)
    }

    /// New, unsaved user input.
    pub fn input(&self) -> View<'_> {
        self.view(Subset::Input)
    }

    /// New, unsaved responses.
    pub fn response(&self) -> View<'_> {
        self.view(Subset::Response)
    }
}

impl Default for MessageList {
    fn default() -> Self {
        Self::new()
    }
}

/// System-role input is kept out of the log.
fn system_text(input: &MessageInput) -> Option<String> {
    match input {
        MessageInput::Core(message) if message.role == "system" => Some(message.text()),
        MessageInput::Ui(message) if message.role == "system" => Some(message.content.clone()),
        MessageInput::Legacy(message) if message.role == "system" => {
            Some(CoreMessage::new("system", message.content.clone()).text())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use threadloom_core::{
        ContentPart, CoreItem, MessageContent, ToolInvocation, ToolInvocationState,
    };

    fn bound_list() -> MessageList {
        MessageList::with_options(ListOptions {
            thread_id: Some("thread-1".into()),
            resource_id: Some("user-1".into()),
            ..ListOptions::default()
        })
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn stored(id: &str, role: Role, ms: i64, text: &str) -> CanonicalMessage {
        CanonicalMessage::new(
            id,
            role,
            MessageContent::from_parts(vec![ContentPart::text(text)]),
            at(ms),
        )
    }

    fn tool_call(id: &str) -> CoreMessage {
        CoreMessage::assistant(vec![CoreItem::ToolCall {
            tool_call_id: id.into(),
            tool_name: "search".into(),
            args: json!({"q": "rust"}),
        }])
    }

    fn tool_result(id: &str) -> CoreMessage {
        CoreMessage::tool(vec![CoreItem::ToolResult {
            tool_call_id: id.into(),
            tool_name: "search".into(),
            result: json!(["crate"]),
        }])
    }

    #[test]
    fn messages_stay_sorted_with_unique_ids() {
        let mut list = bound_list();
        list.add("first", Provenance::User).unwrap();
        list.add(stored("old", Role::User, 10, "ancient"), Provenance::Memory).unwrap();
        list.add("second", Provenance::User).unwrap();

        let all = list.all().canonical();
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        let mut ids: Vec<_> = all.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn tool_result_merges_into_previous_assistant_message() {
        let mut list = bound_list();
        list.add("search for rust", Provenance::User).unwrap();
        list.add(tool_call("c1"), Provenance::Response).unwrap();
        list.add(tool_result("c1"), Provenance::Response).unwrap();

        assert_eq!(list.len(), 2);
        let assistant = &list.all().canonical()[1];
        assert_eq!(assistant.content.parts.len(), 1);
        let aggregate = assistant.content.tool_invocations.as_ref().unwrap();
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate[0].state, ToolInvocationState::Result);
    }

    #[test]
    fn memory_messages_are_never_merged() {
        let mut list = bound_list();
        list.add(stored("a1", Role::Assistant, 100, "one"), Provenance::Memory).unwrap();
        list.add(stored("a2", Role::Assistant, 200, "two"), Provenance::Memory).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn merge_across_recall_can_be_disabled() {
        let mut list = MessageList::with_options(ListOptions {
            thread_id: Some("thread-1".into()),
            merge_across_recall: false,
            ..ListOptions::default()
        });
        list.add(stored("a1", Role::Assistant, 100, "recalled"), Provenance::Memory).unwrap();
        list.add(CoreMessage::assistant(vec![CoreItem::Text { text: "fresh".into() }]), Provenance::Response)
            .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn same_id_is_replaced_or_ignored() {
        let mut list = bound_list();
        list.add(stored("u1", Role::User, 100, "draft"), Provenance::Memory).unwrap();
        list.add(stored("u1", Role::User, 100, "draft"), Provenance::Memory).unwrap();
        assert_eq!(list.len(), 1);

        list.add(stored("u1", Role::User, 100, "final"), Provenance::User).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("u1").unwrap().content.last_text(), Some("final"));
        assert_eq!(list.source_of("u1"), Some(Provenance::User));
    }

    #[test]
    fn merged_message_is_retagged_with_incoming_source() {
        let mut list = bound_list();
        list.add(stored("a1", Role::Assistant, 100, "recalled"), Provenance::Memory).unwrap();
        list.add(tool_call("c1"), Provenance::Response).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.source_of("a1"), Some(Provenance::Response));
        assert_eq!(list.response().canonical().len(), 1);
    }

    #[test]
    fn drain_returns_delta_once() {
        let mut list = bound_list();
        list.add(stored("m0", Role::User, 10, "history"), Provenance::Memory).unwrap();
        list.add("question", Provenance::User).unwrap();
        list.add(CoreMessage::assistant(vec![CoreItem::Text { text: "answer".into() }]), Provenance::Response)
            .unwrap();
        list.add("background", Provenance::Context).unwrap();

        let earliest = list.earliest_unsaved_timestamp().unwrap();
        let drained = list.drain_unsaved_messages();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].created_at, earliest);
        assert!(list.drain_unsaved_messages().is_empty());
        assert!(list.earliest_unsaved_timestamp().is_none());
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn system_input_goes_to_registry() {
        let mut list = bound_list();
        list.add(CoreMessage::system("be brief"), Provenance::User).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.system_messages(None).len(), 1);
    }

    #[test]
    fn rejected_input_leaves_list_untouched() {
        let mut list = bound_list();
        let err = list
            .add(CoreMessage::new("critic", threadloom_core::CoreContent::Text("no".into())), Provenance::User)
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownRole { .. }));
        assert!(list.is_empty());
    }

    #[test]
    fn custom_id_generator_is_used() {
        let mut list = MessageList::with_options(ListOptions {
            id_generator: Some(Arc::new(|| "fixed-id".to_string())),
            ..ListOptions::default()
        });
        list.add("hello", Provenance::User).unwrap();
        assert!(list.get("fixed-id").is_some());
    }

    #[test]
    fn latest_user_text_skips_assistant_turns() {
        let mut list = bound_list();
        list.add("first", Provenance::User).unwrap();
        list.add("second", Provenance::User).unwrap();
        list.add(CoreMessage::assistant(vec![CoreItem::Text { text: "reply".into() }]), Provenance::Response)
            .unwrap();
        assert_eq!(list.latest_user_text().as_deref(), Some("second"));
    }

    #[test]
    fn config_binds_identity_and_system_prompts() {
        let config = StoreConfig {
            thread_id: Some("t-9".into()),
            system: vec![threadloom_config::SystemPromptConfig {
                content: "You are helpful.".into(),
                tag: Some("persona".into()),
            }],
            ..StoreConfig::default()
        };
        let mut list = MessageList::from_config(&config);
        assert_eq!(list.thread_id(), Some("t-9"));
        assert_eq!(list.system_messages(Some("persona")).len(), 1);

        list.add("hi", Provenance::User).unwrap();
        assert_eq!(list.all().canonical()[0].thread_id.as_deref(), Some("t-9"));
    }

    #[test]
    fn replayed_assistant_delta_is_idempotent() {
        let mut list = bound_list();
        list.add("go", Provenance::User).unwrap();
        let mut delta = stored("a1", Role::Assistant, 0, "working on it");
        delta.content.parts.push(ContentPart::tool(ToolInvocation::call("c1", "run", json!({}))));
        delta.content.sync_tool_invocations();
        delta.thread_id = Some("thread-1".into());

        list.add(delta.clone(), Provenance::Response).unwrap();
        list.add(delta, Provenance::Response).unwrap();

        let assistant = list.get("a1").unwrap();
        assert_eq!(assistant.content.parts.len(), 2);
        assert_eq!(assistant.content.tool_invocations.as_ref().unwrap().len(), 1);
    }
}
