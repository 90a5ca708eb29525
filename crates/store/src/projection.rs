//! Read-only views over a [`MessageList`].
//!
//! A view picks a provenance subset and renders it in one of four shapes.
//! Views borrow the list and never modify it.

use threadloom_core::{CanonicalMessage, CoreMessage, LegacyMessage, Provenance, UiMessage};

use crate::convert::{to_legacy, to_prompt, to_ui};
use crate::list::{MessageList, Record};

/// Which messages a view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subset {
    #[default]
    All,
    /// Recalled from memory
    Memory,
    /// New user input not yet drained
    Input,
    /// New responses not yet drained
    Response,
}

impl Subset {
    fn includes(self, record: &Record) -> bool {
        match self {
            Subset::All => true,
            Subset::Memory => record.source == Provenance::Memory,
            Subset::Input => record.source == Provenance::User && record.unsaved,
            Subset::Response => record.source == Provenance::Response && record.unsaved,
        }
    }
}

impl std::str::FromStr for Subset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Subset::All),
            "memory" | "remembered" => Ok(Subset::Memory),
            "input" => Ok(Subset::Input),
            "response" => Ok(Subset::Response),
            other => Err(format!("unknown subset: {other}")),
        }
    }
}

/// One subset of a message list, ready to render.
pub struct View<'a> {
    list: &'a MessageList,
    subset: Subset,
}

impl<'a> View<'a> {
    pub(crate) fn new(list: &'a MessageList, subset: Subset) -> Self {
        Self { list, subset }
    }

    fn messages(&self) -> impl Iterator<Item = &'a CanonicalMessage> + use<'a> {
        let subset = self.subset;
        self.list
            .records()
            .iter()
            .filter(move |record| subset.includes(record))
            .map(|record| &record.message)
    }

    /// Canonical messages in order.
    pub fn canonical(&self) -> Vec<CanonicalMessage> {
        self.messages().cloned().collect()
    }

    /// Previous-generation shape, one per message.
    pub fn legacy(&self) -> Vec<LegacyMessage> {
        self.messages().map(to_legacy).collect()
    }

    /// UI shape. Messages left empty after dropping pending calls are omitted.
    pub fn ui(&self) -> Vec<UiMessage> {
        self.messages().filter_map(to_ui).collect()
    }

    /// Prompt-ready turns: system messages first, then the conversation.
    ///
    /// The conversation part always opens with a user turn; when it would
    /// otherwise be empty or open with the assistant, a placeholder user turn
    /// is inserted.
    pub fn prompt(&self) -> Vec<CoreMessage> {
        let mut body: Vec<CoreMessage> = self.messages().flat_map(to_prompt).collect();
        if body.first().is_none_or(|turn| turn.role != "user") {
            body.insert(0, CoreMessage::user(self.list.placeholder_user_text()));
        }

        let mut turns = self.list.system_registry().all();
        turns.extend(body);
        turns
    }
}
