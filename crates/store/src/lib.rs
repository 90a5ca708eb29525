//! # Threadloom Store
//!
//! The ordered message log for one conversation.
//!
//! ```text
//!  input (text | core | ui | canonical | legacy)
//!    │
//!    ▼
//!  normalize ──► stamp ──► merge / replace / append ──► sort
//!                                                         │
//!                              views: canonical · legacy · ui · prompt
//! ```
//!
//! Every message carries a provenance tag (`memory`, `user`, `response`,
//! `context`). New user input and responses form the unsaved delta that
//! [`MessageList::drain_unsaved_messages`] hands to persistence.

pub mod convert;
pub mod fingerprint;
pub mod list;
pub mod merge;
pub mod normalize;
pub mod projection;
pub mod sequencer;
pub mod system;

pub use list::{IdGenerator, ListOptions, MessageList};
pub use merge::{MergeOutcome, merge_into};
pub use projection::{Subset, View};
pub use sequencer::TimestampSequencer;
pub use system::SystemRegistry;
