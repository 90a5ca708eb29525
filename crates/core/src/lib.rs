//! # Threadloom Core
//!
//! Domain types, traits, and error definitions for the threadloom
//! conversation store. This crate has **no framework dependencies**; it
//! defines the message model that the other crates implement against.
//!
//! ## Message shapes
//!
//! Messages enter the system in one of several shapes (see [`MessageInput`]):
//! - plain text
//! - role-tagged content arrays ([`CoreMessage`])
//! - UI messages with parts and attachments ([`UiMessage`])
//! - stored messages of the current ([`CanonicalMessage`]) or legacy
//!   ([`LegacyMessage`]) generation
//!
//! All of them are normalized into [`CanonicalMessage`] by the store crate.

pub mod error;
pub mod input;
pub mod message;
pub mod part;
pub mod provenance;
pub mod storage;
pub mod timestamp;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MessageError, Result, StorageError};
pub use input::{CoreContent, CoreItem, CoreMessage, DataContent, LegacyKind, LegacyMessage, MessageInput, UiMessage};
pub use message::{CanonicalMessage, MessageContent, Role};
pub use part::{Attachment, ContentPart, ReasoningDetail, ToolInvocation, ToolInvocationState};
pub use provenance::Provenance;
pub use storage::MessageStorage;
