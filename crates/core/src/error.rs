//! Error types for the threadloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all threadloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Message ingestion errors ---
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Which ownership tag failed the identity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipField {
    Thread,
    Resource,
}

impl std::fmt::Display for OwnershipField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thread => write!(f, "threadId"),
            Self::Resource => write!(f, "resourceId"),
        }
    }
}

/// Errors raised while normalizing or adding a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("Unknown message role '{role}'{}", describe_id(.id))]
    UnknownRole { role: String, id: Option<String> },

    #[error("Message has neither content nor parts{}", describe_id(.id))]
    MissingContent { id: Option<String> },

    #[error("Message {field} '{found}' does not match the store's {field} '{expected}'{}", describe_id(.id))]
    OwnershipMismatch {
        field: OwnershipField,
        expected: String,
        found: String,
        id: Option<String>,
    },
}

fn describe_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (message id: {id})"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Failed to (de)serialize stored messages: {0}")]
    Serialization(String),

    #[error("Thread not found: {0}")]
    NotFound(String),
}
