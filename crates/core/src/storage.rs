//! Storage trait — durable persistence of canonical messages.
//!
//! The store itself never performs I/O. A persistence collaborator drains
//! the unsaved delta from a message list and hands it to a backend that
//! implements this trait.

use crate::error::StorageError;
use crate::message::CanonicalMessage;
use async_trait::async_trait;

/// The core MessageStorage trait.
///
/// Implementations: in-memory (for testing), JSONL file.
#[async_trait]
pub trait MessageStorage: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Upsert messages by id into a thread. Returns how many were written.
    async fn save(&self, thread_id: &str, messages: Vec<CanonicalMessage>) -> Result<usize, StorageError>;

    /// Load a thread's messages, ordered by creation time.
    async fn load(&self, thread_id: &str) -> Result<Vec<CanonicalMessage>, StorageError>;

    /// Number of messages stored for a thread.
    async fn count(&self, thread_id: &str) -> Result<usize, StorageError>;

    /// Remove every message of a thread.
    async fn clear(&self, thread_id: &str) -> Result<(), StorageError>;
}
