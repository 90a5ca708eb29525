//! Message storage backends for threadloom, plus the glue that moves a
//! message list's unsaved delta into storage and recalled history back out.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileStorage;
pub use in_memory::InMemoryStorage;

use threadloom_core::error::{Error, StorageError};
use threadloom_core::{MessageInput, MessageStorage, Provenance};
use threadloom_store::MessageList;
use tracing::{debug, info};

/// Persist the list's unsaved delta under its thread.
///
/// The delta is only marked saved once the backend accepted it, so a failed
/// save can be retried.
pub async fn flush_unsaved(list: &mut MessageList, storage: &dyn MessageStorage) -> Result<usize, StorageError> {
    let Some(thread_id) = list.thread_id().map(str::to_string) else {
        return Err(StorageError::NotFound("message list is not bound to a thread".into()));
    };

    let mut pending = list.input().canonical();
    pending.extend(list.response().canonical());
    if pending.is_empty() {
        return Ok(0);
    }

    let written = storage.save(&thread_id, pending).await?;
    list.drain_unsaved_messages();
    info!(thread_id, written, backend = storage.name(), "Flushed unsaved messages");
    Ok(written)
}

/// Load a thread's stored history into the list as `memory`.
///
/// `thread_id` may differ from the list's own thread (cross-thread recall).
pub async fn recall_into(
    list: &mut MessageList,
    storage: &dyn MessageStorage,
    thread_id: &str,
) -> Result<usize, Error> {
    let messages = storage.load(thread_id).await?;
    let count = messages.len();
    list.add_many(messages.into_iter().map(MessageInput::Canonical), Provenance::Memory)?;
    debug!(thread_id, count, backend = storage.name(), "Recalled messages");
    Ok(count)
}
