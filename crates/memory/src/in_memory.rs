//! In-memory storage — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use threadloom_core::error::StorageError;
use threadloom_core::{CanonicalMessage, MessageStorage};
use tokio::sync::RwLock;

/// Keeps each thread's messages in a Vec, keyed by thread id.
pub struct InMemoryStorage {
    threads: Arc<RwLock<HashMap<String, Vec<CanonicalMessage>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace messages with the same id, append the rest, keep creation order.
pub(crate) fn upsert(stored: &mut Vec<CanonicalMessage>, messages: Vec<CanonicalMessage>) -> usize {
    let written = messages.len();
    for message in messages {
        match stored.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => *slot = message,
            None => stored.push(message),
        }
    }
    stored.sort_by_key(|m| m.created_at);
    written
}

#[async_trait]
impl MessageStorage for InMemoryStorage {
    fn name(&self) -> &str { "in_memory" }

    async fn save(&self, thread_id: &str, messages: Vec<CanonicalMessage>) -> Result<usize, StorageError> {
        let mut threads = self.threads.write().await;
        Ok(upsert(threads.entry(thread_id.to_string()).or_default(), messages))
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<CanonicalMessage>, StorageError> {
        Ok(self.threads.read().await.get(thread_id).cloned().unwrap_or_default())
    }

    async fn count(&self, thread_id: &str) -> Result<usize, StorageError> {
        Ok(self.threads.read().await.get(thread_id).map_or(0, Vec::len))
    }

    async fn clear(&self, thread_id: &str) -> Result<(), StorageError> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use threadloom_core::{ContentPart, MessageContent, Role};

    fn message(id: &str, ms: i64, text: &str) -> CanonicalMessage {
        CanonicalMessage::new(
            id,
            Role::User,
            MessageContent::from_parts(vec![ContentPart::text(text)]),
            Utc.timestamp_millis_opt(ms).unwrap(),
        )
    }

    #[tokio::test]
    async fn save_and_load() {
        let storage = InMemoryStorage::new();
        storage
            .save("t1", vec![message("b", 20, "second"), message("a", 10, "first")])
            .await
            .unwrap();

        let loaded = storage.load("t1").await.unwrap();
        let ids: Vec<_> = loaded.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(storage.load("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let storage = InMemoryStorage::new();
        storage.save("t1", vec![message("a", 10, "draft")]).await.unwrap();
        storage.save("t1", vec![message("a", 10, "final")]).await.unwrap();

        assert_eq!(storage.count("t1").await.unwrap(), 1);
        let loaded = storage.load("t1").await.unwrap();
        assert_eq!(loaded[0].content.last_text(), Some("final"));
    }

    #[tokio::test]
    async fn clear_thread() {
        let storage = InMemoryStorage::new();
        storage.save("t1", vec![message("a", 10, "x")]).await.unwrap();
        storage.save("t2", vec![message("b", 10, "y")]).await.unwrap();

        storage.clear("t1").await.unwrap();
        assert_eq!(storage.count("t1").await.unwrap(), 0);
        assert_eq!(storage.count("t2").await.unwrap(), 1);
    }
}
