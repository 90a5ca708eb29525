//! File-based storage — one JSON-lines file per thread.
//!
//! Each line is a JSON-encoded [`CanonicalMessage`]. Files live under a root
//! directory, default `~/.threadloom/threads/`, named after the thread id.
//!
//! Simple, portable and human-inspectable. A thread is loaded into memory
//! the first time it is touched and rewritten on every mutation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use threadloom_core::error::StorageError;
use threadloom_core::{CanonicalMessage, MessageStorage};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::in_memory::upsert;

/// A file-backed message store using JSONL (one message per line).
pub struct FileStorage {
    root: PathBuf,
    threads: Arc<RwLock<HashMap<String, Vec<CanonicalMessage>>>>,
}

impl FileStorage {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: PathBuf) -> Self {
        debug!(root = %root.display(), "File message storage opened");
        Self {
            root,
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Default root: `~/.threadloom/threads`
    pub fn default_root() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".threadloom").join("threads")
    }

    /// File holding one thread. Characters unsafe in file names become `_`.
    pub fn thread_path(&self, thread_id: &str) -> PathBuf {
        let name: String = thread_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.jsonl"))
    }

    /// Read a thread file. A missing file is an empty thread; lines that are
    /// not UTF-8 or not a message are skipped. Any other read failure is an
    /// error, so a later save never overwrites history it could not see.
    fn load_from_disk(path: &Path) -> Result<Vec<CanonicalMessage>, StorageError> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(format!("Failed to read {}: {e}", path.display()))),
        };

        let mut messages = Vec::new();
        for (index, raw) in content.split(|b| *b == b'\n').enumerate() {
            let Ok(line) = std::str::from_utf8(raw) else {
                warn!(path = %path.display(), line = index + 1, "Skipping message line that is not UTF-8");
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CanonicalMessage>(line) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!(path = %path.display(), line = index + 1, error = %e, "Skipping corrupted message line")
                }
            }
        }
        Ok(messages)
    }

    fn write_to_disk(&self, thread_id: &str, messages: &[CanonicalMessage]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::Io(format!("Failed to create storage directory: {e}")))?;

        let mut content = String::new();
        for message in messages {
            let line = serde_json::to_string(message)
                .map_err(|e| StorageError::Serialization(format!("Failed to serialize message {}: {e}", message.id)))?;
            content.push_str(&line);
            content.push('\n');
        }

        let path = self.thread_path(thread_id);
        std::fs::write(&path, &content)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Make sure a thread is cached, reading its file if needed.
    async fn ensure_loaded(&self, thread_id: &str) -> Result<(), StorageError> {
        if self.threads.read().await.contains_key(thread_id) {
            return Ok(());
        }
        let messages = Self::load_from_disk(&self.thread_path(thread_id))?;
        debug!(thread_id, count = messages.len(), "Thread loaded from disk");
        self.threads
            .write()
            .await
            .entry(thread_id.to_string())
            .or_insert(messages);
        Ok(())
    }
}

#[async_trait]
impl MessageStorage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, thread_id: &str, messages: Vec<CanonicalMessage>) -> Result<usize, StorageError> {
        self.ensure_loaded(thread_id).await?;
        let mut threads = self.threads.write().await;
        // The cache only changes once the file does.
        let mut next = threads.get(thread_id).cloned().unwrap_or_default();
        let written = upsert(&mut next, messages);
        self.write_to_disk(thread_id, &next)?;
        threads.insert(thread_id.to_string(), next);
        Ok(written)
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<CanonicalMessage>, StorageError> {
        self.ensure_loaded(thread_id).await?;
        Ok(self.threads.read().await.get(thread_id).cloned().unwrap_or_default())
    }

    async fn count(&self, thread_id: &str) -> Result<usize, StorageError> {
        self.ensure_loaded(thread_id).await?;
        Ok(self.threads.read().await.get(thread_id).map_or(0, Vec::len))
    }

    async fn clear(&self, thread_id: &str) -> Result<(), StorageError> {
        self.threads.write().await.insert(thread_id.to_string(), Vec::new());
        let path = self.thread_path(thread_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("Failed to remove {}: {e}", path.display()))),
        }
    }
}
