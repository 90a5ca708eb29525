//! `threadloom replay` — run a recorded session through a message list.
//!
//! A session file is either a JSON array or JSON lines of entries like
//! `{"source": "user", "input": {"format": "text", "message": "hi"}}`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use threadloom_core::{MessageInput, Provenance};
use threadloom_memory::{FileStorage, flush_unsaved, recall_into};
use threadloom_store::{MessageList, Subset, View};
use tracing::info;

use super::load_config;

/// One recorded `add` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEntry {
    pub source: Provenance,
    pub input: MessageInput,
}

/// Output shape of `replay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewKind {
    Canonical,
    Legacy,
    Ui,
    Prompt,
}

pub struct ReplayOptions {
    pub view: ViewKind,
    pub subset: Subset,
    pub thread: Option<String>,
    pub save_dir: Option<PathBuf>,
}

pub async fn run(
    file: &Path,
    config_path: Option<&Path>,
    options: ReplayOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    if options.thread.is_some() {
        config.thread_id = options.thread.clone();
    }

    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let entries = parse_session(&content)?;

    let mut list = MessageList::from_config(&config);
    let storage = options.save_dir.clone().map(FileStorage::new);

    if let (Some(storage), Some(thread_id)) = (&storage, config.thread_id.as_deref()) {
        let recalled = recall_into(&mut list, storage, thread_id).await?;
        info!(thread_id, recalled, "Recalled stored history");
    }

    apply(&mut list, entries)?;
    println!("{}", render(&list.view(options.subset), options.view)?);

    if let Some(storage) = &storage {
        let written = flush_unsaved(&mut list, storage).await?;
        info!(written, "Saved new messages");
    }

    Ok(())
}

/// Parse a JSON array, or fall back to one entry per non-empty line.
pub fn parse_session(content: &str) -> Result<Vec<ReplayEntry>, Box<dyn std::error::Error>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(line).map_err(|e| format!("line {}: {e}", index + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Feed every entry to the list in order.
pub fn apply(list: &mut MessageList, entries: Vec<ReplayEntry>) -> Result<(), Box<dyn std::error::Error>> {
    for (index, entry) in entries.into_iter().enumerate() {
        list.add(entry.input, entry.source)
            .map_err(|e| format!("entry {index}: {e}"))?;
    }
    Ok(())
}

pub fn render(view: &View<'_>, kind: ViewKind) -> Result<String, serde_json::Error> {
    match kind {
        ViewKind::Canonical => serde_json::to_string_pretty(&view.canonical()),
        ViewKind::Legacy => serde_json::to_string_pretty(&view.legacy()),
        ViewKind::Ui => serde_json::to_string_pretty(&view.ui()),
        ViewKind::Prompt => serde_json::to_string_pretty(&view.prompt()),
    }
}
