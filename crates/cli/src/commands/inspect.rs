//! `threadloom inspect` — summarize a stored thread file.

use std::path::Path;
use threadloom_core::{CanonicalMessage, ContentPart};

pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let mut messages = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let message: CanonicalMessage =
            serde_json::from_str(line).map_err(|e| format!("line {}: {e}", index + 1))?;
        messages.push(message);
    }

    println!("Thread file: {}", file.display());
    println!("=============");
    for message in &messages {
        println!("{}", summarize(message));
    }
    println!();
    println!("  {} messages", messages.len());
    Ok(())
}

/// One line per message: time, role, id and a compact part listing.
pub fn summarize(message: &CanonicalMessage) -> String {
    let parts: Vec<String> = message
        .content
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => format!("text({})", text.chars().count()),
            ContentPart::ToolInvocation { tool_invocation } => format!(
                "{}:{}",
                tool_invocation.tool_name,
                tool_invocation.state.as_str()
            ),
            other => other.kind().to_string(),
        })
        .collect();

    format!(
        "  {}  {:<9} {}  [{}]",
        message.created_at.format("%Y-%m-%d %H:%M:%S%.3f"),
        message.role.as_str(),
        message.id,
        parts.join(", ")
    )
}
