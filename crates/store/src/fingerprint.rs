//! Structural fingerprints used for deduplication.
//!
//! A fingerprint covers the discriminant fields of a part: text for text
//! parts, call id and state for tool invocations, every detail for
//! reasoning, mime type and payload for files. Tool results are *not*
//! hashed, so a late frame repeating a resolved call is a duplicate.
//!
//! Fields are hashed with SHA-256 rather than compared by length, so two
//! different strings of equal length never collide.

use sha2::{Digest, Sha256};
use threadloom_core::{ContentPart, MessageContent, ReasoningDetail};

pub type Fingerprint = [u8; 32];

/// Fingerprint of a single part.
pub fn part_fingerprint(part: &ContentPart) -> Fingerprint {
    let mut hasher = Sha256::new();
    feed_part(&mut hasher, part);
    hasher.finalize().into()
}

/// Fingerprint of a whole content payload.
pub fn content_fingerprint(content: &MessageContent) -> Fingerprint {
    let mut hasher = Sha256::new();
    feed(&mut hasher, &content.parts.len().to_le_bytes());
    for part in &content.parts {
        feed(&mut hasher, &part_fingerprint(part));
    }
    feed(&mut hasher, content.text.as_deref().unwrap_or_default().as_bytes());
    for attachment in content.attachments() {
        feed(&mut hasher, attachment.url.as_bytes());
    }
    hasher.finalize().into()
}

fn feed_part(hasher: &mut Sha256, part: &ContentPart) {
    feed(hasher, part.kind().as_bytes());
    match part {
        ContentPart::Text { text } => feed(hasher, text.as_bytes()),
        ContentPart::StepBoundary => {}
        ContentPart::ToolInvocation { tool_invocation } => {
            feed(hasher, tool_invocation.tool_call_id.as_bytes());
            feed(hasher, tool_invocation.state.as_str().as_bytes());
        }
        ContentPart::Reasoning { details } => {
            for detail in details {
                match detail {
                    ReasoningDetail::Text { text, signature } => {
                        feed(hasher, b"text");
                        feed(hasher, text.as_bytes());
                        feed(hasher, signature.as_deref().unwrap_or_default().as_bytes());
                    }
                    ReasoningDetail::Redacted { data } => {
                        feed(hasher, b"redacted");
                        feed(hasher, data.as_bytes());
                    }
                }
            }
        }
        ContentPart::File { mime_type, data } => {
            feed(hasher, mime_type.as_bytes());
            feed(hasher, data.as_bytes());
        }
    }
}

// Length-prefixed so adjacent fields cannot run together.
fn feed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
