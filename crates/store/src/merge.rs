//! Merge engine — reconciles an incoming assistant message into the last one.
//!
//! Tool invocations present in both messages (matched by call id) are
//! *anchors*. Every other incoming part is placed relative to the nearest
//! anchors around it, and skipped if an identical part already sits in that
//! window. Existing parts are never removed, so a later partial frame can
//! only add content or upgrade a call to its result.

use threadloom_core::{CanonicalMessage, ContentPart};
use tracing::trace;

use crate::fingerprint::part_fingerprint;

/// A tool-invocation part found in both messages.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    incoming: usize,
    existing: usize,
}

/// What a merge did, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub upgraded: usize,
}

/// Merge `incoming` into `existing` in place.
pub fn merge_into(existing: &mut CanonicalMessage, incoming: &CanonicalMessage) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let parts = &mut existing.content.parts;

    // Pass 1: anchors, upgrading calls that the incoming message resolves.
    let mut anchors: Vec<Anchor> = Vec::new();
    let mut queued: Vec<usize> = Vec::new();
    for (index, part) in incoming.content.parts.iter().enumerate() {
        let Some(invocation) = part.tool_invocation() else {
            queued.push(index);
            continue;
        };
        let matched = parts.iter().rposition(|p| {
            p.tool_invocation()
                .is_some_and(|inv| inv.tool_call_id == invocation.tool_call_id)
        });
        let Some(position) = matched else {
            queued.push(index);
            continue;
        };

        anchors.push(Anchor {
            incoming: index,
            existing: position,
        });
        if invocation.state.is_result() {
            if let Some(current) = parts[position].tool_invocation() {
                let upgraded = current.upgraded_with(invocation);
                parts[position] = ContentPart::tool(upgraded);
                outcome.upgraded += 1;
            }
        }
    }

    // Pass 2: place everything else between its surrounding anchors. A
    // message with no anchors at all is a continuation and appends.
    let continuation = anchors.is_empty();
    let fresh_steps = if continuation {
        fresh_step_boundaries(parts, &incoming.content.parts)
    } else {
        Vec::new()
    };
    for index in queued {
        let part = &incoming.content.parts[index];
        let before = anchors
            .iter()
            .filter(|a| a.incoming < index)
            .max_by_key(|a| a.incoming)
            .copied();
        let after = anchors
            .iter()
            .filter(|a| a.incoming > index)
            .min_by_key(|a| a.incoming)
            .copied();

        let window_end = after.map_or(parts.len(), |a| a.existing).min(parts.len());
        let window_start = before.map_or(0, |a| a.existing + 1).min(window_end);
        let target = match before {
            Some(anchor) => anchor.existing + (index - anchor.incoming),
            None if continuation => parts.len(),
            None => index,
        }
        .clamp(window_start, window_end);

        let fingerprint = part_fingerprint(part);
        let present = parts[window_start..window_end]
            .iter()
            .any(|p| part_fingerprint(p) == fingerprint);
        if present && !fresh_steps.contains(&index) {
            trace!(index, kind = part.kind(), "Part already present, skipping");
            outcome.skipped += 1;
            continue;
        }

        trace!(index, target, kind = part.kind(), "Inserting part");
        parts.insert(target, part.clone());
        outcome.inserted += 1;
        for anchor in anchors.iter_mut().filter(|a| a.existing >= target) {
            anchor.existing += 1;
        }
    }

    existing.content.sync_tool_invocations();

    if incoming.created_at > existing.created_at {
        existing.created_at = incoming.created_at;
    }

    match (existing.content.text.as_deref(), incoming.content.text.as_deref()) {
        (Some(current), Some(next)) if !current.is_empty() && !next.is_empty() && current != next => {
            existing.content.text = Some(next.to_string());
        }
        (None | Some(""), Some(next)) if !next.is_empty() => {
            existing.content.text = Some(next.to_string());
        }
        _ => {}
    }

    for attachment in incoming.content.attachments() {
        let attachments = existing.content.attachments.get_or_insert_with(Vec::new);
        if !attachments.iter().any(|a| a.url == attachment.url) {
            attachments.push(attachment.clone());
        }
    }

    if let Some(metadata) = &incoming.content.metadata {
        let merged = existing.content.metadata.get_or_insert_with(Default::default);
        for (key, value) in metadata {
            merged.insert(key.clone(), value.clone());
        }
    }

    outcome
}

/// Incoming step boundaries that open a step the existing message lacks.
///
/// Every boundary fingerprints alike, so window dedup would fold a new
/// step into the previous one. A boundary is fresh when the parts up to the
/// next boundary are non-empty and none of them is already present.
fn fresh_step_boundaries(existing: &[ContentPart], incoming: &[ContentPart]) -> Vec<usize> {
    let known: Vec<_> = existing.iter().map(part_fingerprint).collect();
    let mut fresh = Vec::new();
    for (index, part) in incoming.iter().enumerate() {
        if !matches!(part, ContentPart::StepBoundary) {
            continue;
        }
        let block: Vec<_> = incoming[index + 1..]
            .iter()
            .take_while(|p| !matches!(p, ContentPart::StepBoundary))
            .collect();
        if !block.is_empty() && block.iter().all(|p| !known.contains(&part_fingerprint(p))) {
            fresh.push(index);
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use threadloom_core::{MessageContent, Role, ToolInvocation, ToolInvocationState};

    fn assistant(id: &str, ms: i64, parts: Vec<ContentPart>) -> CanonicalMessage {
        CanonicalMessage::new(
            id,
            Role::Assistant,
            MessageContent::from_parts(parts),
            Utc.timestamp_millis_opt(ms).unwrap(),
        )
    }

    fn call(id: &str) -> ContentPart {
        ContentPart::tool(ToolInvocation::call(id, "search", json!({"q": id})))
    }

    fn result(id: &str) -> ContentPart {
        ContentPart::tool(ToolInvocation::resolved(id, "search", serde_json::Value::Null, json!("done")))
    }

    #[test]
    fn result_upgrades_call_in_place() {
        let mut existing = assistant("a1", 1, vec![ContentPart::text("checking"), call("c1")]);
        let incoming = assistant("a2", 2, vec![result("c1")]);

        let outcome = merge_into(&mut existing, &incoming);
        assert_eq!(outcome.upgraded, 1);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(existing.content.parts.len(), 2);

        let inv = existing.tool_invocation("c1").unwrap();
        assert_eq!(inv.state, ToolInvocationState::Result);
        assert_eq!(inv.args, json!({"q": "c1"}));
        let aggregate = existing.content.tool_invocations.as_ref().unwrap();
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate[0].state, ToolInvocationState::Result);
        assert_eq!(existing.created_at.timestamp_millis(), 2);
    }

    #[test]
    fn repeated_frame_adds_nothing() {
        let parts = vec![ContentPart::StepBoundary, ContentPart::text("hello"), call("c1")];
        let mut existing = assistant("a1", 1, parts.clone());
        let incoming = assistant("a1", 1, parts);

        let outcome = merge_into(&mut existing, &incoming);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(existing.content.parts.len(), 3);
        assert_eq!(existing.content.tool_invocations.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn parts_after_an_anchor_keep_their_offset() {
        let mut existing = assistant(
            "a1",
            1,
            vec![ContentPart::StepBoundary, ContentPart::text("let me look"), call("c1")],
        );
        let incoming = assistant(
            "a1",
            2,
            vec![
                ContentPart::StepBoundary,
                ContentPart::text("let me look"),
                result("c1"),
                ContentPart::StepBoundary,
                ContentPart::text("found it"),
            ],
        );

        merge_into(&mut existing, &incoming);
        let kinds: Vec<_> = existing.content.parts.iter().map(ContentPart::kind).collect();
        assert_eq!(
            kinds,
            vec!["step-start", "text", "tool-invocation", "step-start", "text"]
        );
        assert_eq!(existing.content.parts[4], ContentPart::text("found it"));
        assert!(existing.tool_invocation("c1").unwrap().state.is_result());
    }

    #[test]
    fn parts_between_anchors_land_between_them() {
        let mut existing = assistant("a1", 1, vec![call("c1"), call("c2")]);
        let incoming = assistant(
            "a1",
            2,
            vec![result("c1"), ContentPart::text("first done"), result("c2")],
        );

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.parts.len(), 3);
        assert_eq!(existing.content.parts[1], ContentPart::text("first done"));
        assert!(existing.tool_invocation("c2").unwrap().state.is_result());
    }

    #[test]
    fn unmatched_tool_part_is_inserted() {
        let mut existing = assistant("a1", 1, vec![call("c1")]);
        let incoming = assistant("a1", 2, vec![call("c1"), call("c2")]);

        let outcome = merge_into(&mut existing, &incoming);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(existing.content.parts.len(), 2);
        assert_eq!(existing.content.tool_invocations.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn unanchored_continuation_appends() {
        let mut existing = assistant("a1", 1, vec![ContentPart::text("checking"), result("c1")]);
        let incoming = assistant("a2", 2, vec![ContentPart::text("bring an umbrella")]);

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.parts.len(), 3);
        assert_eq!(existing.content.parts[2], ContentPart::text("bring an umbrella"));
    }

    #[test]
    fn continuation_opens_a_new_step() {
        let mut existing = assistant(
            "a1",
            1,
            vec![ContentPart::StepBoundary, ContentPart::text("checking"), result("c1")],
        );
        let incoming = assistant(
            "a2",
            2,
            vec![ContentPart::StepBoundary, ContentPart::text("pack an umbrella")],
        );

        let outcome = merge_into(&mut existing, &incoming);
        assert_eq!(outcome.inserted, 2);
        let kinds: Vec<_> = existing.content.parts.iter().map(ContentPart::kind).collect();
        assert_eq!(kinds, vec!["step-start", "text", "tool-invocation", "step-start", "text"]);

        // The same frame again is a no-op, boundary included.
        let outcome = merge_into(&mut existing, &incoming);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(existing.content.parts.len(), 5);
    }

    #[test]
    fn resent_steps_only_add_the_new_one() {
        let mut existing = assistant("a1", 1, vec![ContentPart::StepBoundary, ContentPart::text("one")]);
        let incoming = assistant(
            "a1",
            2,
            vec![
                ContentPart::StepBoundary,
                ContentPart::text("one"),
                ContentPart::StepBoundary,
                ContentPart::text("two"),
            ],
        );

        merge_into(&mut existing, &incoming);
        assert_eq!(
            existing.content.parts,
            vec![
                ContentPart::StepBoundary,
                ContentPart::text("one"),
                ContentPart::StepBoundary,
                ContentPart::text("two"),
            ]
        );
    }

    #[test]
    fn part_before_first_anchor_uses_its_own_index() {
        let mut existing = assistant("a1", 1, vec![ContentPart::StepBoundary, call("c1")]);
        let incoming = assistant(
            "a1",
            2,
            vec![ContentPart::StepBoundary, ContentPart::text("thinking aloud"), result("c1")],
        );

        merge_into(&mut existing, &incoming);
        let kinds: Vec<_> = existing.content.parts.iter().map(ContentPart::kind).collect();
        assert_eq!(kinds, vec!["step-start", "text", "tool-invocation"]);
    }

    #[test]
    fn omitted_parts_are_preserved() {
        let mut existing = assistant(
            "a1",
            1,
            vec![ContentPart::text("earlier transcript"), call("c1")],
        );
        let incoming = assistant("a1", 2, vec![result("c1")]);

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.parts[0], ContentPart::text("earlier transcript"));
    }

    #[test]
    fn result_never_regresses_to_call() {
        let mut existing = assistant("a1", 1, vec![result("c1")]);
        let incoming = assistant("a1", 2, vec![call("c1")]);

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.parts.len(), 1);
        assert!(existing.tool_invocation("c1").unwrap().state.is_result());
    }

    #[test]
    fn flattened_text_is_last_writer_wins() {
        let mut existing = assistant("a1", 5, vec![ContentPart::text("v1")]);
        existing.content.text = Some("v1".into());
        let mut incoming = assistant("a1", 3, vec![ContentPart::text("v2")]);
        incoming.content.text = Some("v2".into());

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.text.as_deref(), Some("v2"));
        // Timestamp only moves forward.
        assert_eq!(existing.created_at.timestamp_millis(), 5);
    }

    #[test]
    fn flattened_text_filled_when_missing() {
        let mut existing = assistant("a1", 1, vec![call("c1")]);
        let mut incoming = assistant("a1", 2, vec![ContentPart::text("done")]);
        incoming.content.text = Some("done".into());

        merge_into(&mut existing, &incoming);
        assert_eq!(existing.content.text.as_deref(), Some("done"));
    }
}
