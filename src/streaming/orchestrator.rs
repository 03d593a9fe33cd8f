//! Tracking and resolution of agent-initiated tool calls.
//!
//! The orchestrator watches the translator's event feed through the shared
//! [`StreamSession`], correlates each announced tool call with the job the
//! vendor spawned for it, and, exactly once per session, resolves those
//! jobs through the adaptive poller and splices the results back into the
//! output ahead of the terminal marker.

use tracing::{info, warn};

use crate::media::render_media_markdown;
use crate::streaming::chunk::{ChatCompletionChunk, StreamFrame};
use crate::streaming::session::{StreamSession, ToolCallRecord};
use crate::types::ResourceKind;
use crate::upstream::ToolJobResolver;

pub(crate) fn has_pending(session: &StreamSession) -> bool {
    !session.pending_tool_calls.is_empty()
}

/// Register a newly observed tool call, keeping submission order.
/// A duplicate "add" for a known id is a no-op; returns whether the record
/// was actually added.
pub(crate) fn register(session: &mut StreamSession, record: ToolCallRecord) -> bool {
    if session
        .pending_tool_calls
        .iter()
        .any(|existing| existing.id == record.id)
    {
        return false;
    }
    session.pending_tool_calls.push(record);
    session.expected_tool_count = session.pending_tool_calls.len();
    true
}

/// Bind a job submit id to a pending tool call.
///
/// The current tool context is the binding key; when it does not name a
/// pending record the first uncorrelated one is used. Each record accepts
/// exactly one correlation.
pub(crate) fn correlate(session: &mut StreamSession, submit_id: String, kind: ResourceKind) {
    let current = session.current_tool_call_id.as_ref().and_then(|id| {
        session
            .pending_tool_calls
            .iter()
            .position(|record| &record.id == id)
    });
    let index = match current {
        Some(index) => {
            if session.pending_tool_calls[index].submit_id.is_some() {
                // Duplicate correlation for an already-bound call.
                return;
            }
            Some(index)
        }
        None => session
            .pending_tool_calls
            .iter()
            .position(|record| record.submit_id.is_none()),
    };
    let Some(index) = index else {
        warn!(%submit_id, "tool result descriptor with no uncorrelated pending call");
        return;
    };
    let record = &mut session.pending_tool_calls[index];
    info!(tool_call = %record.id, %submit_id, kind = ?kind, "correlated tool call to job");
    record.submit_id = Some(submit_id);
    record.resource_type = Some(kind);
    session.received_tool_results += 1;
}

/// Whether every announced tool call has a correlated result, making the
/// early dispatch trigger eligible to fire.
pub(crate) fn ready_to_dispatch(session: &StreamSession) -> bool {
    !session.has_processed_tools
        && session.expected_tool_count > 0
        && session.received_tool_results >= session.expected_tool_count
}

/// Resolve pending tool calls in submission order, returning the frames to
/// append to the output.
///
/// Idempotent: guarded by the session's dispatch flag, a second trigger is
/// a no-op. Calls without a correlated job are skipped with a log line;
/// one call's failure never aborts the rest of the batch.
pub(crate) async fn resolve_pending(
    session: &mut StreamSession,
    resolver: &dyn ToolJobResolver,
) -> Vec<StreamFrame> {
    if session.has_processed_tools {
        return Vec::new();
    }
    session.has_processed_tools = true;

    let pending = std::mem::take(&mut session.pending_tool_calls);
    let mut out = Vec::new();
    for mut record in pending {
        let Some(submit_id) = record.submit_id.clone() else {
            warn!(tool_call = %record.id, "skipping tool call with no correlated job");
            continue;
        };
        let kind = record.resource_type.unwrap_or(ResourceKind::Image);
        match resolver.resolve(&submit_id, kind).await {
            Ok(items) => {
                record.resolved = true;
                info!(
                    tool_call = %record.id,
                    %submit_id,
                    items = items.len(),
                    "tool call resolved"
                );
                let rendered = render_media_markdown(kind, &items);
                if !rendered.is_empty() {
                    session.emit(
                        StreamFrame::Chunk(ChatCompletionChunk::content(
                            &session.model,
                            rendered,
                        )),
                        &mut out,
                    );
                }
            }
            Err(err) => {
                warn!(
                    tool_call = %record.id,
                    %submit_id,
                    error = %err,
                    "tool call resolution failed, continuing with the rest"
                );
            }
        }
    }
    out
}
