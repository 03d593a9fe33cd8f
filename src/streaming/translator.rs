//! Translation of decoded agent events into chat-completion chunks.
//!
//! The translator consumes [`StreamEvent`]s in arrival order and appends
//! standardized chunks to the output, mutating the [`StreamSession`] it is
//! handed. Tool-call bookkeeping is delegated to the orchestrator; the
//! translator only detects and forwards.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::streaming::chunk::{ChatCompletionChunk, StreamFrame};
use crate::streaming::decoder::{EventKind, StreamEvent};
use crate::streaming::orchestrator;
use crate::streaming::session::{StreamSession, ToolCallRecord};
use crate::types::ResourceKind;

static TOOL_CALL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/message/tool_calls/(\d+)$").expect("valid tool-call path regex"));

static CONTENT_PARTS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/message/content/content_parts/\d+").expect("valid content path regex"));

/// Handle one decoded event, returning the chunks to append to the output.
pub fn handle_event(session: &mut StreamSession, event: &StreamEvent) -> Vec<StreamFrame> {
    let mut out = Vec::new();
    match &event.kind {
        EventKind::System => on_system(session, event.payload.as_json(), &mut out),
        EventKind::Message => on_message(session, event.payload.as_json(), &mut out),
        EventKind::Delta => on_delta(session, event.payload.as_json(), &mut out),
        EventKind::Other(name) => {
            debug!(event = %name, "ignoring unrecognized event type");
        }
    }
    out
}

fn on_system(session: &mut StreamSession, json: Option<&Value>, out: &mut Vec<StreamFrame>) {
    let Some(json) = json else { return };
    if json.get("type").and_then(Value::as_str) == Some("stream_complete") {
        session.mark_agent_finished();
        if !orchestrator::has_pending(session)
            && let Some(done) = session.finalize()
        {
            out.push(done);
        }
    }
}

fn on_message(session: &mut StreamSession, json: Option<&Value>, out: &mut Vec<StreamFrame>) {
    let Some(json) = json else { return };
    let status = json.get("status").and_then(Value::as_str);

    if !session.started() && status == Some("in_progress") {
        session.emit(
            StreamFrame::Chunk(ChatCompletionChunk::role_open(&session.model)),
            out,
        );
        session.mark_started();
        return;
    }

    // Tool-authored messages refresh the current tool context and may carry
    // the result descriptor that binds a tool call to its job.
    if json.pointer("/author/role").and_then(Value::as_str) == Some("tool") {
        session.current_tool_call_id = json
            .pointer("/metadata/tool_call_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let text = content_parts_text(json);
        if let Some((submit_id, kind)) = parse_result_descriptor(&text) {
            orchestrator::correlate(session, submit_id, kind);
        }
    }

    let text = content_parts_text(json);
    emit_text(session, &text, out);

    if status == Some("finished_successfully") && !session.agent_finished() {
        session.emit(
            StreamFrame::Chunk(ChatCompletionChunk::finish(&session.model)),
            out,
        );
        session.mark_agent_finished();
        // The terminal marker is deferred while tool calls remain pending.
        if !orchestrator::has_pending(session)
            && let Some(done) = session.finalize()
        {
            out.push(done);
        }
    }
}

fn on_delta(session: &mut StreamSession, json: Option<&Value>, out: &mut Vec<StreamFrame>) {
    let Some(json) = json else { return };
    let op = json.get("op").and_then(Value::as_str);
    let path = json.get("path").and_then(Value::as_str).unwrap_or("");
    let value = json.get("value").and_then(Value::as_str);

    match op {
        Some("add") => {
            let Some(index) = tool_call_path_index(path) else {
                return;
            };
            let Some(raw) = value else { return };
            let Some(record) = parse_tool_call_descriptor(raw) else {
                debug!(path, "tool-call add with undecodable descriptor");
                return;
            };
            // Duplicate ids are no-ops in the orchestrator; only the first
            // registration surfaces as a tool_calls delta.
            if orchestrator::register(session, record.clone()) {
                session.emit(
                    StreamFrame::Chunk(ChatCompletionChunk::tool_call(
                        &session.model,
                        index,
                        record.id,
                        record.name,
                        record.arguments,
                    )),
                    out,
                );
            }
        }
        Some("replace") => {
            if CONTENT_PARTS_PATH.is_match(path)
                && let Some(raw) = value
                && let Some((submit_id, kind)) = parse_result_descriptor(raw)
            {
                orchestrator::correlate(session, submit_id, kind);
            }
        }
        Some("append") => {
            if let Some(text) = value {
                emit_text(session, text, out);
            }
        }
        _ => {}
    }
}

/// Emit appendable text as a content delta, unless the suppression
/// predicate identifies it as a machine-readable tool-result payload.
fn emit_text(session: &StreamSession, text: &str, out: &mut Vec<StreamFrame>) {
    if text.is_empty() || is_tool_result_payload(text) {
        return;
    }
    let chunk = match &session.current_tool_call_id {
        Some(tool_call_id) => {
            ChatCompletionChunk::tool_content(&session.model, text, tool_call_id)
        }
        None => ChatCompletionChunk::content(&session.model, text),
    };
    session.emit(StreamFrame::Chunk(chunk), out);
}

/// Whether a text fragment is a raw tool-result payload rather than
/// conversational content.
///
/// Heuristic: it carries both a job-identifier marker and a history marker.
/// Isolated here so it can be replaced with a structural check if the
/// upstream protocol is ever clarified.
pub fn is_tool_result_payload(text: &str) -> bool {
    text.contains("submit_id") && text.contains("history_")
}

/// Explicit capture extraction for the tool-call array path.
fn tool_call_path_index(path: &str) -> Option<usize> {
    let captures = TOOL_CALL_PATH.captures(path)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Parse a result descriptor: a JSON object carrying at least a
/// `submit_id`, optionally a `resource_type` (defaulting to image).
fn parse_result_descriptor(text: &str) -> Option<(String, ResourceKind)> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let submit_id = value.get("submit_id").and_then(Value::as_str)?;
    let kind = match value.get("resource_type").and_then(Value::as_str) {
        Some("video") => ResourceKind::Video,
        _ => ResourceKind::Image,
    };
    Some((submit_id.to_string(), kind))
}

/// Parse the descriptor embedded in a tool-call "add" delta.
fn parse_tool_call_descriptor(raw: &str) -> Option<ToolCallRecord> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let id = value.get("id").and_then(Value::as_str)?;
    let func = value.get("func").or_else(|| value.get("function"))?;
    let name = func.get("name").and_then(Value::as_str)?;
    let arguments = func
        .get("arguments")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(ToolCallRecord::new(id, name, arguments))
}

fn content_parts_text(json: &Value) -> String {
    json.pointer("/content/content_parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
