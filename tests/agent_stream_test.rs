//! End-to-end tests for the agent stream pipeline: decoded events in,
//! OpenAI-compatible chunks and exactly one terminal marker out.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use genbridge::streaming::{FrameStream, StreamFrame, aggregate_frames};
use genbridge::{
    AgentStreamOptions, CancelHandle, GenError, MediaItem, ResourceKind, ToolJobResolver,
    run_agent_stream,
};

struct StubResolver {
    calls: Mutex<Vec<(String, ResourceKind)>>,
    fail_on: Option<String>,
}

impl StubResolver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        })
    }

    fn failing_on(submit_id: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(submit_id.to_string()),
        })
    }

    fn calls(&self) -> Vec<(String, ResourceKind)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ToolJobResolver for StubResolver {
    async fn resolve(
        &self,
        submit_id: &str,
        kind: ResourceKind,
    ) -> Result<Vec<MediaItem>, GenError> {
        self.calls
            .lock()
            .expect("lock")
            .push((submit_id.to_string(), kind));
        if self.fail_on.as_deref() == Some(submit_id) {
            return Err(GenError::GenerationFailed {
                code: None,
                message: "resolution failed".to_string(),
            });
        }
        Ok(vec![MediaItem::new(format!(
            "https://cdn.example/{submit_id}.webp"
        ))])
    }
}

fn sse(event: &str, data: &str) -> Vec<u8> {
    format!("event: {event}\ndata: {data}\n\n").into_bytes()
}

fn options() -> AgentStreamOptions {
    AgentStreamOptions {
        resolution_debounce: Duration::from_millis(10),
        ..AgentStreamOptions::default()
    }
}

fn stream_of(chunks: Vec<Vec<u8>>) -> impl futures_util::Stream<Item = Result<Vec<u8>, GenError>> {
    futures_util::stream::iter(chunks.into_iter().map(Ok))
}

async fn collect(frames: FrameStream) -> Vec<Result<StreamFrame, GenError>> {
    frames.collect().await
}

fn done_count(frames: &[Result<StreamFrame, GenError>]) -> usize {
    frames
        .iter()
        .filter(|frame| matches!(frame, Ok(StreamFrame::Done)))
        .count()
}

fn contents(frames: &[Result<StreamFrame, GenError>]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Ok(StreamFrame::Chunk(chunk)) => chunk.choices[0].delta.content.clone(),
            _ => None,
        })
        .collect()
}

const TOOL_ADD: &str = r#"{"op":"add","path":"/message/tool_calls/0","value":"{\"id\":\"tc1\",\"func\":{\"name\":\"generate_image\",\"arguments\":\"{}\"}}"}"#;

const TOOL_RESULT_MSG: &str = r#"{"author":{"role":"tool"},"metadata":{"tool_call_id":"tc1"},"content":{"content_parts":[{"text":"{\"submit_id\":\"s1\",\"resource_type\":\"image\",\"history_record_id\":\"h1\"}"}]}}"#;

#[tokio::test]
async fn plain_stream_produces_role_content_finish_and_one_done() {
    let resolver = StubResolver::new();
    let bytes = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", r#"{"op":"append","value":"Hello "}"#),
        sse("delta", r#"{"op":"append","value":"world"}"#),
        sse("message", r#"{"status":"finished_successfully"}"#),
    ]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver.clone(),
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(done_count(&frames), 1);
    assert!(matches!(
        frames.last(),
        Some(Ok(StreamFrame::Done))
    ));
    assert_eq!(
        contents(&frames),
        vec!["".to_string(), "Hello ".to_string(), "world".to_string()]
    );
    assert!(resolver.calls().is_empty());

    let finish_reasons: Vec<_> = frames
        .iter()
        .filter_map(|frame| match frame {
            Ok(StreamFrame::Chunk(chunk)) => chunk.choices[0].finish_reason.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(finish_reasons, vec!["stop".to_string()]);
}

#[tokio::test]
async fn zero_events_still_terminates_exactly_once() {
    let resolver = StubResolver::new();
    let frames = collect(run_agent_stream(
        stream_of(vec![]),
        resolver,
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(frames.len(), 1);
    assert_eq!(done_count(&frames), 1);
}

#[tokio::test]
async fn single_tool_call_resolves_once_and_terminates_once() {
    let resolver = StubResolver::new();
    let bytes = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", TOOL_ADD),
        sse("message", TOOL_RESULT_MSG),
    ]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver.clone(),
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(
        resolver.calls(),
        vec![("s1".to_string(), ResourceKind::Image)]
    );
    assert_eq!(done_count(&frames), 1);

    // The raw descriptor payload must not leak into visible content.
    let visible = contents(&frames).join("");
    assert!(!visible.contains("submit_id"));
    assert!(visible.contains("![image_0](https://cdn.example/s1.webp)"));

    // The tool call itself surfaced as a tool_calls delta.
    let tool_call_ids: Vec<_> = frames
        .iter()
        .filter_map(|frame| match frame {
            Ok(StreamFrame::Chunk(chunk)) => chunk.choices[0]
                .delta
                .tool_calls
                .as_ref()
                .map(|calls| calls[0].id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(tool_call_ids, vec!["tc1".to_string()]);
}

#[tokio::test]
async fn all_correlated_tools_resolve_before_connection_end() {
    let resolver = StubResolver::new();
    let head = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", TOOL_ADD),
        sse(
            "delta",
            r#"{"op":"add","path":"/message/tool_calls/1","value":"{\"id\":\"tc2\",\"func\":{\"name\":\"generate_video\",\"arguments\":\"{}\"}}"}"#,
        ),
        sse("message", TOOL_RESULT_MSG),
        sse(
            "message",
            r#"{"author":{"role":"tool"},"metadata":{"tool_call_id":"tc2"},"content":{"content_parts":[{"text":"{\"submit_id\":\"s2\",\"resource_type\":\"video\",\"history_record_id\":\"h2\"}"}]}}"#,
        ),
    ]);
    // The connection never ends; termination proves early dispatch fired.
    let bytes = head.chain(futures_util::stream::pending());

    let frames = tokio::time::timeout(
        Duration::from_secs(5),
        collect(run_agent_stream(
            bytes,
            resolver.clone(),
            options(),
            CancelHandle::new(),
        )),
    )
    .await
    .expect("resolution must fire on the second correlation, not at stream end");

    assert_eq!(
        resolver.calls(),
        vec![
            ("s1".to_string(), ResourceKind::Image),
            ("s2".to_string(), ResourceKind::Video),
        ]
    );
    assert_eq!(done_count(&frames), 1);
    let visible = contents(&frames).join("");
    let image_pos = visible.find("s1.webp").expect("image result");
    let video_pos = visible.find("s2.webp").expect("video result");
    assert!(
        image_pos < video_pos,
        "results must appear in submission order"
    );
}

#[tokio::test]
async fn uncorrelated_tool_call_is_skipped_at_connection_end() {
    let resolver = StubResolver::new();
    let bytes = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", TOOL_ADD),
        sse("message", r#"{"status":"finished_successfully"}"#),
    ]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver.clone(),
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert!(resolver.calls().is_empty());
    assert_eq!(done_count(&frames), 1);
    assert!(matches!(frames.last(), Some(Ok(StreamFrame::Done))));
}

#[tokio::test]
async fn one_failing_tool_call_does_not_break_the_stream() {
    let resolver = StubResolver::failing_on("s1");
    let bytes = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", TOOL_ADD),
        sse(
            "delta",
            r#"{"op":"add","path":"/message/tool_calls/1","value":"{\"id\":\"tc2\",\"func\":{\"name\":\"generate_image\",\"arguments\":\"{}\"}}"}"#,
        ),
        sse("message", TOOL_RESULT_MSG),
        sse(
            "message",
            r#"{"author":{"role":"tool"},"metadata":{"tool_call_id":"tc2"},"content":{"content_parts":[{"text":"{\"submit_id\":\"s2\",\"resource_type\":\"image\",\"history_record_id\":\"h2\"}"}]}}"#,
        ),
    ]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver.clone(),
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(resolver.calls().len(), 2);
    assert_eq!(done_count(&frames), 1);
    let visible = contents(&frames).join("");
    assert!(!visible.contains("s1.webp"));
    assert!(visible.contains("s2.webp"));
}

#[tokio::test]
async fn connection_error_propagates_without_terminal_marker() {
    let resolver = StubResolver::new();
    let bytes = futures_util::stream::iter(vec![
        Ok(sse("message", r#"{"status":"in_progress"}"#)),
        Ok(sse("delta", r#"{"op":"append","value":"partial"}"#)),
        Err(GenError::TransportError("connection reset by peer".into())),
    ]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver,
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(done_count(&frames), 0, "no [DONE] on abnormal termination");
    assert!(matches!(frames.last(), Some(Err(GenError::StreamError(_)))));
    assert_eq!(contents(&frames).join(""), "partial");
}

#[tokio::test]
async fn multibyte_character_split_across_chunks_survives() {
    let resolver = StubResolver::new();
    let record = "event: delta\ndata: {\"op\":\"append\",\"value\":\"日本語\"}\n\n".as_bytes();
    // Split inside the second character of the value.
    let split = record.len() - 12;
    let bytes = stream_of(vec![record[..split].to_vec(), record[split..].to_vec()]);

    let frames = collect(run_agent_stream(
        bytes,
        resolver,
        options(),
        CancelHandle::new(),
    ))
    .await;

    assert_eq!(contents(&frames), vec!["日本語".to_string()]);
    assert_eq!(done_count(&frames), 1);
}

#[tokio::test]
async fn cancellation_aborts_an_idle_stream() {
    let resolver = StubResolver::new();
    let cancel = CancelHandle::new();
    let bytes = futures_util::stream::pending::<Result<Vec<u8>, GenError>>();

    let cancel_in = cancel.clone();
    let task = tokio::spawn(async move {
        collect(run_agent_stream(bytes, resolver, options(), cancel_in)).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let frames = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cancellation must abort the stream")
        .expect("task ok");
    assert_eq!(done_count(&frames), 0);
    assert!(matches!(frames.last(), Some(Err(GenError::Cancelled))));
}

#[tokio::test]
async fn aggregate_of_a_tool_stream_dedupes_and_concatenates() {
    let resolver = StubResolver::new();
    let bytes = stream_of(vec![
        sse("message", r#"{"status":"in_progress"}"#),
        sse("delta", r#"{"op":"append","value":"Here you go: "}"#),
        sse("delta", TOOL_ADD),
        sse("delta", TOOL_ADD),
        sse("message", TOOL_RESULT_MSG),
    ]);

    let frames: Vec<StreamFrame> = collect(run_agent_stream(
        bytes,
        resolver,
        options(),
        CancelHandle::new(),
    ))
    .await
    .into_iter()
    .collect::<Result<_, _>>()
    .expect("clean stream");

    let completion = aggregate_frames("agent", frames.iter());
    let message = &completion.choices[0].message;
    assert!(message.content.starts_with("Here you go: "));
    assert!(message.content.contains("s1.webp"));
    let calls = message.tool_calls.as_ref().expect("tool calls");
    assert_eq!(calls.len(), 1, "duplicate add events collapse to one call");
    assert_eq!(calls[0].id, "tc1");
    assert_eq!(completion.choices[0].finish_reason, "stop");
}
