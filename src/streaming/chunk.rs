//! OpenAI-compatible wire shapes for the outbound stream, the SSE frame
//! encoder, and the non-streaming aggregate form.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

use crate::error::GenError;

/// Tool-call fragment carried in a streaming delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Aggregated tool call in the non-streaming form (no stream index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Incremental message fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: usize,
    pub delta: MessageDelta,
    pub finish_reason: Option<String>,
}

/// One `chat.completion.chunk` unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn with_delta(model: &str, delta: MessageDelta, finish_reason: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            object: "chat.completion.chunk".to_string(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    /// Role-opening chunk emitted once at the start of a session.
    pub fn role_open(model: &str) -> Self {
        Self::with_delta(
            model,
            MessageDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                ..MessageDelta::default()
            },
            None,
        )
    }

    pub fn content(model: &str, text: impl Into<String>) -> Self {
        Self::with_delta(
            model,
            MessageDelta {
                content: Some(text.into()),
                ..MessageDelta::default()
            },
            None,
        )
    }

    /// Tool-authored content, tagged with the tool call it answers.
    pub fn tool_content(
        model: &str,
        text: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self::with_delta(
            model,
            MessageDelta {
                role: Some("tool".to_string()),
                content: Some(text.into()),
                tool_call_id: Some(tool_call_id.into()),
                ..MessageDelta::default()
            },
            None,
        )
    }

    pub fn tool_call(
        model: &str,
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::with_delta(
            model,
            MessageDelta {
                tool_calls: Some(vec![ToolCallChunk {
                    index,
                    id: id.into(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: name.into(),
                        arguments: arguments.into(),
                    },
                }]),
                ..MessageDelta::default()
            },
            None,
        )
    }

    /// Turn-ending chunk: empty delta, `finish_reason: "stop"`.
    pub fn finish(model: &str) -> Self {
        Self::with_delta(model, MessageDelta::default(), Some("stop"))
    }
}

/// One unit of the outbound stream: a chunk, or the terminal marker.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    /// Encode as an SSE frame: `data: {json}\n\n`, or `data: [DONE]\n\n`
    /// for the terminal marker.
    pub fn to_sse_bytes(&self) -> Result<Vec<u8>, GenError> {
        match self {
            Self::Chunk(chunk) => {
                let data = serde_json::to_vec(chunk).map_err(|e| {
                    GenError::Internal(format!("failed to serialize chunk: {e}"))
                })?;
                let mut out = Vec::with_capacity(data.len() + 10);
                out.extend_from_slice(b"data: ");
                out.extend_from_slice(&data);
                out.extend_from_slice(b"\n\n");
                Ok(out)
            }
            Self::Done => Ok(b"data: [DONE]\n\n".to_vec()),
        }
    }
}

/// The outbound stream type produced by the agent pipeline.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, GenError>> + Send>>;

/// Byte stream suitable for an HTTP SSE response body.
pub type SseByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GenError>> + Send>>;

/// Encode a frame stream into SSE response bytes.
pub fn encode_frame_stream(frames: FrameStream) -> SseByteStream {
    Box::pin(frames.map(|item| {
        item.and_then(|frame| frame.to_sse_bytes().map(Bytes::from))
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: usize,
    pub message: CompletionMessage,
    pub finish_reason: String,
}

/// Non-streaming aggregate form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
    pub created: i64,
}

/// Fold a finished frame sequence into the non-streaming aggregate form:
/// content deltas concatenate, tool-call deltas deduplicate by id.
pub fn aggregate_frames<'a>(
    model: &str,
    frames: impl IntoIterator<Item = &'a StreamFrame>,
) -> ChatCompletion {
    let mut content = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for frame in frames {
        let StreamFrame::Chunk(chunk) = frame else {
            continue;
        };
        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                content.push_str(text);
            }
            if let Some(calls) = &choice.delta.tool_calls {
                for call in calls {
                    if tool_calls.iter().all(|existing| existing.id != call.id) {
                        tool_calls.push(ToolCall {
                            id: call.id.clone(),
                            kind: call.kind.clone(),
                            function: call.function.clone(),
                        });
                    }
                }
            }
        }
    }

    let completion_tokens = content.chars().count().max(1) as u32;
    ChatCompletion {
        id: Uuid::new_v4().to_string(),
        object: "chat.completion".to_string(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: CompletionMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage {
            prompt_tokens: 1,
            completion_tokens,
            total_tokens: completion_tokens + 1,
        },
        created: chrono::Utc::now().timestamp(),
    }
}

/// Collect a frame stream and fold it into the aggregate form. Stream
/// errors propagate; the terminal marker is consumed, not represented.
pub async fn aggregate_frame_stream(
    model: &str,
    mut frames: FrameStream,
) -> Result<ChatCompletion, GenError> {
    let mut collected = Vec::new();
    while let Some(frame) = frames.next().await {
        collected.push(frame?);
    }
    Ok(aggregate_frames(model, collected.iter()))
}
