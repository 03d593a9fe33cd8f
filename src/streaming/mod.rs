//! Streaming Module
//!
//! Everything between raw connection bytes and the OpenAI-compatible
//! outbound stream:
//! - Incremental SSE decoding with UTF-8 boundary state
//! - Translation of vendor agent events into chat-completion chunks
//! - Tool-call tracking and mid-stream result splicing
//! - SSE frame encoding and the non-streaming aggregate form

pub mod chunk;
pub mod decoder;
pub mod orchestrator;
pub mod pipeline;
pub mod session;
pub mod translator;

pub use chunk::{
    ChatCompletion, ChatCompletionChunk, FrameStream, SseByteStream, StreamFrame,
    aggregate_frame_stream, aggregate_frames, encode_frame_stream,
};
pub use decoder::{EventKind, EventPayload, SseDecoder, StreamEvent};
pub use pipeline::{AgentStreamOptions, run_agent_stream};
pub use session::{StreamSession, ToolCallRecord};
pub use translator::is_tool_result_payload;
