//! genbridge
//!
//! A streaming bridge that fronts a remote, asynchronous, job-based
//! generation service (image/video/agent-text) with a synchronous-looking,
//! OpenAI-compatible chat-completion surface.
//!
//! Three temporal models meet here and come out as one well-formed,
//! terminator-correct stream:
//! - **fire-and-poll** media jobs, driven by the adaptive poller in
//!   [`jobs`];
//! - a **live event stream** for agent jobs, decoded and translated in
//!   [`streaming`];
//! - **nested fire-and-poll** jobs spawned by tool calls observed
//!   mid-stream, correlated and spliced back by the orchestrator before
//!   the single terminal marker goes out.
//!
//! Transport, signing, and session resolution are collaborator concerns
//! behind the traits in [`upstream`].
#![deny(unsafe_code)]

pub mod error;
pub mod jobs;
pub mod media;
pub mod retry;
pub mod streaming;
pub mod types;
pub mod upstream;
pub mod utils;

pub use error::{ErrorCategory, GenError};
pub use jobs::classifier::{Outcome, classify};
pub use jobs::poller::{AdaptiveJobPoller, PollConfig};
pub use streaming::{
    AgentStreamOptions, ChatCompletion, ChatCompletionChunk, FrameStream, StreamFrame,
    aggregate_frame_stream, aggregate_frames, encode_frame_stream, run_agent_stream,
};
pub use types::{
    ExitReason, JobHandle, JobKind, JobStatus, MediaItem, PollOutcome, PollSample, QueueInfo,
    ResourceKind,
};
pub use upstream::{JobClient, JobSpec, JobStatusSnapshot, PollingToolResolver, ToolJobResolver};
pub use utils::cancel::CancelHandle;
