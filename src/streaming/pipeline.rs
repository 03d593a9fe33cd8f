//! Wiring of the decoder, translator, and orchestrator into one outbound
//! frame stream.
//!
//! One logical flow of control per request: bytes from the live connection
//! are decoded into events, events are translated into chunks, and the
//! orchestrator may suspend the flow mid-stream to resolve tool-spawned
//! jobs before the single terminal marker goes out.

use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::GenError;
use crate::streaming::chunk::{FrameStream, StreamFrame};
use crate::streaming::decoder::SseDecoder;
use crate::streaming::session::StreamSession;
use crate::streaming::{orchestrator, translator};
use crate::upstream::ToolJobResolver;
use crate::utils::cancel::CancelHandle;

/// Options for one agent stream session.
#[derive(Debug, Clone)]
pub struct AgentStreamOptions {
    /// Model name stamped on every outgoing chunk.
    pub model: String,
    /// Short wait before resolving an all-correlated tool batch, absorbing
    /// near-simultaneous late correlation fields.
    pub resolution_debounce: Duration,
}

impl Default for AgentStreamOptions {
    fn default() -> Self {
        Self {
            model: "agent".to_string(),
            resolution_debounce: Duration::from_millis(100),
        }
    }
}

impl AgentStreamOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Translate a live agent connection into an OpenAI-compatible chunk
/// stream.
///
/// The returned stream yields exactly one terminal marker on every clean
/// path (natural stream end, all tools resolved, or early completion) and
/// none at all when the underlying connection errors, which consumers
/// observe as an abnormal termination.
pub fn run_agent_stream<S, B>(
    bytes: S,
    resolver: Arc<dyn ToolJobResolver>,
    options: AgentStreamOptions,
    cancel: CancelHandle,
) -> FrameStream
where
    S: Stream<Item = Result<B, GenError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut session = StreamSession::new(options.model.clone());
        let mut bytes = Box::pin(bytes);

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    yield Err(GenError::Cancelled);
                    return;
                }
                chunk = bytes.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    // Abnormal termination: no terminal marker.
                    yield Err(GenError::StreamError(err.to_string()));
                    return;
                }
            };

            for event in decoder.feed(chunk.as_ref()) {
                for frame in translator::handle_event(&mut session, &event) {
                    yield Ok(frame);
                }
            }
            if session.finished() {
                return;
            }

            // Early dispatch: every announced tool call has its result.
            if orchestrator::ready_to_dispatch(&session) {
                debug!("all tool results correlated, resolving before stream end");
                tokio::time::sleep(options.resolution_debounce).await;
                for frame in orchestrator::resolve_pending(&mut session, resolver.as_ref()).await {
                    yield Ok(frame);
                }
                if let Some(done) = session.finalize() {
                    yield Ok(done);
                }
                return;
            }
        }

        // Connection ended: drain the decoder, then resolve whatever is
        // available if the agent had finished its turn.
        if let Some(event) = decoder.flush() {
            for frame in translator::handle_event(&mut session, &event) {
                yield Ok(frame);
            }
        }
        if session.finished() {
            return;
        }
        if session.agent_finished() && orchestrator::has_pending(&session) {
            for frame in orchestrator::resolve_pending(&mut session, resolver.as_ref()).await {
                yield Ok(frame);
            }
        }
        if let Some(done) = session.finalize() {
            yield Ok(done);
        }
    })
}
