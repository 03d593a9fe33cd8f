//! Direct media-generation flows and markdown rendering of results.
//!
//! Direct jobs (no agent involved) await the adaptive poller synchronously
//! and return or stream the result set; the rendering helpers here are also
//! used when tool-call results are spliced back into an agent stream.

use crate::error::GenError;
use crate::jobs::poller::{AdaptiveJobPoller, PollConfig};
use crate::streaming::chunk::{ChatCompletion, ChatCompletionChunk, StreamFrame};
use crate::types::{JobHandle, MediaItem, PollOutcome, ResourceKind};
use crate::upstream::JobClient;
use crate::utils::cancel::CancelHandle;

/// Await a submitted media job until the poller reaches a terminal
/// condition, returning the outcome and the generated items.
pub async fn await_media_job<C: JobClient>(
    client: &C,
    handle: &JobHandle,
    config: PollConfig,
    cancel: &CancelHandle,
) -> Result<(PollOutcome, Vec<MediaItem>), GenError> {
    let config = config.with_expected_item_count(handle.expected_item_count);
    let poller = AdaptiveJobPoller::new(config, handle.kind, cancel.clone());
    let submit_id = handle.submit_id.as_str();
    poller
        .poll(submit_id, || async move {
            let snapshot = client.query_job_status(submit_id).await?;
            Ok((snapshot.sample(), snapshot.items))
        })
        .await
}

/// Inline markdown for one result set: images become inline image
/// references, videos a playable reference plus a download link.
pub fn render_media_markdown(kind: ResourceKind, items: &[MediaItem]) -> String {
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        match kind {
            ResourceKind::Image => {
                out.push_str(&format!("![image_{index}]({})\n", item.url));
            }
            ResourceKind::Video => {
                let download = item.download_url.as_deref().unwrap_or(&item.url);
                out.push_str(&format!("[video]({})\n[download]({download})\n", item.url));
            }
        }
    }
    out
}

/// Stream a finished media batch as chat chunks: one chunk per item with
/// `finish_reason: "stop"` on the last, then the terminal marker.
pub fn media_batch_frames(
    model: &str,
    kind: ResourceKind,
    items: &[MediaItem],
) -> Vec<StreamFrame> {
    let mut frames = Vec::with_capacity(items.len() + 1);
    for (index, item) in items.iter().enumerate() {
        let last = index + 1 == items.len();
        let text = match kind {
            ResourceKind::Image => format!("![image_{index}]({})\n", item.url),
            ResourceKind::Video => {
                let download = item.download_url.as_deref().unwrap_or(&item.url);
                format!("[video]({})\n[download]({download})\n", item.url)
            }
        };
        let mut chunk = ChatCompletionChunk::content(model, text);
        chunk.choices[0].index = index;
        chunk.choices[0].delta.role = Some("assistant".to_string());
        chunk.choices[0].finish_reason = last.then(|| "stop".to_string());
        frames.push(StreamFrame::Chunk(chunk));
    }
    frames.push(StreamFrame::Done);
    frames
}

/// Non-streaming form of a finished media batch.
pub fn media_batch_completion(
    model: &str,
    kind: ResourceKind,
    items: &[MediaItem],
) -> ChatCompletion {
    let frames = media_batch_frames(model, kind, items);
    crate::streaming::chunk::aggregate_frames(model, frames.iter())
}
