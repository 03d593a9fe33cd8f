//! Interfaces this core consumes from collaborating layers.
//!
//! Transport, signing, and session/token resolution live behind these
//! traits; the core never performs implicit global lookups and never
//! mutates collaborator state.

use async_trait::async_trait;

use crate::error::GenError;
use crate::jobs::poller::{AdaptiveJobPoller, PollConfig};
use crate::types::{JobKind, MediaItem, PollSample, QueueInfo, ResourceKind};
use crate::utils::cancel::CancelHandle;

/// What to generate. Interpreting most of these fields (model mapping,
/// draft assembly, region routing) is the transport layer's job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub kind: JobKind,
    pub model: String,
    pub prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Optional reference image, as a URL or data URL.
    pub reference_image: Option<String>,
    pub expected_item_count: u32,
}

impl JobSpec {
    pub fn new(kind: JobKind, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            prompt: prompt.into(),
            width: None,
            height: None,
            reference_image: None,
            expected_item_count: 1,
        }
    }
}

/// Snapshot returned by one status probe.
#[derive(Debug, Clone)]
pub struct JobStatusSnapshot {
    /// Vendor numeric status code; mapped through `JobStatus::from_code`.
    pub status_code: i64,
    pub fail_code: Option<String>,
    pub fail_msg: Option<String>,
    pub items: Vec<MediaItem>,
    pub queue_info: Option<QueueInfo>,
}

impl JobStatusSnapshot {
    /// Derive the poll sample for this observation.
    pub fn sample(&self) -> PollSample {
        PollSample {
            status: crate::types::JobStatus::from_code(self.status_code),
            fail_code: self.fail_code.clone(),
            fail_msg: self.fail_msg.clone(),
            item_count: self.items.len() as u32,
            queue_info: self.queue_info.clone(),
        }
    }
}

/// Remote job submission and status probing.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Submit a generation job; returns the opaque submit id. May fail with
    /// `TransportError`; callers wrap this with a small bounded retry.
    async fn submit_job(&self, spec: &JobSpec) -> Result<String, GenError>;

    /// Probe job status once. A job record that has not materialized yet
    /// must surface as `GenError::RecordNotFound` so the poller can apply
    /// its warm-up grace window.
    async fn query_job_status(&self, submit_id: &str) -> Result<JobStatusSnapshot, GenError>;
}

/// Resolves a tool-spawned job to its media items.
#[async_trait]
pub trait ToolJobResolver: Send + Sync {
    async fn resolve(
        &self,
        submit_id: &str,
        kind: ResourceKind,
    ) -> Result<Vec<MediaItem>, GenError>;
}

/// Default resolver: drives the adaptive poller against a `JobClient` with
/// resource-specific presets (video generation is materially slower than
/// image generation).
pub struct PollingToolResolver<C> {
    client: C,
    cancel: CancelHandle,
}

impl<C: JobClient> PollingToolResolver<C> {
    pub fn new(client: C, cancel: CancelHandle) -> Self {
        Self { client, cancel }
    }
}

#[async_trait]
impl<C: JobClient> ToolJobResolver for PollingToolResolver<C> {
    async fn resolve(
        &self,
        submit_id: &str,
        kind: ResourceKind,
    ) -> Result<Vec<MediaItem>, GenError> {
        let config = match kind {
            ResourceKind::Image => PollConfig::tool_image(),
            ResourceKind::Video => PollConfig::tool_video(),
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::ToolResult, self.cancel.clone());
        let client = &self.client;
        let (_, items) = poller
            .poll(submit_id, || async move {
                let snapshot = client.query_job_status(submit_id).await?;
                Ok((snapshot.sample(), snapshot.items))
            })
            .await?;
        Ok(items)
    }
}
