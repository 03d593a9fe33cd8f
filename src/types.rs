//! Core data model for remote generation jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What kind of remote work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
    /// A job spawned by an agent tool call mid-stream.
    ToolResult,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::ToolResult => "tool_result",
        }
    }
}

/// Identifies one remote asynchronous unit of work.
///
/// Created at submission time, consumed exclusively by one poller instance,
/// discarded once a terminal [`PollOutcome`] exists.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Opaque identifier assigned by the remote service at submission.
    pub submit_id: String,
    pub kind: JobKind,
    pub expected_item_count: u32,
}

impl JobHandle {
    pub fn new(submit_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            submit_id: submit_id.into(),
            kind,
            expected_item_count: 1,
        }
    }

    pub fn with_expected_item_count(mut self, count: u32) -> Self {
        self.expected_item_count = count.max(1);
        self
    }
}

/// Remote job status vocabulary.
///
/// The vendor reports numeric codes; everything outside the known set is
/// carried through as `Unknown` and treated as "keep polling".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    PostProcessing,
    Finalizing,
    Success,
    Completed,
    Failed,
    Unknown(i64),
}

impl JobStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            10 => Self::Success,
            20 => Self::Processing,
            30 => Self::Failed,
            42 => Self::PostProcessing,
            45 => Self::Finalizing,
            50 => Self::Completed,
            other => Self::Unknown(other),
        }
    }

    /// Whether this status marks a successfully finished job.
    pub fn is_terminal_success(self) -> bool {
        matches!(self, Self::Success | Self::Completed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "PROCESSING"),
            Self::PostProcessing => write!(f, "POST_PROCESSING"),
            Self::Finalizing => write!(f, "FINALIZING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// Live queue placement reported by some providers while a job waits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueInfo {
    pub queue_idx: Option<u32>,
    pub queue_status: Option<u32>,
    pub queue_length: Option<u32>,
}

impl QueueInfo {
    /// Queue info is only worth surfacing when the provider reports a real
    /// queue, not the default zeroed block.
    pub fn is_active(&self) -> bool {
        self.queue_status == Some(1) && self.queue_length.unwrap_or(0) > 0
    }
}

/// One observation of remote job state, derived fresh each poll cycle.
#[derive(Debug, Clone)]
pub struct PollSample {
    pub status: JobStatus,
    /// Present only when `status == Failed`.
    pub fail_code: Option<String>,
    /// Server-supplied failure message, used as a fallback when the fail
    /// code table has no entry.
    pub fail_msg: Option<String>,
    pub item_count: u32,
    pub queue_info: Option<QueueInfo>,
}

impl PollSample {
    /// Synthetic sample used while the remote system has not materialized
    /// the job record yet.
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            fail_code: None,
            fail_msg: None,
            item_count: 0,
            queue_info: None,
        }
    }
}

/// Why a polling session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Success,
    Failure,
    ExpectedCountReached,
    /// The item count stopped changing for the configured number of rounds.
    CountStable,
    PollLimitExceeded,
    /// The time ceiling was hit but partial items exist.
    TimeLimitWithPartial,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::ExpectedCountReached => "expected count reached",
            Self::CountStable => "item count stable",
            Self::PollLimitExceeded => "poll limit exceeded",
            Self::TimeLimitWithPartial => "time limit with partial results",
        };
        write!(f, "{name}")
    }
}

/// Terminal result of one polling session. Created once, immutable.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: JobStatus,
    pub fail_code: Option<String>,
    pub item_count: u32,
    pub elapsed: Duration,
    pub poll_count: u32,
    pub exit_reason: ExitReason,
}

/// A generated media artifact addressed by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    /// Separate download URL when the provider distinguishes it from the
    /// playable/viewable URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl MediaItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            download_url: None,
        }
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }
}

/// Resource flavor of a tool-call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
}
