//! Adaptive polling for remote generation jobs.
//!
//! Turns a "submit now, status later" remote job into a bounded,
//! backoff-aware wait. The same loop backs direct media generation and
//! mid-stream tool-call resolution; it is the single reusable polling
//! primitive in this crate.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::GenError;
use crate::jobs::classifier::{Outcome, classify};
use crate::types::{ExitReason, JobKind, JobStatus, PollOutcome, PollSample};
use crate::utils::cancel::CancelHandle;

/// Tuning knobs for one polling session.
///
/// The stability thresholds are a safety net for providers that stop
/// producing items without ever flipping to a terminal status. They are
/// configuration, not constants.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_poll_count: u32,
    pub base_interval: Duration,
    /// Rounds of unchanged item count before declaring the job done.
    pub stable_rounds: u32,
    pub timeout: Duration,
    pub expected_item_count: u32,
    /// Leading "record not found" probes tolerated while the remote system
    /// materializes the job record.
    pub not_found_grace: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_poll_count: 900,
            base_interval: Duration::from_secs(5),
            stable_rounds: 5,
            timeout: Duration::from_secs(900),
            expected_item_count: 1,
            not_found_grace: 10,
        }
    }
}

impl PollConfig {
    /// Direct image generation: batches default to four images.
    pub fn image() -> Self {
        Self {
            expected_item_count: 4,
            ..Self::default()
        }
    }

    /// Direct video generation.
    pub fn video() -> Self {
        Self {
            base_interval: Duration::from_secs(8),
            ..Self::default()
        }
    }

    /// Tool-call image resolution: images land quickly, keep the wait short.
    pub fn tool_image() -> Self {
        Self {
            max_poll_count: 200,
            base_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(600),
            ..Self::default()
        }
    }

    /// Tool-call video resolution: video generation is materially slower,
    /// so poll less often but for longer.
    pub fn tool_video() -> Self {
        Self {
            max_poll_count: 360,
            base_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1800),
            ..Self::default()
        }
    }

    pub fn with_expected_item_count(mut self, count: u32) -> Self {
        self.expected_item_count = count.max(1);
        self
    }
}

type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

/// Drives a caller-supplied status probe on an adaptive schedule until a
/// terminal condition is reached. One poller instance owns one job.
pub struct AdaptiveJobPoller {
    config: PollConfig,
    kind: JobKind,
    cancel: CancelHandle,
    on_progress: Option<ProgressFn>,
}

impl AdaptiveJobPoller {
    pub fn new(config: PollConfig, kind: JobKind, cancel: CancelHandle) -> Self {
        Self {
            config,
            kind,
            cancel,
            on_progress: None,
        }
    }

    /// Receive the periodic progress line that is otherwise only logged.
    pub fn with_progress(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Poll until a terminal condition, returning the outcome together with
    /// the payload of the last successful probe.
    ///
    /// `check` performs one remote status query. A `RecordNotFound` error is
    /// tolerated for the first `not_found_grace` iterations as a warm-up
    /// window and becomes fatal beyond it; any other error aborts the loop
    /// immediately. Exits with zero items and a non-success reason raise a
    /// typed error; exits with items degrade to a successful partial result.
    pub async fn poll<T, F, Fut>(
        &self,
        submit_id: &str,
        mut check: F,
    ) -> Result<(PollOutcome, T), GenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(PollSample, T), GenError>>,
    {
        let started = Instant::now();
        let mut poll_count: u32 = 0;
        let mut not_found: u32 = 0;
        let mut last_item_count: u32 = 0;
        let mut stable_rounds: u32 = 0;
        let mut last: Option<(PollSample, T)> = None;

        info!(
            submit_id,
            kind = self.kind.label(),
            max_polls = self.config.max_poll_count,
            expected = self.config.expected_item_count,
            "starting adaptive poll"
        );

        loop {
            if self.cancel.is_cancelled() {
                return Err(GenError::Cancelled);
            }
            poll_count += 1;

            let sample = match check().await {
                Ok((sample, payload)) => {
                    last = Some((sample.clone(), payload));
                    sample
                }
                Err(GenError::RecordNotFound(msg)) => {
                    not_found += 1;
                    if not_found > self.config.not_found_grace {
                        return Err(GenError::GenerationFailed {
                            code: None,
                            message: format!("job record never appeared: {msg}"),
                        });
                    }
                    warn!(
                        submit_id,
                        attempt = not_found,
                        grace = self.config.not_found_grace,
                        "job record not found yet, continuing"
                    );
                    PollSample::processing()
                }
                Err(err) => return Err(err),
            };

            let elapsed = started.elapsed();
            info!(
                submit_id,
                poll = poll_count,
                max_polls = self.config.max_poll_count,
                status = %sample.status,
                fail_code = sample.fail_code.as_deref().unwrap_or(""),
                items = sample.item_count,
                elapsed_secs = elapsed.as_secs(),
                stable = stable_rounds,
                "poll cycle"
            );

            // Item-count stability tracking.
            if sample.item_count == last_item_count {
                stable_rounds += 1;
            } else {
                stable_rounds = 0;
                last_item_count = sample.item_count;
            }

            if let JobStatus::Unknown(code) = sample.status {
                warn!(submit_id, code, "unknown status code, continuing to poll");
            }

            let exit_reason = match classify(
                sample.status,
                sample.fail_code.as_deref(),
                sample.fail_msg.as_deref(),
            ) {
                Outcome::Success => Some(ExitReason::Success),
                Outcome::ContentFiltered(msg) => return Err(GenError::ContentFiltered(msg)),
                Outcome::QuotaExhausted(msg) => return Err(GenError::QuotaExhausted(msg)),
                Outcome::Fatal(msg) => {
                    return Err(GenError::GenerationFailed {
                        code: sample.fail_code.clone(),
                        message: msg,
                    });
                }
                Outcome::Continue => {
                    if sample.item_count >= self.config.expected_item_count
                        && sample.status.is_terminal_success()
                    {
                        Some(ExitReason::ExpectedCountReached)
                    } else if stable_rounds >= self.config.stable_rounds && sample.item_count > 0 {
                        Some(ExitReason::CountStable)
                    } else if poll_count >= self.config.max_poll_count {
                        Some(ExitReason::PollLimitExceeded)
                    } else if elapsed >= self.config.timeout && sample.item_count > 0 {
                        Some(ExitReason::TimeLimitWithPartial)
                    } else {
                        None
                    }
                }
            };

            if let Some(exit_reason) = exit_reason {
                info!(
                    submit_id,
                    reason = %exit_reason,
                    items = sample.item_count,
                    polls = poll_count,
                    elapsed_secs = elapsed.as_secs(),
                    "exiting poll loop"
                );

                if sample.item_count == 0 && exit_reason != ExitReason::Success {
                    return Err(GenError::PollTimeout {
                        poll_count,
                        elapsed_secs: elapsed.as_secs(),
                    });
                }

                let outcome = PollOutcome {
                    status: sample.status,
                    fail_code: sample.fail_code.clone(),
                    item_count: sample.item_count,
                    elapsed,
                    poll_count,
                    exit_reason,
                };
                let (_, payload) = last.ok_or_else(|| {
                    GenError::Internal("poll exited without a successful probe".to_string())
                })?;
                return Ok((outcome, payload));
            }

            if poll_count % 6 == 0 {
                let mut progress = format!(
                    "{} generation in progress: poll {}, status {}, {}s elapsed",
                    self.kind.label(),
                    poll_count,
                    sample.status,
                    elapsed.as_secs()
                );
                if let Some(queue) = sample.queue_info.as_ref().filter(|q| q.is_active()) {
                    progress.push_str(&format!(
                        ", queue position {}/{}",
                        queue.queue_idx.unwrap_or(0),
                        queue.queue_length.unwrap_or(0)
                    ));
                }
                info!(submit_id, "{progress}");
                if let Some(callback) = &self.on_progress {
                    callback(&progress);
                }
            }

            let delay = self.next_interval(sample.status);
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(GenError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Interval policy keyed on the current status: later pipeline stages
    /// are slower, completion-adjacent observations poll faster, terminal
    /// statuses do not sleep at all.
    fn next_interval(&self, status: JobStatus) -> Duration {
        let base = self.config.base_interval;
        match status {
            JobStatus::Processing => base,
            JobStatus::PostProcessing => base.mul_f64(1.2),
            JobStatus::Finalizing => base.mul_f64(1.5),
            JobStatus::Completed => base.mul_f64(0.5),
            JobStatus::Success | JobStatus::Failed => Duration::ZERO,
            JobStatus::Unknown(_) => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> PollConfig {
        PollConfig {
            base_interval: Duration::from_millis(1),
            ..PollConfig::default()
        }
    }

    fn sample(status: JobStatus, item_count: u32) -> PollSample {
        PollSample {
            status,
            fail_code: None,
            fail_msg: None,
            item_count,
            queue_info: None,
        }
    }

    #[tokio::test]
    async fn succeeds_after_processing_rounds() {
        let poller = AdaptiveJobPoller::new(
            fast_config().with_expected_item_count(2),
            JobKind::Image,
            CancelHandle::new(),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let (outcome, urls) = poller
            .poll("job-1", move || {
                let calls = calls_in.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Ok((sample(JobStatus::Processing, 0), Vec::<String>::new()))
                    } else {
                        Ok((
                            sample(JobStatus::Success, 2),
                            vec!["a".to_string(), "b".to_string()],
                        ))
                    }
                }
            })
            .await
            .expect("poll should succeed");

        assert_eq!(outcome.exit_reason, ExitReason::Success);
        assert_eq!(outcome.item_count, 2);
        assert_eq!(outcome.poll_count, 4);
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn record_not_found_is_fatal_beyond_grace() {
        let config = PollConfig {
            not_found_grace: 10,
            ..fast_config()
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::Image, CancelHandle::new());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result: Result<(PollOutcome, ()), _> = poller
            .poll("job-2", move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(GenError::RecordNotFound("still warming up".to_string()))
                }
            })
            .await;

        match result {
            Err(GenError::GenerationFailed { message, .. }) => {
                assert!(message.contains("never appeared"))
            }
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn poll_limit_with_items_degrades_to_partial_success() {
        let config = PollConfig {
            max_poll_count: 3,
            stable_rounds: 100,
            ..fast_config()
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::Image, CancelHandle::new());

        let (outcome, items) = poller
            .poll("job-3", || async {
                Ok((sample(JobStatus::Processing, 1), vec!["partial".to_string()]))
            })
            .await
            .expect("partial results should not raise");

        assert_eq!(outcome.exit_reason, ExitReason::PollLimitExceeded);
        assert_eq!(outcome.item_count, 1);
        assert_eq!(items, vec!["partial".to_string()]);
    }

    #[tokio::test]
    async fn poll_limit_with_no_items_raises_timeout() {
        let config = PollConfig {
            max_poll_count: 3,
            ..fast_config()
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::Video, CancelHandle::new());

        let result: Result<(PollOutcome, ()), _> = poller
            .poll("job-4", || async {
                Ok((sample(JobStatus::Processing, 0), ()))
            })
            .await;

        match result {
            Err(GenError::PollTimeout { poll_count, .. }) => assert_eq!(poll_count, 3),
            other => panic!("expected PollTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stable_item_count_exits_early() {
        let config = PollConfig {
            stable_rounds: 3,
            expected_item_count: 4,
            ..fast_config()
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::Image, CancelHandle::new());

        let (outcome, _) = poller
            .poll("job-5", || async {
                Ok((sample(JobStatus::Finalizing, 2), ()))
            })
            .await
            .expect("stable count should exit successfully");

        assert_eq!(outcome.exit_reason, ExitReason::CountStable);
        assert_eq!(outcome.item_count, 2);
    }

    #[tokio::test]
    async fn content_filter_failure_propagates_typed() {
        let poller = AdaptiveJobPoller::new(fast_config(), JobKind::Image, CancelHandle::new());

        let result: Result<(PollOutcome, ()), _> = poller
            .poll("job-6", || async {
                Ok((
                    PollSample {
                        status: JobStatus::Failed,
                        fail_code: Some("2038".to_string()),
                        fail_msg: None,
                        item_count: 0,
                        queue_info: None,
                    },
                    (),
                ))
            })
            .await;

        assert!(matches!(result, Err(GenError::ContentFiltered(_))));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_loop() {
        let cancel = CancelHandle::new();
        let config = PollConfig {
            base_interval: Duration::from_secs(60),
            ..PollConfig::default()
        };
        let poller = AdaptiveJobPoller::new(config, JobKind::Image, cancel.clone());

        let task = tokio::spawn(async move {
            poller
                .poll("job-7", || async { Ok((sample(JobStatus::Processing, 0), ())) })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("cancel should abort the sleeping poller")
            .expect("task ok");
        assert!(matches!(result, Err(GenError::Cancelled)));
    }

    #[test]
    fn interval_policy_follows_status() {
        let poller = AdaptiveJobPoller::new(
            PollConfig {
                base_interval: Duration::from_secs(10),
                ..PollConfig::default()
            },
            JobKind::Image,
            CancelHandle::new(),
        );
        assert_eq!(
            poller.next_interval(JobStatus::Processing),
            Duration::from_secs(10)
        );
        assert_eq!(
            poller.next_interval(JobStatus::PostProcessing),
            Duration::from_secs(12)
        );
        assert_eq!(
            poller.next_interval(JobStatus::Finalizing),
            Duration::from_secs(15)
        );
        assert_eq!(
            poller.next_interval(JobStatus::Completed),
            Duration::from_secs(5)
        );
        assert_eq!(poller.next_interval(JobStatus::Success), Duration::ZERO);
        assert_eq!(poller.next_interval(JobStatus::Failed), Duration::ZERO);
        assert_eq!(
            poller.next_interval(JobStatus::Unknown(99)),
            Duration::from_secs(10)
        );
    }
}
