//! Failure classification for remote job status probes.
//!
//! Maps a `(status, fail_code)` pair onto a small set of abstract outcomes.
//! Pure functions, no I/O, no state; the poller decides what to do with the
//! result.

use crate::types::JobStatus;

/// Abstract outcome of one status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not terminal yet, keep polling.
    Continue,
    Success,
    ContentFiltered(String),
    QuotaExhausted(String),
    Fatal(String),
}

/// Fail codes that indicate the policy filter rejected the prompt or the
/// generated content.
const CONTENT_FILTER_CODES: &[&str] = &[
    "1063", "2003", "2005", "2038", "2039", "2041", "2042", "2048",
];

/// Fail codes that indicate the account is out of generation credit.
const QUOTA_CODES: &[&str] = &["1006", "4001", "5000"];

/// Classify one status observation.
///
/// Terminal-success statuses win regardless of any `fail_code` the provider
/// left behind; everything that is neither terminal-success nor `Failed`
/// means "keep polling".
pub fn classify(status: JobStatus, fail_code: Option<&str>, fail_msg: Option<&str>) -> Outcome {
    if status.is_terminal_success() {
        return Outcome::Success;
    }
    if status != JobStatus::Failed {
        return Outcome::Continue;
    }

    let message = fail_code_message(fail_code, fail_msg);
    match fail_code {
        Some(code) if CONTENT_FILTER_CODES.contains(&code) => Outcome::ContentFiltered(message),
        Some(code) if QUOTA_CODES.contains(&code) => Outcome::QuotaExhausted(message),
        _ => Outcome::Fatal(message),
    }
}

/// Best-effort human-readable message for a failed job.
///
/// Table entries win, then the server-supplied message, then a generic line
/// carrying the raw code. The table is configuration data mirroring the
/// upstream service's dictionary; it is not meant to be exhaustive.
pub fn fail_code_message(fail_code: Option<&str>, fail_msg: Option<&str>) -> String {
    if let Some(code) = fail_code
        && let Some(msg) = table_message(code)
    {
        return msg.to_string();
    }
    if let Some(msg) = fail_msg
        && !msg.is_empty()
    {
        return msg.to_string();
    }
    match fail_code {
        Some(code) => format!("generation failed, code: {code}"),
        None => "generation failed".to_string(),
    }
}

fn table_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "1" => "request rate limit reached",
        "1000" | "1001" => "invalid input parameters",
        "1002" => "unable to generate, please try again later",
        "1006" => "insufficient credit remaining",
        "1018" => "daily generation limit reached, try again tomorrow",
        "1019" => "account failed the security check",
        "1057" => "too many generations in progress, try again later",
        "1063" => "prompt may violate community guidelines, please revise it",
        "1157" => "too many users generating right now, try again later",
        "2002" => "an error occurred and generation is unavailable, please retry",
        "2003" => "uploaded image may contain prohibited content, try another image",
        "2004" => "generated video may contain inappropriate content",
        "2005" => "prompt may contain prohibited content, please revise it",
        "2011" => "video/image upscaling failed",
        "2020" => "too many attempts, try again later",
        "2038" => "text may contain prohibited content, please revise it",
        "2039" => "uploaded image may contain prohibited content, try another image",
        "2041" => "serious image content violation, operation blocked",
        "2042" => "uploaded video may contain prohibited content, try another video",
        "2043" => "security verification failed, operation blocked",
        "2048" => "image may contain inappropriate content or copyright issues",
        "2049" => "your IP or text triggered risk control",
        "2050" => "text content raises copyright concerns",
        "4001" => "external account credit insufficient",
        "4003" => "missing permission required for this operation",
        "5000" => "insufficient credit remaining",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_success_wins_regardless_of_fail_code() {
        assert_eq!(
            classify(JobStatus::Success, Some("2038"), None),
            Outcome::Success
        );
        assert_eq!(classify(JobStatus::Completed, None, None), Outcome::Success);
    }

    #[test]
    fn non_terminal_statuses_continue() {
        for status in [
            JobStatus::Processing,
            JobStatus::PostProcessing,
            JobStatus::Finalizing,
            JobStatus::Unknown(77),
        ] {
            assert_eq!(classify(status, None, None), Outcome::Continue);
        }
    }

    #[test]
    fn content_filter_codes_classify_as_filtered() {
        for code in CONTENT_FILTER_CODES {
            match classify(JobStatus::Failed, Some(code), None) {
                Outcome::ContentFiltered(msg) => assert!(!msg.is_empty()),
                other => panic!("code {code} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn quota_codes_classify_as_exhausted() {
        for code in QUOTA_CODES {
            match classify(JobStatus::Failed, Some(code), None) {
                Outcome::QuotaExhausted(msg) => assert!(!msg.is_empty()),
                other => panic!("code {code} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn failed_status_never_continues() {
        // Totality: every failed observation maps to a non-Continue outcome,
        // mapped code or not.
        for code in [Some("2005"), Some("1006"), Some("424242"), None] {
            assert_ne!(classify(JobStatus::Failed, code, None), Outcome::Continue);
        }
    }

    #[test]
    fn unmapped_codes_fall_back_to_server_message_then_generic() {
        assert_eq!(
            classify(JobStatus::Failed, Some("31337"), Some("server said no")),
            Outcome::Fatal("server said no".to_string())
        );
        assert_eq!(
            classify(JobStatus::Failed, Some("31337"), None),
            Outcome::Fatal("generation failed, code: 31337".to_string())
        );
        assert_eq!(
            classify(JobStatus::Failed, None, None),
            Outcome::Fatal("generation failed".to_string())
        );
    }
}
