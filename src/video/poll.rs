//! Terminal-state rules and the bounded wait-for-result loop.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ProviderConfig, VideoConfig};

use super::client::VideoApiClient;
use super::snapshot::TaskSnapshot;

/// Bounds for [`wait_for_result`].
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Consecutive failed queries after which polling stops.
    pub max_transient_errors: u32,
}

impl PollPolicy {
    pub fn from_config(cfg: &VideoConfig) -> Self {
        Self {
            interval: cfg.poll_interval,
            max_attempts: cfg.max_poll_attempts,
            max_transient_errors: cfg.max_transient_errors,
        }
    }
}

fn normalized(status: &str) -> String {
    status.trim().to_lowercase()
}

fn contains_status(values: &[String], status: &str) -> bool {
    values.iter().any(|v| normalized(v) == status)
}

/// A task is terminal once it has a video url or its status is one of the
/// provider's done or failed values.
pub fn is_terminal(provider: &ProviderConfig, snapshot: &TaskSnapshot) -> bool {
    if snapshot.has_video() {
        return true;
    }
    let status = normalized(&snapshot.status);
    contains_status(&provider.done_values, &status) || contains_status(&provider.failed_values, &status)
}

/// Failed = a failed status, or a terminal status with an error message and
/// no video.
pub fn is_failed(provider: &ProviderConfig, snapshot: &TaskSnapshot) -> bool {
    let status = normalized(&snapshot.status);
    if contains_status(&provider.failed_values, &status) {
        return true;
    }
    !snapshot.error_message.is_empty() && !snapshot.has_video() && is_terminal(provider, snapshot)
}

/// What a snapshot means to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { url: String },
    Failed { detail: String },
    Pending,
}

/// Failure is checked first, so a failed status wins over a stray url.
pub fn classify(provider: &ProviderConfig, snapshot: &TaskSnapshot) -> TaskOutcome {
    if is_failed(provider, snapshot) {
        let detail = if snapshot.error_message.is_empty() {
            snapshot.status.clone()
        } else {
            snapshot.error_message.clone()
        };
        TaskOutcome::Failed { detail }
    } else if snapshot.has_video() {
        TaskOutcome::Completed {
            url: snapshot.video_url.clone(),
        }
    } else {
        TaskOutcome::Pending
    }
}

/// Poll until `initial` reaches a terminal state or the policy runs out.
///
/// Never fails: a run of `max_transient_errors` consecutive query errors
/// returns the latest snapshot with the error attached (status `"error"` if
/// none was known), and running out of attempts returns the latest snapshot
/// as-is.
pub async fn wait_for_result(
    client: &VideoApiClient,
    provider: &ProviderConfig,
    initial: TaskSnapshot,
    policy: &PollPolicy,
) -> TaskSnapshot {
    if is_terminal(provider, &initial) || initial.task_id.is_empty() {
        return initial;
    }

    let task_id = initial.task_id.clone();
    let mut latest = initial;
    let mut consecutive_errors = 0u32;

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        match client.query(provider, &task_id).await {
            Ok(snapshot) => {
                consecutive_errors = 0;
                latest = snapshot;
                debug!(
                    provider = %provider.provider_id,
                    %task_id,
                    attempt,
                    status = %latest.status,
                    "poll"
                );
                if is_terminal(provider, &latest) {
                    return latest;
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(
                    provider = %provider.provider_id,
                    %task_id,
                    attempt,
                    consecutive_errors,
                    error = %e,
                    "status query failed"
                );
                if consecutive_errors >= policy.max_transient_errors {
                    if latest.status.is_empty() {
                        latest.status = "error".to_string();
                    }
                    latest.error_message = e.to_string();
                    return latest;
                }
            }
        }
    }

    debug!(provider = %provider.provider_id, %task_id, "poll attempts exhausted");
    latest
}
