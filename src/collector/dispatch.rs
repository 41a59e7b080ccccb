//! Test-selection dispatch: maps external test tokens onto hub operations.
//!
//! Pure lookup — no state of its own. Unknown tokens are rejected with a
//! warning and no action.

use std::sync::Arc;

use tracing::{info, warn};

use super::{CollectError, CollectorHub, MetricGroup, SampleKind};

/// Outcome of dispatching a test token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A collection loop was started.
    Started,
    /// A loop for this pair was already running; nothing was done.
    AlreadyRunning,
    /// A one-shot sample round completed.
    Sampled,
    /// The selected collection(s) were stopped.
    Stopped,
    /// No matching collection was running.
    NotRunning,
    /// The token names no known test; nothing was done.
    UnknownToken,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Started => "started",
            Outcome::AlreadyRunning => "already_running",
            Outcome::Sampled => "sampled",
            Outcome::Stopped => "stopped",
            Outcome::NotRunning => "not_running",
            Outcome::UnknownToken => "unknown_token",
        }
    }
}

/// Run the test selected by `token` against `device`.
pub async fn run_selected_test(
    hub: &Arc<CollectorHub>,
    token: &str,
    device: &str,
) -> Result<Outcome, CollectError> {
    info!(token, device, "running selected test");
    match token {
        "cpu_memory_usage" => Ok(if hub.start(device, MetricGroup::CpuMemory).await? {
            Outcome::Started
        } else {
            Outcome::AlreadyRunning
        }),
        "bad_frames" => Ok(if hub.start(device, MetricGroup::BadFrames).await? {
            Outcome::Started
        } else {
            Outcome::AlreadyRunning
        }),
        "storage_usage" => {
            hub.run_once(SampleKind::Storage, device).await?;
            Ok(Outcome::Sampled)
        }
        "uptime" => {
            hub.run_once(SampleKind::Uptime, device).await?;
            Ok(Outcome::Sampled)
        }
        "all_tests" => {
            // One round of every metric kind, sequentially.
            for kind in [
                SampleKind::Storage,
                SampleKind::CpuMemory,
                SampleKind::Uptime,
                SampleKind::BadFrames,
            ] {
                hub.run_once(kind, device).await?;
            }
            Ok(Outcome::Sampled)
        }
        _ => {
            warn!(token, device, "unknown test selection");
            Ok(Outcome::UnknownToken)
        }
    }
}

/// Stop the collection(s) selected by `token`.
pub async fn stop_selected_test(hub: &Arc<CollectorHub>, token: &str, device: &str) -> Outcome {
    match token {
        "cpu_memory_usage" => {
            if hub.stop(device, MetricGroup::CpuMemory).await {
                Outcome::Stopped
            } else {
                Outcome::NotRunning
            }
        }
        "bad_frames" => {
            if hub.stop(device, MetricGroup::BadFrames).await {
                Outcome::Stopped
            } else {
                Outcome::NotRunning
            }
        }
        "all_tests" => {
            if hub.stop_all(device).await > 0 {
                Outcome::Stopped
            } else {
                Outcome::NotRunning
            }
        }
        _ => {
            warn!(token, device, "unknown test stop selection");
            Outcome::UnknownToken
        }
    }
}
