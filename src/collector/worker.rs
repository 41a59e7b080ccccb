//! The collection loop: fixed-cadence sampling with cooperative cancellation.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::adb::DeviceInfo;

use super::samplers::{self, SampleError, SamplerCtx};
use super::MetricGroup;

/// Run the collection loop for one (device, metric group) pair until the
/// cancellation signal is set.
///
/// Each tick runs the group's sample functions sequentially, then waits
/// `max(interval − elapsed, 0)`. The wait observes the cancellation signal,
/// so a stop request during the wait exits before the next round; a stop
/// request mid-sample lets the in-flight round finish first.
pub(super) async fn run(
    ctx: SamplerCtx,
    device: String,
    group: MetricGroup,
    info: DeviceInfo,
    cpu_cores: Option<u32>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    info!(device, group = %group, "collection loop running");

    loop {
        if *cancel.borrow() {
            break;
        }

        let tick_start = Instant::now();
        if let Err(e) = tick(&ctx, &device, group, &info, cpu_cores).await {
            // A single failed round must not kill long-running monitoring.
            warn!(device, group = %group, "sample round failed: {e}");
        }
        let elapsed = tick_start.elapsed();
        let wait = interval.saturating_sub(elapsed);

        if *cancel.borrow() {
            break;
        }
        tokio::select! {
            changed = cancel.changed() => {
                // A closed channel means the registry entry is gone; treat
                // it like a stop request.
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!(device, group = %group, "collection loop exited");
}

async fn tick(
    ctx: &SamplerCtx,
    device: &str,
    group: MetricGroup,
    info: &DeviceInfo,
    cpu_cores: Option<u32>,
) -> Result<(), SampleError> {
    match group {
        MetricGroup::CpuMemory => {
            samplers::sample_cpu_memory(ctx, device, info, cpu_cores.unwrap_or(1)).await
        }
        MetricGroup::BadFrames => samplers::sample_bad_frames(ctx, device, info).await,
    }
}
