//! Per-device collection scheduling.
//!
//! [`CollectorHub`] is the registry and lifecycle controller: it tracks the
//! live collection loop for every (device, metric group) pair, guarantees at
//! most one live loop per pair, and exposes the start/stop/stop-all surface
//! used by the request-handling layer. The hub is constructed once at
//! process start and injected wherever collections are controlled — there is
//! no process-wide state.

pub mod dispatch;
pub mod samplers;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adb::{self, DeviceInfo};

use self::samplers::{SampleError, SamplerCtx};

/// A named bundle of sample functions executed together each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    CpuMemory,
    BadFrames,
}

impl MetricGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricGroup::CpuMemory => "cpu_memory",
            MetricGroup::BadFrames => "bad_frames",
        }
    }
}

impl std::fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of one-shot samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    CpuMemory,
    Storage,
    Uptime,
    BadFrames,
}

/// Errors surfaced synchronously by `start` and `run_once`.
///
/// Nothing from inside a running loop ever propagates here; once a loop is
/// spawned its failures are logged and the loop carries on.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("invalid device address: {0}")]
    InvalidDevice(String),

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// One running collection loop.
struct CollectionTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl CollectionTask {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// A snapshot of one live collection, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCollection {
    pub device: String,
    pub group: &'static str,
    pub started_at: DateTime<Utc>,
}

type TaskKey = (String, MetricGroup);

/// Registry and lifecycle controller for collection loops.
pub struct CollectorHub {
    ctx: SamplerCtx,
    interval: Duration,
    tasks: Mutex<HashMap<TaskKey, CollectionTask>>,
}

impl CollectorHub {
    pub fn new(ctx: SamplerCtx, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            interval,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Start a collection loop for `(device, group)`.
    ///
    /// Idempotent: if a live loop already exists for the pair this logs and
    /// returns `Ok(false)` without side effects. One-time setup (device
    /// info lookup, capability probe) runs here so its failure reaches the
    /// caller; the spawned loop itself runs independently and `start`
    /// returns as soon as it is registered.
    pub async fn start(&self, device: &str, group: MetricGroup) -> Result<bool, CollectError> {
        if !adb::is_valid_device(device) {
            return Err(CollectError::InvalidDevice(device.to_string()));
        }
        let key: TaskKey = (device.to_string(), group);

        // Fast path: don't probe the device when the loop is already up.
        {
            let tasks = self.tasks.lock().await;
            if tasks.get(&key).is_some_and(CollectionTask::is_live) {
                info!(device, group = %group, "collection already running");
                return Ok(false);
            }
        }

        // One-time setup outside the registry lock: a slow device must not
        // block start/stop calls for other devices.
        let info = adb::device_info(self.ctx.runner.as_ref(), device)
            .await
            .map_err(SampleError::from)?;
        let cpu_cores = match group {
            MetricGroup::CpuMemory => Some(samplers::probe_cpu_cores(&self.ctx, device).await?),
            MetricGroup::BadFrames => None,
        };

        let mut tasks = self.tasks.lock().await;
        match tasks.get(&key) {
            // A concurrent start won the race while we were probing.
            Some(task) if task.is_live() => {
                info!(device, group = %group, "collection already running");
                return Ok(false);
            }
            // The previous loop died on its own; reap it before reuse.
            Some(_) => {
                tasks.remove(&key);
            }
            None => {}
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(worker::run(
            self.ctx.clone(),
            device.to_string(),
            group,
            info,
            cpu_cores,
            self.interval,
            cancel_rx,
        ));
        tasks.insert(
            key,
            CollectionTask {
                cancel: cancel_tx,
                handle,
                started_at: Utc::now(),
            },
        );
        info!(device, group = %group, "collection started");
        Ok(true)
    }

    /// Stop the `(device, group)` loop and wait for it to fully exit.
    ///
    /// Returns `false` (after a warning) when no loop is registered. On a
    /// `true` return the loop has produced its last sample and store write.
    pub async fn stop(&self, device: &str, group: MetricGroup) -> bool {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.remove(&(device.to_string(), group)) else {
            warn!(device, group = %group, "no active collection to stop");
            return false;
        };

        // Signal, then join while still holding the registry lock so the
        // stop and the removal form one critical section.
        let _ = task.cancel.send(true);
        if let Err(e) = task.handle.await {
            error!(device, group = %group, "collection task join failed: {e}");
        }
        info!(device, group = %group, "collection stopped");
        true
    }

    /// Stop every collection loop registered for `device`. Used when a
    /// device disconnects. Returns the number of loops stopped.
    pub async fn stop_all(&self, device: &str) -> usize {
        let mut tasks = self.tasks.lock().await;
        let keys: Vec<TaskKey> = tasks
            .keys()
            .filter(|(d, _)| d == device)
            .cloned()
            .collect();

        let mut stopped = 0;
        for key in keys {
            if let Some(task) = tasks.remove(&key) {
                let _ = task.cancel.send(true);
                if let Err(e) = task.handle.await {
                    error!(device, group = %key.1, "collection task join failed: {e}");
                }
                info!(device, group = %key.1, "collection stopped");
                stopped += 1;
            }
        }

        // stop_all is the disconnect path: the device's published gauges
        // would otherwise linger forever.
        self.ctx.gauges.remove_device(device);
        stopped
    }

    /// Snapshot of every live collection.
    pub async fn active(&self) -> Vec<ActiveCollection> {
        let tasks = self.tasks.lock().await;
        let mut list: Vec<ActiveCollection> = tasks
            .iter()
            .filter(|(_, task)| task.is_live())
            .map(|((device, group), task)| ActiveCollection {
                device: device.clone(),
                group: group.as_str(),
                started_at: task.started_at,
            })
            .collect();
        list.sort_by(|a, b| (&a.device, a.group).cmp(&(&b.device, b.group)));
        list
    }

    /// Run one sampling round outside any loop.
    pub async fn run_once(&self, kind: SampleKind, device: &str) -> Result<(), CollectError> {
        if !adb::is_valid_device(device) {
            return Err(CollectError::InvalidDevice(device.to_string()));
        }
        let info: DeviceInfo = adb::device_info(self.ctx.runner.as_ref(), device)
            .await
            .map_err(SampleError::from)?;

        match kind {
            SampleKind::CpuMemory => {
                let cores = samplers::probe_cpu_cores(&self.ctx, device).await?;
                samplers::sample_cpu_memory(&self.ctx, device, &info, cores).await?
            }
            SampleKind::Storage => samplers::sample_storage(&self.ctx, device, &info).await?,
            SampleKind::Uptime => samplers::sample_uptime(&self.ctx, device, &info).await?,
            SampleKind::BadFrames => samplers::sample_bad_frames(&self.ctx, device, &info).await?,
        }
        Ok(())
    }
}
