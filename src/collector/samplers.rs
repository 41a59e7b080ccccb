//! Sample functions: one command round-trip, parse, publish, persist.
//!
//! Each function performs exactly one sampling round for one metric kind.
//! Parsing is marker-based line scanning over free-text command output;
//! unparsable values collapse to `0.0` and missing sections yield a zeroed
//! snapshot, so a degenerate round never aborts a collection.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adb::{AdbError, CommandRunner, DeviceInfo};
use crate::db::{
    CpuMemorySample, FrameSample, MetricStore, SampleMeta, StorageSample, UptimeSample,
};
use crate::gauges::{self, GaugeBoard};

/// Shared collaborators handed to every sample function.
#[derive(Clone)]
pub struct SamplerCtx {
    pub runner: Arc<dyn CommandRunner>,
    pub store: Arc<dyn MetricStore>,
    pub gauges: Arc<GaugeBoard>,
    /// Package whose dropped frames are measured.
    pub app_package: String,
}

/// Failures that abort one sampling round (never the loop).
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Transport(#[from] AdbError),

    #[error("command exited with status {status}: {stderr}")]
    Command { status: i32, stderr: String },

    #[error("unexpected probe output: {0:?}")]
    Probe(String),
}

/// Run a device command, treating a non-zero exit as a round failure.
async fn run_checked(
    ctx: &SamplerCtx,
    device: &str,
    argv: &[&str],
) -> Result<String, SampleError> {
    let out = ctx.runner.run(device, argv).await?;
    if !out.success() {
        return Err(SampleError::Command {
            status: out.status,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out.stdout)
}

/// Strip a trailing unit suffix (`G`, `M`, `K`, `%`) and parse as a float.
/// Unparsable input is logged and collapses to `0.0`.
pub fn sanitize_numeric(value: &str) -> f64 {
    let trimmed = match value.chars().last() {
        Some(c) if "GMK%".contains(c) => &value[..value.len() - c.len_utf8()],
        _ => value,
    };
    match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            warn!(value, "could not parse numeric value, defaulting to 0.0");
            0.0
        }
    }
}

/// Values scanned out of the `top -b -n 1` header.
///
/// ```text
/// Tasks: 612 total,   1 running, ...
///   Mem:  5847124K total,  5234188K used,   612936K free, ...
/// 400%cpu  47%user   0%nice  28%sys 320%idle ...
/// ```
#[derive(Debug, Default, PartialEq)]
pub struct TopSnapshot {
    /// User CPU, summed over all cores (the `…%user` token).
    pub cpu_user_pct: f64,
    pub mem_total_kb: f64,
    pub mem_used_kb: f64,
}

pub fn parse_top(raw: &str) -> TopSnapshot {
    let mut snap = TopSnapshot::default();

    for line in raw.lines() {
        if line.contains("%cpu") {
            for token in line.split_whitespace() {
                if let Some(value) = token.strip_suffix("%user") {
                    snap.cpu_user_pct = sanitize_numeric(value);
                }
            }
        } else if let Some(rest) = line.trim_start().strip_prefix("Mem:") {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            for pair in tokens.windows(2) {
                if pair[1].starts_with("total") {
                    snap.mem_total_kb = sanitize_numeric(pair[0]);
                } else if pair[1].starts_with("used") {
                    snap.mem_used_kb = sanitize_numeric(pair[0]);
                }
            }
        }
    }

    snap
}

/// Values scanned out of `df -h /data`.
#[derive(Debug, Default, PartialEq)]
pub struct StorageSnapshot {
    pub used: f64,
    pub used_percent: f64,
}

/// Parse `df -h` output. Fewer than two lines means the device returned no
/// data; the zeroed snapshot is returned rather than an error.
pub fn parse_df(raw: &str) -> StorageSnapshot {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        warn!("df output too short, no storage data this round");
        return StorageSnapshot::default();
    }

    // Filesystem  Size  Used  Avail  Use%  Mounted on
    let fields: Vec<&str> = lines[1].split_whitespace().collect();
    if fields.len() < 5 {
        warn!("unexpected df line: {:?}", lines[1]);
        return StorageSnapshot::default();
    }

    StorageSnapshot {
        used: sanitize_numeric(fields[2]),
        used_percent: sanitize_numeric(fields[4]),
    }
}

/// Parse `/proc/uptime` (first field, seconds since boot).
pub fn parse_uptime(raw: &str) -> f64 {
    match raw.split_whitespace().next() {
        Some(token) => sanitize_numeric(token),
        None => {
            warn!("empty uptime output");
            0.0
        }
    }
}

/// Extract the dropped-frame count from `dumpsys gfxinfo` output
/// (`Janky frames: 453 (2.93%)`).
pub fn parse_janky_frames(raw: &str) -> f64 {
    for line in raw.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("Janky frames:") {
            if let Some(token) = rest.split_whitespace().next() {
                return sanitize_numeric(token);
            }
        }
    }
    warn!("no 'Janky frames' line in gfxinfo output");
    0.0
}

/// One-time capability probe: number of CPU cores on the device.
///
/// Runs at collection setup; a failure here is reported to the Start
/// caller and the loop never begins.
pub async fn probe_cpu_cores(ctx: &SamplerCtx, device: &str) -> Result<u32, SampleError> {
    let raw = run_checked(
        ctx,
        device,
        &["shell", "cat", "/proc/cpuinfo", "|", "grep", "processor", "|", "wc", "-l"],
    )
    .await?;

    let cores: u32 = raw
        .trim()
        .parse()
        .map_err(|_| SampleError::Probe(raw.trim().to_string()))?;

    ctx.gauges.set(gauges::CPU_CORES, device, f64::from(cores));
    info!(device, cores, "CPU core count probed");
    Ok(cores)
}

/// One CPU + memory sampling round.
pub async fn sample_cpu_memory(
    ctx: &SamplerCtx,
    device: &str,
    info: &DeviceInfo,
    cpu_cores: u32,
) -> Result<(), SampleError> {
    let raw = run_checked(ctx, device, &["shell", "top", "-b", "-n", "1"]).await?;
    let snap = parse_top(&raw);

    let cpu_user = snap.cpu_user_pct / f64::from(cpu_cores.max(1));
    let mem_percent = if snap.mem_total_kb > 0.0 {
        snap.mem_used_kb / snap.mem_total_kb * 100.0
    } else {
        0.0
    };

    ctx.gauges.set(gauges::CPU_USER, device, cpu_user);
    ctx.gauges.set(gauges::MEM_TOTAL, device, snap.mem_total_kb);
    ctx.gauges.set(gauges::MEM_USED, device, snap.mem_used_kb);
    ctx.gauges.set(gauges::MEM_PERCENT, device, mem_percent);

    let sample = CpuMemorySample {
        meta: SampleMeta::new(device, info),
        cpu_user,
        mem_total_kb: snap.mem_total_kb,
        mem_used_kb: snap.mem_used_kb,
        mem_percent,
    };
    if let Err(e) = ctx.store.append_cpu_memory(&sample).await {
        error!(device, "failed to persist cpu/memory sample: {e}");
    }

    Ok(())
}

/// One storage sampling round.
pub async fn sample_storage(
    ctx: &SamplerCtx,
    device: &str,
    info: &DeviceInfo,
) -> Result<(), SampleError> {
    let raw = run_checked(ctx, device, &["shell", "df", "-h", "/data"]).await?;
    let snap = parse_df(&raw);

    ctx.gauges.set(gauges::STORAGE_USED, device, snap.used);
    ctx.gauges
        .set(gauges::STORAGE_PERCENT, device, snap.used_percent);

    let sample = StorageSample {
        meta: SampleMeta::new(device, info),
        used: snap.used,
        used_percent: snap.used_percent,
    };
    if let Err(e) = ctx.store.append_storage(&sample).await {
        error!(device, "failed to persist storage sample: {e}");
    }

    Ok(())
}

/// One uptime sampling round.
pub async fn sample_uptime(
    ctx: &SamplerCtx,
    device: &str,
    info: &DeviceInfo,
) -> Result<(), SampleError> {
    let raw = run_checked(ctx, device, &["shell", "cat", "/proc/uptime"]).await?;
    let uptime_seconds = parse_uptime(&raw);

    ctx.gauges.set(gauges::UPTIME, device, uptime_seconds);

    let sample = UptimeSample {
        meta: SampleMeta::new(device, info),
        uptime_seconds,
    };
    if let Err(e) = ctx.store.append_uptime(&sample).await {
        error!(device, "failed to persist uptime sample: {e}");
    }

    Ok(())
}

/// One dropped-frames sampling round for the configured application.
pub async fn sample_bad_frames(
    ctx: &SamplerCtx,
    device: &str,
    info: &DeviceInfo,
) -> Result<(), SampleError> {
    let raw = run_checked(
        ctx,
        device,
        &["shell", "dumpsys", "gfxinfo", ctx.app_package.as_str()],
    )
    .await?;
    let janky = parse_janky_frames(&raw);

    ctx.gauges.set(gauges::BAD_FRAMES, device, janky);

    let sample = FrameSample {
        meta: SampleMeta::new(device, info),
        janky_frames: janky as i64,
    };
    if let Err(e) = ctx.store.append_frames(&sample).await {
        error!(device, "failed to persist frame sample: {e}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP_OUTPUT: &str = "\
Tasks: 612 total,   1 running, 611 sleeping,   0 stopped,   0 zombie
  Mem:  5847124K total,  5234188K used,   612936K free,    12044K buffers
 Swap:  2097148K total,   524288K used,  1572860K free,  2048576K cached
400%cpu  47%user   0%nice  28%sys 320%idle   0%iow   3%irq   2%sirq   0%host
  PID USER         PR  NI VIRT  RES  SHR S[%CPU] %MEM     TIME+ ARGS
 1234 u0_a123      20   0 1.5G 300M 150M S  25.0  5.2   1:02.33 com.example";

    #[test]
    fn test_sanitize_numeric_suffixes() {
        assert_eq!(sanitize_numeric("75%"), 75.0);
        assert_eq!(sanitize_numeric("1.2G"), 1.2);
        assert_eq!(sanitize_numeric("500M"), 500.0);
        assert_eq!(sanitize_numeric("612936K"), 612936.0);
        assert_eq!(sanitize_numeric("42"), 42.0);
    }

    #[test]
    fn test_sanitize_numeric_unparsable_defaults_to_zero() {
        assert_eq!(sanitize_numeric("N/A"), 0.0);
        assert_eq!(sanitize_numeric(""), 0.0);
        assert_eq!(sanitize_numeric("G"), 0.0);
    }

    #[test]
    fn test_parse_top() {
        let snap = parse_top(TOP_OUTPUT);
        assert_eq!(snap.cpu_user_pct, 47.0);
        assert_eq!(snap.mem_total_kb, 5_847_124.0);
        assert_eq!(snap.mem_used_kb, 5_234_188.0);
    }

    #[test]
    fn test_parse_top_missing_sections_default() {
        assert_eq!(parse_top("garbage\nmore garbage"), TopSnapshot::default());
    }

    #[test]
    fn test_parse_df() {
        let raw = "\
Filesystem       Size  Used Avail Use% Mounted on
/dev/block/dm-5  110G   14G   96G  13% /data";
        let snap = parse_df(raw);
        assert_eq!(snap.used, 14.0);
        assert_eq!(snap.used_percent, 13.0);
    }

    #[test]
    fn test_parse_df_too_few_lines_is_empty_default() {
        assert_eq!(parse_df("Filesystem only header"), StorageSnapshot::default());
        assert_eq!(parse_df(""), StorageSnapshot::default());
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("123456.78 987654.32\n"), 123456.78);
        assert_eq!(parse_uptime(""), 0.0);
    }

    #[test]
    fn test_parse_janky_frames() {
        let raw = "\
Total frames rendered: 15478
Janky frames: 453 (2.93%)
50th percentile: 5ms";
        assert_eq!(parse_janky_frames(raw), 453.0);
    }

    #[test]
    fn test_parse_janky_frames_missing_line() {
        assert_eq!(parse_janky_frames("Total frames rendered: 10"), 0.0);
    }
}
