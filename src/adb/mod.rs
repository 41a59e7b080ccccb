//! Debug-bridge command transport.
//!
//! All device interaction goes through the [`CommandRunner`] trait so the
//! collector can be driven by a scripted runner in tests. The real
//! implementation shells out to the `adb` binary, one process per command.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result of one remote command round-trip.
///
/// A non-zero exit status is not an error at this layer; callers branch on
/// [`CommandOutput::success`].
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum AdbError {
    /// The device identifier is not a well-formed IP address. Rejected
    /// before any command is issued.
    #[error("invalid device address: {0}")]
    InvalidDevice(String),

    /// The adb process could not be spawned at all.
    #[error("failed to execute adb: {0}")]
    Spawn(#[from] std::io::Error),

    /// The device did not answer a required lookup.
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),
}

/// Something that can execute a command against a remote device.
///
/// `argv` is everything after the device selector, e.g.
/// `["shell", "getprop", "ro.product.name"]`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, device: &str, argv: &[&str]) -> Result<CommandOutput, AdbError>;
}

/// Check that a device identifier is a well-formed IPv4 or IPv6 address.
pub fn is_valid_device(device: &str) -> bool {
    device.parse::<std::net::IpAddr>().is_ok()
}

/// Static device metadata, fetched once per collection rather than per tick.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub os_version: String,
}

/// The real transport: spawns one `adb -s <device> …` process per command.
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb_bin: String,
}

impl AdbClient {
    pub fn new(adb_bin: &str) -> Self {
        Self {
            adb_bin: adb_bin.to_string(),
        }
    }
}

#[async_trait]
impl CommandRunner for AdbClient {
    async fn run(&self, device: &str, argv: &[&str]) -> Result<CommandOutput, AdbError> {
        if !is_valid_device(device) {
            warn!(device, "refusing to run adb command for invalid address");
            return Err(AdbError::InvalidDevice(device.to_string()));
        }

        debug!(device, ?argv, "running adb command");
        let output = tokio::process::Command::new(&self.adb_bin)
            .arg("-s")
            .arg(device)
            .args(argv)
            .output()
            .await?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Read a single system property from the device.
async fn getprop(
    runner: &dyn CommandRunner,
    device: &str,
    prop: &str,
) -> Result<String, AdbError> {
    let out = runner.run(device, &["shell", "getprop", prop]).await?;
    if !out.success() {
        return Err(AdbError::DeviceUnreachable(format!(
            "getprop {prop} failed: {}",
            out.stderr.trim()
        )));
    }
    Ok(out.stdout.trim().to_string())
}

/// Fetch the device name and OS version.
pub async fn device_info(
    runner: &dyn CommandRunner,
    device: &str,
) -> Result<DeviceInfo, AdbError> {
    if !is_valid_device(device) {
        return Err(AdbError::InvalidDevice(device.to_string()));
    }
    let name = getprop(runner, device, "ro.product.name").await?;
    let os_version = getprop(runner, device, "ro.build.version.release").await?;
    debug!(device, name, os_version, "device info fetched");
    Ok(DeviceInfo { name, os_version })
}

/// Connect to a device over TCP. Returns whether the handshake succeeded
/// together with the transport's own message.
pub async fn connect(
    runner: &dyn CommandRunner,
    device: &str,
) -> Result<(bool, String), AdbError> {
    if !is_valid_device(device) {
        return Err(AdbError::InvalidDevice(device.to_string()));
    }

    let out = runner.run(device, &["connect", device]).await?;
    if out.stdout.to_lowercase().contains("connected") {
        info!(device, "device connected");
        Ok((true, format!("connected to {device}")))
    } else {
        let message = if out.stdout.trim().is_empty() {
            out.stderr.trim().to_string()
        } else {
            out.stdout.trim().to_string()
        };
        warn!(device, message, "device connect failed");
        Ok((false, message))
    }
}

/// Disconnect a device.
pub async fn disconnect(
    runner: &dyn CommandRunner,
    device: &str,
) -> Result<(bool, String), AdbError> {
    if !is_valid_device(device) {
        return Err(AdbError::InvalidDevice(device.to_string()));
    }

    let out = runner.run(device, &["disconnect", device]).await?;
    if out.stdout.to_lowercase().contains("disconnected") {
        info!(device, "device disconnected");
        Ok((true, format!("disconnected from {device}")))
    } else {
        let message = if out.stdout.trim().is_empty() {
            out.stderr.trim().to_string()
        } else {
            out.stdout.trim().to_string()
        };
        warn!(device, message, "device disconnect failed");
        Ok((false, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRunner {
        stdout: &'static str,
    }

    #[async_trait]
    impl CommandRunner for StaticRunner {
        async fn run(&self, _device: &str, _argv: &[&str]) -> Result<CommandOutput, AdbError> {
            Ok(CommandOutput {
                status: 0,
                stdout: self.stdout.to_string(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn test_valid_device_addresses() {
        assert!(is_valid_device("10.0.0.5"));
        assert!(is_valid_device("192.168.1.200"));
        assert!(is_valid_device("::1"));
        assert!(!is_valid_device("not-an-ip"));
        assert!(!is_valid_device("10.0.0"));
        assert!(!is_valid_device(""));
    }

    #[test]
    fn test_command_output_success() {
        assert!(CommandOutput::default().success());
        assert!(!CommandOutput {
            status: 1,
            ..Default::default()
        }
        .success());
    }

    #[tokio::test]
    async fn test_connect_parses_transport_message() {
        let runner = StaticRunner {
            stdout: "connected to 10.0.0.5:5555",
        };
        let (ok, msg) = connect(&runner, "10.0.0.5").await.unwrap();
        assert!(ok);
        assert!(msg.contains("10.0.0.5"));

        let runner = StaticRunner {
            stdout: "failed to authenticate to 10.0.0.5:5555",
        };
        let (ok, msg) = connect(&runner, "10.0.0.5").await.unwrap();
        assert!(!ok);
        assert!(msg.contains("failed"));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_device_before_running() {
        let runner = StaticRunner {
            stdout: "connected",
        };
        let err = connect(&runner, "bogus").await.unwrap_err();
        assert!(matches!(err, AdbError::InvalidDevice(_)));
    }

    #[tokio::test]
    async fn test_device_info_trims_output() {
        let runner = StaticRunner { stdout: "pixel_7\n" };
        let info = device_info(&runner, "10.0.0.5").await.unwrap();
        assert_eq!(info.name, "pixel_7");
        assert_eq!(info.os_version, "pixel_7");
    }
}
