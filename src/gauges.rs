//! Live-metric publication.
//!
//! Last-value-wins gauges keyed by metric name and device, rendered in
//! Prometheus text exposition format (text/plain; version=0.0.4).
//! No external crate dependency — formats the text manually.

use std::collections::HashMap;
use std::sync::RwLock;

pub const CPU_USER: &str = "android_cpu_user";
pub const CPU_CORES: &str = "android_cpu_cores";
pub const MEM_TOTAL: &str = "android_mem_total";
pub const MEM_USED: &str = "android_mem_used";
pub const MEM_PERCENT: &str = "android_mem_usage_percent";
pub const STORAGE_USED: &str = "android_storage_usage";
pub const STORAGE_PERCENT: &str = "android_storage_percentage";
pub const UPTIME: &str = "android_uptime";
pub const BAD_FRAMES: &str = "android_bad_frames";

/// The published gauge catalogue. Render order follows this table.
const GAUGES: &[(&str, &str)] = &[
    (CPU_USER, "User CPU usage of Android device in %"),
    (CPU_CORES, "Number of CPU cores in the Android device"),
    (MEM_TOTAL, "Total memory of Android device in KB"),
    (MEM_USED, "Memory usage of Android device in KB"),
    (MEM_PERCENT, "Memory usage percentage of Android device"),
    (STORAGE_USED, "Storage usage of Android device"),
    (STORAGE_PERCENT, "Storage usage percentage of Android device"),
    (UPTIME, "Device uptime in seconds"),
    (BAD_FRAMES, "Number of dropped frames"),
];

/// Current gauge values, one per (metric, device) pair.
///
/// Every value carries a `device` label so concurrent collections for
/// several devices never overwrite each other. Writes are last-value-wins;
/// an external scrape may read at any time.
pub struct GaugeBoard {
    values: RwLock<HashMap<(&'static str, String), f64>>,
}

impl GaugeBoard {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Set a gauge for one device, overwriting any previous value.
    pub fn set(&self, name: &'static str, device: &str, value: f64) {
        self.values
            .write()
            .expect("gauge lock poisoned")
            .insert((name, device.to_string()), value);
    }

    /// Drop every gauge carrying `device`'s label. Called when a device
    /// disconnects so stale values stop being scrapeable and the board
    /// does not grow with every device ever seen.
    pub fn remove_device(&self, device: &str) {
        self.values
            .write()
            .expect("gauge lock poisoned")
            .retain(|(_, d), _| d != device);
    }

    /// Read a gauge back (mainly for tests and status endpoints).
    pub fn get(&self, name: &'static str, device: &str) -> Option<f64> {
        self.values
            .read()
            .expect("gauge lock poisoned")
            .get(&(name, device.to_string()))
            .copied()
    }

    /// Render every known gauge that has at least one value.
    pub fn render(&self) -> String {
        let values = self.values.read().expect("gauge lock poisoned");
        let mut out = String::with_capacity(1024);

        for &(name, help) in GAUGES {
            let mut rows: Vec<(&String, f64)> = values
                .iter()
                .filter(|((n, _), _)| *n == name)
                .map(|((_, device), v)| (device, *v))
                .collect();
            if rows.is_empty() {
                continue;
            }
            rows.sort_by(|a, b| a.0.cmp(b.0));

            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} gauge\n"));
            for (device, value) in rows {
                out.push_str(&format!("{name}{{device=\"{device}\"}} {value}\n"));
            }
        }

        out
    }
}

impl Default for GaugeBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_board_renders_nothing() {
        let board = GaugeBoard::new();
        assert_eq!(board.render(), "");
    }

    #[test]
    fn test_set_and_render() {
        let board = GaugeBoard::new();
        board.set(CPU_USER, "10.0.0.5", 42.5);

        let text = board.render();
        assert!(text.contains("# HELP android_cpu_user"));
        assert!(text.contains("# TYPE android_cpu_user gauge"));
        assert!(text.contains("android_cpu_user{device=\"10.0.0.5\"} 42.5"));
    }

    #[test]
    fn test_last_value_wins() {
        let board = GaugeBoard::new();
        board.set(UPTIME, "10.0.0.5", 100.0);
        board.set(UPTIME, "10.0.0.5", 200.0);
        assert_eq!(board.get(UPTIME, "10.0.0.5"), Some(200.0));

        let text = board.render();
        assert!(text.contains("android_uptime{device=\"10.0.0.5\"} 200\n"));
        assert!(!text.contains(" 100\n"));
    }

    #[test]
    fn test_remove_device_drops_only_that_device() {
        let board = GaugeBoard::new();
        board.set(UPTIME, "10.0.0.5", 100.0);
        board.set(BAD_FRAMES, "10.0.0.5", 3.0);
        board.set(UPTIME, "10.0.0.6", 200.0);

        board.remove_device("10.0.0.5");

        assert_eq!(board.get(UPTIME, "10.0.0.5"), None);
        assert_eq!(board.get(BAD_FRAMES, "10.0.0.5"), None);
        assert_eq!(board.get(UPTIME, "10.0.0.6"), Some(200.0));

        let text = board.render();
        assert!(!text.contains("10.0.0.5"));
        assert!(text.contains("android_uptime{device=\"10.0.0.6\"} 200"));
    }

    #[test]
    fn test_devices_do_not_overwrite_each_other() {
        let board = GaugeBoard::new();
        board.set(BAD_FRAMES, "10.0.0.5", 3.0);
        board.set(BAD_FRAMES, "10.0.0.6", 7.0);

        let text = board.render();
        assert!(text.contains("android_bad_frames{device=\"10.0.0.5\"} 3"));
        assert!(text.contains("android_bad_frames{device=\"10.0.0.6\"} 7"));
    }
}
