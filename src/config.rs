use anyhow::Result;
use serde::Deserialize;

/// Application configuration loaded from a TOML file or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path to the adb binary.
    #[serde(default = "default_adb_bin")]
    pub adb_bin: String,

    /// Sampling interval in seconds, applied uniformly to every
    /// collection loop.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Application package whose dropped frames are measured.
    #[serde(default = "default_app_package")]
    pub app_package: String,
}

fn default_adb_bin() -> String {
    "adb".to_string()
}

fn default_sample_interval() -> u64 {
    10
}

fn default_app_package() -> String {
    "com.google.android.youtube".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb_bin: default_adb_bin(),
            sample_interval_secs: default_sample_interval(),
            app_package: default_app_package(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::de::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.adb_bin, "adb");
        assert_eq!(cfg.sample_interval_secs, 10);
        assert_eq!(cfg.app_package, "com.google.android.youtube");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::de::from_str("sample_interval_secs = 5").unwrap();
        assert_eq!(cfg.sample_interval_secs, 5);
        assert_eq!(cfg.adb_bin, "adb");
    }
}
