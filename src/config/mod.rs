use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub overrides: OverrideConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory the file-backed key-value store writes snapshots under.
    pub snapshot_path: PathBuf,
    /// Quiescence window before a debounced durable flush, in milliseconds.
    pub flush_debounce_ms: u64,
    /// Entries older than this are purged at load time.
    pub max_age_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Per-probe timeout for primary candidates, in seconds.
    pub probe_timeout_secs: u64,
    /// Per-probe timeout for page-declared fallback candidates, in seconds.
    /// Declared icons trade speed for quality, so this is the longer one.
    pub fallback_probe_timeout_secs: u64,
    /// Page HTML fetch timeout, in seconds.
    pub page_timeout_secs: u64,
    /// Below this composite score the HTML fallback pass runs.
    pub good_enough_score: i32,
    /// At or above this score a fresh cached entry is served with no
    /// network I/O at all.
    pub high_confidence_score: i32,
    /// Age after which a background refresh is attempted while still
    /// serving the cached value, in hours.
    pub soft_expire_hours: i64,
    /// Age after which the previous score no longer blocks replacement,
    /// in days.
    pub force_refresh_days: i64,
    /// How many declared icons the fallback pass probes, largest first.
    pub fallback_probe_limit: usize,
    /// Fixed bonus added to page-declared icons before comparison.
    pub declared_bonus: i32,
    /// Optional host-native favicon endpoint (extension-style contexts).
    /// When set, candidates `{base}{domain}` are generated and ranked
    /// above everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_source_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OverrideConfig {
    /// Operator-curated domain -> icon URL map, merged over the built-in
    /// table. Presence here short-circuits all detection.
    #[serde(default)]
    pub icons: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                snapshot_path: PathBuf::from("./data/icon-cache"),
                flush_debounce_ms: 1000,
                max_age_days: 7,
            },
            detection: DetectionConfig {
                probe_timeout_secs: 3,
                fallback_probe_timeout_secs: 5,
                page_timeout_secs: 5,
                good_enough_score: 50,
                high_confidence_score: 60,
                soft_expire_hours: 24,
                force_refresh_days: 3,
                fallback_probe_limit: 4,
                declared_bonus: 20,
                native_source_base: None,
            },
            overrides: OverrideConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }
}

impl DetectionConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fallback_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_probe_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_are_ordered() {
        let config = Config::default();
        assert!(config.detection.good_enough_score < config.detection.high_confidence_score);
        assert!(
            config.detection.soft_expire_hours
                < config.detection.force_refresh_days * 24
        );
        assert!(
            config.detection.force_refresh_days < config.storage.max_age_days
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.detection.good_enough_score, 50);
        assert_eq!(back.storage.flush_debounce_ms, 1000);
    }
}
