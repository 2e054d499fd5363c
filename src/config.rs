use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::Ms;

/// Worker settings, read from `CONSULTCAL_*` environment variables.
/// Missing or unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Delay before a new consultant booking leaves `Draft`.
    pub confirm_delay_ms: Ms,
    pub sweep_interval: Duration,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            confirm_delay_ms: 10_000,
            sweep_interval: Duration::from_millis(1_000),
            compact_threshold: 1_000,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }
        let defaults = Self::default();
        Self {
            data_dir: lookup("CONSULTCAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            confirm_delay_ms: parsed::<Ms>(&lookup, "CONSULTCAL_CONFIRM_DELAY_MS")
                .filter(|ms| *ms >= 0)
                .unwrap_or(defaults.confirm_delay_ms),
            sweep_interval: parsed::<u64>(&lookup, "CONSULTCAL_SWEEP_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            compact_threshold: parsed(&lookup, "CONSULTCAL_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parsed(&lookup, "CONSULTCAL_METRICS_PORT"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("consultcal.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("CONSULTCAL_DATA_DIR", "/var/lib/consultcal"),
            ("CONSULTCAL_CONFIRM_DELAY_MS", "2500"),
            ("CONSULTCAL_SWEEP_INTERVAL_MS", "250"),
            ("CONSULTCAL_COMPACT_THRESHOLD", "50"),
            ("CONSULTCAL_METRICS_PORT", "9100"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/consultcal"));
        assert_eq!(config.confirm_delay_ms, 2500);
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.wal_path(), PathBuf::from("/var/lib/consultcal/consultcal.wal"));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("CONSULTCAL_CONFIRM_DELAY_MS", "-5"),
            ("CONSULTCAL_SWEEP_INTERVAL_MS", "0"),
            ("CONSULTCAL_COMPACT_THRESHOLD", "lots"),
            ("CONSULTCAL_METRICS_PORT", "70000"),
        ]));
        assert_eq!(config, Config::default());
    }
}
