//! Policy configuration.
//!
//! Loaded from TOML or JSON (chosen by file extension), overlaid with
//! `STALE_*` environment variables, then validated.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StaleError};
use crate::quorum::ProbeCount;

/// Configuration for a [`StalePolicy`](crate::StalePolicy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaleConfig {
    /// Diagnostic label, attached to every log event of the policy
    pub name: Option<String>,
    /// Probes issued per verification; also the majority threshold base
    pub probe_count: u32,
    /// Poller period in milliseconds, 0 disables interval polling
    pub interval_ms: u64,
    /// Upper bound on back-to-back refetches caused by an accept majority
    pub max_refetches: u32,
    /// Report inconclusive verifications through the error handler
    pub report_inconclusive: bool,
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            name: None,
            probe_count: ProbeCount::DEFAULT,
            interval_ms: 0,
            max_refetches: 4,
            report_inconclusive: false,
        }
    }
}

impl StaleConfig {
    /// Default configuration with a diagnostic name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the probe count
    pub fn with_probe_count(mut self, probe_count: u32) -> Self {
        self.probe_count = probe_count;
        self
    }

    /// Set the poller interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the refetch bound
    pub fn with_max_refetches(mut self, max_refetches: u32) -> Self {
        self.max_refetches = max_refetches;
        self
    }

    /// Enable or disable inconclusive reporting
    pub fn with_report_inconclusive(mut self, report: bool) -> Self {
        self.report_inconclusive = report;
        self
    }

    /// Validated probe count
    pub fn probe_count(&self) -> Result<ProbeCount> {
        ProbeCount::new(self.probe_count)
            .ok_or_else(|| StaleError::configuration("probe_count must be at least 1"))
    }

    /// Poller period, `None` when interval polling is disabled
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }

    /// Label used in log events
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("stale-state")
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StaleError::configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| StaleError::configuration(format!("invalid TOML: {e}")))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StaleError::configuration(format!("invalid JSON: {e}")))?,
            _ => {
                return Err(StaleError::configuration(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Overlay `STALE_*` environment variables
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment-like lookup
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("STALE_NAME") {
            self.name = Some(name);
        }
        if let Some(value) = lookup("STALE_PROBE_COUNT") {
            self.probe_count = parse_var("STALE_PROBE_COUNT", &value)?;
        }
        if let Some(value) = lookup("STALE_INTERVAL_MS") {
            self.interval_ms = parse_var("STALE_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("STALE_MAX_REFETCHES") {
            self.max_refetches = parse_var("STALE_MAX_REFETCHES", &value)?;
        }
        if let Some(value) = lookup("STALE_REPORT_INCONCLUSIVE") {
            self.report_inconclusive = parse_var("STALE_REPORT_INCONCLUSIVE", &value)?;
        }
        Ok(())
    }

    /// Reject settings the policy cannot run with
    pub fn validate(&self) -> Result<()> {
        self.probe_count()?;
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(StaleError::configuration("name must not be blank"));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StaleError::configuration(format!("invalid value in {key}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = StaleConfig::default();
        assert_eq!(config.probe_count, 6);
        assert_eq!(config.interval(), None);
        assert_eq!(config.max_refetches, 4);
        assert!(!config.report_inconclusive);
        assert_eq!(config.label(), "stale-state");
    }

    #[test]
    fn zero_probe_count_fails_validation() {
        let err = StaleConfig::default()
            .with_probe_count(0)
            .validate()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: StaleConfig = toml::from_str("name = \"feed\"\nprobe_count = 4\n").unwrap();
        assert_eq!(config.name.as_deref(), Some("feed"));
        assert_eq!(config.probe_count, 4);
        assert_eq!(config.max_refetches, 4);
    }

    #[test]
    fn loads_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"probe_count": 8, "interval_ms": 250}}"#).unwrap();

        let config = StaleConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.probe_count, 8);
        assert_eq!(config.interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(StaleConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn env_overlay_parses_values() {
        let vars: HashMap<&str, &str> = [
            ("STALE_NAME", "ledger"),
            ("STALE_PROBE_COUNT", "10"),
            ("STALE_REPORT_INCONCLUSIVE", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = StaleConfig::default();
        config
            .merge_with_vars(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.label(), "ledger");
        assert_eq!(config.probe_count, 10);
        assert!(config.report_inconclusive);
    }

    #[test]
    fn env_overlay_rejects_garbage() {
        let mut config = StaleConfig::default();
        let err = config
            .merge_with_vars(|key| (key == "STALE_PROBE_COUNT").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("STALE_PROBE_COUNT"));
    }
}
