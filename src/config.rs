// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::date_filter::DEFAULT_BUFFER_HOURS;

pub const ENV_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";
pub const ENV_BUFFER_HOURS: &str = "COLLECTOR_BUFFER_HOURS";
pub const DEFAULT_CONFIG_PATH: &str = "config/collector.toml";

fn default_buffer_hours() -> f64 {
    DEFAULT_BUFFER_HOURS
}
fn default_overfetch_factor() -> usize {
    3
}
fn default_fetch_ceiling() -> usize {
    500
}
fn default_max_concurrency() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_per_scope_limit() -> usize {
    25
}
fn default_popular_fetch_limit() -> usize {
    100
}

/// Tunables for the collector. The over-fetch factor and buffer are
/// empirical defaults, not guarantees about the remote's indexing lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Date filter tolerance when the caller gives none.
    #[serde(default = "default_buffer_hours")]
    pub default_buffer_hours: f64,
    /// Remote fetch size = limit × factor (before the ceiling).
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// Hard cap for any single remote fetch.
    #[serde(default = "default_fetch_ceiling")]
    pub fetch_ceiling: usize,
    /// Concurrent remote calls in multi-scope operations.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Overall deadline per operation.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_per_scope_limit")]
    pub per_scope_limit: usize,
    #[serde(default = "default_popular_fetch_limit")]
    pub popular_fetch_limit: usize,
    /// Default for the per-request `debug` flag.
    #[serde(default)]
    pub debug_filtering: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            default_buffer_hours: default_buffer_hours(),
            overfetch_factor: default_overfetch_factor(),
            fetch_ceiling: default_fetch_ceiling(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            per_scope_limit: default_per_scope_limit(),
            popular_fetch_limit: default_popular_fetch_limit(),
            debug_filtering: false,
        }
    }
}

impl CollectorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Remote fetch size for a caller limit: `limit × factor`, capped.
    pub fn fetch_size(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.overfetch_factor)
            .min(self.fetch_ceiling)
    }

    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        let cfg: CollectorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing collector config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $COLLECTOR_CONFIG_PATH
    /// 2) config/collector.toml
    /// 3) built-in defaults
    ///
    /// $COLLECTOR_BUFFER_HOURS then overrides the buffer.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };

        if let Some(h) = parse_buffer_env(std::env::var(ENV_BUFFER_HOURS).ok()) {
            cfg.default_buffer_hours = h;
        }
        Ok(cfg)
    }

    /// Clamp values into usable ranges.
    ///
    /// The default buffer must be positive: zero tolerance is only available
    /// per request.
    pub fn sanitized(mut self) -> Self {
        if !self.default_buffer_hours.is_finite() || self.default_buffer_hours <= 0.0 {
            warn!(
                target: "collect",
                configured = self.default_buffer_hours,
                "default_buffer_hours must be > 0; using {DEFAULT_BUFFER_HOURS}"
            );
            self.default_buffer_hours = default_buffer_hours();
        }
        self.overfetch_factor = self.overfetch_factor.max(1);
        self.fetch_ceiling = self.fetch_ceiling.max(1);
        self.max_concurrency = self.max_concurrency.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.per_scope_limit = self.per_scope_limit.max(1);
        self.popular_fetch_limit = self.popular_fetch_limit.max(1);
        self
    }
}

// positive finite hours only; anything else is ignored
fn parse_buffer_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: CollectorConfig = toml::from_str("overfetch_factor = 5\n").unwrap();
        assert_eq!(cfg.overfetch_factor, 5);
        assert_eq!(cfg.fetch_ceiling, 500);
        assert!((cfg.default_buffer_hours - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sanitize_clamps_zeroes_and_bad_buffer() {
        let cfg = CollectorConfig {
            default_buffer_hours: -3.0,
            overfetch_factor: 0,
            max_concurrency: 0,
            ..Default::default()
        }
        .sanitized();
        assert!((cfg.default_buffer_hours - DEFAULT_BUFFER_HOURS).abs() < 1e-9);
        assert_eq!(cfg.overfetch_factor, 1);
        assert_eq!(cfg.max_concurrency, 1);
    }

    #[test]
    fn zero_default_buffer_falls_back() {
        let cfg: CollectorConfig = toml::from_str("default_buffer_hours = 0.0\n").unwrap();
        assert!((cfg.sanitized().default_buffer_hours - DEFAULT_BUFFER_HOURS).abs() < 1e-9);
    }

    #[test]
    fn fetch_size_overfetches_and_caps() {
        let cfg = CollectorConfig::default();
        assert_eq!(cfg.fetch_size(10), 30);
        assert_eq!(cfg.fetch_size(400), 500);
        assert_eq!(cfg.fetch_size(usize::MAX), 500);
    }

    #[test]
    fn buffer_env_parsing() {
        assert_eq!(parse_buffer_env(Some(" 6.5 ".into())), Some(6.5));
        assert_eq!(parse_buffer_env(Some("-1".into())), None);
        assert_eq!(parse_buffer_env(Some("0".into())), None);
        assert_eq!(parse_buffer_env(Some("abc".into())), None);
        assert_eq!(parse_buffer_env(None), None);
    }
}
