//! Service configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use cardproof_anchor::WorkerConfig;
use cardproof_core::{CosignPolicy, HtmlPolicy};
use tracing::warn;

/// Configuration for the proof service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Provider used when an anchor request names none.
    pub default_provider: String,
    /// Anchor jobs an owner may queue per UTC day.
    pub anchors_per_day: u32,
    /// Anchor worker configuration.
    pub worker: WorkerConfig,
    /// Cosign replay window and trust list.
    pub cosign: CosignPolicy,
    /// Volatile attributes stripped by `cc-html-1`.
    pub html_policy: HtmlPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_provider: "none".to_string(),
            anchors_per_day: 10,
            worker: WorkerConfig::default(),
            cosign: CosignPolicy::default(),
            html_policy: HtmlPolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by environment variables:
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `ANCHOR_DEFAULT_PROVIDER` | `default_provider` |
    /// | `ANCHORS_PER_DAY` | `anchors_per_day` |
    /// | `ANCHOR_POLL_MS` | `worker.poll_interval` |
    /// | `ANCHOR_POLL_MAX_MS` | `worker.max_wait` |
    /// | `ANCHOR_CONCURRENCY` | `worker.concurrency` |
    ///
    /// Malformed values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(provider) = lookup("ANCHOR_DEFAULT_PROVIDER") {
            let provider = provider.trim();
            if provider.is_empty() {
                warn!(key = "ANCHOR_DEFAULT_PROVIDER", "empty value, using default");
            } else {
                config.default_provider = provider.to_string();
            }
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "ANCHORS_PER_DAY") {
            config.anchors_per_day = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "ANCHOR_POLL_MS") {
            config.worker.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "ANCHOR_POLL_MAX_MS") {
            config.worker.max_wait = Duration::from_millis(ms);
        }
        match parse_var::<usize, _>(&lookup, "ANCHOR_CONCURRENCY") {
            Some(0) => warn!(key = "ANCHOR_CONCURRENCY", "must be positive, using default"),
            Some(n) => config.worker.concurrency = n,
            None => {}
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "malformed value, using default");
            None
        }
    }
}
