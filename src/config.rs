// =============================================================================
// Service Configuration
// =============================================================================
//
// Loaded from a JSON file at startup, with a full set of serde defaults so an
// empty or partial file always produces a working configuration.  All fields
// carry `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_exchange() -> String {
    "binance".to_string()
}

fn default_candle_ttl_secs() -> u64 {
    300
}

fn default_funding_ttl_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_warm_limit() -> u32 {
    300
}

fn default_warm_pairs() -> Vec<WarmPair> {
    vec![
        WarmPair {
            symbol: "BTC/USDT".to_string(),
            timeframe: "1h".to_string(),
        },
        WarmPair {
            symbol: "ETH/USDT".to_string(),
            timeframe: "4h".to_string(),
        },
    ]
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// A (symbol, timeframe) pair pre-fetched into the candle cache at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmPair {
    pub symbol: String,
    pub timeframe: String,
}

/// Top-level configuration for the signal service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Exchange assumed when a request does not name one.
    #[serde(default = "default_exchange")]
    pub default_exchange: String,

    /// Candle cache validity window. Chosen to balance upstream rate limits
    /// against staleness of the derived signal.
    #[serde(default = "default_candle_ttl_secs")]
    pub candle_ttl_secs: u64,

    /// Funding cache validity window.
    #[serde(default = "default_funding_ttl_secs")]
    pub funding_ttl_secs: u64,

    /// Upper bound on any single upstream HTTP call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Candle series fetched proactively at startup.
    #[serde(default = "default_warm_pairs")]
    pub warm_pairs: Vec<WarmPair>,

    /// Candle count requested per warm-up fetch.
    #[serde(default = "default_warm_limit")]
    pub warm_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            default_exchange: default_exchange(),
            candle_ttl_secs: default_candle_ttl_secs(),
            funding_ttl_secs: default_funding_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            warm_pairs: default_warm_pairs(),
            warm_limit: default_warm_limit(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            candle_ttl_secs = config.candle_ttl_secs,
            "service config loaded"
        );

        Ok(config)
    }

    pub fn candle_ttl(&self) -> Duration {
        Duration::from_secs(self.candle_ttl_secs)
    }

    pub fn funding_ttl(&self) -> Duration {
        Duration::from_secs(self.funding_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
