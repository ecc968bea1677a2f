// src/settings.rs

use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::networks::DEFAULT_NETWORK_MAP;

/// Market data provider (Alchemy) configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: String,
    /// Base for the per-network JSON-RPC endpoint. The network identifier is
    /// substituted for `{network}`.
    #[serde(default = "default_rpc_base_url")]
    pub rpc_base_url: String,
    /// Base for the historical prices REST API.
    #[serde(default = "default_price_api_base_url")]
    pub price_api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Logical network name -> provider network identifier. Networks absent
    /// from this table pass through unchanged.
    #[serde(default = "default_network_map")]
    pub networks: HashMap<String, String>,
}

fn default_rpc_base_url() -> String {
    "https://{network}.g.alchemy.com/v2".to_string()
}
fn default_price_api_base_url() -> String {
    "https://api.g.alchemy.com/prices/v1".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_network_map() -> HashMap<String, String> {
    DEFAULT_NETWORK_MAP.clone()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            rpc_base_url: default_rpc_base_url(),
            price_api_base_url: default_price_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            networks: default_network_map(),
        }
    }
}

/// PostgreSQL record store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_connect_max_attempts")]
    pub connect_max_attempts: u32,
}

fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    5
}
fn default_connect_max_attempts() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            connect_max_attempts: default_connect_max_attempts(),
        }
    }
}

/// Redis-backed job queue configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    #[serde(default = "default_queue_url")]
    pub url: String,
    #[serde(default = "default_requests_key")]
    pub requests_key: String,
    #[serde(default = "default_results_key")]
    pub results_key: String,
    /// BLPOP timeout; bounds how long the worker waits before re-checking
    /// its shutdown flag.
    #[serde(default = "default_pop_timeout_secs")]
    pub pop_timeout_secs: u64,
}

fn default_queue_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_requests_key() -> String {
    "backfill:requests".to_string()
}
fn default_results_key() -> String {
    "backfill:results".to_string()
}
fn default_pop_timeout_secs() -> u64 {
    5
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: default_queue_url(),
            requests_key: default_requests_key(),
            results_key: default_results_key(),
            pop_timeout_secs: default_pop_timeout_secs(),
        }
    }
}

/// Backfill engine tunables.
#[derive(Debug, Deserialize, Clone)]
pub struct BackfillSettings {
    /// Minimum spacing between successive provider calls within one job.
    /// Values below 500 ms are clamped up: the provider rate limit is a
    /// hard external constraint.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
}

fn default_min_request_interval_ms() -> u64 {
    500
}
fn default_quote_currency() -> String {
    "usd".to_string()
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            min_request_interval_ms: default_min_request_interval_ms(),
            quote_currency: default_quote_currency(),
        }
    }
}

/// Top-level configuration, loaded from `Config.toml` (optional) with
/// environment variable overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub backfill: BackfillSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for deploy-time secrets
        if let Ok(key) = env::var("BACKFILL_PROVIDER_API_KEY") {
            if !key.trim().is_empty() {
                settings.provider.api_key = key.trim().to_string();
            }
        }
        if let Ok(url) = env::var("BACKFILL_DATABASE_URL") {
            if !url.trim().is_empty() {
                settings.database.url = url.trim().to_string();
            }
        }
        if let Ok(url) = env::var("BACKFILL_QUEUE_URL") {
            if !url.trim().is_empty() {
                settings.queue.url = url.trim().to_string();
            }
        }

        // Optional: network mapping override via ENV (JSON: { logical: provider_id })
        if let Ok(raw_map) = env::var("BACKFILL_NETWORK_MAP") {
            let trimmed = raw_map.trim();
            if !trimmed.is_empty() {
                match serde_json::from_str::<HashMap<String, String>>(trimmed) {
                    Ok(map) => {
                        for (logical, provider_id) in map {
                            if !logical.trim().is_empty() && !provider_id.trim().is_empty() {
                                settings
                                    .provider
                                    .networks
                                    .insert(logical.to_lowercase(), provider_id);
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("Failed to parse BACKFILL_NETWORK_MAP as JSON: {}", e);
                    }
                }
            }
        }

        // Clamp pacing to the provider's hard floor
        if settings.backfill.min_request_interval_ms < 500 {
            settings.backfill.min_request_interval_ms = 500;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = Settings::from_file("does-not-exist").expect("defaults should load");
        assert_eq!(settings.backfill.min_request_interval_ms, 500);
        assert_eq!(settings.backfill.quote_currency, "usd");
        assert_eq!(settings.queue.requests_key, "backfill:requests");
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(
            settings.provider.networks.get("ethereum").map(String::as_str),
            Some("eth-mainnet")
        );
    }

    #[test]
    fn test_config_file_overrides_and_interval_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[backfill]\nmin_request_interval_ms = 100\nquote_currency = \"eur\"\n\n[queue]\nrequests_key = \"jobs:in\""
        )
        .unwrap();

        let settings = Settings::from_file(path.to_str().unwrap()).unwrap();
        // 100 ms is below the provider floor and must clamp to 500
        assert_eq!(settings.backfill.min_request_interval_ms, 500);
        assert_eq!(settings.backfill.quote_currency, "eur");
        assert_eq!(settings.queue.requests_key, "jobs:in");
    }
}
