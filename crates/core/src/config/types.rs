use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::ledger::{BillingPolicy, CreditCents};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dossier.db")
}

/// Lookup provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider API base URL (e.g., "https://lookup.example.com")
    pub url: String,
    /// Provider API token
    pub token: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Price table and billing policy.
///
/// Read at task submission time; a change never retroactively affects an
/// already-admitted task.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PricingConfig {
    /// Cost per provider search page, in credit cents.
    #[serde(default = "default_search_page_cost")]
    pub search_page_cost: CreditCents,
    /// Cost per fresh detail fetch, in credit cents. Cache hits are free.
    #[serde(default = "default_detail_cost")]
    pub detail_cost: CreditCents,
    /// Billing policy applied to new tasks.
    #[serde(default)]
    pub billing: BillingPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            search_page_cost: default_search_page_cost(),
            detail_cost: default_detail_cost(),
            billing: BillingPolicy::default(),
        }
    }
}

fn default_search_page_cost() -> CreditCents {
    10
}

fn default_detail_cost() -> CreditCents {
    100
}

/// Collection engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CollectorConfig {
    /// How many provider calls run simultaneously within a wave.
    #[serde(default = "default_wave_size")]
    pub wave_size: usize,
    /// Provider search pages consumed per subtask, also the admission cost
    /// bound.
    #[serde(default = "default_max_pages")]
    pub max_pages_per_subtask: u32,
    /// Cap on candidates carried forward per subtask, bounding worst-case
    /// detail cost for prepaid admission.
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_subtask: usize,
    /// Detail cache TTL in days.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: i64,
    /// Product default for the filter age window lower bound.
    #[serde(default)]
    pub default_min_age: Option<u8>,
    /// Product default for the filter age window upper bound.
    #[serde(default)]
    pub default_max_age: Option<u8>,
    /// Product default for the minimum report year filter.
    #[serde(default)]
    pub default_min_report_year: Option<u16>,
    /// Bound on a task's stored log.
    #[serde(default = "default_task_log_cap")]
    pub task_log_cap: usize,
    /// Attempts per progress write before degrading.
    #[serde(default = "default_persist_retry_attempts")]
    pub persist_retry_attempts: u32,
    /// Initial backoff between progress write attempts, in milliseconds.
    #[serde(default = "default_persist_retry_backoff_ms")]
    pub persist_retry_backoff_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            wave_size: default_wave_size(),
            max_pages_per_subtask: default_max_pages(),
            max_candidates_per_subtask: default_max_candidates(),
            cache_ttl_days: default_cache_ttl_days(),
            default_min_age: None,
            default_max_age: None,
            default_min_report_year: None,
            task_log_cap: default_task_log_cap(),
            persist_retry_attempts: default_persist_retry_attempts(),
            persist_retry_backoff_ms: default_persist_retry_backoff_ms(),
        }
    }
}

fn default_wave_size() -> usize {
    5
}

fn default_max_pages() -> u32 {
    1
}

fn default_max_candidates() -> usize {
    25
}

fn default_cache_ttl_days() -> i64 {
    30
}

fn default_task_log_cap() -> usize {
    50
}

fn default_persist_retry_attempts() -> u32 {
    3
}

fn default_persist_retry_backoff_ms() -> u64 {
    200
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<SanitizedProviderConfig>,
    pub pricing: PricingConfig,
    pub collector: CollectorConfig,
}

/// Sanitized provider config (API token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            provider: config.provider.as_ref().map(|p| SanitizedProviderConfig {
                url: p.url.clone(),
                token_configured: !p.token.is_empty(),
                timeout_secs: p.timeout_secs,
            }),
            pricing: config.pricing.clone(),
            collector: config.collector.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path.to_str().unwrap(), "dossier.db");
        assert!(config.provider.is_none());
        assert_eq!(config.pricing.search_page_cost, 10);
        assert_eq!(config.pricing.billing, BillingPolicy::PostpaidDeduct);
        assert_eq!(config.collector.wave_size, 5);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/dossier.sqlite"

[provider]
url = "https://lookup.example.com"
token = "secret-token"
timeout_secs = 10

[pricing]
search_page_cost = 50
detail_cost = 200
billing = "prepaid_freeze_settle"

[collector]
wave_size = 8
max_pages_per_subtask = 2
cache_ttl_days = 14
default_min_age = 18
default_max_age = 80
default_min_report_year = 2015
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.provider.as_ref().unwrap().timeout_secs, 10);
        assert_eq!(config.pricing.detail_cost, 200);
        assert_eq!(config.pricing.billing, BillingPolicy::PrepaidFreezeSettle);
        assert_eq!(config.collector.wave_size, 8);
        assert_eq!(config.collector.default_min_age, Some(18));
        assert_eq!(config.collector.default_min_report_year, Some(2015));
    }

    #[test]
    fn test_sanitized_config_redacts_token() {
        let config = Config {
            provider: Some(ProviderConfig {
                url: "https://lookup.example.com".to_string(),
                token: "secret-token".to_string(),
                timeout_secs: 30,
            }),
            ..Default::default()
        };

        let sanitized = SanitizedConfig::from(&config);
        let provider = sanitized.provider.unwrap();
        assert!(provider.token_configured);

        let json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap();
        assert!(!json.contains("secret-token"));
    }

    #[test]
    fn test_sanitized_config_without_provider() {
        let sanitized = SanitizedConfig::from(&Config::default());
        assert!(sanitized.provider.is_none());
    }
}
