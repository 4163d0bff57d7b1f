//! Wallet configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use biopay_types::{NetworkId, NetworkProfile};
use biopay_utils::LogFormat;

use crate::balance::PriceTable;
use crate::chain::HttpSettings;
use crate::error::WalletError;
use crate::history::DEFAULT_HISTORY_CAP;
use crate::network::RetryPolicy;
use crate::storage::FallbackPolicy;

/// Configuration for a wallet instance.
///
/// Can be loaded from a TOML file via [`WalletConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Which network to talk to.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Node (algod) URL override.
    #[serde(default)]
    pub node_url: Option<String>,

    /// Indexer URL override.
    #[serde(default)]
    pub indexer_url: Option<String>,

    /// Explorer URL override.
    #[serde(default)]
    pub explorer_url: Option<String>,

    /// Token sent as `X-Algo-API-Token` to the node and indexer.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Base URL of the face matching service.
    #[serde(default = "default_face_service_url")]
    pub face_service_url: String,

    /// Directory for the local key/value stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// What to do when the secure store cannot be written.
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Extra attempts for balance and history reads. Submission is never retried.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum entries kept in the local history list.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// USD price per unit symbol.
    #[serde(default = "default_prices")]
    pub prices: BTreeMap<String, f64>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::TestNet
}

fn default_face_service_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./biopay_data")
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prices() -> BTreeMap<String, f64> {
    BTreeMap::from([("ALGO".to_string(), 1.60), ("USDC".to_string(), 1.00)])
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(s).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, WalletError> {
        toml::to_string_pretty(self).map_err(|e| WalletError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(WalletError::Config("timeouts must be at least one second".into()));
        }
        if self.history_cap == 0 {
            return Err(WalletError::Config("history_cap must be positive".into()));
        }
        if let Some((unit, _)) = self.prices.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
            return Err(WalletError::Config(format!("price for {unit} must be a non-negative number")));
        }
        Ok(())
    }

    /// The built-in profile for `network` with any endpoint overrides applied.
    pub fn network_profile(&self) -> NetworkProfile {
        let mut profile = NetworkProfile::for_network(self.network);
        let overridden = self.node_url.is_some() || self.indexer_url.is_some() || self.explorer_url.is_some();
        if overridden {
            profile = NetworkProfile::custom(
                self.network,
                self.node_url.clone().unwrap_or(profile.node_url),
                self.indexer_url.clone().unwrap_or(profile.indexer_url),
                self.explorer_url.clone().unwrap_or(profile.explorer_url),
            );
        }
        profile
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            api_token: self.api_token.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            read_retries: self.read_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable::new(self.prices.clone())
    }

    /// Install the global subscriber for `log_format` and `log_level`.
    pub fn init_logging(&self) -> Result<(), WalletError> {
        biopay_utils::try_init_logging(self.log_format, &self.log_level)
            .map_err(|e| WalletError::Config(format!("logging: {e}")))
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            node_url: None,
            indexer_url: None,
            explorer_url: None,
            api_token: None,
            face_service_url: default_face_service_url(),
            data_dir: default_data_dir(),
            fallback_policy: FallbackPolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            history_cap: default_history_cap(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            prices: default_prices(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WalletConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = WalletConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.network, config.network);
        assert_eq!(parsed.history_cap, config.history_cap);
        assert_eq!(parsed.prices, config.prices);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = WalletConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.network, NetworkId::TestNet);
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.read_retries, 2);
        assert_eq!(config.history_cap, 10);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.fallback_policy, FallbackPolicy::Allow);
        assert_eq!(config.price_table().price_of("ALGO"), 1.60);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "mainnet"
            read_retries = 0
            log_format = "json"
            fallback_policy = "deny"

            [prices]
            ALGO = 0.25
        "#;
        let config = WalletConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::MainNet);
        assert_eq!(config.read_retries, 0);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.fallback_policy, FallbackPolicy::Deny);
        assert_eq!(config.price_table().price_of("USDC"), 0.0);
        assert_eq!(config.network_profile().genesis_id, "mainnet-v1.0");
    }

    #[test]
    fn endpoint_overrides_keep_genesis() {
        let config = WalletConfig::from_toml_str(r#"node_url = "http://localhost:4001""#).unwrap();
        let profile = config.network_profile();
        assert_eq!(profile.node_url, "http://localhost:4001");
        assert_eq!(profile.indexer_url, NetworkProfile::testnet().indexer_url);
        assert_eq!(profile.genesis_id, "testnet-v1.0");
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(WalletConfig::from_toml_str("network = \"betanet\"").is_err());
        assert!(WalletConfig::from_toml_str("history_cap = 0").is_err());
        assert!(WalletConfig::from_toml_str("request_timeout_secs = 0").is_err());
        let err = WalletConfig::from_toml_str("[prices]\nALGO = -1.0").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.toml");
        std::fs::write(&path, "history_cap = 25\n").unwrap();
        assert_eq!(WalletConfig::from_toml_file(&path).unwrap().history_cap, 25);
        assert!(WalletConfig::from_toml_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn logging_installs_once() {
        let config = WalletConfig::default();
        let _ = config.init_logging();
        let err = config.init_logging().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn http_settings_follow_config() {
        let config = WalletConfig {
            api_token: Some("secret".into()),
            connect_timeout_secs: 3,
            ..WalletConfig::default()
        };
        let settings = config.http_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.api_token.as_deref(), Some("secret"));
    }
}
