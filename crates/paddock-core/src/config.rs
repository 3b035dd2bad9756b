//! Configuration parsing for the Paddock framework.
//!
//! All components read their settings from a single JSON config file. The
//! top-level structure contains logging metadata, an `accounts` array (one
//! entry per exchange session), a `subscriptions` array (one entry per feed
//! subscription), and optional execution tuning.
//!
//! # Example config
//!
//! ```json
//! {
//!   "paddock": { "module_name": "paddock", "log_path": "/tmp/log" },
//!   "accounts": [
//!     { "exchange": "simulated", "username": "paper1" },
//!     { "exchange": "betfair", "username": "acct", "app_key": "...",
//!       "password": "..." }
//!   ],
//!   "subscriptions": [{
//!     "market_filter": { "eventTypeIds": ["7"] },
//!     "market_data_filter": { "fields": ["EX_BEST_OFFERS"] },
//!     "conflate_ms": 50
//!   }],
//!   "execution": { "fill_latency_ms": 10 }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::PaddockError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub paddock: Option<ModuleMeta>,

    /// One entry per exchange account session.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// One entry per feed subscription to open at startup.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,

    /// Simulated execution tuning.
    pub execution: Option<ExecutionConfig>,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"paddock"`.
    pub fn module_name(&self) -> String {
        self.paddock
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "paddock".to_string())
    }

    /// Returns the log path, if configured.
    pub fn log_path(&self) -> Option<String> {
        self.paddock.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// One exchange account session.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Venue identifier: `"betfair"`, `"betconnect"`, `"simulated"`.
    pub exchange: String,

    /// Account username (unique per venue).
    pub username: String,

    /// Application key for venue REST APIs.
    pub app_key: Option<String>,

    /// Account password (interactive login).
    pub password: Option<String>,

    /// Override for the venue identity/session endpoint.
    pub identity_url: Option<String>,

    /// Override for the venue account API endpoint.
    pub account_url: Option<String>,

    /// Treat a live account as paper-trading (no real order submission).
    pub paper_trade: Option<bool>,

    /// Session keep-alive interval in seconds.
    pub keep_alive_secs: Option<u64>,
}

impl AccountConfig {
    pub fn is_paper_trade(&self) -> bool {
        self.paper_trade.unwrap_or(false)
    }

    /// Returns the keep-alive interval, defaulting to one hour.
    pub fn effective_keep_alive_secs(&self) -> u64 {
        self.keep_alive_secs.unwrap_or(3600)
    }
}

/// One feed subscription to register at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Strategy label for attribution.
    pub strategy: Option<String>,

    /// Opaque market filter forwarded to the transport.
    #[serde(default)]
    pub market_filter: Value,

    /// Opaque market-data field filter forwarded to the transport.
    #[serde(default)]
    pub market_data_filter: Value,

    /// Feed inactivity timeout in seconds.
    pub streaming_timeout: Option<f64>,

    /// Minimum interval between delivered batches, in milliseconds.
    pub conflate_ms: Option<u64>,

    /// Route through the cache engine (data stream) instead of raw market
    /// book passthrough.
    pub raw_data: Option<bool>,

    /// Subscription operation tag on the raw-data path:
    /// `"marketSubscription"` (default) or `"raceSubscription"`.
    pub operation: Option<String>,

    /// Market ids the simulated feed should synthesize (all-simulated runs).
    pub sim_markets: Option<Vec<String>>,
}

impl SubscriptionConfig {
    pub fn effective_streaming_timeout(&self) -> f64 {
        self.streaming_timeout.unwrap_or(30.0)
    }

    pub fn effective_conflate_ms(&self) -> u64 {
        self.conflate_ms.unwrap_or(0)
    }

    pub fn wants_raw_data(&self) -> bool {
        self.raw_data.unwrap_or(false)
    }
}

/// Simulated execution tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Artificial latency applied before simulated fills (ms).
    pub fill_latency_ms: Option<u64>,
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PaddockError::Config(format!("{}: {e}", path.display())))?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| PaddockError::Config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let raw = r#"{
            "accounts": [{ "exchange": "simulated", "username": "paper1" }],
            "subscriptions": [{ "market_filter": { "eventTypeIds": ["7"] } }]
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.module_name(), "paddock");
        assert_eq!(config.accounts.len(), 1);
        assert!(!config.accounts[0].is_paper_trade());
        let sub = &config.subscriptions[0];
        assert_eq!(sub.effective_conflate_ms(), 0);
        assert!((sub.effective_streaming_timeout() - 30.0).abs() < f64::EPSILON);
        assert!(!sub.wants_raw_data());
        assert!(sub.operation.is_none());
    }

    #[test]
    fn parse_subscription_operation_tag() {
        let raw = r#"{
            "subscriptions": [{ "raw_data": true, "operation": "raceSubscription" }]
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(
            config.subscriptions[0].operation.as_deref(),
            Some("raceSubscription"),
        );
    }

    #[test]
    fn load_config_failures_are_config_errors() {
        let missing = load_config(std::path::Path::new("/nonexistent/paddock.json")).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<PaddockError>(),
            Some(PaddockError::Config(_)),
        ));

        let path = std::env::temp_dir().join("paddock-config-malformed.json");
        std::fs::write(&path, "{ not json").unwrap();
        let malformed = load_config(&path).unwrap_err();
        assert!(matches!(
            malformed.downcast_ref::<PaddockError>(),
            Some(PaddockError::Config(_)),
        ));
        let _ = std::fs::remove_file(&path);
    }
}
