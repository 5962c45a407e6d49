/// Runtime configuration
///
/// Loaded from an optional `configs.json`, then overridden by environment
/// variables (a `.env` file is loaded by `main` before this runs).
use crate::constants::*;
use crate::errors::{MonitorError, MonitorResult};
use crate::rpc::utils::{is_valid_public_key, websocket_url_for};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configs {
    pub rpc_url: String,
    pub backup_rpc_url: Option<String>,
    /// Pubsub endpoint for `rpc_url`; derived when unset
    pub websocket_url: Option<String>,
    pub backup_websocket_url: Option<String>,
    pub wallet_address: String,
    /// Signatures per backfill page
    pub batch_size: usize,
    pub max_cache_size: usize,
    /// Handler runs per drain cycle
    pub parallel_limit: usize,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub history_delay_ms: u64,
    pub flush_interval_ms: u64,
    /// Transfers at or above this many SOL fire the trading callback
    pub min_trade_amount: f64,
    pub debug: bool,
}

impl Default for Configs {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            backup_rpc_url: None,
            websocket_url: None,
            backup_websocket_url: None,
            wallet_address: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            parallel_limit: DEFAULT_PARALLEL_LIMIT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_delay_ms: MAX_BACKOFF_MS,
            history_delay_ms: DEFAULT_HISTORY_DELAY_MS,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            min_trade_amount: DEFAULT_MIN_TRADE_AMOUNT,
            debug: false,
        }
    }
}

impl Configs {
    /// Apply overrides from a variable lookup (`std::env::var` in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("RPC_URL") {
            self.rpc_url = v;
        }
        if let Some(v) = non_empty("BACKUP_RPC") {
            self.backup_rpc_url = Some(v);
        }
        if let Some(v) = non_empty("RPC_WS_URL") {
            self.websocket_url = Some(v);
        }
        if let Some(v) = non_empty("BACKUP_WS_URL") {
            self.backup_websocket_url = Some(v);
        }
        if let Some(v) = non_empty("WALLET_ADDRESS") {
            self.wallet_address = v;
        }
        if let Some(v) = non_empty("DEBUG") {
            self.debug = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.rpc_url.is_empty() {
            return Err(MonitorError::Config("RPC_URL is required".to_string()));
        }
        check_url("rpc_url", &self.rpc_url)?;
        if let Some(url) = &self.backup_rpc_url {
            check_url("backup_rpc_url", url)?;
        }
        for (name, url) in [
            ("websocket_url", &self.websocket_url),
            ("backup_websocket_url", &self.backup_websocket_url),
        ] {
            if let Some(url) = url {
                check_url(name, url)?;
            }
        }

        if self.wallet_address.is_empty() {
            return Err(MonitorError::Config("WALLET_ADDRESS is required".to_string()));
        }
        if !is_valid_public_key(&self.wallet_address) {
            return Err(MonitorError::Config(format!(
                "WALLET_ADDRESS '{}' is not a valid public key",
                self.wallet_address
            )));
        }

        if self.batch_size == 0 || self.max_cache_size == 0 || self.parallel_limit == 0 {
            return Err(MonitorError::Config(
                "batch_size, max_cache_size and parallel_limit must be positive".to_string(),
            ));
        }
        if !(self.min_trade_amount >= 0.0) {
            return Err(MonitorError::Config("min_trade_amount must be >= 0".to_string()));
        }
        Ok(())
    }

    pub fn primary_websocket_url(&self) -> MonitorResult<String> {
        match &self.websocket_url {
            Some(url) => Ok(url.clone()),
            None => websocket_url_for(&self.rpc_url),
        }
    }

    /// `None` when no backup endpoint is configured
    pub fn backup_websocket_url(&self) -> MonitorResult<Option<String>> {
        match (&self.backup_rpc_url, &self.backup_websocket_url) {
            (None, _) => Ok(None),
            (Some(_), Some(ws)) => Ok(Some(ws.clone())),
            (Some(http), None) => websocket_url_for(http).map(Some),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn history_delay(&self) -> Duration {
        Duration::from_millis(self.history_delay_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn check_url(name: &str, value: &str) -> MonitorResult<()> {
    let url = url::Url::parse(value)
        .map_err(|e| MonitorError::Config(format!("{} '{}' is not a valid url: {}", name, value, e)))?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(MonitorError::Config(format!(
            "{} '{}' has unsupported scheme '{}'",
            name, value, other
        ))),
    }
}

/// Reads a configs file; missing file means defaults
pub fn read_configs<P: AsRef<Path>>(path: P) -> MonitorResult<Configs> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Configs::default());
    }
    let data = fs::read_to_string(path)?;
    let configs: Configs = serde_json::from_str(&data)?;
    Ok(configs)
}
