//! RPC utility functions
//!
//! Small helpers shared by the ledger clients and the ingestion drivers.

use crate::constants::LAMPORTS_PER_SOL;
use crate::errors::{MonitorError, MonitorResult};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Parse a pubkey from string safely
pub fn parse_pubkey(s: &str) -> MonitorResult<Pubkey> {
    Pubkey::from_str(s).map_err(|e| MonitorError::Config(format!("Invalid pubkey '{}': {}", s, e)))
}

/// True when the string is a base58 32-byte public key
pub fn is_valid_public_key(s: &str) -> bool {
    Pubkey::from_str(s).is_ok()
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}


/// Exponential backoff: `min(base * 2^attempt, cap)`, attempt counted from 0
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Derive the pubsub endpoint for an HTTP RPC url.
///
/// `http` becomes `ws`, `https` becomes `wss`; an explicit port is bumped by one,
/// which is how the validator exposes pubsub next to JSON-RPC.
pub fn websocket_url_for(http_url: &str) -> MonitorResult<String> {
    let mut url = Url::parse(http_url)
        .map_err(|e| MonitorError::Config(format!("Invalid RPC url '{}': {}", http_url, e)))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url.to_string()),
        other => {
            return Err(MonitorError::Config(format!(
                "Unsupported RPC url scheme '{}' in {}",
                other, http_url
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| MonitorError::Config(format!("Cannot derive websocket url from {}", http_url)))?;

    if let Some(port) = url.port() {
        let bumped = port.checked_add(1).ok_or_else(|| {
            MonitorError::Config(format!("Cannot derive websocket port from {}", http_url))
        })?;
        url.set_port(Some(bumped))
            .map_err(|_| MonitorError::Config(format!("Cannot set websocket port for {}", http_url)))?;
    }

    Ok(url.to_string())
}

/// Shorten a signature for log lines
pub fn short_signature(signature: &str) -> &str {
    let end = signature
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(signature.len());
    &signature[..end]
}
