//! Ledger access
//!
//! `LedgerClient` is the seam between the ingestion drivers and the network.
//! `RpcLedgerClient` talks to a real endpoint; tests use `testing::MockLedgerClient`.

mod client;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use client::{parse_ws_message, RpcLedgerClient, WsMessage};
pub use types::{
    AccountKey, ActivityNotification, ActivitySubscription, FetchedTransaction, InstructionRef,
    SignatureInfo, SubscriptionId, TransactionMeta,
};

use crate::constants::HEALTHY_LATENCY_MS;
use crate::errors::MonitorResult;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Endpoint label used in logs
    fn endpoint(&self) -> &str;

    /// Open a push subscription for every transaction mentioning `address`
    async fn subscribe_account_activity(&self, address: &str)
        -> MonitorResult<ActivitySubscription>;

    /// Cancel a subscription; unknown ids are ignored
    async fn unsubscribe(&self, id: SubscriptionId) -> MonitorResult<()>;

    /// Fetch a confirmed transaction, `None` when the ledger does not have it (yet)
    async fn fetch_transaction(&self, signature: &str) -> MonitorResult<Option<FetchedTransaction>>;

    /// One page of signatures for `address`, newest first, strictly older than `before`
    async fn list_signatures(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> MonitorResult<Vec<SignatureInfo>>;

    /// Round-trip a cheap request and report its latency
    async fn health_check(&self) -> MonitorResult<Duration>;
}

/// Health check: an endpoint is healthy when it answers within the latency budget
pub async fn validate_connection(client: &dyn LedgerClient) -> bool {
    match client.health_check().await {
        Ok(latency) => {
            let healthy = latency < Duration::from_millis(HEALTHY_LATENCY_MS);
            let message = format!(
                "Endpoint {} answered in {}ms",
                client.endpoint(),
                latency.as_millis()
            );
            if healthy {
                logger::info(LogTag::Rpc, &message);
            } else {
                logger::warning(LogTag::Rpc, &format!("{} (slow)", message));
            }
            healthy
        }
        Err(e) => {
            logger::warning(
                LogTag::Rpc,
                &format!("Endpoint {} failed health check: {}", client.endpoint(), e),
            );
            false
        }
    }
}
