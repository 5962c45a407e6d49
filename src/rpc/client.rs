//! Live ledger client
//!
//! Combines three transports against one endpoint:
//! - blocking `solana_client` RpcClient (run on `spawn_blocking`) for signature paging and health
//! - raw JSON-RPC over reqwest for `getTransaction` in `jsonParsed` encoding
//! - tokio-tungstenite websocket for `logsSubscribe`

use super::types::{
    ActivityNotification, ActivitySubscription, FetchedTransaction, SignatureInfo, SubscriptionId,
};
use super::LedgerClient;
use crate::constants::SUBSCRIBE_TIMEOUT_SECS;
use crate::errors::{MonitorError, MonitorResult};
use crate::logger::{self, LogTag};
use crate::rpc::utils::{parse_pubkey, short_signature};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use solana_client::rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SUBSCRIBE_REQUEST_ID: u64 = 1;
const UNSUBSCRIBE_REQUEST_ID: u64 = 2;

/// Decoded websocket frame
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    /// Reply to a request; `result` is the server-side subscription id for subscribe calls
    Reply { id: u64, result: Value },
    /// Reply carrying a JSON-RPC error object
    Failure { id: Option<u64>, message: String },
    Notification(ActivityNotification),
    Ignored,
}

/// Decode one text frame of the logs subscription protocol
pub fn parse_ws_message(text: &str) -> WsMessage {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return WsMessage::Ignored,
    };

    if value.get("method").and_then(Value::as_str) == Some("logsNotification") {
        let result = &value["params"]["result"];
        let signature = match result["value"]["signature"].as_str() {
            Some(s) => s.to_string(),
            None => return WsMessage::Ignored,
        };
        let slot = result["context"]["slot"].as_u64().unwrap_or_default();
        let err = match &result["value"]["err"] {
            Value::Null => None,
            other => Some(other.clone()),
        };
        return WsMessage::Notification(ActivityNotification { signature, slot, err });
    }

    let id = value.get("id").and_then(Value::as_u64);
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return WsMessage::Failure { id, message };
    }
    if let (Some(id), Some(result)) = (id, value.get("result")) {
        return WsMessage::Reply { id, result: result.clone() };
    }

    WsMessage::Ignored
}

pub struct RpcLedgerClient {
    http_url: String,
    ws_url: String,
    client: Arc<RpcClient>,
    http: reqwest::Client,
    subscriptions: Arc<Mutex<HashMap<u64, Arc<Notify>>>>,
    next_subscription: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(http_url: &str, ws_url: &str) -> Self {
        let client = RpcClient::new_with_commitment(
            http_url.to_string(),
            CommitmentConfig::confirmed(),
        );
        Self {
            http_url: http_url.to_string(),
            ws_url: ws_url.to_string(),
            client: Arc::new(client),
            http: reqwest::Client::new(),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn websocket_url(&self) -> &str {
        &self.ws_url
    }

    /// Subscriptions whose reader task is still running
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn connection_error(&self, message: impl Into<String>) -> MonitorError {
        MonitorError::connection(self.http_url.clone(), message)
    }

    async fn post_json_rpc(&self, method: &str, params: Value) -> MonitorResult<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .http
            .post(&self.http_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.connection_error(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(self.connection_error(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Rpc(format!("{} response unreadable: {}", method, e)))?;

        if let Some(error) = body.get("error") {
            return Err(MonitorError::Rpc(format!("{} failed: {}", method, error)));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    fn endpoint(&self) -> &str {
        &self.http_url
    }

    async fn subscribe_account_activity(
        &self,
        address: &str,
    ) -> MonitorResult<ActivitySubscription> {
        logger::debug(
            LogTag::Realtime,
            &format!("Connecting to {} for logs of {}", self.ws_url, address),
        );

        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| MonitorError::connection(self.ws_url.clone(), e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let request = json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [address] },
                { "commitment": "confirmed" }
            ]
        });
        sink.send(Message::Text(request.to_string()))
            .await
            .map_err(|e| MonitorError::connection(self.ws_url.clone(), e.to_string()))?;

        // The first reply to our request carries the server-side subscription id
        let confirmation = tokio::time::timeout(Duration::from_secs(SUBSCRIBE_TIMEOUT_SECS), async {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => return Err(MonitorError::connection(self.ws_url.clone(), e.to_string())),
                };
                match parse_ws_message(&text) {
                    WsMessage::Reply { id: SUBSCRIBE_REQUEST_ID, result } => {
                        return result.as_u64().ok_or_else(|| {
                            MonitorError::Subscription(format!("unexpected subscribe reply: {}", result))
                        });
                    }
                    WsMessage::Failure { message, .. } => {
                        return Err(MonitorError::Subscription(message));
                    }
                    _ => continue,
                }
            }
            Err(MonitorError::connection(
                self.ws_url.clone(),
                "connection closed before subscription was confirmed",
            ))
        })
        .await
        .map_err(|_| {
            MonitorError::Subscription(format!(
                "no subscription confirmation within {}s",
                SUBSCRIBE_TIMEOUT_SECS
            ))
        })??;

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        let cancel = Arc::new(Notify::new());
        self.subscriptions.lock().insert(id.0, cancel.clone());

        let (sender, events) = mpsc::unbounded_channel();
        let ws_url = self.ws_url.clone();
        let subscriptions = self.subscriptions.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.notified() => {
                        let request = json!({
                            "jsonrpc": "2.0",
                            "id": UNSUBSCRIBE_REQUEST_ID,
                            "method": "logsUnsubscribe",
                            "params": [confirmation]
                        });
                        if let Err(e) = sink.send(Message::Text(request.to_string())).await {
                            logger::debug(LogTag::Realtime, &format!("logsUnsubscribe send failed: {}", e));
                        }
                        let _ = sink.close().await;
                        break;
                    }
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                if let WsMessage::Notification(event) = parse_ws_message(&text) {
                                    logger::verbose(
                                        LogTag::Realtime,
                                        &format!("Notification {} at slot {}", short_signature(&event.signature), event.slot),
                                    );
                                    if sender.send(event).is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = sink.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                logger::warning(LogTag::Realtime, &format!("Websocket {} closed", ws_url));
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                logger::warning(LogTag::Realtime, &format!("Websocket {} error: {}", ws_url, e));
                                break;
                            }
                        }
                    }
                }
            }
            // Entry goes before the sender drops, so a closed stream is never still listed
            subscriptions.lock().remove(&id.0);
            drop(sender);
        });

        logger::info(
            LogTag::Realtime,
            &format!("Subscribed {} to {} (server id {})", id, address, confirmation),
        );

        Ok(ActivitySubscription { id, events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> MonitorResult<()> {
        match self.subscriptions.lock().remove(&id.0) {
            Some(cancel) => {
                cancel.notify_one();
                logger::debug(LogTag::Realtime, &format!("Unsubscribed {}", id));
            }
            None => {
                logger::debug(LogTag::Realtime, &format!("Unsubscribe of unknown {} ignored", id));
            }
        }
        Ok(())
    }

    async fn fetch_transaction(&self, signature: &str) -> MonitorResult<Option<FetchedTransaction>> {
        let result = self
            .post_json_rpc(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let transaction = serde_json::from_value(result).map_err(|e| {
            MonitorError::Rpc(format!(
                "Failed to parse transaction {}: {}",
                short_signature(signature),
                e
            ))
        })?;
        Ok(Some(transaction))
    }

    async fn list_signatures(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> MonitorResult<Vec<SignatureInfo>> {
        let pubkey = parse_pubkey(address)?;
        let before = before
            .map(|s| {
                Signature::from_str(s)
                    .map_err(|e| MonitorError::Rpc(format!("Invalid cursor signature {}: {}", s, e)))
            })
            .transpose()?;

        let client = self.client.clone();
        let endpoint = self.http_url.clone();
        let page = tokio::task::spawn_blocking(move || {
            client.get_signatures_for_address_with_config(
                &pubkey,
                GetConfirmedSignaturesForAddress2Config {
                    before,
                    until: None,
                    limit: Some(limit),
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
        })
        .await
        .map_err(|e| MonitorError::Task(e.to_string()))?
        .map_err(|e| MonitorError::connection(endpoint, e.to_string()))?;

        Ok(page
            .into_iter()
            .map(|entry| SignatureInfo {
                signature: entry.signature,
                slot: entry.slot,
                err: entry.err.map(|e| e.to_string()),
                block_time: entry.block_time,
            })
            .collect())
    }

    async fn health_check(&self) -> MonitorResult<Duration> {
        let client = self.client.clone();
        let started = Instant::now();
        tokio::task::spawn_blocking(move || client.get_latest_blockhash())
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))?
            .map_err(|e| self.connection_error(e.to_string()))?;
        Ok(started.elapsed())
    }
}
