//! Realtime driver: account logs subscription feeding the pipeline
//!
//! One consumer task per subscription reads its event stream. Fetch or
//! extraction failures, and a stream that ends while still subscribed, are
//! treated as connection errors and handed to the failover controller; a
//! successful switch re-subscribes the same address on the backup. The
//! primary's subscription stays open until `stop` cancels it there.

use super::failover::FailoverController;
use crate::errors::MonitorResult;
use crate::logger::{self, LogTag};
use crate::rpc::utils::short_signature;
use crate::rpc::{ActivityNotification, LedgerClient, SubscriptionId};
use crate::transactions::{IngestSource, TransactionPipeline};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Default)]
struct SubscriberState {
    current: Option<SubscriptionId>,
    consumers: Vec<JoinHandle<()>>,
    /// Subscriptions left on the connection we failed over from
    retired: Vec<(Arc<dyn LedgerClient>, SubscriptionId)>,
    stopped: bool,
}

pub struct RealtimeSubscriber {
    address: String,
    failover: Arc<FailoverController>,
    pipeline: TransactionPipeline,
    state: Mutex<SubscriberState>,
}

impl RealtimeSubscriber {
    pub fn new(address: &str, failover: Arc<FailoverController>, pipeline: TransactionPipeline) -> Self {
        Self {
            address: address.to_string(),
            failover,
            pipeline,
            state: Mutex::new(SubscriberState::default()),
        }
    }

    pub fn current_subscription(&self) -> Option<SubscriptionId> {
        self.state.lock().current
    }

    pub fn is_subscribed(&self) -> bool {
        let state = self.state.lock();
        !state.stopped && state.current.is_some()
    }

    /// Subscribe on the active connection and start a consumer for the stream.
    ///
    /// A subscribe failure triggers failover and one retry on the backup.
    pub fn subscribe(self: &Arc<Self>) -> BoxFuture<'static, MonitorResult<()>> {
        let this = self.clone();
        async move {
            loop {
                if this.state.lock().stopped {
                    return Ok(());
                }

                let client = this.failover.active();
                match client.subscribe_account_activity(&this.address).await {
                    Ok(subscription) => {
                        let id = subscription.id;
                        // stopped is checked where current is stored, so stop() either sees
                        // this subscription or this call sees stop()
                        let stopped = {
                            let mut state = this.state.lock();
                            if !state.stopped {
                                let consumer = tokio::spawn(this.clone().consume(subscription.events));
                                state.current = Some(id);
                                state.consumers.retain(|handle| !handle.is_finished());
                                state.consumers.push(consumer);
                            }
                            state.stopped
                        };
                        if stopped {
                            logger::debug(
                                LogTag::Realtime,
                                &format!("Stopped while subscribing, cancelling {}", id),
                            );
                            release(&client, id).await;
                            return Ok(());
                        }
                        logger::info(
                            LogTag::Realtime,
                            &format!(
                                "Realtime monitoring started for {} on {} ({})",
                                this.address,
                                client.endpoint(),
                                id
                            ),
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        logger::error(
                            LogTag::Realtime,
                            &format!("Failed to start realtime monitoring on {}: {}", client.endpoint(), e),
                        );
                        if this.fail_over().await {
                            continue;
                        }
                        return Err(e);
                    }
                }
            }
        }
        .boxed()
    }

    async fn consume(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<ActivityNotification>) {
        while let Some(event) = events.recv().await {
            if self.state.lock().stopped {
                break;
            }
            if event.has_error() {
                logger::debug(
                    LogTag::Realtime,
                    &format!("Ignoring failed transaction {}", short_signature(&event.signature)),
                );
                continue;
            }

            if let Err(e) = self.process_signature(&event.signature).await {
                logger::error(
                    LogTag::Realtime,
                    &format!("Realtime processing error for {}: {}", event.signature, e),
                );
                self.handle_connection_error().await;
            }
        }

        if !self.state.lock().stopped {
            logger::warning(LogTag::Realtime, "Subscription stream ended unexpectedly");
            self.handle_connection_error().await;
        }
    }

    async fn process_signature(&self, signature: &str) -> MonitorResult<()> {
        let client = self.failover.active();
        match client.fetch_transaction(signature).await? {
            Some(transaction) => {
                self.pipeline
                    .ingest_transaction(transaction, IngestSource::Realtime)
                    .await?;
            }
            None => {
                logger::debug(
                    LogTag::Realtime,
                    &format!("{} not available yet, skipping", short_signature(signature)),
                );
            }
        }
        Ok(())
    }

    /// Switch to the backup; true only for the call that switched.
    ///
    /// The failed subscription is handed to `switch_to_backup` as stale and is
    /// also kept on the primary's handle so `stop` can cancel it there.
    async fn fail_over(&self) -> bool {
        let stale = self.state.lock().current;
        if !self.failover.switch_to_backup(stale).await {
            return false;
        }
        let Some(id) = stale else {
            return true;
        };

        let primary = self.failover.primary().clone();
        let stopped = {
            let mut state = self.state.lock();
            if state.current == Some(id) {
                state.current = None;
            }
            if !state.stopped {
                state.retired.push((primary.clone(), id));
            }
            state.stopped
        };
        if stopped {
            release(&primary, id).await;
        }
        true
    }

    async fn handle_connection_error(self: &Arc<Self>) {
        if !self.fail_over().await {
            return;
        }
        if let Err(e) = self.subscribe().await {
            logger::error(
                LogTag::Failover,
                &format!("Failed to switch to backup: {}", e),
            );
        }
    }

    /// Cancel the current subscription on the active connection, release any
    /// left on the primary after a failover and abort consumers
    pub async fn stop(&self) {
        let (current, consumers, retired) = {
            let mut state = self.state.lock();
            state.stopped = true;
            (
                state.current.take(),
                std::mem::take(&mut state.consumers),
                std::mem::take(&mut state.retired),
            )
        };

        if let Some(id) = current {
            let client = self.failover.active();
            match client.unsubscribe(id).await {
                Ok(()) => logger::info(LogTag::Realtime, "Realtime monitoring stopped"),
                Err(e) => logger::warning(
                    LogTag::Realtime,
                    &format!("Failed to unsubscribe {}: {}", id, e),
                ),
            }
        }
        for (client, id) in retired {
            release(&client, id).await;
        }
        for consumer in consumers {
            consumer.abort();
        }
    }
}

async fn release(client: &Arc<dyn LedgerClient>, id: SubscriptionId) {
    if let Err(e) = client.unsubscribe(id).await {
        logger::warning(
            LogTag::Realtime,
            &format!("Failed to unsubscribe {} on {}: {}", id, client.endpoint(), e),
        );
    }
}
