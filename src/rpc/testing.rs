//! Scripted in-memory ledger for tests
//!
//! Pages, transactions and failures are queued up front; every call is recorded
//! so tests can assert on cursors, fetch targets and subscription churn.

use super::types::{
    AccountKey, ActivityNotification, ActivitySubscription, FetchedTransaction, InstructionRef,
    SignatureInfo, SubscriptionId, TransactionEnvelope, TransactionMessage, TransactionMeta,
};
use super::LedgerClient;
use crate::errors::{MonitorError, MonitorResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    pages: VecDeque<MonitorResult<Vec<SignatureInfo>>>,
    transactions: HashMap<String, FetchedTransaction>,
    senders: HashMap<u64, mpsc::UnboundedSender<ActivityNotification>>,
    list_calls: Vec<Option<String>>,
    fetch_calls: Vec<String>,
    unsubscribe_calls: Vec<SubscriptionId>,
    subscribe_calls: usize,
    latency: Duration,
    subscribe_delay: Duration,
}

pub struct MockLedgerClient {
    name: String,
    state: Mutex<MockState>,
    next_id: AtomicU64,
    fail_fetches: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_health: AtomicBool,
}

impl MockLedgerClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(MockState {
                latency: Duration::from_millis(5),
                ..Default::default()
            }),
            next_id: AtomicU64::new(1),
            fail_fetches: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
        }
    }

    pub fn push_page(&self, signatures: &[&str]) {
        let page = signatures
            .iter()
            .enumerate()
            .map(|(i, s)| SignatureInfo {
                signature: s.to_string(),
                slot: 1_000 - i as u64,
                err: None,
                block_time: Some(1_700_000_000),
            })
            .collect();
        self.state.lock().pages.push_back(Ok(page));
    }

    pub fn push_page_error(&self, message: &str) {
        let error = MonitorError::connection(self.name.clone(), message);
        self.push_page_failure(error);
    }

    pub fn push_page_failure(&self, error: MonitorError) {
        self.state.lock().pages.push_back(Err(error));
    }

    pub fn add_transaction(&self, transaction: FetchedTransaction) {
        let signature = transaction.first_signature().unwrap_or_default().to_string();
        self.state.lock().transactions.insert(signature, transaction);
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_health_failure(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Hold every subscribe call this long before the stream goes live
    pub fn set_subscribe_delay(&self, delay: Duration) {
        self.state.lock().subscribe_delay = delay;
    }

    /// Push a notification to every live subscription; returns how many received it
    pub fn emit(&self, signature: &str, err: Option<Value>) -> usize {
        let state = self.state.lock();
        state
            .senders
            .values()
            .filter(|sender| {
                sender
                    .send(ActivityNotification {
                        signature: signature.to_string(),
                        slot: 1,
                        err: err.clone(),
                    })
                    .is_ok()
            })
            .count()
    }

    /// Drop every live stream as if the connection went away
    pub fn close_streams(&self) {
        self.state.lock().senders.clear();
    }

    pub fn live_subscriptions(&self) -> usize {
        self.state.lock().senders.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().subscribe_calls
    }

    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.state.lock().list_calls.clone()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.state.lock().fetch_calls.clone()
    }

    pub fn unsubscribe_calls(&self) -> Vec<SubscriptionId> {
        self.state.lock().unsubscribe_calls.clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn subscribe_account_activity(
        &self,
        _address: &str,
    ) -> MonitorResult<ActivitySubscription> {
        let delay = {
            let mut state = self.state.lock();
            state.subscribe_calls += 1;
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(MonitorError::connection(self.name.clone(), "subscribe refused"));
            }
            state.subscribe_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::unbounded_channel();
        self.state.lock().senders.insert(id, sender);
        Ok(ActivitySubscription { id: SubscriptionId(id), events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> MonitorResult<()> {
        let mut state = self.state.lock();
        state.unsubscribe_calls.push(id);
        state.senders.remove(&id.0);
        Ok(())
    }

    async fn fetch_transaction(&self, signature: &str) -> MonitorResult<Option<FetchedTransaction>> {
        let mut state = self.state.lock();
        state.fetch_calls.push(signature.to_string());
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(MonitorError::connection(self.name.clone(), "fetch failed"));
        }
        Ok(state.transactions.get(signature).cloned())
    }

    async fn list_signatures(
        &self,
        _address: &str,
        before: Option<&str>,
        _limit: usize,
    ) -> MonitorResult<Vec<SignatureInfo>> {
        let mut state = self.state.lock();
        state.list_calls.push(before.map(str::to_string));
        match state.pages.pop_front() {
            Some(page) => page,
            None => Ok(Vec::new()),
        }
    }

    async fn health_check(&self) -> MonitorResult<Duration> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(MonitorError::connection(self.name.clone(), "unreachable"));
        }
        Ok(self.state.lock().latency)
    }
}

/// System-program transfer from `from` to `to` where the sender's balance drops
/// from `pre` to `post` lamports
pub fn sample_transfer(signature: &str, from: &str, to: &str, pre: u64, post: u64) -> FetchedTransaction {
    FetchedTransaction {
        slot: 100,
        block_time: Some(1_700_000_000),
        transaction: TransactionEnvelope {
            signatures: vec![signature.to_string()],
            message: TransactionMessage {
                account_keys: vec![
                    AccountKey::Plain(from.to_string()),
                    AccountKey::Plain(to.to_string()),
                ],
                instructions: vec![InstructionRef {
                    program_id: Some(crate::constants::SYSTEM_PROGRAM_ID.to_string()),
                    program_id_index: None,
                }],
            },
        },
        meta: Some(TransactionMeta {
            err: None,
            fee: 5_000,
            pre_balances: vec![pre, 0],
            post_balances: vec![post, pre.saturating_sub(post)],
        }),
    }
}

/// Transfer of `sol` whole SOL between two fixed accounts
pub fn transfer_of(signature: &str, sol: u64) -> FetchedTransaction {
    let pre = 1_000 * crate::constants::LAMPORTS_PER_SOL;
    sample_transfer(
        signature,
        "Sender1111111111111111111111111111111111111",
        "Receiver111111111111111111111111111111111111",
        pre,
        pre - sol * crate::constants::LAMPORTS_PER_SOL,
    )
}
