//! Priority queue with a single batched drainer
//!
//! Entries are ordered by priority (highest first) and FIFO inside a priority.
//! Enqueueing into an idle queue spawns the drainer; it takes up to
//! `batch_limit` entries per cycle, runs the handler on all of them
//! concurrently and stops once the queue is empty.

use super::types::{IngestSource, TransactionRecord};
use crate::constants::{DRAIN_YIELD_MS, MAX_RETRY_AGE_SECS};
use crate::errors::{MonitorError, MonitorResult};
use crate::logger::{self, LogTag};
use crate::rpc::utils::short_signature;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Work performed for each dequeued record
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    async fn handle(&self, record: &TransactionRecord) -> MonitorResult<()>;

    /// Called for every failed attempt, before the retry decision
    fn failed(&self, _record: &TransactionRecord, _error: &MonitorError) {}
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub record: TransactionRecord,
    pub priority: i32,
    /// Time of the first enqueue, kept across retries
    pub enqueued_at: Instant,
    pub source: IngestSource,
}

/// Priority for the next attempt of a failed entry, `None` when it should be dropped
pub fn retry_priority(priority: i32, age: Duration, max_age: Duration) -> Option<i32> {
    let next = priority - 1;
    (age < max_age && next > 0).then_some(next)
}

#[derive(Default)]
struct QueueState {
    entries: BTreeMap<(Reverse<i32>, u64), QueueEntry>,
    next_seq: u64,
    draining: bool,
}

impl QueueState {
    fn push(&mut self, entry: QueueEntry) {
        let key = (Reverse(entry.priority), self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, entry);
    }
}

pub struct PriorityQueue {
    state: Mutex<QueueState>,
    handler: Arc<dyn TransactionHandler>,
    batch_limit: usize,
    max_retry_age: Duration,
    idle: Notify,
}

impl PriorityQueue {
    pub fn new(handler: Arc<dyn TransactionHandler>, batch_limit: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            handler,
            batch_limit: batch_limit.max(1),
            max_retry_age: Duration::from_secs(MAX_RETRY_AGE_SECS),
            idle: Notify::new(),
        }
    }

    /// Add a record and make sure a drainer is running; returns the queue length
    pub fn enqueue(
        self: &Arc<Self>,
        record: TransactionRecord,
        priority: i32,
        source: IngestSource,
    ) -> usize {
        let entry = QueueEntry {
            record,
            priority,
            enqueued_at: Instant::now(),
            source,
        };
        self.push_entry(entry)
    }

    fn push_entry(self: &Arc<Self>, entry: QueueEntry) -> usize {
        let signature = entry.record.signature.clone();
        let priority = entry.priority;

        let (len, start_drain) = {
            let mut state = self.state.lock();
            state.push(entry);
            let start = !state.draining;
            if start {
                state.draining = true;
            }
            (state.entries.len(), start)
        };

        logger::debug(
            LogTag::Queue,
            &format!(
                "Enqueued {} at priority {} (queue length {})",
                short_signature(&signature),
                priority,
                len
            ),
        );

        if start_drain {
            tokio::spawn(self.clone().drain());
        }
        len
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let batch: Vec<QueueEntry> = {
                let mut state = self.state.lock();
                if state.entries.is_empty() {
                    state.draining = false;
                    break;
                }
                let take = self.batch_limit.min(state.entries.len());
                (0..take)
                    .filter_map(|_| state.entries.pop_first().map(|(_, entry)| entry))
                    .collect()
            };

            let started = Instant::now();
            let results = join_all(batch.iter().map(|entry| self.handler.handle(&entry.record))).await;
            logger::verbose(
                LogTag::Queue,
                &format!("Drained batch of {} in {:?}", batch.len(), started.elapsed()),
            );

            for (entry, result) in batch.into_iter().zip(results) {
                let Err(e) = result else {
                    continue;
                };
                logger::error(
                    LogTag::Queue,
                    &format!(
                        "Failed to process {} ({}): {}",
                        entry.record.signature,
                        entry.source.as_str(),
                        e
                    ),
                );
                self.handler.failed(&entry.record, &e);
                match retry_priority(entry.priority, entry.enqueued_at.elapsed(), self.max_retry_age) {
                    Some(priority) => {
                        let mut state = self.state.lock();
                        state.push(QueueEntry { priority, ..entry });
                    }
                    None => {
                        logger::warning(
                            LogTag::Queue,
                            &format!(
                                "Dropped {} ({}) after final attempt",
                                entry.record.signature,
                                entry.source.as_str()
                            ),
                        );
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(DRAIN_YIELD_MS)).await;
        }

        self.idle.notify_waiters();
    }

    /// Resolve once the queue is empty and no drain cycle is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock();
                if !state.draining && state.entries.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    /// Pending `(signature, priority)` pairs in drain order
    pub fn snapshot(&self) -> Vec<(String, i32)> {
        self.state
            .lock()
            .entries
            .values()
            .map(|entry| (entry.record.signature.clone(), entry.priority))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::types::TransactionKind;
    use chrono::Utc;
    use once_cell::sync::OnceCell;
    use std::collections::HashMap;

    fn record(signature: &str) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_string(),
            timestamp: Utc::now(),
            sender: "from".to_string(),
            receiver: "to".to_string(),
            amount: 1.0,
            kind: TransactionKind::Transfer,
            raw: None,
        }
    }

    /// Records the order of calls; fails every signature starting with "bad"
    #[derive(Default)]
    struct ScriptedHandler {
        seen: Mutex<Vec<String>>,
        failures: Mutex<Vec<String>>,
    }

    impl ScriptedHandler {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }

        fn failures(&self) -> usize {
            self.failures.lock().len()
        }

        fn attempts(&self) -> HashMap<String, usize> {
            let mut counts = HashMap::new();
            for sig in self.seen() {
                *counts.entry(sig).or_insert(0) += 1;
            }
            counts
        }
    }

    #[async_trait]
    impl TransactionHandler for ScriptedHandler {
        async fn handle(&self, record: &TransactionRecord) -> MonitorResult<()> {
            self.seen.lock().push(record.signature.clone());
            if record.signature.starts_with("bad") {
                return Err(MonitorError::Handler("rejected".to_string()));
            }
            Ok(())
        }

        fn failed(&self, record: &TransactionRecord, _error: &MonitorError) {
            self.failures.lock().push(record.signature.clone());
        }
    }

    #[test]
    fn test_retry_priority_rules() {
        let max = Duration::from_secs(60);
        assert_eq!(retry_priority(3, Duration::from_secs(1), max), Some(2));
        assert_eq!(retry_priority(2, Duration::from_secs(59), max), Some(1));
        assert_eq!(retry_priority(1, Duration::from_secs(1), max), None);
        assert_eq!(retry_priority(5, Duration::from_secs(60), max), None);
        assert_eq!(retry_priority(0, Duration::ZERO, max), None);
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_fifo() {
        let handler = Arc::new(ScriptedHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 10));

        // nothing runs until this task yields, so the snapshot shows the full order
        queue.enqueue(record("first-1"), 1, IngestSource::Historical);
        queue.enqueue(record("two"), 2, IngestSource::Historical);
        queue.enqueue(record("second-1"), 1, IngestSource::Historical);

        assert_eq!(
            queue.snapshot(),
            vec![
                ("two".to_string(), 2),
                ("first-1".to_string(), 1),
                ("second-1".to_string(), 1)
            ]
        );
        queue.wait_idle().await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_follows_priority_order() {
        let handler = Arc::new(ScriptedHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 1));

        queue.enqueue(record("low"), 1, IngestSource::Historical);
        queue.enqueue(record("high"), 4, IngestSource::Realtime);
        queue.enqueue(record("mid"), 3, IngestSource::Realtime);
        queue.enqueue(record("mid-2"), 3, IngestSource::Realtime);

        queue.wait_idle().await;
        assert_eq!(handler.seen(), vec!["high", "mid", "mid-2", "low"]);
    }

    #[tokio::test]
    async fn test_failures_decay_until_dropped() {
        let handler = Arc::new(ScriptedHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 10));

        queue.enqueue(record("bad-realtime"), 3, IngestSource::Realtime);
        queue.enqueue(record("bad-historical"), 2, IngestSource::Historical);
        queue.enqueue(record("good"), 2, IngestSource::Historical);

        queue.wait_idle().await;
        let attempts = handler.attempts();
        assert_eq!(attempts["bad-realtime"], 3);
        assert_eq!(attempts["bad-historical"], 2);
        assert_eq!(attempts["good"], 1);
        assert_eq!(handler.failures(), 5);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_mid_cycle_enqueue_waits_for_next_batch() {
        /// Enqueues an urgent record while "a" is being handled
        #[derive(Default)]
        struct ReentrantHandler {
            queue: OnceCell<Arc<PriorityQueue>>,
            seen: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl TransactionHandler for ReentrantHandler {
            async fn handle(&self, incoming: &TransactionRecord) -> MonitorResult<()> {
                self.seen.lock().push(incoming.signature.clone());
                if incoming.signature == "a" {
                    if let Some(queue) = self.queue.get() {
                        queue.enqueue(record("urgent"), 9, IngestSource::Realtime);
                    }
                }
                Ok(())
            }
        }

        let handler = Arc::new(ReentrantHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 2));
        assert!(handler.queue.set(queue.clone()).is_ok());

        queue.enqueue(record("a"), 1, IngestSource::Historical);
        queue.enqueue(record("b"), 1, IngestSource::Historical);
        queue.wait_idle().await;

        // "b" was already in the running batch, so the higher priority record follows it
        assert_eq!(*handler.seen.lock(), vec!["a", "b", "urgent"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drainer_restarts_after_idle() {
        let handler = Arc::new(ScriptedHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 10));

        queue.enqueue(record("first"), 2, IngestSource::Realtime);
        queue.wait_idle().await;
        assert_eq!(handler.seen(), vec!["first"]);

        queue.enqueue(record("second"), 2, IngestSource::Realtime);
        tokio::time::timeout(Duration::from_secs(1), queue.wait_idle())
            .await
            .expect("second drain never finished");
        assert_eq!(handler.seen(), vec!["first", "second"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_batches_respect_limit() {
        struct SlowHandler {
            in_flight: Mutex<usize>,
            peak: Mutex<usize>,
        }

        #[async_trait]
        impl TransactionHandler for SlowHandler {
            async fn handle(&self, _record: &TransactionRecord) -> MonitorResult<()> {
                {
                    let mut in_flight = self.in_flight.lock();
                    *in_flight += 1;
                    let mut peak = self.peak.lock();
                    *peak = (*peak).max(*in_flight);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                *self.in_flight.lock() -= 1;
                Ok(())
            }
        }

        let handler = Arc::new(SlowHandler { in_flight: Mutex::new(0), peak: Mutex::new(0) });
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 3));
        for i in 0..10 {
            queue.enqueue(record(&format!("sig-{}", i)), 1, IngestSource::Historical);
        }
        queue.wait_idle().await;
        assert_eq!(*handler.peak.lock(), 3);
    }

    #[tokio::test]
    async fn test_clear_and_len() {
        let handler = Arc::new(ScriptedHandler::default());
        let queue = Arc::new(PriorityQueue::new(handler.clone(), 10));
        queue.enqueue(record("a"), 1, IngestSource::Historical);
        queue.enqueue(record("b"), 1, IngestSource::Historical);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.clear(), 2);
        queue.wait_idle().await;
        assert!(handler.seen().is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_on_fresh_queue_returns() {
        let queue = PriorityQueue::new(Arc::new(ScriptedHandler::default()), 10);
        tokio::time::timeout(Duration::from_secs(1), queue.wait_idle())
            .await
            .expect("idle queue should not block");
    }
}
