//! Signature dedup cache
//!
//! Every record passes `DedupCache::admit` exactly once per signature while cached.
//! Entries are kept in insertion order so the oldest one can be evicted in O(1)
//! when the cache is full; a periodic sweep drops entries idle longer than the
//! flush interval.

use super::types::{CacheStats, ProcessedRecord, TransactionRecord};
use crate::errors::MonitorResult;
use crate::logger::{self, LogTag};
use crate::rpc::utils::short_signature;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Downstream action fired once for every admitted transfer at or above the trade threshold
#[async_trait]
pub trait TradingCallback: Send + Sync {
    async fn on_large_transfer(&self, record: &ProcessedRecord) -> MonitorResult<()>;
}

// =============================================================================
// INSERTION-ORDERED ARENA
// =============================================================================

struct Slot {
    signature: String,
    value: ProcessedRecord,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Insertion-ordered map: `HashMap` index into a doubly linked slot arena
#[derive(Default)]
struct OrderedCache {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl OrderedCache {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn contains(&self, signature: &str) -> bool {
        self.index.contains_key(signature)
    }

    fn get(&self, signature: &str) -> Option<&ProcessedRecord> {
        let idx = *self.index.get(signature)?;
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    fn get_mut(&mut self, signature: &str) -> Option<&mut ProcessedRecord> {
        let idx = *self.index.get(signature)?;
        self.slots[idx].as_mut().map(|slot| &mut slot.value)
    }

    fn push_back(&mut self, signature: String, value: ProcessedRecord) {
        let slot = Slot {
            signature: signature.clone(),
            value,
            prev: self.tail,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.slots[tail].as_mut() {
                    prev.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.index.insert(signature, idx);
    }

    fn pop_front(&mut self) -> Option<(String, ProcessedRecord)> {
        let head = self.head?;
        self.take(head)
    }

    /// Keep only entries for which `keep` returns true; returns how many were dropped
    fn retain(&mut self, mut keep: impl FnMut(&ProcessedRecord) -> bool) -> usize {
        let mut removed = 0;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let (next, drop_it) = match self.slots[idx].as_ref() {
                Some(slot) => (slot.next, !keep(&slot.value)),
                None => break,
            };
            if drop_it {
                self.take(idx);
                removed += 1;
            }
            cursor = next;
        }
        removed
    }

    fn signatures(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].as_ref() {
                Some(slot) => {
                    out.push(slot.signature.clone());
                    cursor = slot.next;
                }
                None => break,
            }
        }
        out
    }

    fn values(&self) -> impl Iterator<Item = &ProcessedRecord> {
        self.slots.iter().flatten().map(|slot| &slot.value)
    }

    fn take(&mut self, idx: usize) -> Option<(String, ProcessedRecord)> {
        let slot = self.slots.get_mut(idx)?.take()?;

        match slot.prev {
            Some(prev) => {
                if let Some(p) = self.slots[prev].as_mut() {
                    p.next = slot.next;
                }
            }
            None => self.head = slot.next,
        }
        match slot.next {
            Some(next) => {
                if let Some(n) = self.slots[next].as_mut() {
                    n.prev = slot.prev;
                }
            }
            None => self.tail = slot.prev,
        }

        self.index.remove(&slot.signature);
        self.free.push(idx);
        Some((slot.signature, slot.value))
    }
}

// =============================================================================
// DEDUP CACHE SERVICE
// =============================================================================

pub struct DedupCache {
    entries: Mutex<OrderedCache>,
    /// Serializes admissions, held across the trading callback
    admission_gate: tokio::sync::Mutex<()>,
    callback: RwLock<Option<Arc<dyn TradingCallback>>>,
    max_size: usize,
    flush_interval: Duration,
    min_trade_amount: f64,
    admitted: AtomicU64,
    duplicates: AtomicU64,
    evicted: AtomicU64,
    swept: AtomicU64,
}

impl DedupCache {
    pub fn new(max_size: usize, flush_interval: Duration, min_trade_amount: f64) -> Self {
        Self {
            entries: Mutex::new(OrderedCache::default()),
            admission_gate: tokio::sync::Mutex::new(()),
            callback: RwLock::new(None),
            max_size: max_size.max(1),
            flush_interval,
            min_trade_amount,
            admitted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            swept: AtomicU64::new(0),
        }
    }

    pub fn set_trading_callback(&self, callback: Arc<dyn TradingCallback>) {
        *self.callback.write() = Some(callback);
    }

    pub fn is_large(&self, record: &TransactionRecord) -> bool {
        record.amount >= self.min_trade_amount
    }

    /// Admit a record. Returns true only the first time its signature is seen.
    ///
    /// Large transfers fire the trading callback before the next admission can
    /// proceed. Callback failures are logged and leave the admission in place.
    pub async fn admit(&self, record: &TransactionRecord) -> bool {
        let _gate = self.admission_gate.lock().await;

        let entry = {
            let mut entries = self.entries.lock();
            if entries.contains(&record.signature) {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            if entries.len() >= self.max_size {
                if let Some((oldest, _)) = entries.pop_front() {
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                    logger::verbose(
                        LogTag::Cache,
                        &format!("Evicted {} (cache full)", short_signature(&oldest)),
                    );
                }
            }
            let entry = ProcessedRecord::admitted(record.clone(), Utc::now());
            entries.push_back(record.signature.clone(), entry.clone());
            entry
        };
        self.admitted.fetch_add(1, Ordering::Relaxed);

        if self.is_large(record) {
            logger::info(
                LogTag::Cache,
                &format!(
                    "Large transfer detected: {} {:.4} SOL",
                    record.signature, record.amount
                ),
            );
            let callback = self.callback.read().clone();
            if let Some(callback) = callback {
                if let Err(e) = callback.on_large_transfer(&entry).await {
                    logger::error(
                        LogTag::Trader,
                        &format!("Trading callback failed for {}: {}", record.signature, e),
                    );
                }
            }
        }

        true
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.entries.lock().contains(signature)
    }

    pub fn get(&self, signature: &str) -> Option<ProcessedRecord> {
        self.entries.lock().get(signature).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached signatures, oldest first
    pub fn signatures(&self) -> Vec<String> {
        self.entries.lock().signatures()
    }

    /// Record a successful handler run; false when the entry is no longer cached
    pub fn mark_processed(&self, signature: &str) -> bool {
        self.record_attempt(signature, None)
    }

    /// Record a failed handler run
    pub fn mark_failed(&self, signature: &str, error: &str) -> bool {
        self.record_attempt(signature, Some(error.to_string()))
    }

    fn record_attempt(&self, signature: &str, error: Option<String>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(signature) {
            Some(entry) => {
                entry.processing_attempts += 1;
                entry.last_processed = Utc::now();
                entry.processed = error.is_none();
                entry.error = error;
                true
            }
            None => false,
        }
    }

    /// Drop every entry idle for longer than the flush interval as of `now`
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let max_age = self.flush_interval;
        let removed = self.entries.lock().retain(|entry| {
            now.signed_duration_since(entry.last_processed)
                .to_std()
                .map(|age| age <= max_age)
                .unwrap_or(true)
        });
        if removed > 0 {
            self.swept.fetch_add(removed as u64, Ordering::Relaxed);
            logger::debug(
                LogTag::Cache,
                &format!("Swept {} idle entries", removed),
            );
        }
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Sweep every flush interval until `shutdown` is notified
    pub async fn run_sweeper(self: Arc<Self>, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    logger::debug(LogTag::Cache, "Cache sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            cached: entries.len(),
            capacity: self.max_size,
            processed: entries.values().filter(|e| e.processed).count(),
            admitted: self.admitted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
        }
    }
}
