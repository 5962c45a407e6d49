//! Shared ingestion path: extract, admit through the dedup gate, enqueue

use super::cache::DedupCache;
use super::extractor::extract_transaction;
use super::queue::{PriorityQueue, TransactionHandler};
use super::types::{IngestSource, TransactionRecord};
use crate::constants::LARGE_TRANSFER_PRIORITY_BOOST;
use crate::errors::{MonitorError, MonitorResult};
use crate::logger::{self, LogTag};
use crate::rpc::utils::short_signature;
use crate::rpc::FetchedTransaction;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct TransactionPipeline {
    cache: Arc<DedupCache>,
    queue: Arc<PriorityQueue>,
}

impl TransactionPipeline {
    pub fn new(cache: Arc<DedupCache>, queue: Arc<PriorityQueue>) -> Self {
        Self { cache, queue }
    }

    /// Cache plus a queue drained by `RecordingHandler`
    pub fn with_recording_handler(
        max_cache_size: usize,
        flush_interval: Duration,
        min_trade_amount: f64,
        parallel_limit: usize,
    ) -> Self {
        let cache = Arc::new(DedupCache::new(max_cache_size, flush_interval, min_trade_amount));
        let handler = Arc::new(RecordingHandler::new(cache.clone()));
        let queue = Arc::new(PriorityQueue::new(handler, parallel_limit));
        Self::new(cache, queue)
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<PriorityQueue> {
        &self.queue
    }

    /// Queue priority for a record coming from `source`
    pub fn priority_for(&self, record: &TransactionRecord, source: IngestSource) -> i32 {
        let mut priority = source.base_priority();
        if self.cache.is_large(record) {
            priority += LARGE_TRANSFER_PRIORITY_BOOST;
        }
        priority
    }

    /// Admit and enqueue; false when the signature was already seen
    pub async fn ingest(&self, record: TransactionRecord, source: IngestSource) -> bool {
        if !self.cache.admit(&record).await {
            logger::debug(
                LogTag::Cache,
                &format!("Skipping duplicate {}", short_signature(&record.signature)),
            );
            return false;
        }
        let priority = self.priority_for(&record, source);
        self.queue.enqueue(record, priority, source);
        true
    }

    /// Extract a fetched transaction and ingest it
    pub async fn ingest_transaction(
        &self,
        transaction: FetchedTransaction,
        source: IngestSource,
    ) -> MonitorResult<bool> {
        let record = extract_transaction(transaction)?;
        Ok(self.ingest(record, source).await)
    }
}

/// Default handler: writes the transaction line and marks the cached entry
/// processed, or records the error on a failed attempt
pub struct RecordingHandler {
    cache: Arc<DedupCache>,
}

impl RecordingHandler {
    pub fn new(cache: Arc<DedupCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl TransactionHandler for RecordingHandler {
    async fn handle(&self, record: &TransactionRecord) -> MonitorResult<()> {
        logger::transaction(&record.signature, record.amount, record.kind.as_str());
        if !self.cache.mark_processed(&record.signature) {
            logger::verbose(
                LogTag::Cache,
                &format!(
                    "{} left the cache before processing finished",
                    short_signature(&record.signature)
                ),
            );
        }
        Ok(())
    }

    fn failed(&self, record: &TransactionRecord, error: &MonitorError) {
        self.cache.mark_failed(&record.signature, &error.to_string());
    }
}

#[cfg(test)]
pub(crate) fn test_pipeline() -> TransactionPipeline {
    TransactionPipeline::with_recording_handler(1_000, Duration::from_secs(60), 100.0, 10)
}
