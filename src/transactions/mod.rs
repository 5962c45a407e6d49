//! Transaction processing pipeline
//!
//! - `extractor` - fetched ledger transaction to `TransactionRecord`
//! - `cache` - per-signature dedup gate with size and time eviction
//! - `queue` - priority queue drained in concurrent batches
//! - `pipeline` - glue used by both ingestion drivers

pub mod cache;
pub mod extractor;
pub mod pipeline;
pub mod queue;
pub mod types;

pub use cache::{DedupCache, TradingCallback};
pub use extractor::extract_transaction;
pub use pipeline::{RecordingHandler, TransactionPipeline};
pub use queue::{retry_priority, PriorityQueue, QueueEntry, TransactionHandler};
pub use types::{
    CacheStats, IngestSource, ProcessedRecord, TransactionKind, TransactionRecord,
};
