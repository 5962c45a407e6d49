//! Solana account monitor
//!
//! Watches every native-token transfer touching a single account and turns the raw
//! ledger activity into a deduplicated, priority-ordered stream of processed records.
//!
//! Two ingestion drivers feed one pipeline:
//! - `monitor::realtime` - logs subscription over websocket (push)
//! - `monitor::historical` - backward paginated backfill (pull)
//!
//! Both converge on `transactions::TransactionPipeline`:
//! extractor -> dedup cache (admission gate) -> priority queue -> batched handler.

pub mod arguments;
pub mod configs;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod monitor;
pub mod rpc;
pub mod transactions;

pub use configs::Configs;
pub use errors::{ExtractionError, MonitorError, MonitorResult};
pub use monitor::{Monitor, MonitorMode};
pub use rpc::{LedgerClient, RpcLedgerClient};
pub use transactions::{
    DedupCache, PriorityQueue, ProcessedRecord, TradingCallback, TransactionKind,
    TransactionRecord,
};
