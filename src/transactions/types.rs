// =============================================================================
// CORE DATA STRUCTURES
// =============================================================================

use crate::constants::{
    HISTORICAL_PRIORITY, REALTIME_PRIORITY, STAKE_PROGRAM_ID, SWAP_PROGRAM_ID, SYSTEM_PROGRAM_ID,
};
use crate::rpc::FetchedTransaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Classification derived from the first instruction's program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Swap,
    Stake,
    Other,
    #[default]
    Unknown,
}

impl TransactionKind {
    pub fn from_program_id(program_id: &str) -> Self {
        match program_id {
            SYSTEM_PROGRAM_ID => TransactionKind::Transfer,
            SWAP_PROGRAM_ID => TransactionKind::Swap,
            STAKE_PROGRAM_ID => TransactionKind::Stake,
            _ => TransactionKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Swap => "swap",
            TransactionKind::Stake => "stake",
            TransactionKind::Other => "other",
            TransactionKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized view of one transaction touching the monitored account
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub receiver: String,
    /// Absolute balance change of the first account, in SOL
    pub amount: f64,
    pub kind: TransactionKind,
    #[serde(skip)]
    pub raw: Option<Arc<FetchedTransaction>>,
}

/// Cache entry: the record plus its processing state
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRecord {
    pub record: TransactionRecord,
    pub processed: bool,
    pub processing_attempts: u32,
    pub last_processed: DateTime<Utc>,
    pub error: Option<String>,
}

impl ProcessedRecord {
    /// Freshly admitted entry, stamped with the admission time
    pub fn admitted(record: TransactionRecord, now: DateTime<Utc>) -> Self {
        Self {
            record,
            processed: false,
            processing_attempts: 0,
            last_processed: now,
            error: None,
        }
    }
}

/// Which driver produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Realtime,
    Historical,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestSource::Realtime => "realtime",
            IngestSource::Historical => "historical",
        }
    }

    pub fn base_priority(&self) -> i32 {
        match self {
            IngestSource::Realtime => REALTIME_PRIORITY,
            IngestSource::Historical => HISTORICAL_PRIORITY,
        }
    }
}

/// Counters reported by the dedup cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached: usize,
    pub capacity: usize,
    pub processed: usize,
    pub admitted: u64,
    pub duplicates: u64,
    pub evicted: u64,
    pub swept: u64,
}
