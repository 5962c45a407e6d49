/// Global constants used across the monitor
///
/// This module contains system-wide constants that are not configurable
/// and are used across multiple modules.

// ============================================================================
// SOLANA BLOCKCHAIN CONSTANTS
// ============================================================================

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Native system program (plain SOL transfers)
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// Token swap program
pub const SWAP_PROGRAM_ID: &str = "SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8";

/// Native stake program
pub const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";

// ============================================================================
// PIPELINE CONSTANTS
// ============================================================================

/// Failed queue entries older than this are dropped instead of requeued
pub const MAX_RETRY_AGE_SECS: u64 = 60;

/// Pause between drain cycles so producers get scheduled
pub const DRAIN_YIELD_MS: u64 = 10;

/// Ceiling for every exponential backoff delay
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Endpoints answering slower than this are reported unhealthy
pub const HEALTHY_LATENCY_MS: u64 = 1_000;

/// Base queue priority for records seen through the live subscription
pub const REALTIME_PRIORITY: i32 = 3;

/// Base queue priority for records found by the backfill
pub const HISTORICAL_PRIORITY: i32 = 2;

/// Extra priority for transfers at or above the trade threshold
pub const LARGE_TRANSFER_PRIORITY_BOOST: i32 = 1;

/// Timeout for the websocket subscription handshake
pub const SUBSCRIBE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// CONFIGURATION DEFAULTS
// ============================================================================

pub const DEFAULT_BATCH_SIZE: usize = 30;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 5_000;
pub const DEFAULT_PARALLEL_LIMIT: usize = 10;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_HISTORY_DELAY_MS: u64 = 200;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MIN_TRADE_AMOUNT: f64 = 100.0;

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "configs.json";

/// Log file written next to console output
pub const DEFAULT_LOG_PATH: &str = "logs/monitor.log";
