//! Structured, tagged logging
//!
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control via `--debug-<tag>` flags, `--debug-all` or `DEBUG=true` in configs
//! - Colored console output plus an append-only file sink
//!
//! ```rust,ignore
//! use solana_monitor::logger::{self, LogTag};
//!
//! logger::info(LogTag::Monitor, "Monitor started");
//! logger::debug(LogTag::Cache, "Evicted ..."); // only with --debug-cache
//! ```
//!
//! Call `logger::init(cli.logger_config())` once at startup and `logger::flush()` before exit.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, update_logger_config, LoggerConfig};
pub use file::init_file_logging_at;
pub use levels::LogLevel;
pub use tags::LogTag;

/// Install `config` (see `arguments::Cli::logger_config`) and open the default log file
pub fn init(config: LoggerConfig) {
    set_logger_config(config);
    file::init_file_logging();
}

/// Always shown
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Shown unless `--quiet`
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Only shown with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Only shown with `--verbose` or `--verbose-<tag>`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// One processed transaction: `signature | amount SOL | kind`, at info level
pub fn transaction(signature: &str, amount: f64, kind: &str) {
    if !core::should_log(&LogTag::Transactions, LogLevel::Info) {
        return;
    }
    format::format_and_log(
        &LogTag::Transactions,
        "TX",
        &format::format_transaction_line(signature, amount, kind),
    );
}

/// Flush pending file writes; call during shutdown
pub fn flush() {
    file::flush_file_logging();
}
