/// Core logging implementation with automatic filtering
///
/// Checks whether a line should be shown for its level and tag, then hands it
/// to the format module.
use super::config::{
    get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag, LoggerConfig,
};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug requires `--debug-<tag>` (or debug-all)
/// 3. Verbose requires `--verbose` or `--verbose-<tag>`
/// 4. Warning/Info respect the minimum level
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    match level {
        LogLevel::Error => true,
        LogLevel::Debug => is_debug_enabled_for_tag(tag),
        LogLevel::Verbose => {
            get_logger_config().min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(tag)
        }
        LogLevel::Warning | LogLevel::Info => passes_threshold(&get_logger_config(), level),
    }
}

fn passes_threshold(config: &LoggerConfig, level: LogLevel) -> bool {
    level <= config.min_level
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    super::format::format_and_log(&tag, level.as_str(), message);
}
