//! Core logging implementation with automatic filtering
//!
//! Decides whether a line is printed, then hands it to the format module.
use super::config::with_logger_config;
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Anything more detailed than the minimum level is dropped
/// 3. Debug level additionally requires debug mode for that tag
/// 4. Verbose level requires the global verbose level
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    with_logger_config(|config| {
        if level > config.min_level {
            return false;
        }

        match level {
            LogLevel::Debug => {
                config.min_level == LogLevel::Verbose || config.debug_tags.contains(tag)
            }
            LogLevel::Verbose => config.min_level == LogLevel::Verbose,
            _ => true,
        }
    })
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level, message);
}
