//! Structured logging for the live-update server
//!
//! Small tag-based logging API:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control (`--debug hub`, `--debug connection`, ...)
//! - Colored console output plus optional file persistence
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pass_secure_live::logger::{self, LogTag};
//!
//! logger::error(LogTag::Listener, "Subscription lost");
//! logger::warning(LogTag::Dispatcher, "Write queue full");
//! logger::info(LogTag::Hub, "Hub running");
//! logger::debug(LogTag::Connection, "Ping sent"); // Only with --debug connection
//! logger::verbose(LogTag::Registry, "Fan-out details"); // Only with --verbose
//! ```
//!
//! ## Initialization
//!
//! Call [`init`] once at startup with a [`LoggerConfig`] built from the
//! command line. Without it, Info and above are printed to the console.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Installs the configuration and opens the log file if one is configured.
/// A log file that cannot be opened is reported on stderr and console
/// logging continues.
pub fn init(config: LoggerConfig) {
    let file_path = config.file_path.clone();
    set_logger_config(config);

    if let Some(path) = file_path {
        if let Err(e) = file::init_file_logging(&path) {
            eprintln!("⚠️  {}", e);
        }
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless --quiet)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when debug output is enabled for the tag:
///
/// ```rust,no_run
/// # use pass_secure_live::logger::{self, LogTag};
/// // Only shown with --debug dispatcher
/// logger::debug(LogTag::Dispatcher, "worker 3 picked up a write");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Check whether a debug line for `tag` would be printed
///
/// Lets callers skip building expensive messages.
pub fn is_debug_enabled(tag: LogTag) -> bool {
    core::should_log(&tag, LogLevel::Debug)
}

/// Force flush all pending log writes
///
/// Call this during shutdown to ensure all logs are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
