//! Logger configuration shared by every log call

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;

/// Runtime logger settings
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Most detailed level that is still printed
    pub min_level: LogLevel,

    /// Tags with debug output enabled
    pub debug_tags: HashSet<LogTag>,

    /// Append log lines to this file as well as the console
    pub file_path: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            file_path: None,
        }
    }
}

impl LoggerConfig {
    /// Build from command-line style switches
    ///
    /// `debug_keys` are tag keys (`hub`, `connection`, ...) or `all`.
    /// Unknown keys are ignored.
    pub fn from_flags(verbose: bool, quiet: bool, debug_keys: &[String]) -> Self {
        let mut debug_tags = HashSet::new();
        for key in debug_keys {
            if key.eq_ignore_ascii_case("all") {
                debug_tags.extend(LogTag::ALL.iter().copied());
            } else if let Some(tag) = LogTag::from_debug_key(key) {
                debug_tags.insert(tag);
            }
        }

        let min_level = if verbose {
            LogLevel::Verbose
        } else if !debug_tags.is_empty() {
            LogLevel::Debug
        } else if quiet {
            LogLevel::Error
        } else {
            LogLevel::Info
        };

        Self {
            min_level,
            debug_tags,
            file_path: None,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Replace the active logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Get a copy of the active logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub(super) fn with_logger_config<R>(f: impl FnOnce(&LoggerConfig) -> R) -> R {
    f(&LOGGER_CONFIG.read())
}
