/// Command-line arguments for the live-update server
///
/// Parsed once in `main`; everything else receives plain values.
use clap::Parser;

use crate::config::CONFIG_FILE_PATH;
use crate::logger::LoggerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "pass-secure-live")]
#[command(about = "Live-update WebSocket hub for the pass-secure API", long_about = None)]
pub struct Arguments {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = CONFIG_FILE_PATH)]
    pub config: String,

    /// Show every log line, debug and verbose included
    #[arg(short, long)]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output for a subsystem (hub, connection, registry,
    /// dispatcher, listener, webserver, config, system or all)
    #[arg(long = "debug", value_name = "TAG")]
    pub debug: Vec<String>,

    /// Append logs to this file (overrides logging.file)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<String>,
}

impl Arguments {
    /// Logger settings from the flags; `config_file` is the configured log
    /// file, used when `--log-file` is absent
    pub fn logger_config(&self, config_file: &str) -> LoggerConfig {
        let mut logger = LoggerConfig::from_flags(self.verbose, self.quiet, &self.debug);
        let file = self.log_file.as_deref().unwrap_or(config_file);
        if !file.is_empty() {
            logger.file_path = Some(file.into());
        }
        logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, LogTag};

    #[test]
    fn test_defaults() {
        let args = Arguments::parse_from(["pass-secure-live"]);
        assert_eq!(args.config, CONFIG_FILE_PATH);
        assert!(args.debug.is_empty());

        let logger = args.logger_config("");
        assert!(logger.file_path.is_none());
    }

    #[test]
    fn test_debug_tags_and_log_file() {
        let args = Arguments::parse_from([
            "pass-secure-live",
            "--debug",
            "hub",
            "--debug",
            "listener",
            "--log-file",
            "/tmp/live.log",
        ]);

        let logger = args.logger_config("data/ignored.log");
        assert!(logger.debug_tags.contains(&LogTag::Hub));
        assert!(logger.debug_tags.contains(&LogTag::Listener));
        assert!(!logger.debug_tags.contains(&LogTag::Registry));
        assert_eq!(logger.file_path.as_deref(), Some(std::path::Path::new("/tmp/live.log")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Arguments::try_parse_from(["pass-secure-live", "-v", "-q"]).is_err());

        let args = Arguments::parse_from(["pass-secure-live", "--quiet"]);
        assert_eq!(args.logger_config("").min_level, LogLevel::Error);
    }
}
