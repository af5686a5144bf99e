//! Configuration schemas - all config structures defined once with defaults
use crate::config_struct;
use std::time::Duration;

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// HTTP server hosting the live-update endpoint
    pub struct ServerConfig {
        host: String = "127.0.0.1".to_string(),
        port: u16 = 3000,

        /// Origins allowed to open the socket (empty = any)
        allowed_origins: Vec<String> = Vec::new(),

        /// Header carrying the authenticated user id, set by the auth gateway
        user_id_header: String = "x-user-id".to_string(),
    }
}

// ============================================================================
// HUB CONFIGURATION
// ============================================================================

config_struct! {
    /// Connection hub tuning
    pub struct HubConfig {
        /// Read deadline; pings go out every 9/10 of it
        timeout_secs: u64 = 30,

        /// Upper bound for a single frame write
        write_timeout_secs: u64 = 3,

        /// How long a closing connection waits for the peer's close frame
        close_grace_secs: u64 = 5,

        /// Writer tasks draining the write queue
        write_workers: usize = 5,

        /// Pending writes before new ones are dropped
        write_queue_capacity: usize = 256,

        /// Raw change events buffered between listener and decoder
        relay_capacity: usize = 64,

        /// Largest inbound client message in bytes
        max_read_size: usize = 512,

        /// Database notification channel
        topic: String = "websocket_events".to_string(),
    }
}

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

config_struct! {
    /// Change-feed database
    pub struct DatabaseConfig {
        /// Postgres connection URL; empty disables the database feed
        url: String = String::new(),
    }
}

// ============================================================================
// LOGGING CONFIGURATION
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        /// Log file path; empty keeps console-only logging
        file: String = String::new(),
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        server: ServerConfig = ServerConfig::default(),
        hub: HubConfig = HubConfig::default(),
        database: DatabaseConfig = DatabaseConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

impl ServerConfig {
    /// Get the full bind address (host:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl HubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_secs)
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }
        if self.server.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.server.user_id_header.is_empty() {
            return Err("user_id_header cannot be empty".to_string());
        }

        let hub = &self.hub;
        if hub.timeout_secs == 0 {
            return Err("hub.timeout_secs must be > 0".to_string());
        }
        if hub.write_timeout_secs == 0 {
            return Err("hub.write_timeout_secs must be > 0".to_string());
        }
        if hub.write_workers == 0 {
            return Err("hub.write_workers must be > 0".to_string());
        }
        if hub.write_queue_capacity == 0 {
            return Err("hub.write_queue_capacity must be > 0".to_string());
        }
        if hub.relay_capacity == 0 {
            return Err("hub.relay_capacity must be > 0".to_string());
        }
        if hub.max_read_size == 0 {
            return Err("hub.max_read_size must be > 0".to_string());
        }
        // Interpolated into LISTEN, so keep it a plain identifier
        if hub.topic.is_empty()
            || !hub
                .topic
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "hub.topic '{}' must be a non-empty identifier ([A-Za-z0-9_])",
                hub.topic
            ));
        }

        Ok(())
    }
}
