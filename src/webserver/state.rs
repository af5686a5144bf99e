/// Shared application state for the webserver
///
/// Handed to every route handler; owns nothing global.
use std::sync::Arc;

use crate::config::Config;
use crate::webserver::auth::Authenticator;
use crate::webserver::ws::Hub;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Live-update hub
    pub hub: Arc<Hub>,

    /// Resolves the user behind an upgrade request
    pub auth: Arc<dyn Authenticator>,

    /// Server startup time
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<Hub>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            auth,
            startup_time: chrono::Utc::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.startup_time)
            .num_seconds()
            .max(0) as u64
    }
}
