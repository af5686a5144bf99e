//! Configuration utilities - loading from disk and environment overrides
use super::schemas::Config;
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Load configuration from a specific file path
///
/// A missing file falls back to defaults. Environment overrides are applied
/// on top and the result is validated.
///
/// # Returns
/// - `Ok(Config)` - Configuration loaded and valid
/// - `Err(String)` - Error message if reading, parsing or validation failed
pub fn load_config_from_path(path: &str) -> Result<Config, String> {
    let mut config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

        toml::from_str::<Config>(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?
    } else {
        eprintln!("⚠️  Config file '{}' not found, using default values", path);
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    Ok(config)
}

/// Apply deployment environment variables on top of the file configuration
///
/// - `DATABASE_URL` → `database.url`
/// - `WEBSOCKET_TIMEOUT_IN_SECOND` → `hub.timeout_secs` (ignored if not a number)
/// - `ALLOWED_ORIGINS` → `server.allowed_origins` (comma separated)
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }

    if let Some(timeout) = lookup("WEBSOCKET_TIMEOUT_IN_SECOND") {
        if let Ok(secs) = timeout.trim().parse::<u64>() {
            config.hub.timeout_secs = secs;
        }
    }

    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.server.allowed_origins = origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
    }
}
