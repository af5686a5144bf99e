//! Configuration system
//!
//! - `macros`: the `config_struct!` definition helper
//! - `schemas`: every configuration section with its defaults
//! - `utils`: loading from disk and environment overrides
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, DatabaseConfig, HubConfig, LoggingConfig, ServerConfig};
pub use utils::{apply_env_overrides, load_config_from_path, CONFIG_FILE_PATH};
