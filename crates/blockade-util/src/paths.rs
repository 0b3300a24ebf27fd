//! Default paths for blockade components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/blockade/config.toml` or `~/.config/blockade/config.toml`
//! - Data: `$XDG_DATA_HOME/blockade` or `~/.local/share/blockade`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const BLOCKADE_CONFIG_ENV: &str = "BLOCKADE_CONFIG";

/// Environment variable for overriding the data directory
pub const BLOCKADE_DATA_DIR_ENV: &str = "BLOCKADE_DATA_DIR";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "blockade.db";

/// Application subdirectory name
const APP_DIR: &str = "blockade";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$BLOCKADE_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/blockade/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/blockade/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(BLOCKADE_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking the BLOCKADE_CONFIG env var.
pub fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$BLOCKADE_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/blockade` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/blockade` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(BLOCKADE_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the BLOCKADE_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Path of the policy database inside a data directory
pub fn database_path(data_dir: impl Into<PathBuf>) -> PathBuf {
    data_dir.into().join(DATABASE_FILENAME)
}
