//! Centralized path management for the landmark CLI
//!
//! Configuration lives under the platform config directory and the
//! persisted recognition cache under the platform cache directory.

use std::path::PathBuf;

/// Directory name used under every platform base directory
const APP_DIR: &str = "landmark";

const CONFIG_FILE: &str = "config.toml";

/// Returns the configuration directory
///
/// `XDG_CONFIG_HOME` wins when set, on every platform except Windows:
/// - `$XDG_CONFIG_HOME/landmark`
/// - `~/.config/landmark` (Linux)
/// - `~/Library/Application Support/landmark` (macOS)
/// - `%APPDATA%\landmark` (Windows)
pub fn get_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".landmark"))
}

/// Returns the path to `config.toml`
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE)
}

/// Returns the directory holding the persisted recognition cache
///
/// Falls back to `.landmark/cache` in the working directory when the
/// platform has no cache directory.
pub fn get_cache_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME")
        && !xdg_cache.is_empty()
    {
        return PathBuf::from(xdg_cache).join(APP_DIR);
    }

    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".landmark/cache"))
}

/// Full path of the cache snapshot file
pub fn get_cache_file() -> PathBuf {
    get_cache_dir().join(landmark_core::cache::CACHE_FILE_NAME)
}
