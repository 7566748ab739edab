//! Platform-specific configuration paths.
//!
//! - **User config**: `~/.config/vsnd/` (Linux), `~/Library/Application Support/vsnd/` (macOS), `%APPDATA%\vsnd\` (Windows)
//!
//! # Example
//!
//! ```rust,no_run
//! use vsnd_config::paths;
//!
//! if let Some(path) = paths::find_config("studio") {
//!     println!("Using {:?}", path);
//! }
//! ```

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "vsnd";

/// File name of the default configuration.
const CONFIG_FILE: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the configuration loaded when none is given.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Find a configuration file by path or name.
///
/// `name` is tried as a path first, then looked up in
/// [`user_config_dir`] with a `.toml` extension added if missing.
pub fn find_config(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{}.toml", name)
    };

    let user_path = user_config_dir().join(filename);
    user_path.is_file().then_some(user_path)
}
