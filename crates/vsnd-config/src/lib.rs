//! Configuration for the vsnd virtual PCM backend.
//!
//! A [`BackendConfig`] names the device to drive, the stream direction, the
//! progress reporting interval and the defaults used to pick concrete
//! stream parameters out of negotiated ranges.
//!
//! # Example
//!
//! ```rust,no_run
//! use vsnd_config::{BackendConfig, default_config_path};
//!
//! let config = match default_config_path() {
//!     path if path.is_file() => BackendConfig::load(&path).unwrap(),
//!     _ => BackendConfig::default(),
//! };
//! println!("device {} at {} Hz", config.device, config.defaults.rate);
//!
//! config.save(default_config_path()).unwrap();
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use config::{BackendConfig, DEFAULT_DEVICE, DEFAULT_PROGRESS_INTERVAL_MS};
pub use error::ConfigError;
pub use paths::{default_config_path, find_config, user_config_dir};
