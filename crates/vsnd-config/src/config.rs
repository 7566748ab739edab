//! Backend configuration file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vsnd_core::{StreamDefaults, StreamDirection};

use crate::ConfigError;

/// Default ALSA device name.
pub const DEFAULT_DEVICE: &str = "default";

/// Default progress reporting interval in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 50;

/// Settings for one virtual PCM stream.
///
/// Every field is optional in TOML; missing fields take their defaults.
///
/// ```toml
/// device = "hw:0,0"
/// direction = "capture"
/// progress_interval_ms = 20
///
/// [defaults]
/// rate = 44100
/// format = "S24_LE"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Device name handed to the backend (`default`, `hw:0,0`, ...).
    pub device: String,

    /// Whether the stream plays or captures.
    pub direction: StreamDirection,

    /// How often progress is reported while running.
    pub progress_interval_ms: u64,

    /// Values picked when a negotiated range leaves a choice.
    pub defaults: StreamDefaults,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            direction: StreamDirection::Playback,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            defaults: StreamDefaults::default(),
        }
    }
}

impl BackendConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), device = %config.device, "loaded backend config");
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: BackendConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that every value is usable by the backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::invalid("progress_interval_ms", "must be at least 1"));
        }

        let d = &self.defaults;
        let nonzero = [
            ("defaults.rate", d.rate),
            ("defaults.channels", d.channels),
            ("defaults.buffer_frames", d.buffer_frames),
            ("defaults.period_frames", d.period_frames),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if d.period_frames > d.buffer_frames {
            return Err(ConfigError::invalid(
                "defaults.period_frames",
                format!(
                    "period of {} frames exceeds buffer of {} frames",
                    d.period_frames, d.buffer_frames
                ),
            ));
        }
        Ok(())
    }

    /// Progress interval as a [`Duration`].
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsnd_core::SampleFormat;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BackendConfig::from_toml("").unwrap();
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.progress_interval(), Duration::from_millis(50));
        assert_eq!(config.defaults.format, SampleFormat::S16Le);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let toml = r#"
            device = "hw:1,0"
            direction = "capture"

            [defaults]
            rate = 44100
            format = "S24_LE"
        "#;
        let config = BackendConfig::from_toml(toml).unwrap();
        assert_eq!(config.device, "hw:1,0");
        assert_eq!(config.direction, StreamDirection::Capture);
        assert_eq!(config.defaults.rate, 44100);
        assert_eq!(config.defaults.format, SampleFormat::S24Le);
        assert_eq!(config.defaults.channels, 2);
        assert_eq!(config.progress_interval_ms, DEFAULT_PROGRESS_INTERVAL_MS);
    }

    #[test]
    fn to_toml_is_readable_back() {
        let config = BackendConfig {
            device: "plughw:0".into(),
            progress_interval_ms: 10,
            ..BackendConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("device = \"plughw:0\""), "got: {text}");
        assert!(text.contains("format = \"S16_LE\""), "got: {text}");
        assert_eq!(BackendConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let cases = [
            ("device = \"  \"", "device"),
            ("progress_interval_ms = 0", "progress_interval_ms"),
            ("[defaults]\nchannels = 0", "defaults.channels"),
            ("[defaults]\nrate = 0", "defaults.rate"),
            (
                "[defaults]\nbuffer_frames = 1024\nperiod_frames = 2048",
                "defaults.period_frames",
            ),
        ];
        for (toml, expected) in cases {
            match BackendConfig::from_toml(toml) {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{toml}"),
                other => panic!("{toml}: expected Invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_format_is_a_parse_error() {
        let err = BackendConfig::from_toml("[defaults]\nformat = \"S20\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
