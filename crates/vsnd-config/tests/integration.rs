//! Integration tests for vsnd-config.
//!
//! These tests exercise loading and saving through the filesystem.

use vsnd_config::{BackendConfig, ConfigError};
use vsnd_core::{SampleFormat, StreamDirection};
use tempfile::TempDir;

#[test]
fn save_creates_parent_dirs_and_loads_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("vsnd.toml");

    let mut config = BackendConfig {
        device: "hw:2,0".to_string(),
        direction: StreamDirection::Capture,
        progress_interval_ms: 25,
        ..BackendConfig::default()
    };
    config.defaults.format = SampleFormat::F32Le;
    config.defaults.rate = 96000;

    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = BackendConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn load_missing_file_reports_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing.toml");

    let err = BackendConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("missing.toml"));
}

#[test]
fn load_rejects_invalid_contents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    let contents = "[defaults]\nbuffer_frames = 256\nperiod_frames = 512\n";
    std::fs::write(&path, contents).unwrap();

    let err = BackendConfig::load(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "defaults.period_frames",
            ..
        }
    ));
}

#[test]
fn load_rejects_malformed_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "device = [").unwrap();

    assert!(matches!(BackendConfig::load(&path), Err(ConfigError::TomlParse(_))));
}
