use wsrpc_core::SessionConfig;
use wsrpc_core::error::config::ConfigError;

use tempfile::TempDir;

/// **VALUE**: Verifies that a missing config file yields defaults.
///
/// **WHY THIS MATTERS**: First runs have no config file. Loading must not fail.
///
/// **BUG THIS CATCHES**: Would catch a missing file being reported as a read error.
#[test]
fn given_empty_dir_when_load_then_returns_defaults() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = SessionConfig::load(dir.path()).unwrap();

    // THEN: Defaults
    assert_eq!(config, SessionConfig::default());
}

/// **VALUE**: Verifies the save/load round trip through the file system.
///
/// **WHY THIS MATTERS**: Saved settings must come back exactly, and the temp file used
/// for the atomic write must not be left behind.
///
/// **BUG THIS CATCHES**: Would catch a failed rename or a field that is not serialized.
#[test]
fn given_saved_config_when_loaded_then_values_preserved() {
    // GIVEN: A non-default config saved into a nested directory
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("nested").join("wsrpc");
    let config = SessionConfig {
        url: "wss://peer.example.com/rpc".to_string(),
        log_frames: true,
        ..SessionConfig::default()
    };

    // WHEN: Saving and loading
    config.save(&config_dir).unwrap();
    let loaded = SessionConfig::load(&config_dir).unwrap();

    // THEN: Same values, no temp file
    assert_eq!(loaded, config);
    assert!(config_dir.join("wsrpc.toml").exists());
    assert!(!config_dir.join("wsrpc.toml.tmp").exists());
}

/// **VALUE**: Verifies that invalid files are rejected with the right error.
#[test]
fn given_invalid_files_when_load_then_parse_or_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wsrpc.toml");

    std::fs::write(&path, "url = [not toml").unwrap();
    assert!(matches!(
        SessionConfig::load(dir.path()),
        Err(ConfigError::ParseError { .. })
    ));

    std::fs::write(&path, r#"url = "http://peer.example.com""#).unwrap();
    assert!(matches!(
        SessionConfig::load(dir.path()),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies that an invalid config is never written.
#[test]
fn given_invalid_config_when_save_then_nothing_written() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig {
        version: 0,
        ..SessionConfig::default()
    };

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("wsrpc.toml").exists());
}
