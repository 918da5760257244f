// Unit tests for session config validation

use crate::config::{SessionConfig, parse_ws_url};
use crate::error::config::ConfigError;

/// **VALUE**: Verifies that defaults are usable as-is.
///
/// **BUG THIS CATCHES**: Would catch a default URL that fails its own validation.
#[test]
fn given_default_config_when_validated_then_ok() {
    let config = SessionConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.version, 1);
    assert!(!config.log_frames);
}

/// **VALUE**: Verifies the scheme restriction.
///
/// **WHY THIS MATTERS**: An http URL would only fail later inside the transport, far from
/// the config that caused it.
///
/// **BUG THIS CATCHES**: Would catch any parseable URL being accepted.
#[test]
fn given_non_websocket_urls_when_parsed_then_rejected() {
    assert!(parse_ws_url("ws://127.0.0.1:8080/ws").is_ok());
    assert!(parse_ws_url("wss://peer.example.com/rpc").is_ok());

    assert!(parse_ws_url("").is_err());
    assert!(parse_ws_url("not a url").is_err());
    assert!(parse_ws_url("http://peer.example.com").is_err());
}

/// **VALUE**: Verifies that validation reports bad values as `ValidationError`.
#[test]
fn given_invalid_values_when_validated_then_validation_error() {
    // GIVEN: Configs with a bad version and a bad URL
    let bad_version = SessionConfig {
        version: 0,
        ..SessionConfig::default()
    };
    let bad_url = SessionConfig {
        url: "https://peer.example.com".to_string(),
        ..SessionConfig::default()
    };

    // WHEN / THEN: Both fail validation
    assert!(matches!(
        bad_version.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
    assert!(matches!(
        bad_url.validate(),
        Err(ConfigError::ValidationError { reason, .. }) if reason.contains("https")
    ));
}

/// **VALUE**: Verifies that missing fields fall back to defaults when parsing TOML.
///
/// **WHY THIS MATTERS**: Users write minimal config files. Only the URL should be needed.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` making every field mandatory.
#[test]
fn given_partial_toml_when_parsed_then_missing_fields_defaulted() {
    let config: SessionConfig = toml::from_str(r#"url = "wss://peer.example.com/rpc""#).unwrap();

    assert_eq!(config.url, "wss://peer.example.com/rpc");
    assert_eq!(config.version, 1);
    assert!(!config.log_frames);
}
