//! Tests for configuration loading.

use std::io::Write;

use tempfile::NamedTempFile;

use turnstack::{EloConfig, EngineConfig};

#[test]
fn test_empty_config_uses_defaults() {
    let config = EngineConfig::from_toml("").expect("Parse failed");
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.db_path(), "turnstack.db");
    assert_eq!(*config.busy_timeout_ms(), 5000);
    assert_eq!(*config.max_players(), 6);
    assert!(*config.notify());
    assert_eq!(*config.elo(), EloConfig::default());
}

#[test]
fn test_partial_config_overrides() {
    let config = EngineConfig::from_toml(
        r#"
        db_path = "/var/lib/turnstack/games.db"
        notify = false

        [elo]
        k_factor = 24.0
        "#,
    )
    .expect("Parse failed");
    assert_eq!(config.db_path(), "/var/lib/turnstack/games.db");
    assert!(!*config.notify());
    assert_eq!(*config.elo().k_factor(), 24.0);
    assert_eq!(*config.elo().starting_rating(), 1500.0);
}

#[test]
fn test_zero_max_players_rejected() {
    let err = EngineConfig::from_toml("max_players = 0").unwrap_err();
    assert!(err.message.contains("max_players"));
}

#[test]
fn test_malformed_config_rejected() {
    assert!(EngineConfig::from_toml("busy_timeout_ms = \"soon\"").is_err());
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "max_players = 4").expect("Write failed");
    let config = EngineConfig::from_file(file.path()).expect("Load failed");
    assert_eq!(*config.max_players(), 4);

    assert!(EngineConfig::from_file("/nonexistent/turnstack.toml").is_err());
}

#[test]
fn test_elo_config_builds_engine() {
    let engine = EloConfig::default().with_k_factor(10.0).engine();
    assert!((engine.delta(1500.0, 1500.0, 1.0) - 5.0).abs() < 1e-9);
}
