//! Integration tests for configuration resolution
//!
//! Covers:
//! - CLI path > environment variable > default location > compiled defaults
//! - Missing default config is not an error; a missing named file is
//! - Environment overrides for the access token and log level
//! - Write/read round trip of the config file
//!
//! Tests that touch LADDER_TRACKER_* variables are marked #[serial].

use ladder_common::config::{
    load_toml_config, resolve_config_path, write_toml_config, TomlConfig, ACCESS_TOKEN_ENV_VAR,
    CONFIG_ENV_VAR, LOG_LEVEL_ENV_VAR,
};
use ladder_common::{CategoryVocabulary, Error};
use serial_test::serial;
use std::env;
use std::path::Path;
use tempfile::TempDir;

/// Resolve then load, the way the binary does
fn load(cli: Option<&Path>) -> ladder_common::Result<TomlConfig> {
    TomlConfig::load(resolve_config_path(cli)?.as_deref())
}

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(ACCESS_TOKEN_ENV_VAR);
    env::remove_var(LOG_LEVEL_ENV_VAR);
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cli = write_file(&dir, "cli.toml", "[scan]\ninitial_limit = 3\n");
    let from_env = write_file(&dir, "env.toml", "[scan]\ninitial_limit = 7\n");
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let config = load(Some(&cli)).unwrap();
    assert_eq!(config.scan.initial_limit, 3);

    let config = load(None).unwrap();
    assert_eq!(config.scan.initial_limit, 7);

    clear_env();
}

#[test]
#[serial]
fn test_named_file_must_exist() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(matches!(
        resolve_config_path(Some(&missing)),
        Err(Error::Config(_))
    ));

    env::set_var(CONFIG_ENV_VAR, &missing);
    assert!(matches!(load(None), Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_token_and_level() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "config.toml",
        "[api]\naccess_token = \"from-file\"\n\n[logging]\nlevel = \"warn\"\n",
    );

    let config = load(Some(&path)).unwrap();
    assert_eq!(config.access_token(), Some("from-file"));
    assert_eq!(config.logging.level, "warn");

    env::set_var(ACCESS_TOKEN_ENV_VAR, "from-env");
    env::set_var(LOG_LEVEL_ENV_VAR, "debug");
    let config = load(Some(&path)).unwrap();
    assert_eq!(config.access_token(), Some("from-env"));
    assert_eq!(config.logging.level, "debug");

    // Blank values do not override
    env::set_var(ACCESS_TOKEN_ENV_VAR, "  ");
    let config = load(Some(&path)).unwrap();
    assert_eq!(config.access_token(), Some("from-file"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_values_rejected_on_load() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "[race]\nwindow_size = 0\n");

    assert!(matches!(load(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bad.toml", "[scan\npage_size = ");

    assert!(matches!(load_toml_config(&path), Err(Error::TomlParse(_))));
}

#[test]
fn test_write_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.scan.deep_depth_ceiling = Some(40_000);
    config.race.refresh_interval_secs = 30;
    config.vocabularies.push(CategoryVocabulary {
        name: "event".to_string(),
        league_match: vec!["Phrecia".to_string()],
        categories: vec!["Harbinger".to_string()],
    });

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_configured_vocabulary_selected_by_league_name() {
    let config: TomlConfig = toml::from_str(
        r#"
        [[vocabulary]]
        name = "event"
        league_match = ["phrecia"]
        categories = ["Harbinger", "Herald"]
        "#,
    )
    .unwrap();

    let vocabularies = config.all_vocabularies();
    let event = CategoryVocabulary::select(&vocabularies, "Phrecia Event (PL1)");
    assert_eq!(event.name, "event");

    let legacy = CategoryVocabulary::select(&vocabularies, "Necropolis");
    assert!(legacy.contains("Raider"));

    let current = CategoryVocabulary::select(&vocabularies, "Settlers of Kalguur");
    assert!(current.contains("Warden"));
}
