//! Tests for configuration defaults, validation and precedence loading

use std::{fs, time::Duration};

use ollama_manager_config::{ConfigError, ManagerConfig, DEFAULT_HOST};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = ManagerConfig::default();
    assert_eq!(config.host, DEFAULT_HOST);
    assert_eq!(config.default_model, "llama3:latest");
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    assert_eq!(config.stream_idle_timeout(), Duration::from_secs(300));
    assert_eq!(config.max_retries, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_empty_host() {
    let mut config = ManagerConfig::default();
    config.host = String::new();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidHost { .. })
    ));
}

#[test]
fn test_validate_non_http_host() {
    let mut config = ManagerConfig::default();
    config.host = "ftp://localhost:11434".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidHost { .. })
    ));
}

#[test]
fn test_validate_zero_timeouts() {
    let mut config = ManagerConfig::default();
    config.timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = ManagerConfig::default();
    config.connect_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = ManagerConfig::default();
    config.stream_idle_timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_out_of_range_sampling_defaults() {
    let mut config = ManagerConfig::default();
    config.sampling.top_k = 10_000;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange { field: "top_k", .. })
    ));
}

#[test]
fn test_merge_from_file_overrides_only_present_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "ollama:\n  host: http://gpu-box:11434\n  sampling:\n    temperature: 0.2\n",
    )
    .unwrap();

    let mut config = ManagerConfig::default();
    config.merge_from_file(&path).unwrap();

    assert_eq!(config.host, "http://gpu-box:11434");
    assert_eq!(config.sampling.temperature, 0.2);
    // Fields missing from the nested sampling section fall back to defaults
    assert_eq!(config.sampling.top_k, 40);
    assert_eq!(config.timeout_secs, 30);
}

#[test]
fn test_merge_from_missing_file_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut config = ManagerConfig::default();
    config
        .merge_from_file(&dir.path().join("nope.yaml"))
        .unwrap();
    assert_eq!(config, ManagerConfig::default());
}

#[test]
fn test_merge_from_invalid_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "ollama: [not, a, map").unwrap();

    let mut config = ManagerConfig::default();
    assert!(matches!(
        config.merge_from_file(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_later_file_wins() {
    let dir = TempDir::new().unwrap();
    let global = dir.path().join("global.yaml");
    let project = dir.path().join("project.yaml");
    fs::write(&global, "ollama:\n  host: http://global:11434\n  timeout_secs: 10\n").unwrap();
    fs::write(&project, "ollama:\n  host: http://project:11434\n").unwrap();

    let mut config = ManagerConfig::default();
    config.merge_from_file(&global).unwrap();
    config.merge_from_file(&project).unwrap();

    assert_eq!(config.host, "http://project:11434");
    assert_eq!(config.timeout_secs, 10);
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.yaml");

    let mut config = ManagerConfig::default();
    config.host = "http://10.0.0.5:11434".to_string();
    config.system_prompt = "Answer in French.".to_string();
    config.save_to(&path).unwrap();

    let mut loaded = ManagerConfig::default();
    loaded.merge_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial_test::serial]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "ollama:\n  host: http://file:11434\n").unwrap();

    std::env::set_var("OLLAMA_HOST", "127.0.0.1:9999");
    std::env::set_var("OLM_TIMEOUT_SECS", "45");

    let mut config = ManagerConfig::default();
    config.merge_from_file(&path).unwrap();
    config.load_from_env();

    std::env::remove_var("OLLAMA_HOST");
    std::env::remove_var("OLM_TIMEOUT_SECS");

    assert_eq!(config.host, "http://127.0.0.1:9999");
    assert_eq!(config.timeout_secs, 45);
}

#[test]
#[serial_test::serial]
fn test_invalid_env_timeout_is_ignored() {
    std::env::set_var("OLM_TIMEOUT_SECS", "soon");
    let mut config = ManagerConfig::default();
    config.load_from_env();
    std::env::remove_var("OLM_TIMEOUT_SECS");

    assert_eq!(config.timeout_secs, 30);
}
