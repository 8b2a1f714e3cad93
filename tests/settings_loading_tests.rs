//! Settings Loading Tests
//!
//! Tests for:
//! - Loading docpipe.toml from a directory
//! - .env overrides through dotenvy
//! - Saving and reloading
//! - Building a client from loaded settings

use docpipe::settings::{CONFIG_FILE_NAME, ENV_IGNORE_UNDEFINED};
use docpipe::{ExplainMode, InMemoryExecutor, PipelineClient, Settings};
use parking_lot::{const_mutex, Mutex, MutexGuard};
use std::fs;
use tempfile::TempDir;

/// Serializes tests that read the process environment.
static ENV_LOCK: Mutex<()> = const_mutex(());

/// Holds the environment lock and clears variables a `.env` file may have set.
struct EnvGuard {
    _lock: MutexGuard<'static, ()>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        std::env::remove_var(ENV_IGNORE_UNDEFINED);
    }
}

fn env_guard() -> EnvGuard {
    EnvGuard {
        _lock: ENV_LOCK.lock(),
    }
}

fn write_config(dir: &TempDir, content: &str) {
    fs::write(dir.path().join(CONFIG_FILE_NAME), content).expect("write config");
}

#[test]
fn test_load_from_directory() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"
project_id = "library"
database_id = "catalog"
explain = "explain"
max_stages = 50
"#,
    );

    let settings = Settings::load(dir.path()).unwrap();
    assert_eq!(settings.project_id, "library");
    assert_eq!(settings.database_id, "catalog");
    assert_eq!(settings.explain, Some(ExplainMode::Explain));
    assert_eq!(settings.max_stages, 50);
    assert_eq!(
        settings.database().resource_name(),
        "projects/library/databases/catalog"
    );
}

#[test]
fn test_env_file_overrides_flag() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    write_config(&dir, "project_id = \"library\"\n");
    fs::write(
        dir.path().join(".env"),
        "DOCPIPE_IGNORE_UNDEFINED_PROPERTIES=true\n",
    )
    .unwrap();

    let settings = Settings::load(dir.path()).unwrap();
    assert!(settings.ignore_undefined_properties);
    assert!(settings.serializer_settings().ignore_undefined_properties);

    drop(_env);
    let _env = env_guard();
    assert!(std::env::var(ENV_IGNORE_UNDEFINED).is_err());
    let other = TempDir::new().unwrap();
    write_config(&other, "project_id = \"library\"\n");
    assert!(!Settings::load(other.path()).unwrap().ignore_undefined_properties);
}

#[test]
fn test_missing_config_file() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    let err = Settings::load(dir.path()).unwrap_err();
    assert!(err.to_string().contains("Configuration file not found"));
}

#[test]
fn test_malformed_config_file() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    write_config(&dir, "project_id = [");
    assert!(Settings::load(dir.path()).is_err());
}

#[test]
fn test_save_and_reload() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::new("library").with_database("catalog");
    settings.max_stages = 20;
    settings.save(dir.path()).unwrap();

    let reloaded = Settings::load(dir.path()).unwrap();
    assert_eq!(reloaded.max_stages, 20);
    assert_eq!(reloaded.database_id, "catalog");
}

#[test]
fn test_client_from_loaded_settings() {
    let _env = env_guard();
    let dir = TempDir::new().unwrap();
    write_config(&dir, "project_id = \"library\"\n");
    let settings = Settings::load(dir.path()).unwrap();

    let client = PipelineClient::new(InMemoryExecutor::new(), settings).unwrap();
    let pipeline = client.pipeline().collection("books").unwrap();
    assert_eq!(pipeline.database(), client.database());
}

#[test]
fn test_client_rejects_invalid_settings() {
    assert!(PipelineClient::new(InMemoryExecutor::new(), Settings::default()).is_err());
}
