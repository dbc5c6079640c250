//! Integration tests for the configuration system

use super::test_utils::with_config_env;
use jobacct::config::{global_config_path, ConfigLoader, ConfigManager, ConfigSource};
use jobacct::loader::rack::Discovery;
use jobacct::JobAcct;
use tempfile::TempDir;

#[test]
fn test_global_file_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("jobacct");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
[accounting]
backend_type = "log"
poll_frequency = 5
"#,
    )
    .unwrap();

    let config = with_config_env(&temp_dir, &[], || {
        assert_eq!(global_config_path(), Some(config_dir.join("config.toml")));
        ConfigLoader::load().unwrap()
    });
    assert_eq!(config.accounting.backend_type, "log");
    assert_eq!(config.accounting.poll_frequency, 5);
    assert_eq!(config.accounting.plugin_dir, "/usr/local/lib/jobacct");
}

#[test]
fn test_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("explicit.toml");
    std::fs::write(
        &config_file,
        r#"
[accounting]
backend_type = "none"
discovery = "directory"
"#,
    )
    .unwrap();

    let config = with_config_env(
        &temp_dir,
        &[
            ("JOBACCT_ACCOUNTING__BACKEND_TYPE", "jobacct/log"),
            ("JOBACCT_ACCOUNTING__POLL_FREQUENCY", "0"),
        ],
        || ConfigLoader::load_from_file(&config_file).unwrap(),
    );
    assert_eq!(config.accounting.backend_type, "jobacct/log");
    assert_eq!(config.accounting.poll_frequency, 0);
    assert_eq!(config.accounting.discovery, Discovery::Directory);
}

#[test]
fn test_defaults_without_any_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_config_env(&temp_dir, &[], || ConfigLoader::load().unwrap());
    assert_eq!(config.accounting.backend_type, "jobacct/none");
    assert_eq!(config.accounting.discovery, Discovery::Static);
    assert!(config.validate().is_ok());

    let acct = JobAcct::from_config(config.accounting);
    acct.alloc().unwrap();
    assert_eq!(acct.active_plugin_type().as_deref(), Some("jobacct/none"));
}

#[test]
fn test_invalid_reload_keeps_previous_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[accounting]
backend_type = "log"
slow_call_limit_us = 10
slow_call_debug_us = 20
"#,
    )
    .unwrap();

    let manager = ConfigManager::default();
    let result = with_config_env(&temp_dir, &[], || manager.reload(&config_file));
    assert!(result.is_err());
    assert_eq!(manager.backend_type(), Some("jobacct/none".to_string()));
}
