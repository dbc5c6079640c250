//! Configuration System
//!
//! Layered configuration for the accounting subsystem: merge-policy defaults,
//! an optional global file, an optional explicit file, then environment
//! overrides (`JOBACCT_ACCOUNTING__BACKEND_TYPE=jobacct/log`). The facade
//! reads the backend type and plugin search path through [`ConfigSource`] on
//! every initialization attempt, so a corrected configuration takes effect
//! on the next call.

use crate::contract::plugin_type_for;
use crate::error::AcctError;
use crate::loader::rack::Discovery;
use crate::logging::LoggingConfig;
use crate::timers::SlowCallLimits;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Where the facade gets the backend type and plugin search path
pub trait ConfigSource: Send + Sync {
    /// Configured backend type, `None` when unset
    fn backend_type(&self) -> Option<String>;

    /// Colon-separated plugin search path
    fn plugin_search_path(&self) -> String;
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcctConfig {
    /// Accounting backend selection and tuning
    #[serde(default)]
    pub accounting: AccountingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Accounting backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Backend plugin type (`jobacct/log`) or short name (`log`)
    #[serde(default = "default_backend_type")]
    pub backend_type: String,

    /// Colon-separated plugin search path
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    /// How installed plugins are discovered
    #[serde(default)]
    pub discovery: Discovery,

    /// Accounting log handed to init-backend
    #[serde(default)]
    pub log_destination: Option<PathBuf>,

    /// Seconds between resource samples; 0 disables polling
    #[serde(default = "default_poll_frequency")]
    pub poll_frequency: u32,

    /// Calls slower than this are logged as warnings (microseconds)
    #[serde(default = "default_slow_call_limit_us")]
    pub slow_call_limit_us: u64,

    /// Calls slower than this are logged at debug level (microseconds)
    #[serde(default = "default_slow_call_debug_us")]
    pub slow_call_debug_us: u64,
}

fn default_backend_type() -> String {
    "jobacct/none".to_string()
}

fn default_plugin_dir() -> String {
    "/usr/local/lib/jobacct".to_string()
}

fn default_poll_frequency() -> u32 {
    30
}

fn default_slow_call_limit_us() -> u64 {
    3_000_000
}

fn default_slow_call_debug_us() -> u64 {
    1_000_000
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            plugin_dir: default_plugin_dir(),
            discovery: Discovery::default(),
            log_destination: None,
            poll_frequency: default_poll_frequency(),
            slow_call_limit_us: default_slow_call_limit_us(),
            slow_call_debug_us: default_slow_call_debug_us(),
        }
    }
}

impl AccountingConfig {
    /// Config selecting `backend_type` with every other setting defaulted
    pub fn for_backend(backend_type: &str) -> Self {
        Self {
            backend_type: backend_type.to_string(),
            ..Self::default()
        }
    }

    /// Slow-call thresholds for [`crate::timers`]
    pub fn slow_call_limits(&self) -> SlowCallLimits {
        SlowCallLimits::new(self.slow_call_limit_us, self.slow_call_debug_us)
    }

    /// Validate accounting settings
    pub fn validate(&self) -> Result<(), String> {
        if plugin_type_for(&self.backend_type).is_none() {
            return Err("backend_type cannot be empty".to_string());
        }
        if self.discovery == Discovery::Directory && self.plugin_dir.trim().is_empty() {
            return Err("plugin_dir cannot be empty with directory discovery".to_string());
        }
        if self.slow_call_debug_us > self.slow_call_limit_us {
            return Err(format!(
                "slow_call_debug_us ({}) exceeds slow_call_limit_us ({})",
                self.slow_call_debug_us, self.slow_call_limit_us
            ));
        }
        Ok(())
    }
}

impl ConfigSource for AccountingConfig {
    fn backend_type(&self) -> Option<String> {
        plugin_type_for(&self.backend_type)
    }

    fn plugin_search_path(&self) -> String {
        self.plugin_dir.clone()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Accounting(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Accounting(msg) => write!(f, "Accounting: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl AcctConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.accounting.validate() {
            errors.push(ValidationError::Accounting(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`AcctConfig`] from defaults, files and the environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from defaults, the global config file and the environment
    pub fn load() -> Result<AcctConfig, AcctError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load from defaults, one explicit file and the environment
    pub fn load_from_file(path: &Path) -> Result<AcctConfig, AcctError> {
        if !path.exists() {
            return Err(AcctError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }
}

/// Reloadable accounting configuration shared with the facade
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<AccountingConfig>>,
}

impl ConfigManager {
    pub fn new(config: AccountingConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Current configuration
    pub fn get(&self) -> AccountingConfig {
        self.config.read().clone()
    }

    /// Replace the configuration after validating it
    pub fn replace(&self, config: AccountingConfig) -> Result<(), AcctError> {
        config.validate().map_err(AcctError::Config)?;
        *self.config.write() = config;
        Ok(())
    }

    /// Apply an in-place update without validation
    pub fn update<F: FnOnce(&mut AccountingConfig)>(&self, f: F) {
        f(&mut self.config.write());
    }

    /// Reload from a config file
    pub fn reload(&self, path: &Path) -> Result<(), AcctError> {
        let loaded = ConfigLoader::load_from_file(path)?;
        loaded.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            AcctError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        self.replace(loaded.accounting)
    }
}

impl ConfigSource for ConfigManager {
    fn backend_type(&self) -> Option<String> {
        self.config.read().backend_type()
    }

    fn plugin_search_path(&self) -> String {
        self.config.read().plugin_search_path()
    }
}
