//! Error types for the job accounting dispatch layer.

use crate::backend::BackendError;
use crate::contract::Operation;
use thiserror::Error;

/// Status code reported for every failure that does not come from a backend.
pub const STATUS_ERROR: i32 = -1;

/// Accounting dispatch errors
#[derive(Debug, Error)]
pub enum AcctError {
    #[error("No job accounting type configured")]
    NoType,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Can't find a plugin for type {plugin_type}")]
    NoMatch { plugin_type: String },

    #[error("Unable to create a plugin manager: {0}")]
    RackUnavailable(String),

    #[error(
        "Incomplete jobacct plugin {plugin_type} detected: only got {resolved} out of {required} \
         (missing: {})",
        .missing.join(", ")
    )]
    Unresolved {
        plugin_type: String,
        resolved: usize,
        required: usize,
        missing: Vec<String>,
    },

    #[error("Plugin {plugin_type} built against contract v{found}, expected v{expected}")]
    ContractMismatch {
        plugin_type: String,
        expected: u32,
        found: u32,
    },

    #[error("Backend operation {operation} failed: {source}")]
    Backend {
        operation: Operation,
        #[source]
        source: BackendError,
    },

    #[error("No job accounting context available for {operation}")]
    NoContext { operation: Operation },

    #[error("Job accounting initialization failed: {0}")]
    InitFailed(Box<AcctError>),

    #[error("Plugin {plugin_type} still active ({references} outstanding references)")]
    PluginsActive {
        plugin_type: String,
        references: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AcctError {
    /// Wrap a backend status for the given operation.
    pub fn backend(operation: Operation, source: BackendError) -> Self {
        AcctError::Backend { operation, source }
    }

    /// True for calls that needed an active backend and found none.
    pub fn is_no_context(&self) -> bool {
        matches!(self, AcctError::NoContext { .. })
    }

    /// True when a backend was found but did not satisfy the operation contract.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            AcctError::Unresolved { .. } | AcctError::ContractMismatch { .. }
        )
    }

    /// Integer status for callers that speak status codes.
    ///
    /// Backend codes pass through verbatim; everything else is `STATUS_ERROR`.
    pub fn status_code(&self) -> i32 {
        match self {
            AcctError::Backend { source, .. } => source.code(),
            _ => STATUS_ERROR,
        }
    }
}

impl From<config::ConfigError> for AcctError {
    fn from(err: config::ConfigError) -> Self {
        AcctError::Config(err.to_string())
    }
}
