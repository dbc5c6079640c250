//! Jobacct: pluggable job accounting dispatch
//!
//! Records job and step lifecycle accounting through one of several
//! interchangeable backends, chosen at runtime by configuration. The active
//! backend is found lazily, verified against a versioned operation contract,
//! and called through a single locked facade.

pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod facade;
pub mod job;
pub mod loader;
pub mod logging;
pub mod pack;
pub mod record;
pub mod timers;

pub use backend::{AccountingBackend, BackendError, BackendResult};
pub use config::{AccountingConfig, AcctConfig, ConfigLoader, ConfigManager, ConfigSource};
pub use contract::{Operation, CONTRACT_VERSION, MAJOR_TYPE, OPERATION_COUNT};
pub use error::AcctError;
pub use facade::{ContextState, JobAcct};
pub use job::{JobRecord, JobState, LocalJob, StepRecord};
pub use loader::{BackendRegistry, PluginLoader, PluginRack};
pub use pack::PackBuffer;
pub use record::{DataType, FieldValue, JobAcctInfo, TaskId};
