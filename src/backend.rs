//! Accounting backend capability interface
//!
//! A backend is one interchangeable accounting strategy. It provides every
//! operation of the contract in [`crate::contract`], declares which of them
//! it actually exports, and names the contract version it was built against.
//! The dispatch layer only ever talks to backends through this trait.

use crate::contract::{Operation, CONTRACT_VERSION};
use crate::job::{JobRecord, LocalJob, StepRecord};
use crate::pack::{PackBuffer, PackError};
use crate::record::{DataType, FieldValue};
use std::path::Path;
use thiserror::Error;

pub mod common;
pub mod log;
pub mod none;
pub mod poll;

pub use log::LogBackend;
pub use none::NoneBackend;

/// Generic failure status
pub const EGENERIC: i32 = 1;
/// I/O failure status
pub const EIO: i32 = 5;
/// Invalid argument status
pub const EINVAL: i32 = 22;

/// Status returned by a backend operation, carried verbatim to callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {code})")]
pub struct BackendError {
    code: i32,
    message: String,
}

impl BackendError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn invalid_field(field: DataType) -> Self {
        Self::new(EINVAL, format!("value does not match field {:?}", field))
    }

    pub fn io(err: std::io::Error) -> Self {
        Self::new(EIO, err.to_string())
    }
}

impl From<PackError> for BackendError {
    fn from(err: PackError) -> Self {
        BackendError::new(EINVAL, err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Operations every accounting backend provides
///
/// Method order follows the contract ordinals.
pub trait AccountingBackend: Send + Sync {
    /// Record type this backend allocates and interprets
    type Record: Send + 'static;

    /// Full plugin type, e.g. `jobacct/log`
    fn plugin_type(&self) -> &str;

    /// Human readable plugin name
    fn plugin_name(&self) -> &str;

    /// Contract version this backend implements
    fn contract_version(&self) -> u32 {
        CONTRACT_VERSION
    }

    /// Operations this backend exports. Binding fails unless all are present.
    fn exports(&self) -> Vec<Operation> {
        Operation::ALL.to_vec()
    }

    fn init_struct(&self, record: &mut Self::Record) -> BackendResult<()>;

    fn alloc(&self) -> BackendResult<Self::Record>;

    /// Take ownership of a record and release it
    fn free(&self, record: Self::Record) -> BackendResult<()>;

    fn set_info(
        &self,
        record: &mut Self::Record,
        field: DataType,
        value: FieldValue,
    ) -> BackendResult<()>;

    fn get_info(&self, record: &Self::Record, field: DataType) -> BackendResult<FieldValue>;

    /// Merge the values accumulated in `from` into `dest`
    fn aggregate(&self, dest: &mut Self::Record, from: &Self::Record);

    fn pack(&self, record: &Self::Record, buffer: &mut PackBuffer) -> BackendResult<()>;

    /// Read one record from `buffer`; the returned record belongs to the caller
    fn unpack(&self, buffer: &mut PackBuffer) -> BackendResult<Self::Record>;

    /// Prepare the backend; `log_destination` is where accounting output goes
    fn init(&self, log_destination: Option<&Path>) -> BackendResult<()>;

    fn fini(&self) -> BackendResult<()>;

    fn job_start(&self, job: &JobRecord) -> BackendResult<()>;

    fn job_complete(&self, job: &JobRecord) -> BackendResult<()>;

    fn step_start(&self, step: &StepRecord) -> BackendResult<()>;

    fn step_complete(&self, step: &StepRecord) -> BackendResult<()>;

    fn suspend(&self, job: &JobRecord) -> BackendResult<()>;

    /// Start the backend's sampling loop, `frequency` seconds between samples
    fn start_poll(&self, frequency: u32) -> BackendResult<()>;

    fn end_poll(&self, job: &LocalJob) -> BackendResult<()>;

    fn suspend_poll(&self);
}
