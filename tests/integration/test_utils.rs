//! Shared test utilities for integration tests
//!
//! Provides a configurable test backend and environment isolation for tests
//! that read configuration from files and `JOBACCT_*` variables.

use jobacct::backend::{common, AccountingBackend, BackendError, BackendResult, EIO};
use jobacct::config::{AccountingConfig, ConfigManager};
use jobacct::contract::Operation;
use jobacct::job::{JobRecord, LocalJob, StepRecord};
use jobacct::loader::BackendRegistry;
use jobacct::pack::PackBuffer;
use jobacct::record::{DataType, FieldValue, JobAcctInfo};
use jobacct::JobAcct;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TEST_PLUGIN_TYPE: &str = "jobacct/test";

/// Operations a [`TestBackend`] has been asked to perform
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Operation>>,
}

impl CallLog {
    pub fn record(&self, op: Operation) {
        self.calls.lock().unwrap().push(op);
    }

    pub fn count(&self, op: Operation) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Backend whose exports, finalize result and contract version are configurable
pub struct TestBackend {
    pub missing: Vec<Operation>,
    pub fail_fini: bool,
    pub version: u32,
    pub calls: Arc<CallLog>,
}

impl TestBackend {
    pub fn new(calls: Arc<CallLog>) -> Self {
        Self {
            missing: Vec::new(),
            fail_fini: false,
            version: jobacct::CONTRACT_VERSION,
            calls,
        }
    }
}

impl AccountingBackend for TestBackend {
    type Record = JobAcctInfo;

    fn plugin_type(&self) -> &str {
        TEST_PLUGIN_TYPE
    }

    fn plugin_name(&self) -> &str {
        "Job accounting test plugin"
    }

    fn contract_version(&self) -> u32 {
        self.version
    }

    fn exports(&self) -> Vec<Operation> {
        Operation::ALL
            .iter()
            .copied()
            .filter(|op| !self.missing.contains(op))
            .collect()
    }

    fn init_struct(&self, record: &mut JobAcctInfo) -> BackendResult<()> {
        self.calls.record(Operation::InitStruct);
        common::init_struct(record)
    }

    fn alloc(&self) -> BackendResult<JobAcctInfo> {
        self.calls.record(Operation::Alloc);
        Ok(JobAcctInfo::default())
    }

    fn free(&self, _record: JobAcctInfo) -> BackendResult<()> {
        self.calls.record(Operation::Free);
        Ok(())
    }

    fn set_info(
        &self,
        record: &mut JobAcctInfo,
        field: DataType,
        value: FieldValue,
    ) -> BackendResult<()> {
        self.calls.record(Operation::SetInfo);
        common::set_info(record, field, value)
    }

    fn get_info(&self, record: &JobAcctInfo, field: DataType) -> BackendResult<FieldValue> {
        self.calls.record(Operation::GetInfo);
        common::get_info(record, field)
    }

    fn aggregate(&self, dest: &mut JobAcctInfo, from: &JobAcctInfo) {
        self.calls.record(Operation::Aggregate);
        dest.aggregate(from);
    }

    fn pack(&self, record: &JobAcctInfo, buffer: &mut PackBuffer) -> BackendResult<()> {
        self.calls.record(Operation::Pack);
        common::pack(record, buffer)
    }

    fn unpack(&self, buffer: &mut PackBuffer) -> BackendResult<JobAcctInfo> {
        self.calls.record(Operation::Unpack);
        common::unpack(buffer)
    }

    fn init(&self, _log_destination: Option<&Path>) -> BackendResult<()> {
        self.calls.record(Operation::InitBackend);
        Ok(())
    }

    fn fini(&self) -> BackendResult<()> {
        self.calls.record(Operation::FiniBackend);
        if self.fail_fini {
            return Err(BackendError::new(EIO, "accounting log could not be flushed"));
        }
        Ok(())
    }

    fn job_start(&self, _job: &JobRecord) -> BackendResult<()> {
        self.calls.record(Operation::JobStart);
        Ok(())
    }

    fn job_complete(&self, _job: &JobRecord) -> BackendResult<()> {
        self.calls.record(Operation::JobComplete);
        Ok(())
    }

    fn step_start(&self, _step: &StepRecord) -> BackendResult<()> {
        self.calls.record(Operation::StepStart);
        Ok(())
    }

    fn step_complete(&self, _step: &StepRecord) -> BackendResult<()> {
        self.calls.record(Operation::StepComplete);
        Ok(())
    }

    fn suspend(&self, _job: &JobRecord) -> BackendResult<()> {
        self.calls.record(Operation::Suspend);
        Ok(())
    }

    fn start_poll(&self, _frequency: u32) -> BackendResult<()> {
        self.calls.record(Operation::StartPoll);
        Ok(())
    }

    fn end_poll(&self, _job: &LocalJob) -> BackendResult<()> {
        self.calls.record(Operation::EndPoll);
        Ok(())
    }

    fn suspend_poll(&self) {
        self.calls.record(Operation::SuspendPoll);
    }
}

/// Registry holding the built-ins plus a [`TestBackend`] built by `configure`
pub fn registry_with_test_backend<F>(
    calls: Arc<CallLog>,
    configure: F,
) -> BackendRegistry<JobAcctInfo>
where
    F: Fn(&mut TestBackend) + Send + Sync + 'static,
{
    let mut registry = BackendRegistry::with_builtins();
    registry.register_backend(TEST_PLUGIN_TYPE, move || {
        let mut backend = TestBackend::new(Arc::clone(&calls));
        configure(&mut backend);
        backend
    });
    registry
}

/// Facade selecting the test backend
pub fn test_facade<F>(calls: Arc<CallLog>, configure: F) -> JobAcct
where
    F: Fn(&mut TestBackend) + Send + Sync + 'static,
{
    let config = ConfigManager::new(AccountingConfig::for_backend(TEST_PLUGIN_TYPE));
    JobAcct::new(Arc::new(config), registry_with_test_backend(calls, configure))
}

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with XDG_CONFIG_HOME pointing at `test_dir` and `vars` set.
///
/// Every touched variable is restored afterwards.
pub fn with_config_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut touched: Vec<(String, Option<String>)> = vec![(
        "XDG_CONFIG_HOME".to_string(),
        std::env::var("XDG_CONFIG_HOME").ok(),
    )];
    for (key, _) in vars {
        touched.push((key.to_string(), std::env::var(key).ok()));
    }

    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, original) in touched.into_iter().rev() {
        match original {
            Some(value) => std::env::set_var(&key, value),
            None => std::env::remove_var(&key),
        }
    }

    result
}
