//! `jobacct/none`: accepts every call and records nothing.

use super::{common, AccountingBackend, BackendResult};
use crate::job::{JobRecord, LocalJob, StepRecord};
use crate::pack::PackBuffer;
use crate::record::{DataType, FieldValue, JobAcctInfo};
use std::path::Path;

pub const PLUGIN_TYPE: &str = "jobacct/none";

#[derive(Debug, Default)]
pub struct NoneBackend;

impl NoneBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AccountingBackend for NoneBackend {
    type Record = JobAcctInfo;

    fn plugin_type(&self) -> &str {
        PLUGIN_TYPE
    }

    fn plugin_name(&self) -> &str {
        "Job accounting NOT_INVOKED plugin"
    }

    fn init_struct(&self, record: &mut JobAcctInfo) -> BackendResult<()> {
        common::init_struct(record)
    }

    fn alloc(&self) -> BackendResult<JobAcctInfo> {
        Ok(JobAcctInfo::default())
    }

    fn free(&self, _record: JobAcctInfo) -> BackendResult<()> {
        Ok(())
    }

    fn set_info(
        &self,
        record: &mut JobAcctInfo,
        field: DataType,
        value: FieldValue,
    ) -> BackendResult<()> {
        common::set_info(record, field, value)
    }

    fn get_info(&self, record: &JobAcctInfo, field: DataType) -> BackendResult<FieldValue> {
        common::get_info(record, field)
    }

    fn aggregate(&self, _dest: &mut JobAcctInfo, _from: &JobAcctInfo) {}

    fn pack(&self, record: &JobAcctInfo, buffer: &mut PackBuffer) -> BackendResult<()> {
        common::pack(record, buffer)
    }

    fn unpack(&self, buffer: &mut PackBuffer) -> BackendResult<JobAcctInfo> {
        common::unpack(buffer)
    }

    fn init(&self, _log_destination: Option<&Path>) -> BackendResult<()> {
        Ok(())
    }

    fn fini(&self) -> BackendResult<()> {
        Ok(())
    }

    fn job_start(&self, _job: &JobRecord) -> BackendResult<()> {
        Ok(())
    }

    fn job_complete(&self, _job: &JobRecord) -> BackendResult<()> {
        Ok(())
    }

    fn step_start(&self, _step: &StepRecord) -> BackendResult<()> {
        Ok(())
    }

    fn step_complete(&self, _step: &StepRecord) -> BackendResult<()> {
        Ok(())
    }

    fn suspend(&self, _job: &JobRecord) -> BackendResult<()> {
        Ok(())
    }

    fn start_poll(&self, _frequency: u32) -> BackendResult<()> {
        Ok(())
    }

    fn end_poll(&self, _job: &LocalJob) -> BackendResult<()> {
        Ok(())
    }

    fn suspend_poll(&self) {}
}
