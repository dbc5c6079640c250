//! `jobacct/log`: text accounting log
//!
//! Appends one line per lifecycle event to the accounting log file:
//!
//! `<job_id> <partition> <start> <submit> <EVENT> <uid> <gid> <details...>`
//!
//! Times are Unix seconds, `-` marks an unknown value. Without a log
//! destination the lines go to the tracing log instead.

use super::poll::{Poller, ProcSampler, UsageSampler};
use super::{common, AccountingBackend, BackendError, BackendResult};
use crate::job::{JobRecord, LocalJob, StepRecord};
use crate::pack::PackBuffer;
use crate::record::{DataType, FieldValue, JobAcctInfo};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const PLUGIN_TYPE: &str = "jobacct/log";

const EVENT_JOB_START: &str = "JOB_START";
const EVENT_JOB_STEP: &str = "JOB_STEP";
const EVENT_STEP_COMPLETE: &str = "JOB_STEP_COMPLETE";
const EVENT_JOB_SUSPEND: &str = "JOB_SUSPEND";
const EVENT_JOB_TERMINATED: &str = "JOB_TERMINATED";

struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Accounting backend writing a line-oriented text log
pub struct LogBackend {
    sink: Mutex<Option<LogSink>>,
    poller: Poller,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::with_sampler(Arc::new(ProcSampler::new(0)))
    }

    pub fn with_sampler(sampler: Arc<dyn UsageSampler>) -> Self {
        Self::with_poller(Poller::new(sampler))
    }

    pub fn with_poller(poller: Poller) -> Self {
        Self {
            sink: Mutex::new(None),
            poller,
        }
    }

    /// Path of the open accounting log, if any
    pub fn log_path(&self) -> Option<PathBuf> {
        self.sink.lock().as_ref().map(|s| s.path.clone())
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    fn write_line(&self, line: &str) -> BackendResult<()> {
        let mut sink = self.sink.lock();
        match sink.as_mut() {
            Some(sink) => {
                writeln!(sink.writer, "{}", line).map_err(BackendError::io)?;
                sink.writer.flush().map_err(BackendError::io)
            }
            None => {
                info!(target: "jobacct", "{}", line);
                Ok(())
            }
        }
    }

    fn job_line(job: &JobRecord, event: &str, details: &str) -> String {
        format!(
            "{} {} {} {} {} {} {} {}",
            job.job_id,
            job.partition,
            job.start_time
                .map(|t| t.timestamp().to_string())
                .unwrap_or_else(|| "-".to_string()),
            job.submit_time.timestamp(),
            event,
            job.user_id,
            job.group_id,
            details
        )
    }

    fn step_line(step: &StepRecord, event: &str, details: &str) -> String {
        format!(
            "{} - {} - {} - - {}",
            step.job_id,
            step.start_time.timestamp(),
            event,
            details
        )
    }
}

impl Default for LogBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountingBackend for LogBackend {
    type Record = JobAcctInfo;

    fn plugin_type(&self) -> &str {
        PLUGIN_TYPE
    }

    fn plugin_name(&self) -> &str {
        "Job accounting LOG plugin"
    }

    fn init_struct(&self, record: &mut JobAcctInfo) -> BackendResult<()> {
        common::init_struct(record)
    }

    fn alloc(&self) -> BackendResult<JobAcctInfo> {
        Ok(JobAcctInfo::default())
    }

    fn free(&self, record: JobAcctInfo) -> BackendResult<()> {
        drop(record);
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

    fn aggregate(&self, dest: &mut JobAcctInfo, from: &JobAcctInfo) {
        dest.aggregate(from);
    }

    fn pack(&self, record: &JobAcctInfo, buffer: &mut PackBuffer) -> BackendResult<()> {
        common::pack(record, buffer)
    }

    fn unpack(&self, buffer: &mut PackBuffer) -> BackendResult<JobAcctInfo> {
        common::unpack(buffer)
    }

    fn init(&self, log_destination: Option<&Path>) -> BackendResult<()> {
        let Some(path) = log_destination else {
            debug!("jobacct/log: no log destination, writing to tracing log");
            *self.sink.lock() = None;
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(BackendError::io)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                BackendError::new(
                    super::EIO,
                    format!("open {} failed: {}", path.display(), e),
                )
            })?;

        info!(path = %path.display(), "jobacct/log: opened accounting log");
        *self.sink.lock() = Some(LogSink {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    fn fini(&self) -> BackendResult<()> {
        self.poller.stop();
        if let Some(mut sink) = self.sink.lock().take() {
            sink.writer.flush().map_err(BackendError::io)?;
        }
        Ok(())
    }

    fn job_start(&self, job: &JobRecord) -> BackendResult<()> {
        let details = format!("{} {} {}", job.name, job.num_procs, job.node_list);
        self.write_line(&Self::job_line(job, EVENT_JOB_START, &details))
    }

    fn job_complete(&self, job: &JobRecord) -> BackendResult<()> {
        let elapsed = match (job.start_time, job.end_time) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            _ => 0,
        };
        let details = format!("{} {} {}", elapsed, job.state.as_str(), job.exit_code);
        self.write_line(&Self::job_line(job, EVENT_JOB_TERMINATED, &details))
    }

    fn step_start(&self, step: &StepRecord) -> BackendResult<()> {
        let details = format!(
            "{} {} {} {}",
            step.step_id, step.num_tasks, step.node_list, step.name
        );
        self.write_line(&Self::step_line(step, EVENT_JOB_STEP, &details))
    }

    fn step_complete(&self, step: &StepRecord) -> BackendResult<()> {
        let details = format!("{} {}", step.step_id, step.exit_code);
        self.write_line(&Self::step_line(step, EVENT_STEP_COMPLETE, &details))
    }

    fn suspend(&self, job: &JobRecord) -> BackendResult<()> {
        self.write_line(&Self::job_line(job, EVENT_JOB_SUSPEND, job.state.as_str()))
    }

    fn start_poll(&self, frequency: u32) -> BackendResult<()> {
        self.poller.start(frequency)
    }

    fn end_poll(&self, job: &LocalJob) -> BackendResult<()> {
        let totals = self.poller.stop();
        info!(
            job_id = job.job_id,
            step_id = job.step_id,
            node_id = job.node_id,
            max_rss = totals.max_rss,
            max_vsize = totals.max_vsize,
            tot_cpu = totals.tot_cpu,
            "jobacct/log: polling ended"
        );
        Ok(())
    }

    fn suspend_poll(&self) {
        self.poller.suspend();
    }
}
