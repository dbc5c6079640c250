//! Lifecycle handles passed through the facade to the active backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job state as reported at completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Suspended,
    Complete,
    Cancelled,
    Failed,
    Timeout,
    NodeFail,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Suspended => "SUSPENDED",
            JobState::Complete => "COMPLETED",
            JobState::Cancelled => "CANCELLED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::NodeFail => "NODE_FAIL",
        }
    }
}

/// Controller-side view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: u32,
    pub user_id: u32,
    pub group_id: u32,
    pub name: String,
    pub partition: String,
    pub node_list: String,
    pub num_procs: u32,
    pub submit_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub state: JobState,
    pub exit_code: i32,
}

impl JobRecord {
    /// New pending job submitted now
    pub fn new(job_id: u32, name: impl Into<String>) -> Self {
        Self {
            job_id,
            user_id: 0,
            group_id: 0,
            name: name.into(),
            partition: "default".to_string(),
            node_list: String::new(),
            num_procs: 1,
            submit_time: Utc::now(),
            start_time: None,
            end_time: None,
            state: JobState::Pending,
            exit_code: 0,
        }
    }

    pub fn with_owner(mut self, user_id: u32, group_id: u32) -> Self {
        self.user_id = user_id;
        self.group_id = group_id;
        self
    }

    pub fn with_nodes(mut self, node_list: impl Into<String>, num_procs: u32) -> Self {
        self.node_list = node_list.into();
        self.num_procs = num_procs;
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }
}

/// Controller-side view of a job step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub job_id: u32,
    pub step_id: u32,
    pub name: String,
    pub node_list: String,
    pub num_tasks: u32,
    pub start_time: DateTime<Utc>,
    pub exit_code: i32,
}

impl StepRecord {
    pub fn new(job: &JobRecord, step_id: u32, num_tasks: u32) -> Self {
        Self {
            job_id: job.job_id,
            step_id,
            name: job.name.clone(),
            node_list: job.node_list.clone(),
            num_tasks,
            start_time: Utc::now(),
            exit_code: 0,
        }
    }
}

/// Node-local view of a running step, handed to end-polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalJob {
    pub job_id: u32,
    pub step_id: u32,
    pub node_id: u32,
    pub task_pids: Vec<u32>,
}

impl LocalJob {
    pub fn new(job_id: u32, step_id: u32, node_id: u32) -> Self {
        Self {
            job_id,
            step_id,
            node_id,
            task_pids: Vec::new(),
        }
    }
}
