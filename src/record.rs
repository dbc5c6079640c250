//! Accounting records
//!
//! `JobAcctInfo` is the record type used by the built-in backends. The
//! dispatch layer never looks inside it: it is handed to whichever backend is
//! active and interpreted there. Custom backends may use their own record type.

use serde::{Deserialize, Serialize};

/// Sentinel for "no CPU sample yet" in `min_cpu`.
pub const NO_CPU_SAMPLE: u32 = u32::MAX;

/// Identifies the task that produced a maximum or minimum value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId {
    pub task_id: u16,
    pub node_id: u32,
}

impl TaskId {
    pub fn new(task_id: u16, node_id: u32) -> Self {
        Self { task_id, node_id }
    }
}

/// CPU time consumed, in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rusage {
    pub user_cpu_us: u64,
    pub sys_cpu_us: u64,
}

/// Resource usage accumulated for a job or step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAcctInfo {
    pub rusage: Rusage,
    pub max_vsize: u32,
    pub max_vsize_id: TaskId,
    pub tot_vsize: u64,
    pub max_rss: u32,
    pub max_rss_id: TaskId,
    pub tot_rss: u64,
    pub max_pages: u32,
    pub max_pages_id: TaskId,
    pub tot_pages: u64,
    pub min_cpu: u32,
    pub min_cpu_id: TaskId,
    pub tot_cpu: u64,
}

impl Default for JobAcctInfo {
    fn default() -> Self {
        Self {
            rusage: Rusage::default(),
            max_vsize: 0,
            max_vsize_id: TaskId::default(),
            tot_vsize: 0,
            max_rss: 0,
            max_rss_id: TaskId::default(),
            tot_rss: 0,
            max_pages: 0,
            max_pages_id: TaskId::default(),
            tot_pages: 0,
            min_cpu: NO_CPU_SAMPLE,
            min_cpu_id: TaskId::default(),
            tot_cpu: 0,
        }
    }
}

impl JobAcctInfo {
    /// Reset every field to its initial value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a single sample taken from one task.
    pub fn record_sample(&mut self, id: TaskId, rss: u32, vsize: u32, pages: u32, cpu: u32) {
        let sample = JobAcctInfo {
            rusage: Rusage::default(),
            max_vsize: vsize,
            max_vsize_id: id,
            tot_vsize: u64::from(vsize),
            max_rss: rss,
            max_rss_id: id,
            tot_rss: u64::from(rss),
            max_pages: pages,
            max_pages_id: id,
            tot_pages: u64::from(pages),
            min_cpu: cpu,
            min_cpu_id: id,
            tot_cpu: u64::from(cpu),
        };
        self.aggregate(&sample);
    }

    /// Merge `from` into `self`.
    ///
    /// Maxima keep the larger value and the task that produced it, minima the
    /// smaller one; totals and CPU times add.
    pub fn aggregate(&mut self, from: &JobAcctInfo) {
        if from.max_vsize > self.max_vsize {
            self.max_vsize = from.max_vsize;
            self.max_vsize_id = from.max_vsize_id;
        }
        self.tot_vsize = self.tot_vsize.saturating_add(from.tot_vsize);

        if from.max_rss > self.max_rss {
            self.max_rss = from.max_rss;
            self.max_rss_id = from.max_rss_id;
        }
        self.tot_rss = self.tot_rss.saturating_add(from.tot_rss);

        if from.max_pages > self.max_pages {
            self.max_pages = from.max_pages;
            self.max_pages_id = from.max_pages_id;
        }
        self.tot_pages = self.tot_pages.saturating_add(from.tot_pages);

        if from.min_cpu < self.min_cpu {
            self.min_cpu = from.min_cpu;
            self.min_cpu_id = from.min_cpu_id;
        }
        self.tot_cpu = self.tot_cpu.saturating_add(from.tot_cpu);

        self.rusage.user_cpu_us = self
            .rusage
            .user_cpu_us
            .saturating_add(from.rusage.user_cpu_us);
        self.rusage.sys_cpu_us = self
            .rusage
            .sys_cpu_us
            .saturating_add(from.rusage.sys_cpu_us);
    }

    /// Set one field. Returns false when `value` does not fit `field`.
    pub fn set(&mut self, field: DataType, value: FieldValue) -> bool {
        match (field, value) {
            (DataType::Total, FieldValue::Total(rec)) => *self = *rec,
            (DataType::Rusage, FieldValue::Rusage(r)) => self.rusage = r,
            (DataType::MaxRss, FieldValue::U32(v)) => self.max_rss = v,
            (DataType::MaxRssId, FieldValue::Id(id)) => self.max_rss_id = id,
            (DataType::TotRss, FieldValue::U64(v)) => self.tot_rss = v,
            (DataType::MaxVsize, FieldValue::U32(v)) => self.max_vsize = v,
            (DataType::MaxVsizeId, FieldValue::Id(id)) => self.max_vsize_id = id,
            (DataType::TotVsize, FieldValue::U64(v)) => self.tot_vsize = v,
            (DataType::MaxPages, FieldValue::U32(v)) => self.max_pages = v,
            (DataType::MaxPagesId, FieldValue::Id(id)) => self.max_pages_id = id,
            (DataType::TotPages, FieldValue::U64(v)) => self.tot_pages = v,
            (DataType::MinCpu, FieldValue::U32(v)) => self.min_cpu = v,
            (DataType::MinCpuId, FieldValue::Id(id)) => self.min_cpu_id = id,
            (DataType::TotCpu, FieldValue::U64(v)) => self.tot_cpu = v,
            _ => return false,
        }
        true
    }

    /// Read one field.
    pub fn get(&self, field: DataType) -> FieldValue {
        match field {
            DataType::Total => FieldValue::Total(Box::new(self.clone())),
            DataType::Rusage => FieldValue::Rusage(self.rusage),
            DataType::MaxRss => FieldValue::U32(self.max_rss),
            DataType::MaxRssId => FieldValue::Id(self.max_rss_id),
            DataType::TotRss => FieldValue::U64(self.tot_rss),
            DataType::MaxVsize => FieldValue::U32(self.max_vsize),
            DataType::MaxVsizeId => FieldValue::Id(self.max_vsize_id),
            DataType::TotVsize => FieldValue::U64(self.tot_vsize),
            DataType::MaxPages => FieldValue::U32(self.max_pages),
            DataType::MaxPagesId => FieldValue::Id(self.max_pages_id),
            DataType::TotPages => FieldValue::U64(self.tot_pages),
            DataType::MinCpu => FieldValue::U32(self.min_cpu),
            DataType::MinCpuId => FieldValue::Id(self.min_cpu_id),
            DataType::TotCpu => FieldValue::U64(self.tot_cpu),
        }
    }
}

/// Field selector for set-field / get-field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Total,
    Rusage,
    MaxRss,
    MaxRssId,
    TotRss,
    MaxVsize,
    MaxVsizeId,
    TotVsize,
    MaxPages,
    MaxPagesId,
    TotPages,
    MinCpu,
    MinCpuId,
    TotCpu,
}

/// Value carried by set-field / get-field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Total(Box<JobAcctInfo>),
    Rusage(Rusage),
    U32(u32),
    U64(u64),
    Id(TaskId),
}
