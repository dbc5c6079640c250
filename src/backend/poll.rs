//! Background resource sampling
//!
//! A `Poller` owns one sampling thread that periodically asks a
//! [`UsageSampler`] for a snapshot and folds it into running totals. Backends
//! drive it from start-polling, suspend-polling and end-polling.

use super::{BackendError, BackendResult};
use crate::record::{JobAcctInfo, Rusage, TaskId};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// One resource snapshot for one task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub task: TaskId,
    pub rss_kb: u32,
    pub vsize_kb: u32,
    pub pages: u32,
    pub cpu_secs: u32,
    pub rusage: Rusage,
}

/// Source of resource snapshots
pub trait UsageSampler: Send + Sync {
    /// Take one snapshot; `None` when nothing can be measured
    fn sample(&self) -> Option<Sample>;
}

/// Samples the current process through `/proc/self`
#[derive(Debug, Clone, Default)]
pub struct ProcSampler {
    node_id: u32,
}

/// Clock ticks per second assumed for `/proc/<pid>/stat` times
const CLOCK_TICKS: u64 = 100;

impl ProcSampler {
    pub fn new(node_id: u32) -> Self {
        Self { node_id }
    }

    fn status_kb(status: &str, key: &str) -> Option<u32> {
        status
            .lines()
            .find(|line| line.starts_with(key))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse().ok())
    }
}

impl UsageSampler for ProcSampler {
    fn sample(&self) -> Option<Sample> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;

        // Fields after the command name, which may itself contain spaces.
        let rest = stat.rsplit_once(')')?.1;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // state is field 3; majflt 12, utime 14, stime 15 (1-based).
        let majflt: u64 = fields.get(9)?.parse().ok()?;
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;

        let to_us = |ticks: u64| ticks.saturating_mul(1_000_000 / CLOCK_TICKS);
        Some(Sample {
            task: TaskId::new(0, self.node_id),
            rss_kb: Self::status_kb(&status, "VmRSS:").unwrap_or(0),
            vsize_kb: Self::status_kb(&status, "VmSize:").unwrap_or(0),
            pages: u32::try_from(majflt).unwrap_or(u32::MAX),
            cpu_secs: u32::try_from((utime + stime) / CLOCK_TICKS).unwrap_or(u32::MAX),
            rusage: Rusage {
                user_cpu_us: to_us(utime),
                sys_cpu_us: to_us(stime),
            },
        })
    }
}

#[derive(Debug)]
struct PollState {
    frequency: u32,
    suspended: bool,
    shutdown: bool,
    samples: u64,
}

struct PollShared {
    state: Mutex<PollState>,
    wake: Condvar,
    totals: Mutex<JobAcctInfo>,
}

/// Periodic sampling loop
pub struct Poller {
    sampler: Arc<dyn UsageSampler>,
    shared: Arc<PollShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    tick: Duration,
}

impl Poller {
    pub fn new(sampler: Arc<dyn UsageSampler>) -> Self {
        Self::with_tick(sampler, Duration::from_secs(1))
    }

    /// Use `tick` as the unit of the polling frequency instead of one second
    pub fn with_tick(sampler: Arc<dyn UsageSampler>, tick: Duration) -> Self {
        Self {
            sampler,
            shared: Arc::new(PollShared {
                state: Mutex::new(PollState {
                    frequency: 0,
                    suspended: false,
                    shutdown: false,
                    samples: 0,
                }),
                wake: Condvar::new(),
                totals: Mutex::new(JobAcctInfo::default()),
            }),
            thread: Mutex::new(None),
            tick,
        }
    }

    /// Start sampling every `frequency` ticks.
    ///
    /// A frequency of 0 disables polling. Calling again on a running poller
    /// resumes it and applies the new frequency.
    pub fn start(&self, frequency: u32) -> BackendResult<()> {
        if frequency == 0 {
            debug!("jobacct polling disabled (frequency 0)");
            return Ok(());
        }

        let mut thread = self.thread.lock();
        {
            let mut state = self.shared.state.lock();
            state.frequency = frequency;
            state.suspended = false;
            state.shutdown = false;
        }

        if thread.is_some() {
            self.shared.wake.notify_all();
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let sampler = Arc::clone(&self.sampler);
        let tick = self.tick;
        let handle = std::thread::Builder::new()
            .name("jobacct-poll".to_string())
            .spawn(move || run_poll_loop(shared, sampler, tick))
            .map_err(BackendError::io)?;
        *thread = Some(handle);
        debug!(frequency, "jobacct polling started");
        Ok(())
    }

    /// Pause sampling until the next `start`
    pub fn suspend(&self) {
        self.shared.state.lock().suspended = true;
        trace!("jobacct polling suspended");
    }

    /// Stop the sampling thread and hand back the accumulated totals.
    ///
    /// Totals are reset so the next job starts from zero.
    pub fn stop(&self) -> JobAcctInfo {
        let mut thread = self.thread.lock();
        if let Some(handle) = thread.take() {
            self.shared.state.lock().shutdown = true;
            self.shared.wake.notify_all();
            if handle.join().is_err() {
                warn!("jobacct polling thread panicked");
            }
        }
        std::mem::take(&mut *self.shared.totals.lock())
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.state.lock().suspended
    }

    pub fn sample_count(&self) -> u64 {
        self.shared.state.lock().samples
    }

    /// Snapshot of the totals gathered so far
    pub fn totals(&self) -> JobAcctInfo {
        self.shared.totals.lock().clone()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_poll_loop(shared: Arc<PollShared>, sampler: Arc<dyn UsageSampler>, tick: Duration) {
    let mut state = shared.state.lock();
    while !state.shutdown {
        if !state.suspended {
            let taken = MutexGuard::unlocked(&mut state, || take_sample(&shared, &*sampler));
            if taken {
                state.samples += 1;
            }
        }
        let wait = tick.saturating_mul(state.frequency.max(1));
        shared.wake.wait_for(&mut state, wait);
    }
}

fn take_sample(shared: &PollShared, sampler: &dyn UsageSampler) -> bool {
    let Some(sample) = sampler.sample() else {
        return false;
    };
    let mut totals = shared.totals.lock();
    totals.record_sample(
        sample.task,
        sample.rss_kb,
        sample.vsize_kb,
        sample.pages,
        sample.cpu_secs,
    );
    totals.rusage.user_cpu_us = totals
        .rusage
        .user_cpu_us
        .saturating_add(sample.rusage.user_cpu_us);
    totals.rusage.sys_cpu_us = totals
        .rusage
        .sys_cpu_us
        .saturating_add(sample.rusage.sys_cpu_us);
    true
}
