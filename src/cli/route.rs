//! CLI route: run context and command dispatch.

use crate::cli::parse::Commands;
use crate::cli::presentation;
use crate::config::{AcctConfig, ConfigLoader};
use crate::contract::{plugin_type_for, CONTRACT_VERSION, MAJOR_TYPE};
use crate::error::AcctError;
use crate::facade::{ContextState, JobAcct};
use crate::job::{JobRecord, JobState, LocalJob, StepRecord};
use crate::loader::{BackendRegistry, InstalledPlugin, PluginRack};
use crate::record::{JobAcctInfo, TaskId};
use crate::timers::{timed, SlowCallLimits};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of `jobacct verify`
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub backend_type: String,
    pub plugin_type: Option<String>,
    pub state: ContextState,
    pub contract_version: u32,
    pub bind_usec: u64,
}

/// One timed facade call
#[derive(Debug, Clone, Serialize)]
pub struct CallTiming {
    pub call: String,
    pub usec: u64,
}

/// Outcome of `jobacct simulate`
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub job_id: u32,
    pub steps: u32,
    pub plugin_type: Option<String>,
    pub totals: JobAcctInfo,
    pub timings: Vec<CallTiming>,
}

/// Runtime context for CLI execution
pub struct RunContext {
    config: AcctConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Load configuration from `config_path`, or the default sources
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, AcctError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(Self::with_config(config, config_path))
    }

    pub fn with_config(config: AcctConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &AcctConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, AcctError> {
        match command {
            Commands::Contract { format } => presentation::format_contract(format),
            Commands::Plugins { format } => {
                presentation::format_plugins(&self.installed_plugins(), format)
            }
            Commands::Verify {
                backend_type,
                format,
            } => {
                let report = self.verify(backend_type.as_deref())?;
                presentation::format_verify(&report, format)
            }
            Commands::Simulate {
                job_id,
                steps,
                format,
            } => {
                let report = self.simulate(*job_id, *steps)?;
                presentation::format_simulation(&report, format)
            }
            Commands::Config => self.show_config(),
        }
    }

    /// Plugins visible under the configured discovery mode
    pub fn installed_plugins(&self) -> Vec<InstalledPlugin> {
        let accounting = &self.config.accounting;
        PluginRack::discover(
            MAJOR_TYPE,
            BackendRegistry::with_builtins(),
            accounting.discovery,
            &accounting.plugin_dir,
        )
        .list()
    }

    /// Bind a backend and report what was bound
    pub fn verify(&self, backend_type: Option<&str>) -> Result<VerifyReport, AcctError> {
        let mut accounting = self.config.accounting.clone();
        if let Some(backend_type) = backend_type {
            accounting.backend_type = backend_type.to_string();
        }
        let limits = accounting.slow_call_limits();
        let requested = plugin_type_for(&accounting.backend_type).unwrap_or_default();

        let acct = JobAcct::from_config(accounting);
        let (result, timing) = timed("jobacct verify", limits, || acct.initialize());
        result?;

        let report = VerifyReport {
            backend_type: requested,
            plugin_type: acct.active_plugin_type(),
            state: acct.state(),
            contract_version: CONTRACT_VERSION,
            bind_usec: timing.delta_us,
        };
        if let Err(e) = acct.fini_backend() {
            warn!(error = %e, "verify teardown failed");
        }
        Ok(report)
    }

    /// Run one job with `steps` steps through the facade
    pub fn simulate(&self, job_id: u32, steps: u32) -> Result<SimulationReport, AcctError> {
        let accounting = self.config.accounting.clone();
        let limits = accounting.slow_call_limits();
        let acct = JobAcct::from_config(accounting.clone());
        let mut timings = Vec::new();

        timed_call(&mut timings, "init_backend", limits, || {
            acct.init_backend(accounting.log_destination.as_deref())
        })?;
        timed_call(&mut timings, "start_poll", limits, || {
            acct.start_poll(accounting.poll_frequency)
        })?;

        let mut job = JobRecord::new(job_id, "simulate").with_nodes("localhost", steps.max(1));
        job.state = JobState::Running;
        job.start_time = Some(Utc::now());
        timed_call(&mut timings, "job_start", limits, || acct.job_start(&job))?;

        let mut totals = timed_call(&mut timings, "alloc", limits, || acct.alloc())?;
        for step_id in 0..steps {
            let step = StepRecord::new(&job, step_id, 1);
            timed_call(&mut timings, "step_start", limits, || acct.step_start(&step))?;

            let mut usage = acct.alloc()?;
            acct.init_struct(&mut usage)?;
            let scale = step_id + 1;
            usage.record_sample(
                TaskId::new(0, step_id),
                1024 * scale,
                4096 * scale,
                scale,
                100 * scale,
            );
            acct.aggregate(&mut totals, &usage);
            acct.free(usage)?;

            timed_call(&mut timings, "step_complete", limits, || {
                acct.step_complete(&step)
            })?;
        }

        job.state = JobState::Complete;
        job.end_time = Some(Utc::now());
        timed_call(&mut timings, "job_complete", limits, || acct.job_complete(&job))?;
        timed_call(&mut timings, "end_poll", limits, || {
            acct.end_poll(&LocalJob::new(job_id, 0, 0))
        })?;

        let plugin_type = acct.active_plugin_type();
        timed_call(&mut timings, "fini_backend", limits, || acct.fini_backend())?;
        info!(job_id, steps, "simulation complete");

        Ok(SimulationReport {
            job_id,
            steps,
            plugin_type,
            totals,
            timings,
        })
    }

    fn show_config(&self) -> Result<String, AcctError> {
        let body = toml::to_string_pretty(&self.config)
            .map_err(|e| AcctError::Serialization(e.to_string()))?;
        match self.config_path {
            Some(ref path) => Ok(format!("# {}\n{}", path.display(), body)),
            None => Ok(body),
        }
    }
}

fn timed_call<T>(
    timings: &mut Vec<CallTiming>,
    label: &str,
    limits: SlowCallLimits,
    f: impl FnOnce() -> Result<T, AcctError>,
) -> Result<T, AcctError> {
    let (result, report) = timed(label, limits, f);
    timings.push(CallTiming {
        call: label.to_string(),
        usec: report.delta_us,
    });
    result
}
