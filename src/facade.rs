//! Dispatch facade
//!
//! `JobAcct` is the entry point callers use for every accounting event. It
//! owns at most one [`BackendContext`], builds it lazily from the configured
//! backend type, and forwards each call to the bound backend.
//!
//! One mutex guards both the lazy initialization and every dispatched call,
//! so initialization is race free and backend calls are serialized.
//!
//! Missing context policy:
//! - record management, serialization, init-backend and start-polling
//!   initialize on demand and fail when no backend can be bound;
//! - lifecycle notifications, aggregate, end-polling and suspend-polling
//!   never initialize and succeed without doing anything when there is no
//!   context.

use crate::backend::{AccountingBackend, BackendResult};
use crate::config::{AccountingConfig, ConfigManager, ConfigSource};
use crate::context::BackendContext;
use crate::contract::{Operation, MAJOR_TYPE};
use crate::error::AcctError;
use crate::job::{JobRecord, LocalJob, StepRecord};
use crate::loader::rack::Discovery;
use crate::loader::{BackendRegistry, PluginLoader, PluginRack, RackFactory};
use crate::pack::PackBuffer;
use crate::record::{DataType, FieldValue, JobAcctInfo};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of the backend context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

impl std::fmt::Display for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContextState::Uninitialized => "uninitialized",
            ContextState::Initializing => "initializing",
            ContextState::Ready => "ready",
            ContextState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

struct Inner<R> {
    context: Option<BackendContext<R>>,
    state: ContextState,
    contexts_created: u64,
}

impl<R: Send + 'static> Inner<R> {
    fn backend(
        &self,
        operation: Operation,
    ) -> Result<&dyn AccountingBackend<Record = R>, AcctError> {
        self.context
            .as_ref()
            .and_then(|context| context.ops())
            .map(|ops| ops.backend())
            .ok_or(AcctError::NoContext { operation })
    }
}

/// Job accounting dispatch facade
pub struct JobAcct<R: Send + 'static = JobAcctInfo> {
    config: Arc<dyn ConfigSource>,
    rack_factory: RackFactory<R>,
    inner: Mutex<Inner<R>>,
}

impl<R: Send + 'static> JobAcct<R> {
    /// Facade over `registry`, with every registered backend installed
    pub fn new(config: Arc<dyn ConfigSource>, registry: BackendRegistry<R>) -> Self {
        Self::with_rack_factory(
            config,
            PluginRack::factory(MAJOR_TYPE, registry, Discovery::Static),
        )
    }

    /// Facade using a custom plugin loader
    pub fn with_rack_factory(config: Arc<dyn ConfigSource>, rack_factory: RackFactory<R>) -> Self {
        Self {
            config,
            rack_factory,
            inner: Mutex::new(Inner {
                context: None,
                state: ContextState::Uninitialized,
                contexts_created: 0,
            }),
        }
    }

    pub fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ContextState::Ready
    }

    /// Number of contexts successfully built over the facade's lifetime
    pub fn contexts_created(&self) -> u64 {
        self.inner.lock().contexts_created
    }

    /// Plugin type of the bound backend, if any
    pub fn active_plugin_type(&self) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .context
            .as_ref()
            .and_then(|context| context.ops())
            .map(|ops| ops.plugin_type().to_string())
    }

    /// Bind a backend now instead of on first use
    pub fn initialize(&self) -> Result<(), AcctError> {
        let mut inner = self.inner.lock();
        self.ensure_initialized(&mut inner)
    }

    /// Tear down the current context and bind a fresh one
    pub fn reinit(&self) -> Result<(), AcctError> {
        let mut inner = self.inner.lock();
        if let Some(context) = inner.context.take() {
            Self::teardown(context);
            inner.state = ContextState::Destroyed;
        }
        self.ensure_initialized(&mut inner)
    }

    fn ensure_initialized(&self, inner: &mut Inner<R>) -> Result<(), AcctError> {
        if inner.context.is_some() {
            return Ok(());
        }

        inner.state = ContextState::Initializing;
        match self.build_context() {
            Ok(context) => {
                inner.context = Some(context);
                inner.state = ContextState::Ready;
                inner.contexts_created += 1;
                Ok(())
            }
            Err(e) => {
                inner.state = ContextState::Uninitialized;
                Err(e)
            }
        }
    }

    fn build_context(&self) -> Result<BackendContext<R>, AcctError> {
        let backend_type = self.config.backend_type().unwrap_or_default();
        let mut context = BackendContext::create(&backend_type).map_err(|e| {
            error!("cannot create a context for {:?}", backend_type);
            e
        })?;

        let search_path = self.config.plugin_search_path();
        let resolved = context
            .resolve_operations(&search_path, &self.rack_factory)
            .map(|ops| (ops.plugin_type().to_string(), ops.version()));

        match resolved {
            Ok((plugin_type, version)) => {
                info!(
                    plugin_type = %plugin_type,
                    contract_version = version,
                    "job accounting ready"
                );
                Ok(context)
            }
            Err(e) => {
                error!("cannot resolve job accounting plugin operations");
                Self::teardown(context);
                Err(e)
            }
        }
    }

    fn teardown(context: BackendContext<R>) {
        let backend_type = context.backend_type().to_string();
        if let Err(e) = context.destroy() {
            warn!(plugin_type = %backend_type, error = %e, "job accounting teardown incomplete");
        }
    }

    /// Initialize on demand; without a backend the call fails with `NoContext`
    fn with_backend<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&dyn AccountingBackend<Record = R>) -> BackendResult<T>,
    ) -> Result<T, AcctError> {
        let mut inner = self.inner.lock();
        if let Err(e) = self.ensure_initialized(&mut inner) {
            debug!(operation = %operation, error = %e, "no job accounting context");
            return Err(AcctError::NoContext { operation });
        }
        let backend = inner.backend(operation)?;
        trace!(operation = %operation, "dispatch");
        f(backend).map_err(|e| AcctError::backend(operation, e))
    }

    /// Initialize on demand; an initialization failure is returned as `InitFailed`
    fn with_initialized_backend<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&dyn AccountingBackend<Record = R>) -> BackendResult<T>,
    ) -> Result<T, AcctError> {
        let mut inner = self.inner.lock();
        self.ensure_initialized(&mut inner)
            .map_err(|e| AcctError::InitFailed(Box::new(e)))?;
        let backend = inner.backend(operation)?;
        trace!(operation = %operation, "dispatch");
        f(backend).map_err(|e| AcctError::backend(operation, e))
    }

    /// Dispatch only if a context exists; otherwise succeed silently
    fn notify(
        &self,
        operation: Operation,
        f: impl FnOnce(&dyn AccountingBackend<Record = R>) -> BackendResult<()>,
    ) -> Result<(), AcctError> {
        let inner = self.inner.lock();
        match inner.backend(operation) {
            Ok(backend) => {
                trace!(operation = %operation, "dispatch");
                f(backend).map_err(|e| AcctError::backend(operation, e))
            }
            Err(_) => {
                trace!(operation = %operation, "no job accounting context, skipped");
                Ok(())
            }
        }
    }

    pub fn init_struct(&self, record: &mut R) -> Result<(), AcctError> {
        self.with_backend(Operation::InitStruct, |backend| backend.init_struct(record))
    }

    pub fn alloc(&self) -> Result<R, AcctError> {
        self.with_backend(Operation::Alloc, |backend| backend.alloc())
    }

    pub fn free(&self, record: R) -> Result<(), AcctError> {
        self.with_backend(Operation::Free, |backend| backend.free(record))
    }

    pub fn set_info(
        &self,
        record: &mut R,
        field: DataType,
        value: FieldValue,
    ) -> Result<(), AcctError> {
        self.with_backend(Operation::SetInfo, |backend| {
            backend.set_info(record, field, value)
        })
    }

    pub fn get_info(&self, record: &R, field: DataType) -> Result<FieldValue, AcctError> {
        self.with_backend(Operation::GetInfo, |backend| backend.get_info(record, field))
    }

    /// Merge `from` into `dest`; leaves `dest` unchanged without a context
    pub fn aggregate(&self, dest: &mut R, from: &R) {
        let _ = self.notify(Operation::Aggregate, |backend| {
            backend.aggregate(dest, from);
            Ok(())
        });
    }

    pub fn pack(&self, record: &R, buffer: &mut PackBuffer) -> Result<(), AcctError> {
        self.with_backend(Operation::Pack, |backend| backend.pack(record, buffer))
    }

    /// Serialize one record into a fresh byte vector
    pub fn pack_to_vec(&self, record: &R) -> Result<Vec<u8>, AcctError> {
        let mut buffer = PackBuffer::new();
        self.pack(record, &mut buffer)?;
        Ok(buffer.into_bytes())
    }

    /// Read one record; the returned record belongs to the caller
    pub fn unpack(&self, buffer: &mut PackBuffer) -> Result<R, AcctError> {
        self.with_backend(Operation::Unpack, |backend| backend.unpack(buffer))
    }

    pub fn init_backend(&self, log_destination: Option<&Path>) -> Result<(), AcctError> {
        self.with_initialized_backend(Operation::InitBackend, |backend| {
            backend.init(log_destination)
        })
    }

    /// Finalize the backend and destroy the context.
    ///
    /// The context is destroyed even when the backend's own finalize fails;
    /// the next call builds a new one.
    pub fn fini_backend(&self) -> Result<(), AcctError> {
        let mut inner = self.inner.lock();
        let Some(context) = inner.context.take() else {
            return Ok(());
        };

        let result = match context.ops() {
            Some(ops) => ops
                .backend()
                .fini()
                .map_err(|e| AcctError::backend(Operation::FiniBackend, e)),
            None => Ok(()),
        };
        if let Err(e) = &result {
            error!("job accounting backend finalize failed: {}", e);
        }

        let teardown = context.destroy();
        inner.state = ContextState::Destroyed;
        info!("job accounting context destroyed");

        match (result, teardown) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => {
                warn!(error = %e, "job accounting teardown incomplete");
                Err(e)
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    pub fn job_start(&self, job: &JobRecord) -> Result<(), AcctError> {
        self.notify(Operation::JobStart, |backend| backend.job_start(job))
    }

    pub fn job_complete(&self, job: &JobRecord) -> Result<(), AcctError> {
        self.notify(Operation::JobComplete, |backend| backend.job_complete(job))
    }

    pub fn step_start(&self, step: &StepRecord) -> Result<(), AcctError> {
        self.notify(Operation::StepStart, |backend| backend.step_start(step))
    }

    pub fn step_complete(&self, step: &StepRecord) -> Result<(), AcctError> {
        self.notify(Operation::StepComplete, |backend| backend.step_complete(step))
    }

    pub fn suspend(&self, job: &JobRecord) -> Result<(), AcctError> {
        self.notify(Operation::Suspend, |backend| backend.suspend(job))
    }

    /// Start the backend's sampling loop; frequency 0 disables polling
    pub fn start_poll(&self, frequency: u32) -> Result<(), AcctError> {
        self.with_initialized_backend(Operation::StartPoll, |backend| {
            backend.start_poll(frequency)
        })
    }

    pub fn end_poll(&self, job: &LocalJob) -> Result<(), AcctError> {
        self.notify(Operation::EndPoll, |backend| backend.end_poll(job))
    }

    pub fn suspend_poll(&self) {
        let _ = self.notify(Operation::SuspendPoll, |backend| {
            backend.suspend_poll();
            Ok(())
        });
    }
}

impl JobAcct<JobAcctInfo> {
    /// Facade over the built-in backends, discovering plugins as configured
    pub fn from_config(config: AccountingConfig) -> Self {
        let discovery = config.discovery;
        Self::with_rack_factory(
            Arc::new(config),
            PluginRack::factory(MAJOR_TYPE, BackendRegistry::with_builtins(), discovery),
        )
    }

    /// Facade over the built-in backends reading a reloadable configuration
    ///
    /// Backend type, search path and discovery mode are read from `manager`
    /// on every initialization attempt.
    pub fn from_manager(manager: ConfigManager) -> Self {
        let registry = BackendRegistry::with_builtins();
        let source = manager.clone();
        let rack_factory: RackFactory<JobAcctInfo> = Arc::new(
            move |search_path: &str| -> Result<Box<dyn PluginLoader<JobAcctInfo>>, AcctError> {
                let discovery = source.get().discovery;
                Ok(Box::new(PluginRack::discover(
                    MAJOR_TYPE,
                    registry.clone(),
                    discovery,
                    search_path,
                )))
            },
        );
        Self::with_rack_factory(Arc::new(manager), rack_factory)
    }
}
