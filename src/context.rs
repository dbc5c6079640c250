//! Backend context
//!
//! Owns the answer to "which backend is active and how to call it": the
//! configured plugin type, the loader that discovered the backend, the handle
//! of the loaded plugin and the verified operation table.

use crate::backend::AccountingBackend;
use crate::contract::{
    plugin_type_for, Operation, CONTRACT_VERSION, MAJOR_TYPE, OPERATION_COUNT, OPERATION_SYMBOLS,
};
use crate::error::AcctError;
use crate::loader::{PluginHandle, PluginLoader, RackFactory, SharedBackend};
use tracing::{debug, error};

/// Backend bound against the full operation contract
///
/// Only constructed by [`OperationTable::bind`], which refuses partially
/// resolved backends, so holding a table means every operation is callable.
pub struct OperationTable<R> {
    plugin_type: String,
    version: u32,
    backend: SharedBackend<R>,
}

impl<R: Send + 'static> OperationTable<R> {
    /// Verify a backend against the contract.
    ///
    /// `resolved` holds one entry per contract symbol, in ordinal order; an
    /// entry counts only if it resolved to the operation of that ordinal.
    pub fn bind(
        plugin_type: &str,
        backend: SharedBackend<R>,
        resolved: &[Option<Operation>],
    ) -> Result<Self, AcctError> {
        let version = backend.contract_version();
        if version != CONTRACT_VERSION {
            return Err(AcctError::ContractMismatch {
                plugin_type: plugin_type.to_string(),
                expected: CONTRACT_VERSION,
                found: version,
            });
        }

        let missing: Vec<String> = Operation::ALL
            .iter()
            .filter(|op| resolved.get(op.ordinal()).copied().flatten() != Some(**op))
            .map(|op| op.symbol().to_string())
            .collect();

        if !missing.is_empty() {
            return Err(AcctError::Unresolved {
                plugin_type: plugin_type.to_string(),
                resolved: OPERATION_COUNT - missing.len(),
                required: OPERATION_COUNT,
                missing,
            });
        }

        Ok(Self {
            plugin_type: plugin_type.to_string(),
            version,
            backend,
        })
    }

    pub fn plugin_type(&self) -> &str {
        &self.plugin_type
    }

    /// Contract version the table was bound against
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn backend(&self) -> &dyn AccountingBackend<Record = R> {
        self.backend.as_ref()
    }
}

/// The single source of truth for the active backend
pub struct BackendContext<R> {
    backend_type: String,
    rack: Option<Box<dyn PluginLoader<R>>>,
    handle: Option<PluginHandle>,
    ops: Option<OperationTable<R>>,
}

impl<R: Send + 'static> BackendContext<R> {
    /// Create a context for a backend type.
    ///
    /// The type may be a short name (`log`) or a full plugin type
    /// (`jobacct/log`); an empty type is rejected.
    pub fn create(backend_type: &str) -> Result<Self, AcctError> {
        let Some(backend_type) = plugin_type_for(backend_type) else {
            error!("no jobacct type configured");
            return Err(AcctError::NoType);
        };

        // Rack is demand-loaded on first reference.
        Ok(Self {
            backend_type,
            rack: None,
            handle: None,
            ops: None,
        })
    }

    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Resolved operations, present once `resolve_operations` succeeded
    pub fn ops(&self) -> Option<&OperationTable<R>> {
        self.ops.as_ref()
    }

    pub fn has_rack(&self) -> bool {
        self.rack.is_some()
    }

    /// Find the backend and bind it against the operation contract.
    ///
    /// Creates the loader from `make_rack` on first use. Any failure leaves
    /// the context without operations; callers must discard it.
    pub fn resolve_operations(
        &mut self,
        search_path: &str,
        make_rack: &RackFactory<R>,
    ) -> Result<&OperationTable<R>, AcctError> {
        if self.rack.is_none() {
            let rack = make_rack(search_path).map_err(|e| {
                error!("unable to create a plugin manager: {}", e);
                match e {
                    AcctError::RackUnavailable(_) => e,
                    other => AcctError::RackUnavailable(other.to_string()),
                }
            })?;
            self.rack = Some(rack);
        }

        if self.ops.is_none() {
            let table = self.load_and_bind()?;
            debug!(plugin_type = %self.backend_type, "jobacct operations resolved");
            self.ops = Some(table);
        }

        self.ops.as_ref().ok_or_else(|| AcctError::NoMatch {
            plugin_type: self.backend_type.clone(),
        })
    }

    fn load_and_bind(&mut self) -> Result<OperationTable<R>, AcctError> {
        let Some(rack) = self.rack.as_mut() else {
            return Err(AcctError::RackUnavailable("plugin rack missing".to_string()));
        };

        let handle = rack
            .find_and_load(MAJOR_TYPE, &self.backend_type)
            .map_err(|e| {
                error!("can't find a plugin for type {}", self.backend_type);
                e
            })?;

        let resolved = rack.resolve_symbols(&handle, &OPERATION_SYMBOLS);
        let backend = rack.backend(&handle);
        self.handle = Some(handle);

        let Some(backend) = backend else {
            error!("plugin {} vanished after loading", self.backend_type);
            return Err(AcctError::NoMatch {
                plugin_type: self.backend_type.clone(),
            });
        };

        OperationTable::bind(&self.backend_type, backend, &resolved).map_err(|e| {
            if let AcctError::Unresolved {
                resolved, required, ..
            } = &e
            {
                error!(
                    "incomplete jobacct plugin detected only got {} out of {}",
                    resolved, required
                );
            } else {
                error!("{}", e);
            }
            e
        })
    }

    /// Tear the context down.
    ///
    /// The operation table is dropped before the loader is released, so a
    /// loader refusal means someone else still holds the backend.
    pub fn destroy(mut self) -> Result<(), AcctError> {
        self.ops = None;
        let Some(mut rack) = self.rack.take() else {
            return Ok(());
        };
        if let Some(handle) = self.handle.take() {
            rack.release(handle)?;
        }
        rack.destroy()
    }
}
