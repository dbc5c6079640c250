//! Plugin loading
//!
//! A plugin loader finds the backend for a plugin type, reports which contract
//! operations it exports, and releases it again. `PluginRack` is the loader
//! shipped with the crate; anything implementing [`PluginLoader`] can replace
//! it (e.g. an adapter over shared-library loading).

use crate::backend::AccountingBackend;
use crate::contract::Operation;
use crate::error::AcctError;
use std::sync::Arc;

pub mod rack;
pub mod registry;

pub use rack::{InstalledPlugin, PluginRack};
pub use registry::{BackendFactory, BackendRegistry};

/// Backend shared between a loader and the context that binds it
pub type SharedBackend<R> = Arc<dyn AccountingBackend<Record = R>>;

/// Builds a loader for a plugin search path
pub type RackFactory<R> =
    Arc<dyn Fn(&str) -> Result<Box<dyn PluginLoader<R>>, AcctError> + Send + Sync>;

/// Opaque reference to a plugin loaded by a [`PluginLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHandle {
    slot: usize,
    plugin_type: String,
}

impl PluginHandle {
    pub fn new(slot: usize, plugin_type: impl Into<String>) -> Self {
        Self {
            slot,
            plugin_type: plugin_type.into(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn plugin_type(&self) -> &str {
        &self.plugin_type
    }
}

/// Capability used by the backend context to discover and bind backends
pub trait PluginLoader<R>: Send {
    /// Load the plugin of `plugin_type` within `major_type`
    fn find_and_load(&mut self, major_type: &str, plugin_type: &str)
        -> Result<PluginHandle, AcctError>;

    /// Resolve each name, in order, to the operation the plugin exports for it
    fn resolve_symbols(&self, handle: &PluginHandle, names: &[&str]) -> Vec<Option<Operation>>;

    /// Backend behind a handle
    fn backend(&self, handle: &PluginHandle) -> Option<SharedBackend<R>>;

    /// Drop the loader's reference to a plugin
    fn release(&mut self, handle: PluginHandle) -> Result<(), AcctError>;

    /// Unload everything; fails while a loaded plugin is still referenced elsewhere
    fn destroy(&mut self) -> Result<(), AcctError>;
}
