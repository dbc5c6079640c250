//! Backend registry: compiled-in backends keyed by plugin type.

use super::SharedBackend;
use crate::backend::{AccountingBackend, LogBackend, NoneBackend};
use crate::record::JobAcctInfo;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates a fresh backend instance
pub type BackendFactory<R> = Arc<dyn Fn() -> SharedBackend<R> + Send + Sync>;

/// Registry of backend factories
pub struct BackendRegistry<R> {
    factories: BTreeMap<String, BackendFactory<R>>,
}

impl<R: Send + 'static> BackendRegistry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory. Replaces any previous factory for the same type.
    pub fn register(&mut self, plugin_type: &str, factory: BackendFactory<R>) {
        self.factories.insert(plugin_type.to_string(), factory);
    }

    /// Register a backend constructor
    pub fn register_backend<B, F>(&mut self, plugin_type: &str, make: F)
    where
        B: AccountingBackend<Record = R> + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let factory: BackendFactory<R> = Arc::new(move || Arc::new(make()) as SharedBackend<R>);
        self.register(plugin_type, factory);
    }

    /// Remove a factory. Returns true if one was registered.
    pub fn unregister(&mut self, plugin_type: &str) -> bool {
        self.factories.remove(plugin_type).is_some()
    }

    pub fn get(&self, plugin_type: &str) -> Option<BackendFactory<R>> {
        self.factories.get(plugin_type).cloned()
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.factories.contains_key(plugin_type)
    }

    /// Registered plugin types, sorted
    pub fn plugin_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl BackendRegistry<JobAcctInfo> {
    /// Registry holding the backends shipped with this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_backend(crate::backend::none::PLUGIN_TYPE, NoneBackend::new);
        registry.register_backend(crate::backend::log::PLUGIN_TYPE, LogBackend::new);
        registry
    }
}

impl<R: Send + 'static> Default for BackendRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for BackendRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}
