//! Plugin rack
//!
//! Loader restricted to one major plugin type. In `Static` discovery every
//! registered backend is available. In `Directory` discovery a backend is
//! only available once a plugin file for it is installed on the search path:
//! an entry whose file stem is `<major>_<name>` (e.g. `jobacct_log.so`)
//! installs plugin type `<major>/<name>`, which is then bound to the
//! compiled-in factory of the same type.

use super::{BackendRegistry, PluginHandle, PluginLoader, RackFactory, SharedBackend};
use crate::contract::{split_plugin_type, Operation};
use crate::error::AcctError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// How the rack learns which plugins are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discovery {
    /// Every registered backend is installed
    #[default]
    Static,
    /// Backends must also have a plugin file on the search path
    Directory,
}

/// One plugin known to the rack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPlugin {
    pub plugin_type: String,
    /// Plugin file, or `None` for statically installed backends
    pub path: Option<PathBuf>,
    /// Whether a compiled-in implementation exists
    pub available: bool,
}

struct LoadedPlugin<R> {
    plugin_type: String,
    backend: SharedBackend<R>,
}

impl<R> LoadedPlugin<R> {
    /// Fails while anyone besides the rack still holds the backend
    fn ensure_unreferenced(&self) -> Result<(), AcctError> {
        let references = Arc::strong_count(&self.backend);
        if references > 1 {
            return Err(AcctError::PluginsActive {
                plugin_type: self.plugin_type.clone(),
                references: references - 1,
            });
        }
        Ok(())
    }
}

/// Loader for one major plugin type
pub struct PluginRack<R> {
    major_type: String,
    registry: BackendRegistry<R>,
    installed: BTreeMap<String, Option<PathBuf>>,
    loaded: Vec<Option<LoadedPlugin<R>>>,
}

impl<R: Send + 'static> PluginRack<R> {
    /// Create an empty rack for `major_type`
    pub fn new(major_type: &str, registry: BackendRegistry<R>) -> Self {
        Self {
            major_type: major_type.to_string(),
            registry,
            installed: BTreeMap::new(),
            loaded: Vec::new(),
        }
    }

    /// Create a rack where every registered backend of the major type is installed
    pub fn with_static_plugins(major_type: &str, registry: BackendRegistry<R>) -> Self {
        let mut rack = Self::new(major_type, registry);
        for plugin_type in rack.registry.plugin_types() {
            if rack.accepts(&plugin_type) {
                rack.installed.insert(plugin_type, None);
            }
        }
        rack
    }

    /// Factory producing racks for the given discovery mode
    pub fn factory(
        major_type: &str,
        registry: BackendRegistry<R>,
        discovery: Discovery,
    ) -> RackFactory<R> {
        let major_type = major_type.to_string();
        Arc::new(move |search_path: &str| -> Result<Box<dyn PluginLoader<R>>, AcctError> {
            Ok(Box::new(Self::discover(
                &major_type,
                registry.clone(),
                discovery,
                search_path,
            )))
        })
    }

    /// Rack populated according to `discovery`
    pub fn discover(
        major_type: &str,
        registry: BackendRegistry<R>,
        discovery: Discovery,
        search_path: &str,
    ) -> Self {
        match discovery {
            Discovery::Static => Self::with_static_plugins(major_type, registry),
            Discovery::Directory => {
                let mut rack = Self::new(major_type, registry);
                rack.read_search_path(search_path);
                rack
            }
        }
    }

    pub fn major_type(&self) -> &str {
        &self.major_type
    }

    /// Read every directory of a colon-separated search path.
    ///
    /// Returns the number of plugins found.
    pub fn read_search_path(&mut self, search_path: &str) -> usize {
        search_path
            .split(':')
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(|dir| self.read_dir(Path::new(dir)))
            .sum()
    }

    /// Scan one directory for plugin files of this rack's major type.
    ///
    /// Unreadable directories are skipped. Returns the number of plugins found.
    pub fn read_dir(&mut self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping plugin directory");
                return 0;
            }
        };

        let prefix = format!("{}_", self.major_type);
        let mut found = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(name) = stem.strip_prefix(&prefix) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let plugin_type = format!("{}/{}", self.major_type, name);
            // First directory on the search path wins.
            if !self.installed.contains_key(&plugin_type) {
                debug!(plugin_type = %plugin_type, path = %path.display(), "found plugin");
                self.installed.insert(plugin_type, Some(path));
                found += 1;
            }
        }
        found
    }

    /// Every plugin the rack knows about
    pub fn list(&self) -> Vec<InstalledPlugin> {
        self.installed
            .iter()
            .map(|(plugin_type, path)| InstalledPlugin {
                plugin_type: plugin_type.clone(),
                path: path.clone(),
                available: self.registry.contains(plugin_type),
            })
            .collect()
    }

    pub fn is_installed(&self, plugin_type: &str) -> bool {
        self.installed.contains_key(plugin_type)
    }

    /// Load a plugin by type, reusing an already loaded instance
    pub fn use_by_type(&mut self, plugin_type: &str) -> Result<PluginHandle, AcctError> {
        let no_match = || AcctError::NoMatch {
            plugin_type: plugin_type.to_string(),
        };

        if !self.accepts(plugin_type) || !self.is_installed(plugin_type) {
            return Err(no_match());
        }

        if let Some(slot) = self
            .loaded
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.plugin_type == plugin_type))
        {
            return Ok(PluginHandle::new(slot, plugin_type));
        }

        let Some(factory) = self.registry.get(plugin_type) else {
            debug!(plugin_type, "plugin installed but no implementation is compiled in");
            return Err(no_match());
        };

        let backend = factory();
        if backend.plugin_type() != plugin_type {
            warn!(
                plugin_type,
                reported = backend.plugin_type(),
                "plugin reports a different type than it was registered under"
            );
            return Err(no_match());
        }

        let slot = self.loaded.len();
        self.loaded.push(Some(LoadedPlugin {
            plugin_type: plugin_type.to_string(),
            backend,
        }));
        Ok(PluginHandle::new(slot, plugin_type))
    }

    /// Number of plugins currently loaded
    pub fn loaded_count(&self) -> usize {
        self.loaded.iter().filter(|p| p.is_some()).count()
    }

    fn accepts(&self, plugin_type: &str) -> bool {
        split_plugin_type(plugin_type).is_some_and(|(major, _)| major == self.major_type)
    }

    fn loaded(&self, handle: &PluginHandle) -> Option<&LoadedPlugin<R>> {
        self.loaded
            .get(handle.slot())
            .and_then(Option::as_ref)
            .filter(|p| p.plugin_type == handle.plugin_type())
    }
}

impl<R: Send + 'static> PluginLoader<R> for PluginRack<R> {
    fn find_and_load(
        &mut self,
        major_type: &str,
        plugin_type: &str,
    ) -> Result<PluginHandle, AcctError> {
        if major_type != self.major_type {
            return Err(AcctError::NoMatch {
                plugin_type: plugin_type.to_string(),
            });
        }
        self.use_by_type(plugin_type)
    }

    fn resolve_symbols(&self, handle: &PluginHandle, names: &[&str]) -> Vec<Option<Operation>> {
        let exports = self
            .loaded(handle)
            .map(|p| p.backend.exports())
            .unwrap_or_default();
        names
            .iter()
            .map(|name| Operation::from_symbol(name).filter(|op| exports.contains(op)))
            .collect()
    }

    fn backend(&self, handle: &PluginHandle) -> Option<SharedBackend<R>> {
        self.loaded(handle).map(|p| Arc::clone(&p.backend))
    }

    fn release(&mut self, handle: PluginHandle) -> Result<(), AcctError> {
        let Some(plugin) = self.loaded(&handle) else {
            return Err(AcctError::NoMatch {
                plugin_type: handle.plugin_type().to_string(),
            });
        };
        plugin.ensure_unreferenced()?;
        self.loaded[handle.slot()] = None;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), AcctError> {
        for plugin in self.loaded.iter().flatten() {
            plugin.ensure_unreferenced()?;
        }
        self.loaded.clear();
        Ok(())
    }
}
