//! The environment view handed to plugins during setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

/// Capabilities the embedding host exposes to the core.
pub trait HostEnvironment: Send + Sync {
    /// Eager string-keyed properties, copied once into the [`Environment`].
    fn properties(&self) -> HashMap<String, String>;

    /// Resolves a property on demand; results are cached by the [`Environment`].
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }

    /// Installation root holding `config/`, `plugins/` and `launch-plugins/`.
    fn root(&self) -> &Path;
}

/// A fixed root with a property map.
#[derive(Debug, Clone)]
pub struct StaticHost {
    root: PathBuf,
    properties: HashMap<String, String>,
}

impl StaticHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl HostEnvironment for StaticHost {
    fn properties(&self) -> HashMap<String, String> {
        self.properties.clone()
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Loaded plugin ids plus host properties.
pub struct Environment {
    plugins: Vec<String>,
    properties: HashMap<String, String>,
    resolved: DashMap<String, Option<String>>,
    host: Arc<dyn HostEnvironment>,
}

impl Environment {
    pub fn new(plugins: Vec<String>, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            plugins,
            properties: host.properties(),
            resolved: DashMap::new(),
            host,
        }
    }

    /// Ids of all registered plugins, in discovery order.
    pub fn plugin_ids(&self) -> &[String] {
        &self.plugins
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.iter().any(|p| p == id)
    }

    /// Looks up a host property, falling back to lazy resolution.
    pub fn property(&self, key: &str) -> Option<String> {
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }
        if let Some(cached) = self.resolved.get(key) {
            return cached.clone();
        }
        let value = self.host.resolve(key);
        self.resolved.insert(key.to_string(), value.clone());
        value
    }

    pub fn root(&self) -> &Path {
        self.host.root()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("plugins", &self.plugins)
            .field("properties", &self.properties)
            .field("root", &self.host.root())
            .finish_non_exhaustive()
    }
}
