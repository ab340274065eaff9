//! Entry-point catalog: the closed registration mechanism for plugin factories.
//!
//! Concrete plugin types are never enumerated by the engine. The host
//! registers a factory per entry-point name, and descriptors refer to
//! those names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::context::PluginContext;
use crate::registry::Plugin;

/// Creates a plugin instance from its context.
pub type PluginFactory =
    Arc<dyn Fn(&PluginContext) -> Result<Arc<dyn Plugin>, String> + Send + Sync>;

/// Named plugin factories.
#[derive(Clone, Default)]
pub struct EntryPoints {
    factories: HashMap<String, PluginFactory>,
}

impl EntryPoints {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn Plugin>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            warn!(entry_point = %name, "Entry point re-registered, replacing previous factory");
        } else {
            debug!(entry_point = %name, "Entry point registered");
        }
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn Plugin>, String> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Looks up a factory.
    pub fn get(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).cloned()
    }

    /// Returns whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("names", &self.names())
            .finish()
    }
}
