//! Plugin registry: stores plugin records, instances and resolved order.
//!
//! The registry is plain data; the plugin manager guards it with a lock and
//! is the only writer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::PluginDescriptor;
use crate::error::UnloadError;
use crate::hooks::hook::SubscriptionHandle;
use crate::registrar::HookRegistrar;

/// Metadata a plugin reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Human-readable plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    pub description: String,
    /// Author or maintainer.
    pub author: String,
}

impl PluginMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            author: author.into(),
        }
    }
}

/// Trait that all plugins must implement.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Returns plugin metadata.
    fn metadata(&self) -> PluginMetadata;

    /// Declares the plugin's hook subscriptions.
    fn subscribe(&self, registrar: &mut HookRegistrar) -> Result<(), String>;

    /// Called once when the plugin is unloaded, after its handlers are removed.
    async fn shutdown(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Lifecycle state of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PluginState {
    /// Descriptor accepted, not yet instantiated.
    Loaded,
    /// Instance created, subscriptions not yet installed.
    Initialized,
    /// Subscriptions installed.
    Active,
    /// Activation failed.
    Failed(String),
    /// Removed from every hook and released.
    Unloaded,
}

impl PluginState {
    /// Returns whether the plugin still takes part in ordering.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Unloaded)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => f.write_str("loaded"),
            Self::Initialized => f.write_str("initialized"),
            Self::Active => f.write_str("active"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Unloaded => f.write_str("unloaded"),
        }
    }
}

/// Everything the manager knows about one plugin.
pub(crate) struct PluginRecord {
    pub(crate) descriptor: PluginDescriptor,
    pub(crate) state: PluginState,
    pub(crate) instance: Option<Arc<dyn Plugin>>,
    pub(crate) metadata: Option<PluginMetadata>,
    pub(crate) subscriptions: Vec<SubscriptionHandle>,
}

impl PluginRecord {
    fn new(descriptor: PluginDescriptor) -> Self {
        Self {
            descriptor,
            state: PluginState::Loaded,
            instance: None,
            metadata: None,
            subscriptions: Vec::new(),
        }
    }

    fn summary(&self) -> PluginSummary {
        PluginSummary {
            id: self.descriptor.id.clone(),
            entry_point: self.descriptor.entry_point.clone(),
            state: self.state.clone(),
            required: self.descriptor.required,
            metadata: self.metadata.clone(),
            subscriptions: self.subscriptions.len(),
        }
    }
}

/// Read-only view of a plugin record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    /// Plugin id.
    pub id: String,
    /// Entry point the plugin was created from.
    pub entry_point: String,
    /// Current lifecycle state.
    pub state: PluginState,
    /// Whether the plugin is required.
    pub required: bool,
    /// Metadata reported by the instance, once created.
    pub metadata: Option<PluginMetadata>,
    /// Number of installed hook subscriptions.
    pub subscriptions: usize,
}

/// Instance and subscriptions released by an unload.
#[derive(Debug)]
pub(crate) struct Released {
    pub(crate) instance: Option<Arc<dyn Plugin>>,
    pub(crate) subscriptions: Vec<SubscriptionHandle>,
}

/// Registry of every plugin the manager has accepted.
#[derive(Default)]
pub struct PluginRegistry {
    records: HashMap<String, PluginRecord>,
    /// Live plugin ids in resolved dependency order.
    order: Vec<String>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` is loaded and not yet unloaded.
    pub fn is_live(&self, id: &str) -> bool {
        self.records
            .get(id)
            .is_some_and(|record| record.state.is_live())
    }

    /// Returns the live plugin ids in resolved order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Returns the state of `id`.
    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.records.get(id).map(|record| record.state.clone())
    }

    /// Returns the descriptor of `id`.
    pub fn descriptor(&self, id: &str) -> Option<&PluginDescriptor> {
        self.records.get(id).map(|record| &record.descriptor)
    }

    /// Returns live descriptors in resolved order.
    pub fn live_descriptors(&self) -> Vec<&PluginDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| &record.descriptor)
            .collect()
    }

    /// Returns summaries of live plugins in resolved order, followed by unloaded ones.
    pub fn summaries(&self) -> Vec<PluginSummary> {
        let mut summaries: Vec<PluginSummary> = self
            .order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(PluginRecord::summary)
            .collect();

        let mut unloaded: Vec<PluginSummary> = self
            .records
            .values()
            .filter(|record| !record.state.is_live())
            .map(PluginRecord::summary)
            .collect();
        unloaded.sort_by(|a, b| a.id.cmp(&b.id));
        summaries.extend(unloaded);
        summaries
    }

    /// Returns the number of live plugins.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether no plugin is live.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Accepts a validated batch together with the new global order.
    pub(crate) fn commit(&mut self, batch: Vec<PluginDescriptor>, order: Vec<String>) {
        for descriptor in batch {
            self.records
                .insert(descriptor.id.clone(), PluginRecord::new(descriptor));
        }
        self.order = order;
    }

    /// Returns ids still waiting for activation, in resolved order.
    pub(crate) fn pending(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| {
                self.records
                    .get(id.as_str())
                    .is_some_and(|record| record.state == PluginState::Loaded)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&PluginRecord> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut PluginRecord> {
        self.records.get_mut(id)
    }

    /// Marks `id` unloaded and hands back what must be released.
    pub(crate) fn release(&mut self, id: &str) -> Result<Released, UnloadError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| UnloadError::UnknownPlugin(id.to_string()))?;

        if !record.state.is_live() {
            return Err(UnloadError::AlreadyUnloaded(id.to_string()));
        }

        record.state = PluginState::Unloaded;
        let released = Released {
            instance: record.instance.take(),
            subscriptions: std::mem::take(&mut record.subscriptions),
        };
        self.order.retain(|live| live != id);
        Ok(released)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("order", &self.order)
            .field("records", &self.records.len())
            .finish()
    }
}
