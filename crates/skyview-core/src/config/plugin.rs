//! Plugin catalog configuration.

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Descriptor records, in registration order.
    #[serde(default)]
    pub catalog: Vec<DescriptorRecord>,
}

/// A plugin descriptor as written in configuration.
///
/// Names are kept as plain strings here; the plugin engine validates hook
/// names and relations when converting records into descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorRecord {
    /// Unique plugin identifier.
    pub id: String,
    /// Name of the registered entry point that builds the plugin.
    pub entry_point: String,
    /// Hook names this plugin subscribes to.
    #[serde(default)]
    pub subscribes: Vec<String>,
    /// Ordering constraints relative to other plugins.
    #[serde(default)]
    pub constraints: Vec<ConstraintRecord>,
    /// Whether activation aborts if this plugin fails.
    #[serde(default)]
    pub required: bool,
    /// Free-form settings handed to the plugin factory.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// An ordering constraint as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRecord {
    /// `"before"` or `"after"`.
    pub relation: String,
    /// The peer plugin id.
    pub target: String,
}
