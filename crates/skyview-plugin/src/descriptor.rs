//! Plugin descriptors: the declarative record of a plugin before it is instantiated.

use std::fmt;

use serde::{Deserialize, Serialize};

use skyview_core::config::DescriptorRecord;

use crate::error::ConfigurationError;
use crate::hooks::definitions::HookPoint;

/// Direction of an ordering constraint, seen from the declaring plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The declaring plugin runs before the target.
    Before,
    /// The declaring plugin runs after the target.
    After,
}

impl Relation {
    /// Returns the string name of this relation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }

    /// Parses a relation name (`"before"` / `"after"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            _ => None,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `runs-before` / `runs-after` constraint on a named peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// Direction of the constraint.
    pub relation: Relation,
    /// The peer plugin id.
    pub target: String,
}

impl Constraint {
    /// The declaring plugin runs before `target`.
    pub fn before(target: impl Into<String>) -> Self {
        Self {
            relation: Relation::Before,
            target: target.into(),
        }
    }

    /// The declaring plugin runs after `target`.
    pub fn after(target: impl Into<String>) -> Self {
        Self {
            relation: Relation::After,
            target: target.into(),
        }
    }

    /// Returns the `(earlier, later)` edge this constraint adds for `owner`.
    pub fn edge(&self, owner: &str) -> (String, String) {
        match self.relation {
            Relation::Before => (owner.to_string(), self.target.clone()),
            Relation::After => (self.target.clone(), owner.to_string()),
        }
    }
}

/// Identity, hook interests and ordering constraints of one plugin.
///
/// Immutable once handed to the plugin manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin identifier.
    pub id: String,
    /// Name of the registered entry point that instantiates the plugin.
    pub entry_point: String,
    /// Hooks this plugin is allowed to subscribe to.
    pub subscribes: Vec<HookPoint>,
    /// Ordering constraints relative to other plugins.
    pub constraints: Vec<Constraint>,
    /// Whether a failure of this plugin aborts activation.
    pub required: bool,
    /// Free-form settings handed to the entry point.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl PluginDescriptor {
    /// Creates a descriptor with no subscriptions or constraints.
    pub fn new(id: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entry_point: entry_point.into(),
            subscribes: Vec::new(),
            constraints: Vec::new(),
            required: false,
            settings: serde_json::Map::new(),
        }
    }

    /// Declares interest in a hook.
    pub fn subscribe(mut self, hook: HookPoint) -> Self {
        if !self.subscribes.contains(&hook) {
            self.subscribes.push(hook);
        }
        self
    }

    /// Requires this plugin to run before `target`.
    pub fn run_before(mut self, target: impl Into<String>) -> Self {
        self.constraints.push(Constraint::before(target));
        self
    }

    /// Requires this plugin to run after `target`.
    pub fn run_after(mut self, target: impl Into<String>) -> Self {
        self.constraints.push(Constraint::after(target));
        self
    }

    /// Marks the plugin as required.
    pub fn mark_required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a setting passed to the entry point.
    pub fn with_setting(mut self, key: &str, value: serde_json::Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }

    /// Returns whether the descriptor declares `hook`.
    pub fn declares(&self, hook: HookPoint) -> bool {
        self.subscribes.contains(&hook)
    }

    /// Returns the ordering edges this descriptor contributes.
    pub fn edges(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.constraints.iter().map(move |c| c.edge(&self.id))
    }
}

impl TryFrom<&DescriptorRecord> for PluginDescriptor {
    type Error = ConfigurationError;

    fn try_from(record: &DescriptorRecord) -> Result<Self, Self::Error> {
        let mut descriptor = PluginDescriptor::new(&record.id, &record.entry_point);
        descriptor.required = record.required;
        descriptor.settings = record.settings.clone();

        for name in &record.subscribes {
            let hook =
                HookPoint::from_name(name).ok_or_else(|| ConfigurationError::UnknownHook {
                    plugin: record.id.clone(),
                    hook: name.clone(),
                })?;
            descriptor = descriptor.subscribe(hook);
        }

        for constraint in &record.constraints {
            let relation = Relation::from_name(&constraint.relation).ok_or_else(|| {
                ConfigurationError::UnknownRelation {
                    plugin: record.id.clone(),
                    relation: constraint.relation.clone(),
                }
            })?;
            descriptor.constraints.push(Constraint {
                relation,
                target: constraint.target.clone(),
            });
        }

        Ok(descriptor)
    }
}

/// Converts configuration records into descriptors, preserving order.
pub fn from_records(records: &[DescriptorRecord]) -> Result<Vec<PluginDescriptor>, ConfigurationError> {
    records.iter().map(PluginDescriptor::try_from).collect()
}
