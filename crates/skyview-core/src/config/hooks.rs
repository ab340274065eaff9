//! Hook failure policy configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-hook overrides of the fatal-on-handler-error policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookPolicyConfig {
    /// Hook name → whether a handler failure aborts the rest of the chain.
    #[serde(default)]
    pub fatal_on_error: HashMap<String, bool>,
}

impl HookPolicyConfig {
    /// Returns the override for `hook`, if one is configured.
    pub fn fatal_override(&self, hook: &str) -> Option<bool> {
        self.fatal_on_error.get(hook).copied()
    }
}
