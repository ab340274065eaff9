//! Host shell configuration.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which shell hosts the plugin engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// Single-user desktop application.
    #[default]
    Desktop,
    /// Headless server serving remote viewers.
    Server,
}

impl PlatformKind {
    /// Returns the string name of this platform kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Shell variant selected at startup.
    #[serde(default)]
    pub platform: PlatformKind,
    /// Display name of this host instance.
    #[serde(default = "default_name")]
    pub name: String,
    /// Root directory for bundled resources (colormaps, fonts, icons).
    #[serde(default = "default_resource_root")]
    pub resource_root: String,
    /// Directory scanned for plugin assets.
    #[serde(default = "default_plugin_directory")]
    pub plugin_directory: String,
    /// Static environment entries exposed to plugins.
    ///
    /// The server platform answers environment queries from this map only;
    /// the desktop platform consults it before the process environment.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Images requested through the `load_image` hook right after startup.
    #[serde(default)]
    pub startup_images: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::default(),
            name: default_name(),
            resource_root: default_resource_root(),
            plugin_directory: default_plugin_directory(),
            environment: HashMap::new(),
            startup_images: Vec::new(),
        }
    }
}

fn default_name() -> String {
    "skyview".to_string()
}

fn default_resource_root() -> String {
    "./resources".to_string()
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}
