//! Plugin context: what an entry point receives when creating a plugin.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use skyview_core::config::{HostConfig, PlatformKind};

use super::connector::{CommandReceiver, Connector, DesktopConnector, ServerConnector};
use super::platform::{DesktopPlatform, Platform, ServerPlatform};

/// The platform and connector pair the host runs with.
#[derive(Clone)]
pub struct PluginEnvironment {
    /// Environment capability.
    pub platform: Arc<dyn Platform>,
    /// Command/state capability.
    pub connector: Arc<dyn Connector>,
}

impl PluginEnvironment {
    /// Builds an environment from explicit capabilities.
    pub fn new(platform: Arc<dyn Platform>, connector: Arc<dyn Connector>) -> Self {
        Self {
            platform,
            connector,
        }
    }

    /// Selects the desktop or server variant named by `config.platform`.
    ///
    /// Returns the host's end of the connector command queue alongside.
    pub fn from_config(config: &HostConfig) -> (Self, CommandReceiver) {
        let (platform, connector, receiver): (Arc<dyn Platform>, Arc<dyn Connector>, _) =
            match config.platform {
                PlatformKind::Desktop => {
                    let (connector, receiver) = DesktopConnector::new();
                    (
                        Arc::new(DesktopPlatform::new(config)),
                        Arc::new(connector),
                        receiver,
                    )
                }
                PlatformKind::Server => {
                    let (connector, receiver) = ServerConnector::new();
                    (
                        Arc::new(ServerPlatform::new(config)),
                        Arc::new(connector),
                        receiver,
                    )
                }
            };

        info!(platform = %config.platform, host = %config.name, "Plugin environment selected");
        (Self::new(platform, connector), receiver)
    }
}

impl fmt::Debug for PluginEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEnvironment")
            .field("platform", &self.platform.kind())
            .field("connector", &self.connector.kind())
            .finish()
    }
}

/// Context passed to an entry point when a plugin is instantiated.
#[derive(Clone)]
pub struct PluginContext {
    /// Id of the plugin being created.
    pub plugin_id: String,
    /// Settings from the plugin's descriptor.
    pub settings: serde_json::Map<String, serde_json::Value>,
    /// Environment capability.
    pub platform: Arc<dyn Platform>,
    /// Command/state capability.
    pub connector: Arc<dyn Connector>,
}

impl PluginContext {
    /// Creates the context for `plugin_id`.
    pub fn new(
        plugin_id: impl Into<String>,
        settings: serde_json::Map<String, serde_json::Value>,
        environment: &PluginEnvironment,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            settings,
            platform: Arc::clone(&environment.platform),
            connector: Arc::clone(&environment.connector),
        }
    }

    /// Returns a raw setting.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    /// Returns a string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|value| value.as_str())
    }

    /// Deserializes a setting, falling back to `default` when it is absent.
    pub fn setting_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, String> {
        match self.settings.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| format!("invalid setting '{key}': {e}")),
            None => Ok(default),
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_config_selects_variant() {
        let mut config = HostConfig::default();
        config.platform = PlatformKind::Server;
        let (environment, _receiver) = PluginEnvironment::from_config(&config);
        assert_eq!(environment.platform.kind(), PlatformKind::Server);
        assert_eq!(environment.connector.kind(), PlatformKind::Server);

        let (environment, _receiver) = PluginEnvironment::from_config(&HostConfig::default());
        assert_eq!(environment.platform.kind(), PlatformKind::Desktop);
    }

    #[test]
    fn test_settings_access() {
        let (environment, _receiver) = PluginEnvironment::from_config(&HostConfig::default());
        let mut settings = serde_json::Map::new();
        settings.insert("format".into(), json!("%H:%M"));
        settings.insert("interval".into(), json!("soon"));
        let context = PluginContext::new("clock", settings, &environment);

        assert_eq!(context.setting_str("format"), Some("%H:%M"));
        assert_eq!(context.setting_or("precision", 3u32), Ok(3));
        assert!(context.setting_or::<u64>("interval", 1).is_err());
        assert!(context.setting("missing").is_none());
    }
}
