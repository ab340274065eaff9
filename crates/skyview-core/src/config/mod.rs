//! Application configuration schemas.
//!
//! All configuration structs are deserialized from a TOML file via the
//! `config` crate, overlaid with `SKYVIEW__`-prefixed environment variables.
//! Each sub-module represents a logical configuration section.

pub mod hooks;
pub mod host;
pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

pub use self::hooks::HookPolicyConfig;
pub use self::host::{HostConfig, PlatformKind};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::plugin::{ConstraintRecord, DescriptorRecord, PluginConfig};

use crate::error::AppError;
use crate::result::AppResult;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host shell settings.
    #[serde(default)]
    pub host: HostConfig,
    /// Plugin catalog.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Hook failure policy overrides.
    #[serde(default)]
    pub hooks: HookPolicyConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file is optional; every section has defaults. Environment
    /// variables prefixed with `SKYVIEW__` override file values
    /// (e.g. `SKYVIEW__HOST__PLATFORM=server`).
    pub fn load(path: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SKYVIEW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        tracing::debug!(
            path = %path,
            platform = %parsed.host.platform,
            plugins = parsed.plugins.catalog.len(),
            "Configuration loaded"
        );

        Ok(parsed)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(source: &str) -> AppResult<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.host.platform, PlatformKind::Desktop);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.plugins.catalog.is_empty());
        assert!(config.hooks.fatal_override("initialize").is_none());
    }

    #[test]
    fn test_catalog_and_overrides_parse() {
        let config = AppConfig::from_toml_str(
            r#"
            [host]
            platform = "server"
            startup_images = ["m31.png"]

            [logging]
            format = "json"

            [hooks.fatal_on_error]
            pre_render = true

            [[plugins.catalog]]
            id = "clock"
            entry_point = "clock"
            subscribes = ["initialize", "pre_render"]
            constraints = [{ relation = "after", target = "loader" }]

            [plugins.catalog.settings]
            format = "%H:%M"

            [[plugins.catalog]]
            id = "loader"
            entry_point = "image-loader"
            required = true
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);

        assert_eq!(config.host.platform, PlatformKind::Server);
        assert_eq!(config.host.startup_images, vec!["m31.png".to_string()]);
        assert_eq!(config.hooks.fatal_override("pre_render"), Some(true));

        let catalog = &config.plugins.catalog;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].subscribes, vec!["initialize", "pre_render"]);
        assert_eq!(catalog[0].constraints[0].relation, "after");
        assert_eq!(catalog[0].constraints[0].target, "loader");
        assert_eq!(
            catalog[0].settings.get("format").and_then(|v| v.as_str()),
            Some("%H:%M")
        );
        assert!(!catalog[0].required);
        assert!(catalog[1].required);
    }
}
