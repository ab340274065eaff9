//! Platform capability: environment queries and shell affordances.
//!
//! Plugins see only `dyn Platform`; the host picks the desktop or server
//! variant at startup from configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub use skyview_core::config::PlatformKind;

use skyview_core::config::HostConfig;

/// A user-facing message raised through the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// When the notice was raised.
    pub raised_at: DateTime<Utc>,
}

/// Environment abstraction injected into plugins.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Returns which shell variant this is.
    fn kind(&self) -> PlatformKind;

    /// Returns the host's display name.
    fn host_name(&self) -> &str;

    /// Looks up an environment value.
    fn environment(&self, key: &str) -> Option<String>;

    /// Resolves a path under the resource root.
    fn resource_path(&self, relative: &str) -> PathBuf;

    /// Returns the directory plugins are installed in.
    fn plugin_directory(&self) -> &Path;

    /// Returns whether a user is present to see notices.
    fn is_interactive(&self) -> bool;

    /// Raises a user-facing notice.
    fn notify(&self, title: &str, message: &str);
}

/// Desktop shell: process environment, interactive notices.
#[derive(Debug)]
pub struct DesktopPlatform {
    host_name: String,
    resource_root: PathBuf,
    plugin_directory: PathBuf,
    /// Values that take precedence over the process environment.
    overrides: HashMap<String, String>,
}

impl DesktopPlatform {
    /// Creates the desktop platform from host configuration.
    pub fn new(config: &HostConfig) -> Self {
        Self {
            host_name: config.name.clone(),
            resource_root: PathBuf::from(&config.resource_root),
            plugin_directory: PathBuf::from(&config.plugin_directory),
            overrides: config.environment.clone(),
        }
    }
}

impl Platform for DesktopPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Desktop
    }

    fn host_name(&self) -> &str {
        &self.host_name
    }

    fn environment(&self, key: &str) -> Option<String> {
        self.overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    fn resource_path(&self, relative: &str) -> PathBuf {
        self.resource_root.join(relative)
    }

    fn plugin_directory(&self) -> &Path {
        &self.plugin_directory
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn notify(&self, title: &str, message: &str) {
        info!(platform = "desktop", title = %title, message = %message, "Notice");
    }
}

/// Server shell: configured environment only, notices queued for clients.
#[derive(Debug)]
pub struct ServerPlatform {
    host_name: String,
    session_id: Uuid,
    resource_root: PathBuf,
    plugin_directory: PathBuf,
    environment: HashMap<String, String>,
    notices: Mutex<Vec<Notice>>,
}

impl ServerPlatform {
    /// Creates the server platform from host configuration.
    pub fn new(config: &HostConfig) -> Self {
        Self {
            host_name: config.name.clone(),
            session_id: Uuid::new_v4(),
            resource_root: PathBuf::from(&config.resource_root),
            plugin_directory: PathBuf::from(&config.plugin_directory),
            environment: config.environment.clone(),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Returns the id of this server session.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Drains queued notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *notices)
    }
}

impl Platform for ServerPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Server
    }

    fn host_name(&self) -> &str {
        &self.host_name
    }

    fn environment(&self, key: &str) -> Option<String> {
        self.environment.get(key).cloned()
    }

    fn resource_path(&self, relative: &str) -> PathBuf {
        self.resource_root.join(relative)
    }

    fn plugin_directory(&self) -> &Path {
        &self.plugin_directory
    }

    fn is_interactive(&self) -> bool {
        false
    }

    fn notify(&self, title: &str, message: &str) {
        info!(
            platform = "server",
            session_id = %self.session_id,
            title = %title,
            "Notice queued"
        );
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                title: title.to_string(),
                message: message.to_string(),
                raised_at: Utc::now(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_config() -> HostConfig {
        let mut config = HostConfig::default();
        config.resource_root = "/opt/skyview/resources".into();
        config
            .environment
            .insert("SKYVIEW_TEST_CATALOG".into(), "messier".into());
        config
    }

    #[test]
    fn test_desktop_overrides_win() {
        let platform = DesktopPlatform::new(&host_config());
        assert_eq!(platform.kind(), PlatformKind::Desktop);
        assert_eq!(
            platform.environment("SKYVIEW_TEST_CATALOG").as_deref(),
            Some("messier")
        );
        assert_eq!(
            platform.resource_path("fonts/mono.ttf"),
            PathBuf::from("/opt/skyview/resources/fonts/mono.ttf")
        );
        assert!(platform.is_interactive());
    }

    #[test]
    fn test_server_only_sees_configured_environment() {
        let platform = ServerPlatform::new(&host_config());
        assert_eq!(platform.kind(), PlatformKind::Server);
        assert_eq!(platform.environment("PATH"), None);
        assert_eq!(
            platform.environment("SKYVIEW_TEST_CATALOG").as_deref(),
            Some("messier")
        );
        assert!(!platform.is_interactive());
    }

    #[test]
    fn test_server_queues_notices() {
        let platform = ServerPlatform::new(&host_config());
        platform.notify("Catalog", "messier loaded");
        let notices = platform.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Catalog");
        assert!(platform.take_notices().is_empty());
    }
}
