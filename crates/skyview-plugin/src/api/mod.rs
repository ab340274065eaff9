//! Plugin API: capabilities exposed to plugin code.

pub mod connector;
pub mod context;
pub mod platform;

pub use connector::{CommandReceiver, Connector, ConnectorCommand, DesktopConnector, ServerConnector, StateChange};
pub use context::{PluginContext, PluginEnvironment};
pub use platform::{DesktopPlatform, Notice, Platform, PlatformKind, ServerPlatform};
