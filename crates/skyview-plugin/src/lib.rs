//! # skyview-plugin
//!
//! Plugin orchestration engine for Skyview. Provides:
//!
//! - Dependency resolution over `before`/`after` constraints (Kahn's algorithm)
//! - Typed hooks with lazily ordered callback lists and snapshot firing
//! - Plugin lifecycle management (load, activate, unload)
//! - Platform and connector capabilities with desktop and server variants
//! - A closed entry-point catalog for creating plugin instances

pub mod api;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod prelude;
pub mod registrar;
pub mod registry;
pub mod topo;
pub mod traits;

pub use api::context::{PluginContext, PluginEnvironment};
pub use descriptor::{Constraint, PluginDescriptor, Relation};
pub use error::{ActivationError, ConfigurationError, HandlerError, UnloadError};
pub use hooks::definitions::{HookAction, HookPoint, HookSpec};
pub use hooks::hook::{FireReport, Hook, SubscriptionHandle};
pub use hooks::set::Hooks;
pub use loader::EntryPoints;
pub use manager::{ActivateReport, ActivationAborted, LoadReport, PluginManager, UnloadReport};
pub use registrar::HookRegistrar;
pub use registry::{Plugin, PluginMetadata, PluginRegistry, PluginState, PluginSummary};
