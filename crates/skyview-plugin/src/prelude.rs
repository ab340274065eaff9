//! Prelude for convenient imports in plugin crates.

pub use async_trait::async_trait;

pub use crate::api::connector::{Connector, ConnectorCommand};
pub use crate::api::context::PluginContext;
pub use crate::api::platform::Platform;
pub use crate::descriptor::{Constraint, PluginDescriptor};
pub use crate::hooks::callbacks::HookHandler;
pub use crate::hooks::definitions::{
    HandlerResult, HookAction, HookPoint, Initialize, InitializeParams, LoadImage,
    LoadImageParams, LoadPlugin, LoadPluginParams, PreRender, PreRenderParams,
};
pub use crate::loader::EntryPoints;
pub use crate::registrar::HookRegistrar;
pub use crate::registry::{Plugin, PluginMetadata};
pub use crate::traits::FnHandler;

pub use crate::plugin_metadata;
