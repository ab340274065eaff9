//! Hook system: typed hook definitions, callback lists, and the hook set.

pub mod callbacks;
pub mod definitions;
pub mod hook;
pub mod set;

pub use callbacks::{CallbackList, HookHandler};
pub use definitions::{
    HandlerResult, HookAction, HookPoint, HookSpec, Initialize, InitializeParams, LoadImage,
    LoadImageParams, LoadPlugin, LoadPluginParams, PreRender, PreRenderParams,
};
pub use hook::{FireReport, Hook, StopInfo, SubscriptionHandle};
pub use set::Hooks;
