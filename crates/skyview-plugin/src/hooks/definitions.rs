//! Hook point definitions with typed payloads.
//!
//! Each concrete hook is a zero-sized marker implementing [`HookSpec`], which
//! fixes its payload type and name. The generic [`Hook`] channel is reused by
//! every marker.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::api::connector::Connector;
use crate::api::context::PluginEnvironment;
use crate::api::platform::Platform;
use crate::descriptor::PluginDescriptor;

use super::hook::Hook;
use super::set::Hooks;

/// Enumeration of all hook points in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Fired once after activation, carrying the platform and connector.
    Initialize,
    /// Fired before each plugin is instantiated during activation.
    LoadPlugin,
    /// Fired when the host is asked to open an image.
    LoadImage,
    /// Fired before a view is rendered.
    PreRender,
}

impl HookPoint {
    /// Every hook point, in declaration order.
    pub const ALL: [HookPoint; 4] = [
        Self::Initialize,
        Self::LoadPlugin,
        Self::LoadImage,
        Self::PreRender,
    ];

    /// Returns the string name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::LoadPlugin => "load_plugin",
            Self::LoadImage => "load_image",
            Self::PreRender => "pre_render",
        }
    }

    /// Parses a hook name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }

    /// Whether a handler failure aborts the rest of the chain by default.
    ///
    /// Only initialization is failure-sensitive; the other hooks are
    /// best-effort.
    pub fn default_fatal_on_error(&self) -> bool {
        matches!(self, Self::Initialize)
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ties a hook marker to its payload type and its slot in [`Hooks`].
pub trait HookSpec: Send + Sync + Sized + 'static {
    /// The value passed by mutable reference through the handler chain.
    type Payload: Send + 'static;

    /// The hook point this marker stands for.
    const POINT: HookPoint;

    /// Returns this hook's channel within the hook set.
    fn select(hooks: &Hooks) -> &Hook<Self>;
}

/// What a handler wants the firing to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookAction {
    /// Continue to the next handler.
    Continue,
    /// Stop propagation; no later handler runs in this firing.
    Stop {
        /// Reason for stopping.
        reason: String,
    },
}

impl HookAction {
    /// Creates a stop action.
    pub fn stop(reason: impl Into<String>) -> Self {
        Self::Stop {
            reason: reason.into(),
        }
    }
}

/// Result returned by a hook handler.
pub type HandlerResult = Result<HookAction, String>;

// ── Initialize ──

/// Marker for the `initialize` hook.
#[derive(Debug, Clone, Copy)]
pub struct Initialize;

/// Payload of the `initialize` hook.
#[derive(Debug, Clone)]
pub struct InitializeParams {
    /// Display name of the host.
    pub host_name: String,
    /// Environment capability of the running shell.
    pub platform: Arc<dyn Platform>,
    /// Command/state capability of the running shell.
    pub connector: Arc<dyn Connector>,
}

impl InitializeParams {
    /// Creates the payload from the host's environment.
    pub fn new(host_name: impl Into<String>, environment: &PluginEnvironment) -> Self {
        Self {
            host_name: host_name.into(),
            platform: Arc::clone(&environment.platform),
            connector: Arc::clone(&environment.connector),
        }
    }
}

impl HookSpec for Initialize {
    type Payload = InitializeParams;
    const POINT: HookPoint = HookPoint::Initialize;

    fn select(hooks: &Hooks) -> &Hook<Self> {
        &hooks.initialize
    }
}

// ── LoadPlugin ──

/// Marker for the `load_plugin` hook.
#[derive(Debug, Clone, Copy)]
pub struct LoadPlugin;

/// Payload of the `load_plugin` hook.
#[derive(Debug, Clone)]
pub struct LoadPluginParams {
    /// Descriptor of the plugin being activated.
    pub descriptor: PluginDescriptor,
}

impl LoadPluginParams {
    /// Creates a payload for `descriptor`.
    pub fn new(descriptor: PluginDescriptor) -> Self {
        Self { descriptor }
    }
}

impl HookSpec for LoadPlugin {
    type Payload = LoadPluginParams;
    const POINT: HookPoint = HookPoint::LoadPlugin;

    fn select(hooks: &Hooks) -> &Hook<Self> {
        &hooks.load_plugin
    }
}

// ── LoadImage ──

/// Marker for the `load_image` hook.
#[derive(Debug, Clone, Copy)]
pub struct LoadImage;

/// Payload of the `load_image` hook.
///
/// The caller owns the image bytes; handlers borrow them through the
/// reference-counted [`Bytes`] buffer.
#[derive(Debug, Clone, Default)]
pub struct LoadImageParams {
    /// Where the image comes from (path or URL).
    pub location: String,
    /// Raw image data, when the caller already has it in memory.
    pub data: Option<Bytes>,
    /// Plugin that took ownership of the request.
    pub claimed_by: Option<String>,
    /// Detected format name.
    pub format: Option<String>,
    /// Detected `(width, height)`.
    pub dimensions: Option<(u32, u32)>,
    /// Additional key/value facts recorded by handlers.
    pub metadata: HashMap<String, String>,
}

impl LoadImageParams {
    /// Creates a request for the image at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Attaches in-memory image data.
    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    /// Records that `plugin_id` owns this request.
    ///
    /// Returns `false` if another plugin already claimed it.
    pub fn claim(&mut self, plugin_id: &str) -> bool {
        match &self.claimed_by {
            Some(owner) => owner == plugin_id,
            None => {
                self.claimed_by = Some(plugin_id.to_string());
                true
            }
        }
    }

    /// Returns whether any plugin claimed the request.
    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }
}

impl HookSpec for LoadImage {
    type Payload = LoadImageParams;
    const POINT: HookPoint = HookPoint::LoadImage;

    fn select(hooks: &Hooks) -> &Hook<Self> {
        &hooks.load_image
    }
}

// ── PreRender ──

/// Marker for the `pre_render` hook.
#[derive(Debug, Clone, Copy)]
pub struct PreRender;

/// A text label a plugin wants drawn over the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Plugin that added the label.
    pub plugin_id: String,
    /// Label text.
    pub text: String,
}

/// Payload of the `pre_render` hook: render target state handlers may annotate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreRenderParams {
    /// Name of the view about to be rendered.
    pub view: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Labels added by handlers, in handler order.
    pub annotations: Vec<Annotation>,
}

impl PreRenderParams {
    /// Creates the payload for a view of the given size.
    pub fn new(view: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            view: view.into(),
            width,
            height,
            annotations: Vec::new(),
        }
    }

    /// Adds a label on behalf of `plugin_id`.
    pub fn annotate(&mut self, plugin_id: &str, text: impl Into<String>) {
        self.annotations.push(Annotation {
            plugin_id: plugin_id.to_string(),
            text: text.into(),
        });
    }
}

impl HookSpec for PreRender {
    type Payload = PreRenderParams;
    const POINT: HookPoint = HookPoint::PreRender;

    fn select(hooks: &Hooks) -> &Hook<Self> {
        &hooks.pre_render
    }
}
