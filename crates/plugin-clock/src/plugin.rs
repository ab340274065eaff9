//! Clock plugin implementation: registers with the Skyview plugin system.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use serde_json::json;

use skyview_plugin::api::PlatformKind;
use skyview_plugin::prelude::*;

use crate::hooks::{InitializeHook, PreRenderHook, READY_STATE_KEY};

/// Entry-point name the host registers this plugin under.
pub const ENTRY_POINT: &str = "clock";

/// Default label format.
const DEFAULT_FORMAT: &str = "%H:%M:%S";

/// State shared between the plugin and its hook handlers.
#[derive(Debug)]
pub struct ClockState {
    /// Id of the plugin instance
    pub plugin_id: String,
    /// strftime-style label format
    pub format: String,
    /// Views narrower than this are not labelled
    pub min_width: u32,
    /// Platform reported at initialization
    platform: OnceLock<PlatformKind>,
    /// Number of labelled renders
    renders: AtomicU64,
}

impl ClockState {
    /// Records the platform the host runs on.
    pub fn mark_ready(&self, platform: PlatformKind) {
        if self.platform.set(platform).is_err() {
            tracing::warn!("Clock '{}' initialized more than once", self.plugin_id);
        }
    }

    /// Returns the platform seen at initialization, if any.
    pub fn platform(&self) -> Option<PlatformKind> {
        self.platform.get().copied()
    }

    /// Counts one labelled render.
    pub fn record_render(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of labelled renders.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

/// Clock overlay plugin for Skyview
#[derive(Debug)]
pub struct ClockPlugin {
    /// State shared with hook handlers
    state: Arc<ClockState>,
    /// Connector used to withdraw readiness on shutdown
    connector: Arc<dyn Connector>,
}

impl ClockPlugin {
    /// Create the plugin from its context.
    ///
    /// Settings: `format` (strftime, default `%H:%M:%S`) and `min_width`
    /// (pixels, default 0).
    pub fn from_context(ctx: &PluginContext) -> Result<Self, String> {
        let format: String = ctx.setting_or("format", DEFAULT_FORMAT.to_string())?;
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid clock format '{format}'"));
        }
        let min_width: u32 = ctx.setting_or("min_width", 0)?;

        Ok(Self {
            state: Arc::new(ClockState {
                plugin_id: ctx.plugin_id.clone(),
                format,
                min_width,
                platform: OnceLock::new(),
                renders: AtomicU64::new(0),
            }),
            connector: Arc::clone(&ctx.connector),
        })
    }

    /// Entry-point factory.
    pub fn factory(ctx: &PluginContext) -> Result<Arc<dyn Plugin>, String> {
        Ok(Arc::new(Self::from_context(ctx)?))
    }

    /// Get the shared state
    pub fn state(&self) -> &Arc<ClockState> {
        &self.state
    }
}

#[async_trait]
impl Plugin for ClockPlugin {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(
            name: "Clock",
            description: "Labels rendered views with the wall-clock time"
        )
    }

    fn subscribe(&self, registrar: &mut HookRegistrar) -> Result<(), String> {
        registrar
            .on::<Initialize>(Arc::new(InitializeHook::new(Arc::clone(&self.state))))
            .on::<PreRender>(Arc::new(PreRenderHook::new(Arc::clone(&self.state))));

        tracing::info!("Clock hooks registered: initialize, pre_render");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), String> {
        tracing::info!(
            "Shutting down clock '{}' after {} labelled renders",
            self.state.plugin_id,
            self.state.renders()
        );
        self.connector.report_state(READY_STATE_KEY, json!(null));
        Ok(())
    }
}
