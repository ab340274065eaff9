//! Hook implementations for the clock plugin.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use serde_json::json;

use skyview_plugin::prelude::*;

use crate::plugin::ClockState;

/// State key reported through the connector once the clock is running.
pub const READY_STATE_KEY: &str = "clock.ready";

/// Hook handler for initialize: announce readiness
pub struct InitializeHook {
    /// Shared plugin state
    state: Arc<ClockState>,
}

impl InitializeHook {
    /// Create a new initialize hook handler
    pub fn new(state: Arc<ClockState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HookHandler<InitializeParams> for InitializeHook {
    async fn handle(&self, params: &mut InitializeParams) -> HandlerResult {
        let platform = params.platform.kind();

        tracing::info!(
            "Clock initialized on {} platform for host '{}'",
            platform,
            params.host_name
        );

        self.state.mark_ready(platform);
        params.connector.report_state(
            READY_STATE_KEY,
            json!({
                "plugin": self.state.plugin_id,
                "platform": platform.as_str(),
                "format": self.state.format,
            }),
        );

        Ok(HookAction::Continue)
    }
}

/// Hook handler for pre_render: annotate the view with the time
pub struct PreRenderHook {
    /// Shared plugin state
    state: Arc<ClockState>,
}

impl PreRenderHook {
    /// Create a new pre_render hook handler
    pub fn new(state: Arc<ClockState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HookHandler<PreRenderParams> for PreRenderHook {
    async fn handle(&self, params: &mut PreRenderParams) -> HandlerResult {
        if params.width < self.state.min_width {
            tracing::debug!(
                "Clock skipped on view '{}' ({}px wide)",
                params.view,
                params.width
            );
            return Ok(HookAction::Continue);
        }

        let label = Local::now().format(&self.state.format).to_string();
        params.annotate(&self.state.plugin_id, label);
        self.state.record_render();

        Ok(HookAction::Continue)
    }
}
