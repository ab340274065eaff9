//! The host's hook set: one channel per hook point.
//!
//! Created once at host startup and shared (behind an `Arc`) with the plugin
//! manager and every call site that fires hooks.

use std::collections::HashMap;

use tracing::info;

use skyview_core::config::HookPolicyConfig;

use crate::error::ConfigurationError;

use super::definitions::{HookPoint, HookSpec, Initialize, LoadImage, LoadPlugin, PreRender};
use super::hook::{FireReport, Hook, SubscriptionHandle};

/// All hooks of the host.
#[derive(Debug)]
pub struct Hooks {
    pub(crate) initialize: Hook<Initialize>,
    pub(crate) load_plugin: Hook<LoadPlugin>,
    pub(crate) load_image: Hook<LoadImage>,
    pub(crate) pre_render: Hook<PreRender>,
}

impl Hooks {
    /// Creates the hook set with each hook's default failure policy.
    pub fn new() -> Self {
        Self::with_policy(&HookPolicyConfig::default())
    }

    /// Creates the hook set, applying configured policy overrides.
    pub fn with_policy(policy: &HookPolicyConfig) -> Self {
        let fatal = |point: HookPoint| {
            policy
                .fatal_override(point.as_str())
                .unwrap_or_else(|| point.default_fatal_on_error())
        };

        let hooks = Self {
            initialize: Hook::new(fatal(HookPoint::Initialize)),
            load_plugin: Hook::new(fatal(HookPoint::LoadPlugin)),
            load_image: Hook::new(fatal(HookPoint::LoadImage)),
            pre_render: Hook::new(fatal(HookPoint::PreRender)),
        };

        info!(
            initialize = hooks.initialize.is_fatal_on_error(),
            load_plugin = hooks.load_plugin.is_fatal_on_error(),
            load_image = hooks.load_image.is_fatal_on_error(),
            pre_render = hooks.pre_render.is_fatal_on_error(),
            "Hook set created (fatal-on-error policy)"
        );

        hooks
    }

    /// Returns the channel of hook `H`.
    pub fn get<H: HookSpec>(&self) -> &Hook<H> {
        H::select(self)
    }

    /// Fires hook `H` with `payload`.
    pub async fn fire<H: HookSpec>(
        &self,
        payload: &mut H::Payload,
    ) -> Result<FireReport, ConfigurationError> {
        self.get::<H>().fire(payload).await
    }

    /// Removes one subscription from whichever hook owns it.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        match handle.hook {
            HookPoint::Initialize => self.initialize.unsubscribe(handle).await,
            HookPoint::LoadPlugin => self.load_plugin.unsubscribe(handle).await,
            HookPoint::LoadImage => self.load_image.unsubscribe(handle).await,
            HookPoint::PreRender => self.pre_render.unsubscribe(handle).await,
        }
    }

    /// Returns how many subscriptions a hook point has.
    pub async fn subscriber_count(&self, point: HookPoint) -> usize {
        match point {
            HookPoint::Initialize => self.initialize.subscriber_count().await,
            HookPoint::LoadPlugin => self.load_plugin.subscriber_count().await,
            HookPoint::LoadImage => self.load_image.subscriber_count().await,
            HookPoint::PreRender => self.pre_render.subscriber_count().await,
        }
    }

    /// Returns a hook point's subscribers in the order its next firing uses.
    ///
    /// Fails with [`ConfigurationError::Cycle`] when the subscribers'
    /// constraints cannot be ordered.
    pub async fn subscribers(&self, point: HookPoint) -> Result<Vec<String>, ConfigurationError> {
        match point {
            HookPoint::Initialize => self.initialize.subscribers().await,
            HookPoint::LoadPlugin => self.load_plugin.subscribers().await,
            HookPoint::LoadImage => self.load_image.subscribers().await,
            HookPoint::PreRender => self.pre_render.subscribers().await,
        }
    }

    /// Installs a new global dependency order as every hook's tie-break key.
    pub(crate) async fn apply_order(&self, order: &[String]) {
        let ranks: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();

        self.initialize.set_ranks(ranks.clone()).await;
        self.load_plugin.set_ranks(ranks.clone()).await;
        self.load_image.set_ranks(ranks.clone()).await;
        self.pre_render.set_ranks(ranks).await;
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}
