//! Hook registrar: collects the subscriptions a plugin declares during activation.
//!
//! A plugin never touches the hook set directly. It fills a registrar, and the
//! plugin manager installs the collected subscriptions once the plugin's
//! declarations have been validated against its descriptor.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::descriptor::{Constraint, PluginDescriptor};
use crate::hooks::callbacks::HookHandler;
use crate::hooks::definitions::{HandlerResult, HookPoint, HookSpec};
use crate::hooks::hook::SubscriptionHandle;
use crate::hooks::set::Hooks;
use crate::traits::FnHandler;

/// A subscription waiting to be installed into its hook.
trait PendingSubscription: Send {
    fn hook(&self) -> HookPoint;

    fn install<'a>(
        self: Box<Self>,
        hooks: &'a Hooks,
        plugin_id: &'a str,
        constraints: Vec<Constraint>,
    ) -> BoxFuture<'a, SubscriptionHandle>;
}

struct Pending<H: HookSpec> {
    handler: Arc<dyn HookHandler<H::Payload>>,
    constraints: Vec<Constraint>,
}

impl<H: HookSpec> PendingSubscription for Pending<H> {
    fn hook(&self) -> HookPoint {
        H::POINT
    }

    fn install<'a>(
        self: Box<Self>,
        hooks: &'a Hooks,
        plugin_id: &'a str,
        mut constraints: Vec<Constraint>,
    ) -> BoxFuture<'a, SubscriptionHandle> {
        let Pending {
            handler,
            constraints: own,
        } = *self;
        constraints.extend(own);
        Box::pin(async move {
            hooks
                .get::<H>()
                .subscribe(plugin_id, handler, constraints)
                .await
        })
    }
}

/// Collects hook subscriptions for one plugin.
pub struct HookRegistrar {
    plugin_id: String,
    /// Constraints from the descriptor, applied to every subscription.
    constraints: Vec<Constraint>,
    pending: Vec<Box<dyn PendingSubscription>>,
}

impl HookRegistrar {
    /// Creates a registrar for the plugin described by `descriptor`.
    pub fn new(descriptor: &PluginDescriptor) -> Self {
        Self {
            plugin_id: descriptor.id.clone(),
            constraints: descriptor.constraints.clone(),
            pending: Vec::new(),
        }
    }

    /// Returns the id of the plugin being registered.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Subscribes `handler` to hook `H`.
    pub fn on<H: HookSpec>(&mut self, handler: Arc<dyn HookHandler<H::Payload>>) -> &mut Self {
        self.on_with::<H>(handler, Vec::new())
    }

    /// Subscribes `handler` to hook `H` with extra ordering constraints.
    pub fn on_with<H: HookSpec>(
        &mut self,
        handler: Arc<dyn HookHandler<H::Payload>>,
        constraints: Vec<Constraint>,
    ) -> &mut Self {
        self.pending.push(Box::new(Pending::<H> {
            handler,
            constraints,
        }));
        self
    }

    /// Subscribes a closure to hook `H`.
    pub fn on_fn<H: HookSpec>(
        &mut self,
        handler: impl Fn(&mut H::Payload) -> HandlerResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.on::<H>(FnHandler::wrap(handler))
    }

    /// Returns the hook points subscribed so far, in declaration order.
    pub fn hooks(&self) -> Vec<HookPoint> {
        self.pending.iter().map(|pending| pending.hook()).collect()
    }

    /// Returns the number of pending subscriptions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether nothing was subscribed.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Installs every pending subscription and returns their handles.
    pub(crate) async fn install(self, hooks: &Hooks) -> Vec<SubscriptionHandle> {
        let mut handles = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let handle = pending
                .install(hooks, &self.plugin_id, self.constraints.clone())
                .await;
            handles.push(handle);
        }
        handles
    }
}

impl fmt::Debug for HookRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistrar")
            .field("plugin_id", &self.plugin_id)
            .field("hooks", &self.hooks())
            .finish()
    }
}
