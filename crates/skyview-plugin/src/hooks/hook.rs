//! Hook: a named event channel with a fixed payload type.
//!
//! Firing invokes the subscribed handlers in dependency order, passing the
//! same payload by mutable reference:
//! - `Continue` moves on to the next handler.
//! - `Stop` ends the firing; later handlers do not run.
//! - An error (or a panic) is recorded as a [`HandlerError`]. Best-effort
//!   hooks keep going; fatal-on-error hooks skip the rest of the chain.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::descriptor::Constraint;
use crate::error::{ConfigurationError, HandlerError};

use super::callbacks::{CallbackList, HookHandler};
use super::definitions::{HookAction, HookPoint, HookSpec};

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    /// Hook the subscription belongs to.
    pub hook: HookPoint,
    /// Callback id within that hook.
    pub id: u64,
}

/// Which handler stopped a firing, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopInfo {
    /// Plugin whose handler returned `Stop`.
    pub plugin_id: String,
    /// Reason given by the handler.
    pub reason: String,
}

/// Outcome of one firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireReport {
    /// Hook that was fired.
    pub hook: &'static str,
    /// Plugins whose handlers ran, in invocation order (failed ones included).
    pub invoked: Vec<String>,
    /// Set when a handler stopped propagation.
    pub stopped_by: Option<StopInfo>,
    /// Handler failures, in invocation order.
    pub failures: Vec<HandlerError>,
    /// Whether a failure on a fatal-on-error hook skipped the rest of the chain.
    pub aborted: bool,
}

impl FireReport {
    fn new(hook: &'static str) -> Self {
        Self {
            hook,
            invoked: Vec::new(),
            stopped_by: None,
            failures: Vec::new(),
            aborted: false,
        }
    }

    /// Returns whether every handler that ran succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns whether a handler stopped propagation.
    pub fn was_stopped(&self) -> bool {
        self.stopped_by.is_some()
    }

    /// Converts an aborted firing into its first failure.
    pub fn into_result(self) -> Result<Self, HandlerError> {
        if self.aborted {
            if let Some(first) = self.failures.first() {
                return Err(first.clone());
            }
        }
        Ok(self)
    }
}

/// Event channel for hook `H`, owning its callback list.
pub struct Hook<H: HookSpec> {
    callbacks: CallbackList<H::Payload>,
    fatal_on_error: bool,
    _marker: PhantomData<H>,
}

impl<H: HookSpec> Hook<H> {
    /// Creates a hook with an explicit failure policy.
    pub fn new(fatal_on_error: bool) -> Self {
        Self {
            callbacks: CallbackList::new(),
            fatal_on_error,
            _marker: PhantomData,
        }
    }

    /// Creates a hook with the default policy of its hook point.
    pub fn with_default_policy() -> Self {
        Self::new(H::POINT.default_fatal_on_error())
    }

    /// Returns the hook name.
    pub fn name(&self) -> &'static str {
        H::POINT.as_str()
    }

    /// Returns whether a handler failure aborts the rest of the chain.
    pub fn is_fatal_on_error(&self) -> bool {
        self.fatal_on_error
    }

    /// Subscribes `handler` on behalf of `plugin_id`.
    ///
    /// The new entry is ordered lazily, at the next firing.
    pub async fn subscribe(
        &self,
        plugin_id: &str,
        handler: Arc<dyn HookHandler<H::Payload>>,
        constraints: Vec<Constraint>,
    ) -> SubscriptionHandle {
        let id = self.callbacks.insert(plugin_id, handler, constraints).await;
        info!(hook = %H::POINT, plugin_id = %plugin_id, id, "Hook handler subscribed");
        SubscriptionHandle { hook: H::POINT, id }
    }

    /// Removes one subscription. Returns whether it was present.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        if handle.hook != H::POINT {
            return false;
        }
        self.callbacks.remove(handle.id).await
    }

    /// Removes every subscription of `plugin_id`.
    pub async fn unsubscribe_plugin(&self, plugin_id: &str) -> usize {
        self.callbacks.remove_plugin(plugin_id).await
    }

    /// Returns the number of subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.callbacks.len().await
    }

    /// Returns subscribed plugin ids in the order the next firing will use.
    pub async fn subscribers(&self) -> Result<Vec<String>, ConfigurationError> {
        self.callbacks
            .plugin_ids()
            .await
            .map_err(|cycle| ConfigurationError::Cycle(cycle.nodes))
    }

    pub(crate) async fn set_ranks(&self, ranks: HashMap<String, usize>) {
        self.callbacks.set_ranks(ranks).await;
    }

    /// Fires the hook.
    ///
    /// Fails only if the subscribers' ordering constraints are cyclic; handler
    /// failures are reported in the returned [`FireReport`].
    pub async fn fire(&self, payload: &mut H::Payload) -> Result<FireReport, ConfigurationError> {
        let chain = self.callbacks.snapshot().await.map_err(|cycle| {
            error!(hook = %H::POINT, plugins = ?cycle.nodes, "Subscriber constraints are cyclic");
            ConfigurationError::Cycle(cycle.nodes)
        })?;

        let mut report = FireReport::new(H::POINT.as_str());
        if chain.is_empty() {
            return Ok(report);
        }

        debug!(hook = %H::POINT, handler_count = chain.len(), "Firing hook");

        for callback in chain.iter() {
            let plugin_id = callback.plugin_id.as_str();
            report.invoked.push(plugin_id.to_string());

            let outcome = AssertUnwindSafe(callback.handler.handle(payload))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panic_message("handler", panic)));

            match outcome {
                Ok(HookAction::Continue) => {
                    debug!(hook = %H::POINT, plugin_id = %plugin_id, "Handler returned Continue");
                }
                Ok(HookAction::Stop { reason }) => {
                    info!(
                        hook = %H::POINT,
                        plugin_id = %plugin_id,
                        reason = %reason,
                        "Handler stopped propagation"
                    );
                    report.stopped_by = Some(StopInfo {
                        plugin_id: plugin_id.to_string(),
                        reason,
                    });
                    break;
                }
                Err(message) => {
                    report.failures.push(HandlerError {
                        plugin_id: plugin_id.to_string(),
                        hook: H::POINT.as_str(),
                        message: message.clone(),
                    });
                    if self.fatal_on_error {
                        error!(
                            hook = %H::POINT,
                            plugin_id = %plugin_id,
                            error = %message,
                            "Handler failed on fatal hook, skipping remaining handlers"
                        );
                        report.aborted = true;
                        break;
                    }
                    warn!(
                        hook = %H::POINT,
                        plugin_id = %plugin_id,
                        error = %message,
                        "Handler failed"
                    );
                }
            }
        }

        Ok(report)
    }
}

impl<H: HookSpec> Default for Hook<H> {
    fn default() -> Self {
        Self::with_default_policy()
    }
}

impl<H: HookSpec> fmt::Debug for Hook<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &H::POINT.as_str())
            .field("fatal_on_error", &self.fatal_on_error)
            .finish()
    }
}

/// Renders a caught panic payload as `"<what> panicked: <message>"`.
pub(crate) fn panic_message(what: &str, panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("{what} panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("{what} panicked: {message}")
    } else {
        format!("{what} panicked")
    }
}
