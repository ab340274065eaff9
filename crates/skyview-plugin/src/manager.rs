//! Plugin manager: lifecycle management for all plugins.
//!
//! `load` accepts descriptor batches and computes the global dependency order,
//! `activate` instantiates pending plugins in that order and installs their
//! hook subscriptions, and `unload` removes a plugin from every hook before
//! releasing it.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use skyview_core::config::DescriptorRecord;
use skyview_core::error::{AppError, ErrorKind};

use crate::api::context::{PluginContext, PluginEnvironment};
use crate::descriptor::{self, PluginDescriptor};
use crate::error::{ActivationError, ConfigurationError, HandlerError, UnloadError};
use crate::hooks::definitions::{HookPoint, LoadPlugin, LoadPluginParams};
use crate::hooks::hook::{SubscriptionHandle, panic_message};
use crate::hooks::set::Hooks;
use crate::loader::EntryPoints;
use crate::registrar::HookRegistrar;
use crate::registry::{Plugin, PluginRegistry, PluginState, PluginSummary};
use crate::topo::DependencyGraph;

/// Outcome of a successful `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Ids accepted from this batch, in resolved order.
    pub loaded: Vec<String>,
    /// The full global order after the batch was merged.
    pub order: Vec<String>,
}

/// Outcome of an `activate` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Plugins that became active, in activation order.
    pub activated: Vec<String>,
    /// Plugins that failed, with the reason.
    pub failed: Vec<ActivationError>,
    /// Plugins left pending because a required plugin aborted the pass.
    pub skipped: Vec<String>,
    /// Failures of `load_plugin` observers during the pass.
    pub observer_failures: Vec<HandlerError>,
}

impl ActivateReport {
    /// Returns whether every pending plugin became active.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// A required plugin failed, aborting activation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("activation aborted by required plugin: {cause}")]
pub struct ActivationAborted {
    /// The failure of the required plugin.
    pub cause: ActivationError,
    /// What happened up to the abort.
    pub report: ActivateReport,
}

impl From<ActivationAborted> for AppError {
    fn from(err: ActivationAborted) -> Self {
        AppError::with_source(ErrorKind::Activation, err.to_string(), err)
    }
}

/// Outcome of unloading one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnloadReport {
    /// The plugin that was unloaded.
    pub plugin_id: String,
    /// Number of hook subscriptions removed.
    pub removed_subscriptions: usize,
    /// Error returned (or panic raised) by the plugin's `shutdown`.
    pub shutdown_error: Option<String>,
}

/// Manages the full lifecycle of plugins: load, activate, unload.
#[derive(Debug)]
pub struct PluginManager {
    /// Hook set shared with every call site that fires hooks.
    hooks: Arc<Hooks>,
    /// Factories descriptors refer to by name.
    entry_points: EntryPoints,
    /// Platform and connector handed to each plugin.
    environment: PluginEnvironment,
    /// Plugin records and the resolved order.
    registry: RwLock<PluginRegistry>,
}

impl PluginManager {
    /// Creates a manager over an existing hook set.
    pub fn new(hooks: Arc<Hooks>, entry_points: EntryPoints, environment: PluginEnvironment) -> Self {
        info!(
            entry_points = ?entry_points.names(),
            platform = %environment.platform.kind(),
            "Plugin manager created"
        );
        Self {
            hooks,
            entry_points,
            environment,
            registry: RwLock::new(PluginRegistry::new()),
        }
    }

    /// Returns the hook set.
    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Returns the plugin environment.
    pub fn environment(&self) -> &PluginEnvironment {
        &self.environment
    }

    /// Returns the entry-point catalog.
    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry_points
    }

    /// Validates a batch of descriptors and merges it into the global order.
    ///
    /// Fails for the whole batch on a duplicate id, an unknown constraint
    /// target or a dependency cycle; nothing is committed in that case.
    pub async fn load(&self, batch: Vec<PluginDescriptor>) -> Result<LoadReport, ConfigurationError> {
        let mut registry = self.registry.write().await;

        let mut pending: HashSet<&str> = HashSet::new();
        for descriptor in &batch {
            if registry.is_live(&descriptor.id) || !pending.insert(descriptor.id.as_str()) {
                error!(plugin_id = %descriptor.id, "Duplicate plugin id");
                return Err(ConfigurationError::DuplicateId(descriptor.id.clone()));
            }
        }

        for descriptor in &batch {
            for constraint in &descriptor.constraints {
                let target = constraint.target.as_str();
                if !pending.contains(target) && !registry.is_live(target) {
                    error!(
                        plugin_id = %descriptor.id,
                        target = %target,
                        "Constraint references unknown plugin"
                    );
                    return Err(ConfigurationError::UnknownTarget {
                        plugin: descriptor.id.clone(),
                        relation: constraint.relation,
                        target: target.to_string(),
                    });
                }
            }
        }

        let mut graph = DependencyGraph::new();
        for id in registry.order() {
            graph.add_node(id.clone());
        }
        for descriptor in &batch {
            graph.add_node(descriptor.id.clone());
        }
        for descriptor in registry.live_descriptors().into_iter().chain(&batch) {
            for (before, after) in descriptor.edges() {
                graph.add_edge(before, after);
            }
        }

        let order = graph.resolve().map_err(|cycle| {
            error!(plugins = ?cycle.nodes, "Plugin ordering constraints are cyclic");
            ConfigurationError::Cycle(cycle.nodes)
        })?;

        let loaded: Vec<String> = order
            .iter()
            .filter(|id| pending.contains(id.as_str()))
            .cloned()
            .collect();

        registry.commit(batch, order.clone());
        drop(registry);

        self.hooks.apply_order(&order).await;

        info!(loaded = ?loaded, order = ?order, "Plugin batch loaded");
        Ok(LoadReport { loaded, order })
    }

    /// Converts configuration records and loads them as one batch.
    pub async fn load_records(&self, records: &[DescriptorRecord]) -> Result<LoadReport, ConfigurationError> {
        let batch = descriptor::from_records(records)?;
        self.load(batch).await
    }

    /// Activates every loaded plugin in resolved order.
    ///
    /// Failures are isolated per plugin and collected into the report, unless
    /// the failing plugin is required, which aborts the pass.
    pub async fn activate(&self) -> Result<ActivateReport, ActivationAborted> {
        let pending = self.registry.read().await.pending();
        let mut report = ActivateReport::default();

        info!(pending = pending.len(), "Activating plugins");

        for (position, id) in pending.iter().enumerate() {
            let descriptor = {
                let registry = self.registry.read().await;
                match registry.get(id) {
                    Some(record) if record.state == PluginState::Loaded => record.descriptor.clone(),
                    _ => continue,
                }
            };

            self.announce(&descriptor, &mut report).await;

            match self.activate_one(&descriptor).await {
                Ok(Some(count)) => {
                    info!(plugin_id = %id, subscriptions = count, "Plugin activated");
                    report.activated.push(id.clone());
                }
                Ok(None) => {
                    debug!(plugin_id = %id, "Plugin unloaded during activation");
                }
                Err(err) => {
                    self.set_state(id, PluginState::Failed(err.to_string())).await;
                    if descriptor.required {
                        error!(plugin_id = %id, error = %err, "Required plugin failed, aborting activation");
                        report.skipped = pending[position + 1..].to_vec();
                        return Err(ActivationAborted { cause: err, report });
                    }
                    warn!(plugin_id = %id, error = %err, "Plugin failed to activate");
                    report.failed.push(err);
                }
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            "Plugin activation finished"
        );
        Ok(report)
    }

    /// Fires `load_plugin` for a plugin about to be instantiated.
    async fn announce(&self, descriptor: &PluginDescriptor, report: &mut ActivateReport) {
        let mut params = LoadPluginParams::new(descriptor.clone());
        match self.hooks.fire::<LoadPlugin>(&mut params).await {
            Ok(fired) => report.observer_failures.extend(fired.failures),
            Err(err) => {
                warn!(plugin_id = %descriptor.id, error = %err, "load_plugin observers not notified");
            }
        }
    }

    /// Instantiates one plugin and installs its subscriptions.
    ///
    /// Returns the number of installed subscriptions, or `None` if the
    /// plugin was unloaded while it was being activated.
    async fn activate_one(&self, descriptor: &PluginDescriptor) -> Result<Option<usize>, ActivationError> {
        let plugin = self.instantiate(descriptor)?;
        let metadata = plugin.metadata();

        debug!(
            plugin_id = %descriptor.id,
            name = %metadata.name,
            version = %metadata.version,
            "Plugin instantiated"
        );

        let claimed = {
            let mut registry = self.registry.write().await;
            match registry.get_mut(&descriptor.id) {
                Some(record) if record.state == PluginState::Loaded => {
                    record.state = PluginState::Initialized;
                    record.metadata = Some(metadata);
                    true
                }
                _ => false,
            }
        };
        if !claimed {
            self.release_instance(&descriptor.id, plugin).await;
            return Ok(None);
        }

        let registrar = match self.collect_subscriptions(descriptor, plugin.as_ref()) {
            Ok(registrar) => registrar,
            Err(err) => {
                self.release_instance(&descriptor.id, plugin).await;
                return Err(err);
            }
        };

        let handles = registrar.install(&self.hooks).await;
        let count = handles.len();

        if let Err(err) = self.check_subscriber_order(&handles).await {
            error!(plugin_id = %descriptor.id, error = %err, "Subscriptions rolled back");
            for handle in handles {
                self.hooks.unsubscribe(handle).await;
            }
            self.release_instance(&descriptor.id, plugin).await;
            return Err(ActivationError::Subscription {
                plugin: descriptor.id.clone(),
                reason: err.to_string(),
            });
        }

        let mut registry = self.registry.write().await;
        let still_live = registry
            .get(&descriptor.id)
            .is_some_and(|record| record.state == PluginState::Initialized);

        if still_live {
            if let Some(record) = registry.get_mut(&descriptor.id) {
                record.state = PluginState::Active;
                record.instance = Some(plugin);
                record.subscriptions = handles;
            }
            return Ok(Some(count));
        }
        drop(registry);

        for handle in handles {
            self.hooks.unsubscribe(handle).await;
        }
        self.release_instance(&descriptor.id, plugin).await;
        Ok(None)
    }

    /// Verifies that every hook touched by `handles` can still be ordered.
    async fn check_subscriber_order(&self, handles: &[SubscriptionHandle]) -> Result<(), ConfigurationError> {
        let mut checked: Vec<HookPoint> = Vec::new();
        for handle in handles {
            if !checked.contains(&handle.hook) {
                checked.push(handle.hook);
                self.hooks.subscribers(handle.hook).await?;
            }
        }
        Ok(())
    }

    fn instantiate(&self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>, ActivationError> {
        let factory = self.entry_points.get(&descriptor.entry_point).ok_or_else(|| {
            ActivationError::UnknownEntryPoint {
                plugin: descriptor.id.clone(),
                entry_point: descriptor.entry_point.clone(),
            }
        })?;

        let context = PluginContext::new(&descriptor.id, descriptor.settings.clone(), &self.environment);

        std::panic::catch_unwind(AssertUnwindSafe(|| factory(&context)))
            .unwrap_or_else(|panic| Err(panic_message("entry point", panic)))
            .map_err(|reason| ActivationError::Instantiation {
                plugin: descriptor.id.clone(),
                reason,
            })
    }

    fn collect_subscriptions(
        &self,
        descriptor: &PluginDescriptor,
        plugin: &dyn Plugin,
    ) -> Result<HookRegistrar, ActivationError> {
        let mut registrar = HookRegistrar::new(descriptor);

        std::panic::catch_unwind(AssertUnwindSafe(|| plugin.subscribe(&mut registrar)))
            .unwrap_or_else(|panic| Err(panic_message("subscribe", panic)))
            .map_err(|reason| ActivationError::Subscription {
                plugin: descriptor.id.clone(),
                reason,
            })?;

        if let Some(hook) = registrar.hooks().into_iter().find(|hook| !descriptor.declares(*hook)) {
            return Err(ActivationError::UndeclaredHook {
                plugin: descriptor.id.clone(),
                hook: hook.as_str().to_string(),
            });
        }

        Ok(registrar)
    }

    /// Shuts down an instance that never became active.
    async fn release_instance(&self, plugin_id: &str, plugin: Arc<dyn Plugin>) {
        if let Some(err) = shutdown(plugin).await {
            warn!(plugin_id = %plugin_id, error = %err, "Plugin shutdown returned error");
        }
    }

    async fn set_state(&self, plugin_id: &str, state: PluginState) {
        let mut registry = self.registry.write().await;
        if let Some(record) = registry.get_mut(plugin_id) {
            if record.state.is_live() {
                record.state = state;
            }
        }
    }

    /// Removes a plugin from every hook, then releases its instance.
    ///
    /// Safe while a firing is in flight: the firing keeps iterating its own
    /// snapshot, and the plugin's handlers stop running from the next firing.
    pub async fn unload(&self, plugin_id: &str) -> Result<UnloadReport, UnloadError> {
        let (released, order) = {
            let mut registry = self.registry.write().await;
            let released = registry.release(plugin_id).map_err(|err| {
                warn!(plugin_id = %plugin_id, error = %err, "Unload rejected");
                err
            })?;
            (released, registry.order().to_vec())
        };
        self.hooks.apply_order(&order).await;

        let mut removed_subscriptions = 0;
        for handle in released.subscriptions {
            if self.hooks.unsubscribe(handle).await {
                removed_subscriptions += 1;
            }
        }

        let shutdown_error = match released.instance {
            Some(plugin) => shutdown(plugin).await,
            None => None,
        };

        if let Some(err) = &shutdown_error {
            warn!(plugin_id = %plugin_id, error = %err, "Plugin shutdown returned error");
        }

        info!(plugin_id = %plugin_id, removed_subscriptions, "Plugin unloaded");

        Ok(UnloadReport {
            plugin_id: plugin_id.to_string(),
            removed_subscriptions,
            shutdown_error,
        })
    }

    /// Unloads every live plugin in reverse dependency order.
    pub async fn unload_all(&self) -> Vec<UnloadReport> {
        let order = self.order().await;
        let mut reports = Vec::with_capacity(order.len());

        for plugin_id in order.iter().rev() {
            match self.unload(plugin_id).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(plugin_id = %plugin_id, error = %err, "Error unloading plugin");
                }
            }
        }

        info!(unloaded = reports.len(), "All plugins unloaded");
        reports
    }

    /// Returns the live plugin ids in resolved order.
    pub async fn order(&self) -> Vec<String> {
        self.registry.read().await.order().to_vec()
    }

    /// Returns the state of a plugin.
    pub async fn state(&self, plugin_id: &str) -> Option<PluginState> {
        self.registry.read().await.state(plugin_id)
    }

    /// Lists plugins in resolved order; unloaded plugins come last.
    pub async fn plugins(&self) -> Vec<PluginSummary> {
        self.registry.read().await.summaries()
    }

    /// Returns the live instance of a plugin.
    pub async fn instance(&self, plugin_id: &str) -> Option<Arc<dyn Plugin>> {
        self.registry
            .read()
            .await
            .get(plugin_id)
            .and_then(|record| record.instance.clone())
    }
}

/// Awaits a plugin's shutdown, turning a panic into an error message.
async fn shutdown(plugin: Arc<dyn Plugin>) -> Option<String> {
    AssertUnwindSafe(plugin.shutdown())
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(panic_message("shutdown", panic)))
        .err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Relation;
    use crate::hooks::definitions::{HookAction, PreRender, PreRenderParams};
    use crate::registry::PluginMetadata;
    use skyview_core::config::HostConfig;

    #[derive(Debug)]
    struct Tagger {
        id: String,
    }

    impl Plugin for Tagger {
        fn metadata(&self) -> PluginMetadata {
            crate::plugin_metadata!(
                name: self.id.clone(),
                version: "0.1.0",
                description: "Tags pre_render payloads",
                author: "tests"
            )
        }

        fn subscribe(&self, registrar: &mut HookRegistrar) -> Result<(), String> {
            let id = self.id.clone();
            registrar.on_fn::<PreRender>(move |params: &mut PreRenderParams| {
                params.annotate(&id, id.clone());
                Ok(HookAction::Continue)
            });
            Ok(())
        }
    }

    fn manager() -> PluginManager {
        let (environment, _receiver) = PluginEnvironment::from_config(&HostConfig::default());
        let entry_points = EntryPoints::new().with("tagger", |ctx: &PluginContext| {
            Ok(Arc::new(Tagger {
                id: ctx.plugin_id.clone(),
            }) as Arc<dyn Plugin>)
        });
        PluginManager::new(Arc::new(Hooks::new()), entry_points, environment)
    }

    fn tagger(id: &str) -> PluginDescriptor {
        PluginDescriptor::new(id, "tagger").subscribe(HookPoint::PreRender)
    }

    #[tokio::test]
    async fn test_load_orders_batch() {
        let manager = manager();
        let report = manager
            .load(vec![tagger("c").run_after("b"), tagger("b"), tagger("a").run_before("b")])
            .await
            .unwrap();
        assert_eq!(report.order, vec!["a", "b", "c"]);
        assert_eq!(report.loaded, report.order);
        assert_eq!(manager.state("a").await, Some(PluginState::Loaded));
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let manager = manager();
        let err = manager.load(vec![tagger("a"), tagger("a")]).await.unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateId("a".into()));

        manager.load(vec![tagger("a")]).await.unwrap();
        let err = manager.load(vec![tagger("a")]).await.unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateId("a".into()));
    }

    #[tokio::test]
    async fn test_unknown_target_rejected() {
        let manager = manager();
        let err = manager
            .load(vec![tagger("a").run_after("ghost")])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownTarget {
                plugin: "a".into(),
                relation: Relation::After,
                target: "ghost".into(),
            }
        );
        assert!(manager.order().await.is_empty());
    }

    #[tokio::test]
    async fn test_later_batch_can_target_live_plugins() {
        let manager = manager();
        manager.load(vec![tagger("base")]).await.unwrap();
        let report = manager
            .load(vec![tagger("overlay").run_before("base")])
            .await
            .unwrap();
        assert_eq!(report.loaded, vec!["overlay"]);
        assert_eq!(report.order, vec!["overlay", "base"]);
    }

    #[tokio::test]
    async fn test_undeclared_hook_fails_activation() {
        let manager = manager();
        manager
            .load(vec![PluginDescriptor::new("sneaky", "tagger")])
            .await
            .unwrap();

        let report = manager.activate().await.unwrap();
        assert_eq!(
            report.failed,
            vec![ActivationError::UndeclaredHook {
                plugin: "sneaky".into(),
                hook: "pre_render".into(),
            }]
        );
        assert!(matches!(manager.state("sneaky").await, Some(PluginState::Failed(_))));
        assert_eq!(manager.hooks().subscriber_count(HookPoint::PreRender).await, 0);
    }

    #[tokio::test]
    async fn test_unload_twice_reports_error() {
        let manager = manager();
        manager.load(vec![tagger("a")]).await.unwrap();
        manager.activate().await.unwrap();

        let report = manager.unload("a").await.unwrap();
        assert_eq!(report.removed_subscriptions, 1);
        assert_eq!(report.shutdown_error, None);
        assert!(manager.instance("a").await.is_none());

        assert_eq!(
            manager.unload("a").await.unwrap_err(),
            UnloadError::AlreadyUnloaded("a".into())
        );
        assert_eq!(
            manager.unload("ghost").await.unwrap_err(),
            UnloadError::UnknownPlugin("ghost".into())
        );
    }

    #[tokio::test]
    async fn test_unloaded_id_can_be_loaded_again() {
        let manager = manager();
        manager.load(vec![tagger("a")]).await.unwrap();
        manager.unload("a").await.unwrap();
        manager.load(vec![tagger("a")]).await.unwrap();
        assert_eq!(manager.state("a").await, Some(PluginState::Loaded));
    }

    #[tokio::test]
    async fn test_unload_drops_rank_of_unloaded_plugin() {
        let manager = manager();
        manager.load(vec![tagger("a"), tagger("b")]).await.unwrap();
        manager.activate().await.unwrap();
        manager.unload("a").await.unwrap();

        manager
            .hooks()
            .get::<PreRender>()
            .subscribe(
                "a",
                crate::traits::FnHandler::wrap(|_p: &mut PreRenderParams| Ok(HookAction::Continue)),
                vec![],
            )
            .await;
        assert_eq!(
            manager.hooks().subscribers(HookPoint::PreRender).await.unwrap(),
            vec!["b", "a"]
        );
    }
}
