//! Plugin manager lifecycle scenarios: load, activate, fire, unload.

mod common;

use serde_json::json;

use skyview_plugin::hooks::definitions::{
    HookPoint, Initialize, InitializeParams, LoadImage, LoadImageParams, PreRender, PreRenderParams,
};
use skyview_plugin::{ActivationError, ConfigurationError, PluginState};

use common::{manager, recorder, recorder_on, take};

#[tokio::test]
async fn test_chain_orders_fires_and_survives_unload() {
    let (manager, journal) = manager();

    let report = manager
        .load(vec![
            recorder("C"),
            recorder("B").run_before("C"),
            recorder("A").run_before("B"),
        ])
        .await
        .unwrap();
    assert_eq!(report.order, vec!["A", "B", "C"]);

    let activated = manager.activate().await.unwrap();
    assert_eq!(activated.activated, vec!["A", "B", "C"]);
    assert!(activated.is_complete());

    let mut params = PreRenderParams::new("main", 800, 600);
    manager.hooks().fire::<PreRender>(&mut params).await.unwrap();
    assert_eq!(take(&journal), vec!["pre_render:A", "pre_render:B", "pre_render:C"]);

    let unloaded = manager.unload("B").await.unwrap();
    assert_eq!(unloaded.removed_subscriptions, 1);
    assert_eq!(manager.order().await, vec!["A", "C"]);

    let mut params = PreRenderParams::new("main", 800, 600);
    let fired = manager.hooks().fire::<PreRender>(&mut params).await.unwrap();
    assert_eq!(fired.invoked, vec!["A", "C"]);
    assert_eq!(take(&journal), vec!["pre_render:A", "pre_render:C"]);
}

#[tokio::test]
async fn test_cycle_rejects_whole_batch() {
    let (manager, journal) = manager();

    let err = manager
        .load(vec![
            recorder("A").run_before("B"),
            recorder("B").run_before("A"),
            recorder("Z"),
        ])
        .await
        .unwrap_err();

    assert_eq!(err, ConfigurationError::Cycle(vec!["A".into(), "B".into()]));
    assert!(manager.plugins().await.is_empty());

    let report = manager.activate().await.unwrap();
    assert!(report.activated.is_empty());
    assert_eq!(manager.hooks().subscriber_count(HookPoint::PreRender).await, 0);
    assert!(take(&journal).is_empty());
}

#[tokio::test]
async fn test_failed_factory_is_isolated() {
    let (manager, journal) = manager();
    manager
        .load(vec![
            recorder("A"),
            recorder_on("B", &[HookPoint::PreRender], json!({"factory": "fail"})),
            recorder_on("P", &[HookPoint::PreRender], json!({"factory": "panic"})),
            recorder("C"),
        ])
        .await
        .unwrap();

    let report = manager.activate().await.unwrap();
    assert_eq!(report.activated, vec!["A", "C"]);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(
        report.failed[0],
        ActivationError::Instantiation {
            plugin: "B".into(),
            reason: "B refused to start".into(),
        }
    );
    assert_eq!(report.failed[1].plugin_id(), "P");
    assert!(report.failed[1].to_string().contains("entry point panicked: P exploded"));
    assert!(matches!(manager.state("B").await, Some(PluginState::Failed(_))));

    let mut params = PreRenderParams::new("main", 800, 600);
    manager.hooks().fire::<PreRender>(&mut params).await.unwrap();
    assert_eq!(take(&journal), vec!["pre_render:A", "pre_render:C"]);
}

#[tokio::test]
async fn test_required_failure_aborts_activation() {
    let (manager, _journal) = manager();
    manager
        .load(vec![
            recorder("A"),
            recorder_on("B", &[HookPoint::PreRender], json!({"factory": "fail"})).mark_required(),
            recorder("C"),
        ])
        .await
        .unwrap();

    let aborted = manager.activate().await.unwrap_err();
    assert_eq!(aborted.cause.plugin_id(), "B");
    assert_eq!(aborted.report.activated, vec!["A"]);
    assert_eq!(aborted.report.skipped, vec!["C"]);
    assert_eq!(manager.state("C").await, Some(PluginState::Loaded));
    assert_eq!(manager.state("A").await, Some(PluginState::Active));
}

#[tokio::test]
async fn test_load_plugin_observers_see_later_activations() {
    let (manager, journal) = manager();
    manager
        .load(vec![recorder_on("audit", &[HookPoint::LoadPlugin], json!({}))])
        .await
        .unwrap();
    manager.activate().await.unwrap();
    assert!(take(&journal).is_empty());

    manager
        .load(vec![recorder("A"), recorder("B").run_before("A")])
        .await
        .unwrap();
    let report = manager.activate().await.unwrap();

    assert_eq!(report.activated, vec!["B", "A"]);
    assert_eq!(take(&journal), vec!["load_plugin:audit:B", "load_plugin:audit:A"]);
}

#[tokio::test]
async fn test_observer_failures_do_not_block_activation() {
    let (manager, _journal) = manager();
    manager
        .load(vec![recorder_on(
            "audit",
            &[HookPoint::LoadPlugin],
            json!({"behavior": "fail"}),
        )])
        .await
        .unwrap();
    manager.activate().await.unwrap();

    manager.load(vec![recorder("A")]).await.unwrap();
    let report = manager.activate().await.unwrap();

    assert_eq!(report.activated, vec!["A"]);
    assert_eq!(report.observer_failures.len(), 1);
    assert_eq!(report.observer_failures[0].plugin_id, "audit");
}

#[tokio::test]
async fn test_stop_claims_image_for_one_firing() {
    let (manager, journal) = manager();
    manager
        .load(vec![
            recorder_on("first", &[HookPoint::LoadImage], json!({"behavior": "stop"})),
            recorder_on("second", &[HookPoint::LoadImage], json!({})).run_after("first"),
        ])
        .await
        .unwrap();
    manager.activate().await.unwrap();

    let mut params = LoadImageParams::new("m31.png");
    let report = manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();
    assert_eq!(report.stopped_by.unwrap().plugin_id, "first");
    assert_eq!(params.claimed_by.as_deref(), Some("first"));
    assert_eq!(take(&journal), vec!["load_image:first"]);

    manager.unload("first").await.unwrap();
    let mut params = LoadImageParams::new("m31.png");
    manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();
    assert_eq!(take(&journal), vec!["load_image:second"]);
}

#[tokio::test]
async fn test_initialize_failure_is_fatal() {
    let (manager, journal) = manager();
    manager
        .load(vec![
            recorder_on("broken", &[HookPoint::Initialize], json!({"behavior": "fail"})),
            recorder_on("late", &[HookPoint::Initialize], json!({})).run_after("broken"),
        ])
        .await
        .unwrap();
    manager.activate().await.unwrap();

    let mut params = InitializeParams::new("skyview", manager.environment());
    let report = manager.hooks().fire::<Initialize>(&mut params).await.unwrap();

    assert!(report.aborted);
    assert_eq!(take(&journal), vec!["initialize:broken"]);
    let failure = report.into_result().unwrap_err();
    assert_eq!(failure.plugin_id, "broken");
    assert_eq!(failure.hook, "initialize");
}

#[tokio::test]
async fn test_panicking_handler_is_isolated_on_best_effort_hook() {
    let (manager, journal) = manager();
    manager
        .load(vec![
            recorder_on("panicky", &[HookPoint::PreRender], json!({"behavior": "panic"})),
            recorder("steady"),
        ])
        .await
        .unwrap();
    manager.activate().await.unwrap();

    let mut params = PreRenderParams::new("main", 800, 600);
    let report = manager.hooks().fire::<PreRender>(&mut params).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].plugin_id, "panicky");
    assert_eq!(take(&journal), vec!["pre_render:panicky", "pre_render:steady"]);
}

#[tokio::test]
async fn test_unload_all_runs_in_reverse_order() {
    let (manager, _journal) = manager();
    manager
        .load(vec![recorder("A"), recorder("B").run_after("A"), recorder("C").run_after("B")])
        .await
        .unwrap();
    manager.activate().await.unwrap();

    let reports = manager.unload_all().await;
    let ids: Vec<&str> = reports.iter().map(|r| r.plugin_id.as_str()).collect();
    assert_eq!(ids, vec!["C", "B", "A"]);
    assert!(manager.order().await.is_empty());
    assert_eq!(manager.hooks().subscriber_count(HookPoint::PreRender).await, 0);

    let summaries = manager.plugins().await;
    assert!(summaries.iter().all(|s| s.state == PluginState::Unloaded));
}

#[tokio::test]
async fn test_catalog_records_load_through_config() {
    let (manager, _journal) = manager();
    let config = skyview_core::config::AppConfig::from_toml_str(
        r#"
        [[plugins.catalog]]
        id = "overlay"
        entry_point = "recorder"
        subscribes = ["pre_render"]
        constraints = [{ relation = "after", target = "base" }]

        [[plugins.catalog]]
        id = "base"
        entry_point = "recorder"
        subscribes = ["pre_render"]
        "#,
    )
    .unwrap();

    let report = manager.load_records(&config.plugins.catalog).await.unwrap();
    assert_eq!(report.order, vec!["base", "overlay"]);

    let activated = manager.activate().await.unwrap();
    assert_eq!(activated.activated, vec!["base", "overlay"]);
    let summaries = manager.plugins().await;
    assert_eq!(summaries[0].metadata.as_ref().unwrap().name, "base");
    assert_eq!(summaries[0].subscriptions, 1);
}

/// Unloads a plugin while `load_plugin` announces it.
struct UnloadOnAnnounce {
    manager: std::sync::Weak<skyview_plugin::PluginManager>,
    target: &'static str,
}

#[async_trait::async_trait]
impl skyview_plugin::hooks::HookHandler<skyview_plugin::hooks::definitions::LoadPluginParams>
    for UnloadOnAnnounce
{
    async fn handle(
        &self,
        params: &mut skyview_plugin::hooks::definitions::LoadPluginParams,
    ) -> skyview_plugin::hooks::definitions::HandlerResult {
        if params.descriptor.id == self.target {
            if let Some(manager) = self.manager.upgrade() {
                manager.unload(self.target).await.map_err(|e| e.to_string())?;
            }
        }
        Ok(skyview_plugin::HookAction::Continue)
    }
}

#[tokio::test]
async fn test_unload_while_announced_keeps_plugin_out() {
    use skyview_plugin::hooks::definitions::LoadPlugin;

    let (manager, journal) = manager();
    let manager = std::sync::Arc::new(manager);
    manager
        .hooks()
        .get::<LoadPlugin>()
        .subscribe(
            "host",
            std::sync::Arc::new(UnloadOnAnnounce {
                manager: std::sync::Arc::downgrade(&manager),
                target: "victim",
            }),
            vec![],
        )
        .await;

    manager
        .load(vec![recorder("victim"), recorder("bystander")])
        .await
        .unwrap();
    let report = manager.activate().await.unwrap();
    assert_eq!(report.activated, vec!["bystander"]);
    assert!(report.failed.is_empty());

    assert_eq!(manager.state("victim").await, Some(PluginState::Unloaded));
    assert!(manager.instance("victim").await.is_none());
    assert_eq!(manager.order().await, vec!["bystander"]);

    let mut params = PreRenderParams::new("main", 800, 600);
    let fired = manager.hooks().fire::<PreRender>(&mut params).await.unwrap();
    assert_eq!(fired.invoked, vec!["bystander"]);
    assert_eq!(take(&journal), vec!["pre_render:bystander"]);

    let reports = manager.unload_all().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].plugin_id, "bystander");
    assert_eq!(manager.state("victim").await, Some(PluginState::Unloaded));
}

#[tokio::test]
async fn test_cyclic_subscription_is_rolled_back() {
    let (manager, journal) = manager();
    manager
        .load(vec![
            recorder_on("x", &[HookPoint::PreRender], json!({ "before": ["y"] })),
            recorder_on("y", &[HookPoint::PreRender], json!({ "before": ["x"] })),
            recorder("bystander"),
        ])
        .await
        .unwrap();

    let report = manager.activate().await.unwrap();
    assert_eq!(report.activated, vec!["x", "bystander"]);
    assert_eq!(report.failed.len(), 1);
    match &report.failed[0] {
        ActivationError::Subscription { plugin, reason } => {
            assert_eq!(plugin, "y");
            assert_eq!(reason, &ConfigurationError::Cycle(vec!["x".into(), "y".into()]).to_string());
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert!(matches!(manager.state("y").await, Some(PluginState::Failed(_))));
    assert_eq!(manager.hooks().subscriber_count(HookPoint::PreRender).await, 2);

    let mut params = PreRenderParams::new("main", 800, 600);
    let fired = manager.hooks().fire::<PreRender>(&mut params).await.unwrap();
    assert_eq!(fired.invoked, vec!["x", "bystander"]);
    assert_eq!(take(&journal), vec!["pre_render:x", "pre_render:bystander"]);
}

#[tokio::test]
async fn test_required_plugin_with_cyclic_subscription_aborts() {
    let (manager, _journal) = manager();
    manager
        .load(vec![
            recorder_on("x", &[HookPoint::PreRender], json!({ "before": ["y"] })),
            recorder_on("y", &[HookPoint::PreRender], json!({ "before": ["x"] })).mark_required(),
            recorder("bystander"),
        ])
        .await
        .unwrap();

    let aborted = manager.activate().await.unwrap_err();
    assert!(matches!(aborted.cause, ActivationError::Subscription { ref plugin, .. } if plugin == "y"));
    assert_eq!(aborted.report.activated, vec!["x"]);
    assert_eq!(aborted.report.skipped, vec!["bystander"]);
    assert_eq!(manager.hooks().subscribers(HookPoint::PreRender).await.unwrap(), vec!["x"]);
}
