//! Shared test helpers for plugin lifecycle tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use skyview_core::config::HostConfig;
use skyview_plugin::prelude::*;
use skyview_plugin::{Hooks, PluginEnvironment, PluginManager};

/// Ordered log of `"<hook>:<plugin>"` entries written by recorder handlers.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// A plugin whose behaviour is driven entirely by its settings.
///
/// - `on`: hook names to subscribe to (default `["pre_render"]`)
/// - `behavior`: `continue` | `stop` | `fail` | `panic` for every handler
/// - `before`: peers its `pre_render` handler must run before
#[derive(Debug)]
pub struct Recorder {
    id: String,
    hooks: Vec<HookPoint>,
    behavior: String,
    before: Vec<String>,
    journal: Journal,
}

impl Recorder {
    fn outcome(id: &str, behavior: &str) -> HandlerResult {
        match behavior {
            "stop" => Ok(HookAction::stop(format!("{id} stops"))),
            "fail" => Err(format!("{id} failed")),
            "panic" => panic!("{id} panicked"),
            _ => Ok(HookAction::Continue),
        }
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(
            name: self.id.clone(),
            version: "0.0.1",
            description: "Records hook invocations",
            author: "tests"
        )
    }

    fn subscribe(&self, registrar: &mut HookRegistrar) -> Result<(), String> {
        for hook in &self.hooks {
            let id = self.id.clone();
            let behavior = self.behavior.clone();
            let journal = Arc::clone(&self.journal);
            match hook {
                HookPoint::Initialize => {
                    registrar.on_fn::<Initialize>(move |_params: &mut InitializeParams| {
                        journal.lock().unwrap().push(format!("initialize:{id}"));
                        Recorder::outcome(&id, &behavior)
                    });
                }
                HookPoint::LoadPlugin => {
                    registrar.on_fn::<LoadPlugin>(move |params: &mut LoadPluginParams| {
                        journal
                            .lock()
                            .unwrap()
                            .push(format!("load_plugin:{id}:{}", params.descriptor.id));
                        Recorder::outcome(&id, &behavior)
                    });
                }
                HookPoint::LoadImage => {
                    registrar.on_fn::<LoadImage>(move |params: &mut LoadImageParams| {
                        journal.lock().unwrap().push(format!("load_image:{id}"));
                        if behavior == "stop" {
                            params.claim(&id);
                        }
                        Recorder::outcome(&id, &behavior)
                    });
                }
                HookPoint::PreRender => {
                    let constraints = self.before.iter().map(Constraint::before).collect();
                    let handler = FnHandler::wrap(move |params: &mut PreRenderParams| {
                        journal.lock().unwrap().push(format!("pre_render:{id}"));
                        params.annotate(&id, id.clone());
                        Recorder::outcome(&id, &behavior)
                    });
                    registrar.on_with::<PreRender>(handler, constraints);
                }
            }
        }
        Ok(())
    }
}

/// Entry points with a `recorder` factory writing to `journal`.
///
/// The factory honours a `factory` setting: `ok` (default) | `fail` | `panic`.
pub fn entry_points(journal: &Journal) -> EntryPoints {
    let journal = Arc::clone(journal);
    EntryPoints::new().with("recorder", move |ctx: &PluginContext| {
        match ctx.setting_str("factory").unwrap_or("ok") {
            "fail" => return Err(format!("{} refused to start", ctx.plugin_id)),
            "panic" => panic!("{} exploded", ctx.plugin_id),
            _ => {}
        }

        let names: Vec<String> = ctx.setting_or("on", vec!["pre_render".to_string()])?;
        let hooks = names
            .iter()
            .map(|name| HookPoint::from_name(name).ok_or_else(|| format!("bad hook {name}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(Recorder {
            id: ctx.plugin_id.clone(),
            hooks,
            behavior: ctx.setting_str("behavior").unwrap_or("continue").to_string(),
            before: ctx.setting_or("before", Vec::<String>::new())?,
            journal: Arc::clone(&journal),
        }) as Arc<dyn Plugin>)
    })
}

/// A recorder descriptor subscribing to `pre_render` only.
pub fn recorder(id: &str) -> PluginDescriptor {
    recorder_on(id, &[HookPoint::PreRender], json!({}))
}

/// A recorder descriptor subscribing to `hooks` with extra settings.
pub fn recorder_on(id: &str, hooks: &[HookPoint], settings: Value) -> PluginDescriptor {
    let mut descriptor = PluginDescriptor::new(id, "recorder");
    for hook in hooks {
        descriptor = descriptor.subscribe(*hook);
    }
    let names: Vec<&str> = hooks.iter().map(|hook| hook.as_str()).collect();
    descriptor = descriptor.with_setting("on", json!(names));
    if let Value::Object(map) = settings {
        for (key, value) in map {
            descriptor.settings.insert(key, value);
        }
    }
    descriptor
}

/// A fresh manager and the journal its recorders write to.
pub fn manager() -> (PluginManager, Journal) {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let (environment, _receiver) = PluginEnvironment::from_config(&HostConfig::default());
    let manager = PluginManager::new(
        Arc::new(Hooks::new()),
        entry_points(&journal),
        environment,
    );
    (manager, journal)
}

/// Drains the journal.
pub fn take(journal: &Journal) -> Vec<String> {
    std::mem::take(&mut *journal.lock().unwrap())
}
