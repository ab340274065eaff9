//! Skyview Host: pluggable image viewer shell
//!
//! Main entry point that wires the plugin engine, the bundled plugins and the
//! selected platform together.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use skyview_core::config::{AppConfig, LogFormat};
use skyview_core::error::AppError;
use skyview_core::result::AppResult;
use skyview_plugin::api::{CommandReceiver, ConnectorCommand};
use skyview_plugin::hooks::definitions::{
    Initialize, InitializeParams, LoadImage, LoadImageParams, PreRender, PreRenderParams,
};
use skyview_plugin::{EntryPoints, Hooks, PluginEnvironment, PluginManager};

/// Default view rendered after startup.
const DEFAULT_VIEW: (&str, u32, u32) = ("main", 1280, 720);

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(kind = %e.kind, "Host error: {}", e.message);
        std::process::exit(e.exit_code());
    }
}

/// Load configuration from file and environment
fn load_configuration() -> AppResult<AppConfig> {
    let config_path =
        std::env::var("SKYVIEW_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Register the entry points of the bundled plugins
fn entry_points() -> EntryPoints {
    EntryPoints::new()
        .with(plugin_clock::ENTRY_POINT, plugin_clock::ClockPlugin::factory)
        .with(
            plugin_image_loader::ENTRY_POINT,
            plugin_image_loader::ImageLoaderPlugin::factory,
        )
}

/// Main host run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!(
        "Starting Skyview v{} ({} platform)",
        env!("CARGO_PKG_VERSION"),
        config.host.platform
    );

    // ── Step 1: Environment and hooks ────────────────────────────
    let (environment, commands) = PluginEnvironment::from_config(&config.host);
    let hooks = Arc::new(Hooks::with_policy(&config.hooks));
    let manager = Arc::new(PluginManager::new(
        Arc::clone(&hooks),
        entry_points(),
        environment.clone(),
    ));

    // ── Step 2: Load and activate the plugin catalog ─────────────
    let loaded = manager.load_records(&config.plugins.catalog).await?;
    tracing::info!("Plugin order: {:?}", loaded.order);

    match manager.activate().await {
        Ok(report) => {
            for failure in &report.failed {
                tracing::warn!("Plugin unavailable: {}", failure);
            }
            tracing::info!(
                "{} plugin(s) active, {} failed",
                report.activated.len(),
                report.failed.len()
            );
        }
        Err(aborted) => {
            tracing::error!("{}", aborted);
            manager.unload_all().await;
            return Err(aborted.into());
        }
    }

    // ── Step 3: Initialize ───────────────────────────────────────
    let mut init = InitializeParams::new(&config.host.name, &environment);
    let fired = hooks.fire::<Initialize>(&mut init).await?;
    if let Err(failure) = fired.into_result() {
        tracing::error!("Initialization failed: {}", failure);
        manager.unload_all().await;
        return Err(failure.into());
    }

    // ── Step 4: Startup images and first render ──────────────────
    for location in &config.host.startup_images {
        load_image(&hooks, LoadImageParams::new(location)).await?;
    }
    render(&hooks, DEFAULT_VIEW.0, DEFAULT_VIEW.1, DEFAULT_VIEW.2).await?;

    // ── Step 5: Serve connector commands until shutdown ──────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = tokio::spawn(pump_commands(Arc::clone(&hooks), commands, shutdown_rx));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, unloading plugins...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = pump.await {
        tracing::warn!("Command pump ended abnormally: {}", e);
    }

    // ── Step 6: Unload ───────────────────────────────────────────
    for report in manager.unload_all().await {
        if let Some(err) = &report.shutdown_error {
            tracing::warn!("Plugin '{}' shut down with error: {}", report.plugin_id, err);
        }
    }

    tracing::info!("Skyview host shut down gracefully");
    Ok(())
}

/// Fire load_image for one request
async fn load_image(hooks: &Hooks, mut params: LoadImageParams) -> AppResult<()> {
    let report = hooks.fire::<LoadImage>(&mut params).await?;

    match (&params.claimed_by, params.dimensions) {
        (Some(owner), Some((width, height))) => tracing::info!(
            "Image '{}' loaded by '{}' ({} {}x{})",
            params.location,
            owner,
            params.format.as_deref().unwrap_or("unknown"),
            width,
            height
        ),
        _ => tracing::warn!(
            "No plugin claimed image '{}' ({} handler failure(s))",
            params.location,
            report.failures.len()
        ),
    }
    Ok(())
}

/// Fire pre_render for one view
async fn render(hooks: &Hooks, view: &str, width: u32, height: u32) -> AppResult<()> {
    let mut params = PreRenderParams::new(view, width, height);
    hooks.fire::<PreRender>(&mut params).await?;

    for annotation in &params.annotations {
        tracing::info!("[{}] {}: {}", params.view, annotation.plugin_id, annotation.text);
    }
    Ok(())
}

/// Handle commands delivered through the connector
async fn pump_commands(
    hooks: Arc<Hooks>,
    mut commands: CommandReceiver,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if let Err(e) = dispatch(&hooks, command).await {
                    tracing::warn!("Command failed: {}", e);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn dispatch(hooks: &Hooks, command: ConnectorCommand) -> AppResult<()> {
    tracing::debug!("Command '{}' from '{}'", command.name, command.source);

    match command.name.as_str() {
        "load_image" => {
            let location = command.args["location"].as_str().ok_or_else(|| {
                AppError::command("load_image command requires a 'location' argument")
            })?;
            let mut params = LoadImageParams::new(location);
            if let Some(data) = image_data(&command.args["data"])? {
                params = params.with_data(data);
            }
            load_image(hooks, params).await
        }
        "render" => {
            let view = command.args["view"].as_str().unwrap_or(DEFAULT_VIEW.0);
            let width = dimension(&command.args["width"], DEFAULT_VIEW.1);
            let height = dimension(&command.args["height"], DEFAULT_VIEW.2);
            render(hooks, view, width, height).await
        }
        other => Err(AppError::command(format!("Unknown command '{}'", other))),
    }
}

/// Decodes an optional `data` argument given as an array of byte values.
fn image_data(value: &serde_json::Value) -> AppResult<Option<Bytes>> {
    let Some(items) = value.as_array() else {
        return match value {
            serde_json::Value::Null => Ok(None),
            _ => Err(AppError::command("'data' must be an array of bytes")),
        };
    };

    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| AppError::command(format!("invalid byte in 'data': {item}")))
        })
        .collect::<AppResult<Vec<u8>>>()
        .map(|bytes| Some(Bytes::from(bytes)))
}

fn dimension(value: &serde_json::Value, default: u32) -> u32 {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
