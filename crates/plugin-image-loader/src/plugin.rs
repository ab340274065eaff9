//! Image loader plugin implementation: registers with the Skyview plugin system.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use skyview_plugin::prelude::*;

use crate::error::LoaderError;
use crate::formats::RasterFormat;
use crate::hooks::LoadImageHook;

/// Entry-point name the host registers this plugin under.
pub const ENTRY_POINT: &str = "image-loader";

/// State shared between the plugin and its hook handler.
#[derive(Debug)]
pub struct LoaderState {
    /// Id of the plugin instance
    pub plugin_id: String,
    /// Formats this instance claims
    pub formats: Vec<RasterFormat>,
    /// Whether requests without in-memory data are read from disk
    pub read_files: bool,
    /// Platform used to resolve relative locations
    platform: Arc<dyn Platform>,
}

impl LoaderState {
    /// Whether this instance claims `format`.
    pub fn accepts(&self, format: RasterFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Resolve a location; relative paths are taken from the resource root.
    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.platform.resource_path(location)
        }
    }
}

/// Raster image loader plugin for Skyview
#[derive(Debug)]
pub struct ImageLoaderPlugin {
    /// State shared with the hook handler
    state: Arc<LoaderState>,
}

impl ImageLoaderPlugin {
    /// Create the plugin from its context.
    ///
    /// Settings: `formats` (list of format names, default all) and
    /// `read_files` (default true).
    pub fn from_context(ctx: &PluginContext) -> Result<Self, String> {
        let names: Vec<String> = ctx.setting_or(
            "formats",
            RasterFormat::ALL.iter().map(|f| f.as_str().to_string()).collect(),
        )?;

        let formats = names
            .iter()
            .map(|name| {
                RasterFormat::from_extension(name)
                    .ok_or_else(|| LoaderError::UnknownFormat(name.clone()).to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let read_files: bool = ctx.setting_or("read_files", true)?;

        Ok(Self {
            state: Arc::new(LoaderState {
                plugin_id: ctx.plugin_id.clone(),
                formats,
                read_files,
                platform: Arc::clone(&ctx.platform),
            }),
        })
    }

    /// Entry-point factory.
    pub fn factory(ctx: &PluginContext) -> Result<Arc<dyn Plugin>, String> {
        Ok(Arc::new(Self::from_context(ctx)?))
    }

    /// Get the shared state
    pub fn state(&self) -> &Arc<LoaderState> {
        &self.state
    }
}

impl Plugin for ImageLoaderPlugin {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(
            name: "Image Loader",
            description: "Claims raster image requests and reports format and dimensions"
        )
    }

    fn subscribe(&self, registrar: &mut HookRegistrar) -> Result<(), String> {
        registrar.on::<LoadImage>(Arc::new(LoadImageHook::new(Arc::clone(&self.state))));

        tracing::info!(
            "Image loader '{}' registered for formats: {:?}",
            self.state.plugin_id,
            self.state.formats
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use bytes::Bytes;
    use image::{ImageFormat, RgbImage};
    use serde_json::json;
    use skyview_core::config::HostConfig;
    use skyview_plugin::{EntryPoints, Hooks, PluginEnvironment, PluginManager};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn loader(id: &str, settings: serde_json::Value) -> PluginDescriptor {
        let mut descriptor = PluginDescriptor::new(id, ENTRY_POINT).subscribe(HookPoint::LoadImage);
        if let serde_json::Value::Object(map) = settings {
            descriptor.settings = map;
        }
        descriptor
    }

    async fn manager_with(host: HostConfig, descriptors: Vec<PluginDescriptor>) -> PluginManager {
        let (environment, _receiver) = PluginEnvironment::from_config(&host);
        let entry_points = EntryPoints::new().with(ENTRY_POINT, ImageLoaderPlugin::factory);
        let manager = PluginManager::new(Arc::new(Hooks::new()), entry_points, environment);
        manager.load(descriptors).await.unwrap();
        manager.activate().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_claims_in_memory_png() {
        let manager = manager_with(HostConfig::default(), vec![loader("raster", json!({}))]).await;

        let mut params = LoadImageParams::new("upload").with_data(Bytes::from(png(7, 5)));
        let report = manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();

        assert_eq!(report.stopped_by.unwrap().plugin_id, "raster");
        assert_eq!(params.claimed_by.as_deref(), Some("raster"));
        assert_eq!(params.format.as_deref(), Some("png"));
        assert_eq!(params.dimensions, Some((7, 5)));
        assert_eq!(params.metadata["mime_type"], "image/png");
    }

    #[tokio::test]
    async fn test_declines_formats_outside_its_list() {
        let manager = manager_with(
            HostConfig::default(),
            vec![loader("jpeg-only", json!({"formats": ["jpeg"]}))],
        )
        .await;

        let mut params = LoadImageParams::new("upload").with_data(Bytes::from(png(2, 2)));
        let report = manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();

        assert!(!report.was_stopped());
        assert!(!params.is_claimed());
    }

    #[tokio::test]
    async fn test_corrupt_data_is_reported_not_claimed() {
        let manager = manager_with(HostConfig::default(), vec![loader("raster", json!({}))]).await;

        let mut truncated = png(4, 4);
        truncated.truncate(12);
        let mut params = LoadImageParams::new("broken.png").with_data(Bytes::from(truncated));
        let report = manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("broken.png"));
        assert!(!params.is_claimed());
    }

    #[tokio::test]
    async fn test_reads_relative_location_from_resource_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m31.png"), png(3, 9)).unwrap();

        let mut host = HostConfig::default();
        host.resource_root = dir.path().display().to_string();
        let manager = manager_with(host, vec![loader("raster", json!({}))]).await;

        let mut params = LoadImageParams::new("m31.png");
        manager.hooks().fire::<LoadImage>(&mut params).await.unwrap();

        assert_eq!(params.dimensions, Some((3, 9)));
        assert!(params.data.is_some());
    }

    #[test]
    fn test_unknown_format_setting_rejected() {
        let (environment, _receiver) = PluginEnvironment::from_config(&HostConfig::default());
        let mut settings = serde_json::Map::new();
        settings.insert("formats".into(), json!(["png", "fits"]));
        let ctx = PluginContext::new("raster", settings, &environment);

        let err = ImageLoaderPlugin::from_context(&ctx).unwrap_err();
        assert_eq!(err, "Unsupported image format 'fits'");
    }
}
