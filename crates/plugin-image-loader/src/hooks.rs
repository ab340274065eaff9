//! Hook implementations for the image loader plugin.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageReader;

use skyview_plugin::prelude::*;

use crate::error::LoaderError;
use crate::formats::RasterFormat;
use crate::plugin::LoaderState;

/// Hook handler for load_image: claim and inspect raster images
pub struct LoadImageHook {
    /// Shared plugin state
    state: Arc<LoaderState>,
}

impl LoadImageHook {
    /// Create a new load_image hook handler
    pub fn new(state: Arc<LoaderState>) -> Self {
        Self { state }
    }

    async fn read(&self, location: &str) -> Result<Bytes, LoaderError> {
        let path = self.state.resolve(location);
        let data = tokio::fs::read(&path).await.map_err(|source| LoaderError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl HookHandler<LoadImageParams> for LoadImageHook {
    async fn handle(&self, params: &mut LoadImageParams) -> HandlerResult {
        let plugin_id = self.state.plugin_id.as_str();

        if params.is_claimed() {
            tracing::debug!(
                "Image '{}' already claimed by {:?}",
                params.location,
                params.claimed_by
            );
            return Ok(HookAction::Continue);
        }

        let Some(format) = RasterFormat::detect(&params.location, params.data.as_deref()) else {
            tracing::debug!("Image '{}' has no recognised raster format", params.location);
            return Ok(HookAction::Continue);
        };

        if !self.state.accepts(format) {
            tracing::debug!("Loader '{}' declines {} image '{}'", plugin_id, format, params.location);
            return Ok(HookAction::Continue);
        }

        let data = match &params.data {
            Some(data) => data.clone(),
            None if self.state.read_files => {
                self.read(&params.location).await.map_err(|e| e.to_string())?
            }
            None => return Ok(HookAction::Continue),
        };

        let dimensions = ImageReader::with_format(Cursor::new(&data[..]), format.image_format())
            .into_dimensions()
            .map_err(|source| {
                LoaderError::Decode {
                    location: params.location.clone(),
                    source,
                }
                .to_string()
            })?;

        if !params.claim(plugin_id) {
            return Ok(HookAction::Continue);
        }
        params.data = Some(data);
        params.format = Some(format.as_str().to_string());
        params.dimensions = Some(dimensions);
        params
            .metadata
            .insert("mime_type".to_string(), format.mime_type().to_string());

        tracing::info!(
            "Loader '{}' claimed {} image '{}' ({}x{})",
            plugin_id,
            format,
            params.location,
            dimensions.0,
            dimensions.1
        );

        Ok(HookAction::stop(format!("{format} image claimed by {plugin_id}")))
    }
}
