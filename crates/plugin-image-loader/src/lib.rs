//! # Plugin Image Loader
//!
//! A Skyview plugin that claims `load_image` requests for common raster
//! formats. The first loader able to decode a request claims it, records the
//! detected format and dimensions on the payload, and stops propagation so
//! that no later loader touches the same image.

pub mod error;
pub mod formats;
pub mod hooks;
pub mod plugin;

pub use error::LoaderError;
pub use formats::RasterFormat;
pub use plugin::{ImageLoaderPlugin, ENTRY_POINT};
