//! Error type for the image loader plugin.
//!
//! Hook handlers report failures to the engine as strings; this enum keeps
//! the messages uniform.

use thiserror::Error;

/// Errors raised while configuring the loader or decoding an image.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A configured format name is not supported.
    #[error("Unsupported image format '{0}'")]
    UnknownFormat(String),

    /// The image file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The image header could not be decoded.
    #[error("Failed to decode '{location}': {source}")]
    Decode {
        /// Location of the image.
        location: String,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },
}
