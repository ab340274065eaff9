//! Extension and signature mapping for raster formats.

use std::fmt;
use std::path::Path;

use image::ImageFormat;

/// Raster formats the loader can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    /// Portable Network Graphics
    Png,
    /// JPEG
    Jpeg,
    /// Graphics Interchange Format
    Gif,
    /// Windows bitmap
    Bmp,
    /// Tagged Image File Format
    Tiff,
    /// WebP
    WebP,
}

impl RasterFormat {
    /// Every supported format.
    pub const ALL: [RasterFormat; 6] = [
        Self::Png,
        Self::Jpeg,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
        Self::WebP,
    ];

    /// Determine the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Map a decoder format onto a supported format
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Tiff => Some(Self::Tiff),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect the format of a request.
    ///
    /// In-memory data is identified by its signature; otherwise the
    /// location's extension decides.
    pub fn detect(location: &str, data: Option<&[u8]>) -> Option<Self> {
        match data {
            Some(bytes) => image::guess_format(bytes)
                .ok()
                .and_then(Self::from_image_format),
            None => Path::new(location)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Self::from_extension),
        }
    }

    /// The decoder format
    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// Short lowercase name, as used in settings and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::WebP => "webp",
        }
    }

    /// MIME type of the format
    pub fn mime_type(&self) -> &'static str {
        self.image_format().to_mime_type()
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(RasterFormat::from_extension("JPG"), Some(RasterFormat::Jpeg));
        assert_eq!(RasterFormat::from_extension("tif"), Some(RasterFormat::Tiff));
        assert_eq!(RasterFormat::from_extension("fits"), None);
    }

    #[test]
    fn test_detect_prefers_signature() {
        let png_signature = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(
            RasterFormat::detect("m31.jpg", Some(&png_signature[..])),
            Some(RasterFormat::Png)
        );
        assert_eq!(RasterFormat::detect("m31.jpg", None), Some(RasterFormat::Jpeg));
        assert_eq!(RasterFormat::detect("m31.fits", None), None);
        assert_eq!(RasterFormat::detect("m31", Some(&b"SIMPLE  ="[..])), None);
    }

    #[test]
    fn test_names() {
        for format in RasterFormat::ALL {
            assert_eq!(RasterFormat::from_extension(format.as_str()), Some(format));
        }
        assert_eq!(RasterFormat::Png.mime_type(), "image/png");
    }
}
