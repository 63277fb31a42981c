//! Container formats: detection from magic bytes, MIME types, extensions.
//!
//! Four formats are encodable output targets (`webp`, `jpeg`, `png`,
//! `avif`). `gif`, `tiff` and `bmp` are accepted as sources only: they can
//! be decoded and stored in passthrough mode but never produced.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Webp,
    Jpeg,
    Png,
    Avif,
    Gif,
    Tiff,
    Bmp,
}

impl Format {
    /// Identify the container from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes)
            .ok()
            .and_then(Self::from_image_format)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Avif => Some(Self::Avif),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Tiff => Some(Self::Tiff),
            ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Map a file extension (case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webp" => Some(Self::Webp),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "avif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Whether this format can be produced by the transcoder.
    pub fn is_encodable(self) -> bool {
        matches!(self, Self::Webp | Self::Jpeg | Self::Png | Self::Avif)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Avif => "image/avif",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `format` field of an upload: an encodable target or `original`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedFormat {
    /// Store the upload byte-for-byte.
    Original,
    Encode(Format),
}

impl FromStr for RequestedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "original" {
            return Ok(Self::Original);
        }
        match Format::from_extension(&normalized) {
            Some(format) if format.is_encodable() => Ok(Self::Encode(format)),
            _ => Err(s.to_string()),
        }
    }
}

/// What to do with a `format` value that names no encodable target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFormatPolicy {
    /// Encode as WebP.
    #[default]
    Fallback,
    /// Fail the request with a validation error.
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_test_image, gradient_image};

    #[test]
    fn detects_encoded_containers() {
        let img = gradient_image(16, 16);
        assert_eq!(
            Format::detect(&encode_test_image(&img, ImageFormat::Png)),
            Some(Format::Png)
        );
        assert_eq!(
            Format::detect(&encode_test_image(&img, ImageFormat::Jpeg)),
            Some(Format::Jpeg)
        );
        assert_eq!(
            Format::detect(&encode_test_image(&img, ImageFormat::Bmp)),
            Some(Format::Bmp)
        );
    }

    #[test]
    fn detect_rejects_garbage() {
        assert_eq!(Format::detect(b"definitely not an image"), None);
        assert_eq!(Format::detect(&[]), None);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(Format::from_extension("JPG"), Some(Format::Jpeg));
        assert_eq!(Format::from_extension("Tif"), Some(Format::Tiff));
        assert_eq!(Format::from_extension("heic"), None);
    }

    #[test]
    fn only_four_formats_are_encodable() {
        let encodable: Vec<Format> = [
            Format::Webp,
            Format::Jpeg,
            Format::Png,
            Format::Avif,
            Format::Gif,
            Format::Tiff,
            Format::Bmp,
        ]
        .into_iter()
        .filter(|f| f.is_encodable())
        .collect();
        assert_eq!(
            encodable,
            vec![Format::Webp, Format::Jpeg, Format::Png, Format::Avif]
        );
    }

    #[test]
    fn requested_format_parsing() {
        assert_eq!("original".parse(), Ok(RequestedFormat::Original));
        assert_eq!(" WebP ".parse(), Ok(RequestedFormat::Encode(Format::Webp)));
        assert_eq!("jpg".parse(), Ok(RequestedFormat::Encode(Format::Jpeg)));
        assert_eq!(
            "gif".parse::<RequestedFormat>(),
            Err("gif".to_string())
        );
        assert_eq!(
            "heic".parse::<RequestedFormat>(),
            Err("heic".to_string())
        );
    }

    #[test]
    fn jpeg_extension_and_mime() {
        assert_eq!(Format::Jpeg.extension(), "jpg");
        assert_eq!(Format::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(Format::Jpeg.to_string(), "jpeg");
    }
}
