//! Shared test utilities: synthetic images and encoders.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = encode_test_image(&gradient_image(400, 300), ImageFormat::Png);
//! let upload = upload(png, "image/png", PresetName::Thumbnail);
//! ```

use crate::imaging::RequestedFormat;
use crate::presets::PresetName;
use crate::process::UploadRequest;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Smooth RGB gradient; compresses well.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Deterministic pseudo-random noise; compresses badly.
pub fn noise_image(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x9E37_79B9;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        };
        image::Rgb([next(), next(), next()])
    }))
}

/// Encode with the `image` crate's default encoder for `format`.
pub fn encode_test_image(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// An upload in convert mode with no format or quality override.
pub fn upload(bytes: Vec<u8>, mime: &str, preset: PresetName) -> UploadRequest {
    UploadRequest {
        bytes,
        declared_mime: mime.to_string(),
        preset,
        convert: true,
        requested_format: None,
        quality_override: None,
    }
}

/// Same as [`upload`] with an explicit target format.
pub fn upload_as(
    bytes: Vec<u8>,
    mime: &str,
    preset: PresetName,
    format: RequestedFormat,
) -> UploadRequest {
    UploadRequest {
        requested_format: Some(format),
        ..upload(bytes, mime, preset)
    }
}
