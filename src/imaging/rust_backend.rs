//! Pure Rust image processing backend (plus libwebp for lossy WebP).
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify (JPEG, PNG, WebP, GIF, TIFF, BMP) | `image::ImageReader::into_dimensions` (header only) |
//! | Identify (AVIF) | `avif-parse` container metadata |
//! | Decode | `image` crate decoders under `image::Limits` |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1) + BT.601 YUV→RGB |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP | `webp` (libwebp, lossy, `method` = effort) |
//! | Encode → JPEG | `jpeg-encoder` (progressive, optimized Huffman tables) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed = effort) |
//!
//! The `image` crate's `"avif"` feature only provides the encoder; its
//! decoder needs the C library dav1d. AVIF uploads are decoded with `rav1d`,
//! the pure Rust port, straight from the in-memory bytes.

use super::backend::{BackendError, EncodedAsset, ImageBackend, ImageMetadata};
use super::format::Format;
use super::params::{EncodeSpec, TranscodeParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits, RgbImage};
use std::io::Cursor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default decoded-pixel ceiling: 40 megapixels (≈160 MB as RGBA8).
pub const DEFAULT_MAX_PIXELS: u64 = 40_000_000;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    max_pixels: u64,
}

impl RustBackend {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    fn check_pixels(&self, meta: &ImageMetadata) -> Result<(), BackendError> {
        if meta.pixels() > self.max_pixels {
            return Err(BackendError::TooManyPixels {
                width: meta.width,
                height: meta.height,
                max_pixels: self.max_pixels,
            });
        }
        Ok(())
    }

    /// Decode with an allocation cap derived from the pixel ceiling.
    ///
    /// 8 bytes per pixel covers 16-bit RGBA, the widest layout the enabled
    /// decoders produce.
    fn decode(
        &self,
        bytes: &[u8],
        source: &ImageMetadata,
    ) -> Result<DynamicImage, BackendError> {
        if source.source_format == Format::Avif {
            return decode_avif(bytes, self.max_pixels);
        }
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_pixels.saturating_mul(8));
        reader.limits(limits);
        reader
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PIXELS)
    }
}

/// Extract dimensions from an AVIF file's container metadata (no full decode needed).
fn identify_avif(bytes: &[u8]) -> Result<ImageMetadata, BackendError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("Failed to read AVIF metadata: {e:?}")))?;
    Ok(ImageMetadata {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
        source_format: Format::Avif,
    })
}

/// Decode an AVIF still: `avif-parse` for the container, `rav1d` for AV1.
///
/// Only the primary color item is decoded; an alpha item is dropped.
fn decode_avif(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as av1;
    use std::mem::MaybeUninit;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { av1::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    // Already running on a pool worker.
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { av1::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let decoded = (|| {
        let mut data = Dav1dData::default();
        let buf = unsafe { av1::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
        if buf.is_null() {
            return Err(BackendError::Decode("rav1d data_create failed".into()));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf, av1_bytes.len()) };

        let rc = unsafe { av1::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { av1::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(BackendError::Decode(format!(
                "rav1d send_data failed ({})",
                rc.0
            )));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { av1::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(BackendError::Decode(format!(
                "rav1d get_picture failed ({})",
                rc.0
            )));
        }
        let image = picture_to_rgb(&pic, max_pixels);
        unsafe { av1::dav1d_picture_unref(NonNull::new(&mut pic)) };
        image
    })();

    unsafe { av1::dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

/// Convert a decoded rav1d picture into an RGB8 image.
fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
    max_pixels: u64,
) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    // The container's declared size was checked; the frame itself may differ.
    if width as u64 * height as u64 > max_pixels {
        return Err(BackendError::TooManyPixels {
            width,
            height,
            max_pixels,
        });
    }

    let missing = || BackendError::Decode("rav1d returned a picture without planes".into());
    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(missing)
    };

    let layout = pic.p.layout;
    let y_ptr = plane(0)?;
    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }
    } else {
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            other => {
                return Err(BackendError::Decode(format!(
                    "Unsupported AVIF pixel layout: {other}"
                )));
            }
        };
        YuvPlanes {
            y_ptr,
            u_ptr: plane(1)?,
            v_ptr: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x,
            ss_y,
            monochrome: false,
        }
    };

    RgbImage::from_raw(width, height, planes.to_rgb())
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("decoded AVIF buffer has the wrong size".into()))
}

/// Borrowed YUV planes of a rav1d picture.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];
        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);
                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_sample(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc);
                    let cr = read_sample(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc);
                    let (cb, cr) = (cb - center, cr - center);
                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };
                let idx = (row as usize * self.width as usize + col as usize) * 3;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }
        rgb
    }
}

/// One sample from a plane; above 8 bits per channel samples are u16.
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { (ptr.offset(byte_offset) as *const u16).read_unaligned() }) as f32
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), BackendError> {
    if cancel.is_cancelled() {
        Err(BackendError::Cancelled)
    } else {
        Ok(())
    }
}

/// Lossy WebP through libwebp; `effort` is the `method` knob (0–6).
fn encode_webp(img: &DynamicImage, spec: &EncodeSpec) -> Result<Vec<u8>, BackendError> {
    let (w, h) = (img.width(), img.height());
    let mut config = webp::WebPConfig::new()
        .map_err(|_| BackendError::Encode("libwebp rejected the default config".into()))?;
    config.lossless = 0;
    config.quality = spec.quality.value() as f32;
    config.method = spec.effort.0 as i32;
    // Plain 4:2:0 chroma subsampling.
    config.use_sharp_yuv = 0;

    let memory = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), w, h).encode_advanced(&config)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), w, h).encode_advanced(&config)
    }
    .map_err(|e| BackendError::Encode(format!("WebP: {e:?}")))?;

    Ok(memory.to_vec())
}

/// Progressive JPEG with optimized Huffman tables. Alpha is discarded.
fn encode_jpeg(img: &DynamicImage, spec: &EncodeSpec) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let too_big = || {
        BackendError::Encode(format!(
            "JPEG: {}x{} exceeds 65535px per edge",
            rgb.width(),
            rgb.height()
        ))
    };
    let w = u16::try_from(rgb.width()).map_err(|_| too_big())?;
    let h = u16::try_from(rgb.height()).map_err(|_| too_big())?;

    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, spec.quality.value());
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| BackendError::Encode(format!("JPEG: {e}")))?;
    Ok(buf)
}

/// Lossless PNG at the best compression level; quality is ignored.
fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("PNG: {e}")))?;
    Ok(buf)
}

/// AVIF through rav1e; `effort` is the speed (1 = slowest, densest).
fn encode_avif(img: &DynamicImage, spec: &EncodeSpec) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder =
        AvifEncoder::new_with_speed_quality(&mut buf, spec.effort.0, spec.quality.value());
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    normalized
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("AVIF: {e}")))?;
    Ok(buf)
}

fn encode(img: &DynamicImage, spec: &EncodeSpec) -> Result<Vec<u8>, BackendError> {
    match spec.format {
        Format::Webp => encode_webp(img, spec),
        Format::Jpeg => encode_jpeg(img, spec),
        Format::Png => encode_png(img),
        Format::Avif => encode_avif(img, spec),
        other => Err(BackendError::Encode(format!(
            "{other} is not an output format"
        ))),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<ImageMetadata, BackendError> {
        let source_format = Format::detect(bytes)
            .ok_or_else(|| BackendError::Decode("unrecognized image container".into()))?;
        if source_format == Format::Avif {
            return identify_avif(bytes);
        }
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(ImageMetadata {
            width,
            height,
            source_format,
        })
    }

    fn transcode(
        &self,
        bytes: &[u8],
        source: &ImageMetadata,
        params: &TranscodeParams,
        cancel: &CancellationToken,
    ) -> Result<EncodedAsset, BackendError> {
        ensure_not_cancelled(cancel)?;
        self.check_pixels(source)?;

        let img = self.decode(bytes, source)?;
        ensure_not_cancelled(cancel)?;

        let img = if params.plan.will_resize {
            debug!(
                from_width = img.width(),
                from_height = img.height(),
                to_width = params.plan.width,
                to_height = params.plan.height,
                "Resizing"
            );
            img.resize_exact(params.plan.width, params.plan.height, FilterType::Lanczos3)
        } else {
            img
        };
        ensure_not_cancelled(cancel)?;

        let bytes = encode(&img, &params.encode)?;
        Ok(EncodedAsset {
            bytes,
            format: params.encode.format,
            width: img.width(),
            height: img.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Effort, Quality, TargetPlan};
    use crate::test_helpers::{encode_test_image, gradient_image, noise_image};
    use image::ImageFormat;

    fn params(width: u32, height: u32, will_resize: bool, format: Format) -> TranscodeParams {
        TranscodeParams {
            plan: TargetPlan {
                width,
                height,
                will_resize,
            },
            encode: EncodeSpec {
                format,
                quality: Quality::new(80),
                effort: match format {
                    Format::Webp => Effort(4),
                    Format::Avif => Effort(10),
                    _ => Effort(0),
                },
            },
        }
    }

    /// Identify then transcode, the way the pipeline drives a backend.
    fn run(
        backend: &RustBackend,
        bytes: &[u8],
        params: &TranscodeParams,
    ) -> Result<EncodedAsset, BackendError> {
        let source = backend.identify(bytes)?;
        backend.transcode(bytes, &source, params, &CancellationToken::new())
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    fn avif_of(width: u32, height: u32) -> Vec<u8> {
        let png = encode_test_image(&gradient_image(width, height), ImageFormat::Png);
        run(
            &RustBackend::default(),
            &png,
            &params(width, height, false, Format::Avif),
        )
        .unwrap()
        .bytes
    }

    #[test]
    fn identify_reads_header_dimensions() {
        let jpeg = encode_test_image(&gradient_image(200, 150), ImageFormat::Jpeg);
        let meta = RustBackend::default().identify(&jpeg).unwrap();
        assert_eq!(
            meta,
            ImageMetadata {
                width: 200,
                height: 150,
                source_format: Format::Jpeg
            }
        );
    }

    #[test]
    fn identify_garbage_is_decode_error() {
        let err = RustBackend::default()
            .identify(b"<html>not an image</html>")
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn truncated_png_fails_cleanly() {
        let png = encode_test_image(&gradient_image(64, 64), ImageFormat::Png);
        let truncated = &png[..png.len() / 2];
        let result = run(
            &RustBackend::default(),
            truncated,
            &params(64, 64, false, Format::Webp),
        );
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn resize_to_webp() {
        let png = encode_test_image(&gradient_image(400, 300), ImageFormat::Png);
        let asset = run(
            &RustBackend::default(),
            &png,
            &params(200, 150, true, Format::Webp),
        )
        .unwrap();
        assert_eq!(asset.format, Format::Webp);
        assert_eq!((asset.width, asset.height), (200, 150));
        assert_eq!(&asset.bytes[0..4], b"RIFF");
        assert_eq!(&asset.bytes[8..12], b"WEBP");
        let decoded = decode(&asset.bytes);
        assert_eq!((decoded.width(), decoded.height()), (200, 150));
    }

    #[test]
    fn no_resize_keeps_source_dimensions() {
        let png = encode_test_image(&gradient_image(120, 80), ImageFormat::Png);
        let asset = run(
            &RustBackend::default(),
            &png,
            &params(120, 80, false, Format::Png),
        )
        .unwrap();
        assert_eq!((asset.width, asset.height), (120, 80));
        assert_eq!(Format::detect(&asset.bytes), Some(Format::Png));
    }

    #[test]
    fn png_output_is_lossless() {
        let source = gradient_image(32, 32);
        let png = encode_test_image(&source, ImageFormat::Png);
        let asset = run(
            &RustBackend::default(),
            &png,
            &params(32, 32, false, Format::Png),
        )
        .unwrap();
        assert_eq!(decode(&asset.bytes).to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn jpeg_output_is_progressive() {
        let png = encode_test_image(&gradient_image(64, 48), ImageFormat::Png);
        let asset = run(
            &RustBackend::default(),
            &png,
            &params(64, 48, false, Format::Jpeg),
        )
        .unwrap();
        assert_eq!(&asset.bytes[0..2], &[0xFF, 0xD8]);
        // SOF2 marks a progressive DCT frame.
        assert!(asset.bytes.windows(2).any(|w| w == [0xFF, 0xC2]));
        assert_eq!(decode(&asset.bytes).width(), 64);
    }

    #[test]
    fn avif_output_and_container_identify() {
        let avif = avif_of(48, 32);
        assert_eq!(&avif[4..8], b"ftyp");

        let meta = RustBackend::default().identify(&avif).unwrap();
        assert_eq!((meta.width, meta.height), (48, 32));
        assert_eq!(meta.source_format, Format::Avif);
    }

    #[test]
    fn decode_avif_roundtrip() {
        let avif = avif_of(64, 48);
        let decoded = decode_avif(&avif, DEFAULT_MAX_PIXELS).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn decode_avif_keeps_colors_close() {
        let source = gradient_image(32, 32).to_rgb8();
        let avif = avif_of(32, 32);
        let decoded = decode_avif(&avif, DEFAULT_MAX_PIXELS).unwrap().to_rgb8();
        let center = |img: &RgbImage| img.get_pixel(16, 16).0;
        for (a, b) in center(&source).iter().zip(center(&decoded).iter()) {
            assert!(a.abs_diff(*b) < 40, "{:?} vs {:?}", center(&source), center(&decoded));
        }
    }

    #[test]
    fn avif_source_resized_to_webp() {
        let avif = avif_of(400, 300);
        let asset = run(
            &RustBackend::default(),
            &avif,
            &params(300, 225, true, Format::Webp),
        )
        .unwrap();
        assert_eq!(asset.format, Format::Webp);
        assert_eq!((asset.width, asset.height), (300, 225));
        assert_eq!(decode(&asset.bytes).width(), 300);
    }

    #[test]
    fn decoded_avif_frame_respects_pixel_ceiling() {
        let avif = avif_of(40, 40);
        assert_eq!(
            decode_avif(&avif, 1_000).map(|_| ()),
            Err(BackendError::TooManyPixels {
                width: 40,
                height: 40,
                max_pixels: 1_000
            })
        );
    }

    #[test]
    fn corrupt_avif_is_decode_error() {
        let mut avif = avif_of(32, 32);
        let len = avif.len();
        avif.truncate(len - len / 3);
        assert!(matches!(
            decode_avif(&avif, DEFAULT_MAX_PIXELS),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn lower_quality_gives_smaller_webp() {
        let png = encode_test_image(&noise_image(128, 128), ImageFormat::Png);
        let backend = RustBackend::default();
        let encode_at = |q: i64| {
            let mut p = params(128, 128, false, Format::Webp);
            p.encode.quality = Quality::new(q);
            run(&backend, &png, &p).unwrap().bytes.len()
        };
        assert!(encode_at(20) < encode_at(95));
    }

    #[test]
    fn pixel_ceiling_rejects_before_decode() {
        let png = encode_test_image(&gradient_image(100, 100), ImageFormat::Png);
        let result = run(
            &RustBackend::new(5_000),
            &png,
            &params(100, 100, false, Format::Webp),
        );
        assert_eq!(
            result,
            Err(BackendError::TooManyPixels {
                width: 100,
                height: 100,
                max_pixels: 5_000
            })
        );
    }

    #[test]
    fn transcode_uses_supplied_metadata() {
        let png = encode_test_image(&gradient_image(10, 10), ImageFormat::Png);
        let claimed = ImageMetadata {
            width: 50_000,
            height: 50_000,
            source_format: Format::Png,
        };
        let result = RustBackend::default().transcode(
            &png,
            &claimed,
            &params(10, 10, false, Format::Png),
            &CancellationToken::new(),
        );
        assert_eq!(
            result,
            Err(BackendError::TooManyPixels {
                width: 50_000,
                height: 50_000,
                max_pixels: DEFAULT_MAX_PIXELS
            })
        );
    }

    #[test]
    fn cancelled_token_stops_work() {
        let png = encode_test_image(&gradient_image(10, 10), ImageFormat::Png);
        let backend = RustBackend::default();
        let source = backend.identify(&png).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = backend.transcode(&png, &source, &params(10, 10, false, Format::Png), &token);
        assert_eq!(result, Err(BackendError::Cancelled));
    }
}
