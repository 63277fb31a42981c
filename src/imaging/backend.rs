//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: `identify` (header-only inspection) and `transcode` (decode,
//! optional resize, encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Everything works on
//! in-memory buffers; no backend touches the filesystem.

use super::format::Format;
use super::params::TranscodeParams;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Image is {width}x{height}, over the {max_pixels} pixel limit")]
    TooManyPixels {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("Transcode cancelled")]
    Cancelled,
}

/// Dimensions and container type read from the image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub source_format: Format,
}

impl ImageMetadata {
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Result of a transcode (or passthrough).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAsset {
    pub bytes: Vec<u8>,
    pub format: Format,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be pure CPU work with no I/O, callable from any
/// worker thread.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions and container type without decoding pixel data.
    fn identify(&self, bytes: &[u8]) -> Result<ImageMetadata, BackendError>;

    /// Decode, resize when `params.plan.will_resize`, and encode.
    ///
    /// `source` is what [`identify`](Self::identify) returned for `bytes`.
    /// Implementations check `cancel` between stages and return
    /// [`BackendError::Cancelled`] once it fires.
    fn transcode(
        &self,
        bytes: &[u8],
        source: &ImageMetadata,
        params: &TranscodeParams,
        cancel: &CancellationToken,
    ) -> Result<EncodedAsset, BackendError>;
}
