//! Upload checks that run before any decode work.
//!
//! Only the declared MIME type and the byte count are looked at. Whether the
//! bytes really are an image is left to the decoder, which fails with
//! [`PipelineError::UnsupportedOrCorruptImage`].

use crate::process::PipelineError;

/// Default upload cap: 15 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// Reject uploads whose declared type is not `image/*` or that are too big.
pub fn validate_upload(
    bytes: &[u8],
    declared_mime: &str,
    max_bytes: usize,
) -> Result<(), PipelineError> {
    let mime = declared_mime.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(PipelineError::InvalidMimeType(declared_mime.to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(PipelineError::PayloadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    Ok(())
}
