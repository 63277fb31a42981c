//! The optimization pipeline: one upload in, one stored asset out.
//!
//! ```text
//! validate → identify → plan → decode/resize/encode → key → store → assemble
//! ```
//!
//! Validation runs inline and rejects bad uploads before any work is queued.
//! Everything that touches pixels runs as a single job on the
//! [`TranscodePool`]. The storage write happens once, after encoding has
//! fully succeeded, so a failed request never leaves a partial object.
//!
//! The [`Pipeline`] holds only shared read-only state (`Arc`s) and is safe to
//! call from many requests at once.

use crate::config::{ConfigError, ServiceConfig, effective_threads};
use crate::imaging::{
    self, BackendError, EffortSettings, ImageBackend, RequestedFormat, RustBackend,
    UnknownFormatPolicy, resolve_mode,
};
use crate::naming::generate_key;
use crate::pool::{JobTag, PoolError, TranscodePool};
use crate::presets::{PresetName, PresetRegistry};
use crate::storage::{StorageError, StorageSink};
use crate::types::{AssembleInput, Dimensions, OptimizationResult, assemble};
use crate::validate::{DEFAULT_MAX_UPLOAD_BYTES, validate_upload};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Everything the caller supplies for one optimization.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    /// Client-declared MIME type. Only used for the `image/*` check.
    pub declared_mime: String,
    pub preset: PresetName,
    /// `false` stores the upload unchanged.
    pub convert: bool,
    /// `None` uses the preset's default format.
    pub requested_format: Option<RequestedFormat>,
    /// Clamped into 1-100 before use.
    pub quality_override: Option<i64>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid file type: {0}. Only images are allowed")]
    InvalidMimeType(String),
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Image too large: {width}x{height} exceeds {max_pixels} pixels")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("Unsupported or corrupt image: {0}")]
    UnsupportedOrCorruptImage(String),
    #[error("Failed to encode image: {0}")]
    EncodeFailure(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Failed to store image: {0}")]
    StorageWriteFailed(String),
    #[error("Request cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether the caller sent something unacceptable, as opposed to the
    /// service failing on an acceptable request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMimeType(_)
                | Self::PayloadTooLarge { .. }
                | Self::UnknownPreset(_)
                | Self::UnsupportedFormat(_)
                | Self::InvalidRequest(_)
                | Self::ImageTooLarge { .. }
        )
    }
}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Decode(msg) => Self::UnsupportedOrCorruptImage(msg),
            BackendError::Encode(msg) => Self::EncodeFailure(msg),
            BackendError::TooManyPixels {
                width,
                height,
                max_pixels,
            } => Self::ImageTooLarge {
                width,
                height,
                max_pixels,
            },
            BackendError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => Self::StorageUnavailable(msg),
            StorageError::WriteFailed(msg) => Self::StorageWriteFailed(msg),
        }
    }
}

impl From<PoolError> for PipelineError {
    fn from(err: PoolError) -> Self {
        Self::EncodeFailure(err.to_string())
    }
}

/// Parse a client `format` value under the configured policy.
///
/// Empty or missing means "preset default". Unrecognized names become WebP
/// under [`UnknownFormatPolicy::Fallback`] and an error under `Reject`.
pub fn parse_requested_format(
    raw: Option<&str>,
    policy: UnknownFormatPolicy,
) -> Result<Option<RequestedFormat>, PipelineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<RequestedFormat>() {
        Ok(format) => Ok(Some(format)),
        Err(unknown) => match policy {
            UnknownFormatPolicy::Fallback => {
                warn!(format = %unknown, "unknown output format, falling back to webp");
                Ok(Some(RequestedFormat::Encode(imaging::Format::Webp)))
            }
            UnknownFormatPolicy::Reject => Err(PipelineError::UnsupportedFormat(unknown)),
        },
    }
}

/// Errors raised while wiring a pipeline from config.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub struct Pipeline {
    presets: Arc<PresetRegistry>,
    backend: Arc<dyn ImageBackend>,
    pool: Arc<TranscodePool>,
    sink: Arc<dyn StorageSink>,
    max_upload_bytes: usize,
    efforts: EffortSettings,
    policy: UnknownFormatPolicy,
}

impl Pipeline {
    pub fn new(
        presets: Arc<PresetRegistry>,
        backend: Arc<dyn ImageBackend>,
        pool: Arc<TranscodePool>,
        sink: Arc<dyn StorageSink>,
    ) -> Self {
        Self {
            presets,
            backend,
            pool,
            sink,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            efforts: EffortSettings::default(),
            policy: UnknownFormatPolicy::default(),
        }
    }

    /// Wire the pure-Rust backend, a sized pool and the preset table from
    /// `config`, writing through `sink`.
    pub fn from_config(
        config: &ServiceConfig,
        sink: Arc<dyn StorageSink>,
    ) -> Result<Self, SetupError> {
        let presets = PresetRegistry::from_config(&config.presets)?;
        let pool = TranscodePool::new(
            effective_threads(&config.processing),
            config.processing.queue_depth,
        )?;
        info!(
            threads = pool.threads(),
            capacity = pool.capacity(),
            sink = sink.name(),
            "pipeline ready"
        );
        Ok(Self::new(
            Arc::new(presets),
            Arc::new(RustBackend::new(config.limits.max_pixels)),
            Arc::new(pool),
            sink,
        )
        .with_max_upload_bytes(config.limits.max_upload_bytes)
        .with_efforts(config.encoding.efforts())
        .with_unknown_format_policy(config.encoding.unknown_format))
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn with_efforts(mut self, efforts: EffortSettings) -> Self {
        self.efforts = efforts;
        self
    }

    pub fn with_unknown_format_policy(mut self, policy: UnknownFormatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn unknown_format_policy(&self) -> UnknownFormatPolicy {
        self.policy
    }

    /// Validate, transcode, store, and describe one upload.
    #[instrument(
        name = "optimize",
        skip(self, request),
        fields(preset = %request.preset, size_bytes = request.bytes.len())
    )]
    pub async fn optimize(
        &self,
        request: UploadRequest,
    ) -> Result<OptimizationResult, PipelineError> {
        validate_upload(&request.bytes, &request.declared_mime, self.max_upload_bytes)?;

        let preset = *self.presets.get(request.preset);
        let mode = resolve_mode(
            &preset,
            request.convert,
            request.requested_format,
            request.quality_override,
            &self.efforts,
        );

        let backend = self.backend.clone();
        let bytes = request.bytes;
        let optimized = self
            .pool
            .run(JobTag::new(preset.name), move |cancel| {
                imaging::optimize(backend.as_ref(), bytes, &preset, mode, cancel)
            })
            .await??;

        let asset = optimized.asset;
        let key = generate_key(preset.name, asset.format.extension());
        let optimized_bytes = asset.bytes.len();
        let url = self
            .sink
            .put(&key, asset.bytes, asset.format.mime_type())
            .await?;

        let result = assemble(AssembleInput {
            url,
            key,
            preset: preset.name,
            original_bytes: optimized.original_len,
            optimized_bytes,
            format: asset.format,
            original_dims: Dimensions {
                width: optimized.original.width,
                height: optimized.original.height,
            },
            optimized_dims: Dimensions {
                width: asset.width,
                height: asset.height,
            },
        });

        info!(
            key = %result.key,
            format = %result.format,
            width = result.optimized_dims.width,
            height = result.optimized_dims.height,
            original_bytes = result.original_bytes,
            optimized_bytes = result.optimized_bytes,
            ratio = result.compression_ratio_pct,
            "image optimized"
        );
        Ok(result)
    }
}
