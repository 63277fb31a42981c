//! Storage sinks: where optimized bytes end up.
//!
//! The pipeline writes each result exactly once through [`StorageSink::put`]
//! and returns the URL the sink hands back. There are no retries at this
//! layer; a failed write fails the request.
//!
//! | Sink | Backing | URL |
//! |---|---|---|
//! | [`FilesystemSink`] | directory tree under `root` | `{public_base_url}/{key}` |
//! | [`S3Sink`] | `put_object` on any S3-compatible store | `{public_base_url}/{key}` or the bucket URL |
//! | [`MemorySink`] | in-process map | `memory://{key}` |

use crate::config::{StorageBackend, StorageConfig};
use crate::naming::StorageKey;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend could not be reached or prepared.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The backend was reached but refused or failed the write.
    #[error("storage write failed: {0}")]
    WriteFailed(String),
}

#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Persist `bytes` under `key` and return its public URL.
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

fn join_url(base: &str, key: &StorageKey) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.as_str())
}

/// Build the sink named by `[storage] backend`.
pub async fn open_sink(config: &StorageConfig) -> Result<Arc<dyn StorageSink>, StorageError> {
    Ok(match config.backend {
        StorageBackend::Filesystem => Arc::new(FilesystemSink::new(
            &config.root,
            config.public_base_url.clone().unwrap_or_default(),
        )),
        StorageBackend::S3 => Arc::new(S3Sink::new(config).await?),
    })
}

// =============================================================================
// Filesystem
// =============================================================================

/// Writes objects as files under a root directory, one file per key.
#[derive(Debug, Clone)]
pub struct FilesystemSink {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemSink {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl StorageSink for FilesystemSink {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.root.join(key.as_str());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), size_bytes = bytes.len(), "wrote object");
        Ok(join_url(&self.public_base_url, key))
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

// =============================================================================
// S3
// =============================================================================

/// Single-request `put_object` uploads to an S3-compatible bucket.
pub struct S3Sink {
    client: S3Client,
    bucket: String,
    base_url: String,
}

impl S3Sink {
    /// Build a client from the standard AWS credential chain plus the
    /// endpoint/region overrides in `config`.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::Unavailable("storage.bucket is not set".into()))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let aws_config = loader.load().await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);
        // MinIO, R2, LocalStack
        if let Some(endpoint_url) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }
        let client = S3Client::from_conf(s3_config_builder.build());

        let region = aws_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        let base_url = public_base(config, &bucket, &region);

        info!(bucket = %bucket, region = %region, "S3 sink initialized");

        Ok(Self {
            client,
            bucket,
            base_url,
        })
    }
}

fn public_base(config: &StorageConfig, bucket: &str, region: &str) -> String {
    if let Some(base) = &config.public_base_url {
        return base.clone();
    }
    match &config.endpoint_url {
        Some(endpoint) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com"),
    }
}

#[async_trait]
impl StorageSink for S3Sink {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, key = %key, size_bytes = bytes.len()))]
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                    StorageError::Unavailable(e.to_string())
                }
                other => StorageError::WriteFailed(other.to_string()),
            })?;
        debug!("object uploaded");
        Ok(join_url(&self.base_url, key))
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

// =============================================================================
// Memory
// =============================================================================

/// Keeps objects in a map. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes and content type stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn put(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("memory sink poisoned".into()))?;
        objects.insert(key.path.clone(), (bytes, content_type.to_string()));
        Ok(format!("memory://{}", key.as_str()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
