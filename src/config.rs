//! Service configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top of it, so a
//! config file only has to name the values it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//!
//! [limits]
//! max_upload_bytes = 15728640   # 15 MiB
//! max_pixels = 40000000         # decoded width * height ceiling
//!
//! [processing]
//! max_processes = 4             # Max transcode workers (omit for auto = CPU cores)
//! queue_depth = 4               # Queued jobs allowed per worker
//!
//! [encoding]
//! unknown_format = "fallback"   # or "reject"
//! webp_method = 4               # libwebp method 0-6
//! avif_speed = 1                # rav1e speed 1-10 (1 = slowest, smallest)
//!
//! [presets.thumbnail]
//! max_width = 300
//! max_height = 300
//! quality = 80
//! format = "webp"
//!
//! [storage]
//! backend = "filesystem"        # or "s3"
//! root = "storage"
//! public_base_url = "/assets"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EffortSettings, Format, UnknownFormatPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Upload and decode ceilings.
    pub limits: LimitsConfig,
    /// Transcode worker pool sizing.
    pub processing: ProcessingConfig,
    /// Encoder knobs shared by every preset.
    pub encoding: EncodingConfig,
    /// Per-preset bounds, quality, and format.
    pub presets: PresetsConfig,
    /// Where optimized bytes are written.
    pub storage: StorageConfig,
    /// Log level and output shape.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Preset rows are checked when the registry is built from them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits.max_pixels must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.processing.queue_depth == 0 {
            return Err(ConfigError::Validation(
                "processing.queue_depth must be at least 1".into(),
            ));
        }
        if self.encoding.webp_method > 6 {
            return Err(ConfigError::Validation(
                "encoding.webp_method must be 0-6".into(),
            ));
        }
        if !(1..=10).contains(&self.encoding.avif_speed) {
            return Err(ConfigError::Validation(
                "encoding.avif_speed must be 1-10".into(),
            ));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_none() {
            return Err(ConfigError::Validation(
                "storage.bucket is required when storage.backend = \"s3\"".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted upload in bytes (inclusive).
    pub max_upload_bytes: usize,
    /// Largest accepted `width * height` of a source image.
    pub max_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: crate::validate::DEFAULT_MAX_UPLOAD_BYTES,
            max_pixels: crate::imaging::DEFAULT_MAX_PIXELS,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel transcode workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Jobs that may wait per worker before callers block.
    pub queue_depth: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            queue_depth: 4,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// What to do with an unrecognized `format` field.
    pub unknown_format: UnknownFormatPolicy,
    /// libwebp `method` (0 = fastest, 6 = smallest).
    pub webp_method: u8,
    /// rav1e speed (1 = slowest, smallest output).
    pub avif_speed: u8,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let efforts = EffortSettings::default();
        Self {
            unknown_format: UnknownFormatPolicy::default(),
            webp_method: efforts.webp_method,
            avif_speed: efforts.avif_speed,
        }
    }
}

impl EncodingConfig {
    pub fn efforts(&self) -> EffortSettings {
        EffortSettings {
            webp_method: self.webp_method,
            avif_speed: self.avif_speed,
        }
    }
}

/// One row of the preset table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Default quality, 1-100.
    pub quality: u32,
    /// Default output format.
    pub format: Format,
}

impl PresetConfig {
    fn square(edge: u32, quality: u32) -> Self {
        Self {
            max_width: edge,
            max_height: edge,
            quality,
            format: Format::Webp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetsConfig {
    pub thumbnail: PresetConfig,
    pub medium: PresetConfig,
    pub large: PresetConfig,
    pub original: PresetConfig,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            thumbnail: PresetConfig::square(300, 80),
            medium: PresetConfig::square(800, 85),
            large: PresetConfig::square(1200, 90),
            original: PresetConfig::square(2000, 95),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// Object storage settings.
///
/// `root` applies to the filesystem backend; `bucket`, `region`,
/// `endpoint_url` and `force_path_style` apply to S3. Credentials come from
/// the standard AWS environment/profile chain, never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub root: String,
    /// Prefix joined with the key to form the returned URL.
    pub public_base_url: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: "storage".to_string(),
            public_base_url: Some("/assets".to_string()),
            bucket: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ServiceConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, or stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Optimizer Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "0.0.0.0"
port = 3000

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted upload in bytes (15 MiB).
max_upload_bytes = 15728640

# Largest accepted source image, as width * height. Checked from the header
# before any pixels are decoded.
max_pixels = 40000000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel transcode workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Jobs allowed to wait per worker. Further requests wait for a slot.
queue_depth = 4

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Unrecognized "format" values: "fallback" encodes webp, "reject" fails the
# request with a 400.
unknown_format = "fallback"

# libwebp method, 0 (fast) to 6 (smallest).
webp_method = 4

# rav1e speed, 1 (slowest, smallest) to 10.
avif_speed = 1

# ---------------------------------------------------------------------------
# Presets: bounding box, default quality (1-100), default format
# (webp, jpeg, png, avif)
#
# A request without a `format` field is encoded in its preset's `format`.
# Every stock preset uses webp, so changing `format` here changes what
# format-less requests for that preset produce.
# ---------------------------------------------------------------------------
[presets.thumbnail]
max_width = 300
max_height = 300
quality = 80
format = "webp"

[presets.medium]
max_width = 800
max_height = 800
quality = 85
format = "webp"

[presets.large]
max_width = 1200
max_height = 1200
quality = 90
format = "webp"

[presets.original]
max_width = 2000
max_height = 2000
quality = 95
format = "webp"

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# "filesystem" writes under `root`; "s3" uses put_object.
backend = "filesystem"
root = "storage"

# Prefix for returned URLs. For the filesystem backend the server also
# serves `root` at /assets.
public_base_url = "/assets"

# S3 settings. Credentials come from the AWS environment/profile chain.
# bucket = "my-images"
# region = "us-east-1"
# endpoint_url = "http://localhost:9000"
force_path_style = false

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive; RUST_LOG overrides it.
level = "info"
json = false
"##
}
