//! The per-request result record and its JSON shape.
//!
//! [`OptimizationResult`] is built once per successful upload by
//! [`assemble`] and handed back to the caller. The HTTP layer and the CLI's
//! `--json` output both serialize it as [`OptimizeResponse`].

use crate::imaging::Format;
use crate::naming::StorageKey;
use crate::presets::PresetName;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub url: String,
    pub key: StorageKey,
    pub preset: PresetName,
    pub original_bytes: usize,
    pub optimized_bytes: usize,
    pub original_size_kb: u64,
    pub optimized_size_kb: u64,
    pub format: Format,
    pub original_dims: Dimensions,
    pub optimized_dims: Dimensions,
    pub compression_ratio_pct: f64,
}

/// Byte counts rounded to the nearest KiB.
pub fn to_kb(bytes: usize) -> u64 {
    (bytes as f64 / 1024.0).round() as u64
}

/// Percentage saved, rounded to one decimal.
///
/// Negative when the output is larger than the input. A zero-byte original
/// has no meaningful ratio and reports `0.0`.
pub fn compression_ratio_pct(original_bytes: usize, optimized_bytes: usize) -> f64 {
    if original_bytes == 0 {
        return 0.0;
    }
    let pct = (1.0 - optimized_bytes as f64 / original_bytes as f64) * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Inputs to [`assemble`], gathered by the pipeline after the storage write.
#[derive(Debug, Clone)]
pub struct AssembleInput {
    pub url: String,
    pub key: StorageKey,
    pub preset: PresetName,
    pub original_bytes: usize,
    pub optimized_bytes: usize,
    pub format: Format,
    pub original_dims: Dimensions,
    pub optimized_dims: Dimensions,
}

pub fn assemble(input: AssembleInput) -> OptimizationResult {
    OptimizationResult {
        original_size_kb: to_kb(input.original_bytes),
        optimized_size_kb: to_kb(input.optimized_bytes),
        compression_ratio_pct: compression_ratio_pct(input.original_bytes, input.optimized_bytes),
        url: input.url,
        key: input.key,
        preset: input.preset,
        original_bytes: input.original_bytes,
        optimized_bytes: input.optimized_bytes,
        format: input.format,
        original_dims: input.original_dims,
        optimized_dims: input.optimized_dims,
    }
}

/// Wire shape of a successful optimization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub url: String,
    pub file_name: String,
    pub preset: PresetName,
    /// KiB
    pub original_size: u64,
    /// KiB
    pub optimized_size: u64,
    pub format: Format,
    pub dimensions: DimensionPair,
    /// One decimal, e.g. `"71.4"` or `"-3.0"`.
    pub compression_ratio: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionPair {
    pub original: Dimensions,
    pub optimized: Dimensions,
}

impl From<&OptimizationResult> for OptimizeResponse {
    fn from(result: &OptimizationResult) -> Self {
        Self {
            url: result.url.clone(),
            file_name: result.key.path.clone(),
            preset: result.preset,
            original_size: result.original_size_kb,
            optimized_size: result.optimized_size_kb,
            format: result.format,
            dimensions: DimensionPair {
                original: result.original_dims,
                optimized: result.optimized_dims,
            },
            compression_ratio: format!("{:.1}", result.compression_ratio_pct),
            message: "Image optimized successfully".to_string(),
        }
    }
}
