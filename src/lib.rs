//! # Image Optimizer
//!
//! Takes an arbitrary uploaded image, fits it inside a named preset's bounding
//! box, re-encodes it to a modern format, stores it under a collision-free key
//! and reports what it saved.
//!
//! # Architecture: One Request, One Pass
//!
//! ```text
//! validate → identify → plan → decode/resize/encode → key → store → assemble
//! ```
//!
//! Every stage is a plain function over in-memory values except the storage
//! write. The stages that touch pixels run as one job on a bounded worker
//! pool so the async runtime never blocks on CPU work.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`validate`] | Declared-MIME and size checks before any decode |
//! | [`presets`] | The immutable preset table (`thumbnail`, `medium`, `large`, `original`) |
//! | [`imaging`] | Dimension planning, format detection, decode/resize/encode backends |
//! | [`pool`] | Bounded rayon pool with cancellation for transcode jobs |
//! | [`naming`] | `optimized-images/{preset}/{millis}-{token}.{ext}` storage keys |
//! | [`storage`] | Filesystem, S3 and in-memory sinks |
//! | [`types`] | The result record, compression ratio and response JSON |
//! | [`process`] | The [`Pipeline`](process::Pipeline) tying the stages together |
//! | [`server`] | axum routes for the HTTP service |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Never Upscale
//!
//! A preset is a ceiling, not a target. Images already inside the box keep
//! their dimensions and are only re-encoded. Enlarging adds bytes without
//! adding detail.
//!
//! ## Encode Fully, Then Store Once
//!
//! The encoded asset is complete in memory before the single storage write.
//! A request either produces a stored object and a result, or an error and no
//! object. There are no retries inside the pipeline and no silent fallback to
//! passthrough when an encoder fails.
//!
//! ## Pure-Rust Decoding
//!
//! Decoding and resizing use the `image` crate (Lanczos3 resampling); AVIF
//! is encoded with `rav1e` through `image` and decoded with `rav1d`, so no C
//! codec library is needed for AV1. Lossy WebP and progressive JPEG
//! come from libwebp and `jpeg-encoder`, since `image` only writes lossless
//! WebP and baseline JPEG.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pool;
pub mod presets;
pub mod process;
pub mod server;
pub mod storage;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
