//! Image processing on in-memory buffers.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions`, `avif-parse` |
//! | **Plan** | [`plan`]: fit inside the preset box, never enlarge |
//! | **Resize** | Lanczos3 via `image` |
//! | **Encode** | libwebp, `jpeg-encoder`, `image` PNG, rav1e AVIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Format**: Container detection, MIME types, extensions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, EncodedAsset, ImageBackend, ImageMetadata};
pub use calculations::plan;
pub use format::{Format, RequestedFormat, UnknownFormatPolicy};
pub use operations::{Mode, Optimized, optimize, resolve_mode};
pub use params::{Effort, EffortSettings, EncodeSpec, Quality, TargetPlan, TranscodeParams};
pub use rust_backend::{DEFAULT_MAX_PIXELS, RustBackend};
