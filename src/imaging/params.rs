//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which resolves presets and overrides into a concrete job) and the
//! [`backend`](super::backend) (which does the pixel work). This separation
//! lets tests swap in a recording mock without touching operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Effort`]: Encoder-specific CPU/density knob.
//! - [`EncodeSpec`]: Target format + quality + effort.
//! - [`TargetPlan`]: Output dimensions decided by the planner.
//! - [`TranscodeParams`]: Full specification of one transcode job.

use super::format::Format;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    /// Clamp any integer into `1..=100`. Out-of-range values are not errors.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Encoder effort. The meaning of the number depends on the target format:
///
/// | Format | Knob | Range | Default |
/// |---|---|---|---|
/// | webp | libwebp `method` (higher = slower, denser) | 0–6 | 4 |
/// | avif | rav1e speed (lower = slower, denser) | 1–10 | 1 |
/// | png | compression level, always best | - | - |
/// | jpeg | unused | - | - |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effort(pub u8);

/// Effort defaults and bounds per encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortSettings {
    pub webp_method: u8,
    pub avif_speed: u8,
}

impl Default for EffortSettings {
    fn default() -> Self {
        Self {
            webp_method: 4,
            avif_speed: 1,
        }
    }
}

impl EffortSettings {
    pub fn for_format(&self, format: Format) -> Effort {
        match format {
            Format::Webp => Effort(self.webp_method.min(6)),
            Format::Avif => Effort(self.avif_speed.clamp(1, 10)),
            _ => Effort(0),
        }
    }
}

/// How to encode a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSpec {
    /// Always an encodable format (see [`Format::is_encodable`]).
    pub format: Format,
    pub quality: Quality,
    pub effort: Effort,
}

/// Output dimensions for a conversion.
///
/// `will_resize` is true only when the source exceeds the preset bounds;
/// otherwise width/height equal the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPlan {
    pub width: u32,
    pub height: u32,
    pub will_resize: bool,
}

/// A fully resolved conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeParams {
    pub plan: TargetPlan,
    pub encode: EncodeSpec,
}
