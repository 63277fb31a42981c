//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! preset plus the caller's overrides, compute parameters, and call the
//! backend.

use super::backend::{BackendError, EncodedAsset, ImageBackend, ImageMetadata};
use super::calculations::plan;
use super::format::RequestedFormat;
use super::params::{EffortSettings, EncodeSpec, Quality, TranscodeParams};
use crate::presets::Preset;
use tokio_util::sync::CancellationToken;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Whether the upload is re-encoded or stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Passthrough,
    Convert(EncodeSpec),
}

/// Resolve the caller's choices against a preset.
///
/// - `convert == false` or `requested == Some(Original)` → passthrough.
/// - No requested format → the preset's default format.
/// - Quality: the override clamped to 1–100, else the preset default.
pub fn resolve_mode(
    preset: &Preset,
    convert: bool,
    requested: Option<RequestedFormat>,
    quality_override: Option<i64>,
    efforts: &EffortSettings,
) -> Mode {
    let format = match (convert, requested) {
        (false, _) | (true, Some(RequestedFormat::Original)) => return Mode::Passthrough,
        (true, Some(RequestedFormat::Encode(format))) => format,
        (true, None) => preset.default_format,
    };
    let quality = quality_override
        .map(Quality::new)
        .unwrap_or(preset.default_quality);
    Mode::Convert(EncodeSpec {
        format,
        quality,
        effort: efforts.for_format(format),
    })
}

/// Source metadata plus the produced asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub original: ImageMetadata,
    pub original_len: usize,
    pub asset: EncodedAsset,
}

/// Run one upload through the backend.
///
/// Passthrough only inspects headers and hands back the input bytes
/// untouched. Convert mode plans dimensions against the preset bounds and
/// transcodes.
pub fn optimize(
    backend: &dyn ImageBackend,
    bytes: Vec<u8>,
    preset: &Preset,
    mode: Mode,
    cancel: &CancellationToken,
) -> Result<Optimized> {
    let original = backend.identify(&bytes)?;
    let original_len = bytes.len();

    let asset = match mode {
        Mode::Passthrough => EncodedAsset {
            bytes,
            format: original.source_format,
            width: original.width,
            height: original.height,
        },
        Mode::Convert(encode) => {
            let plan = plan(
                original.width,
                original.height,
                preset.max_width,
                preset.max_height,
            );
            backend.transcode(&bytes, &original, &TranscodeParams { plan, encode }, cancel)?
        }
    };

    Ok(Optimized {
        original,
        original_len,
        asset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::Format;
    use crate::imaging::params::Effort;
    use crate::presets::{PresetName, PresetRegistry};

    fn preset(name: PresetName) -> Preset {
        *PresetRegistry::default().get(name)
    }

    #[test]
    fn defaults_come_from_preset() {
        let mode = resolve_mode(
            &preset(PresetName::Large),
            true,
            None,
            None,
            &EffortSettings::default(),
        );
        assert_eq!(
            mode,
            Mode::Convert(EncodeSpec {
                format: Format::Webp,
                quality: Quality::new(90),
                effort: Effort(4),
            })
        );
    }

    #[test]
    fn convert_false_is_passthrough() {
        let mode = resolve_mode(
            &preset(PresetName::Large),
            false,
            Some(RequestedFormat::Encode(Format::Jpeg)),
            Some(50),
            &EffortSettings::default(),
        );
        assert_eq!(mode, Mode::Passthrough);
    }

    #[test]
    fn original_format_is_passthrough() {
        let mode = resolve_mode(
            &preset(PresetName::Medium),
            true,
            Some(RequestedFormat::Original),
            None,
            &EffortSettings::default(),
        );
        assert_eq!(mode, Mode::Passthrough);
    }

    #[test]
    fn quality_override_is_clamped() {
        let at = |q| {
            resolve_mode(
                &preset(PresetName::Medium),
                true,
                Some(RequestedFormat::Encode(Format::Jpeg)),
                Some(q),
                &EffortSettings::default(),
            )
        };
        assert_eq!(at(150), at(100));
        assert_eq!(at(-5), at(1));
        assert!(matches!(at(150), Mode::Convert(spec) if spec.quality.value() == 100));
    }

    #[test]
    fn avif_gets_max_effort() {
        let mode = resolve_mode(
            &preset(PresetName::Thumbnail),
            true,
            Some(RequestedFormat::Encode(Format::Avif)),
            None,
            &EffortSettings::default(),
        );
        assert!(matches!(mode, Mode::Convert(spec) if spec.effort == Effort(1)));
    }

    #[test]
    fn optimize_plans_against_preset_bounds() {
        let backend = MockBackend::with_metadata(4000, 3000, Format::Jpeg);
        let large = preset(PresetName::Large);
        let mode = resolve_mode(&large, true, None, None, &EffortSettings::default());

        let out = optimize(
            &backend,
            vec![0u8; 64],
            &large,
            mode,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!((out.asset.width, out.asset.height), (1200, 900));
        assert_eq!(out.asset.format, Format::Webp);
        assert_eq!(out.original_len, 64);
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Identify { len: 64 },
                RecordedOp::Transcode {
                    width: 1200,
                    height: 900,
                    resized: true,
                    format: Format::Webp,
                    quality: 90,
                    effort: 4,
                }
            ]
        );
    }

    #[test]
    fn optimize_small_image_skips_resize() {
        let backend = MockBackend::with_metadata(200, 200, Format::Png);
        let thumb = preset(PresetName::Thumbnail);
        let mode = resolve_mode(&thumb, true, None, None, &EffortSettings::default());

        let out = optimize(&backend, vec![1; 8], &thumb, mode, &CancellationToken::new()).unwrap();

        assert_eq!((out.asset.width, out.asset.height), (200, 200));
        assert!(matches!(
            backend.get_operations()[1],
            RecordedOp::Transcode { resized: false, .. }
        ));
    }

    #[test]
    fn passthrough_returns_input_untouched() {
        let backend = MockBackend::with_metadata(640, 480, Format::Png);
        let input = vec![7u8, 8, 9, 10];
        let out = optimize(
            &backend,
            input.clone(),
            &preset(PresetName::Thumbnail),
            Mode::Passthrough,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(out.asset.bytes, input);
        assert_eq!(out.asset.format, Format::Png);
        assert_eq!((out.asset.width, out.asset.height), (640, 480));
        // Header inspection only.
        assert_eq!(backend.get_operations().len(), 1);
    }

    #[test]
    fn encode_failure_is_surfaced() {
        let mut backend = MockBackend::with_metadata(100, 100, Format::Png);
        backend.fail_encode = true;
        let p = preset(PresetName::Medium);
        let mode = resolve_mode(&p, true, None, None, &EffortSettings::default());
        let result = optimize(&backend, vec![0; 4], &p, mode, &CancellationToken::new());
        assert!(matches!(result, Err(BackendError::Encode(_))));
    }
}
