//! Named resize/quality/format presets.
//!
//! The registry is an immutable value built once at startup from config
//! (see [`PresetsConfig`](crate::config::PresetsConfig)) and shared behind an
//! `Arc`. Nothing mutates it after construction.
//!
//! | preset | max_width | max_height | quality | format |
//! |---|---|---|---|---|
//! | thumbnail | 300 | 300 | 80 | webp |
//! | medium | 800 | 800 | 85 | webp |
//! | large | 1200 | 1200 | 90 | webp |
//! | original | 2000 | 2000 | 95 | webp |

use crate::config::{ConfigError, PresetConfig, PresetsConfig};
use crate::imaging::{Format, Quality};
use crate::process::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Thumbnail,
    Medium,
    Large,
    Original,
}

impl PresetName {
    pub const ALL: [PresetName; 4] = [
        PresetName::Thumbnail,
        PresetName::Medium,
        PresetName::Large,
        PresetName::Original,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| PipelineError::UnknownPreset(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: PresetName,
    pub max_width: u32,
    pub max_height: u32,
    #[serde(serialize_with = "serialize_quality")]
    pub default_quality: Quality,
    pub default_format: Format,
}

fn serialize_quality<S: serde::Serializer>(q: &Quality, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(q.value())
}

impl Preset {
    fn from_config(name: PresetName, config: &PresetConfig) -> Result<Self, ConfigError> {
        if config.max_width == 0 || config.max_height == 0 {
            return Err(ConfigError::Validation(format!(
                "presets.{name}: max_width and max_height must be non-zero"
            )));
        }
        if !(1..=100).contains(&config.quality) {
            return Err(ConfigError::Validation(format!(
                "presets.{name}.quality must be 1-100"
            )));
        }
        if !config.format.is_encodable() {
            return Err(ConfigError::Validation(format!(
                "presets.{name}.format must be one of webp, jpeg, png, avif"
            )));
        }
        Ok(Self {
            name,
            max_width: config.max_width,
            max_height: config.max_height,
            default_quality: Quality::new(config.quality as i64),
            default_format: config.format,
        })
    }
}

/// Read-only table of the four presets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRegistry {
    presets: [Preset; 4],
}

impl PresetRegistry {
    pub fn from_config(config: &PresetsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            presets: [
                Preset::from_config(PresetName::Thumbnail, &config.thumbnail)?,
                Preset::from_config(PresetName::Medium, &config.medium)?,
                Preset::from_config(PresetName::Large, &config.large)?,
                Preset::from_config(PresetName::Original, &config.original)?,
            ],
        })
    }

    pub fn get(&self, name: PresetName) -> &Preset {
        // `presets` is ordered like `PresetName::ALL`.
        &self.presets[name as usize]
    }

    /// Parse a client-supplied name and look it up.
    pub fn resolve(&self, name: &str) -> Result<&Preset, PipelineError> {
        Ok(self.get(name.parse()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::from_config(&PresetsConfig::default()).expect("stock presets must be valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_table() {
        let registry = PresetRegistry::default();
        let rows: Vec<(PresetName, u32, u32, u8, Format)> = registry
            .iter()
            .map(|p| {
                (
                    p.name,
                    p.max_width,
                    p.max_height,
                    p.default_quality.value(),
                    p.default_format,
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                (PresetName::Thumbnail, 300, 300, 80, Format::Webp),
                (PresetName::Medium, 800, 800, 85, Format::Webp),
                (PresetName::Large, 1200, 1200, 90, Format::Webp),
                (PresetName::Original, 2000, 2000, 95, Format::Webp),
            ]
        );
    }

    #[test]
    fn get_matches_name() {
        let registry = PresetRegistry::default();
        for name in PresetName::ALL {
            assert_eq!(registry.get(name).name, name);
        }
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let registry = PresetRegistry::default();
        assert_eq!(registry.resolve(" Large ").unwrap().max_width, 1200);
        assert_eq!(
            registry.resolve("THUMBNAIL").unwrap().name,
            PresetName::Thumbnail
        );
    }

    #[test]
    fn resolve_unknown_preset() {
        let registry = PresetRegistry::default();
        assert!(matches!(
            registry.resolve("huge"),
            Err(PipelineError::UnknownPreset(name)) if name == "huge"
        ));
        assert!(matches!(
            registry.resolve(""),
            Err(PipelineError::UnknownPreset(_))
        ));
    }

    #[test]
    fn config_overrides_apply() {
        let mut config = PresetsConfig::default();
        config.thumbnail.max_width = 150;
        config.thumbnail.format = Format::Avif;
        let registry = PresetRegistry::from_config(&config).unwrap();
        let thumb = registry.get(PresetName::Thumbnail);
        assert_eq!(thumb.max_width, 150);
        assert_eq!(thumb.default_format, Format::Avif);
    }

    #[test]
    fn invalid_presets_rejected() {
        let mut config = PresetsConfig::default();
        config.medium.max_height = 0;
        assert!(PresetRegistry::from_config(&config).is_err());

        let mut config = PresetsConfig::default();
        config.large.quality = 101;
        assert!(PresetRegistry::from_config(&config).is_err());

        let mut config = PresetsConfig::default();
        config.original.format = Format::Gif;
        assert!(PresetRegistry::from_config(&config).is_err());
    }
}
