//! Object keys for stored images.
//!
//! Every key follows one shape:
//!
//! ```text
//! optimized-images/{preset}/{unix_millis}-{token}.{ext}
//! optimized-images/large/1760630400123-3f9c0a7be41d2c85a0e6b7d9134f5c2e.webp
//! ```
//!
//! The token is 128 bits from the thread-local CSPRNG, sampled fresh per
//! call, so keys are unique without any coordination between workers or
//! processes. The millisecond prefix keeps listings roughly time-ordered.

use crate::presets::PresetName;
use rand::Rng;
use std::fmt;

/// Top-level prefix for everything this service writes.
pub const KEY_PREFIX: &str = "optimized-images";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub path: String,
}

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Build a key at the current time with a fresh random token.
pub fn generate_key(preset: PresetName, ext: &str) -> StorageKey {
    let millis = chrono::Utc::now().timestamp_millis();
    let token: u128 = rand::rng().random();
    key_from_parts(preset, ext, millis, token)
}

/// Assemble a key from explicit parts.
pub fn key_from_parts(preset: PresetName, ext: &str, unix_millis: i64, token: u128) -> StorageKey {
    StorageKey {
        path: format!(
            "{KEY_PREFIX}/{preset}/{unix_millis}-{token:032x}.{ext}",
            ext = ext.trim_start_matches('.').to_ascii_lowercase()
        ),
    }
}
