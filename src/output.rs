//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Optimize
//!
//! ```text
//! 001 photos/dawn.jpg → optimized-images/large/1760630400123-3f9c….webp
//!     4000x3000 → 1200x900 webp
//!     2344 KB → 234 KB (90.0% smaller)
//!     URL: /assets/optimized-images/large/1760630400123-3f9c….webp
//! 002 notes.txt
//!     Error: Invalid file type: text/plain. Only images are allowed
//!
//! Optimized 1 image, 1 failed: 2344 KB → 234 KB (90.0% smaller)
//! ```
//!
//! ## Presets
//!
//! ```text
//! thumbnail   300x300    q80  webp
//! medium      800x800    q85  webp
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::presets::PresetRegistry;
use crate::process::PipelineError;
use crate::types::{OptimizationResult, compression_ratio_pct, to_kb};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `90.0% smaller`, `3.0% larger`, `unchanged`.
fn describe_ratio(pct: f64) -> String {
    if pct > 0.0 {
        format!("{pct:.1}% smaller")
    } else if pct < 0.0 {
        format!("{:.1}% larger", -pct)
    } else {
        "unchanged".to_string()
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Optimize
// ============================================================================

pub fn format_result(index: usize, source: &Path, result: &OptimizationResult) -> Vec<String> {
    vec![
        format!(
            "{} {} → {}",
            format_index(index),
            source.display(),
            result.key
        ),
        format!(
            "{}{}x{} → {}x{} {}",
            indent(1),
            result.original_dims.width,
            result.original_dims.height,
            result.optimized_dims.width,
            result.optimized_dims.height,
            result.format
        ),
        format!(
            "{}{} KB → {} KB ({})",
            indent(1),
            result.original_size_kb,
            result.optimized_size_kb,
            describe_ratio(result.compression_ratio_pct)
        ),
        format!("{}URL: {}", indent(1), result.url),
    ]
}

pub fn format_failure(index: usize, source: &Path, err: &PipelineError) -> Vec<String> {
    vec![
        format!("{} {}", format_index(index), source.display()),
        format!("{}Error: {}", indent(1), err),
    ]
}

/// Totals across a batch. Sizes are summed in bytes before rounding.
pub fn format_summary(results: &[OptimizationResult], failed: usize) -> String {
    let original: usize = results.iter().map(|r| r.original_bytes).sum();
    let optimized: usize = results.iter().map(|r| r.optimized_bytes).sum();
    let mut line = format!("Optimized {}", plural(results.len(), "image"));
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }
    if !results.is_empty() {
        line.push_str(&format!(
            ": {} KB → {} KB ({})",
            to_kb(original),
            to_kb(optimized),
            describe_ratio(compression_ratio_pct(original, optimized))
        ));
    }
    line
}

pub fn print_result(index: usize, source: &Path, result: &OptimizationResult) {
    for line in format_result(index, source, result) {
        println!("{}", line);
    }
}

pub fn print_failure(index: usize, source: &Path, err: &PipelineError) {
    for line in format_failure(index, source, err) {
        println!("{}", line);
    }
}

pub fn print_summary(results: &[OptimizationResult], failed: usize) {
    println!();
    println!("{}", format_summary(results, failed));
}

// ============================================================================
// Presets
// ============================================================================

pub fn format_presets(registry: &PresetRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|p| {
            format!(
                "{:<11} {:<10} q{:<3} {}",
                p.name.as_str(),
                format!("{}x{}", p.max_width, p.max_height),
                p.default_quality.value(),
                p.default_format
            )
        })
        .collect()
}

pub fn print_presets(registry: &PresetRegistry) {
    for line in format_presets(registry) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Format;
    use crate::naming::key_from_parts;
    use crate::presets::PresetName;
    use crate::types::{AssembleInput, Dimensions, assemble};

    fn result(original_bytes: usize, optimized_bytes: usize) -> OptimizationResult {
        let key = key_from_parts(PresetName::Large, "webp", 1, 7);
        assemble(AssembleInput {
            url: format!("/assets/{key}"),
            key,
            preset: PresetName::Large,
            original_bytes,
            optimized_bytes,
            format: Format::Webp,
            original_dims: Dimensions {
                width: 4000,
                height: 3000,
            },
            optimized_dims: Dimensions {
                width: 1200,
                height: 900,
            },
        })
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn ratio_wording() {
        assert_eq!(describe_ratio(90.0), "90.0% smaller");
        assert_eq!(describe_ratio(-3.0), "3.0% larger");
        assert_eq!(describe_ratio(0.0), "unchanged");
    }

    #[test]
    fn result_block() {
        let lines = format_result(1, Path::new("photos/dawn.jpg"), &result(2_400_000, 240_000));
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("001 photos/dawn.jpg → optimized-images/large/1-"));
        assert_eq!(lines[1], "    4000x3000 → 1200x900 webp");
        assert_eq!(lines[2], "    2344 KB → 234 KB (90.0% smaller)");
        assert!(lines[3].starts_with("    URL: /assets/optimized-images/"));
    }

    #[test]
    fn failure_block() {
        let err = PipelineError::InvalidMimeType("text/plain".into());
        let lines = format_failure(2, Path::new("notes.txt"), &err);
        assert_eq!(lines[0], "002 notes.txt");
        assert!(lines[1].starts_with("    Error: Invalid file type: text/plain"));
    }

    #[test]
    fn summary_sums_bytes() {
        let results = vec![result(2048, 1024), result(2048, 1024)];
        assert_eq!(
            format_summary(&results, 0),
            "Optimized 2 images: 4 KB → 2 KB (50.0% smaller)"
        );
    }

    #[test]
    fn summary_with_failures_only() {
        assert_eq!(format_summary(&[], 3), "Optimized 0 images, 3 failed");
    }

    #[test]
    fn summary_single_image_with_failure() {
        let line = format_summary(&[result(1000, 1030)], 1);
        assert_eq!(line, "Optimized 1 image, 1 failed: 1 KB → 1 KB (3.0% larger)");
    }

    #[test]
    fn preset_table() {
        let lines = format_presets(&PresetRegistry::default());
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "thumbnail   300x300    q80  webp");
        assert_eq!(lines[3], "original    2000x2000  q95  webp");
    }
}
