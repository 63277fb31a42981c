//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::TargetPlan;

/// Fit `source` inside `max_w × max_h` without ever enlarging it.
///
/// Sources already inside the bounds are returned unchanged with
/// `will_resize == false`. Otherwise both edges are scaled by
/// `min(max_w / src_w, max_h / src_h)` and rounded, then clamped into
/// `1..=bound` so rounding can never push an edge past its limit.
///
/// # Examples
/// ```
/// # use image_optimizer::imaging::plan;
/// // 4000x3000 into 1200x1200 → scale 0.3
/// let p = plan(4000, 3000, 1200, 1200);
/// assert_eq!((p.width, p.height, p.will_resize), (1200, 900, true));
///
/// // Already small enough: untouched
/// let p = plan(200, 200, 300, 300);
/// assert_eq!((p.width, p.height, p.will_resize), (200, 200, false));
/// ```
pub fn plan(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> TargetPlan {
    if src_w <= max_w && src_h <= max_h {
        return TargetPlan {
            width: src_w,
            height: src_h,
            will_resize: false,
        };
    }

    let scale = f64::min(
        max_w as f64 / src_w as f64,
        max_h as f64 / src_h as f64,
    );
    let out_w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let out_h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));

    TargetPlan {
        width: out_w,
        height: out_h,
        will_resize: true,
    }
}
