//! Macrostate window partitioning.
//!
//! The global particle range of a node is divided into `num` windows, one per
//! compute slot. Boundaries follow an exponential spacing rule controlled by
//! the exponent `alpha`: trials at high particle counts cost more, so windows
//! narrow toward the high end of the range to even out the per-slot work.

use fh_core::errors::{ErrorInfo, FhError};
use serde::{Deserialize, Serialize};

/// Inclusive macrostate interval assigned to one compute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Smallest particle count sampled by the slot.
    pub min: i64,
    /// Largest particle count sampled by the slot.
    pub max: i64,
}

impl Window {
    /// Number of macrostates covered by the window.
    pub fn width(&self) -> i64 {
        self.max - self.min
    }
}

/// Input to [`partition_windows`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Smallest particle count of the node's range.
    pub min: i64,
    /// Largest particle count of the node's range.
    pub max: i64,
    /// Number of windows (compute slots).
    pub num: usize,
    /// Spacing exponent; larger values narrow the high-count windows faster.
    pub alpha: f64,
    /// Minimum number of macrostates per window segment.
    pub min_size: i64,
    /// Shared macrostates between adjacent windows.
    pub overlap: i64,
}

fn partition_error(code: &str, message: impl Into<String>) -> FhError {
    FhError::Partition(ErrorInfo::new(code, message))
}

/// Divides the range `[min, max]` into `num` overlapping windows under the
/// exponential spacing rule.
///
/// Segment boundaries follow `(min^a + (max^a - min^a) * i/num)^(1/a)`,
/// rounded to the nearest integer. When the formula would produce a segment
/// narrower than `min_size`, the floor wins and neighboring boundaries shift
/// to preserve total coverage; the last window always ends at `max`. Each
/// window except the first is extended downward by `overlap` states so that
/// adjacent slots share boundary macrostates for splicing.
pub fn partition_windows(spec: &WindowSpec) -> Result<Vec<Window>, FhError> {
    if spec.num < 1 {
        return Err(partition_error("no-slots", "at least one window is required"));
    }
    if spec.max <= spec.min {
        return Err(partition_error(
            "empty-range",
            format!("window range [{}, {}] is empty", spec.min, spec.max),
        ));
    }
    if spec.min < 0 {
        return Err(partition_error(
            "negative-minimum",
            format!("window minimum {} must not be negative", spec.min),
        ));
    }
    if spec.alpha <= 0.0 {
        return Err(partition_error(
            "bad-alpha",
            format!("spacing exponent must be positive, got {}", spec.alpha),
        ));
    }
    if spec.min_size < 1 {
        return Err(partition_error(
            "bad-min-size",
            format!("minimum window size must be at least 1, got {}", spec.min_size),
        ));
    }
    if spec.overlap < 0 {
        return Err(partition_error(
            "bad-overlap",
            format!("overlap must not be negative, got {}", spec.overlap),
        ));
    }
    if spec.overlap >= spec.min_size {
        return Err(partition_error(
            "overlap-exceeds-min-size",
            format!(
                "overlap {} must be smaller than the minimum window size {}",
                spec.overlap, spec.min_size
            ),
        ));
    }
    let range = spec.max - spec.min;
    let num = spec.num as i64;
    if spec
        .min_size
        .checked_mul(num)
        .map(|total| total > range)
        .unwrap_or(true)
    {
        return Err(partition_error(
            "floor-exceeds-range",
            format!(
                "{} windows of at least {} states exceed the range of {} states",
                spec.num, spec.min_size, range
            ),
        ));
    }

    let min_f = spec.min as f64;
    let max_f = spec.max as f64;
    let low = min_f.powf(spec.alpha);
    let high = max_f.powf(spec.alpha);

    let mut bounds = Vec::with_capacity(spec.num + 1);
    bounds.push(spec.min);
    for i in 1..num {
        let frac = i as f64 / num as f64;
        let raw = (low + (high - low) * frac).powf(1.0 / spec.alpha).round() as i64;
        // The floor keeps every segment at least min_size wide; the cap
        // leaves room for the remaining segments to end exactly at max.
        let floor = bounds[i as usize - 1] + spec.min_size;
        let cap = spec.max - (num - i) * spec.min_size;
        bounds.push(raw.clamp(floor, cap));
    }
    bounds.push(spec.max);

    let mut windows = Vec::with_capacity(spec.num);
    for i in 0..spec.num {
        // overlap < min_size keeps every lower bound above the previous
        // boundary, so extended windows never leave the node's range.
        let lower = if i == 0 { bounds[0] } else { bounds[i] - spec.overlap };
        windows.push(Window {
            min: lower,
            max: bounds[i + 1],
        });
    }
    validate_windows(&windows, spec)?;
    Ok(windows)
}

/// Verifies the post-construction invariants of a window layout.
pub fn validate_windows(windows: &[Window], spec: &WindowSpec) -> Result<(), FhError> {
    let first = windows.first().ok_or_else(|| {
        partition_error("no-windows", "window layout is empty")
    })?;
    let last = windows.last().expect("non-empty checked above");
    if first.min != spec.min {
        return Err(partition_error(
            "bad-first-window",
            format!("first window starts at {}, expected {}", first.min, spec.min),
        ));
    }
    if last.max != spec.max {
        return Err(partition_error(
            "bad-last-window",
            format!("last window ends at {}, expected {}", last.max, spec.max),
        ));
    }
    for (idx, window) in windows.iter().enumerate() {
        if window.width() <= 0 {
            return Err(partition_error(
                "window-too-narrow",
                format!("window {idx} [{}, {}] has non-positive width", window.min, window.max),
            ));
        }
    }
    for (idx, pair) in windows.windows(2).enumerate() {
        let shared = pair[0].max - pair[1].min;
        if shared < spec.overlap {
            return Err(partition_error(
                "insufficient-overlap",
                format!(
                    "windows {idx} and {} share {shared} states, expected at least {}",
                    idx + 1,
                    spec.overlap
                ),
            ));
        }
        if pair[1].min > pair[0].max {
            return Err(partition_error(
                "window-gap",
                format!("gap between windows {idx} and {}", idx + 1),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_segments_fall_back_to_floor() {
        // alpha large enough that the formula crowds early boundaries
        // together; the floor must win and coverage must be preserved.
        let spec = WindowSpec {
            min: 0,
            max: 20,
            num: 8,
            alpha: 16.0,
            min_size: 2,
            overlap: 0,
        };
        let windows = partition_windows(&spec).expect("partition");
        assert_eq!(windows.len(), 8);
        assert_eq!(windows[0].min, 0);
        assert_eq!(windows[7].max, 20);
        for window in &windows {
            assert!(window.width() >= 1);
        }
    }

    #[test]
    fn floor_times_num_exceeding_range_is_rejected() {
        let spec = WindowSpec {
            min: 0,
            max: 10,
            num: 8,
            alpha: 2.0,
            min_size: 2,
            overlap: 0,
        };
        let err = partition_windows(&spec).expect_err("must fail");
        assert!(matches!(err, FhError::Partition(_)));
    }
}
