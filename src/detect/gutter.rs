//! Gutter location: pixel coordinates → one dominant vertical split.
//!
//! A gutter is a vertical line crossing every scanned row, so its column
//! shows up once per row in the pixel scan. We count occurrences per column
//! and take the leftmost column present in at least `fuzz_margin` of the
//! rows.

use super::records::{pixel_records, PixelRecord};
use crate::config::GutterConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixels added to a detected column so a crop stays clear of the line.
pub const GUTTER_BUFFER: i64 = 20;

/// Outcome of gutter detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GutterPosition {
    /// A qualifying column was found; value includes [`GUTTER_BUFFER`].
    Detected(i64),
    /// No column qualified; value is the configured share of the width.
    Fallback(i64),
    /// No column qualified and no fallback is configured.
    NotFound,
}

impl GutterPosition {
    /// Plain integer form: the position, or `-1` when nothing was found.
    pub fn value(self) -> i64 {
        match self {
            GutterPosition::Detected(x) | GutterPosition::Fallback(x) => x,
            GutterPosition::NotFound => -1,
        }
    }

    pub fn position(self) -> Option<i64> {
        match self {
            GutterPosition::NotFound => None,
            other => Some(other.value()),
        }
    }

    pub fn is_detected(self) -> bool {
        matches!(self, GutterPosition::Detected(_))
    }
}

/// Find the leftmost column appearing in `row_count × fuzz_margin` rows.
///
/// Columns at or left of `ghost_margin` never count. With zero rows there is
/// nothing to be consistent across, so the fallback applies.
pub fn detect_gutter(
    records: &[PixelRecord],
    row_count: u32,
    image_width: u32,
    config: &GutterConfig,
) -> GutterPosition {
    let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
    for r in records.iter().filter(|r| r.x > config.ghost_margin) {
        *counts.entry(r.x).or_insert(0) += 1;
    }

    let threshold = f64::from(row_count) * config.fuzz_margin;
    let column = (row_count > 0)
        .then(|| counts.iter().find(|(_, n)| f64::from(**n) >= threshold))
        .flatten();

    match (column, config.override_fraction) {
        (Some((&x, _)), _) => GutterPosition::Detected(x.saturating_add(GUTTER_BUFFER)),
        (None, Some(fraction)) => {
            GutterPosition::Fallback((f64::from(image_width) * fraction).round() as i64)
        }
        (None, None) => GutterPosition::NotFound,
    }
}

/// Parse `"x y"` lines and locate the gutter.
pub fn parse_vertical_position_output(
    output: &str,
    row_count: u32,
    image_width: u32,
    config: &GutterConfig,
) -> GutterPosition {
    detect_gutter(&pixel_records(output), row_count, image_width, config)
}
