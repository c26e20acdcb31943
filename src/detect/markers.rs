//! Marker clustering: connected components → horizontal split positions.
//!
//! Markers are full-width horizontal lines, so only the `y` of each
//! component matters. Thin components are rasterisation ghosts and are
//! dropped; the rest are sorted and greedily merged so that every marker
//! stands more than `merge_margin` pixels below the previous one.

use super::records::{component_records, ComponentRecord};
use crate::config::MarkerConfig;

/// Components this tall or shorter are treated as noise.
pub const GHOST_HEIGHT: i64 = 10;

/// Cluster component records into ascending, de-duplicated marker positions.
///
/// A value is merged into an existing cluster when it lies at most
/// `merge_margin` below a seed (`y <= seed + margin`). The check only looks
/// downward, which is why the values are sorted first.
pub fn detect_markers(records: &[ComponentRecord], merge_margin: i64) -> Vec<i64> {
    let margin = merge_margin.max(0);

    let mut ys: Vec<i64> = records
        .iter()
        .filter(|r| r.height > GHOST_HEIGHT)
        .map(|r| r.y)
        .collect();
    ys.sort_unstable();

    // Seeds are ascending, so the last one is the only candidate to merge with.
    ys.into_iter().fold(Vec::new(), |mut seeds, y| {
        if seeds.last().map_or(true, |&seed| y > seed.saturating_add(margin)) {
            seeds.push(y);
        }
        seeds
    })
}

/// Parse `"h x y"` lines and cluster them with the configured margin.
pub fn parse_marker_output(output: &str, config: &MarkerConfig) -> Vec<i64> {
    detect_markers(&component_records(output), config.merge_margin)
}
