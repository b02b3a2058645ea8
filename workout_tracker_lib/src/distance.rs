//! Pure distance/elevation computation over an ordered sequence of fixes.
//!
//! Two distance readings exist on purpose: the cumulative path length
//! (sum of consecutive segments) drives the miles display, while the
//! straight line from the first accepted fix to the latest one drives
//! the yards display. Degenerate input (empty or a single fix) is 0,
//! never an error.

use geo::{Distance, Haversine};

use crate::geo_fix::GeoFix;

/// Sum of the haversine distance between each consecutive pair, in meters.
pub fn cumulative_path_distance(fixes: &[GeoFix]) -> f64 {
    if fixes.len() < 2 {
        return 0.0;
    }
    fixes
        .windows(2)
        .map(|pair| Haversine.distance(pair[0].position, pair[1].position))
        .sum()
}

/// Haversine distance from the first fix to the last one, in meters.
/// Ignores everything in between, so it may shrink as fixes arrive.
pub fn straight_line_from_start(fixes: &[GeoFix]) -> f64 {
    if fixes.len() < 2 {
        return 0.0;
    }
    Haversine.distance(fixes[0].position, fixes[fixes.len() - 1].position)
}

/// Sum of the positive altitude deltas between consecutive fixes, in meters.
/// Descents contribute nothing, they are not subtracted.
pub fn elevation_gain(fixes: &[GeoFix]) -> f64 {
    if fixes.len() < 2 {
        return 0.0;
    }
    fixes
        .windows(2)
        .map(|pair| (pair[1].altitude - pair[0].altitude).max(0.0))
        .sum()
}
