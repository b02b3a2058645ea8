use serde::{Deserialize, Serialize};

pub const METERS_PER_MILE: f64 = 1609.344;
pub const METERS_PER_YARD: f64 = 0.9144;
/// Display factor applied to altitude before it is shown in feet.
pub const METERS_TO_FEET: f64 = 0.3048;

/// Which distance algorithm the session runs. Miles accumulates the
/// path length, yards measures straight-line from the starting fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitMode {
    Miles,
    Yards,
}

impl UnitMode {
    /// Converts an accumulated distance in meters into the display unit.
    pub fn display_distance(&self, meters: f64) -> f64 {
        match self {
            UnitMode::Miles => meters / METERS_PER_MILE,
            UnitMode::Yards => meters / METERS_PER_YARD,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitMode::Miles => "mi",
            UnitMode::Yards => "yd",
        }
    }
}

pub fn altitude_display_ft(altitude_meters: f64) -> f64 {
    altitude_meters * METERS_TO_FEET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_conversions() {
        assert!((UnitMode::Miles.display_distance(1609.344) - 1.0).abs() < 1e-12);
        assert!((UnitMode::Yards.display_distance(0.9144) - 1.0).abs() < 1e-12);
    }
}
