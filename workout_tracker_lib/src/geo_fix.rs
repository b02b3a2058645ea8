use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// A single location sample as delivered by the location provider.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub position: Point,
    /// Meters above sea level.
    pub altitude: f64,
    /// Radius of the 68% confidence circle, in meters.
    pub horizontal_accuracy: f64,
    /// Direction of travel in degrees clockwise from true north.
    /// Negative when the provider could not determine a course.
    pub course: f64,
    pub timestamp: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(
        position: Point,
        altitude: f64,
        horizontal_accuracy: f64,
        course: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            position,
            altitude,
            horizontal_accuracy,
            course,
            timestamp,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}

impl TryFrom<&[u8]> for GeoFix {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize_from(value).map_err(|_| "Failed to deserialize GeoFix")
    }
}

/// One point of the altitude profile collected while recording,
/// keyed by the distance at which it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudePoint {
    /// Display altitude, already converted to feet.
    pub altitude: f64,
    /// Display distance at the time of the sample.
    pub distance: f64,
}

pub fn encode_route(fixes: &[GeoFix]) -> Vec<u8> {
    bincode::serialize(fixes).unwrap()
}

pub fn decode_route(blob: &[u8]) -> Result<Vec<GeoFix>, &'static str> {
    bincode::deserialize(blob).map_err(|_| "Failed to deserialize route blob")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64) -> GeoFix {
        GeoFix::new(
            Point::new(lon, lat),
            120.0,
            5.0,
            -1.0,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn route_blob_round_trip() {
        let route = vec![fix(55.0, 9.0), fix(55.001, 9.001)];
        let blob = encode_route(&route);
        let decoded = decode_route(&blob).unwrap();
        assert_eq!(route, decoded);
    }

    #[test]
    fn bad_blob_is_an_error() {
        assert!(decode_route(&[0xde, 0xad]).is_err());
    }
}
