//! Accuracy gating for raw location samples.

use workout_tracker_lib::geo_fix::GeoFix;

/// Horizontal-accuracy bound for accepting a raw fix, in meters.
/// The precision toggle changes what we request from the provider,
/// never this acceptance gate.
pub const ACCURACY_GATE_METERS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Rejected,
    Accepted,
    /// Accepted, and it was the first acceptable fix since the filter
    /// was armed. Fires exactly once per arming.
    AcceptedInitial,
}

/// Accepts or rejects raw fixes and latches the "initial fix obtained"
/// state the rest of the engine keys off of. Re-armed by [`reset`],
/// the latch never goes back to false on its own: if no fix is ever
/// accurate enough it simply stays unset and the caller keeps showing
/// the establishing-GPS state.
///
/// [`reset`]: LocationFilter::reset
#[derive(Debug, Default)]
pub struct LocationFilter {
    has_initial_fix: bool,
}

impl LocationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pure gate, with no latch side effect.
    pub fn accept(&self, fix: &GeoFix) -> bool {
        fix.horizontal_accuracy <= ACCURACY_GATE_METERS
    }

    /// Runs the gate and updates the initial-fix latch.
    pub fn observe(&mut self, fix: &GeoFix) -> Acceptance {
        if !self.accept(fix) {
            return Acceptance::Rejected;
        }
        if !self.has_initial_fix {
            self.has_initial_fix = true;
            return Acceptance::AcceptedInitial;
        }
        Acceptance::Accepted
    }

    pub fn has_initial_fix(&self) -> bool {
        self.has_initial_fix
    }

    /// Re-arms the filter for the next workout. The gate has to be
    /// re-acquired before route submission or distance accumulation
    /// restarts.
    pub fn reset(&mut self) {
        self.has_initial_fix = false;
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use geo_types::Point;

    use super::*;

    fn fix(accuracy: f64) -> GeoFix {
        GeoFix::new(
            Point::new(9.0, 55.0),
            30.0,
            accuracy,
            -1.0,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn gate_is_fixed_at_fifty_meters() {
        let filter = LocationFilter::new();
        assert!(filter.accept(&fix(5.0)));
        assert!(filter.accept(&fix(50.0)));
        assert!(!filter.accept(&fix(50.1)));
        assert!(!filter.accept(&fix(80.0)));
    }

    #[test]
    fn initial_latch_fires_once() {
        let mut filter = LocationFilter::new();
        assert_eq!(filter.observe(&fix(80.0)), Acceptance::Rejected);
        assert!(!filter.has_initial_fix());

        assert_eq!(filter.observe(&fix(10.0)), Acceptance::AcceptedInitial);
        assert!(filter.has_initial_fix());

        // Better accuracy later never re-fires the latch.
        assert_eq!(filter.observe(&fix(3.0)), Acceptance::Accepted);
        assert!(filter.has_initial_fix());
    }

    #[test]
    fn reset_rearms_the_latch() {
        let mut filter = LocationFilter::new();
        filter.observe(&fix(10.0));
        assert!(filter.has_initial_fix());

        filter.reset();
        assert!(!filter.has_initial_fix());
        assert_eq!(filter.observe(&fix(10.0)), Acceptance::AcceptedInitial);
    }
}
