//! The workout-session state machine.
//!
//! One long-lived [`TrackingSession`] exists for the lifetime of the
//! process. A workout boundary is a [`reset`], which returns every
//! accumulated metric to its zero value and re-arms the accuracy gate;
//! the instance is reused for the next workout.
//!
//! The session is deliberately synchronous. Everything asynchronous
//! (clock ticks, pedometer callbacks, geocoding, route submission)
//! happens in the engine actor, which reports outcomes back in through
//! the setters here.
//!
//! [`reset`]: TrackingSession::reset

use workout_tracker_lib::{
    clock::format_elapsed,
    distance::{cumulative_path_distance, straight_line_from_start},
    geo_fix::{AltitudePoint, GeoFix},
    units::{UnitMode, altitude_display_ft},
};

use crate::filter::{Acceptance, LocationFilter};

/// Shown by the GPS-accuracy indicator while no fix has arrived.
const GPS_ACCURACY_IDLE: f64 = 99.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Freshly constructed or just reset; not ready for fixes.
    Idle,
    /// Waiting for (or between) recordings; the accuracy gate is armed.
    Armed,
    /// Recording and the first accepted fix has arrived.
    Recording,
}

/// What a call to [`TrackingSession::ingest`] did, so the caller can
/// trigger the asynchronous side effects that hang off accumulation.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    /// The initial-fix latch fired on this batch: reverse-geocode the
    /// place name and play the GPS-acquired cue.
    pub initial_fix_acquired: bool,
    /// The fix that fired the latch, for the one-shot geocode/weather
    /// lookups. Present even when the latch fires before recording.
    pub latch_fix: Option<GeoFix>,
    /// `first_fix` was captured on this batch: query the step-count
    /// baseline.
    pub baseline_needed: bool,
    /// The integer part of the display distance grew to this value:
    /// play the mile cue.
    pub marker_crossed: Option<i64>,
    /// The fixes that passed the gate, in arrival order, for route
    /// submission.
    pub newly_accepted: Vec<GeoFix>,
}

#[derive(Debug)]
pub struct TrackingSession {
    unit_mode: UnitMode,
    phase: SessionPhase,
    recording: bool,
    filter: LocationFilter,

    first_fix: Option<GeoFix>,
    last_fix: Option<GeoFix>,
    accepted_fixes: Vec<GeoFix>,

    /// Display distance in the current unit mode.
    distance: f64,
    /// Distance captured by the last reset, for the summary screen.
    final_distance: f64,
    elapsed_seconds: f64,
    formatted_time: String,

    step_count: i64,
    /// Cumulative daily steps at the moment the first fix was captured.
    /// `None` means the baseline query failed or has not returned yet;
    /// raw pedometer counts are reported unadjusted in that case.
    step_baseline: Option<i64>,

    heart_rate: f64,
    heart_rate_readings: Vec<f64>,
    active_energy: f64,

    altitude_ft: f64,
    altitude_profile: Vec<AltitudePoint>,

    gps_accuracy: f64,
    last_cue_marker: i64,
    place_name: String,
    establishing_gps: bool,
    not_authorized: bool,
}

impl TrackingSession {
    pub fn new(unit_mode: UnitMode) -> Self {
        Self {
            unit_mode,
            phase: SessionPhase::Idle,
            recording: false,
            filter: LocationFilter::new(),
            first_fix: None,
            last_fix: None,
            accepted_fixes: Vec::new(),
            distance: 0.0,
            final_distance: 0.0,
            elapsed_seconds: 0.0,
            formatted_time: format_elapsed(0.0),
            step_count: 0,
            step_baseline: None,
            heart_rate: 0.0,
            heart_rate_readings: Vec::new(),
            active_energy: 0.0,
            altitude_ft: 0.0,
            altitude_profile: Vec::new(),
            gps_accuracy: GPS_ACCURACY_IDLE,
            last_cue_marker: 0,
            place_name: String::new(),
            establishing_gps: false,
            not_authorized: false,
        }
    }

    /// Arms the session for the next workout. Call once after
    /// construction and once after every [`reset`](Self::reset).
    pub fn prepare(&mut self) {
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Armed;
        }
    }

    /// Marks the session recording. Idempotent.
    pub fn start_updates(&mut self) {
        self.recording = true;
    }

    /// Mirror of the platform session state; the coordinator is the
    /// source of truth for running/paused.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Runs a raw location batch through the gate, in array order.
    /// Rejected fixes are dropped entirely. Accepted fixes update the
    /// fix history and recompute the distance with the algorithm the
    /// current unit mode selects.
    pub fn ingest(&mut self, batch: &[GeoFix]) -> IngestReport {
        let mut report = IngestReport::default();

        let Some(latest) = batch.last() else {
            self.establishing_gps = true;
            return report;
        };
        self.gps_accuracy = latest.horizontal_accuracy;
        self.establishing_gps = false;

        for fix in batch {
            match self.filter.observe(fix) {
                Acceptance::Rejected => continue,
                Acceptance::AcceptedInitial => {
                    report.initial_fix_acquired = true;
                    report.latch_fix = Some(fix.clone());
                }
                Acceptance::Accepted => {}
            }

            if !self.recording {
                continue;
            }

            if self.first_fix.is_none() {
                // Set exactly once per session; the step baseline is
                // captured against this moment.
                self.first_fix = Some(fix.clone());
                report.baseline_needed = true;
                self.phase = SessionPhase::Recording;
            }

            self.accepted_fixes.push(fix.clone());
            self.last_fix = Some(fix.clone());
            self.altitude_ft = altitude_display_ft(fix.altitude);

            let meters = match self.unit_mode {
                UnitMode::Miles => cumulative_path_distance(&self.accepted_fixes),
                UnitMode::Yards => straight_line_from_start(&self.accepted_fixes),
            };
            self.distance = self.unit_mode.display_distance(meters);
            self.altitude_profile.push(AltitudePoint {
                altitude: self.altitude_ft,
                distance: self.distance,
            });

            let marker = self.distance as i64;
            if marker > self.last_cue_marker {
                self.last_cue_marker = marker;
                report.marker_crossed = Some(marker);
            }

            report.newly_accepted.push(fix.clone());
            report.accepted += 1;
        }

        report
    }

    /// Advances the 1 Hz elapsed-time clock. Ticks arriving while not
    /// recording (e.g. paused) are ignored.
    pub fn tick(&mut self) {
        if self.recording {
            self.elapsed_seconds += 1.0;
            self.formatted_time = format_elapsed(self.elapsed_seconds);
        }
    }

    /// Stops recording and returns the formatted elapsed time as it
    /// stood, so a final time can be displayed even when resetting.
    /// With `reset_after` the whole session is zeroed; without it the
    /// fix history and distance stay readable for the summary screen.
    /// Safe to call when nothing is recording.
    pub fn stop_updates(&mut self, reset_after: bool) -> String {
        self.recording = false;
        self.first_fix = None;
        self.last_fix = None;
        let time_string = self.formatted_time.clone();
        if reset_after {
            self.reset();
        } else {
            self.phase = SessionPhase::Armed;
        }
        time_string
    }

    /// Returns every accumulated metric to its zero value and re-arms
    /// the accuracy gate. Called exactly once per workout boundary;
    /// calling it mid-recording discards the in-progress data, which is
    /// what the restart button wants.
    pub fn reset(&mut self) {
        self.final_distance = self.distance;

        self.recording = false;
        self.first_fix = None;
        self.last_fix = None;
        self.accepted_fixes.clear();

        self.distance = 0.0;
        self.elapsed_seconds = 0.0;
        self.formatted_time = format_elapsed(0.0);

        self.step_count = 0;
        self.step_baseline = None;

        self.heart_rate = 0.0;
        self.heart_rate_readings.clear();
        self.active_energy = 0.0;

        self.altitude_ft = 0.0;
        self.altitude_profile.clear();

        self.gps_accuracy = GPS_ACCURACY_IDLE;
        self.last_cue_marker = 0;
        self.place_name.clear();
        self.establishing_gps = false;

        self.filter.reset();
        self.phase = SessionPhase::Idle;
    }

    /// Switching units mid-recording aborts the current workout rather
    /// than reinterpreting the in-flight data. Returns true when a
    /// recording was aborted so the caller can tear down the clock and
    /// the location/pedometer subscriptions.
    pub fn set_unit_mode(&mut self, unit_mode: UnitMode) -> bool {
        let aborted = self.recording;
        if aborted {
            let _ = self.stop_updates(true);
        }
        self.unit_mode = unit_mode;
        aborted
    }

    pub fn set_step_baseline(&mut self, steps: i64) {
        self.step_baseline = Some(steps);
    }

    /// Applies a cumulative daily step count from the pedometer.
    /// Without a baseline the raw count is reported as-is, a known
    /// degraded mode.
    pub fn apply_raw_steps(&mut self, raw_steps: i64) {
        self.step_count = match self.step_baseline {
            Some(baseline) => (raw_steps - baseline).max(0),
            None => raw_steps,
        };
    }

    pub fn set_heart_rate(&mut self, bpm: f64) {
        self.heart_rate = bpm;
        self.heart_rate_readings.push(bpm);
    }

    /// Mean over the collected heart-rate readings; 0 with no readings.
    /// `drain` empties the buffer after reading, for the summary screen.
    pub fn average_heart_rate(&mut self, drain: bool) -> f64 {
        let average = if self.heart_rate_readings.is_empty() {
            0.0
        } else {
            self.heart_rate_readings.iter().sum::<f64>() / self.heart_rate_readings.len() as f64
        };
        if drain {
            self.heart_rate_readings.clear();
        }
        average
    }

    pub fn set_active_energy(&mut self, kilocalories: f64) {
        self.active_energy = kilocalories;
    }

    pub fn set_place_name(&mut self, name: String) {
        self.place_name = name;
    }

    pub fn set_not_authorized(&mut self, value: bool) {
        self.not_authorized = value;
    }

    // Read-only surface for the coordinator and the snapshot.

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The single authoritative "have we got a good fix yet" gate.
    /// Route submission and the establishing-GPS screen both key off
    /// this; there is deliberately no second copy of the threshold.
    pub fn has_initial_fix(&self) -> bool {
        self.filter.has_initial_fix()
    }

    pub fn unit_mode(&self) -> UnitMode {
        self.unit_mode
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn final_distance(&self) -> f64 {
        self.final_distance
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn formatted_time(&self) -> &str {
        &self.formatted_time
    }

    pub fn first_fix(&self) -> Option<&GeoFix> {
        self.first_fix.as_ref()
    }

    pub fn last_fix(&self) -> Option<&GeoFix> {
        self.last_fix.as_ref()
    }

    pub fn accepted_fixes(&self) -> &[GeoFix] {
        &self.accepted_fixes
    }

    pub fn altitude_profile(&self) -> &[AltitudePoint] {
        &self.altitude_profile
    }

    pub fn altitude_ft(&self) -> f64 {
        self.altitude_ft
    }

    pub fn step_count(&self) -> i64 {
        self.step_count
    }

    pub fn step_baseline(&self) -> Option<i64> {
        self.step_baseline
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    pub fn active_energy(&self) -> f64 {
        self.active_energy
    }

    pub fn gps_accuracy(&self) -> f64 {
        self.gps_accuracy
    }

    pub fn place_name(&self) -> &str {
        &self.place_name
    }

    pub fn establishing_gps(&self) -> bool {
        self.establishing_gps
    }

    pub fn not_authorized(&self) -> bool {
        self.not_authorized
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use geo_types::Point;
    use workout_tracker_lib::units::{METERS_PER_MILE, METERS_PER_YARD};

    use super::*;

    fn fix(lat: f64, lon: f64, accuracy: f64) -> GeoFix {
        GeoFix::new(
            Point::new(lon, lat),
            100.0,
            accuracy,
            -1.0,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    fn armed_session(unit_mode: UnitMode) -> TrackingSession {
        let mut session = TrackingSession::new(unit_mode);
        session.prepare();
        session.start_updates();
        session
    }

    #[test]
    fn miles_mode_sums_consecutive_segments() {
        let mut session = armed_session(UnitMode::Miles);
        session.ingest(&[
            fix(0.0, 0.0, 10.0),
            fix(0.0, 0.001, 10.0),
            fix(0.0, 0.002, 10.0),
        ]);
        let meters = session.distance() * METERS_PER_MILE;
        assert!((meters - 222.4).abs() < 1.0, "got {meters} m");
        assert_eq!(session.accepted_fixes().len(), 3);
        assert_eq!(session.phase(), SessionPhase::Recording);
    }

    #[test]
    fn yards_mode_measures_from_the_start() {
        let mut session = armed_session(UnitMode::Yards);
        session.ingest(&[
            fix(0.0, 0.0, 10.0),
            fix(0.0, 0.001, 10.0),
            fix(0.0, 0.002, 10.0),
        ]);
        let meters = session.distance() * METERS_PER_YARD;
        // Straight line from fix 1 to fix 3, the middle point's path
        // contribution is ignored.
        assert!((meters - 222.4).abs() < 1.0, "got {meters} m");
    }

    #[test]
    fn inaccurate_fixes_are_dropped_entirely() {
        let mut session = armed_session(UnitMode::Miles);
        let report = session.ingest(&[fix(0.0, 0.0, 80.0)]);
        assert_eq!(report.accepted, 0);
        assert!(session.accepted_fixes().is_empty());
        assert!(!session.has_initial_fix());
        assert_eq!(session.distance(), 0.0);
    }

    #[test]
    fn first_fix_is_captured_once_and_kept() {
        let mut session = armed_session(UnitMode::Miles);
        let report = session.ingest(&[fix(0.0, 0.0, 45.0)]);
        assert!(report.initial_fix_acquired);
        assert!(report.baseline_needed);
        let captured = session.first_fix().cloned().unwrap();

        // Later fixes with better accuracy never replace it.
        let report = session.ingest(&[fix(0.0, 0.001, 3.0), fix(0.0, 0.002, 3.0)]);
        assert!(!report.initial_fix_acquired);
        assert!(!report.baseline_needed);
        assert_eq!(session.first_fix(), Some(&captured));
        assert_eq!(session.last_fix().unwrap().longitude(), 0.002);
    }

    #[test]
    fn empty_batch_raises_establishing_gps() {
        let mut session = armed_session(UnitMode::Miles);
        session.ingest(&[]);
        assert!(session.establishing_gps());
        session.ingest(&[fix(0.0, 0.0, 10.0)]);
        assert!(!session.establishing_gps());
    }

    #[test]
    fn marker_cue_fires_when_the_integer_part_grows() {
        let mut session = armed_session(UnitMode::Miles);
        let report = session.ingest(&[fix(0.0, 0.0, 10.0), fix(0.0, 0.008, 10.0)]);
        assert_eq!(report.marker_crossed, None);

        // ~1668 m total, past the first mile.
        let report = session.ingest(&[fix(0.0, 0.015, 10.0)]);
        assert_eq!(report.marker_crossed, Some(1));

        // No re-fire while the integer part stays put.
        let report = session.ingest(&[fix(0.0, 0.0151, 10.0)]);
        assert_eq!(report.marker_crossed, None);
    }

    #[test]
    fn step_counts_are_rebased_on_the_baseline() {
        let mut session = armed_session(UnitMode::Miles);
        session.apply_raw_steps(4200);
        // No baseline yet: raw count reported as-is (degraded mode).
        assert_eq!(session.step_count(), 4200);

        session.set_step_baseline(4000);
        session.apply_raw_steps(4350);
        assert_eq!(session.step_count(), 350);

        // A pedometer restart can hand back a smaller cumulative count.
        session.apply_raw_steps(3000);
        assert_eq!(session.step_count(), 0);
    }

    #[test]
    fn stop_without_reset_keeps_the_summary_readable() {
        let mut session = armed_session(UnitMode::Miles);
        for i in 0..5 {
            session.ingest(&[fix(0.0, 0.001 * f64::from(i), 10.0)]);
        }
        session.tick();
        session.tick();

        let time_string = session.stop_updates(false);
        assert_eq!(time_string, "00:02");
        assert!(!session.is_recording());
        assert_eq!(session.accepted_fixes().len(), 5);
        assert!(session.distance() > 0.0);
        assert!(session.first_fix().is_none());
        assert!(session.last_fix().is_none());

        // A second stop, now with the reset, zeroes everything.
        let final_distance = session.distance();
        session.stop_updates(true);
        assert_eq!(session.distance(), 0.0);
        assert!(session.accepted_fixes().is_empty());
        assert_eq!(session.final_distance(), final_distance);
    }

    #[test]
    fn reset_returns_every_field_to_zero() {
        let mut session = armed_session(UnitMode::Miles);
        session.ingest(&[fix(0.0, 0.0, 10.0), fix(0.0, 0.01, 10.0)]);
        session.set_step_baseline(100);
        session.apply_raw_steps(250);
        session.set_heart_rate(141.0);
        session.set_active_energy(87.0);
        session.set_place_name("Aarhus".into());
        for _ in 0..65 {
            session.tick();
        }

        session.reset();

        assert_eq!(session.distance(), 0.0);
        assert!(session.accepted_fixes().is_empty());
        assert!(session.first_fix().is_none());
        assert!(session.last_fix().is_none());
        assert_eq!(session.elapsed_seconds(), 0.0);
        assert_eq!(session.formatted_time(), "00:00");
        assert_eq!(session.step_count(), 0);
        assert_eq!(session.step_baseline(), None);
        assert_eq!(session.heart_rate(), 0.0);
        assert_eq!(session.average_heart_rate(false), 0.0);
        assert_eq!(session.active_energy(), 0.0);
        assert!(session.altitude_profile().is_empty());
        assert_eq!(session.place_name(), "");
        assert!(!session.has_initial_fix());
        assert!(!session.is_recording());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.gps_accuracy(), GPS_ACCURACY_IDLE);
    }

    #[test]
    fn switching_units_mid_recording_aborts_the_workout() {
        let mut session = armed_session(UnitMode::Miles);
        session.ingest(&[fix(0.0, 0.0, 10.0), fix(0.0, 0.005, 10.0)]);
        assert!(session.is_recording());

        let aborted = session.set_unit_mode(UnitMode::Yards);
        assert!(aborted);
        assert!(!session.is_recording());
        assert_eq!(session.distance(), 0.0);
        assert!(session.accepted_fixes().is_empty());
        assert_eq!(session.unit_mode(), UnitMode::Yards);

        // Toggling while idle is just a mode change.
        assert!(!session.set_unit_mode(UnitMode::Miles));
    }

    #[test]
    fn average_heart_rate_with_optional_drain() {
        let mut session = armed_session(UnitMode::Miles);
        session.set_heart_rate(120.0);
        session.set_heart_rate(130.0);
        session.set_heart_rate(140.0);
        assert!((session.average_heart_rate(false) - 130.0).abs() < 1e-9);
        assert!((session.average_heart_rate(true) - 130.0).abs() < 1e-9);
        assert_eq!(session.average_heart_rate(false), 0.0);
    }
}
