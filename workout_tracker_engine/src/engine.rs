//! The engine actor.
//!
//! The location provider, pedometer and health platform all call back
//! on their own tasks; instead of re-dispatching to a main queue in
//! every method, everything funnels into one event channel consumed by
//! a single task that owns the [`TrackingSession`] and the
//! [`WorkoutCoordinator`]. Commands from the UI side travel over a
//! second channel. Within one delivered batch, fixes are handled in
//! array order; across batches the last delivery wins.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveTime, Utc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use workout_tracker_lib::{
    distance::elevation_gain,
    geo_fix::GeoFix,
    heading::CardinalDirection,
    units::UnitMode,
};

use crate::{
    EngineError,
    config::Toggles,
    coordinator::{SessionState, WorkoutCoordinator},
    platform::{
        ActivityKind, AuthorizationStatus, HapticCue, HapticSink, HealthPlatform,
        LocationProvider, PlaceResolver, PrecisionProfile, StatisticsUpdate, StepSource,
        WeatherService, WeatherSnapshot,
    },
    session::{SessionPhase, TrackingSession},
};

/// Everything the collaborators deliver asynchronously, marshaled onto
/// the engine task.
#[derive(Debug)]
pub enum EngineEvent {
    LocationBatch(Vec<GeoFix>),
    LocationFailure(String),
    AuthorizationChanged(AuthorizationStatus),
    SessionStateChanged(SessionState),
    Statistics(StatisticsUpdate),
    /// Cumulative daily step count from the pedometer.
    PedometerUpdate(i64),
    /// Result of the one-shot baseline query fired on the first fix.
    StepBaseline(Result<i64, String>),
    PlaceResolved(String),
    Weather(Result<WeatherSnapshot, String>),
    /// 1 Hz elapsed-time clock.
    Tick,
}

enum EngineCommand {
    Begin(ActivityKind),
    StartUpdates,
    StopUpdates {
        reset_after: bool,
        reply: oneshot::Sender<String>,
    },
    Reset,
    Pause,
    Resume,
    End,
    SetUnitMode(UnitMode),
    SetPrecision(bool),
    SetHaptics(bool),
    Snapshot(oneshot::Sender<MetricsSnapshot>),
    Shutdown,
}

/// The platform collaborators handed to the engine at startup.
pub struct Collaborators {
    pub provider: Arc<dyn LocationProvider>,
    pub pedometer: Arc<dyn StepSource>,
    pub health: Arc<dyn HealthPlatform>,
    pub places: Arc<dyn PlaceResolver>,
    pub weather: Arc<dyn WeatherService>,
    pub haptics: Arc<dyn HapticSink>,
}

/// Read-only view of the live metrics, for display.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub phase: SessionPhase,
    pub is_recording: bool,
    pub unit_mode: UnitMode,
    /// Display distance in the current unit.
    pub distance: f64,
    pub distance_label: &'static str,
    pub final_distance: f64,
    pub elapsed_seconds: f64,
    pub formatted_time: String,
    pub step_count: i64,
    pub heart_rate: f64,
    pub average_heart_rate: f64,
    pub active_energy: f64,
    pub altitude_ft: f64,
    pub elevation_gain_m: f64,
    pub gps_accuracy: f64,
    pub accepted_fix_count: usize,
    pub has_initial_fix: bool,
    pub establishing_gps: bool,
    pub place_name: String,
    pub not_authorized: bool,
    pub session_state: SessionState,
    pub heading: Option<CardinalDirection>,
    pub course: f64,
    pub route_points_submitted: usize,
    pub platform_distance_mi: f64,
    pub platform_steps: f64,
    pub weather: Option<WeatherSnapshot>,
    pub weather_alert: bool,
}

/// Command surface of a running engine. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::Stopped)
    }

    pub async fn begin(&self, activity: ActivityKind) -> Result<(), EngineError> {
        self.send(EngineCommand::Begin(activity)).await
    }

    pub async fn start_updates(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::StartUpdates).await
    }

    /// Stops recording and returns the formatted final time.
    pub async fn stop_updates(&self, reset_after: bool) -> Result<String, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::StopUpdates { reset_after, reply })
            .await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn reset(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Reset).await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Resume).await
    }

    pub async fn end(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::End).await
    }

    pub async fn set_unit_mode(&self, unit_mode: UnitMode) -> Result<(), EngineError> {
        self.send(EngineCommand::SetUnitMode(unit_mode)).await
    }

    pub async fn set_precision(&self, precise: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetPrecision(precise)).await
    }

    pub async fn set_haptics(&self, haptics: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetHaptics(haptics)).await
    }

    pub async fn snapshot(&self) -> Result<MetricsSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Shutdown).await
    }
}

pub struct WorkoutEngine {
    session: TrackingSession,
    coordinator: WorkoutCoordinator,
    toggles: Toggles,

    provider: Arc<dyn LocationProvider>,
    pedometer: Arc<dyn StepSource>,
    places: Arc<dyn PlaceResolver>,
    weather: Arc<dyn WeatherService>,
    haptics: Arc<dyn HapticSink>,

    event_tx: mpsc::Sender<EngineEvent>,
    events: mpsc::Receiver<EngineEvent>,
    commands: mpsc::Receiver<EngineCommand>,

    clock: Option<JoinHandle<()>>,
    pedometer_start: DateTime<Utc>,
    weather_latest: Option<WeatherSnapshot>,
    weather_alert: bool,
}

impl WorkoutEngine {
    /// Spawns the engine task. The caller creates the event channel up
    /// front so the collaborator adapters can be built around its
    /// sender.
    pub fn start(
        collaborators: Collaborators,
        unit_mode: UnitMode,
        event_tx: mpsc::Sender<EngineEvent>,
        events: mpsc::Receiver<EngineEvent>,
    ) -> EngineHandle {
        let (command_tx, commands) = mpsc::channel(64);

        let mut session = TrackingSession::new(unit_mode);
        session.prepare();
        collaborators
            .provider
            .configure(PrecisionProfile::for_precise(Toggles::default().precise));

        let mut engine = WorkoutEngine {
            session,
            coordinator: WorkoutCoordinator::new(collaborators.health),
            toggles: Toggles::default(),
            provider: collaborators.provider,
            pedometer: collaborators.pedometer,
            places: collaborators.places,
            weather: collaborators.weather,
            haptics: collaborators.haptics,
            event_tx,
            events,
            commands,
            clock: None,
            pedometer_start: Utc::now(),
            weather_latest: None,
            weather_alert: false,
        };

        tokio::spawn(async move {
            engine.run().await;
            tracing::debug!("engine task finished");
        });

        EngineHandle {
            commands: command_tx,
        }
    }

    async fn run(&mut self) {
        loop {
            // Events first, so queued callbacks are applied before the
            // next command observes the state.
            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.teardown();
    }

    async fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Begin(activity) => {
                if let Err(err) = self.coordinator.begin(activity).await {
                    tracing::error!("failed to begin workout: {err:?}");
                }
            }
            EngineCommand::StartUpdates => self.start_updates(),
            EngineCommand::StopUpdates { reset_after, reply } => {
                let time_string = self.stop_updates(reset_after);
                let _ = reply.send(time_string);
            }
            EngineCommand::Reset => {
                self.session.reset();
                self.session.prepare();
            }
            EngineCommand::Pause => {
                // Stop burning battery on location updates while paused.
                self.provider.stop_updates();
                if let Err(err) = self.coordinator.pause().await {
                    tracing::error!("failed to pause workout: {err:?}");
                }
            }
            EngineCommand::Resume => {
                self.provider.start_updates();
                if let Err(err) = self.coordinator.resume().await {
                    tracing::error!("failed to resume workout: {err:?}");
                }
            }
            EngineCommand::End => {
                if let Err(err) = self.coordinator.end().await {
                    tracing::error!("failed to end workout: {err:?}");
                }
            }
            EngineCommand::SetUnitMode(unit_mode) => {
                if self.session.set_unit_mode(unit_mode) {
                    // Mid-recording switch: the session aborted the
                    // workout, tear the subscriptions down with it.
                    tracing::warn!("unit mode changed mid-recording, workout aborted");
                    self.teardown();
                    self.session.prepare();
                }
            }
            EngineCommand::SetPrecision(precise) => {
                self.toggles.precise = precise;
                self.provider
                    .configure(PrecisionProfile::for_precise(precise));
            }
            EngineCommand::SetHaptics(haptics) => self.toggles.haptics = haptics,
            EngineCommand::Snapshot(reply) => {
                let snapshot = self.snapshot();
                let _ = reply.send(snapshot);
            }
            EngineCommand::Shutdown => return false,
        }
        true
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Tick => self.session.tick(),
            EngineEvent::LocationBatch(batch) => self.on_location_batch(batch),
            EngineEvent::LocationFailure(message) => {
                // Transient provider errors are retried by re-requesting
                // authorization, never treated as fatal.
                tracing::error!("location provider failed: {message}");
                self.provider.request_authorization();
            }
            EngineEvent::AuthorizationChanged(status) => {
                if status.is_authorized() {
                    self.session.set_not_authorized(false);
                } else {
                    self.session.set_not_authorized(true);
                    self.provider.request_authorization();
                }
            }
            EngineEvent::SessionStateChanged(state) => {
                self.coordinator.on_session_state(state);
                match state {
                    SessionState::Running => self.session.set_recording(true),
                    SessionState::Paused => self.session.set_recording(false),
                    SessionState::NotStarted => {}
                    SessionState::Ended => self.finalize_workout().await,
                }
            }
            EngineEvent::Statistics(update) => {
                self.coordinator.on_statistics(&mut self.session, update);
            }
            EngineEvent::PedometerUpdate(raw_steps) => self.session.apply_raw_steps(raw_steps),
            EngineEvent::StepBaseline(Ok(steps)) => self.session.set_step_baseline(steps),
            EngineEvent::StepBaseline(Err(message)) => {
                tracing::warn!("step baseline unavailable, reporting raw counts: {message}");
            }
            EngineEvent::PlaceResolved(name) => self.session.set_place_name(name),
            EngineEvent::Weather(Ok(snapshot)) => {
                self.weather_latest = Some(snapshot);
                self.weather_alert = false;
            }
            EngineEvent::Weather(Err(message)) => {
                tracing::warn!("weather fetch failed: {message}");
                self.weather_alert = true;
            }
        }
    }

    fn on_location_batch(&mut self, batch: Vec<GeoFix>) {
        let report = self.coordinator.on_location_batch(&mut self.session, batch);

        if report.initial_fix_acquired && self.toggles.haptics {
            self.haptics.tap(HapticCue::GpsAcquired);
        }

        if let Some(latch) = report.latch_fix {
            // One-shot lookups keyed to GPS acquisition.
            self.session.set_place_name("Determining...".into());
            let position = latch.position;

            let places = self.places.clone();
            let events = self.event_tx.clone();
            tokio::spawn(async move {
                match places.resolve(position).await {
                    Ok(name) => {
                        let _ = events.send(EngineEvent::PlaceResolved(name)).await;
                    }
                    Err(err) => tracing::warn!("reverse geocoding failed: {err:?}"),
                }
            });

            let weather = self.weather.clone();
            let events = self.event_tx.clone();
            tokio::spawn(async move {
                let result = weather
                    .current(position)
                    .await
                    .map_err(|err| err.to_string());
                let _ = events.send(EngineEvent::Weather(result)).await;
            });
        }

        if report.baseline_needed {
            let pedometer = self.pedometer.clone();
            let events = self.event_tx.clone();
            let start = self.pedometer_start;
            tokio::spawn(async move {
                let result = pedometer
                    .steps_since(start)
                    .await
                    .map_err(|err| err.to_string());
                let _ = events.send(EngineEvent::StepBaseline(result)).await;
            });
        }

        if let Some(marker) = report.marker_crossed {
            if self.toggles.haptics {
                self.haptics.tap(HapticCue::MileCrossed(marker));
            }
        }
    }

    fn start_updates(&mut self) {
        if self.provider.authorization().is_authorized() {
            self.session.set_not_authorized(false);
        } else {
            self.provider.request_authorization();
            self.session.set_not_authorized(true);
        }

        self.session.start_updates();
        self.provider.start_updates();

        // The pedometer counts from local midnight; its cumulative
        // count can span several app sessions, which is what the
        // baseline capture corrects for.
        self.pedometer_start = local_midnight();
        self.pedometer.start_from(self.pedometer_start);

        self.start_clock();
    }

    fn stop_updates(&mut self, reset_after: bool) -> String {
        self.teardown();
        let time_string = self.session.stop_updates(reset_after);
        if reset_after {
            self.session.prepare();
        }
        time_string
    }

    async fn finalize_workout(&mut self) {
        self.teardown();
        let route = self.session.accepted_fixes().to_vec();
        match self.coordinator.finalize(Utc::now(), &route).await {
            Ok(workout) => tracing::info!("workout {:?} fully saved", workout),
            // The just-recorded metrics stay visible in memory even
            // when persistence fails partway.
            Err(err) => tracing::error!("workout save pipeline halted: {err:?}"),
        }
        let final_time = self.session.stop_updates(true);
        tracing::info!(
            "workout ended at {} with distance {:.2} {}",
            final_time,
            self.session.final_distance(),
            self.session.unit_mode().label(),
        );
        self.session.prepare();
        self.coordinator.reset_workout();
    }

    fn start_clock(&mut self) {
        if self.clock.is_some() {
            return;
        }
        let events = self.event_tx.clone();
        self.clock = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // completes immediately
            loop {
                interval.tick().await;
                if events.send(EngineEvent::Tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn teardown(&mut self) {
        self.provider.stop_updates();
        self.pedometer.stop();
        // Invalidate the clock so no dangling timer mutates a reset
        // session.
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }

    fn snapshot(&mut self) -> MetricsSnapshot {
        MetricsSnapshot {
            phase: self.session.phase(),
            is_recording: self.session.is_recording(),
            unit_mode: self.session.unit_mode(),
            distance: self.session.distance(),
            distance_label: self.session.unit_mode().label(),
            final_distance: self.session.final_distance(),
            elapsed_seconds: self.session.elapsed_seconds(),
            formatted_time: self.session.formatted_time().to_string(),
            step_count: self.session.step_count(),
            heart_rate: self.session.heart_rate(),
            average_heart_rate: self.session.average_heart_rate(false),
            active_energy: self.session.active_energy(),
            altitude_ft: self.session.altitude_ft(),
            elevation_gain_m: elevation_gain(self.session.accepted_fixes()),
            gps_accuracy: self.session.gps_accuracy(),
            accepted_fix_count: self.session.accepted_fixes().len(),
            has_initial_fix: self.session.has_initial_fix(),
            establishing_gps: self.session.establishing_gps(),
            place_name: self.session.place_name().to_string(),
            not_authorized: self.session.not_authorized(),
            session_state: self.coordinator.state(),
            heading: self.coordinator.heading(),
            course: self.coordinator.course(),
            route_points_submitted: self.coordinator.route_points_submitted(),
            platform_distance_mi: self.coordinator.platform_distance_mi(),
            platform_steps: self.coordinator.platform_steps(),
            weather: self.weather_latest,
            weather_alert: self.weather_alert,
        }
    }
}

fn local_midnight() -> DateTime<Utc> {
    chrono::Local::now()
        .with_time(NaiveTime::MIN)
        .single()
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;
    use geo_types::Point;
    use tokio::time::sleep;
    use workout_tracker_lib::{
        geo_fix::decode_route,
        units::{METERS_PER_MILE, UnitMode},
    };

    use super::*;
    use crate::platform::{
        LogHaptics,
        memory::MemoryHealthStore,
        sim::{FixedPlaceResolver, SimLocationProvider, SimPedometer, SimWeather},
    };

    fn fix(lat: f64, lon: f64, accuracy: f64) -> GeoFix {
        GeoFix::new(
            Point::new(lon, lat),
            80.0,
            accuracy,
            45.0,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    struct Rig {
        handle: EngineHandle,
        provider: Arc<SimLocationProvider>,
        pedometer: Arc<SimPedometer>,
        store: Arc<MemoryHealthStore>,
        weather: Arc<SimWeather>,
    }

    fn rig(unit_mode: UnitMode) -> Rig {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (event_tx, event_rx) = mpsc::channel(256);
        let provider = Arc::new(SimLocationProvider::new(event_tx.clone()));
        let pedometer = Arc::new(SimPedometer::new(event_tx.clone()));
        let store = Arc::new(MemoryHealthStore::new(event_tx.clone()));
        let weather = Arc::new(SimWeather::clear_skies());

        let handle = WorkoutEngine::start(
            Collaborators {
                provider: provider.clone(),
                pedometer: pedometer.clone(),
                health: store.clone(),
                places: Arc::new(FixedPlaceResolver("Aarhus".into())),
                weather: weather.clone(),
                haptics: Arc::new(LogHaptics),
            },
            unit_mode,
            event_tx,
            event_rx,
        );

        Rig {
            handle,
            provider,
            pedometer,
            store,
            weather,
        }
    }

    /// A snapshot round-trip doubles as a barrier: once it returns,
    /// every previously queued command and event has been applied.
    async fn barrier(rig: &Rig) -> MetricsSnapshot {
        rig.handle.snapshot().await.unwrap()
    }

    #[tokio::test]
    async fn records_and_saves_a_full_workout() {
        let rig = rig(UnitMode::Miles);

        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        let snap = barrier(&rig).await;
        assert!(snap.is_recording);
        assert_eq!(snap.session_state, SessionState::Running);
        assert!(rig.provider.is_active());

        // Pedometer is already at 4000 daily steps before the walk.
        rig.pedometer.set_daily_steps(4000).await;

        rig.provider
            .push_batch(vec![fix(0.0, 0.0, 10.0), fix(0.0, 0.001, 10.0)])
            .await;
        rig.provider.push_batch(vec![fix(0.0, 0.0015, 80.0)]).await; // too coarse, dropped
        rig.provider.push_batch(vec![fix(0.0, 0.002, 8.0)]).await;

        // Let the spawned baseline/geocode/route tasks land.
        sleep(Duration::from_millis(100)).await;
        rig.pedometer.set_daily_steps(4230).await;
        rig.store
            .publish_statistics(StatisticsUpdate::HeartRate {
                latest_bpm: 142.0,
                average_bpm: 138.0,
            })
            .await;

        let snap = barrier(&rig).await;
        assert!(snap.has_initial_fix);
        assert!(!snap.establishing_gps);
        assert_eq!(snap.accepted_fix_count, 3);
        let meters = snap.distance * METERS_PER_MILE;
        assert!((meters - 222.4).abs() < 1.5, "got {meters} m");
        assert_eq!(snap.step_count, 230);
        assert_eq!(snap.heart_rate, 142.0);
        assert_eq!(snap.place_name, "Aarhus");
        assert_eq!(snap.heading.map(|h| h.as_str()), Some("NE"));
        assert!(snap.weather.is_some());
        assert_eq!(snap.route_points_submitted, 3);
        assert_eq!(rig.store.submitted_route_len().await, 3);

        rig.handle.end().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        let snap = barrier(&rig).await;
        assert!(!snap.is_recording);
        assert_eq!(snap.session_state, SessionState::NotStarted);
        assert_eq!(snap.distance, 0.0);
        assert!(snap.final_distance > 0.0);
        assert!(!rig.provider.is_active());

        let saved = rig.store.saved_workouts().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].activity, ActivityKind::Walking);
        let blob = saved[0].route_blob.as_ref().expect("route attached");
        assert_eq!(decode_route(blob).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pause_and_resume_are_symmetric_on_the_provider() {
        let rig = rig(UnitMode::Miles);
        rig.handle.begin(ActivityKind::Running).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;

        rig.provider
            .push_batch(vec![fix(0.0, 0.0, 5.0), fix(0.0, 0.001, 5.0)])
            .await;
        let before = barrier(&rig).await;
        assert!(before.distance > 0.0);

        rig.handle.pause().await.unwrap();
        let paused = barrier(&rig).await;
        assert!(!paused.is_recording);
        assert_eq!(paused.session_state, SessionState::Paused);
        assert!(!rig.provider.is_active());

        // Batches while paused never reach the session.
        rig.provider.push_batch(vec![fix(0.0, 0.005, 5.0)]).await;
        let still_paused = barrier(&rig).await;
        assert_eq!(still_paused.distance, before.distance);

        rig.handle.resume().await.unwrap();
        let resumed = barrier(&rig).await;
        assert!(resumed.is_recording);
        assert!(rig.provider.is_active());
    }

    #[tokio::test]
    async fn route_save_failure_halts_the_pipeline() {
        let rig = rig(UnitMode::Miles);
        rig.store.set_fail_finish_route(true);

        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;
        rig.provider
            .push_batch(vec![fix(0.0, 0.0, 5.0), fix(0.0, 0.001, 5.0)])
            .await;
        barrier(&rig).await;

        rig.handle.end().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        // The workout record exists, the route never got attached, and
        // the in-memory metrics survived the failure.
        let saved = rig.store.saved_workouts().await;
        assert_eq!(saved.len(), 1);
        assert!(saved[0].route_blob.is_none());
        let snap = barrier(&rig).await;
        assert!(snap.final_distance > 0.0);
    }

    #[tokio::test]
    async fn unit_switch_mid_recording_aborts_and_tears_down() {
        let rig = rig(UnitMode::Miles);
        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;
        rig.provider
            .push_batch(vec![fix(0.0, 0.0, 5.0), fix(0.0, 0.001, 5.0)])
            .await;
        barrier(&rig).await;

        rig.handle.set_unit_mode(UnitMode::Yards).await.unwrap();
        let snap = barrier(&rig).await;
        assert!(!snap.is_recording);
        assert_eq!(snap.unit_mode, UnitMode::Yards);
        assert_eq!(snap.distance, 0.0);
        assert_eq!(snap.accepted_fix_count, 0);
        assert!(!rig.provider.is_active());
    }

    #[tokio::test]
    async fn failed_step_baseline_reports_raw_counts() {
        let rig = rig(UnitMode::Miles);
        rig.pedometer.set_fail_baseline(true);

        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;
        rig.provider.push_batch(vec![fix(0.0, 0.0, 5.0)]).await;
        sleep(Duration::from_millis(100)).await;

        rig.pedometer.set_daily_steps(5000).await;
        let snap = barrier(&rig).await;
        // Degraded mode: no baseline correction was applied.
        assert_eq!(snap.step_count, 5000);
    }

    #[tokio::test]
    async fn weather_failure_raises_the_alert_flag_only() {
        let rig = rig(UnitMode::Miles);
        rig.weather.set_fail(true);

        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;
        rig.provider
            .push_batch(vec![fix(0.0, 0.0, 5.0), fix(0.0, 0.001, 5.0)])
            .await;
        sleep(Duration::from_millis(100)).await;

        let snap = barrier(&rig).await;
        assert!(snap.weather_alert);
        assert!(snap.weather.is_none());
        // Tracking was unaffected.
        assert!(snap.distance > 0.0);
    }

    #[tokio::test]
    async fn stop_without_reset_then_reset_matches_the_summary_flow() {
        let rig = rig(UnitMode::Miles);
        rig.handle.begin(ActivityKind::Walking).await.unwrap();
        rig.handle.start_updates().await.unwrap();
        barrier(&rig).await;
        rig.provider
            .push_batch(vec![
                fix(0.0, 0.0, 5.0),
                fix(0.0, 0.001, 5.0),
                fix(0.0, 0.002, 5.0),
            ])
            .await;
        barrier(&rig).await;

        let time_string = rig.handle.stop_updates(false).await.unwrap();
        assert_eq!(time_string, "00:00"); // no ticks elapsed in this test
        let snap = barrier(&rig).await;
        assert!(!snap.is_recording);
        assert_eq!(snap.accepted_fix_count, 3);
        assert!(snap.distance > 0.0);

        rig.handle.stop_updates(true).await.unwrap();
        let snap = barrier(&rig).await;
        assert_eq!(snap.accepted_fix_count, 0);
        assert_eq!(snap.distance, 0.0);
        assert!(snap.final_distance > 0.0);
    }
}
