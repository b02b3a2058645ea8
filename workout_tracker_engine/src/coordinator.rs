//! Bridges the health platform's workout session/builder lifecycle to
//! the tracking session.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use workout_tracker_lib::{geo_fix::GeoFix, heading::CardinalDirection};

use crate::{
    platform::{ActivityKind, HealthPlatform, StatisticsUpdate, WorkoutId},
    session::{IngestReport, TrackingSession},
};

/// Platform workout-session state, owned exclusively by the
/// coordinator. Mirrored read-only into the session's recording flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Paused,
    Ended,
}

pub struct WorkoutCoordinator {
    platform: Arc<dyn HealthPlatform>,

    state: SessionState,
    /// Set as soon as the platform session object is created; the
    /// coordinator self-assigns only this step. Running/Paused/Ended
    /// are taken from the platform's own state callback.
    session_open: bool,
    workout: Option<WorkoutId>,

    heading: Option<CardinalDirection>,
    course: f64,
    /// Mean altitude of the latest raw batch, meters.
    batch_altitude: f64,

    // Mirrors of the builder's aggregated statistics.
    heart_rate: f64,
    average_heart_rate: f64,
    active_energy: f64,
    platform_distance_mi: f64,
    platform_steps: f64,

    route_points_submitted: usize,
}

impl WorkoutCoordinator {
    pub fn new(platform: Arc<dyn HealthPlatform>) -> Self {
        Self {
            platform,
            state: SessionState::NotStarted,
            session_open: false,
            workout: None,
            heading: None,
            course: -1.0,
            batch_altitude: 0.0,
            heart_rate: 0.0,
            average_heart_rate: 0.0,
            active_energy: 0.0,
            platform_distance_mi: 0.0,
            platform_steps: 0.0,
            route_points_submitted: 0,
        }
    }

    /// Creates the platform workout session + builder pair. The state
    /// stays `NotStarted` until the platform's own callback confirms
    /// the transition to `Running`.
    pub async fn begin(&mut self, activity: ActivityKind) -> Result<()> {
        if self.session_open {
            bail!("a workout session is already open");
        }
        self.platform
            .start_session(activity)
            .await
            .context("creating the workout session")?;
        self.session_open = true;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.platform.pause_session().await.context("pausing the workout session")
    }

    pub async fn resume(&self) -> Result<()> {
        self.platform.resume_session().await.context("resuming the workout session")
    }

    /// Asks the platform to end the session. Finalization waits for
    /// the asynchronous `Ended` confirmation.
    pub async fn end(&self) -> Result<()> {
        self.platform.end_session().await.context("ending the workout session")
    }

    /// Applies a platform state-change callback.
    pub fn on_session_state(&mut self, to: SessionState) {
        tracing::info!("workout session state changed to {:?}", to);
        self.state = to;
    }

    /// Handles one raw location delegate callback: derives the
    /// heading, forwards the batch to the session, and submits the
    /// accepted fixes to the platform's route builder. Route
    /// submission is gated on the session's initial-fix latch, the one
    /// authoritative accuracy gate.
    pub fn on_location_batch(
        &mut self,
        session: &mut TrackingSession,
        batch: Vec<GeoFix>,
    ) -> IngestReport {
        if let Some(last) = batch.last() {
            self.course = last.course;
            self.heading = CardinalDirection::from_course(last.course);
            self.batch_altitude =
                batch.iter().map(|fix| fix.altitude).sum::<f64>() / batch.len() as f64;
        }

        let report = session.ingest(&batch);

        if self.state == SessionState::Running
            && session.has_initial_fix()
            && !report.newly_accepted.is_empty()
        {
            let platform = self.platform.clone();
            let points = report.newly_accepted.clone();
            self.route_points_submitted += points.len();
            tokio::spawn(async move {
                if let Err(err) = platform.insert_route_points(points).await {
                    tracing::error!("failed to add points to the route builder: {err:?}");
                }
            });
        }

        report
    }

    /// Applies a statistics callback from the workout builder.
    pub fn on_statistics(&mut self, session: &mut TrackingSession, update: StatisticsUpdate) {
        match update {
            StatisticsUpdate::HeartRate { latest_bpm, average_bpm } => {
                self.heart_rate = latest_bpm;
                self.average_heart_rate = average_bpm;
                session.set_heart_rate(latest_bpm);
            }
            StatisticsUpdate::ActiveEnergy { kilocalories } => {
                self.active_energy = kilocalories;
                session.set_active_energy(kilocalories);
            }
            StatisticsUpdate::StepCount { steps } => {
                self.platform_steps = steps;
            }
            StatisticsUpdate::WalkingRunningDistance { miles } => {
                self.platform_distance_mi = miles;
            }
        }
    }

    /// The strict end pipeline, run after the platform confirms
    /// `Ended`: end collection, finish the workout record, finish the
    /// route, attach it. Each stage only runs if the previous one
    /// succeeded; a failure leaves a partially saved workout behind,
    /// which the caller logs and accepts.
    pub async fn finalize(
        &mut self,
        end: DateTime<Utc>,
        route: &[GeoFix],
    ) -> Result<WorkoutId> {
        self.platform
            .end_collection(end)
            .await
            .context("ending builder collection")?;
        let workout = self
            .platform
            .finish_workout()
            .await
            .context("finishing the workout record")?;
        self.workout = Some(workout);
        let route_id = self
            .platform
            .finish_route(workout, route.to_vec())
            .await
            .context("finishing the workout route")?;
        self.platform
            .attach_route(workout, route_id)
            .await
            .context("attaching the route to the workout")?;
        tracing::info!(
            "workout {:?} saved with {} route points",
            workout,
            route.len()
        );
        Ok(workout)
    }

    /// Clears the per-workout mirrors for the next session.
    pub fn reset_workout(&mut self) {
        self.state = SessionState::NotStarted;
        self.session_open = false;
        self.workout = None;
        self.heading = None;
        self.course = -1.0;
        self.batch_altitude = 0.0;
        self.heart_rate = 0.0;
        self.average_heart_rate = 0.0;
        self.active_energy = 0.0;
        self.platform_distance_mi = 0.0;
        self.platform_steps = 0.0;
        self.route_points_submitted = 0;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workout(&self) -> Option<WorkoutId> {
        self.workout
    }

    pub fn heading(&self) -> Option<CardinalDirection> {
        self.heading
    }

    pub fn course(&self) -> f64 {
        self.course
    }

    pub fn batch_altitude(&self) -> f64 {
        self.batch_altitude
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    pub fn average_heart_rate(&self) -> f64 {
        self.average_heart_rate
    }

    pub fn active_energy(&self) -> f64 {
        self.active_energy
    }

    pub fn platform_distance_mi(&self) -> f64 {
        self.platform_distance_mi
    }

    pub fn platform_steps(&self) -> f64 {
        self.platform_steps
    }

    pub fn route_points_submitted(&self) -> usize {
        self.route_points_submitted
    }
}
