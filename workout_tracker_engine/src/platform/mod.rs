//! Interfaces to the platform collaborators the engine consumes.
//!
//! The engine never talks to real device frameworks directly; it talks
//! to these traits. Callback-style collaborators (location provider,
//! health platform, pedometer) deliver their updates as
//! [`EngineEvent`]s over the engine's event channel, so every mutation
//! of shared state happens on the single engine task.
//!
//! [`EngineEvent`]: crate::engine::EngineEvent

pub mod memory;
pub mod sim;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_types::Point;
use workout_tracker_lib::geo_fix::GeoFix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Walking,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkoutId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteId(pub i64);

/// Authorization state reported by the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationStatus {
    /// Maps the provider's raw status value. A value outside the known
    /// enumeration is a platform contract violation and the one
    /// condition we treat as fatal.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => AuthorizationStatus::NotDetermined,
            1 => AuthorizationStatus::Restricted,
            2 => AuthorizationStatus::Denied,
            3 => AuthorizationStatus::AuthorizedAlways,
            4 => AuthorizationStatus::AuthorizedWhenInUse,
            other => unreachable!("unknown location authorization status {other}"),
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedWhenInUse | AuthorizationStatus::AuthorizedAlways
        )
    }
}

/// What the engine asks the provider for. The acceptance gate never
/// changes with this; only the quality and rate of raw fixes does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionProfile {
    pub desired_accuracy: DesiredAccuracy,
    /// Minimum movement before the provider reports a new fix, meters.
    pub distance_filter: f64,
    /// Keep delivering fixes while the app is backgrounded.
    pub background_updates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredAccuracy {
    Best,
    NearestTenMeters,
}

impl PrecisionProfile {
    pub fn for_precise(precise: bool) -> Self {
        if precise {
            Self {
                desired_accuracy: DesiredAccuracy::Best,
                distance_filter: 1.0,
                background_updates: true,
            }
        } else {
            Self {
                desired_accuracy: DesiredAccuracy::NearestTenMeters,
                distance_filter: 10.0,
                background_updates: true,
            }
        }
    }
}

/// Statistics pushed by the health platform's workout builder, keyed
/// by quantity kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatisticsUpdate {
    HeartRate { latest_bpm: f64, average_bpm: f64 },
    ActiveEnergy { kilocalories: f64 },
    StepCount { steps: f64 },
    WalkingRunningDistance { miles: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub wind_kph: f64,
    pub precipitation_chance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticCue {
    GpsAcquired,
    MileCrossed(i64),
}

/// Continuous location updates. Implementations deliver raw fix
/// batches and authorization changes as engine events; these calls
/// only control the subscription.
pub trait LocationProvider: Send + Sync {
    fn configure(&self, profile: PrecisionProfile);
    fn start_updates(&self);
    fn stop_updates(&self);
    fn authorization(&self) -> AuthorizationStatus;
    fn request_authorization(&self);
}

/// Pedometer. Cumulative counts since `start` arrive as engine events;
/// `steps_since` is the one-shot query used for the baseline capture.
#[async_trait]
pub trait StepSource: Send + Sync {
    fn start_from(&self, start: DateTime<Utc>);
    fn stop(&self);
    async fn steps_since(&self, start: DateTime<Utc>) -> Result<i64>;
}

/// The health platform's workout session + builder + route builder,
/// owned exclusively by the coordinator. State changes and collected
/// statistics come back as engine events; the platform, not the
/// coordinator, is the source of truth for running/paused/ended.
#[async_trait]
pub trait HealthPlatform: Send + Sync {
    async fn start_session(&self, activity: ActivityKind) -> Result<()>;
    async fn pause_session(&self) -> Result<()>;
    async fn resume_session(&self) -> Result<()>;
    async fn end_session(&self) -> Result<()>;

    /// Appends accepted fixes to the in-flight route. Fire-and-forget
    /// per batch; a failed batch is logged and dropped.
    async fn insert_route_points(&self, points: Vec<GeoFix>) -> Result<()>;

    // The strict end pipeline, in call order.
    async fn end_collection(&self, end: DateTime<Utc>) -> Result<()>;
    async fn finish_workout(&self) -> Result<WorkoutId>;
    async fn finish_route(&self, workout: WorkoutId, points: Vec<GeoFix>) -> Result<RouteId>;
    async fn attach_route(&self, workout: WorkoutId, route: RouteId) -> Result<()>;
}

/// Reverse geocoding, queried once per workout when the initial fix
/// is acquired.
#[async_trait]
pub trait PlaceResolver: Send + Sync {
    async fn resolve(&self, position: Point) -> Result<String>;
}

/// Live weather, treated as a black box returning a snapshot.
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, position: Point) -> Result<WeatherSnapshot>;
}

pub trait HapticSink: Send + Sync {
    fn tap(&self, cue: HapticCue);
}

/// Haptic sink that just logs the cue. Useful off-device.
#[derive(Debug, Default)]
pub struct LogHaptics;

impl HapticSink for LogHaptics {
    fn tap(&self, cue: HapticCue) {
        tracing::info!("haptic cue: {:?}", cue);
    }
}
