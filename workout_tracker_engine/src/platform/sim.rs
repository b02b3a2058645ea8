//! Simulated collaborators for replays and tests. They honor the same
//! contract as the device-backed implementations: nothing is delivered
//! unless the subscription is active, and everything arrives through
//! the engine's event channel.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_types::Point;
use tokio::sync::mpsc;
use workout_tracker_lib::geo_fix::GeoFix;

use crate::{
    engine::EngineEvent,
    platform::{
        AuthorizationStatus, LocationProvider, PlaceResolver, PrecisionProfile, StepSource,
        WeatherService, WeatherSnapshot,
    },
};

pub struct SimLocationProvider {
    events: mpsc::Sender<EngineEvent>,
    active: AtomicBool,
    authorization: Mutex<AuthorizationStatus>,
    profile: Mutex<PrecisionProfile>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SimLocationProvider {
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
            authorization: Mutex::new(AuthorizationStatus::NotDetermined),
            profile: Mutex::new(PrecisionProfile::for_precise(true)),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Delivers a raw batch, as the device would: dropped unless
    /// updates are running.
    pub async fn push_batch(&self, batch: Vec<GeoFix>) {
        if !self.active.load(Ordering::Relaxed) {
            return;
        }
        let _ = self.events.send(EngineEvent::LocationBatch(batch)).await;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    pub fn profile(&self) -> PrecisionProfile {
        *self.profile.lock().unwrap()
    }
}

impl LocationProvider for SimLocationProvider {
    fn configure(&self, profile: PrecisionProfile) {
        *self.profile.lock().unwrap() = profile;
    }

    fn start_updates(&self) {
        self.active.store(true, Ordering::Relaxed);
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    fn stop_updates(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    fn authorization(&self) -> AuthorizationStatus {
        *self.authorization.lock().unwrap()
    }

    fn request_authorization(&self) {
        // The simulated user always grants when-in-use access.
        *self.authorization.lock().unwrap() = AuthorizationStatus::AuthorizedWhenInUse;
        let _ = self.events.try_send(EngineEvent::AuthorizationChanged(
            AuthorizationStatus::AuthorizedWhenInUse,
        ));
    }
}

pub struct SimPedometer {
    events: mpsc::Sender<EngineEvent>,
    daily_steps: AtomicI64,
    running: AtomicBool,
    fail_baseline: AtomicBool,
}

impl SimPedometer {
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            events,
            daily_steps: AtomicI64::new(0),
            running: AtomicBool::new(false),
            fail_baseline: AtomicBool::new(false),
        }
    }

    /// Makes the baseline query fail, leaving steps in the raw
    /// degraded mode.
    pub fn set_fail_baseline(&self, fail: bool) {
        self.fail_baseline.store(fail, Ordering::Relaxed);
    }

    /// Sets the cumulative daily count and, while counting is running,
    /// delivers it as a pedometer callback.
    pub async fn set_daily_steps(&self, steps: i64) {
        self.daily_steps.store(steps, Ordering::Relaxed);
        if self.running.load(Ordering::Relaxed) {
            let _ = self.events.send(EngineEvent::PedometerUpdate(steps)).await;
        }
    }
}

#[async_trait]
impl StepSource for SimPedometer {
    fn start_from(&self, _start: DateTime<Utc>) {
        self.running.store(true, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    async fn steps_since(&self, _start: DateTime<Utc>) -> Result<i64> {
        if self.fail_baseline.load(Ordering::Relaxed) {
            bail!("step history unavailable");
        }
        Ok(self.daily_steps.load(Ordering::Relaxed))
    }
}

pub struct FixedPlaceResolver(pub String);

#[async_trait]
impl PlaceResolver for FixedPlaceResolver {
    async fn resolve(&self, _position: Point) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub struct SimWeather {
    pub snapshot: WeatherSnapshot,
    fail: AtomicBool,
}

impl SimWeather {
    pub fn clear_skies() -> Self {
        Self {
            snapshot: WeatherSnapshot {
                temperature_c: 18.0,
                wind_kph: 6.0,
                precipitation_chance: 0.05,
            },
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl WeatherService for SimWeather {
    async fn current(&self, _position: Point) -> Result<WeatherSnapshot> {
        if self.fail.load(Ordering::Relaxed) {
            bail!("forecast service unreachable");
        }
        Ok(self.snapshot)
    }
}
