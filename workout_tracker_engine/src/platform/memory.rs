//! In-memory health platform, used by the replay tool and the tests.
//! Behaves like the real store at the interface level: session state
//! changes are confirmed asynchronously through the event channel, and
//! the end pipeline stages can be made to fail on demand.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use workout_tracker_lib::geo_fix::{GeoFix, encode_route};

use crate::{
    coordinator::SessionState,
    engine::EngineEvent,
    platform::{ActivityKind, HealthPlatform, RouteId, StatisticsUpdate, WorkoutId},
};

#[derive(Debug, Clone)]
pub struct SavedWorkout {
    pub id: WorkoutId,
    pub activity: ActivityKind,
    pub ended: DateTime<Utc>,
    /// Serialized route, attached by the last pipeline stage. `None`
    /// when the pipeline halted before the attach.
    pub route_blob: Option<Vec<u8>>,
}

struct OpenSession {
    activity: ActivityKind,
    route_points: Vec<GeoFix>,
    collection_ended: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    session: Option<OpenSession>,
    next_id: i64,
    pending_routes: HashMap<i64, Vec<u8>>,
    saved: Vec<SavedWorkout>,
}

pub struct MemoryHealthStore {
    events: mpsc::Sender<EngineEvent>,
    fail_finish_route: AtomicBool,
    inner: Mutex<Inner>,
}

impl MemoryHealthStore {
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            events,
            fail_finish_route: AtomicBool::new(false),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Makes the route-finish stage fail, to exercise the pipeline
    /// halt behavior.
    pub fn set_fail_finish_route(&self, fail: bool) {
        self.fail_finish_route.store(fail, Ordering::Relaxed);
    }

    /// Injects a builder statistics callback.
    pub async fn publish_statistics(&self, update: StatisticsUpdate) {
        let _ = self.events.send(EngineEvent::Statistics(update)).await;
    }

    pub async fn saved_workouts(&self) -> Vec<SavedWorkout> {
        self.inner.lock().await.saved.clone()
    }

    /// Route points submitted to the in-flight session so far.
    pub async fn submitted_route_len(&self) -> usize {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map_or(0, |session| session.route_points.len())
    }

    async fn confirm_state(&self, state: SessionState) {
        let _ = self.events.send(EngineEvent::SessionStateChanged(state)).await;
    }
}

#[async_trait]
impl HealthPlatform for MemoryHealthStore {
    async fn start_session(&self, activity: ActivityKind) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.session.is_some() {
                bail!("a workout session is already open");
            }
            inner.session = Some(OpenSession {
                activity,
                route_points: Vec::new(),
                collection_ended: None,
            });
        }
        self.confirm_state(SessionState::Running).await;
        Ok(())
    }

    async fn pause_session(&self) -> Result<()> {
        if self.inner.lock().await.session.is_none() {
            bail!("no workout session to pause");
        }
        self.confirm_state(SessionState::Paused).await;
        Ok(())
    }

    async fn resume_session(&self) -> Result<()> {
        if self.inner.lock().await.session.is_none() {
            bail!("no workout session to resume");
        }
        self.confirm_state(SessionState::Running).await;
        Ok(())
    }

    async fn end_session(&self) -> Result<()> {
        if self.inner.lock().await.session.is_none() {
            bail!("no workout session to end");
        }
        self.confirm_state(SessionState::Ended).await;
        Ok(())
    }

    async fn insert_route_points(&self, points: Vec<GeoFix>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.session.as_mut() else {
            bail!("no open session for route data");
        };
        session.route_points.extend(points);
        Ok(())
    }

    async fn end_collection(&self, end: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.session.as_mut() else {
            bail!("no open session to end collection for");
        };
        session.collection_ended = Some(end);
        Ok(())
    }

    async fn finish_workout(&self) -> Result<WorkoutId> {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.session.take() else {
            bail!("no open session to finish");
        };
        let Some(ended) = session.collection_ended else {
            bail!("collection must be ended before the workout is finished");
        };
        inner.next_id += 1;
        let id = WorkoutId(inner.next_id);
        inner.saved.push(SavedWorkout {
            id,
            activity: session.activity,
            ended,
            route_blob: None,
        });
        Ok(id)
    }

    async fn finish_route(&self, _workout: WorkoutId, points: Vec<GeoFix>) -> Result<RouteId> {
        if self.fail_finish_route.load(Ordering::Relaxed) {
            bail!("route builder refused the route");
        }
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.pending_routes.insert(id, encode_route(&points));
        Ok(RouteId(id))
    }

    async fn attach_route(&self, workout: WorkoutId, route: RouteId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(blob) = inner.pending_routes.remove(&route.0) else {
            bail!("unknown route {:?}", route);
        };
        let Some(saved) = inner.saved.iter_mut().find(|saved| saved.id == workout) else {
            bail!("unknown workout {:?}", workout);
        };
        saved.route_blob = Some(blob);
        Ok(())
    }
}
