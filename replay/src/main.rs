//! Replays a GPX track through the workout engine against the
//! in-memory platform, printing the live metrics along the way. Useful
//! for eyeballing the distance accumulation and the end pipeline
//! without a device.

use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_tracker_engine::{
    WorkoutEngine,
    engine::Collaborators,
    platform::{
        ActivityKind, LogHaptics,
        memory::MemoryHealthStore,
        sim::{FixedPlaceResolver, SimLocationProvider, SimPedometer, SimWeather},
    },
};
use workout_tracker_lib::{
    geo_fix::{GeoFix, decode_route},
    units::UnitMode,
};

#[derive(Clone, Copy, ValueEnum)]
enum Units {
    Miles,
    Yards,
}

#[derive(Clone, Copy, ValueEnum)]
enum Activity {
    Walking,
    Running,
}

#[derive(Parser)]
#[command(name = "replay")]
#[command(about = "Replay a GPX file through the workout engine", long_about = None)]
struct Cli {
    /// GPX file to replay
    gpx_file: String,

    #[arg(long, value_enum, default_value_t = Units::Miles)]
    units: Units,

    #[arg(long, value_enum, default_value_t = Activity::Walking)]
    activity: Activity,

    /// Fixes delivered per location callback
    #[arg(long, default_value_t = 3)]
    batch_size: usize,

    /// Simulated pedometer steps added per delivered fix
    #[arg(long, default_value_t = 2)]
    steps_per_fix: i64,

    /// Daily step count already on the pedometer before the workout
    #[arg(long, default_value_t = 4000)]
    steps_before: i64,

    /// Place name the simulated geocoder resolves to
    #[arg(long, default_value = "Somewhere")]
    place: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let fixes = read_gpx(&cli.gpx_file)?;
    anyhow::ensure!(!fixes.is_empty(), "{} contains no track points", cli.gpx_file);
    tracing::info!("replaying {} fixes from {}", fixes.len(), cli.gpx_file);

    let unit_mode = match cli.units {
        Units::Miles => UnitMode::Miles,
        Units::Yards => UnitMode::Yards,
    };
    let activity = match cli.activity {
        Activity::Walking => ActivityKind::Walking,
        Activity::Running => ActivityKind::Running,
    };

    let (event_tx, event_rx) = mpsc::channel(256);
    let provider = Arc::new(SimLocationProvider::new(event_tx.clone()));
    let pedometer = Arc::new(SimPedometer::new(event_tx.clone()));
    let store = Arc::new(MemoryHealthStore::new(event_tx.clone()));

    let engine = WorkoutEngine::start(
        Collaborators {
            provider: provider.clone(),
            pedometer: pedometer.clone(),
            health: store.clone(),
            places: Arc::new(FixedPlaceResolver(cli.place.clone())),
            weather: Arc::new(SimWeather::clear_skies()),
            haptics: Arc::new(LogHaptics),
        },
        unit_mode,
        event_tx,
        event_rx,
    );

    engine.begin(activity).await?;
    engine.start_updates().await?;

    let mut daily_steps = cli.steps_before;
    pedometer.set_daily_steps(daily_steps).await;

    let batch_size = cli.batch_size.max(1);
    for (index, batch) in fixes.chunks(batch_size).enumerate() {
        provider.push_batch(batch.to_vec()).await;
        daily_steps += cli.steps_per_fix * batch.len() as i64;
        pedometer.set_daily_steps(daily_steps).await;

        // Let the spawned route/baseline tasks drain between batches.
        tokio::time::sleep(Duration::from_millis(10)).await;

        if index % 10 == 0 {
            let snap = engine.snapshot().await?;
            println!(
                "{}  {:>7.3} {}  {:>5} steps  alt {:>6.1} ft  acc {:>4.1} m  {}  {}",
                snap.formatted_time,
                snap.distance,
                snap.distance_label,
                snap.step_count,
                snap.altitude_ft,
                snap.gps_accuracy,
                snap.heading.map(|h| h.as_str()).unwrap_or("-"),
                snap.place_name,
            );
        }
    }

    let snap = engine.snapshot().await?;
    println!(
        "track done: {:.3} {} over {} accepted fixes ({} submitted to the route)",
        snap.distance, snap.distance_label, snap.accepted_fix_count, snap.route_points_submitted,
    );

    engine.end().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snap = engine.snapshot().await?;
    println!("final distance: {:.3} {}", snap.final_distance, snap.distance_label);

    for workout in store.saved_workouts().await {
        let route_points = workout
            .route_blob
            .as_deref()
            .and_then(|blob| decode_route(blob).ok())
            .map_or(0, |route| route.len());
        println!(
            "saved workout {:?}: {:?}, ended {}, {} route points",
            workout.id, workout.activity, workout.ended, route_points,
        );
    }

    engine.shutdown().await?;
    Ok(())
}

/// Flattens every track segment of the file into one fix sequence.
/// GPX carries no accuracy estimate, so the horizontal accuracy is
/// derived from the hdop field when present.
fn read_gpx(path: &str) -> Result<Vec<GeoFix>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
    let reader = std::io::BufReader::new(file);
    let gpx = gpx::read(reader).with_context(|| format!("parsing {path}"))?;

    let mut fixes = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let timestamp = match point.time {
                    Some(time) => {
                        let formatted = time
                            .format()
                            .map_err(|err| anyhow::anyhow!("formatting gpx time: {err}"))?;
                        DateTime::from_str(&formatted).context("parsing gpx timestamp")?
                    }
                    None => Utc::now(),
                };
                fixes.push(GeoFix::new(
                    point.point(),
                    point.elevation.unwrap_or(0.0),
                    point.hdop.map_or(5.0, |hdop| hdop * 5.0),
                    -1.0,
                    timestamp,
                ));
            }
        }
    }
    Ok(fixes)
}
