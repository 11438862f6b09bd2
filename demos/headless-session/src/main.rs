//! Feel Good headless session
//!
//! Plays a short scripted session without a screen:
//! - Loads progress from a JSON file and syncs with an in-memory cloud
//! - Spawns targets on a timer and taps most of them
//! - Speeds up the spawn interval halfway through
//! - Commits periodically and on exit
//!
//! Usage: `headless-session [progress.json] [config.json]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feelgood_core::SystemClock;
use feelgood_runtime::telemetry::{self, LogFormat};
use feelgood_runtime::{
    run_spawner, GameSession, LogReporter, Point, SessionConfig, SpawnScheduler, TapOutcome,
    Viewport,
};
use feelgood_store::{JsonFileStore, MemoryRemoteStore};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{mpsc, watch};

const TARGETS: u64 = 16;
const HIT_RATE: f64 = 0.8;
const COMMIT_EVERY: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init("info,feelgood_runtime=debug", LogFormat::Pretty)?;

    let mut args = std::env::args().skip(1);
    let progress_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("feelgood-progress.json"));
    let config = match args.next() {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    let local = JsonFileStore::open(&progress_path)?;
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_latency(Duration::from_millis(40));

    let session = Arc::new(GameSession::new(
        local,
        remote,
        LogReporter,
        config.clone(),
        Arc::new(SystemClock),
    ));

    let mut status = session.sync_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let s = status.borrow_and_update().clone();
            if let Some(e) = &s.last_error {
                tracing::info!(syncing = s.syncing, error = %e, "sync status");
            } else {
                tracing::info!(syncing = s.syncing, last_synced = ?s.last_synced, "sync status");
            }
        }
    });

    session.load().await;
    let start = session.snapshot();
    println!(
        "Loaded {}: score {}, flowers {}, interval {:.2}s",
        progress_path.display(),
        start.score,
        start.flowers_seen,
        start.interval
    );

    let scheduler = Arc::new(Mutex::new(SpawnScheduler::new(config.spawn.clone())));
    scheduler.lock().set_viewport(Viewport::new(390.0, 844.0));

    let (interval_tx, interval_rx) = watch::channel(session.spawn_period());
    let (target_tx, mut targets) = mpsc::channel(8);
    let spawner = tokio::spawn(run_spawner(scheduler.clone(), interval_rx, target_tx));

    let mut rng = rand::thread_rng();
    while let Some(target) = targets.recv().await {
        let point = if rng.gen_bool(HIT_RATE) {
            target.region.center()
        } else {
            Point::new(target.region.x - 1.0, target.region.y - 1.0)
        };

        let outcome = scheduler.lock().handle_tap(point);
        match outcome {
            TapOutcome::Hit { bonus } => {
                let record = session.record_tap(bonus);
                println!(
                    "#{:>2} hit{} score {}",
                    target.serial,
                    if bonus { " + flower" } else { "" },
                    record.score
                );
            }
            TapOutcome::Miss => println!("#{:>2} miss", target.serial),
        }

        if target.serial == TARGETS / 2 {
            let applied = session.set_interval(session.snapshot().interval / 2.0);
            interval_tx.send(session.spawn_period())?;
            println!("Interval now {:.2}s", applied);
        }
        if target.serial % COMMIT_EVERY == 0 {
            session.commit().await;
        }
        if target.serial >= TARGETS {
            break;
        }
    }

    scheduler.lock().stop();
    drop(targets);
    drop(interval_tx);
    spawner.await?;

    session.pause().await;
    let end = session.snapshot();
    println!(
        "Session over: score {} (+{}), flowers {} (+{})",
        end.score,
        end.score - start.score,
        end.flowers_seen,
        end.flowers_seen - start.flowers_seen
    );
    for id in session.achievements().recently_unlocked() {
        println!("Unlocked {}", id);
    }

    drop(session);
    status_task.await?;
    Ok(())
}
