//! Timed target spawning
//!
//! A target is a randomly sized, placed and coloured region. Each target
//! carries a bonus draw; a hit on a bonus target reveals a flower.

use std::sync::Arc;
use std::time::Duration;

use feelgood_core::{sanitize_interval, MIN_INTERVAL};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Spawn configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnConfig {
    /// Probability that a target carries a flower
    pub bonus_probability: f64,
    /// Smallest target size as a fraction of each viewport dimension
    pub min_size_fraction: f64,
    /// Largest target size as a fraction of each viewport dimension
    pub max_size_fraction: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        SpawnConfig {
            bonus_probability: 0.2,
            min_size_fraction: 0.3,
            max_size_fraction: 0.4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned region, origin at the top-left corner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Containment with a rounding tolerance of 1e-9 per unit of viewport
    pub fn fits_in(&self, viewport: &Viewport) -> bool {
        let slack_x = viewport.width * 1e-9;
        let slack_y = viewport.height * 1e-9;
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= viewport.width + slack_x
            && self.y + self.height <= viewport.height + slack_y
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Solid,
    LinearGradient,
    RadialGradient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetColor {
    Red,
    Blue,
    Green,
    Yellow,
    Orange,
    Purple,
    Pink,
}

impl TargetColor {
    pub const ALL: [TargetColor; 7] = [
        TargetColor::Red,
        TargetColor::Blue,
        TargetColor::Green,
        TargetColor::Yellow,
        TargetColor::Orange,
        TargetColor::Purple,
        TargetColor::Pink,
    ];
}

#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Monotonic spawn number
    pub serial: u64,
    pub region: Region,
    pub fill: Fill,
    pub colors: [TargetColor; 2],
    /// Revealed only when the target is hit
    pub bonus: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    Miss,
    Hit { bonus: bool },
}

/// Produces targets and resolves taps against the current one
pub struct SpawnScheduler {
    config: SpawnConfig,
    rng: StdRng,
    viewport: Option<Viewport>,
    current: Option<Target>,
    flower_visible: bool,
    spawned: u64,
}

impl SpawnScheduler {
    pub fn new(config: SpawnConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: SpawnConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SpawnConfig, rng: StdRng) -> Self {
        SpawnScheduler {
            config,
            rng,
            viewport: None,
            current: None,
            flower_visible: false,
            spawned: 0,
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn current(&self) -> Option<&Target> {
        self.current.as_ref()
    }

    pub fn flower_visible(&self) -> bool {
        self.flower_visible
    }

    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    /// Replace the current target. Does nothing without a usable viewport.
    pub fn spawn(&mut self) -> Option<Target> {
        let viewport = self.viewport.filter(Viewport::is_usable)?;

        let lo = self.config.min_size_fraction.clamp(0.0, 1.0);
        let hi = self.config.max_size_fraction.clamp(lo, 1.0);
        let width = viewport.width * self.rng.gen_range(lo..=hi);
        let height = viewport.height * self.rng.gen_range(lo..=hi);
        let x = self.rng.gen_range(0.0..=(viewport.width - width).max(0.0));
        let y = self.rng.gen_range(0.0..=(viewport.height - height).max(0.0));

        let fill = match self.rng.gen_range(0..3) {
            0 => Fill::Solid,
            1 => Fill::LinearGradient,
            _ => Fill::RadialGradient,
        };
        let colors = [self.random_color(), self.random_color()];
        let bonus = self.rng.gen_bool(self.config.bonus_probability.clamp(0.0, 1.0));

        self.spawned += 1;
        let target = Target {
            serial: self.spawned,
            region: Region {
                x,
                y,
                width,
                height,
            },
            fill,
            colors,
            bonus,
        };

        self.current = Some(target.clone());
        self.flower_visible = false;
        Some(target)
    }

    /// A hit consumes the target until the next spawn
    pub fn handle_tap(&mut self, point: Point) -> TapOutcome {
        match &self.current {
            Some(target) if target.region.contains(point) => {
                let bonus = target.bonus;
                self.current = None;
                self.flower_visible = bonus;
                TapOutcome::Hit { bonus }
            }
            _ => TapOutcome::Miss,
        }
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.flower_visible = false;
    }

    fn random_color(&mut self) -> TargetColor {
        TargetColor::ALL[self.rng.gen_range(0..TargetColor::ALL.len())]
    }
}

/// Spawn period for an interval setting in seconds
pub fn spawn_period(interval_secs: f64) -> Duration {
    Duration::from_secs_f64(sanitize_interval(interval_secs))
}

/// Drive `scheduler` on a timer until either channel closes.
///
/// The first target spawns immediately. A new period on `interval_rx`
/// restarts the timer one full period out and leaves the current target
/// alone.
pub async fn run_spawner(
    scheduler: Arc<Mutex<SpawnScheduler>>,
    mut interval_rx: watch::Receiver<Duration>,
    events: mpsc::Sender<Target>,
) {
    let min_period = Duration::from_secs_f64(MIN_INTERVAL);
    let mut period = (*interval_rx.borrow_and_update()).max(min_period);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let spawned = scheduler.lock().spawn();
                if let Some(target) = spawned {
                    if events.send(target).await.is_err() {
                        break;
                    }
                }
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                period = (*interval_rx.borrow_and_update()).max(min_period);
                ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                tracing::debug!(?period, "spawn timer restarted");
            }
        }
    }

    tracing::debug!("spawner stopped");
}
