//! Background mouse movement
//!
//! Moves the pointer on a random walk while the crawler works. The walk runs
//! as its own task and is stopped through a cancellation token; `stop` waits
//! for the movement in flight to finish before returning.

use crate::driver::{DriverError, PageDriver};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bounds and pacing of the random walk
#[derive(Debug, Clone)]
pub struct MouseSettings {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    /// Distance per move in pixels
    pub min_speed: i32,
    pub max_speed: i32,
    /// Heading change per move in degrees
    pub min_angle_change: i32,
    pub max_angle_change: i32,
    pub min_steps: u32,
    pub max_steps: u32,
    /// Pause between moves in milliseconds
    pub min_pause_ms: u64,
    pub max_pause_ms: u64,
}

impl Default for MouseSettings {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 1280.0,
            min_y: 0.0,
            max_y: 720.0,
            min_speed: 50,
            max_speed: 500,
            min_angle_change: -10,
            max_angle_change: 10,
            min_steps: 5,
            max_steps: 20,
            min_pause_ms: 50,
            max_pause_ms: 500,
        }
    }
}

struct Walk {
    cancel: CancellationToken,
    handle: JoinHandle<(f64, f64)>,
}

/// Drives the random walk against a shared page driver
pub struct MouseSimulator {
    driver: Arc<dyn PageDriver>,
    settings: MouseSettings,
    walk: Option<Walk>,
    position: (f64, f64),
}

impl MouseSimulator {
    pub fn new(driver: Arc<dyn PageDriver>, settings: MouseSettings) -> Self {
        Self {
            driver,
            settings,
            walk: None,
            position: (0.0, 0.0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.walk
            .as_ref()
            .map(|walk| !walk.handle.is_finished())
            .unwrap_or(false)
    }

    /// Last position reached by a finished walk
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Starts a new walk, stopping the current one first
    pub async fn start(&mut self) {
        if self.walk.is_some() {
            self.stop().await;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(random_walk(
            Arc::clone(&self.driver),
            self.settings.clone(),
            cancel.clone(),
            self.position,
        ));

        tracing::debug!("Mouse simulation started");
        self.walk = Some(Walk { cancel, handle });
    }

    /// Stops the walk and waits for it to finish
    ///
    /// Never fails: a page closed underneath the walk just ends it.
    pub async fn stop(&mut self) {
        let Some(walk) = self.walk.take() else {
            return;
        };

        walk.cancel.cancel();
        match walk.handle.await {
            Ok(position) => self.position = position,
            Err(e) => tracing::warn!(error = %e, "Mouse simulation task failed"),
        }

        if self.driver.is_closed() {
            return;
        }

        let (x, y) = self.position;
        match self.driver.move_mouse(x, y, 1).await {
            Ok(()) | Err(DriverError::PageClosed) => {}
            Err(e) => tracing::debug!(error = %e, "Final mouse move failed"),
        }
        tracing::debug!("Mouse simulation stopped");
    }
}

async fn random_walk(
    driver: Arc<dyn PageDriver>,
    settings: MouseSettings,
    cancel: CancellationToken,
    start: (f64, f64),
) -> (f64, f64) {
    let (mut x, mut y) = start;
    let mut angle = 0.0_f64;

    loop {
        if cancel.is_cancelled() || driver.is_closed() {
            break;
        }

        // The RNG is not Send; draw everything before the next await
        let (next_x, next_y, steps, pause) = {
            let mut rng = rand::thread_rng();
            angle += f64::from(
                rng.gen_range(settings.min_angle_change..=settings.max_angle_change),
            );
            let speed = f64::from(rng.gen_range(settings.min_speed..=settings.max_speed));
            let radians = angle.to_radians();
            (
                (x + radians.cos() * speed).clamp(settings.min_x, settings.max_x),
                (y + radians.sin() * speed).clamp(settings.min_y, settings.max_y),
                rng.gen_range(settings.min_steps..=settings.max_steps),
                Duration::from_millis(rng.gen_range(settings.min_pause_ms..=settings.max_pause_ms)),
            )
        };

        match driver.move_mouse(next_x, next_y, steps).await {
            Ok(()) => {
                x = next_x;
                y = next_y;
            }
            Err(DriverError::PageClosed) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Mouse move failed, ending simulation");
                break;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    (x, y)
}
