use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rov_link::{Link, LinkError};
use rov_proto::Command;
use tokio::time::sleep;
use tracing::debug;

use crate::CameraConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tilt {
    Up,
    Down,
}

impl Tilt {
    fn step(self) -> i32 {
        match self {
            Tilt::Up => 1,
            Tilt::Down => -1,
        }
    }
}

impl FromStr for Tilt {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Tilt::Up),
            "down" => Ok(Tilt::Down),
            other => anyhow::bail!("unknown tilt: {}", other),
        }
    }
}

/// Servo position with its bounds. The position is only ever changed through
/// methods that clamp, so it is always inside `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraState {
    position: i32,
    /// -1, 0 or 1 while sweeping.
    direction: i32,
    min: i32,
    max: i32,
    rest: i32,
}

impl CameraState {
    /// Inverted bounds are swapped rather than trusted; `doctor` rejects them.
    pub fn new(cfg: &CameraConfig) -> Self {
        let (min, max) = if cfg.pos_min <= cfg.pos_max { (cfg.pos_min, cfg.pos_max) } else { (cfg.pos_max, cfg.pos_min) };
        let mut st = Self { position: min, direction: 0, min, max, rest: cfg.horizontal };
        st.set(cfg.horizontal);
        st
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    pub fn set(&mut self, pos: i32) -> i32 {
        self.position = pos.clamp(self.min, self.max);
        self.position
    }

    pub fn offset(&mut self, delta: i32) -> i32 {
        self.set(self.position.saturating_add(delta))
    }

    /// One sweep step. Hitting a bound clamps and ends the sweep.
    fn advance(&mut self) {
        let next = self.position + self.direction;
        if next > self.max || next < self.min {
            self.position = next.clamp(self.min, self.max);
            self.direction = 0;
        } else {
            self.position = next;
        }
    }
}

/// Tilt servo for the camera mirror.
#[derive(Clone)]
pub struct Camera {
    link: Link,
    cfg: Arc<CameraConfig>,
    state: Arc<Mutex<CameraState>>,
    sweeping: Arc<AtomicBool>,
}

impl Camera {
    pub fn new(link: Link, cfg: Arc<CameraConfig>) -> Self {
        let state = CameraState::new(&cfg);
        Self { link, cfg, state: Arc::new(Mutex::new(state)), sweeping: Arc::new(AtomicBool::new(false)) }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.cfg
    }

    fn state(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position(&self) -> i32 {
        self.state().position()
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::Acquire)
    }

    async fn send_position(&self, pos: i32) -> Result<(), LinkError> {
        // bounds are validated to fit a byte
        self.link.send(Command::CameraMove(pos.clamp(0, 255) as u8)).await
    }

    /// Drops servo torque unless configured to hold.
    async fn maybe_release(&self) -> Result<(), LinkError> {
        if self.cfg.hold_servo {
            return Ok(());
        }
        self.release().await
    }

    pub async fn release(&self) -> Result<(), LinkError> {
        self.link.send(Command::CameraRelease).await
    }

    /// Moves one step per `step_delay` until stopped or a bound is hit.
    /// A second call while sweeping only changes direction.
    ///
    /// `sweeping` only changes under the state lock, so a call either hands
    /// its direction to the running loop or starts a new one.
    pub async fn sweep(&self, tilt: Tilt) -> Result<(), LinkError> {
        {
            let mut st = self.state();
            st.direction = tilt.step();
            if self.sweeping.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }
        self.sweep_loop().await?;
        sleep(Duration::from_millis(self.cfg.sweep_release_ms)).await;
        if self.is_sweeping() {
            return Ok(());
        }
        self.maybe_release().await
    }

    async fn sweep_loop(&self) -> Result<(), LinkError> {
        loop {
            let pos = {
                let st = self.state();
                if st.direction == 0 {
                    self.sweeping.store(false, Ordering::Release);
                    return Ok(());
                }
                st.position
            };
            if let Err(e) = self.send_position(pos).await {
                let mut st = self.state();
                st.direction = 0;
                self.sweeping.store(false, Ordering::Release);
                return Err(e);
            }
            sleep(Duration::from_millis(self.cfg.step_delay_ms)).await;
            self.state().advance();
        }
    }

    /// Ends a sweep at the next step boundary.
    pub fn stop(&self) {
        self.state().direction = 0;
    }

    async fn move_and_settle(&self, pos: i32, hold: Duration) -> Result<(), LinkError> {
        self.send_position(pos).await?;
        sleep(hold).await;
        self.maybe_release().await
    }

    /// Levels the camera.
    pub async fn center(&self) -> Result<(), LinkError> {
        let pos = {
            let mut st = self.state();
            let rest = st.rest;
            st.set(rest)
        };
        debug!("camera level at {}", pos);
        self.move_and_settle(pos, self.cfg.settle()).await
    }

    pub async fn move_to(&self, pos: i32) -> Result<(), LinkError> {
        let pos = self.state().set(pos);
        self.move_and_settle(pos, self.cfg.settle()).await
    }

    /// Small relative adjustment, bounded like every other move.
    pub async fn nudge(&self, delta: i32) -> Result<(), LinkError> {
        let pos = self.state().offset(delta);
        self.move_and_settle(pos, self.cfg.settle()).await
    }

    /// Tilt for a vertical click offset; returns the new position without
    /// moving the servo.
    pub(crate) fn click_adjust(&self, dy: i32) -> i32 {
        let span = i64::from(self.cfg.click_cam_span.max(1));
        let n = i64::from(self.cfg.max_click_cam) * i64::from(dy) / span;
        let n = n.clamp(-i64::from(i32::MAX), i64::from(i32::MAX)) as i32;
        self.state().offset(-n)
    }

    pub(crate) async fn hold_at(&self, pos: i32, hold: Duration) -> Result<(), LinkError> {
        self.move_and_settle(pos, hold).await
    }
}
