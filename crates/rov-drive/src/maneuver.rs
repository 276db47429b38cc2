use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rov_link::LinkError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::motion::{Direction, Motion, SpeedProfile};
use crate::DriveConfig;

/// Momentum multiplier for a horizontal click offset:
/// `coeff * ((span - |dx|) / span)^exp + 1`. Clicks near the centre get the
/// full boost, clicks at the edge of the span get none.
pub fn momentum_multiplier(dx: i32, cfg: &DriveConfig) -> f64 {
    let span = cfg.click_span.max(1) as f64;
    let x = (dx.unsigned_abs() as f64).min(span);
    cfg.click_momentum_mult * ((span - x) / span).powi(cfg.click_momentum_exponent) + 1.0
}

/// How long a click-nudge turns for.
pub fn click_nudge_duration(dx: i32, cfg: &DriveConfig) -> Duration {
    let span = cfg.click_span.max(1) as u64;
    let x = (dx.unsigned_abs() as u64).min(span);
    let base = cfg.max_click_nudge_delay_ms * x / span;
    Duration::from_millis((base as f64 * momentum_multiplier(dx, cfg)) as u64)
}

/// Speed to restore once a slide ends or is cancelled.
#[derive(Debug, Clone, Copy)]
struct Saved {
    profile: SpeedProfile,
    speed: u8,
}

/// Timed composite behaviours built on the motion primitives.
///
/// Link errors inside a maneuver are logged and end the maneuver; they are
/// not returned to the caller.
#[derive(Clone)]
pub struct Maneuvers {
    motion: Motion,
    camera: Camera,
    slide_saved: Arc<Mutex<Option<Saved>>>,
    /// Bumped by every slide start and every cancel; a slide only acts while
    /// the generation it started with is current.
    slide_gen: Arc<AtomicU64>,
}

impl Maneuvers {
    pub fn new(motion: Motion, camera: Camera) -> Self {
        Self { motion, camera, slide_saved: Arc::new(Mutex::new(None)), slide_gen: Arc::new(AtomicU64::new(0)) }
    }

    fn cfg(&self) -> &DriveConfig {
        self.motion.config()
    }

    fn saved(&self) -> MutexGuard<'_, Option<Saved>> {
        self.slide_saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Brief pulse in `direction`, then back to cruising or stopped, whichever
    /// was the case before. Straight pulses last four times longer than turns.
    pub async fn nudge(&self, direction: Direction) {
        if let Err(e) = self.try_nudge(direction).await {
            warn!("nudge {:?}: {}", direction, e);
        }
    }

    async fn try_nudge(&self, direction: Direction) -> Result<(), LinkError> {
        let (was_forward, speed) = {
            let st = self.motion.state();
            (st.moving_forward, st.current_speed)
        };
        let mut hold = self.cfg().nudge_delay();
        match direction {
            Direction::Left | Direction::Right => self.motion.turn(direction).await?,
            Direction::Forward => {
                self.motion.go_forward(speed).await?;
                hold *= 4;
            }
            Direction::Backward => {
                self.motion.go_backward(speed).await?;
                hold *= 4;
            }
        }
        sleep(hold).await;
        self.motion.resume(was_forward).await
    }

    pub fn is_sliding(&self) -> bool {
        self.motion.state().sliding
    }

    fn still_sliding(&self, token: u64) -> bool {
        self.slide_gen.load(Ordering::Acquire) == token
    }

    /// Sideways shuffle: counter-turn, reverse, turn back, forward. The
    /// cancel flag is checked at each phase boundary. Only a completed slide
    /// restores the speed; a cancelled one is restored by `cancel_slide`.
    pub async fn slide(&self, direction: Direction) {
        let direction = match direction {
            Direction::Left | Direction::Right => direction,
            other => {
                warn!("slide {:?}: only left or right", other);
                return;
            }
        };
        let fast = self.cfg().speed_fast;
        let token = {
            let mut st = self.motion.state();
            if st.sliding {
                debug!("slide already running");
                return;
            }
            st.sliding = true;
            *self.saved() = Some(Saved { profile: st.profile, speed: st.current_speed });
            st.current_speed = fast;
            self.slide_gen.fetch_add(1, Ordering::AcqRel) + 1
        };
        info!("slide {:?}", direction);
        match self.slide_phases(direction, fast, token).await {
            Ok(true) => self.finish_slide(token),
            Ok(false) => debug!("slide cancelled"),
            Err(e) => {
                warn!("slide {:?}: {}", direction, e);
                self.finish_slide(token);
            }
        }
    }

    /// Clears the slide and restores its saved speed, unless `token` was
    /// already cancelled or superseded.
    fn finish_slide(&self, token: u64) {
        let mut st = self.motion.state();
        if self.slide_gen.compare_exchange(token, token + 1, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        st.sliding = false;
        if let Some(s) = self.saved().take() {
            st.profile = s.profile;
            st.current_speed = s.speed;
        }
    }

    /// `Ok(false)` when cancelled between phases.
    async fn slide_phases(&self, direction: Direction, fast: u8, token: u64) -> Result<bool, LinkError> {
        let turn = Duration::from_millis(self.cfg().slide_turn_ms);
        let travel = Duration::from_millis(self.cfg().slide_travel_ms);
        let counter = match direction {
            Direction::Right => Direction::Left,
            _ => Direction::Right,
        };

        self.motion.turn(counter).await?;
        sleep(turn).await;
        if !self.still_sliding(token) {
            return Ok(false);
        }
        self.motion.go_backward(fast).await?;
        sleep(travel).await;
        if !self.still_sliding(token) {
            return Ok(false);
        }
        self.motion.turn(direction).await?;
        sleep(turn).await;
        if !self.still_sliding(token) {
            return Ok(false);
        }
        self.motion.go_forward(fast).await?;
        sleep(travel).await;
        if !self.still_sliding(token) {
            return Ok(false);
        }
        self.motion.stop().await?;
        Ok(true)
    }

    /// Stops a running slide at its next phase boundary and puts the cruise
    /// speed back.
    pub fn cancel_slide(&self) {
        let mut st = self.motion.state();
        if !st.sliding {
            return;
        }
        self.slide_gen.fetch_add(1, Ordering::AcqRel);
        st.sliding = false;
        if let Some(s) = self.saved().take() {
            st.profile = s.profile;
            st.current_speed = s.speed;
        }
    }

    /// Maps a pointer offset to a camera tilt (`dy`) and a timed turn (`dx`).
    /// Returns the new camera position when `dy` moved it.
    pub async fn click_steer(&self, dx: i32, dy: i32) -> Option<i32> {
        let turn_for = if dx != 0 { click_nudge_duration(dx, self.cfg()) } else { Duration::ZERO };
        let settle = self.camera.config().settle();

        let cam_pos = (dy != 0).then(|| self.camera.click_adjust(dy));
        let cam = async {
            if let Some(pos) = cam_pos {
                if let Err(e) = self.camera.hold_at(pos, settle + turn_for).await {
                    warn!("click cam: {}", e);
                }
            }
        };
        let steer = async {
            if dx != 0 {
                if dy != 0 {
                    sleep(settle).await;
                }
                self.click_nudge(dx).await;
            }
        };
        tokio::join!(cam, steer);
        cam_pos
    }

    /// Full-speed turn for a duration derived from the click offset, then
    /// back to the previous speed and cruise state.
    pub async fn click_nudge(&self, dx: i32) {
        let direction = if dx > 0 { Direction::Right } else { Direction::Left };
        let duration = click_nudge_duration(dx, self.cfg());
        debug!("click nudge {:?} for {}ms", direction, duration.as_millis());
        if let Err(e) = self.try_click_nudge(direction, duration).await {
            warn!("click nudge: {}", e);
        }
    }

    async fn try_click_nudge(&self, direction: Direction, duration: Duration) -> Result<(), LinkError> {
        let fast = self.cfg().speed_fast;
        let saved = std::mem::replace(&mut self.motion.state().current_speed, fast);
        let turned = self.motion.turn(direction).await;
        if turned.is_ok() {
            sleep(duration).await;
        }
        let moving_forward = {
            let mut st = self.motion.state();
            st.current_speed = saved;
            st.moving_forward
        };
        turned?;
        self.motion.resume(moving_forward).await
    }
}
