use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rov_link::{Link, LinkError};
use rov_proto::{Command, EventKind};
use tracing::debug;

use crate::DriveConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Forward,
    Backward,
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            other => anyhow::bail!("unknown direction: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedProfile {
    Slow,
    Medium,
    Fast,
}

impl FromStr for SpeedProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow" => Ok(SpeedProfile::Slow),
            "med" | "medium" => Ok(SpeedProfile::Medium),
            "fast" => Ok(SpeedProfile::Fast),
            other => anyhow::bail!("unknown speed: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionState {
    pub profile: SpeedProfile,
    pub current_speed: u8,
    pub turn_speed: u8,
    pub moving: bool,
    pub moving_forward: bool,
    pub sliding: bool,
    pub direction: Option<Direction>,
}

/// Turns run at `turn_speed`, except during slow cruising where they get
/// `speed + boost` as long as that stays under the ceiling.
pub fn boosted_turn_speed(speed: u8, turn_speed: u8, boost: u8, max: u8) -> u8 {
    let boosted = speed as u16 + boost as u16;
    if speed < turn_speed && boosted < max as u16 {
        boosted as u8
    } else {
        turn_speed
    }
}

/// Directional primitives. Every call goes through the link's send path;
/// state changes only after the command was written.
#[derive(Clone)]
pub struct Motion {
    link: Link,
    cfg: Arc<DriveConfig>,
    state: Arc<Mutex<MotionState>>,
}

impl Motion {
    pub fn new(link: Link, cfg: Arc<DriveConfig>) -> Self {
        let state = MotionState {
            profile: SpeedProfile::Fast,
            current_speed: cfg.speed_fast,
            turn_speed: cfg.turn_speed,
            moving: false,
            moving_forward: false,
            sliding: false,
            direction: None,
        };
        Self { link, cfg, state: Arc::new(Mutex::new(state)) }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.cfg
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MotionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> MotionState {
        self.state().clone()
    }

    pub fn current_speed(&self) -> u8 {
        self.state().current_speed
    }

    pub fn speed_for(&self, profile: SpeedProfile) -> u8 {
        match profile {
            SpeedProfile::Slow => self.cfg.speed_slow,
            SpeedProfile::Medium => self.cfg.speed_med,
            SpeedProfile::Fast => self.cfg.speed_fast,
        }
    }

    /// Records a motion command and raises a mute request on the
    /// stopped-to-moving edge only.
    fn record_motion(&self, direction: Direction, moving_forward: Option<bool>) {
        let started = {
            let mut st = self.state();
            let was_moving = st.moving;
            st.moving = true;
            st.direction = Some(direction);
            if let Some(f) = moving_forward {
                st.moving_forward = f;
            }
            !was_moving
        };
        if started && self.cfg.mute_on_move {
            self.link.emit(EventKind::MuteMic);
        }
    }

    pub async fn go_forward(&self, speed: u8) -> Result<(), LinkError> {
        self.link.send(Command::Forward(speed)).await?;
        self.record_motion(Direction::Forward, Some(true));
        Ok(())
    }

    pub async fn go_backward(&self, speed: u8) -> Result<(), LinkError> {
        self.link.send(Command::Backward(speed)).await?;
        self.record_motion(Direction::Backward, Some(false));
        Ok(())
    }

    fn turn_speed(&self) -> u8 {
        let st = self.state();
        boosted_turn_speed(st.current_speed, st.turn_speed, self.cfg.turn_boost, self.cfg.speed_fast)
    }

    pub async fn turn_left(&self) -> Result<(), LinkError> {
        self.link.send(Command::Left(self.turn_speed())).await?;
        self.record_motion(Direction::Left, None);
        Ok(())
    }

    pub async fn turn_right(&self) -> Result<(), LinkError> {
        self.link.send(Command::Right(self.turn_speed())).await?;
        self.record_motion(Direction::Right, None);
        Ok(())
    }

    pub(crate) async fn turn(&self, direction: Direction) -> Result<(), LinkError> {
        match direction {
            Direction::Right => self.turn_right().await,
            _ => self.turn_left().await,
        }
    }

    pub async fn stop(&self) -> Result<(), LinkError> {
        self.link.send(Command::Stop).await?;
        let was_moving = {
            let mut st = self.state();
            let was = st.moving;
            st.moving = false;
            st.moving_forward = false;
            st.direction = None;
            was
        };
        if was_moving && self.cfg.mute_on_move {
            self.link.emit(EventKind::UnmuteMic);
        }
        Ok(())
    }

    /// Picks a new cruise speed; re-issues forward at once if cruising.
    pub async fn set_speed(&self, profile: SpeedProfile) -> Result<(), LinkError> {
        let speed = self.speed_for(profile);
        let cruising = {
            let mut st = self.state();
            st.profile = profile;
            st.current_speed = speed;
            st.moving_forward
        };
        debug!("speed {:?} = {}", profile, speed);
        if cruising {
            self.go_forward(speed).await?;
        }
        Ok(())
    }

    /// Resumes cruising if we were going forward, otherwise stops.
    pub(crate) async fn resume(&self, moving_forward: bool) -> Result<(), LinkError> {
        if moving_forward {
            self.go_forward(self.current_speed()).await
        } else {
            self.stop().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_cruise_gets_a_boost() {
        assert_eq!(boosted_turn_speed(100, 255, 10, 255), 110);
    }

    #[test]
    fn boost_never_reaches_the_ceiling() {
        assert_eq!(boosted_turn_speed(250, 255, 10, 255), 255);
        assert_eq!(boosted_turn_speed(245, 255, 10, 255), 255);
        assert_eq!(boosted_turn_speed(244, 255, 10, 255), 254);
    }

    #[test]
    fn no_boost_at_or_above_turn_speed() {
        assert_eq!(boosted_turn_speed(200, 150, 10, 255), 150);
        assert_eq!(boosted_turn_speed(150, 150, 10, 255), 150);
    }

    #[test]
    fn parses_operator_words() {
        assert_eq!("med".parse::<SpeedProfile>().unwrap(), SpeedProfile::Medium);
        assert_eq!("backward".parse::<Direction>().unwrap(), Direction::Backward);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
