pub mod camera;
pub mod command;
pub mod doctor;
pub mod maneuver;
pub mod motion;
pub mod rov;

pub use camera::Camera;
pub use command::DriveCommand;
pub use maneuver::Maneuvers;
pub use motion::{Direction, Motion, SpeedProfile};
pub use rov::Rov;

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub speed_slow: u8,
    pub speed_med: u8,
    /// Also the ceiling for boosted turns.
    pub speed_fast: u8,
    pub turn_speed: u8,
    pub turn_boost: u8,

    /// Ask the application to mute the on-board mic while the motors run.
    pub mute_on_move: bool,

    pub nudge_delay_ms: u64,
    pub slide_turn_ms: u64,
    pub slide_travel_ms: u64,

    /// Turn duration for a click at the edge of the span, before momentum.
    pub max_click_nudge_delay_ms: u64,
    pub click_span: i32,
    pub click_momentum_mult: f64,
    pub click_momentum_exponent: i32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            speed_slow: 100,
            speed_med: 180,
            speed_fast: 255,
            turn_speed: 255,
            turn_boost: 10,
            mute_on_move: false,
            nudge_delay_ms: 150,
            slide_turn_ms: 500,
            slide_travel_ms: 300,
            max_click_nudge_delay_ms: 580,
            click_span: 320,
            click_momentum_mult: 0.7,
            click_momentum_exponent: 3,
        }
    }
}

impl DriveConfig {
    pub fn nudge_delay(&self) -> Duration {
        Duration::from_millis(self.nudge_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub pos_min: i32,
    pub pos_max: i32,
    /// Rest position that levels the camera.
    pub horizontal: i32,

    /// Pause between single-step moves during a sweep.
    pub step_delay_ms: u64,
    /// Hold time after a discrete move before the servo is released.
    pub settle_ms: u64,
    pub sweep_release_ms: u64,
    pub nudge_step: i32,

    /// Tilt for a click at the edge of the vertical span.
    pub max_click_cam: i32,
    pub click_cam_span: i32,

    /// Keep torque on the servo instead of releasing it after each move.
    pub hold_servo: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            pos_min: 30,
            pos_max: 110,
            horizontal: 70,
            step_delay_ms: 50,
            settle_ms: 400,
            sweep_release_ms: 250,
            nudge_step: 5,
            max_click_cam: 30,
            click_cam_span: 240,
            hold_servo: false,
        }
    }
}

impl CameraConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
