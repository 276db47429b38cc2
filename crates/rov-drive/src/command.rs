use std::str::FromStr;

use anyhow::Context;

use crate::camera::Tilt;
use crate::motion::{Direction, SpeedProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAction {
    Sweep(Tilt),
    Stop,
    Level,
    UpABit,
    DownABit,
    Release,
    To(i32),
}

/// One operator command as typed on the console, e.g. `nudge left` or
/// `click 120 -40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Speed(SpeedProfile),
    Nudge(Direction),
    Slide(Direction),
    SlideCancel,
    Camera(CameraAction),
    Click { dx: i32, dy: i32 },
    Echo(bool),
    Sonar,
    SteeringComp,
    Version,
    Reset,
}

impl FromStr for DriveCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let cmd = match words.as_slice() {
            ["forward"] => DriveCommand::Forward,
            ["backward"] => DriveCommand::Backward,
            ["left"] => DriveCommand::Left,
            ["right"] => DriveCommand::Right,
            ["stop"] => DriveCommand::Stop,
            ["speed", p] => DriveCommand::Speed(p.parse()?),
            ["nudge", d] => DriveCommand::Nudge(d.parse()?),
            ["slide", d @ ("left" | "right")] => DriveCommand::Slide(d.parse()?),
            ["slidecancel"] => DriveCommand::SlideCancel,
            ["cam", "stop"] => DriveCommand::Camera(CameraAction::Stop),
            ["cam", "horiz"] => DriveCommand::Camera(CameraAction::Level),
            ["cam", "upabit"] => DriveCommand::Camera(CameraAction::UpABit),
            ["cam", "downabit"] => DriveCommand::Camera(CameraAction::DownABit),
            ["cam", "release"] => DriveCommand::Camera(CameraAction::Release),
            ["cam", t @ ("up" | "down")] => DriveCommand::Camera(CameraAction::Sweep(t.parse()?)),
            ["cam", n] => DriveCommand::Camera(CameraAction::To(n.parse().with_context(|| format!("bad camera position {:?}", n))?)),
            ["click", x, y] => DriveCommand::Click {
                dx: x.parse().with_context(|| format!("bad click x {:?}", x))?,
                dy: y.parse().with_context(|| format!("bad click y {:?}", y))?,
            },
            ["echo", "on"] => DriveCommand::Echo(true),
            ["echo", "off"] => DriveCommand::Echo(false),
            ["sonar"] => DriveCommand::Sonar,
            ["comp"] => DriveCommand::SteeringComp,
            ["version"] => DriveCommand::Version,
            ["reset"] => DriveCommand::Reset,
            [] => anyhow::bail!("empty command"),
            _ => anyhow::bail!("unknown command: {}", s.trim()),
        };
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_vocabulary() {
        assert_eq!("forward".parse::<DriveCommand>().unwrap(), DriveCommand::Forward);
        assert_eq!("speed slow".parse::<DriveCommand>().unwrap(), DriveCommand::Speed(SpeedProfile::Slow));
        assert_eq!("nudge backward".parse::<DriveCommand>().unwrap(), DriveCommand::Nudge(Direction::Backward));
        assert_eq!("slide right".parse::<DriveCommand>().unwrap(), DriveCommand::Slide(Direction::Right));
        assert_eq!("cam up".parse::<DriveCommand>().unwrap(), DriveCommand::Camera(CameraAction::Sweep(Tilt::Up)));
        assert_eq!("cam 85".parse::<DriveCommand>().unwrap(), DriveCommand::Camera(CameraAction::To(85)));
        assert_eq!("  click -40 12 ".parse::<DriveCommand>().unwrap(), DriveCommand::Click { dx: -40, dy: 12 });
        assert_eq!("echo off".parse::<DriveCommand>().unwrap(), DriveCommand::Echo(false));
    }

    #[test]
    fn rejects_nonsense() {
        assert!("".parse::<DriveCommand>().is_err());
        assert!("slide forward".parse::<DriveCommand>().is_err());
        assert!("cam sideways".parse::<DriveCommand>().is_err());
        assert!("click 1".parse::<DriveCommand>().is_err());
        assert!("fly".parse::<DriveCommand>().is_err());
    }
}
