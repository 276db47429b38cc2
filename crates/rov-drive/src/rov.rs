use std::sync::Arc;

use rov_link::{Link, LinkError};
use tracing::{info, warn};

use crate::command::{CameraAction, DriveCommand};
use crate::{Camera, CameraConfig, DriveConfig, Maneuvers, Motion};

/// Everything an operator session drives, wired to one link.
#[derive(Clone)]
pub struct Rov {
    pub link: Link,
    pub motion: Motion,
    pub camera: Camera,
    pub maneuvers: Maneuvers,
}

impl Rov {
    pub fn new(link: Link, drive: DriveConfig, camera: CameraConfig) -> Self {
        let motion = Motion::new(link.clone(), Arc::new(drive));
        let camera = Camera::new(link.clone(), Arc::new(camera));
        let maneuvers = Maneuvers::new(motion.clone(), camera.clone());
        Self { link, motion, camera, maneuvers }
    }

    /// Connects and, once the board had time to boot, levels the camera.
    pub async fn start(&self) -> Result<(), LinkError> {
        self.link.connect().await?;
        let camera = self.camera.clone();
        let setup = self.link.config().setup_delay();
        tokio::spawn(async move {
            tokio::time::sleep(setup).await;
            if let Err(e) = camera.center().await {
                warn!("initial camera level: {}", e);
            }
        });
        Ok(())
    }

    /// Runs one operator command. Primitives complete before returning;
    /// timed maneuvers and camera moves are spawned so the console stays
    /// responsive.
    pub async fn execute(&self, cmd: DriveCommand) -> Result<(), LinkError> {
        info!("command {:?}", cmd);
        match cmd {
            DriveCommand::Forward => self.motion.go_forward(self.motion.current_speed()).await?,
            DriveCommand::Backward => self.motion.go_backward(self.motion.current_speed()).await?,
            DriveCommand::Left => self.motion.turn_left().await?,
            DriveCommand::Right => self.motion.turn_right().await?,
            DriveCommand::Stop => self.motion.stop().await?,
            DriveCommand::Speed(p) => self.motion.set_speed(p).await?,
            DriveCommand::Nudge(d) => {
                let m = self.maneuvers.clone();
                tokio::spawn(async move { m.nudge(d).await });
            }
            DriveCommand::Slide(d) => {
                let m = self.maneuvers.clone();
                tokio::spawn(async move { m.slide(d).await });
            }
            DriveCommand::SlideCancel => self.maneuvers.cancel_slide(),
            DriveCommand::Click { dx, dy } => {
                let m = self.maneuvers.clone();
                tokio::spawn(async move { m.click_steer(dx, dy).await });
            }
            DriveCommand::Camera(action) => self.camera_action(action),
            DriveCommand::Echo(on) => self.link.set_echo(on).await?,
            DriveCommand::Sonar => self.link.poll_sensor().await?,
            DriveCommand::SteeringComp => self.link.update_steering_comp().await?,
            DriveCommand::Version => self.link.request_version().await?,
            DriveCommand::Reset => {
                if self.link.reset().is_none() {
                    return Err(LinkError::NotConnected);
                }
            }
        }
        Ok(())
    }

    fn camera_action(&self, action: CameraAction) {
        if action == CameraAction::Stop {
            self.camera.stop();
            return;
        }
        let cam = self.camera.clone();
        tokio::spawn(async move {
            let step = cam.config().nudge_step;
            let res = match action {
                CameraAction::Sweep(t) => cam.sweep(t).await,
                CameraAction::Level => cam.center().await,
                CameraAction::UpABit => cam.nudge(step).await,
                CameraAction::DownABit => cam.nudge(-step).await,
                CameraAction::Release => cam.release().await,
                CameraAction::To(pos) => cam.move_to(pos).await,
                CameraAction::Stop => Ok(()),
            };
            if let Err(e) = res {
                warn!("camera {:?}: {}", action, e);
            }
        });
    }
}
