use anyhow::Result;
use rov_link::LinkConfig;
use crate::{CameraConfig, DriveConfig};

pub fn check_link(link: &LinkConfig) -> Result<()> {
    if !link.autodetect {
        anyhow::ensure!(link.port().is_some(), "link.serial_dev missing (autodetect=false)");
    }
    anyhow::ensure!(link.baud > 0, "link.baud invalid");
    anyhow::ensure!(link.dead_timeout_ms > link.watchdog_delay_ms.max(link.sonar_delay_ms), "link.dead_timeout_ms must exceed the keep-alive interval");
    anyhow::ensure!(link.watchdog_delay_ms > 0 && link.sonar_delay_ms > 0, "link keep-alive delays must be > 0");
    anyhow::ensure!(link.frame_capacity >= 16, "link.frame_capacity too small for version frames");
    anyhow::ensure!(link.sonar_noise_threshold >= 0, "link.sonar_noise_threshold must be >= 0");
    Ok(())
}

pub fn check_drive(drive: &DriveConfig) -> Result<()> {
    anyhow::ensure!(drive.speed_slow > 0, "drive.speed_slow must be > 0");
    anyhow::ensure!(drive.speed_slow <= drive.speed_med && drive.speed_med <= drive.speed_fast, "drive speeds must be ordered slow <= med <= fast");
    anyhow::ensure!(drive.turn_speed <= drive.speed_fast, "drive.turn_speed above speed_fast");
    anyhow::ensure!(drive.click_span > 0, "drive.click_span must be > 0");
    anyhow::ensure!(drive.click_momentum_mult >= 0.0, "drive.click_momentum_mult must be >= 0");
    anyhow::ensure!((1..=8).contains(&drive.click_momentum_exponent), "drive.click_momentum_exponent should be 1..8");
    Ok(())
}

pub fn check_camera(cam: &CameraConfig) -> Result<()> {
    anyhow::ensure!(cam.pos_min >= 0 && cam.pos_max <= 255, "camera bounds must fit in a byte");
    anyhow::ensure!(cam.pos_min < cam.pos_max, "camera.pos_min must be below camera.pos_max");
    anyhow::ensure!(cam.horizontal >= cam.pos_min && cam.horizontal <= cam.pos_max, "camera.horizontal outside [pos_min, pos_max]");
    anyhow::ensure!(cam.nudge_step > 0, "camera.nudge_step must be > 0");
    anyhow::ensure!(cam.click_cam_span > 0, "camera.click_cam_span must be > 0");
    Ok(())
}
