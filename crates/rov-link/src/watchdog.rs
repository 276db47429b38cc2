use std::time::Duration;

use rov_proto::{Command, EventKind};
use tracing::{debug, error};

use crate::{Link, LinkError};

/// Liveness loop for one connection epoch.
///
/// Declares the link dead after `dead_timeout` of inbound silence and stops;
/// there is no automatic reconnect. Otherwise each tick doubles as the sensor
/// poll: a sonar ping when a sonar is fitted, a version query if not.
pub(crate) async fn run(link: Link, epoch: u64) {
    let cfg = link.config().clone();
    tokio::time::sleep(cfg.setup_delay()).await;

    loop {
        if !link.is_current(epoch) {
            debug!("watchdog for epoch {} retired", epoch);
            return;
        }

        let idle = link.liveness().since_read();
        if idle > cfg.dead_timeout() {
            error!("watchdog: {}", LinkError::LinkDead { idle });
            link.emit(EventKind::LinkDead { idle_ms: idle.as_millis() as u64 });
            return;
        }

        let (cmd, delay) = if cfg.sonar_enabled {
            (Command::SonarPing, cfg.sonar_delay_ms)
        } else {
            (Command::GetVersion, cfg.watchdog_delay_ms)
        };
        if let Err(e) = link.send(cmd).await {
            debug!("keep-alive {:?}: {}", cmd, e);
        }
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
