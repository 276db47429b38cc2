pub mod autodetect;
pub mod error;
pub mod liveness;
pub mod link;
pub mod mock;
pub mod state;
pub mod transport;

mod interpret;
mod sender;
mod watchdog;

pub use error::LinkError;
pub use link::Link;
pub use state::{LinkState, LinkStatus};
pub use transport::{Connector, PortConfig, SerialConnector};

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// If true, probe candidate serial ports and pick the first that answers
    /// a version query.
    pub autodetect: bool,

    /// When autodetect=false: fixed port.
    pub serial_dev: Option<String>,
    pub baud: u32,

    /// Autodetect candidates (paths). Example:
    /// ["/dev/ttyUSB0","/dev/ttyACM0"]
    pub candidate_devs: Option<Vec<String>>,

    /// Version reply wait per probe attempt.
    pub probe_timeout_ms: u64,

    /// Grace after opening the port before the first version query and the
    /// first watchdog check.
    pub setup_delay_ms: u64,

    /// Inbound silence tolerated before the link is declared dead.
    pub dead_timeout_ms: u64,

    /// Keep-alive cadence with and without a sonar fitted.
    pub sonar_delay_ms: u64,
    pub watchdog_delay_ms: u64,

    /// Watchdog polls the sonar instead of the version.
    pub sonar_enabled: bool,

    /// Pushed to the board after every reset notice.
    pub steering_comp: u8,

    /// Distance changes of at most this many cm are not reported.
    pub sonar_noise_threshold: i32,

    pub frame_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            autodetect: false,
            serial_dev: None,
            baud: 115_200,
            candidate_devs: None,
            probe_timeout_ms: 1500,
            setup_delay_ms: 2000,
            dead_timeout_ms: 30_000,
            sonar_delay_ms: 3000,
            watchdog_delay_ms: 5000,
            sonar_enabled: false,
            steering_comp: 128,
            sonar_noise_threshold: 1,
            frame_capacity: rov_proto::frame::DEFAULT_CAPACITY,
        }
    }
}

impl LinkConfig {
    pub fn setup_delay(&self) -> Duration {
        Duration::from_millis(self.setup_delay_ms)
    }

    pub fn dead_timeout(&self) -> Duration {
        Duration::from_millis(self.dead_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Fixed port settings; `None` when no device is configured.
    pub fn port(&self) -> Option<PortConfig> {
        self.serial_dev
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|dev| PortConfig { dev: dev.clone(), baud: self.baud })
    }
}
