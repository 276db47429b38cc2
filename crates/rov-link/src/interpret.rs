use std::sync::{Mutex, MutexGuard, PoisonError};

use rov_proto::{Command, EventKind, Response};
use tracing::{debug, info, trace, warn};

use crate::{Link, LinkError, LinkState};

/// Values learned from the board during the current epoch.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    version: Mutex<Option<String>>,
    distance: Mutex<Option<i32>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Telemetry {
    pub(crate) fn version(&self) -> Option<String> {
        lock(&self.version).clone()
    }

    pub(crate) fn clear_version(&self) {
        *lock(&self.version) = None;
    }

    /// First version of the epoch wins; later ones return false.
    fn capture_version(&self, v: &str) -> bool {
        let mut slot = lock(&self.version);
        if slot.is_some() {
            return false;
        }
        *slot = Some(v.to_string());
        true
    }

    pub(crate) fn distance(&self) -> Option<i32> {
        *lock(&self.distance)
    }

    /// Stores and reports a sample only when it moved by more than `threshold`.
    fn accept_distance(&self, cm: i32, threshold: i32) -> bool {
        let mut last = lock(&self.distance);
        match *last {
            Some(prev) if cm.abs_diff(prev) <= u32::try_from(threshold).unwrap_or(0) => false,
            _ => {
                *last = Some(cm);
                true
            }
        }
    }
}

impl Link {
    pub(crate) fn handle_frame(&self, frame: &str) {
        trace!("in: {}", frame);
        let inner = &self.inner;
        match Response::classify(frame) {
            Response::Reset => {
                inner.clock.mark_read();
                info!("board reset notice");
                self.set_state(LinkState::Connected);
                inner.telemetry.clear_version();
                // might be running new firmware after the reset
                let link = self.clone();
                tokio::spawn(async move {
                    for cmd in [Command::GetVersion, Command::SteeringComp(link.inner.cfg.steering_comp)] {
                        if let Err(e) = link.send(cmd).await {
                            warn!("post-reset {:?}: {}", cmd, e);
                        }
                    }
                });
            }
            Response::Version(v) => {
                inner.clock.mark_read();
                if inner.telemetry.capture_version(v) {
                    info!("firmware version: {}", v);
                    self.emit(EventKind::VersionDiscovered { version: v.to_string() });
                } else {
                    debug!("duplicate version frame ignored");
                }
            }
            Response::Ping => trace!("watchdog ping echoed"),
            Response::Distance(cm) => {
                inner.clock.mark_read();
                if inner.telemetry.accept_distance(cm, inner.cfg.sonar_noise_threshold) {
                    debug!("sonar range: {}cm", cm);
                    self.emit(EventKind::SonarDistance { cm });
                }
            }
            Response::Malformed(raw) => {
                inner.clock.mark_read();
                warn!("{}", LinkError::ProtocolDesync(format!("unparseable distance {:?}", raw)));
            }
            Response::Feedback(text) => {
                let since_read_ms = inner.clock.since_read().as_millis() as u64;
                let since_sent_ms = inner.clock.since_sent().as_millis() as u64;
                inner.clock.mark_read();
                info!("board: {} ({}ms/{}ms)", text, since_read_ms, since_sent_ms);
                self.emit(EventKind::Feedback { text: text.to_string(), since_read_ms, since_sent_ms });
            }
        }
    }
}
