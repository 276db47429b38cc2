use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rov_proto::{Command, EventKind, FrameEvent, FrameParser, RovEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::interpret::Telemetry;
use crate::liveness::LivenessClock;
use crate::transport::{BoxReader, BoxWriter, Connector, PortConfig};
use crate::{watchdog, LinkConfig, LinkError, LinkState, LinkStatus};

/// Handle to the microcontroller link. Cheap to clone; all clones share one
/// port, one send lock and one event sink.
#[derive(Clone)]
pub struct Link {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) cfg: LinkConfig,
    port: Mutex<Option<PortConfig>>,
    connector: Arc<dyn Connector>,
    state: watch::Sender<LinkState>,
    epoch: AtomicU64,
    pub(crate) writer: tokio::sync::Mutex<Option<BoxWriter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) clock: LivenessClock,
    pub(crate) telemetry: Telemetry,
    events: mpsc::UnboundedSender<RovEvent>,
    connected_once: AtomicBool,
    resetting: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Link {
    /// Builds a disconnected link. Events (version, sonar, feedback, link
    /// death, mic mute requests) arrive on the returned receiver.
    pub fn new(
        cfg: LinkConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<RovEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(LinkState::Disconnected);
        let inner = Inner {
            port: Mutex::new(cfg.port()),
            cfg,
            connector,
            state,
            epoch: AtomicU64::new(0),
            writer: tokio::sync::Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            clock: LivenessClock::new(),
            telemetry: Telemetry::default(),
            events,
            connected_once: AtomicBool::new(false),
            resetting: AtomicBool::new(false),
        };
        (Self { inner: Arc::new(inner) }, rx)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.inner.cfg
    }

    /// Overrides the configured port, e.g. with an autodetected one.
    pub fn set_port(&self, port: PortConfig) {
        *lock(&self.inner.port) = Some(port);
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn firmware_version(&self) -> Option<String> {
        self.inner.telemetry.version()
    }

    pub fn liveness(&self) -> &LivenessClock {
        &self.inner.clock
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state(),
            port: lock(&self.inner.port).as_ref().map(|p| p.dev.clone()),
            firmware: self.firmware_version(),
            since_read: self.inner.clock.since_read(),
            since_sent: self.inner.clock.since_sent(),
            sonar_cm: self.inner.telemetry.distance(),
        }
    }

    pub fn emit(&self, kind: EventKind) {
        // receiver gone means the application is shutting down
        let _ = self.inner.events.send(RovEvent::now(kind));
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch && self.is_connected()
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        self.inner.state.send_replace(state);
    }

    /// Opens the port, starts the reader and the watchdog for a new epoch.
    /// On the very first connect a version query follows after the setup delay.
    pub async fn connect(&self) -> Result<(), LinkError> {
        if self.state() != LinkState::Disconnected {
            debug!("connect ignored: link is {:?}", self.state());
            return Ok(());
        }
        let port = lock(&self.inner.port).clone().ok_or(LinkError::NoSerialDevice)?;
        self.set_state(LinkState::Connecting);

        let (reader, writer) = match self.inner.connector.open(&port) {
            Ok(halves) => halves,
            Err(e) => {
                error!("connect {}: {}", port.dev, e);
                self.set_state(LinkState::Disconnected);
                return Err(e);
            }
        };
        *self.inner.writer.lock().await = Some(writer);

        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.clock.mark_read();
        self.set_state(LinkState::Connected);
        info!("link up on {} (epoch {})", port.dev, epoch);

        lock(&self.inner.tasks).extend([
            tokio::spawn(read_loop(self.clone(), reader, epoch)),
            tokio::spawn(watchdog::run(self.clone(), epoch)),
        ]);

        // outlives the epoch so a reset during the setup delay keeps it
        if !self.inner.connected_once.swap(true, Ordering::AcqRel) {
            let link = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(link.inner.cfg.setup_delay()).await;
                if let Err(e) = link.send(Command::GetVersion).await {
                    warn!("initial version query: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Closes both stream halves and forgets the firmware version.
    pub async fn disconnect(&self) {
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        if let Some(mut w) = self.inner.writer.lock().await.take() {
            if let Err(e) = w.shutdown().await {
                debug!("writer shutdown: {}", e);
            }
        }
        self.set_state(LinkState::Disconnected);
        self.inner.telemetry.clear_version();
        info!("link down");
    }

    /// Disconnects and reconnects in the background. Ignored unless connected
    /// or while another reset is in flight.
    pub fn reset(&self) -> Option<JoinHandle<()>> {
        if !self.is_connected() {
            debug!("reset ignored: not connected");
            return None;
        }
        if self.inner.resetting.swap(true, Ordering::AcqRel) {
            debug!("reset already in progress");
            return None;
        }
        warn!("resetting link");
        let link = self.clone();
        Some(tokio::spawn(async move {
            link.disconnect().await;
            if let Err(e) = link.connect().await {
                error!("reconnect after reset failed: {}", e);
            }
            link.inner.resetting.store(false, Ordering::Release);
        }))
    }

    pub async fn set_echo(&self, on: bool) -> Result<(), LinkError> {
        self.send(Command::Echo(on)).await
    }

    pub async fn request_version(&self) -> Result<(), LinkError> {
        self.send(Command::GetVersion).await
    }

    pub async fn update_steering_comp(&self) -> Result<(), LinkError> {
        self.send(Command::SteeringComp(self.inner.cfg.steering_comp)).await
    }

    /// Sonar ping, only when a sonar is fitted.
    pub async fn poll_sensor(&self) -> Result<(), LinkError> {
        if !self.inner.cfg.sonar_enabled {
            return Ok(());
        }
        self.send(Command::SonarPing).await
    }
}

async fn read_loop(link: Link, mut reader: BoxReader, epoch: u64) {
    let mut parser = FrameParser::new(link.inner.cfg.frame_capacity);
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("serial input closed (epoch {})", epoch);
                return;
            }
            Ok(n) => {
                for ev in parser.push(&buf[..n]) {
                    match ev {
                        FrameEvent::Frame(frame) => link.handle_frame(&frame),
                        FrameEvent::Overflow => {
                            warn!("{}", LinkError::ProtocolDesync("frame overflow, dropped".into()))
                        }
                    }
                }
            }
            Err(e) => {
                error!("serial read: {}", e);
                if link.epoch() == epoch {
                    link.reset();
                }
                return;
            }
        }
    }
}
