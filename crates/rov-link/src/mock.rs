//! In-memory transport for tests and for `rov sim`.
//!
//! Each `open` creates a fresh duplex pipe. The link keeps the host end; the
//! device end is handed out through the receiver returned by
//! [`LoopbackConnector::new`], so a test can play the board.

use std::io;

use rov_proto::command::{BACKWARD, CAMERA_MOVE, ECHO, FORWARD, LEFT, RIGHT, STEERING_COMP};
use rov_proto::{Command, TERMINATOR};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::transport::{BoxReader, BoxWriter, Connector, PortConfig};
use crate::LinkError;

const PIPE_CAPACITY: usize = 4096;

pub struct LoopbackConnector {
    devices: mpsc::UnboundedSender<Device>,
}

impl LoopbackConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Device>) {
        let (devices, rx) = mpsc::unbounded_channel();
        (Self { devices }, rx)
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, port: &PortConfig) -> Result<(BoxReader, BoxWriter), LinkError> {
        let (host, device) = tokio::io::duplex(PIPE_CAPACITY);
        let (rx, tx) = tokio::io::split(device);
        self.devices
            .send(Device { rx, tx })
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "no device side listening"))?;
        debug!("loopback open {}", port.dev);
        let (r, w) = tokio::io::split(host);
        Ok((Box::new(r), Box::new(w)))
    }
}

/// Board side of a loopback pipe.
pub struct Device {
    rx: ReadHalf<DuplexStream>,
    tx: WriteHalf<DuplexStream>,
}

fn takes_arg(op: u8) -> bool {
    matches!(op, FORWARD | BACKWARD | LEFT | RIGHT | STEERING_COMP | CAMERA_MOVE | ECHO)
}

impl Device {
    /// Sends `<text>`.
    pub async fn send_frame(&mut self, text: &str) -> io::Result<()> {
        self.write_raw(format!("<{}>", text).as_bytes()).await
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.tx.write_all(bytes).await?;
        self.tx.flush().await
    }

    /// Reads one raw command including its terminator. `None` once the host
    /// closed the pipe.
    pub async fn next_raw(&mut self) -> io::Result<Option<Vec<u8>>> {
        let op = match self.rx.read_u8().await {
            Ok(op) => op,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut raw = vec![op];
        if takes_arg(op) {
            raw.push(self.rx.read_u8().await?);
        }
        raw.push(self.rx.read_u8().await?);
        Ok(Some(raw))
    }

    pub async fn next_command(&mut self) -> io::Result<Option<Command>> {
        let Some(raw) = self.next_raw().await? else { return Ok(None) };
        match raw.split_last() {
            Some((&TERMINATOR, body)) => Command::decode(body)
                .map(Some)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad command {:?}", raw))),
            _ => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unterminated command {:?}", raw))),
        }
    }
}

/// Plays a drive board: announces a reset, answers version queries and sonar
/// pings, and echoes commands when echo is switched on.
pub async fn simulated_firmware(mut dev: Device, version: String) -> io::Result<()> {
    dev.send_frame("reset").await?;
    let mut echo = false;
    let mut pings: i32 = 0;
    while let Some(cmd) = dev.next_command().await? {
        if echo {
            let text = match cmd.arg() {
                Some(a) => format!("{} {}", cmd.opcode() as char, a),
                None => (cmd.opcode() as char).to_string(),
            };
            dev.send_frame(&text).await?;
        }
        match cmd {
            Command::GetVersion => dev.send_frame(&format!("version:{}", version)).await?,
            Command::SonarPing => {
                pings += 1;
                dev.send_frame(&format!("cm {}", 80 + (pings * 7) % 40)).await?;
            }
            Command::Echo(on) => echo = on,
            _ => {}
        }
    }
    info!("simulated firmware: host closed the port");
    Ok(())
}
