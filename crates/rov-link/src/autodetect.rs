use anyhow::{Context, Result};
use rov_proto::{Command, FrameEvent, FrameParser, Response};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub version: Option<String>,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
        "/dev/serial0".into(),
        "/dev/ttyS0".into(),
    ]
}

/// Tries each candidate in turn and picks the first that answers a version
/// query. The board may reset when the port opens, so the query is repeated
/// until the timeout runs out.
pub async fn autodetect_board(candidate_devs: Vec<String>, baud: u32, reply_timeout: Duration) -> Result<AutodetectResult> {
    let mut probes = Vec::new();

    for dev in candidate_devs {
        let start = Instant::now();
        let (version, note) = match probe(&dev, baud, reply_timeout).await {
            Ok(Some(v)) => (Some(v), "version reply".to_string()),
            Ok(None) => (None, "no version reply".to_string()),
            Err(e) => {
                warn!("board autodetect probe failed dev={} err={:#}", dev, e);
                (None, format!("open/probe failed: {:#}", e))
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let found = version.is_some();
        probes.push(ProbeResult { dev: dev.clone(), baud, version, elapsed_ms, note });
        if found {
            info!("board autodetect: OK {} @ {}", dev, baud);
            return Ok(AutodetectResult { chosen: Some((dev, baud)), probes });
        }
    }

    Ok(AutodetectResult { chosen: None, probes })
}

async fn probe(dev: &str, baud: u32, reply_timeout: Duration) -> Result<Option<String>> {
    let mut port = tokio_serial::new(dev, baud)
        .open_native_async()
        .with_context(|| format!("open serial device {}", dev))?;
    let query = Command::GetVersion.encode();
    let mut parser = FrameParser::default();
    let mut buf = [0u8; 64];
    let deadline = tokio::time::Instant::now() + reply_timeout;

    loop {
        port.write_all(&query).await.context("write version query")?;
        let tick = tokio::time::Instant::now() + Duration::from_millis(250);
        match tokio::time::timeout_at(tick.min(deadline), port.read(&mut buf)).await {
            Ok(Ok(0)) => return Ok(None),
            Ok(Ok(n)) => {
                for ev in parser.push(&buf[..n]) {
                    if let FrameEvent::Frame(f) = ev {
                        if let Response::Version(v) = Response::classify(&f) {
                            return Ok(Some(v.to_string()));
                        }
                    }
                }
            }
            Ok(Err(e)) => return Err(e).context("read probe reply"),
            Err(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
    }
}
