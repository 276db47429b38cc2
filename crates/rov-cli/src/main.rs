use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use rov_drive::{doctor as drive_doctor, CameraConfig, DriveCommand, DriveConfig, Rov};
use rov_link::autodetect::{autodetect_board, default_candidate_devs, AutodetectResult};
use rov_link::mock::{simulated_firmware, LoopbackConnector};
use rov_link::{Link, LinkConfig, PortConfig, SerialConnector};
use rov_proto::{EventKind, RovEvent};

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "rov", version, about = "ROVlink - serial control console for a small tracked ROV")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file.
    Doctor,
    /// Drive the board on the configured serial port; commands are read from stdin.
    Run,
    /// Same console against a simulated board.
    Sim {
        #[arg(long, default_value = "sim-0.1")]
        firmware: String,
    },
    /// Probe candidate serial ports for a board answering version queries.
    Probe,
    /// Connect, wait for the firmware handshake and print the link status.
    Status,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    link: LinkConfig,
    drive: DriveConfig,
    camera: CameraConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(cfg).await?,
        Command::Sim { firmware } => sim(cfg, firmware).await?,
        Command::Probe => probe(&cfg.link).await?,
        Command::Status => status(cfg).await?,
    }
    Ok(())
}

/// Config checks shared by `doctor` and every command that opens the link.
fn validate(cfg: &Config) -> Result<()> {
    drive_doctor::check_link(&cfg.link)?;
    drive_doctor::check_drive(&cfg.drive)?;
    drive_doctor::check_camera(&cfg.camera)?;
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    validate(cfg)?;
    if cfg.link.autodetect {
        info!("doctor: board autodetect enabled (OK)");
    }
    info!("doctor: OK");
    Ok(())
}

async fn run_autodetect(link: &LinkConfig) -> Result<AutodetectResult> {
    let devs = link.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    autodetect_board(devs, link.baud, link.probe_timeout()).await
}

async fn resolve_port(link: &LinkConfig) -> Result<PortConfig> {
    if link.autodetect {
        let res = run_autodetect(link).await?;
        if let Some((dev, baud)) = res.chosen {
            return Ok(PortConfig { dev, baud });
        }
        anyhow::bail!("board autodetect failed: no version reply on any candidate");
    }
    link.port().context("link.serial_dev missing (autodetect=false)")
}

async fn probe(link: &LinkConfig) -> Result<()> {
    let res = run_autodetect(link).await?;
    if let Some((dev, baud)) = res.chosen {
        println!("CHOSEN: {} @ {}", dev, baud);
    } else {
        println!("CHOSEN: none");
    }
    for p in res.probes {
        println!("probe dev={} baud={} version={:?} {}ms note={}", p.dev, p.baud, p.version, p.elapsed_ms, p.note);
    }
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    info!("run: starting");
    validate(&cfg).context("invalid config (see `rov doctor`)")?;
    let port = resolve_port(&cfg.link).await?;
    let (link, events) = Link::new(cfg.link, Arc::new(SerialConnector));
    link.set_port(port);
    console(Rov::new(link, cfg.drive, cfg.camera), events).await
}

async fn sim(mut cfg: Config, firmware: String) -> Result<()> {
    info!("sim: starting with firmware {}", firmware);
    cfg.link.serial_dev.get_or_insert_with(|| "sim".to_string());
    validate(&cfg).context("invalid config (see `rov doctor`)")?;
    let (connector, mut devices) = LoopbackConnector::new();
    tokio::spawn(async move {
        // one simulated board per (re)connect
        while let Some(dev) = devices.recv().await {
            let version = firmware.clone();
            tokio::spawn(async move {
                if let Err(e) = simulated_firmware(dev, version).await {
                    warn!("simulated firmware stopped: {}", e);
                }
            });
        }
    });
    let (link, events) = Link::new(cfg.link, Arc::new(connector));
    console(Rov::new(link, cfg.drive, cfg.camera), events).await
}

async fn status(cfg: Config) -> Result<()> {
    validate(&cfg).context("invalid config (see `rov doctor`)")?;
    let port = resolve_port(&cfg.link).await?;
    let wait = cfg.link.setup_delay() + Duration::from_millis(500);
    let (link, _events) = Link::new(cfg.link, Arc::new(SerialConnector));
    link.set_port(port);
    link.connect().await.context("connect")?;
    tokio::time::sleep(wait).await;

    let st = link.status();
    println!("state={:?}", st.state);
    println!("port={:?}", st.port);
    println!("firmware={:?}", st.firmware);
    println!("since_read={:?} since_sent={:?}", st.since_read, st.since_sent);
    println!("sonar_cm={:?}", st.sonar_cm);
    link.disconnect().await;
    Ok(())
}

/// Reads operator commands line by line until EOF, ctrl-c or a dead link.
async fn console(rov: Rov, mut events: mpsc::UnboundedReceiver<RovEvent>) -> Result<()> {
    rov.start().await.context("connect")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    info!("console: stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<DriveCommand>() {
                    Ok(cmd) => {
                        if let Err(e) = rov.execute(cmd).await {
                            warn!("{:?}: {}", cmd, e);
                        }
                    }
                    Err(e) => warn!("{:#}", e),
                }
            }
            ev = events.recv() => {
                let Some(ev) = ev else { break };
                if !report(&ev) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("console: interrupted");
                break;
            }
        }
    }

    if rov.link.is_connected() {
        if let Err(e) = rov.motion.stop().await {
            warn!("final stop: {}", e);
        }
    }
    rov.link.disconnect().await;
    Ok(())
}

/// Logs one event; `false` once the link is declared dead.
fn report(ev: &RovEvent) -> bool {
    match &ev.kind {
        EventKind::VersionDiscovered { version } => info!("firmware version {}", version),
        EventKind::SonarDistance { cm } => info!("sonar {} cm", cm),
        EventKind::Feedback { text, since_read_ms, since_sent_ms } => {
            info!("board: {} (read +{}ms, sent +{}ms)", text, since_read_ms, since_sent_ms)
        }
        EventKind::MuteMic => info!("mic: mute"),
        EventKind::UnmuteMic => info!("mic: unmute"),
        EventKind::LinkDead { idle_ms } => {
            error!("link dead: no input for {}ms", idle_ms);
            return false;
        }
    }
    true
}
