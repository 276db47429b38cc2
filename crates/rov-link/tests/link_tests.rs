use std::sync::Arc;
use std::time::Duration;

use rov_link::mock::{Device, LoopbackConnector};
use rov_link::{Link, LinkConfig, LinkError, LinkState};
use rov_proto::{Command, EventKind, RovEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};

fn test_config() -> LinkConfig {
    LinkConfig { serial_dev: Some("loop0".into()), ..Default::default() }
}

struct Harness {
    link: Link,
    events: UnboundedReceiver<RovEvent>,
    devices: UnboundedReceiver<Device>,
    dev: Device,
}

async fn connected(cfg: LinkConfig) -> Harness {
    let (connector, mut devices) = LoopbackConnector::new();
    let (link, events) = Link::new(cfg, Arc::new(connector));
    link.connect().await.unwrap();
    let dev = devices.recv().await.unwrap();
    Harness { link, events, devices, dev }
}

/// Lets the reader task drain the pipe, then collects what it raised.
async fn settle(events: &mut UnboundedReceiver<RovEvent>) -> Vec<EventKind> {
    sleep(Duration::from_millis(10)).await;
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev.kind);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn send_before_connect_is_rejected() {
    let (connector, _devices) = LoopbackConnector::new();
    let (link, _events) = Link::new(test_config(), Arc::new(connector));
    assert!(matches!(link.send(Command::Stop).await, Err(LinkError::NotConnected)));
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn connect_without_device_fails() {
    let (connector, _devices) = LoopbackConnector::new();
    let (link, _events) = Link::new(LinkConfig::default(), Arc::new(connector));
    assert!(matches!(link.connect().await, Err(LinkError::NoSerialDevice)));
    assert_eq!(link.state(), LinkState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn forward_full_speed_hits_the_wire_in_one_piece() {
    let mut h = connected(test_config()).await;
    h.link.send(Command::Forward(255)).await.unwrap();
    assert_eq!(h.dev.next_raw().await.unwrap(), Some(vec![0x66, 0xFF, 0x0D]));
}

#[tokio::test(start_paused = true)]
async fn concurrent_sends_never_interleave() {
    let mut h = connected(test_config()).await;
    let mut joins = Vec::new();
    for speed in 0..50u8 {
        let link = h.link.clone();
        joins.push(tokio::spawn(async move { link.send(Command::Left(speed)).await }));
    }
    for j in joins {
        j.await.unwrap().unwrap();
    }
    let mut seen = Vec::new();
    for _ in 0..50 {
        match h.dev.next_command().await.unwrap() {
            Some(Command::Left(s)) => seen.push(s),
            other => panic!("unexpected {:?}", other),
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..50).collect::<Vec<u8>>());
}

#[tokio::test(start_paused = true)]
async fn version_is_reported_once_per_epoch() {
    let mut h = connected(test_config()).await;
    h.dev.send_frame("version:1.4").await.unwrap();
    h.dev.send_frame("version:1.4").await.unwrap();
    let evs = settle(&mut h.events).await;
    assert_eq!(evs, vec![EventKind::VersionDiscovered { version: "1.4".into() }]);
    assert_eq!(h.link.firmware_version().as_deref(), Some("1.4"));

    h.dev.send_frame("reset").await.unwrap();
    assert!(settle(&mut h.events).await.is_empty());
    assert_eq!(h.link.firmware_version(), None);

    h.dev.send_frame("version:1.5").await.unwrap();
    let evs = settle(&mut h.events).await;
    assert_eq!(evs, vec![EventKind::VersionDiscovered { version: "1.5".into() }]);
}

#[tokio::test(start_paused = true)]
async fn reset_notice_requeries_version_and_pushes_compensation() {
    let mut cfg = test_config();
    cfg.steering_comp = 140;
    let mut h = connected(cfg).await;
    h.dev.send_frame("reset").await.unwrap();
    assert_eq!(h.dev.next_command().await.unwrap(), Some(Command::GetVersion));
    assert_eq!(h.dev.next_command().await.unwrap(), Some(Command::SteeringComp(140)));
    assert_eq!(h.link.state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn sonar_noise_is_filtered() {
    let mut h = connected(test_config()).await;
    h.dev.send_frame("cm 40").await.unwrap();
    h.dev.send_frame("cm 41").await.unwrap();
    h.dev.send_frame("cm 42").await.unwrap();
    h.dev.send_frame("cm 45").await.unwrap();
    h.dev.send_frame("cm 45").await.unwrap();
    let evs = settle(&mut h.events).await;
    assert_eq!(
        evs,
        vec![
            EventKind::SonarDistance { cm: 40 },
            EventKind::SonarDistance { cm: 42 },
            EventKind::SonarDistance { cm: 45 },
        ]
    );
    assert_eq!(h.link.status().sonar_cm, Some(45));
}

#[tokio::test(start_paused = true)]
async fn garbled_distance_is_dropped() {
    let mut h = connected(test_config()).await;
    h.dev.send_frame("cm 40").await.unwrap();
    h.dev.send_frame("cm x9").await.unwrap();
    let evs = settle(&mut h.events).await;
    assert_eq!(evs, vec![EventKind::SonarDistance { cm: 40 }]);
    assert_eq!(h.link.status().sonar_cm, Some(40));
}

#[tokio::test(start_paused = true)]
async fn extreme_distance_does_not_stop_the_reader() {
    let mut h = connected(test_config()).await;
    h.dev.send_frame("cm 40").await.unwrap();
    h.dev.send_frame("cm -2147483648").await.unwrap();
    h.dev.send_frame("hello").await.unwrap();
    let evs = settle(&mut h.events).await;
    assert_eq!(evs.len(), 3, "{:?}", evs);
    assert_eq!(evs[0], EventKind::SonarDistance { cm: 40 });
    assert_eq!(evs[1], EventKind::SonarDistance { cm: i32::MIN });
    assert!(matches!(&evs[2], EventKind::Feedback { text, .. } if text == "hello"));
}

#[tokio::test(start_paused = true)]
async fn other_frames_become_feedback() {
    let mut h = connected(test_config()).await;
    sleep(Duration::from_millis(700)).await;
    h.dev.write_raw(b"motors armed\r\n").await.unwrap();
    let evs = settle(&mut h.events).await;
    match evs.as_slice() {
        [EventKind::Feedback { text, since_read_ms, .. }] => {
            assert_eq!(text, "motors armed");
            assert!(*since_read_ms >= 700);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn ping_echo_is_silent_and_not_counted_as_input() {
    let mut h = connected(test_config()).await;
    sleep(Duration::from_millis(1000)).await;
    h.dev.send_frame("y").await.unwrap();
    assert!(settle(&mut h.events).await.is_empty());
    assert!(h.link.liveness().since_read() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn oversized_frame_is_dropped_and_parsing_continues() {
    let mut h = connected(test_config()).await;
    h.dev.write_raw(b"<this frame is far longer than thirty-two bytes>").await.unwrap();
    h.dev.send_frame("cm 12").await.unwrap();
    assert_eq!(settle(&mut h.events).await, vec![EventKind::SonarDistance { cm: 12 }]);
}

#[tokio::test(start_paused = true)]
async fn watchdog_declares_link_dead_exactly_once() {
    let mut h = connected(test_config()).await;
    sleep(Duration::from_millis(29_900)).await;
    let evs = settle(&mut h.events).await;
    assert!(!evs.iter().any(|e| matches!(e, EventKind::LinkDead { .. })));

    sleep(Duration::from_secs(10)).await;
    let evs = settle(&mut h.events).await;
    let dead: Vec<_> = evs.iter().filter(|e| matches!(e, EventKind::LinkDead { .. })).collect();
    assert_eq!(dead.len(), 1);
    if let EventKind::LinkDead { idle_ms } = dead[0] {
        assert!(*idle_ms > 30_000);
    }

    sleep(Duration::from_secs(120)).await;
    assert!(settle(&mut h.events).await.is_empty());
    // no automatic reconnect
    assert!(h.devices.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn steady_input_keeps_the_link_alive() {
    let mut h = connected(test_config()).await;
    for i in 0..9 {
        sleep(Duration::from_secs(10)).await;
        h.dev.send_frame(&format!("cm {}", 100 + i * 5)).await.unwrap();
    }
    let evs = settle(&mut h.events).await;
    assert!(!evs.iter().any(|e| matches!(e, EventKind::LinkDead { .. })));
}

#[tokio::test(start_paused = true)]
async fn watchdog_polls_version_without_sonar() {
    let mut h = connected(test_config()).await;
    // first-connect query and the first keep-alive both land at the setup delay
    for _ in 0..3 {
        assert_eq!(h.dev.next_command().await.unwrap(), Some(Command::GetVersion));
    }
}

#[tokio::test(start_paused = true)]
async fn watchdog_polls_sonar_when_fitted() {
    let mut cfg = test_config();
    cfg.sonar_enabled = true;
    let mut h = connected(cfg).await;
    let mut pings = 0;
    let mut versions = 0;
    for _ in 0..3 {
        match h.dev.next_command().await.unwrap() {
            Some(Command::SonarPing) => pings += 1,
            Some(Command::GetVersion) => versions += 1,
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!((pings, versions), (2, 1));
}

#[tokio::test(start_paused = true)]
async fn write_failure_reports_and_schedules_reset() {
    let mut h = connected(test_config()).await;
    drop(h.dev);
    let res = h.link.send(Command::Left(100)).await;
    assert!(matches!(res, Err(LinkError::TransportFailure(_))));

    // reconnect opens the port again
    let _dev2 = h.devices.recv().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.link.state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_forgets_version_and_blocks_sends() {
    let mut h = connected(test_config()).await;
    h.dev.send_frame("version:2.0").await.unwrap();
    settle(&mut h.events).await;
    h.link.disconnect().await;
    assert_eq!(h.link.state(), LinkState::Disconnected);
    assert_eq!(h.link.firmware_version(), None);
    assert!(matches!(h.link.send(Command::Stop).await, Err(LinkError::NotConnected)));
    assert!(h.link.reset().is_none());
}

#[tokio::test(start_paused = true)]
async fn echo_and_sensor_helpers() {
    let mut cfg = test_config();
    cfg.sonar_enabled = true;
    let mut h = connected(cfg).await;
    h.link.set_echo(true).await.unwrap();
    h.link.poll_sensor().await.unwrap();
    assert_eq!(h.dev.next_command().await.unwrap(), Some(Command::Echo(true)));
    assert_eq!(h.dev.next_command().await.unwrap(), Some(Command::SonarPing));
}

#[tokio::test(start_paused = true)]
async fn early_reset_keeps_the_initial_version_query() {
    let mut h = connected(test_config()).await;
    let t0 = Instant::now();
    sleep(Duration::from_millis(100)).await;
    h.link.reset().unwrap().await.unwrap();
    let mut dev2 = h.devices.recv().await.unwrap();
    // the new epoch's watchdog would only poll at 2.1s
    assert_eq!(dev2.next_command().await.unwrap(), Some(Command::GetVersion));
    let at = t0.elapsed();
    assert!(at >= Duration::from_secs(2) && at < Duration::from_millis(2050), "{:?}", at);
}
