//! End-to-end over real loopback sockets: agent pieces on one side,
//! monitor pieces on the other.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use sensor_bridge::agent::SamplingLoop;
use sensor_bridge::config::WatchdogConfig;
use sensor_bridge::connection::ConnectionState;
use sensor_bridge::consumers::LatestSnapshot;
use sensor_bridge::domain::{SensorReading, SensorType};
use sensor_bridge::hardware::{HardwareDevice, HardwareSampler, SampleError};
use sensor_bridge::heartbeat::{HeartbeatReceiver, HeartbeatSender, Liveness};
use sensor_bridge::ingress::{ConsumerIngress, DataListener};
use sensor_bridge::transmit::Transmitter;
use sensor_bridge::watchdog::Watchdog;

struct FanController {
    broken: bool,
    rpm: f64,
}

impl HardwareDevice for FanController {
    fn id(&self) -> &str {
        if self.broken { "/lpc/broken" } else { "/lpc/nct6798d/0" }
    }
    fn name(&self) -> &str {
        "Nuvoton NCT6798D"
    }
    fn kind(&self) -> &str {
        "SuperIO"
    }
    fn update(&mut self) -> Result<(), SampleError> {
        if self.broken {
            return Err(SampleError::Refresh("driver not loaded".to_string()));
        }
        self.rpm += 10.0;
        Ok(())
    }
    fn sensors(&self) -> Vec<SensorReading> {
        vec![SensorReading {
            id: format!("{}/fan/0", self.id()),
            name: "Fan #1".to_string(),
            kind: SensorType::Fan,
            value: Some(self.rpm),
        }]
    }
}

#[tokio::test]
async fn snapshots_flow_from_sampler_to_consumers() {
    let state = Arc::new(ConnectionState::new());
    let latest = Arc::new(LatestSnapshot::new());
    let ingress = Arc::new(ConsumerIngress::new(state.clone()).with_consumer(latest.clone()));
    let mut raw = ingress.subscribe_raw();

    let listener = DataListener::bind((Ipv4Addr::LOCALHOST, 0).into()).await.unwrap();
    let data_addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(ingress));

    let sampler = HardwareSampler::new(vec![
        Box::new(FanController { broken: true, rpm: 0.0 }),
        Box::new(FanController { broken: false, rpm: 1200.0 }),
    ]);
    let transmitter = Transmitter::bind(data_addr).await.unwrap();
    let sampling = tokio::spawn(SamplingLoop::new(sampler, transmitter, Duration::from_millis(50)).run());

    let text = tokio::time::timeout(Duration::from_secs(3), raw.recv())
        .await
        .expect("a snapshot should arrive")
        .unwrap();
    assert!(state.is_connected());

    // the failing node is present with its stale reading, the healthy one is unaffected
    let snapshot = latest.get().unwrap();
    let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["/lpc/broken", "/lpc/nct6798d/0"]);
    assert_eq!(latest.value_of("/lpc/broken", "/lpc/broken/fan/0"), Some(0.0));
    assert!(latest.value_of("/lpc/nct6798d/0", "/lpc/nct6798d/0/fan/0").unwrap() >= 1210.0);

    // subscribers of the raw event parse it on their own
    let reparsed = sensor_bridge::codec::decode(&text).unwrap();
    assert_eq!(reparsed.nodes.len(), 2);

    sampling.abort();
}

fn quick_watchdog() -> WatchdogConfig {
    WatchdogConfig { grace_period_secs: 1, liveness_timeout_secs: 1, check_interval_secs: 1 }
}

#[tokio::test]
async fn watchdog_holds_while_pinged_and_fires_when_pings_stop() {
    let liveness = Arc::new(Liveness::new());
    let receiver = HeartbeatReceiver::bind((Ipv4Addr::LOCALHOST, 0).into(), liveness.clone())
        .await
        .unwrap();
    let sender = HeartbeatSender::bind(receiver.local_addr().unwrap(), Duration::from_millis(200))
        .await
        .unwrap();
    tokio::spawn(receiver.run());
    let pings = tokio::spawn(sender.run());

    let watchdog = Watchdog::new(liveness, &quick_watchdog());
    let held = tokio::time::timeout(Duration::from_secs(4), watchdog.run()).await;
    assert!(held.is_err(), "watchdog fired while heartbeats were flowing");

    pings.abort();
    let expired = tokio::time::timeout(Duration::from_secs(6), watchdog.run())
        .await
        .expect("watchdog should fire once heartbeats stop");
    assert!(expired.silence > Duration::from_secs(1));
}

#[tokio::test]
async fn data_loss_alone_never_fires_watchdog() {
    let liveness = Arc::new(Liveness::new());
    let receiver = HeartbeatReceiver::bind((Ipv4Addr::LOCALHOST, 0).into(), liveness.clone())
        .await
        .unwrap();
    let sender = HeartbeatSender::bind(receiver.local_addr().unwrap(), Duration::from_millis(200))
        .await
        .unwrap();
    tokio::spawn(receiver.run());
    tokio::spawn(sender.run());

    // snapshots go nowhere: no listener on the data port
    let nowhere = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let sampler = HardwareSampler::new(vec![Box::new(FanController { broken: false, rpm: 0.0 })]);
    let transmitter = Transmitter::bind(nowhere).await.unwrap();
    tokio::spawn(SamplingLoop::new(sampler, transmitter, Duration::from_millis(50)).run());

    let watchdog = Watchdog::new(liveness, &quick_watchdog());
    assert!(tokio::time::timeout(Duration::from_secs(3), watchdog.run()).await.is_err());
}
