//! UDP telemetry ingest over loopback.

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use zonefan::app::ports::SensorPort;
use zonefan::adapters::hwmon::HwmonCpuSensor;
use zonefan::adapters::sensors::SensorHub;
use zonefan::telemetry::{SharedTelemetry, TelemetryIngest, TelemetrySample};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

fn start() -> (TelemetryIngest, UdpSocket) {
    let shared = Arc::new(SharedTelemetry::new(Duration::from_secs(10)));
    let ingest = TelemetryIngest::start(
        "127.0.0.1:0".parse().unwrap(),
        RECV_TIMEOUT,
        shared,
    )
    .unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.connect(ingest.local_addr()).unwrap();
    (ingest, client)
}

fn wait_for(shared: &SharedTelemetry, pred: impl Fn(&TelemetrySample) -> bool) -> TelemetrySample {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let s = shared.snapshot();
        if pred(&s) || Instant::now() > deadline {
            return s;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn datagrams_update_shared_sample() {
    let (mut ingest, client) = start();
    client
        .send(br#"{"gpu0_temp": 72.5, "gpu1_temp": 61, "gpu0_fan": 44}"#)
        .unwrap();

    let s = wait_for(ingest.shared(), |s| s.gpu0_temp.is_some());
    assert_eq!(s.gpu0_temp, Some(72.5));
    assert_eq!(s.gpu1_temp, Some(61.0));
    assert_eq!(s.gpu0_fan, Some(44.0));
    assert!(!ingest.shared().get_temperatures().stale);

    ingest.stop();
    assert!(!ingest.is_running());
}

#[test]
fn garbage_does_not_stop_the_listener() {
    let (mut ingest, client) = start();
    client.send(b"\xff\xfe garbage").unwrap();
    client.send(b"[1, 2, 3]").unwrap();
    client.send(br#"{"gpu1_fan": 35}"#).unwrap();

    let s = wait_for(ingest.shared(), |s| s.gpu1_fan.is_some());
    assert_eq!(s.gpu1_fan, Some(35.0));
    assert!(s.gpu0_temp.is_none());
    assert!(ingest.is_running());
    ingest.stop();
}

#[test]
fn stop_is_bounded_by_receive_timeout() {
    let (mut ingest, _client) = start();
    let started = Instant::now();
    ingest.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!ingest.is_running());
}

#[test]
fn sensor_hub_exposes_shared_telemetry() {
    let (mut ingest, client) = start();
    client.send(br#"{"gpu0_temp": 66, "gpu1_fan": 50}"#).unwrap();
    wait_for(ingest.shared(), |s| s.gpu0_temp.is_some());

    let dir = tempfile::tempdir().unwrap();
    let mut hub = SensorHub::new(
        HwmonCpuSensor::discover(dir.path()),
        Arc::clone(ingest.shared()),
    );
    assert_eq!(hub.read_cpu_temp(), None);
    assert_eq!(hub.remote_temperatures().gpu0, Some(66.0));
    let duties = hub.remote_fan_duties();
    assert_eq!(duties.gpu1, Some(50.0));
    assert!(!duties.stale);
    ingest.stop();
}
