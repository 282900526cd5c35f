//! ---
//! swarm_section: "15-testing-qa-runbook"
//! swarm_subsection: "integration-tests"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "End-to-end vehicle scenarios across the R-Swarm stack."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use r_swarm_common::AppConfig;
use r_swarm_core::{CoreError, Vehicle};
use r_swarm_msg::mediator::next_subscriber_id;
use r_swarm_msg::{Event, EventType, KindId, Subscriber, SubscriberId};
use r_swarm_schema::vehicle::battery;
use r_swarm_schema::{
    CommandKind, Packet, Record, RecordBuilder, RecordKind, Vector3, VehicleState,
};
use r_swarm_transport::{Channel, Digestion};

/// Captures the packets controllers hand to the interfaces.
struct OutboundTap {
    id: SubscriberId,
    packets: Mutex<Vec<Packet>>,
}

impl OutboundTap {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: next_subscriber_id(),
            packets: Mutex::new(Vec::new()),
        })
    }

    fn find(&self, predicate: impl Fn(&Packet) -> bool) -> Option<Packet> {
        self.packets.lock().iter().find(|p| predicate(p)).cloned()
    }
}

impl Subscriber for OutboundTap {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn kind(&self) -> KindId {
        KindId::new("outbound-tap")
    }

    fn notify(&self, event: Event) {
        if let Ok(packet) = Packet::from_record(event.payload()) {
            self.packets.lock().push(packet);
        }
    }
}

fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Some(found) = check() {
            return Some(found);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn ground_station_vehicle() -> AppConfig {
    r#"
    [vehicle]
    id = 3
    descriptor = "survey"
    home = [10.0, -4.0, 1.5]

    [modules]
    evaluators = ["sensor-evaluator"]
    channels = ["ground-station-channel"]

    [components.ground-station-channel]
    interval = 0.02
    comm-interface = "udp"

    [metrics]
    enabled = false
    "#
    .parse()
    .expect("scenario config")
}

#[test]
fn take_off_reaches_the_ground_station_over_the_binary_wire() {
    let handle = Vehicle::new(ground_station_vehicle())
        .start()
        .expect("vehicle starts");
    let tap = OutboundTap::new();
    handle
        .mediator()
        .subscribe(Arc::clone(&tap) as Arc<dyn Subscriber>, EventType::SendPacket);

    let args = Record::builder(RecordKind::Base)
        .field("takeOffAltitude", 5.0)
        .field("speed", 5)
        .build()
        .expect("take-off arguments");
    handle
        .publish_command(CommandKind::Start, args)
        .expect("start published");

    let packet = eventually(|| {
        tap.find(|packet| packet.payload.state() == Some(VehicleState::AtStart))
    })
    .expect("ground-station packet with the new state");
    assert_eq!(packet.channel, Channel::GroundStation.name());
    assert_eq!(packet.interface, "udp");
    assert_eq!(
        packet.payload.get_vector("position"),
        Some(Vector3::new(10.0, -4.0, 6.5))
    );
    assert!(packet.payload.get("descriptor").is_none());

    let wire = Digestion::Bytes.digest(&packet).expect("digest");
    let received = Digestion::Bytes.undigest(&wire, "udp0").expect("undigest");
    assert_eq!(received.channel, "ground-station");
    assert_eq!(received.interface, "udp0");
    assert_eq!(received.payload.state(), Some(VehicleState::AtStart));
    assert_eq!(received.payload.get_vector("position"), packet.payload.get_vector("position"));
    assert_eq!(received.wire.as_deref(), Some(wire.as_slice()));

    handle.shutdown().expect("shutdown");
}

fn sensor_reading(sensor: &str, timestamp: f64) -> RecordBuilder {
    Record::builder(RecordKind::Sensor)
        .field("sensor", sensor)
        .field("timestamp", timestamp)
}

#[test]
fn sensor_readings_accumulate_in_the_vehicle_state() {
    let handle = Vehicle::new(ground_station_vehicle())
        .start()
        .expect("vehicle starts");

    let fix = sensor_reading("gps", 100.0)
        .field("coords", Vector3::new(48.13, 11.57, 519.0))
        .field("alt", 519.0)
        .field("h_acc", 0.5)
        .field("v_acc", 0.8)
        .field("h_dil", 1.2)
        .field("v_dil", 1.4)
        .build()
        .expect("gps fix");
    let velocity = sensor_reading("velocity", 100.5)
        .field("vel", Vector3::new(0.0, 2.5, 0.0))
        .build()
        .expect("velocity reading");
    let monitor = sensor_reading("battery", 101.0)
        .field("battery", battery(64, 11.8, 3.2).expect("battery"))
        .build()
        .expect("battery reading");
    for reading in [fix, velocity, monitor] {
        handle
            .publish(EventType::MiscSensorData, reading)
            .expect("reading published");
    }

    let state = eventually(|| {
        let state = handle.state();
        let level = state.get_record("battery").and_then(|b| b.get_int("level"));
        (level == Some(64)).then_some(state)
    })
    .expect("battery reading reached the state");
    assert_eq!(
        state.get_vector("coordinates"),
        Some(Vector3::new(48.13, 11.57, 519.0))
    );
    assert_eq!(state.get_vector("velocity"), Some(Vector3::new(0.0, 2.5, 0.0)));
    assert_eq!(state.state(), Some(VehicleState::Initialization));
    handle.shutdown().expect("shutdown");
}

#[test]
fn configuration_files_drive_startup_failures() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("r-swarm.toml");
    std::fs::write(
        &path,
        r#"
        [modules]
        channels = ["ground-station-channel", "carrier-pigeon"]
        "#,
    )
    .expect("write config");

    let config = AppConfig::from_path(&path).expect("structurally valid");
    let err = Vehicle::new(config).start().expect_err("unknown module");
    assert!(matches!(err, CoreError::UnknownModule(id) if id == "carrier-pigeon"));
}
