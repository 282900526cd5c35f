//! ---
//! swarm_section: "15-testing-qa-runbook"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle startup, command handling, and shutdown."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use r_swarm_common::AppConfig;
use r_swarm_core::{ComponentRegistry, CoreError, Vehicle};
use r_swarm_schema::{CommandKind, Record, Vector3, VehicleState};

fn config(text: &str) -> AppConfig {
    text.parse().expect("config")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn start_command_lifts_the_vehicle_and_land_brings_it_back() {
    let handle = Vehicle::new(config(
        r#"
        [vehicle]
        id = 7
        descriptor = "scout"
        home = [1.0, 2.0, 0.0]

        [components.flightless]
        take-off-altitude = 8.0
        "#,
    ))
    .start()
    .expect("vehicle starts");

    let statuses = handle.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].active);
    assert_eq!(handle.state().state(), Some(VehicleState::Initialization));

    handle
        .publish_command(CommandKind::Start, Record::empty())
        .expect("start published");
    assert!(wait_until(|| handle.state().state() == Some(VehicleState::AtStart)));
    assert_eq!(handle.state().get_vector("position"), Some(Vector3::new(1.0, 2.0, 8.0)));

    handle
        .publish_command(CommandKind::Land, Record::empty())
        .expect("land published");
    assert!(wait_until(|| handle.state().state() == Some(VehicleState::Land)));
    assert_eq!(handle.state().get_vector("position"), Some(Vector3::new(1.0, 2.0, 0.0)));

    let metrics = handle.metrics_text().expect("metrics enabled by default");
    assert!(metrics.contains("bus_events_published_total"));

    handle.shutdown().expect("shutdown");
}

#[test]
fn replayed_commands_reach_the_backend() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"{{"event":"COMMAND_START","payload":{{"cmd":"START","msg":{{"@kind":"Record"}}}}}}"#
    )
    .expect("write");

    let handle = Vehicle::new(config("[metrics]\nenabled = false\n"))
        .start()
        .expect("vehicle starts");
    assert!(handle.metrics_text().is_none());
    assert_eq!(handle.replay(file.path()).expect("replay"), 1);
    assert!(wait_until(|| handle.state().state() == Some(VehicleState::AtStart)));
    handle.shutdown().expect("shutdown");
}

#[test]
fn unknown_modules_abort_startup() {
    let err = Vehicle::new(config(
        r#"
        [modules]
        controllers = ["autopilot-9000"]
        "#,
    ))
    .start()
    .expect_err("unknown module");
    assert!(matches!(err, CoreError::UnknownModule(id) if id == "autopilot-9000"));
}

#[test]
fn invalid_arguments_name_the_module() {
    let err = Vehicle::new(config(
        r#"
        [modules]
        communication = ["udp"]

        [components.udp]
        digestion = "ROT13"
        "#,
    ))
    .start()
    .expect_err("bad digestion");
    assert!(matches!(err, CoreError::ConfigurationInvalid { module, .. } if module == "udp"));
}

#[test]
fn empty_registry_knows_nothing() {
    let err = Vehicle::new(AppConfig::default())
        .with_registry(ComponentRegistry::empty())
        .start()
        .expect_err("flightless not registered");
    assert!(matches!(err, CoreError::UnknownModule(id) if id == "flightless"));
}
