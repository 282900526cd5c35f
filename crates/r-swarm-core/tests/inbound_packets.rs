//! ---
//! swarm_section: "15-testing-qa-runbook"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Malformed packets from the network do not count as component faults."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use r_swarm_core::{ChannelSettings, CommandChannelController, NeighbourChannelController};
use r_swarm_msg::{Event, EventType, Mediator, ProcessingMode};
use r_swarm_rt::{ComponentRunner, ComponentSettings};
use r_swarm_schema::vehicle::{command, state_at};
use r_swarm_schema::{CommandKind, Packet, Record, Vector3};
use r_swarm_transport::Channel;

fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn received(packet: Packet) -> Event {
    Event::new(EventType::PacketReceived, packet.to_record().expect("packet record"))
        .expect("event")
}

#[test]
fn command_packets_without_a_command_are_dropped() {
    let mediator = Arc::new(Mediator::new());
    let runner = ComponentRunner::new(
        CommandChannelController::new(ChannelSettings::default()),
        Arc::clone(&mediator),
        ComponentSettings::named("command-channel").with_mode(ProcessingMode::DrainAll),
    )
    .expect("runner");
    runner.activate().expect("activate");

    for _ in 0..15 {
        mediator.publish(received(Packet::new(Record::empty(), "command", "udp")));
    }
    assert!(wait_until(|| runner.with_component(|c| c.rejected()) == 15));
    let status = runner.status();
    assert!(status.active);
    assert!(!status.forced_shutdown);
    assert_eq!(status.faults, 0);

    let published = mediator.metrics().published;
    let land = command(CommandKind::Land, Record::empty()).expect("command");
    mediator.publish(received(Channel::Command.pack(&land, "udp").expect("pack")));
    assert!(wait_until(|| mediator.metrics().published == published + 2));
    assert!(runner.status().active);

    runner.shutdown();
}

#[test]
fn neighbour_packets_from_the_bus_reach_the_controller() {
    let mediator = Arc::new(Mediator::new());
    let state = state_at(1, "scout", Vector3::default()).expect("state");
    let runner = ComponentRunner::new(
        NeighbourChannelController::new(state, ChannelSettings::default()),
        Arc::clone(&mediator),
        ComponentSettings::named("neighbour-channel").with_mode(ProcessingMode::DrainAll),
    )
    .expect("runner");
    runner.activate().expect("activate");

    let peer = state_at(9, "relay", Vector3::new(3.0, 0.0, 0.0)).expect("peer");
    mediator.publish(received(Channel::Neighbour.pack(&peer, "udp").expect("pack")));
    assert!(wait_until(|| runner.with_component(|c| c.neighbours().contains_key("9"))));
    assert!(runner.status().active);
    assert_eq!(runner.status().faults, 0);

    runner.shutdown();
}
