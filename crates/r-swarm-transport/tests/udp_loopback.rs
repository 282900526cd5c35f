//! ---
//! swarm_section: "15-testing-qa-runbook"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "UDP interfaces exchanging packets over loopback."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use r_swarm_msg::mediator::next_subscriber_id;
use r_swarm_msg::{Event, EventType, KindId, Mediator, Subscriber, SubscriberId};
use r_swarm_rt::{ComponentRunner, ComponentSettings};
use r_swarm_schema::vehicle::default_state;
use r_swarm_schema::{Packet, VehicleState};
use r_swarm_transport::{Channel, Digestion, UdpInterface, UdpSettings};

struct Inbox {
    id: SubscriberId,
    events: Mutex<Vec<Event>>,
}

impl Inbox {
    fn attach(mediator: &Mediator, event_type: EventType) -> Arc<Self> {
        let inbox = Arc::new(Self {
            id: next_subscriber_id(),
            events: Mutex::new(Vec::new()),
        });
        mediator.subscribe(inbox.clone(), event_type);
        inbox
    }

    fn packets(&self) -> Vec<Packet> {
        self.events
            .lock()
            .iter()
            .map(|event| Packet::from_record(event.payload()).expect("packet"))
            .collect()
    }
}

impl Subscriber for Inbox {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn kind(&self) -> KindId {
        KindId::new("listener")
    }

    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn free_port() -> u16 {
    UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|socket| socket.local_addr())
        .map(|addr| addr.port())
        .expect("free port")
}

fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

fn interface(mediator: &Arc<Mediator>, settings: UdpSettings) -> ComponentRunner<UdpInterface> {
    let name = settings.name.clone();
    ComponentRunner::new(
        UdpInterface::new(settings),
        Arc::clone(mediator),
        ComponentSettings::named(name).with_interval(Some(Duration::from_millis(20))),
    )
    .expect("runner")
}

fn send_packet(mediator: &Mediator, descriptor: &str) {
    let mut state = default_state().expect("state");
    state.set("descriptor", descriptor).expect("descriptor");
    state.set("state", VehicleState::Flock).expect("state tag");
    let packet = Channel::Neighbour.pack(&state, "*").expect("pack");
    let event = Event::new(EventType::SendPacket, packet.to_record().expect("record")).expect("event");
    mediator.publish(event);
}

#[test]
fn point_to_point_delivers_between_interfaces() {
    let (port_a, port_b) = (free_port(), free_port());
    let settings = |port: u16, target: u16| UdpSettings {
        name: "udp".into(),
        digestion: Digestion::Bytes,
        bind_address: Ipv4Addr::LOCALHOST,
        target_address: Ipv4Addr::LOCALHOST,
        p2p: true,
        port,
        target_port: Some(target),
        ..UdpSettings::default()
    };

    let bus_a = Arc::new(Mediator::new());
    let bus_b = Arc::new(Mediator::new());
    let sent = Inbox::attach(&bus_a, EventType::PacketSent);
    let received = Inbox::attach(&bus_b, EventType::PacketReceived);
    let a = interface(&bus_a, settings(port_a, port_b));
    let b = interface(&bus_b, settings(port_b, port_a));
    a.activate().expect("activate a");
    b.activate().expect("activate b");

    send_packet(&bus_a, "alpha");
    assert!(wait_until(|| !received.packets().is_empty()));

    let packet = &received.packets()[0];
    assert_eq!(packet.channel, "neighbour");
    assert_eq!(packet.interface, "udp");
    assert_eq!(packet.payload.get_str("descriptor"), Some("alpha"));
    assert_eq!(packet.payload.state(), Some(VehicleState::Flock));

    assert!(wait_until(|| sent.packets().len() == 1));
    assert!(sent.packets()[0].wire.is_some());
    assert_eq!(a.with_component(|udp| udp.metrics().sent), 1);
    assert_eq!(b.with_component(|udp| udp.metrics().received), 1);

    a.shutdown();
    b.shutdown();
}

#[test]
fn packets_for_other_interfaces_are_skipped() {
    let port = free_port();
    let bus = Arc::new(Mediator::new());
    let sent = Inbox::attach(&bus, EventType::PacketSent);
    let udp = interface(
        &bus,
        UdpSettings {
            bind_address: Ipv4Addr::LOCALHOST,
            target_address: Ipv4Addr::LOCALHOST,
            p2p: true,
            port,
            ..UdpSettings::default()
        },
    );
    udp.activate().expect("activate");

    let state = default_state().expect("state");
    let packet = Channel::Command.pack(&state, "local-udp").expect("pack");
    bus.publish(Event::new(EventType::SendPacket, packet.to_record().expect("record")).expect("event"));
    assert!(wait_until(|| udp.status().processed >= 1));
    thread::sleep(Duration::from_millis(50));
    assert!(sent.packets().is_empty());
    assert_eq!(udp.with_component(|udp| udp.metrics().sent), 0);
    udp.shutdown();
}

#[test]
fn packets_that_cannot_be_digested_are_dropped_without_faults() {
    let port = free_port();
    let bus = Arc::new(Mediator::new());
    let sent = Inbox::attach(&bus, EventType::PacketSent);
    let udp = interface(
        &bus,
        UdpSettings {
            digestion: Digestion::Bytes,
            bind_address: Ipv4Addr::LOCALHOST,
            target_address: Ipv4Addr::LOCALHOST,
            p2p: true,
            port,
            ..UdpSettings::default()
        },
    );
    udp.activate().expect("activate");

    for _ in 0..15 {
        let packet = Packet::new(default_state().expect("state"), "carrier-pigeon", "*");
        let event = Event::new(EventType::SendPacket, packet.to_record().expect("record"))
            .expect("event");
        bus.publish(event);
    }
    assert!(wait_until(|| udp.with_component(|udp| udp.metrics().dropped) == 15));
    let status = udp.status();
    assert!(status.active);
    assert!(!status.forced_shutdown);
    assert_eq!(status.faults, 0);
    assert!(sent.packets().is_empty());

    send_packet(&bus, "still-up");
    assert!(wait_until(|| sent.packets().len() == 1));
    udp.shutdown();
}

#[test]
fn local_relay_forwards_without_echo() {
    let relay_port = free_port();
    let settings = || UdpSettings {
        relay_port,
        ..UdpSettings::local()
    };

    let bus_a = Arc::new(Mediator::new());
    let bus_b = Arc::new(Mediator::new());
    let echoed = Inbox::attach(&bus_a, EventType::PacketReceived);
    let received = Inbox::attach(&bus_b, EventType::PacketReceived);
    let a = interface(&bus_a, settings());
    let b = interface(&bus_b, settings());
    a.activate().expect("activate a");
    b.activate().expect("activate b");
    assert!(a.with_component(|udp| udp.is_relay_host()));
    assert!(!b.with_component(|udp| udp.is_relay_host()));
    thread::sleep(Duration::from_millis(50));

    send_packet(&bus_a, "relay");
    assert!(wait_until(|| received.packets().len() == 1));
    assert_eq!(received.packets()[0].payload.get_str("descriptor"), Some("relay"));
    assert_eq!(received.packets()[0].interface, "local-udp");

    thread::sleep(Duration::from_millis(100));
    assert!(echoed.packets().is_empty());

    b.shutdown();
    a.shutdown();
}
