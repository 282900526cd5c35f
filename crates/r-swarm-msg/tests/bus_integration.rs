//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use prometheus::Registry;
use r_swarm_msg::mediator::next_subscriber_id;
use r_swarm_msg::{
    BusMetricsExporter, Event, EventType, KindId, Mediator, Subscriber, SubscriberId,
};
use r_swarm_schema::vehicle::command;
use r_swarm_schema::{CommandKind, Record, RecordKind};

struct Sink {
    id: SubscriberId,
    seen: Mutex<Vec<(i64, i64)>>,
}

impl Subscriber for Sink {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn kind(&self) -> KindId {
        KindId::new("sink")
    }

    fn notify(&self, event: Event) {
        let args = event.payload().get_record("msg").cloned().unwrap_or_else(Record::empty);
        let publisher = args.get_int("publisher").unwrap_or(-1);
        let seq = args.get_int("seq").unwrap_or(-1);
        self.seen.lock().push((publisher, seq));
    }
}

fn numbered(publisher: i64, seq: i64) -> Record {
    let args = Record::builder(RecordKind::Base)
        .field("publisher", publisher)
        .field("seq", seq)
        .build()
        .expect("args");
    command(CommandKind::PosHold, args).expect("command")
}

#[test]
fn concurrent_publishers_keep_per_publisher_order() {
    let mediator = Arc::new(Mediator::new());
    let sink = Arc::new(Sink {
        id: next_subscriber_id(),
        seen: Mutex::new(Vec::new()),
    });
    mediator.subscribe(sink.clone(), EventType::CommandPosHold);

    let handles: Vec<_> = (0..4)
        .map(|publisher| {
            let mediator = Arc::clone(&mediator);
            thread::spawn(move || {
                for seq in 0..50 {
                    let event = Event::new(EventType::CommandPosHold, numbered(publisher, seq))
                        .expect("event");
                    mediator.publish(event);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("publisher thread");
    }

    let seen = sink.seen.lock();
    assert_eq!(seen.len(), 200);
    for publisher in 0..4 {
        let order: Vec<i64> = seen
            .iter()
            .filter(|(p, _)| *p == publisher)
            .map(|(_, seq)| *seq)
            .collect();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn exporter_mirrors_mediator_counters() {
    let registry = Registry::new();
    let exporter = BusMetricsExporter::register(&registry).expect("register");
    let mediator = Mediator::with_exporter(exporter);
    let sink = Arc::new(Sink {
        id: next_subscriber_id(),
        seen: Mutex::new(Vec::new()),
    });
    mediator.subscribe(sink, EventType::CommandPosHold);
    mediator.publish(Event::new(EventType::CommandPosHold, numbered(0, 0)).expect("event"));
    mediator.publish(
        Event::derived(EventType::CommandPosHold, numbered(0, 1), KindId::new("sink"))
            .expect("event"),
    );
    mediator.record_fault();

    let value = |name: &str| {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| family.get_metric()[0].get_counter().get_value())
            .unwrap_or_default()
    };
    assert_eq!(value("bus_events_published_total"), 2.0);
    assert_eq!(value("bus_events_delivered_total"), 1.0);
    assert_eq!(value("bus_events_suppressed_total"), 1.0);
    assert_eq!(value("bus_handler_faults_total"), 1.0);
}
