//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Event routing between components.
//!
//! Publishing appends to the mediator queue and then drains it under a
//! dispatch lock, so concurrent publishers still produce one global order and
//! every subscriber sees events in publish order. Dispatch runs on the
//! publishing thread; the only hand-off to another thread is the subscriber's
//! own queue.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::event::{Event, KindId, Origin};
use crate::event_type::EventType;
use crate::logging::{log_event, BusMetricsExporter, EventDirection};

/// Process-unique subscriber identity.
pub type SubscriberId = u64;

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// Receiver of routed events.
pub trait Subscriber: Send + Sync {
    /// Identity used for unsubscription.
    fn subscriber_id(&self) -> SubscriberId;

    /// Component kind; events derived by the same kind are not delivered.
    fn kind(&self) -> KindId;

    /// Queue an event and wake the subscriber. Must not block on the mediator.
    fn notify(&self, event: Event);
}

/// Allocate a fresh subscriber id.
pub fn next_subscriber_id() -> SubscriberId {
    NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed)
}

/// Snapshot of mediator counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusMetrics {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Deliveries to subscriber queues.
    pub delivered: u64,
    /// Deliveries skipped by the loop guard.
    pub suppressed: u64,
    /// Handler and hook faults reported by component runtimes.
    pub faults: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    suppressed: AtomicU64,
    faults: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BusMetrics {
        BusMetrics {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Routes events to the subscribers registered per event type.
#[derive(Default)]
pub struct Mediator {
    routes: RwLock<HashMap<EventType, Vec<Arc<dyn Subscriber>>>>,
    queue: Mutex<VecDeque<Event>>,
    dispatch: Mutex<()>,
    counters: Counters,
    exporter: Option<BusMetricsExporter>,
}

impl Mediator {
    /// Mediator without metrics export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mediator mirroring its counters into Prometheus.
    pub fn with_exporter(exporter: BusMetricsExporter) -> Self {
        Self {
            exporter: Some(exporter),
            ..Self::default()
        }
    }

    /// Subscribe to an event type. Repeated subscriptions are ignored.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>, event_type: EventType) {
        let mut routes = self.routes.write();
        let list = routes.entry(event_type).or_default();
        let id = subscriber.subscriber_id();
        if !list.iter().any(|existing| existing.subscriber_id() == id) {
            list.push(subscriber);
        }
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriberId, event_type: EventType) {
        if let Some(list) = self.routes.write().get_mut(&event_type) {
            list.retain(|existing| existing.subscriber_id() != id);
        }
    }

    /// Remove every subscription held by `id`.
    pub fn unsubscribe_all(&self, id: SubscriberId) {
        for list in self.routes.write().values_mut() {
            list.retain(|existing| existing.subscriber_id() != id);
        }
    }

    /// Number of subscribers for an event type.
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.routes
            .read()
            .get(&event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Queue an event and dispatch everything pending.
    pub fn publish(&self, event: Event) {
        log_event(EventDirection::Published, &event, None);
        self.count(EventDirection::Published);
        self.queue.lock().push_back(event);
        self.drain();
    }

    /// Record a handler or hook fault reported by a component runtime.
    pub fn record_fault(&self) {
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = &self.exporter {
            exporter.observe_fault();
        }
    }

    /// Current counter values.
    pub fn metrics(&self) -> BusMetrics {
        self.counters.snapshot()
    }

    fn drain(&self) {
        let _dispatching = self.dispatch.lock();
        loop {
            let Some(event) = self.queue.lock().pop_front() else {
                break;
            };
            self.dispatch_one(&event);
        }
    }

    fn dispatch_one(&self, event: &Event) {
        let subscribers = match self.routes.read().get(&event.event_type()) {
            Some(list) => list.clone(),
            None => return,
        };
        for subscriber in subscribers {
            if event.origin() == Origin::Component(subscriber.kind()) {
                log_event(EventDirection::Suppressed, event, Some(subscriber.kind().as_str()));
                self.count(EventDirection::Suppressed);
                continue;
            }
            log_event(EventDirection::Delivered, event, Some(subscriber.kind().as_str()));
            self.count(EventDirection::Delivered);
            subscriber.notify(event.clone());
        }
    }

    fn count(&self, direction: EventDirection) {
        let counter = match direction {
            EventDirection::Published => &self.counters.published,
            EventDirection::Delivered => &self.counters.delivered,
            EventDirection::Suppressed => &self.counters.suppressed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(exporter) = &self.exporter {
            exporter.observe(direction);
        }
    }
}
