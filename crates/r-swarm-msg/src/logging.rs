//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};
use tracing::trace;

use crate::event::Event;

/// Step of the routing path, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    /// Event entered the mediator queue.
    Published,
    /// Event pushed to a subscriber.
    Delivered,
    /// Event withheld from the component kind that derived it.
    Suppressed,
}

/// Emit a structured log entry for bus activity.
pub fn log_event(direction: EventDirection, event: &Event, subscriber: Option<&str>) {
    trace!(
        event = event.event_type().name(),
        payload = event.payload().kind().name(),
        origin = %event.origin(),
        subscriber,
        direction = ?direction,
        "bus activity"
    );
}

/// Prometheus metric handles for mediator activity.
#[derive(Clone)]
pub struct BusMetricsExporter {
    published: IntCounter,
    delivered: IntCounter,
    suppressed: IntCounter,
    faults: IntCounter,
}

impl BusMetricsExporter {
    /// Register bus metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let published = IntCounter::with_opts(Opts::new(
            "bus_events_published_total",
            "Events accepted by the mediator",
        ))?;
        let delivered = IntCounter::with_opts(Opts::new(
            "bus_events_delivered_total",
            "Events pushed to subscriber queues",
        ))?;
        let suppressed = IntCounter::with_opts(Opts::new(
            "bus_events_suppressed_total",
            "Events withheld from the component kind that derived them",
        ))?;
        let faults = IntCounter::with_opts(Opts::new(
            "bus_handler_faults_total",
            "Handler and hook faults caught by component runtimes",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(suppressed.clone()))?;
        registry.register(Box::new(faults.clone()))?;

        Ok(Self {
            published,
            delivered,
            suppressed,
            faults,
        })
    }

    pub(crate) fn observe(&self, direction: EventDirection) {
        match direction {
            EventDirection::Published => self.published.inc(),
            EventDirection::Delivered => self.delivered.inc(),
            EventDirection::Suppressed => self.suppressed.inc(),
        }
    }

    pub(crate) fn observe_fault(&self) {
        self.faults.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_exporter_records_counts() {
        let registry = Registry::new();
        let metrics = BusMetricsExporter::register(&registry).expect("register metrics");
        metrics.observe(EventDirection::Published);
        metrics.observe(EventDirection::Delivered);
        metrics.observe_fault();

        let families = registry.gather();
        let published = families
            .iter()
            .find(|f| f.get_name() == "bus_events_published_total")
            .expect("published family");
        assert_eq!(published.get_metric()[0].get_counter().get_value(), 1.0);
        assert!(families
            .iter()
            .any(|f| f.get_name() == "bus_handler_faults_total"));
    }
}
