//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Assembles the configured modules around one mediator and drives their
//! lifecycle.
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{Registry, TextEncoder};
use r_swarm_common::AppConfig;
use r_swarm_logging::{log_lifecycle_event, swarm_info, swarm_warn, LifecycleOutcome, LogContext};
use r_swarm_msg::mediator::next_subscriber_id;
use r_swarm_msg::{
    command_event, replay_from_file, BusMetricsExporter, Event, EventType, KindId, Mediator,
    Subscriber, SubscriberId,
};
use r_swarm_rt::{ComponentControl, ComponentStatus};
use r_swarm_schema::vehicle::{command, state_at};
use r_swarm_schema::{CommandKind, Record, Vector3};
use tracing::info;

use crate::registry::{BuildContext, ComponentRegistry};
use crate::{CoreError, Result};

const TRACKED: [EventType; 2] = [EventType::DroneDataUpdate, EventType::MovementDataUpdate];

/// Keeps the vehicle-level view of the state current.
struct StateTracker {
    id: SubscriberId,
    state: Mutex<Record>,
}

impl StateTracker {
    const KIND: KindId = KindId::new("vehicle");
}

impl Subscriber for StateTracker {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn kind(&self) -> KindId {
        Self::KIND
    }

    fn notify(&self, event: Event) {
        if let Err(err) = self.state.lock().update_from(event.payload()) {
            swarm_warn!(
                context = LogContext::new()
                    .with_kind(Self::KIND.as_str())
                    .with_category("state"),
                "dropped {} update: {err}",
                event.event_type()
            );
        }
    }
}

/// Vehicle definition waiting to be started.
#[derive(Debug)]
pub struct Vehicle {
    config: Arc<AppConfig>,
    registry: ComponentRegistry,
    metrics: Option<Registry>,
}

impl Vehicle {
    /// Vehicle using the built-in component registry.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: ComponentRegistry::builtin(),
            metrics: None,
        }
    }

    /// Replace the registry used to resolve module ids.
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Export bus counters into `registry` instead of a private one.
    pub fn with_metrics(mut self, registry: Registry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Build every configured module, activate them in order, and announce
    /// the initial state.
    ///
    /// A module that fails to build or activate shuts down the ones started
    /// before it.
    pub fn start(self) -> Result<VehicleHandle> {
        let metrics = match (self.config.metrics.enabled, self.metrics) {
            (false, _) => None,
            (true, Some(registry)) => Some(registry),
            (true, None) => Some(Registry::new()),
        };
        let mediator = match &metrics {
            Some(registry) => Arc::new(Mediator::with_exporter(BusMetricsExporter::register(
                registry,
            )?)),
            None => Arc::new(Mediator::new()),
        };

        let vehicle = &self.config.vehicle;
        let initial = state_at(vehicle.id, &vehicle.descriptor, Vector3::from(vehicle.home))?;
        let tracker = Arc::new(StateTracker {
            id: next_subscriber_id(),
            state: Mutex::new(initial),
        });
        for event_type in TRACKED {
            mediator.subscribe(Arc::clone(&tracker) as Arc<dyn Subscriber>, event_type);
        }

        let mut handle = VehicleHandle {
            config: Arc::clone(&self.config),
            mediator: Arc::clone(&mediator),
            tracker,
            components: Vec::new(),
            metrics,
        };

        for id in self.config.modules.ids() {
            let config = self.config.component(id);
            let ctx = BuildContext {
                mediator: &mediator,
                vehicle,
                config: &config,
                id,
            };
            match self.registry.build(&ctx) {
                Ok(component) => handle.components.push(component),
                Err(err) => {
                    log_lifecycle_event(
                        Some(&LogContext::new().with_component(id)),
                        "vehicle.build_failed",
                        &err.to_string(),
                        LifecycleOutcome::Fault,
                    );
                    handle.stop_components();
                    return Err(err);
                }
            }
        }

        for index in 0..handle.components.len() {
            let component = &handle.components[index];
            if let Err(source) = component.activate() {
                let module = component.name().to_owned();
                handle.stop_components();
                return Err(CoreError::Startup { module, source });
            }
        }

        let state = handle.state();
        handle.publish(EventType::Initialization, state)?;
        info!(
            vehicle = vehicle.id,
            descriptor = %vehicle.descriptor,
            components = handle.components.len(),
            "vehicle started"
        );
        Ok(handle)
    }
}

/// Running vehicle.
pub struct VehicleHandle {
    config: Arc<AppConfig>,
    mediator: Arc<Mediator>,
    tracker: Arc<StateTracker>,
    components: Vec<Box<dyn ComponentControl>>,
    metrics: Option<Registry>,
}

impl VehicleHandle {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mediator(&self) -> &Arc<Mediator> {
        &self.mediator
    }

    /// Latest vehicle state seen on the bus.
    pub fn state(&self) -> Record {
        self.tracker.state.lock().clone()
    }

    /// Status of every component in start order.
    pub fn statuses(&self) -> Vec<ComponentStatus> {
        self.components.iter().map(|c| c.status()).collect()
    }

    /// Publish an externally sourced event.
    pub fn publish(&self, event_type: EventType, payload: Record) -> Result<()> {
        self.mediator.publish(Event::new(event_type, payload)?);
        Ok(())
    }

    /// Publish an operator command with its arguments.
    pub fn publish_command(&self, kind: CommandKind, args: Record) -> Result<()> {
        self.publish(command_event(kind), command(kind, args)?)
    }

    /// Feed a recorded event stream into the bus. Returns the number of
    /// events published.
    pub fn replay(&self, path: impl AsRef<Path>) -> Result<usize> {
        Ok(replay_from_file(&self.mediator, path)?)
    }

    /// Prometheus text exposition of the vehicle metrics, when enabled.
    pub fn metrics_text(&self) -> Option<String> {
        let registry = self.metrics.as_ref()?;
        let families = registry.gather();
        match TextEncoder::new().encode_to_string(&families) {
            Ok(text) => Some(text),
            Err(err) => {
                swarm_warn!("failed to encode metrics: {err}");
                None
            }
        }
    }

    fn stop_components(&mut self) {
        while let Some(component) = self.components.pop() {
            component.shutdown();
            log_lifecycle_event(
                Some(&LogContext::new()
                    .with_component(component.name())
                    .with_kind(component.kind().as_str())),
                "component.stopped",
                "shut down",
                LifecycleOutcome::Success,
            );
        }
    }

    /// Announce power down, then stop components in reverse start order.
    pub fn shutdown(mut self) -> Result<()> {
        let state = self.state();
        let announced = self.publish(EventType::PowerDown, state);
        self.stop_components();
        self.mediator.unsubscribe_all(self.tracker.id);
        swarm_info!("vehicle shutdown complete");
        announced
    }
}

impl std::fmt::Debug for VehicleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleHandle")
            .field("vehicle", &self.config.vehicle.id)
            .field(
                "components",
                &self.components.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
