//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Maps configured module ids to component factories.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use r_swarm_common::{ComponentConfig, VehicleConfig};
use r_swarm_msg::Mediator;
use r_swarm_rt::{Component, ComponentControl, ComponentRunner, ComponentSettings, ThreadPriority};
use r_swarm_schema::vehicle::state_at;
use r_swarm_schema::{Record, Vector3};
use r_swarm_transport::{Channel, UdpInterface, UdpSettings};
use serde::de::DeserializeOwned;

use crate::channels::{
    ChannelController, ChannelSettings, CommandChannelController, NeighbourChannelController,
};
use crate::evaluator::SensorEvaluator;
use crate::flight::{FlightSettings, Flightless};
use crate::{CoreError, Result};

/// Everything a factory may draw on while building one module.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub mediator: &'a Arc<Mediator>,
    pub vehicle: &'a VehicleConfig,
    pub config: &'a ComponentConfig,
    pub id: &'a str,
}

impl BuildContext<'_> {
    /// Decode the free-form `[components.<id>]` arguments into `T`.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T> {
        toml::Value::Table(self.config.args.clone())
            .try_into::<T>()
            .map_err(|err| CoreError::ConfigurationInvalid {
                module: self.id.to_owned(),
                reason: err.to_string(),
            })
    }

    /// Initial vehicle state derived from the vehicle section.
    pub fn initial_state(&self) -> Result<Record> {
        Ok(state_at(
            self.vehicle.id,
            &self.vehicle.descriptor,
            Vector3::from(self.vehicle.home),
        )?)
    }

    /// Runtime settings for this module on top of `defaults`.
    pub fn settings(&self, defaults: ComponentSettings) -> ComponentSettings {
        self.config.apply(defaults)
    }

    /// Wrap `component` in a runner named after the module id.
    pub fn spawn<C: Component>(&self, component: C) -> Result<Box<dyn ComponentControl>> {
        self.spawn_with(component, ComponentSettings::named(self.id))
    }

    fn spawn_with<C: Component>(
        &self,
        component: C,
        defaults: ComponentSettings,
    ) -> Result<Box<dyn ComponentControl>> {
        let runner =
            ComponentRunner::new(component, Arc::clone(self.mediator), self.settings(defaults))?;
        Ok(Box::new(runner))
    }
}

/// Builds a ready, not yet activated, component for one module id.
pub type Factory = fn(&BuildContext<'_>) -> Result<Box<dyn ComponentControl>>;

/// Ordered table of module factories.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: IndexMap<&'static str, Factory>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl ComponentRegistry {
    /// Registry without any factories.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every component shipped in this workspace.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("flightless", build_flightless);
        registry.register("sensor-evaluator", build_sensor_evaluator);
        registry.register("command-channel", build_command_channel);
        registry.register("neighbour-channel", build_neighbour_channel);
        registry.register("ground-station-channel", build_ground_station_channel);
        registry.register("drone-channel", build_drone_channel);
        registry.register("digital-twin-channel", build_digital_twin_channel);
        registry.register("udp", build_udp);
        registry.register("local-udp", build_local_udp);
        registry
    }

    /// Add or replace the factory for `id`.
    pub fn register(&mut self, id: &'static str, factory: Factory) -> &mut Self {
        self.factories.insert(id, factory);
        self
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Build the module named by `ctx.id`.
    pub fn build(&self, ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
        let factory = self
            .factories
            .get(ctx.id)
            .ok_or_else(|| CoreError::UnknownModule(ctx.id.to_owned()))?;
        factory(ctx)
    }
}

fn build_flightless(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    let settings: FlightSettings = ctx.args()?;
    let backend = Flightless::new(ctx.initial_state()?, settings);
    ctx.spawn_with(
        backend,
        ComponentSettings::named(ctx.id).with_priority(ThreadPriority::High),
    )
}

fn build_sensor_evaluator(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    ctx.spawn(SensorEvaluator::new())
}

fn build_command_channel(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    let settings: ChannelSettings = ctx.args()?;
    ctx.spawn(CommandChannelController::new(settings))
}

fn build_neighbour_channel(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    let settings: ChannelSettings = ctx.args()?;
    ctx.spawn(NeighbourChannelController::new(ctx.initial_state()?, settings))
}

fn build_state_channel(
    ctx: &BuildContext<'_>,
    channel: Channel,
) -> Result<Box<dyn ComponentControl>> {
    let settings: ChannelSettings = ctx.args()?;
    ctx.spawn(ChannelController::new(channel, ctx.initial_state()?, settings))
}

fn build_ground_station_channel(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    build_state_channel(ctx, Channel::GroundStation)
}

fn build_drone_channel(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    build_state_channel(ctx, Channel::DroneToDrone)
}

fn build_digital_twin_channel(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    build_state_channel(ctx, Channel::DigitalTwin)
}

fn build_udp(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    let settings: UdpSettings = ctx.args()?;
    ctx.spawn(UdpInterface::new(settings))
}

fn build_local_udp(ctx: &BuildContext<'_>) -> Result<Box<dyn ComponentControl>> {
    let mut settings: UdpSettings = ctx.args()?;
    settings.local = true;
    if !ctx.config.args.contains_key("name") {
        settings.name = UdpSettings::local().name;
    }
    ctx.spawn(UdpInterface::new(settings))
}
