//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Vehicle runtime, component registry, and the reference components that
//! turn the bus into a working vehicle.

pub mod channels;
pub mod evaluator;
pub mod flight;
pub mod registry;
pub mod vehicle;

use r_swarm_msg::BusError;
use r_swarm_rt::RuntimeError;
use r_swarm_schema::RecordError;

/// Result alias for vehicle wiring.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Startup and wiring failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("invalid configuration for {module}: {reason}")]
    ConfigurationInvalid { module: String, reason: String },
    #[error("component {module} failed to start: {source}")]
    Startup {
        module: String,
        #[source]
        source: RuntimeError,
    },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub use channels::{ChannelController, ChannelSettings, CommandChannelController, NeighbourChannelController};
pub use evaluator::SensorEvaluator;
pub use flight::{FlightBackend, FlightSettings, Flightless};
pub use registry::{BuildContext, ComponentRegistry, Factory};
pub use vehicle::{Vehicle, VehicleHandle};
