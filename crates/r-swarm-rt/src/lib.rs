//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Component lifecycle helpers for the R-Swarm runtime.
#![warn(missing_docs)]

pub mod budget;
pub mod component;
pub mod priority;
pub mod runner;
pub mod settings;

use r_swarm_msg::BusError;

/// Shared result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Failures raised while starting or controlling components.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Activation was requested after the component powered down.
    #[error("component {0} is powered down")]
    PoweredDown(String),
    /// The component's activation hook refused to start.
    #[error("activation of {name} failed: {reason}")]
    Activation {
        /// Component instance name.
        name: String,
        /// Rendered hook error.
        reason: String,
    },
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker for {name}: {source}")]
    Spawn {
        /// Component instance name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Handler table construction failed.
    #[error(transparent)]
    Table(#[from] BusError),
}

pub use budget::{ErrorBudget, DEFAULT_ERROR_THRESHOLD};
pub use component::Component;
pub use priority::ThreadPriority;
pub use runner::{ComponentControl, ComponentRunner, ComponentStatus};
pub use settings::ComponentSettings;
