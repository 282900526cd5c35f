//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Configuration, tracing setup, and time helpers shared by the workspace."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Shared primitives for the R-Swarm workspace: configuration loading,
//! tracing initialisation, and wall-clock helpers.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, ComponentConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, ModulesConfig,
    VehicleConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::unix_seconds;
