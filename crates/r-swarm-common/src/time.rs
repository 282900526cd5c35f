//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Configuration, tracing setup, and time helpers shared by the workspace."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Wall-clock time as fractional Unix seconds, the form records carry.
pub fn unix_seconds() -> f64 {
    to_unix_seconds(Utc::now())
}

/// Convert a timestamp into fractional Unix seconds.
pub fn to_unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Time since `start` (fractional Unix seconds), clamped at zero.
pub fn elapsed_since(start: f64) -> Duration {
    Duration::try_from_secs_f64(unix_seconds() - start).unwrap_or(Duration::ZERO)
}
