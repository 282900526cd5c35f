//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Default vehicle-state and battery records.
use std::collections::BTreeMap;

use crate::kind::RecordKind;
use crate::record::Record;
use crate::tag::{CommandKind, VehicleState};
use crate::value::{Value, Vector3};
use crate::Result;

/// Battery record with explicit readings.
pub fn battery(level: i64, voltage: f64, current: f64) -> Result<Record> {
    Record::builder(RecordKind::Battery)
        .field("level", level)
        .field("voltage", voltage)
        .field("current", current)
        .build()
}

/// Full state record of a vehicle that has not reported yet.
///
/// Id -1, empty descriptor, zero vectors, an unknown battery and state
/// `INITIALIZATION`.
pub fn default_state() -> Result<Record> {
    state_at(-1, "", Vector3::default())
}

/// Full state record for vehicle `id` standing at `home`.
pub fn state_at(id: i64, descriptor: &str, home: Vector3) -> Result<Record> {
    let zero = Vector3::default();
    Record::builder(RecordKind::FullState)
        .field("id", id)
        .field("descriptor", descriptor)
        .field("current_target", home)
        .field("position", home)
        .field("coordinates", zero)
        .field("rotation", zero)
        .field("acceleration", zero)
        .field("velocity", zero)
        .field("angular_velocity", zero)
        .field("starting_position", home)
        .field("battery", battery(0, 0.0, -1.0)?)
        .field("start_time", 0.0)
        .field("state", VehicleState::Initialization)
        .field("flock_group", 0)
        .field("neighbours", BTreeMap::<String, Value>::new())
        .build()
}

/// Command record with arguments carried as extras of a base record.
pub fn command(kind: CommandKind, args: Record) -> Result<Record> {
    Record::builder(RecordKind::Command)
        .field("cmd", kind)
        .field("msg", args)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let state = default_state().expect("default state");
        assert_eq!(state.get_int("id"), Some(-1));
        assert_eq!(state.state(), Some(VehicleState::Initialization));
        assert_eq!(state.get_vector("position"), Some(Vector3::default()));
        let battery = state.get_record("battery").expect("battery");
        assert_eq!(battery.get_float("current"), Some(-1.0));
        assert_eq!(state.get("neighbours").and_then(|n| n.as_map()).map(|n| n.len()), Some(0));
    }
}
