//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use once_cell::sync::Lazy;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{RecordError, Result};

/// Every concrete record kind known to the runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString, IntoStaticStr,
)]
pub enum RecordKind {
    /// Schemaless base record; its content lives entirely in extras.
    #[strum(serialize = "Record")]
    Base,
    /// Battery telemetry.
    #[strum(serialize = "BatteryRecord")]
    Battery,
    /// Operator or swarm command with an argument record.
    #[strum(serialize = "CommandRecord")]
    Command,
    /// Vehicle state update carrying any subset of the state fields.
    #[strum(serialize = "PartialRecord")]
    PartialState,
    /// Complete vehicle state.
    #[strum(serialize = "FullRecord")]
    FullState,
    /// Evaluated sensor reading.
    #[strum(serialize = "SensorRecord")]
    Sensor,
    /// Unprocessed sensor output.
    #[strum(serialize = "RawRecord")]
    Raw,
    /// Record addressed to a communication channel.
    #[strum(serialize = "Packet")]
    Packet,
}

/// Kinds ordered by name; a kind's position is its wire index.
static TYPE_INDEX: Lazy<Vec<RecordKind>> = Lazy::new(|| {
    let mut kinds: Vec<RecordKind> = RecordKind::iter().collect();
    kinds.sort_by_key(|kind| kind.name());
    kinds
});

impl RecordKind {
    /// Stable kind name used in JSON and the type index table.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Position of this kind in the alphabetical type index table.
    pub fn index(self) -> u8 {
        TYPE_INDEX
            .iter()
            .position(|kind| *kind == self)
            .map(|position| position as u8)
            .unwrap_or(u8::MAX)
    }

    /// Resolve a wire index back to its kind.
    pub fn from_index(index: u8) -> Result<Self> {
        TYPE_INDEX
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| RecordError::UnknownKind(format!("index {index}")))
    }

    /// Resolve a kind name.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| RecordError::UnknownKind(name.to_owned()))
    }

    /// The complete type index table in wire order.
    pub fn table() -> &'static [RecordKind] {
        &TYPE_INDEX
    }

    /// Whether a slot typed as `self` may carry a record of kind `other`.
    ///
    /// The base kind accepts anything, and a partial state slot accepts a full
    /// state record since the latter carries a superset of its fields.
    pub fn accepts(self, other: RecordKind) -> bool {
        self == other
            || self == RecordKind::Base
            || (self == RecordKind::PartialState && other == RecordKind::FullState)
    }

    /// Kinds whose declared fields may be individually absent.
    pub fn is_partial(self) -> bool {
        matches!(self, RecordKind::PartialState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_index_is_alphabetical() {
        let names: Vec<&str> = RecordKind::table().iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "BatteryRecord",
                "CommandRecord",
                "FullRecord",
                "Packet",
                "PartialRecord",
                "RawRecord",
                "Record",
                "SensorRecord",
            ]
        );
        assert_eq!(RecordKind::Battery.index(), 0);
        assert_eq!(RecordKind::PartialState.index(), 4);
        assert_eq!(RecordKind::Sensor.index(), 7);
    }

    #[test]
    fn index_and_name_lookups_round_trip() {
        for kind in RecordKind::iter() {
            assert_eq!(RecordKind::from_index(kind.index()).expect("index"), kind);
            assert_eq!(RecordKind::from_name(kind.name()).expect("name"), kind);
        }
        assert!(matches!(
            RecordKind::from_index(42),
            Err(RecordError::UnknownKind(_))
        ));
    }

    #[test]
    fn acceptance_rules() {
        assert!(RecordKind::Base.accepts(RecordKind::Packet));
        assert!(RecordKind::PartialState.accepts(RecordKind::FullState));
        assert!(!RecordKind::FullState.accepts(RecordKind::PartialState));
        assert!(!RecordKind::Command.accepts(RecordKind::Battery));
    }
}
