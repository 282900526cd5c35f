//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Enumerated tags carried inside records.
//!
//! Tags are plain data. Their numeric ids coincide with the id of the event
//! type they are associated with, which is also their one-byte wire form.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Flight state of a vehicle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum VehicleState {
    PowerUp = 0x00,
    PowerDown = 0x01,
    Initialization = 0x02,
    Idle = 0x03,
    AtStart = 0x04,
    AtGoal = 0x05,
    AtWaypoint = 0x06,
    PosHold = 0x07,
    Land = 0x08,
    FlyingToGoal = 0x09,
    AvoidingCollision = 0x0A,
    Flock = 0x0B,
    Emergency = 0x0C,
    Rtl = 0x0D,
    Disarmed = 0x0E,
    Arm = 0x0F,
}

impl VehicleState {
    /// Numeric id shared with the matching vehicle-state event type.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a state by id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::iter().find(|state| state.id() == id)
    }

    /// Upper-case tag name.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// States in which the vehicle is on the ground.
    pub fn is_grounded(self) -> bool {
        matches!(
            self,
            VehicleState::Land | VehicleState::Initialization | VehicleState::Disarmed
        )
    }
}

/// Command issued to a vehicle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum CommandKind {
    Start = 0x10,
    PosHold = 0x11,
    ChangeCourse = 0x12,
    Land = 0x13,
    Rtl = 0x14,
    Stop = 0x15,
    Arm = 0x16,
    Disarm = 0x17,
}

impl CommandKind {
    /// Numeric id shared with the matching command event type.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a command by id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::iter().find(|command| command.id() == id)
    }

    /// Upper-case tag name.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Tag family, ordered by name for the generic wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFamily {
    /// [`CommandKind`] tags.
    Command = 0,
    /// [`VehicleState`] tags.
    State = 1,
}

impl TagFamily {
    /// Resolve a family byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TagFamily::Command),
            1 => Some(TagFamily::State),
            _ => None,
        }
    }

    /// Lower-case family label used in generic JSON (`@command`, `@state`).
    pub fn label(self) -> &'static str {
        match self {
            TagFamily::Command => "command",
            TagFamily::State => "state",
        }
    }
}

/// A tag value stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Vehicle state tag.
    State(VehicleState),
    /// Command tag.
    Command(CommandKind),
}

impl Tag {
    /// Family of this tag.
    pub fn family(self) -> TagFamily {
        match self {
            Tag::State(_) => TagFamily::State,
            Tag::Command(_) => TagFamily::Command,
        }
    }

    /// One-byte wire id.
    pub fn id(self) -> u8 {
        match self {
            Tag::State(state) => state.id(),
            Tag::Command(command) => command.id(),
        }
    }

    /// Upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Tag::State(state) => state.name(),
            Tag::Command(command) => command.name(),
        }
    }

    /// Decode a tag of a known family from its id.
    pub fn from_id(family: TagFamily, id: u8) -> Option<Self> {
        match family {
            TagFamily::State => VehicleState::from_id(id).map(Tag::State),
            TagFamily::Command => CommandKind::from_id(id).map(Tag::Command),
        }
    }

    /// Parse a tag of a known family from its name.
    pub fn from_name(family: TagFamily, name: &str) -> Option<Self> {
        match family {
            TagFamily::State => name.parse().ok().map(Tag::State),
            TagFamily::Command => name.parse().ok().map(Tag::Command),
        }
    }
}

impl From<VehicleState> for Tag {
    fn from(state: VehicleState) -> Self {
        Tag::State(state)
    }
}

impl From<CommandKind> for Tag {
    fn from(command: CommandKind) -> Self {
        Tag::Command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_names_follow_event_numbering() {
        assert_eq!(VehicleState::AtStart.id(), 0x04);
        assert_eq!(VehicleState::Arm.id(), 0x0F);
        assert_eq!(CommandKind::Start.id(), 0x10);
        assert_eq!(CommandKind::Disarm.id(), 0x17);
        assert_eq!(VehicleState::FlyingToGoal.name(), "FLYING_TO_GOAL");
        assert_eq!(CommandKind::ChangeCourse.name(), "CHANGE_COURSE");
        assert_eq!(
            Tag::from_name(TagFamily::State, "RTL"),
            Some(Tag::State(VehicleState::Rtl))
        );
        assert_eq!(Tag::from_id(TagFamily::Command, 0x04), None);
    }

    #[test]
    fn grounded_states() {
        assert!(VehicleState::Disarmed.is_grounded());
        assert!(VehicleState::Initialization.is_grounded());
        assert!(!VehicleState::AtStart.is_grounded());
    }
}
