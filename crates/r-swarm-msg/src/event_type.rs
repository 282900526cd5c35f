//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use r_swarm_schema::{CommandKind, RecordKind, VehicleState};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Every event routed by the mediator.
///
/// The numeric id is stable and groups events by category: vehicle states in
/// `0x0_`, commands in `0x1_`, communication in `0x2_`, sensing in `0x3_`,
/// and payload extensions from `0x40`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum EventType {
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

    CommandStart = 0x10,
    CommandPosHold = 0x11,
    CommandChangeCourse = 0x12,
    CommandLand = 0x13,
    CommandRtl = 0x14,
    CommandStop = 0x15,
    CommandArm = 0x16,
    CommandDisarm = 0x17,

    PacketSent = 0x20,
    PacketReceived = 0x21,
    SendPacket = 0x22,

    RawSensorData = 0x30,
    MovementSensorData = 0x31,
    MiscSensorData = 0x32,
    MorseSensorData = 0x33,
    DroneDataUpdate = 0x34,
    MovementDataUpdate = 0x35,
    AirsimSensorData = 0x36,
    MavsdkSensorData = 0x37,
    DigitalTwinSensorData = 0x38,

    GoproTakePicture = 0x40,
    GoproStartVideo = 0x41,
    GoproStopVideo = 0x42,
    GoproDownloadFile = 0x43,
    GoproSetPreset = 0x44,
}

/// Coarse grouping of event ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Vehicle state transitions.
    VehicleState,
    /// Commands addressed to the vehicle.
    Command,
    /// Packets entering or leaving communication interfaces.
    Communication,
    /// Raw and evaluated sensor data.
    Sensing,
    /// Payload-specific extensions such as camera control.
    Payload,
}

impl EventType {
    /// Stable numeric id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up an event type by id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::iter().find(|event| event.id() == id)
    }

    /// Upper-case event name.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Category derived from the id range.
    pub fn category(self) -> EventCategory {
        match self.id() >> 4 {
            0x0 => EventCategory::VehicleState,
            0x1 => EventCategory::Command,
            0x2 => EventCategory::Communication,
            0x3 => EventCategory::Sensing,
            _ => EventCategory::Payload,
        }
    }

    /// Record kind every payload of this event type must be accepted by.
    pub fn payload_kind(self) -> RecordKind {
        match self {
            EventType::RawSensorData => RecordKind::Raw,
            EventType::DroneDataUpdate | EventType::MovementDataUpdate => RecordKind::PartialState,
            EventType::MovementSensorData
            | EventType::MiscSensorData
            | EventType::MorseSensorData
            | EventType::AirsimSensorData
            | EventType::MavsdkSensorData
            | EventType::DigitalTwinSensorData => RecordKind::Sensor,
            _ => match self.category() {
                EventCategory::VehicleState => RecordKind::FullState,
                EventCategory::Command | EventCategory::Payload => RecordKind::Command,
                EventCategory::Communication => RecordKind::Packet,
                EventCategory::Sensing => RecordKind::Sensor,
            },
        }
    }

    /// Lifecycle events handled by the component runtime itself.
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            EventType::PowerUp | EventType::PowerDown | EventType::Initialization
        )
    }

    /// Vehicle state announced by this event, if it is a state event.
    pub fn vehicle_state(self) -> Option<VehicleState> {
        match self.category() {
            EventCategory::VehicleState => VehicleState::from_id(self.id()),
            _ => None,
        }
    }

    /// Command carried by this event, if it is a command event.
    pub fn command(self) -> Option<CommandKind> {
        match self.category() {
            EventCategory::Command => CommandKind::from_id(self.id()),
            _ => None,
        }
    }
}

/// Event type announcing a vehicle state.
pub fn state_event(state: VehicleState) -> EventType {
    match state {
        VehicleState::PowerUp => EventType::PowerUp,
        VehicleState::PowerDown => EventType::PowerDown,
        VehicleState::Initialization => EventType::Initialization,
        VehicleState::Idle => EventType::Idle,
        VehicleState::AtStart => EventType::AtStart,
        VehicleState::AtGoal => EventType::AtGoal,
        VehicleState::AtWaypoint => EventType::AtWaypoint,
        VehicleState::PosHold => EventType::PosHold,
        VehicleState::Land => EventType::Land,
        VehicleState::FlyingToGoal => EventType::FlyingToGoal,
        VehicleState::AvoidingCollision => EventType::AvoidingCollision,
        VehicleState::Flock => EventType::Flock,
        VehicleState::Emergency => EventType::Emergency,
        VehicleState::Rtl => EventType::Rtl,
        VehicleState::Disarmed => EventType::Disarmed,
        VehicleState::Arm => EventType::Arm,
    }
}

/// Event type carrying a command.
pub fn command_event(command: CommandKind) -> EventType {
    match command {
        CommandKind::Start => EventType::CommandStart,
        CommandKind::PosHold => EventType::CommandPosHold,
        CommandKind::ChangeCourse => EventType::CommandChangeCourse,
        CommandKind::Land => EventType::CommandLand,
        CommandKind::Rtl => EventType::CommandRtl,
        CommandKind::Stop => EventType::CommandStop,
        CommandKind::Arm => EventType::CommandArm,
        CommandKind::Disarm => EventType::CommandDisarm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_round_trip() {
        let mut ids: Vec<u8> = EventType::iter().map(EventType::id).collect();
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
        for event in EventType::iter() {
            assert_eq!(EventType::from_id(event.id()), Some(event));
            assert_eq!(event.name().parse::<EventType>().expect("name"), event);
        }
    }

    #[test]
    fn payload_kinds_follow_categories() {
        assert_eq!(EventType::PowerDown.payload_kind(), RecordKind::FullState);
        assert_eq!(EventType::CommandLand.payload_kind(), RecordKind::Command);
        assert_eq!(EventType::SendPacket.payload_kind(), RecordKind::Packet);
        assert_eq!(EventType::RawSensorData.payload_kind(), RecordKind::Raw);
        assert_eq!(EventType::DroneDataUpdate.payload_kind(), RecordKind::PartialState);
        assert_eq!(EventType::MiscSensorData.payload_kind(), RecordKind::Sensor);
        assert_eq!(EventType::GoproSetPreset.payload_kind(), RecordKind::Command);
        assert_eq!(EventType::GoproSetPreset.name(), "GOPRO_SET_PRESET");
    }

    #[test]
    fn tag_lookups_agree_with_ids() {
        for state in VehicleState::iter() {
            let event = state_event(state);
            assert_eq!(event.id(), state.id());
            assert_eq!(event.vehicle_state(), Some(state));
        }
        for command in CommandKind::iter() {
            let event = command_event(command);
            assert_eq!(event.id(), command.id());
            assert_eq!(event.command(), Some(command));
        }
        assert_eq!(EventType::PacketSent.command(), None);
    }
}
