//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use r_swarm_schema::Record;
use uuid::Uuid;

use crate::event_type::EventType;
use crate::{BusError, Result};

/// Stable identifier of a component kind, used for loop prevention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(&'static str);

impl KindId {
    /// Wrap a static kind name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Kind name.
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Producer of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Raised outside any component; the token is unique per event.
    External(Uuid),
    /// Derived by a component of this kind.
    Component(KindId),
}

impl Origin {
    /// Fresh external origin.
    pub fn external() -> Self {
        Origin::External(Uuid::new_v4())
    }

    /// Producing component kind, if any.
    pub fn component(self) -> Option<KindId> {
        match self {
            Origin::Component(kind) => Some(kind),
            Origin::External(_) => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::External(token) => write!(f, "external:{token}"),
            Origin::Component(kind) => write!(f, "component:{kind}"),
        }
    }
}

/// A typed payload travelling through the mediator.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: EventType,
    payload: Arc<Record>,
    origin: Origin,
}

impl Event {
    /// Externally raised event.
    pub fn new(event_type: EventType, payload: Record) -> Result<Self> {
        Self::with_origin(event_type, Arc::new(payload), Origin::external())
    }

    /// Event derived by a component of `kind`.
    pub fn derived(event_type: EventType, payload: Record, kind: KindId) -> Result<Self> {
        Self::with_origin(event_type, Arc::new(payload), Origin::Component(kind))
    }

    /// Event over an already shared payload.
    pub fn with_origin(event_type: EventType, payload: Arc<Record>, origin: Origin) -> Result<Self> {
        let expected = event_type.payload_kind();
        if !expected.accepts(payload.kind()) {
            return Err(BusError::PayloadMismatch {
                event: event_type,
                expected,
                found: payload.kind(),
            });
        }
        Ok(Self {
            event_type,
            payload,
            origin,
        })
    }

    /// Event type.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Payload record.
    pub fn payload(&self) -> &Record {
        &self.payload
    }

    /// Shared handle to the payload.
    pub fn shared_payload(&self) -> Arc<Record> {
        Arc::clone(&self.payload)
    }

    /// Producer of the event.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Whether a component of `kind` derived this event.
    pub fn is_from(&self, kind: KindId) -> bool {
        self.origin == Origin::Component(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_swarm_schema::vehicle::{command, default_state};
    use r_swarm_schema::{CommandKind, RecordKind};

    #[test]
    fn payload_kind_is_checked() {
        let state = default_state().expect("state");
        assert!(Event::new(EventType::PowerDown, state.clone()).is_ok());
        assert!(Event::new(EventType::DroneDataUpdate, state.clone()).is_ok());
        let err = Event::new(EventType::CommandStart, state).expect_err("state is not a command");
        assert!(matches!(
            err,
            BusError::PayloadMismatch {
                expected: RecordKind::Command,
                found: RecordKind::FullState,
                ..
            }
        ));
    }

    #[test]
    fn origins() {
        let cmd = command(CommandKind::Land, Record::empty()).expect("command");
        let a = Event::new(EventType::CommandLand, cmd.clone()).expect("event");
        let b = Event::new(EventType::CommandLand, cmd.clone()).expect("event");
        assert_ne!(a.origin(), b.origin());
        assert_eq!(a.origin().component(), None);

        let kind = KindId::new("flightless");
        let derived = Event::derived(EventType::CommandLand, cmd, kind).expect("event");
        assert!(derived.is_from(kind));
        assert_eq!(derived.origin().to_string(), "component:flightless");
    }
}
