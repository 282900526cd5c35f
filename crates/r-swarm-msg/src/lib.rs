//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Publish/subscribe plumbing shared by every R-Swarm component.
#![warn(missing_docs)]

pub mod event;
pub mod event_type;
pub mod logging;
pub mod mediator;
pub mod processor;
pub mod replay;

use r_swarm_schema::{RecordError, RecordKind};

/// Shared result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Failures raised while building events, handler tables, or replays.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The payload kind is not accepted by the event type.
    #[error("{event} carries {expected} payloads, not {found}")]
    PayloadMismatch {
        /// Event type being constructed.
        event: event_type::EventType,
        /// Payload kind declared by the event type.
        expected: RecordKind,
        /// Kind of the offered payload.
        found: RecordKind,
    },
    /// A handler registration does not fit its event types.
    #[error("invalid handler for {event} on {owner}: {reason}")]
    HandlerSignature {
        /// Component kind owning the table.
        owner: &'static str,
        /// Event type the handler was registered against.
        event: event_type::EventType,
        /// Explanation.
        reason: String,
    },
    /// Event name is not part of the taxonomy.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    /// Record construction or decoding failed.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Wrapper for IO errors encountered while reading replays.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON problems in replay lines.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use event::{Event, KindId, Origin};
pub use event_type::{command_event, state_event, EventCategory, EventType};
pub use logging::{log_event, BusMetricsExporter, EventDirection};
pub use mediator::{BusMetrics, Mediator, Subscriber, SubscriberId};
pub use processor::{
    Dispatch, HandlerContext, HandlerFn, HandlerSpec, HandlerTable, HandlerTableBuilder,
    LifecycleHook, ProcessingMode,
};
pub use replay::{replay_from_file, replay_from_reader};
