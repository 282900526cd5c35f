//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Record model for the R-Swarm message bus.
//!
//! Every payload travelling on the bus is a [`Record`]: a schema-checked map of
//! named values. Concrete record kinds (vehicle state, battery, command, sensor,
//! packet) are described by static [`Schema`] tables and share two codecs, a
//! deterministic binary encoding used on the wire and a JSON mirror used for
//! human-readable paths.
#![warn(missing_docs)]

pub mod binary;
pub mod json;
pub mod kind;
pub mod packet;
pub mod record;
pub mod schema;
pub mod tag;
pub mod value;
pub mod vehicle;

/// Shared result type for record construction and codec routines.
pub type Result<T> = std::result::Result<T, RecordError>;

/// Failures raised while building, mutating, or decoding records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A required field is missing or carries the wrong value kind.
    #[error("schema mismatch in {record}.{field}: {reason}")]
    SchemaMismatch {
        /// Record kind being built or decoded.
        record: &'static str,
        /// Offending field name.
        field: String,
        /// Human readable explanation.
        reason: String,
    },
    /// Binary input ended before a declared length was satisfied.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes the decoder attempted to read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
    /// Structurally invalid input that is not a truncation.
    #[error("malformed input: {0}")]
    Malformed(String),
    /// A value exceeds the largest length the wire format can express.
    #[error("value of {len} bytes exceeds the wire length limit")]
    ValueTooLarge {
        /// Encoded length of the value.
        len: usize,
    },
    /// Record kind name or index is not part of the type index table.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),
    /// Write to a field that this record does not carry.
    #[error("field {field} is restricted on this {record}")]
    RestrictedField {
        /// Record kind.
        record: &'static str,
        /// Field name.
        field: String,
    },
    /// Write to a field that is neither declared nor an existing extra.
    #[error("unknown field {field} on {record}")]
    UnknownField {
        /// Record kind.
        record: &'static str,
        /// Field name.
        field: String,
    },
    /// JSON text could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecordError {
    pub(crate) fn mismatch(
        record: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RecordError::SchemaMismatch {
            record,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub use binary::{decode, encode};
pub use json::{from_json, from_json_str, to_json, to_json_string};
pub use kind::RecordKind;
pub use packet::Packet;
pub use record::{Record, RecordBuilder};
pub use schema::{FieldSpec, Presence, Schema, SensorProfile};
pub use tag::{CommandKind, Tag, TagFamily, VehicleState};
pub use value::{Value, ValueKind, Vector3};
