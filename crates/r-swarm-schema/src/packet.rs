//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use crate::kind::RecordKind;
use crate::record::Record;
use crate::value::Value;
use crate::{RecordError, Result};

/// Interface tag claimed by every communication interface.
pub const ANY_INTERFACE: &str = "*";

/// A record addressed to a communication channel and interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Filtered payload.
    pub payload: Record,
    /// Channel name.
    pub channel: String,
    /// Interface tag; empty or `*` means any interface.
    pub interface: String,
    /// Serialized form, once digested.
    pub wire: Option<Vec<u8>>,
}

impl Packet {
    /// Address `payload` to `channel` on `interface`.
    pub fn new(payload: Record, channel: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            payload,
            channel: channel.into(),
            interface: interface.into(),
            wire: None,
        }
    }

    /// Kind of the carried payload.
    pub fn payload_kind(&self) -> RecordKind {
        self.payload.kind()
    }

    /// Whether an interface tagged `name` should carry this packet.
    pub fn addressed_to(&self, name: &str) -> bool {
        self.interface.is_empty() || self.interface == ANY_INTERFACE || self.interface == name
    }

    /// Convert to a bus record.
    pub fn to_record(&self) -> Result<Record> {
        let mut builder = Record::builder(RecordKind::Packet)
            .field("payload", self.payload.clone())
            .field("channel", self.channel.as_str())
            .field("interface", self.interface.as_str());
        if let Some(wire) = &self.wire {
            builder = builder.field("wire", wire.clone());
        }
        builder.build()
    }

    /// Rebuild from a bus record of kind [`RecordKind::Packet`].
    pub fn from_record(record: &Record) -> Result<Self> {
        if record.kind() != RecordKind::Packet {
            return Err(RecordError::mismatch(
                "Packet",
                "*",
                format!("expected a packet, found {}", record.kind().name()),
            ));
        }
        let missing = |field: &str| RecordError::mismatch("Packet", field, "missing");
        Ok(Self {
            payload: record
                .get_record("payload")
                .cloned()
                .ok_or_else(|| missing("payload"))?,
            channel: record
                .get_str("channel")
                .ok_or_else(|| missing("channel"))?
                .to_owned(),
            interface: record
                .get_str("interface")
                .ok_or_else(|| missing("interface"))?
                .to_owned(),
            wire: match record.get("wire") {
                Some(Value::Bytes(bytes)) => Some(bytes.clone()),
                _ => None,
            },
        })
    }
}

impl TryFrom<&Record> for Packet {
    type Error = RecordError;

    fn try_from(record: &Record) -> Result<Self> {
        Packet::from_record(record)
    }
}
