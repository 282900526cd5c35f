//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Static schema tables for every record kind.
//!
//! Field order inside a schema is alphabetical; a field's position is the
//! index byte written by the binary codec.
use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::kind::RecordKind;
use crate::tag::TagFamily;
use crate::value::{Value, ValueKind};
use crate::{RecordError, Result};

/// Whether a declared field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Construction fails without it.
    Required,
    /// May be absent; absent fields are excluded from encoding and equality.
    Optional,
}

/// A single declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Expected value kind.
    pub kind: ValueKind,
    /// Presence rule.
    pub presence: Presence,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
        }
    }

    const fn optional(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
        }
    }
}

/// Declared field table of one record kind.
#[derive(Debug)]
pub struct Schema {
    kind: RecordKind,
    fields: Vec<FieldSpec>,
}

const STATE_FIELDS: [(&str, ValueKind); 15] = [
    ("id", ValueKind::Int),
    ("descriptor", ValueKind::Str),
    ("current_target", ValueKind::Vector),
    ("position", ValueKind::Vector),
    ("coordinates", ValueKind::Vector),
    ("rotation", ValueKind::Vector),
    ("acceleration", ValueKind::Vector),
    ("velocity", ValueKind::Vector),
    ("angular_velocity", ValueKind::Vector),
    ("starting_position", ValueKind::Vector),
    ("battery", ValueKind::Record(RecordKind::Battery)),
    ("start_time", ValueKind::Float),
    ("state", ValueKind::Tag(TagFamily::State)),
    ("flock_group", ValueKind::Int),
    ("neighbours", ValueKind::Map),
];

static BASE: Lazy<Schema> = Lazy::new(|| Schema::new(RecordKind::Base, Vec::new()));

static BATTERY: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::Battery,
        vec![
            FieldSpec::required("level", ValueKind::Int),
            FieldSpec::required("voltage", ValueKind::Float),
            FieldSpec::required("current", ValueKind::Float),
        ],
    )
});

static COMMAND: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::Command,
        vec![
            FieldSpec::required("cmd", ValueKind::Tag(TagFamily::Command)),
            FieldSpec::required("msg", ValueKind::AnyRecord),
        ],
    )
});

static PARTIAL_STATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::PartialState,
        STATE_FIELDS
            .iter()
            .map(|(name, kind)| FieldSpec::optional(name, *kind))
            .collect(),
    )
});

static FULL_STATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::FullState,
        STATE_FIELDS
            .iter()
            .map(|(name, kind)| FieldSpec::required(name, *kind))
            .collect(),
    )
});

static SENSOR: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::Sensor,
        vec![
            FieldSpec::required("sensor", ValueKind::Str),
            FieldSpec::required("timestamp", ValueKind::Float),
            FieldSpec::optional("coords", ValueKind::Vector),
            FieldSpec::optional("alt", ValueKind::Float),
            FieldSpec::optional("h_dil", ValueKind::Float),
            FieldSpec::optional("v_dil", ValueKind::Float),
            FieldSpec::optional("h_acc", ValueKind::Float),
            FieldSpec::optional("v_acc", ValueKind::Float),
            FieldSpec::optional("vel", ValueKind::Vector),
            FieldSpec::optional("battery", ValueKind::Record(RecordKind::Battery)),
        ],
    )
});

static RAW: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::Raw,
        vec![
            FieldSpec::required("source", ValueKind::Str),
            FieldSpec::required("timestamp", ValueKind::Float),
        ],
    )
});

static PACKET: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        RecordKind::Packet,
        vec![
            FieldSpec::required("payload", ValueKind::AnyRecord),
            FieldSpec::required("channel", ValueKind::Str),
            FieldSpec::required("interface", ValueKind::Str),
            FieldSpec::optional("wire", ValueKind::Bytes),
        ],
    )
});

impl Schema {
    fn new(kind: RecordKind, mut fields: Vec<FieldSpec>) -> Self {
        fields.sort_by_key(|field| field.name);
        Self { kind, fields }
    }

    /// Schema of a record kind.
    pub fn of(kind: RecordKind) -> &'static Schema {
        match kind {
            RecordKind::Base => &BASE,
            RecordKind::Battery => &BATTERY,
            RecordKind::Command => &COMMAND,
            RecordKind::PartialState => &PARTIAL_STATE,
            RecordKind::FullState => &FULL_STATE,
            RecordKind::Sensor => &SENSOR,
            RecordKind::Raw => &RAW,
            RecordKind::Packet => &PACKET,
        }
    }

    /// Record kind described by this schema.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Declared fields in index order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Wire index of a declared field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Declared field at a wire index.
    pub fn by_index(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    /// Validate declared field values against the table.
    pub(crate) fn check(&self, fields: &BTreeMap<String, Value>) -> Result<()> {
        let record = self.kind.name();
        for spec in &self.fields {
            match fields.get(spec.name) {
                Some(value) if !value.matches(spec.kind) => {
                    return Err(RecordError::mismatch(
                        record,
                        spec.name,
                        format!("expected {:?}, found {}", spec.kind, value.label()),
                    ));
                }
                Some(_) => {}
                None if spec.presence == Presence::Required => {
                    return Err(RecordError::mismatch(record, spec.name, "missing required field"));
                }
                None => {}
            }
        }
        if self.kind == RecordKind::Sensor {
            SensorProfile::check(fields)?;
        }
        Ok(())
    }
}

/// Sensor sources that carry a fixed sub-schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorProfile {
    /// Satellite fix.
    Gps,
    /// Velocity estimate.
    Velocity,
    /// Battery monitor.
    Battery,
}

impl SensorProfile {
    const ALL: [SensorProfile; 3] = [
        SensorProfile::Battery,
        SensorProfile::Gps,
        SensorProfile::Velocity,
    ];

    /// Value of the `sensor` field selecting this profile.
    pub fn source(self) -> &'static str {
        match self {
            SensorProfile::Gps => "gps",
            SensorProfile::Velocity => "velocity",
            SensorProfile::Battery => "battery",
        }
    }

    /// Fields the profile requires.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SensorProfile::Gps => &["alt", "coords", "h_acc", "h_dil", "v_acc", "v_dil"],
            SensorProfile::Velocity => &["vel"],
            SensorProfile::Battery => &["battery"],
        }
    }

    /// Profile selected by a sensor source name.
    pub fn from_source(source: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.source().eq_ignore_ascii_case(source))
    }

    fn check(fields: &BTreeMap<String, Value>) -> Result<()> {
        let Some(profile) = fields
            .get("sensor")
            .and_then(Value::as_str)
            .and_then(SensorProfile::from_source)
        else {
            return Ok(());
        };
        for field in profile.fields() {
            if !fields.contains_key(*field) {
                return Err(RecordError::mismatch(
                    "SensorRecord",
                    *field,
                    format!("{} readings require this field", profile.source()),
                ));
            }
        }
        for other in Self::ALL.into_iter().filter(|other| *other != profile) {
            for field in other.fields() {
                if fields.contains_key(*field) {
                    return Err(RecordError::mismatch(
                        "SensorRecord",
                        *field,
                        format!("not part of the {} profile", profile.source()),
                    ));
                }
            }
        }
        Ok(())
    }
}
