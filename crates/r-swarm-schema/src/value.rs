//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::record::Record;
use crate::tag::{CommandKind, Tag, TagFamily, VehicleState};

/// Three-component vector used for positions, rates, and coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// First component (x, latitude, roll).
    pub x: f64,
    /// Second component (y, longitude, pitch).
    pub y: f64,
    /// Third component (z, altitude, yaw).
    pub z: f64,
}

impl Vector3 {
    /// Construct a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Components as an array.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Declared kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    Str,
    /// Raw bytes.
    Bytes,
    /// Generic string-keyed mapping.
    Map,
    /// Three floats.
    Vector,
    /// Tag of the given family.
    Tag(TagFamily),
    /// Nested record of exactly this kind.
    Record(RecordKind),
    /// Nested record of any kind; self-describing on the wire.
    AnyRecord,
}

/// A single value stored in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Generic mapping.
    Map(BTreeMap<String, Value>),
    /// Three floats.
    Vector(Vector3),
    /// Enumerated tag.
    Tag(Tag),
    /// Nested record.
    Record(Box<Record>),
}

impl Value {
    /// Whether this value satisfies a declared field kind.
    pub fn matches(&self, kind: ValueKind) -> bool {
        match (self, kind) {
            (Value::Int(_), ValueKind::Int)
            | (Value::Float(_), ValueKind::Float)
            | (Value::Str(_), ValueKind::Str)
            | (Value::Bytes(_), ValueKind::Bytes)
            | (Value::Map(_), ValueKind::Map)
            | (Value::Vector(_), ValueKind::Vector)
            | (Value::Record(_), ValueKind::AnyRecord) => true,
            (Value::Tag(tag), ValueKind::Tag(family)) => tag.family() == family,
            (Value::Record(record), ValueKind::Record(kind)) => record.kind() == kind,
            _ => false,
        }
    }

    /// Short label of the value's kind for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Map(_) => "map",
            Value::Vector(_) => "vector",
            Value::Tag(_) => "tag",
            Value::Record(_) => "record",
        }
    }

    /// Integer content, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Float content. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// String content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Vector content, if any.
    pub fn as_vector(&self) -> Option<Vector3> {
        match self {
            Value::Vector(value) => Some(*value),
            _ => None,
        }
    }

    /// Tag content, if any.
    pub fn as_tag(&self) -> Option<Tag> {
        match self {
            Value::Tag(tag) => Some(*tag),
            _ => None,
        }
    }

    /// Nested record, if any.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Mapping content, if any.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vector3> for Value {
    fn from(value: Vector3) -> Self {
        Value::Vector(value)
    }
}

impl From<Tag> for Value {
    fn from(value: Tag) -> Self {
        Value::Tag(value)
    }
}

impl From<VehicleState> for Value {
    fn from(value: VehicleState) -> Self {
        Value::Tag(Tag::State(value))
    }
}

impl From<CommandKind> for Value {
    fn from(value: CommandKind) -> Self {
        Value::Tag(Tag::Command(value))
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(Box::new(value))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}
