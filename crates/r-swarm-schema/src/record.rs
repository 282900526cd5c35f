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

use crate::kind::RecordKind;
use crate::schema::Schema;
use crate::tag::{CommandKind, Tag, VehicleState};
use crate::value::{Value, Vector3};
use crate::{RecordError, Result};

/// A schema-checked set of named values.
///
/// Declared fields live in `fields` and are validated against the kind's
/// [`Schema`]; anything else is preserved in `extra`. The shape is fixed at
/// construction: values may change, names may not.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: RecordKind,
    fields: BTreeMap<String, Value>,
    extra: BTreeMap<String, Value>,
}

impl Record {
    /// Start building a record of `kind`.
    pub fn builder(kind: RecordKind) -> RecordBuilder {
        RecordBuilder {
            kind,
            values: BTreeMap::new(),
        }
    }

    /// Empty base record.
    pub fn empty() -> Self {
        Self {
            kind: RecordKind::Base,
            fields: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Assemble a record from pre-split declared fields and extras.
    pub fn from_parts(
        kind: RecordKind,
        fields: BTreeMap<String, Value>,
        extra: BTreeMap<String, Value>,
    ) -> Result<Self> {
        let schema = Schema::of(kind);
        if let Some(name) = fields.keys().find(|name| schema.field(name).is_none()) {
            return Err(RecordError::UnknownField {
                record: kind.name(),
                field: name.clone(),
            });
        }
        if let Some(name) = extra.keys().find(|name| schema.field(name).is_some()) {
            return Err(RecordError::mismatch(
                kind.name(),
                name.as_str(),
                "declared field carried as an extra",
            ));
        }
        schema.check(&fields)?;
        Ok(Self {
            kind,
            fields,
            extra,
        })
    }

    /// Concrete kind of this record.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Schema of this record's kind.
    pub fn schema(&self) -> &'static Schema {
        Schema::of(self.kind)
    }

    /// Declared fields present on this record.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Undeclared fields preserved alongside the schema.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Value of a declared field or extra. Restricted fields read as `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| self.extra.get(name))
    }

    /// Whether the record carries `name`, declared or extra.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Integer value of `name`.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Float value of `name`; integers widen.
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    /// String value of `name`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Vector value of `name`.
    pub fn get_vector(&self, name: &str) -> Option<Vector3> {
        self.get(name).and_then(Value::as_vector)
    }

    /// Nested record stored under `name`.
    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Value::as_record)
    }

    /// Vehicle state tag stored under `state`.
    pub fn state(&self) -> Option<VehicleState> {
        match self.get("state").and_then(Value::as_tag) {
            Some(Tag::State(state)) => Some(state),
            _ => None,
        }
    }

    /// Command tag stored under `cmd`.
    pub fn command(&self) -> Option<CommandKind> {
        match self.get("cmd").and_then(Value::as_tag) {
            Some(Tag::Command(command)) => Some(command),
            _ => None,
        }
    }

    /// Overwrite an existing field.
    ///
    /// Declared fields keep their kind. A declared field absent from this
    /// record is restricted, and a name that is neither declared nor an
    /// existing extra is unknown.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let record = self.kind.name();
        if let Some(spec) = self.schema().field(name) {
            let Some(slot) = self.fields.get_mut(name) else {
                return Err(RecordError::RestrictedField {
                    record,
                    field: name.to_owned(),
                });
            };
            if !value.matches(spec.kind) {
                return Err(RecordError::mismatch(
                    record,
                    name,
                    format!("expected {:?}, found {}", spec.kind, value.label()),
                ));
            }
            *slot = value;
            return Ok(());
        }
        match self.extra.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RecordError::UnknownField {
                record,
                field: name.to_owned(),
            }),
        }
    }

    /// Absorb the fields carried by a vehicle-state update.
    ///
    /// Fields the update leaves out are untouched. A partial target only takes
    /// the fields it already carries. Extras are merged where names overlap.
    pub fn update_from(&mut self, update: &Record) -> Result<()> {
        if !is_state(self.kind) || !is_state(update.kind) {
            return Err(RecordError::mismatch(
                self.kind.name(),
                "*",
                format!("cannot absorb a {} update", update.kind.name()),
            ));
        }
        for (name, value) in &update.fields {
            if let Some(slot) = self.fields.get_mut(name) {
                *slot = value.clone();
            }
        }
        for (name, value) in &update.extra {
            if let Some(slot) = self.extra.get_mut(name) {
                *slot = value.clone();
            }
        }
        Ok(())
    }

    /// Keep only the whitelisted state fields, as a partial record.
    ///
    /// An empty whitelist returns the record unchanged.
    pub fn project(&self, whitelist: &[&str]) -> Result<Record> {
        if whitelist.is_empty() {
            return Ok(self.clone());
        }
        if !is_state(self.kind) {
            return Err(RecordError::mismatch(
                self.kind.name(),
                "*",
                "only vehicle-state records can be filtered",
            ));
        }
        let fields = self
            .fields
            .iter()
            .filter(|(name, _)| whitelist.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(Record {
            kind: RecordKind::PartialState,
            fields,
            extra: BTreeMap::new(),
        })
    }

    /// Reinterpret a full state record as a partial one carrying every field.
    pub fn into_partial(self) -> Record {
        match self.kind {
            RecordKind::FullState => Record {
                kind: RecordKind::PartialState,
                ..self
            },
            _ => self,
        }
    }
}

fn is_state(kind: RecordKind) -> bool {
    matches!(kind, RecordKind::PartialState | RecordKind::FullState)
}

/// Incremental constructor returned by [`Record::builder`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    kind: RecordKind,
    values: BTreeMap<String, Value>,
}

impl RecordBuilder {
    /// Set a value. Names outside the schema become extras.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Validate and build the record.
    pub fn build(self) -> Result<Record> {
        let schema = Schema::of(self.kind);
        let (fields, extra) = self
            .values
            .into_iter()
            .partition(|(name, _)| schema.field(name).is_some());
        Record::from_parts(self.kind, fields, extra)
    }
}
