//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! JSON mirror of the binary codec.
//!
//! Declared fields are typed by the schema. Extras carry their own type:
//! integers and fractions are told apart by the number, and bytes, tags and
//! nested records use `@bytes`, `@state`/`@command` and `@kind` markers.
use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value as Json};

use crate::kind::RecordKind;
use crate::record::Record;
use crate::schema::Schema;
use crate::tag::{Tag, TagFamily};
use crate::value::{Value, ValueKind, Vector3};
use crate::{RecordError, Result};

const KIND_KEY: &str = "@kind";
const BYTES_KEY: &str = "@bytes";

/// Render a record as a JSON object.
pub fn to_json(record: &Record) -> Result<Json> {
    let mut object = Map::new();
    for (name, value) in record.fields() {
        let declared = record
            .schema()
            .field(name)
            .map(|spec| spec.kind)
            .unwrap_or(ValueKind::AnyRecord);
        object.insert(name.clone(), declared_to_json(value, declared)?);
    }
    for (name, value) in record.extras() {
        object.insert(name.clone(), generic_to_json(value)?);
    }
    Ok(Json::Object(object))
}

/// Rebuild a record of `kind` from a JSON object.
pub fn from_json(json: &Json, kind: RecordKind) -> Result<Record> {
    let Json::Object(object) = json else {
        return Err(RecordError::mismatch(kind.name(), "*", "expected a JSON object"));
    };
    record_from_object(object, kind)
}

/// Render a record as compact JSON text.
pub fn to_json_string(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(&to_json(record)?)?)
}

/// Parse JSON text into a record of `kind`.
pub fn from_json_str(text: &str, kind: RecordKind) -> Result<Record> {
    let json: Json = serde_json::from_str(text)?;
    from_json(&json, kind)
}

fn record_from_object(object: &Map<String, Json>, kind: RecordKind) -> Result<Record> {
    if let Some(tagged) = object.get(KIND_KEY).and_then(Json::as_str) {
        if RecordKind::from_name(tagged)? != kind {
            return Err(RecordError::mismatch(
                kind.name(),
                KIND_KEY,
                format!("object is tagged {tagged}"),
            ));
        }
    }
    let schema = Schema::of(kind);
    let mut fields = BTreeMap::new();
    let mut extra = BTreeMap::new();
    for (name, json) in object {
        if name == KIND_KEY {
            continue;
        }
        match schema.field(name) {
            Some(spec) => {
                fields.insert(name.clone(), declared_from_json(json, spec.kind, kind, name)?);
            }
            None => {
                extra.insert(name.clone(), generic_from_json(json)?);
            }
        }
    }
    Record::from_parts(kind, fields, extra)
}

fn float_to_json(value: f64) -> Result<Json> {
    Number::from_f64(value)
        .map(Json::Number)
        .ok_or_else(|| RecordError::Malformed(format!("{value} has no JSON form")))
}

fn vector_to_json(vector: Vector3) -> Result<Json> {
    Ok(Json::Array(
        vector
            .to_array()
            .into_iter()
            .map(float_to_json)
            .collect::<Result<_>>()?,
    ))
}

fn any_record_to_json(record: &Record) -> Result<Json> {
    let mut json = to_json(record)?;
    if let Json::Object(object) = &mut json {
        object.insert(KIND_KEY.into(), Json::String(record.kind().name().into()));
    }
    Ok(json)
}

fn map_to_json(map: &BTreeMap<String, Value>) -> Result<Json> {
    let mut object = Map::new();
    for (key, value) in map {
        object.insert(key.clone(), generic_to_json(value)?);
    }
    Ok(Json::Object(object))
}

fn declared_to_json(value: &Value, kind: ValueKind) -> Result<Json> {
    Ok(match value {
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
        Value::Tag(tag) => Json::String(tag.name().into()),
        Value::Record(record) if kind == ValueKind::AnyRecord => any_record_to_json(record)?,
        Value::Record(record) => to_json(record)?,
        other => generic_to_json(other)?,
    })
}

fn generic_to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Int(value) => Json::from(*value),
        Value::Float(value) => float_to_json(*value)?,
        Value::Str(value) => Json::String(value.clone()),
        Value::Bytes(bytes) => {
            let mut object = Map::new();
            object.insert(BYTES_KEY.into(), Json::String(STANDARD.encode(bytes)));
            Json::Object(object)
        }
        Value::Map(map) => map_to_json(map)?,
        Value::Vector(vector) => vector_to_json(*vector)?,
        Value::Tag(tag) => {
            let mut object = Map::new();
            object.insert(
                format!("@{}", tag.family().label()),
                Json::String(tag.name().into()),
            );
            Json::Object(object)
        }
        Value::Record(record) => any_record_to_json(record)?,
    })
}

fn vector_from_json(json: &Json) -> Option<Vector3> {
    let Json::Array(items) = json else {
        return None;
    };
    let [x, y, z] = items.as_slice() else {
        return None;
    };
    Some(Vector3::new(x.as_f64()?, y.as_f64()?, z.as_f64()?))
}

fn bytes_from_b64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|err| RecordError::Malformed(format!("invalid base64: {err}")))
}

fn declared_from_json(
    json: &Json,
    kind: ValueKind,
    record: RecordKind,
    field: &str,
) -> Result<Value> {
    let wrong = || {
        RecordError::mismatch(
            record.name(),
            field,
            format!("expected {kind:?}, found {json}"),
        )
    };
    Ok(match kind {
        ValueKind::Int => Value::Int(json.as_i64().ok_or_else(wrong)?),
        ValueKind::Float => Value::Float(json.as_f64().ok_or_else(wrong)?),
        ValueKind::Str => Value::Str(json.as_str().ok_or_else(wrong)?.to_owned()),
        ValueKind::Bytes => Value::Bytes(bytes_from_b64(json.as_str().ok_or_else(wrong)?)?),
        ValueKind::Map => {
            let object = json.as_object().ok_or_else(wrong)?;
            Value::Map(map_from_object(object)?)
        }
        ValueKind::Vector => Value::Vector(vector_from_json(json).ok_or_else(wrong)?),
        ValueKind::Tag(family) => {
            let name = json.as_str().ok_or_else(wrong)?;
            Value::Tag(Tag::from_name(family, name).ok_or_else(wrong)?)
        }
        ValueKind::Record(nested) => {
            let object = json.as_object().ok_or_else(wrong)?;
            Value::from(record_from_object(object, nested)?)
        }
        ValueKind::AnyRecord => {
            let object = json.as_object().ok_or_else(wrong)?;
            let nested = object
                .get(KIND_KEY)
                .and_then(Json::as_str)
                .ok_or_else(wrong)?;
            Value::from(record_from_object(object, RecordKind::from_name(nested)?)?)
        }
    })
}

fn map_from_object(object: &Map<String, Json>) -> Result<BTreeMap<String, Value>> {
    object
        .iter()
        .map(|(key, json)| Ok((key.clone(), generic_from_json(json)?)))
        .collect()
}

fn generic_from_json(json: &Json) -> Result<Value> {
    match json {
        Json::Number(number) => match number.as_i64() {
            Some(value) => Ok(Value::Int(value)),
            None => number
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| RecordError::Malformed(format!("unsupported number {number}"))),
        },
        Json::String(text) => Ok(Value::Str(text.clone())),
        Json::Array(_) => vector_from_json(json)
            .map(Value::Vector)
            .ok_or_else(|| RecordError::Malformed(format!("arrays must be 3-vectors: {json}"))),
        Json::Object(object) => {
            if let Some(text) = object.get(BYTES_KEY).and_then(Json::as_str) {
                return Ok(Value::Bytes(bytes_from_b64(text)?));
            }
            for family in [TagFamily::State, TagFamily::Command] {
                if let Some(name) = object
                    .get(&format!("@{}", family.label()))
                    .and_then(Json::as_str)
                {
                    return Tag::from_name(family, name).map(Value::Tag).ok_or_else(|| {
                        RecordError::Malformed(format!("unknown {} tag {name}", family.label()))
                    });
                }
            }
            if let Some(kind) = object.get(KIND_KEY).and_then(Json::as_str) {
                let kind = RecordKind::from_name(kind)?;
                return Ok(Value::from(record_from_object(object, kind)?));
            }
            Ok(Value::Map(map_from_object(object)?))
        }
        Json::Bool(_) | Json::Null => Err(RecordError::Malformed(format!(
            "unsupported JSON value {json}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{CommandKind, VehicleState};
    use serde_json::json;

    #[test]
    fn command_record_mirrors_binary_model() {
        let args = Record::builder(RecordKind::Base)
            .field("takeOffAltitude", 5.0)
            .field("speed", 5)
            .build()
            .expect("args");
        let command = Record::builder(RecordKind::Command)
            .field("cmd", CommandKind::Start)
            .field("msg", args)
            .build()
            .expect("command");

        let json = to_json(&command).expect("to_json");
        assert_eq!(json["cmd"], json!("START"));
        assert_eq!(json["msg"]["@kind"], json!("Record"));
        assert_eq!(json["msg"]["speed"], json!(5));

        let back = from_json(&json, RecordKind::Command).expect("from_json");
        assert_eq!(back, command);
        assert_eq!(back.get_record("msg").and_then(|m| m.get_float("takeOffAltitude")), Some(5.0));
    }

    #[test]
    fn generic_markers() {
        let record = from_json(
            &json!({
                "blob": {"@bytes": "AQI="},
                "mode": {"@state": "LAND"},
                "count": 3,
                "ratio": 0.5
            }),
            RecordKind::Base,
        )
        .expect("base record");
        assert_eq!(record.get("blob"), Some(&Value::Bytes(vec![1, 2])));
        assert_eq!(record.get("mode"), Some(&Value::from(VehicleState::Land)));
        assert_eq!(record.get("count"), Some(&Value::Int(3)));
        assert_eq!(record.get("ratio"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn schema_failures_match_binary() {
        let missing = from_json(&json!({"level": 3, "voltage": 1.0}), RecordKind::Battery);
        assert!(matches!(missing, Err(RecordError::SchemaMismatch { .. })));
        let wrong = from_json(
            &json!({"level": "high", "voltage": 1.0, "current": 0.1}),
            RecordKind::Battery,
        );
        assert!(matches!(wrong, Err(RecordError::SchemaMismatch { .. })));
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let record = Record::builder(RecordKind::Raw)
            .field("source", "baro")
            .field("timestamp", f64::NAN)
            .build()
            .expect("raw");
        assert!(matches!(to_json(&record), Err(RecordError::Malformed(_))));
    }
}
