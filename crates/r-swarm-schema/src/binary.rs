//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Record model, schemas, and wire codecs."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Canonical binary codec.
//!
//! A record is two length-prefixed sections: the declared fields as
//! `[index][len][value]` triples in ascending index order, then the extras as
//! a generic map. Encoding is deterministic so identical records always
//! produce identical bytes.
use std::collections::BTreeMap;

use crate::kind::RecordKind;
use crate::record::Record;
use crate::schema::Schema;
use crate::tag::{Tag, TagFamily};
use crate::value::{Value, ValueKind, Vector3};
use crate::{RecordError, Result};

/// Escape byte announcing a two-byte length.
const LONG_LEN: u8 = 0xFF;

const TAG_BYTES: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_MAP: u8 = 3;
const TAG_RECORD: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_TAG: u8 = 6;
const TAG_VECTOR: u8 = 7;

/// Encode a record of any kind.
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let schema = record.schema();
    let mut declared = Vec::new();
    for (index, spec) in schema.fields().iter().enumerate() {
        let Some(value) = record.fields().get(spec.name) else {
            continue;
        };
        declared.push(index as u8);
        let bytes = encode_declared(value, spec.kind)?;
        write_prefixed(&mut declared, &bytes)?;
    }
    let extras = encode_map(record.extras())?;

    let mut out = Vec::with_capacity(declared.len() + extras.len() + 6);
    write_prefixed(&mut out, &declared)?;
    write_prefixed(&mut out, &extras)?;
    Ok(out)
}

/// Decode a record whose kind is known to the receiver.
pub fn decode(bytes: &[u8], kind: RecordKind) -> Result<Record> {
    let mut reader = Reader::new(bytes);
    let declared = reader.take_prefixed()?;
    let extras = reader.take_prefixed()?;
    if !reader.is_empty() {
        return Err(RecordError::Malformed(format!(
            "{} trailing bytes after {}",
            reader.remaining(),
            kind.name()
        )));
    }
    let fields = decode_declared_section(declared, Schema::of(kind))?;
    let extra = decode_map(extras)?;
    Record::from_parts(kind, fields, extra)
}

/// Encode a self-describing record: `[kind index][record]`.
pub fn encode_any(record: &Record) -> Result<Vec<u8>> {
    let mut out = vec![record.kind().index()];
    out.extend(encode(record)?);
    Ok(out)
}

/// Decode a self-describing record written by [`encode_any`].
pub fn decode_any(bytes: &[u8]) -> Result<Record> {
    let mut reader = Reader::new(bytes);
    let kind = RecordKind::from_index(reader.take_u8()?)?;
    decode(reader.rest(), kind)
}

/// Two's-complement width of an integer on the wire.
///
/// One byte below 128 in magnitude, otherwise `ceil((log2|v| + 1) / 4)`
/// bytes, computed exactly on the bit length.
pub fn int_width(value: i64) -> usize {
    let magnitude = value.unsigned_abs();
    if magnitude < 128 {
        return 1;
    }
    let bits = (64 - magnitude.leading_zeros()) as usize;
    if bits % 4 != 0 {
        bits.div_ceil(4)
    } else if magnitude.is_power_of_two() {
        bits / 4
    } else {
        bits / 4 + 1
    }
}

/// Big-endian two's-complement integer bytes.
pub fn encode_int(value: i64) -> Vec<u8> {
    let width = int_width(value);
    let raw = value.to_be_bytes();
    if width <= raw.len() {
        return raw[raw.len() - width..].to_vec();
    }
    let fill = if value < 0 { 0xFF } else { 0x00 };
    let mut out = vec![fill; width - raw.len()];
    out.extend_from_slice(&raw);
    out
}

/// Decode a sign-extended big-endian integer of any width.
pub fn decode_int(bytes: &[u8]) -> Result<i64> {
    let Some(first) = bytes.first() else {
        return Err(RecordError::Malformed("empty integer".into()));
    };
    let body = if bytes.len() > 8 {
        let (head, tail) = bytes.split_at(bytes.len() - 8);
        let fill = if tail[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        if head.iter().any(|byte| *byte != fill) {
            return Err(RecordError::Malformed("integer exceeds 64 bits".into()));
        }
        tail
    } else {
        bytes
    };
    let fill = if *first & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 8];
    buf[8 - body.len()..].copy_from_slice(body);
    Ok(i64::from_be_bytes(buf))
}

/// Append a length prefix.
pub fn write_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if len < usize::from(LONG_LEN) {
        out.push(len as u8);
        return Ok(());
    }
    let long = u16::try_from(len).map_err(|_| RecordError::ValueTooLarge { len })?;
    out.push(LONG_LEN);
    out.extend_from_slice(&long.to_be_bytes());
    Ok(())
}

fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    write_len(out, bytes.len())?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Bounds-checked cursor over a byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wrap a buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether everything has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `needed` bytes.
    pub fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(RecordError::TruncatedInput { needed, remaining });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    /// Consume one byte.
    pub fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Consume a length prefix.
    pub fn take_len(&mut self) -> Result<usize> {
        match self.take_u8()? {
            LONG_LEN => {
                let raw = self.take(2)?;
                Ok(usize::from(u16::from_be_bytes([raw[0], raw[1]])))
            }
            short => Ok(usize::from(short)),
        }
    }

    /// Consume a length-prefixed slice.
    pub fn take_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.take_len()?;
        self.take(len)
    }

    /// Consume the rest of the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

fn encode_declared(value: &Value, kind: ValueKind) -> Result<Vec<u8>> {
    match (value, kind) {
        (Value::Record(record), ValueKind::AnyRecord) => encode_any(record),
        _ => encode_plain(value),
    }
}

fn encode_plain(value: &Value) -> Result<Vec<u8>> {
    Ok(match value {
        Value::Int(value) => encode_int(*value),
        Value::Float(value) => value.to_be_bytes().to_vec(),
        Value::Str(value) => value.as_bytes().to_vec(),
        Value::Bytes(value) => value.clone(),
        Value::Map(map) => encode_map(map)?,
        Value::Vector(vector) => encode_vector(*vector)?,
        Value::Tag(tag) => vec![tag.id()],
        Value::Record(record) => encode(record)?,
    })
}

fn encode_vector(vector: Vector3) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(27);
    for component in vector.to_array() {
        write_prefixed(&mut out, &component.to_be_bytes())?;
    }
    Ok(out)
}

fn encode_map(map: &BTreeMap<String, Value>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (key, value) in map {
        write_prefixed(&mut out, key.as_bytes())?;
        let (tag, bytes) = match value {
            Value::Bytes(bytes) => (TAG_BYTES, bytes.clone()),
            Value::Float(_) => (TAG_FLOAT, encode_plain(value)?),
            Value::Int(_) => (TAG_INT, encode_plain(value)?),
            Value::Map(_) => (TAG_MAP, encode_plain(value)?),
            Value::Record(record) => (TAG_RECORD, encode_any(record)?),
            Value::Str(_) => (TAG_STR, encode_plain(value)?),
            Value::Tag(tag) => (TAG_TAG, vec![tag.family() as u8, tag.id()]),
            Value::Vector(_) => (TAG_VECTOR, encode_plain(value)?),
        };
        out.push(tag);
        write_prefixed(&mut out, &bytes)?;
    }
    Ok(out)
}

fn decode_declared_section(bytes: &[u8], schema: &Schema) -> Result<BTreeMap<String, Value>> {
    let mut reader = Reader::new(bytes);
    let mut fields = BTreeMap::new();
    let mut previous: Option<u8> = None;
    while !reader.is_empty() {
        let index = reader.take_u8()?;
        if previous.is_some_and(|previous| index <= previous) {
            return Err(RecordError::Malformed(format!(
                "field index {index} out of order in {}",
                schema.kind().name()
            )));
        }
        previous = Some(index);
        let spec = schema.by_index(usize::from(index)).ok_or_else(|| {
            RecordError::Malformed(format!(
                "unknown field index {index} in {}",
                schema.kind().name()
            ))
        })?;
        let raw = reader.take_prefixed()?;
        let value = decode_declared(raw, spec.kind).map_err(|err| {
            if !is_scalar(spec.kind) {
                return err;
            }
            let reason = match err {
                RecordError::Malformed(reason) => reason,
                RecordError::TruncatedInput { .. } => {
                    format!("{} bytes do not form a value", raw.len())
                }
                other => return other,
            };
            RecordError::mismatch(
                schema.kind().name(),
                spec.name,
                format!("expected {:?}: {reason}", spec.kind),
            )
        })?;
        fields.insert(spec.name.to_owned(), value);
    }
    Ok(fields)
}

/// Kinds whose bytes carry no nested framing; a decode failure there means
/// the field holds a value of another kind.
fn is_scalar(kind: ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Int | ValueKind::Float | ValueKind::Str | ValueKind::Vector | ValueKind::Tag(_)
    )
}

fn decode_declared(bytes: &[u8], kind: ValueKind) -> Result<Value> {
    Ok(match kind {
        ValueKind::Int => Value::Int(decode_int(bytes)?),
        ValueKind::Float => Value::Float(decode_float(bytes)?),
        ValueKind::Str => Value::Str(decode_str(bytes)?),
        ValueKind::Bytes => Value::Bytes(bytes.to_vec()),
        ValueKind::Map => Value::Map(decode_map(bytes)?),
        ValueKind::Vector => Value::Vector(decode_vector(bytes)?),
        ValueKind::Tag(family) => {
            let [id] = bytes else {
                return Err(RecordError::Malformed(format!(
                    "tag of {} bytes",
                    bytes.len()
                )));
            };
            Value::Tag(decode_tag(family, *id)?)
        }
        ValueKind::Record(kind) => Value::from(decode(bytes, kind)?),
        ValueKind::AnyRecord => Value::from(decode_any(bytes)?),
    })
}

fn decode_float(bytes: &[u8]) -> Result<f64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| RecordError::Malformed(format!("float of {} bytes", bytes.len())))?;
    Ok(f64::from_be_bytes(raw))
}

fn decode_str(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| RecordError::Malformed(format!("invalid utf-8: {err}")))
}

fn decode_tag(family: TagFamily, id: u8) -> Result<Tag> {
    Tag::from_id(family, id).ok_or_else(|| {
        RecordError::Malformed(format!("unknown {} tag id {id:#04x}", family.label()))
    })
}

fn decode_vector(bytes: &[u8]) -> Result<Vector3> {
    let mut reader = Reader::new(bytes);
    let mut components = [0.0; 3];
    for component in &mut components {
        *component = decode_float(reader.take_prefixed()?)?;
    }
    if !reader.is_empty() {
        return Err(RecordError::Malformed("vector longer than 3 elements".into()));
    }
    Ok(Vector3::from(components))
}

fn decode_map(bytes: &[u8]) -> Result<BTreeMap<String, Value>> {
    let mut reader = Reader::new(bytes);
    let mut map = BTreeMap::new();
    while !reader.is_empty() {
        let key = decode_str(reader.take_prefixed()?)?;
        let tag = reader.take_u8()?;
        let bytes = reader.take_prefixed()?;
        let value = match tag {
            TAG_BYTES => Value::Bytes(bytes.to_vec()),
            TAG_FLOAT => Value::Float(decode_float(bytes)?),
            TAG_INT => Value::Int(decode_int(bytes)?),
            TAG_MAP => Value::Map(decode_map(bytes)?),
            TAG_RECORD => Value::from(decode_any(bytes)?),
            TAG_STR => Value::Str(decode_str(bytes)?),
            TAG_TAG => {
                let [family, id] = bytes else {
                    return Err(RecordError::Malformed(format!(
                        "generic tag of {} bytes",
                        bytes.len()
                    )));
                };
                let family = TagFamily::from_byte(*family).ok_or_else(|| {
                    RecordError::Malformed(format!("unknown tag family {family}"))
                })?;
                Value::Tag(decode_tag(family, *id)?)
            }
            TAG_VECTOR => Value::Vector(decode_vector(bytes)?),
            other => {
                return Err(RecordError::Malformed(format!("unknown type tag {other}")));
            }
        };
        if map.insert(key.clone(), value).is_some() {
            return Err(RecordError::Malformed(format!("duplicate key {key}")));
        }
    }
    Ok(map)
}
