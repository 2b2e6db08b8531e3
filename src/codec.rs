//! Encode/decode struct values from their shape descriptors.
//!
//! The walker visits a shape's fields in declaration order and dispatches
//! each one to a primitive codec, a registered custom transform, or a nested
//! shape, resolving `len` clauses against already-processed sibling and
//! ancestor values. Decode and encode share this control structure; they
//! differ only in whether a primitive operation reads or writes. The two
//! reserved function names `Length` and `LengthWithoutSelf` fill in
//! self-describing length prefixes on encode via a dry-run size pass and read
//! back as ordinary sized integers on decode.

use crate::expr::{Level, ResolveError};
use crate::shape::{DecodeFn, EncodeFn, Field, FieldDescriptor, Kind, Shape};
use crate::stream::{ByteReader, ByteWriter, Endianness, StreamError};
use crate::value::{Record, Value};
use std::io::Read;

const LENGTH: &str = "Length";
const LENGTH_WITHOUT_SELF: &str = "LengthWithoutSelf";

fn is_builtin(name: &str) -> bool {
    name == LENGTH || name == LENGTH_WITHOUT_SELF
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("stream: {0}")]
    Stream(#[from] StreamError),
    #[error("shape {shape}, field {field}: {detail}")]
    Tag {
        shape: String,
        field: String,
        detail: String,
    },
    #[error("shape {shape}, field {field}: {source}")]
    Length {
        shape: String,
        field: String,
        source: ResolveError,
    },
    #[error("shape {shape}, field {field}: {detail}")]
    UnsupportedKind {
        shape: String,
        field: String,
        detail: String,
    },
    #[error("shape {shape}, field {field}: kind {kind} requires a len clause")]
    MissingLength {
        shape: String,
        field: String,
        kind: &'static str,
    },
    #[error("no {direction} function {name:?} on shape {shape} or any ancestor (field {field}); register it with ShapeBuilder::transform")]
    FunctionNotFound {
        shape: String,
        field: String,
        name: String,
        direction: &'static str,
    },
    #[error("shape {shape}, field {field}: resolved count {expected} does not match value with {actual} elements")]
    LengthMismatch {
        shape: String,
        field: String,
        expected: u64,
        actual: usize,
    },
    #[error("shape {shape}, field {field}: text field is not valid UTF-8: {source}")]
    Text {
        shape: String,
        field: String,
        source: std::string::FromUtf8Error,
    },
    #[error("shape {shape}: target value is not a struct")]
    InvalidTarget { shape: String },
}

impl CodecError {
    /// True when the underlying cause is a clean end of stream: the designed
    /// termination signal for open-ended repeated reads.
    pub fn is_eof(&self) -> bool {
        matches!(self, CodecError::Stream(StreamError::Eof))
    }
}

fn length_error(shape: &Shape, field: &str, source: ResolveError) -> CodecError {
    CodecError::Length {
        shape: shape.name().to_string(),
        field: field.to_string(),
        source,
    }
}

fn unsupported(shape: &Shape, field: &str, detail: impl Into<String>) -> CodecError {
    CodecError::UnsupportedKind {
        shape: shape.name().to_string(),
        field: field.to_string(),
        detail: detail.into(),
    }
}

fn missing_length(shape: &Shape, field: &str, kind: &Kind) -> CodecError {
    CodecError::MissingLength {
        shape: shape.name().to_string(),
        field: field.to_string(),
        kind: kind.name(),
    }
}

/// Codec with a fixed base byte order. Owns no state beyond configuration;
/// every call builds its own stream, so independent calls may run
/// concurrently on separate data.
#[derive(Debug, Clone)]
pub struct Codec {
    order: Endianness,
    debug: bool,
}

impl Codec {
    pub fn new(order: Endianness) -> Self {
        Codec { order, debug: false }
    }

    /// If set, every primitive stream operation prints its byte offset and
    /// raw bytes to stderr. Purely observational.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Decode one value of `shape` from `data` into a fresh record.
    pub fn decode(&self, shape: &Shape, data: &[u8]) -> Result<Record, CodecError> {
        let mut record = Record::new();
        self.decode_into(shape, data, &mut record)?;
        Ok(record)
    }

    /// Decode into a pre-seeded record. Ignored bookkeeping fields keep
    /// their seeded values and stay referenceable from `len` clauses.
    pub fn decode_into(
        &self,
        shape: &Shape,
        data: &[u8],
        record: &mut Record,
    ) -> Result<(), CodecError> {
        let mut r = ByteReader::from_bytes(data, self.order);
        r.set_debug(self.debug);
        decode_level(&mut r, shape, record, &[])
    }

    /// Encode one record of `shape`, returning the produced bytes. The
    /// record is never mutated; missing fields encode as zero/default.
    pub fn encode(&self, shape: &Shape, record: &Record) -> Result<Vec<u8>, CodecError> {
        let mut w = ByteWriter::new(self.order);
        w.set_debug(self.debug);
        encode_level(&mut w, shape, record, &[])?;
        Ok(w.into_bytes())
    }

    /// Encode a [`Value`], which must be a struct value of `shape`.
    pub fn encode_value(&self, shape: &Shape, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value.as_struct() {
            Some(record) => self.encode(shape, record),
            None => Err(CodecError::InvalidTarget {
                shape: shape.name().to_string(),
            }),
        }
    }
}

pub fn decode_le(shape: &Shape, data: &[u8]) -> Result<Record, CodecError> {
    Codec::new(Endianness::Little).decode(shape, data)
}

pub fn decode_be(shape: &Shape, data: &[u8]) -> Result<Record, CodecError> {
    Codec::new(Endianness::Big).decode(shape, data)
}

pub fn encode_le(shape: &Shape, record: &Record) -> Result<Vec<u8>, CodecError> {
    Codec::new(Endianness::Little).encode(shape, record)
}

pub fn encode_be(shape: &Shape, record: &Record) -> Result<Vec<u8>, CodecError> {
    Codec::new(Endianness::Big).encode(shape, record)
}

/// Pull the next value of `shape` off a long-lived reader, using the
/// reader's ambient byte order. A clean end of stream before the first byte
/// surfaces as [`StreamError::Eof`]; custom chunk-loop transforms use this
/// as their termination signal (see [`CodecError::is_eof`]).
pub fn decode_next(r: &mut ByteReader<'_>, shape: &Shape) -> Result<Record, CodecError> {
    let mut record = Record::new();
    decode_level(r, shape, &mut record, &[])?;
    Ok(record)
}

/// [`decode_next`] into a pre-seeded record, for transforms that hand a
/// bookkeeping value (a remaining-length counter, an outer chunk length)
/// down to the nested shape.
pub fn decode_next_into(
    r: &mut ByteReader<'_>,
    shape: &Shape,
    record: &mut Record,
) -> Result<(), CodecError> {
    decode_level(r, shape, record, &[])
}

/// Append one encoded value of `shape` to a long-lived writer.
pub fn encode_next(w: &mut ByteWriter, shape: &Shape, record: &Record) -> Result<(), CodecError> {
    encode_level(w, shape, record, &[])
}

/// Streaming decoder: pulls successive values off one underlying source.
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(src: impl Read + 'a, order: Endianness) -> Self {
        Decoder {
            reader: ByteReader::new(src, order),
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.reader.set_debug(debug);
    }

    pub fn decode(&mut self, shape: &Shape) -> Result<Record, CodecError> {
        decode_next(&mut self.reader, shape)
    }

    /// Bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }
}

/// Streaming encoder: accumulates successive values into one buffer.
pub struct Encoder {
    writer: ByteWriter,
}

impl Encoder {
    pub fn new(order: Endianness) -> Self {
        Encoder {
            writer: ByteWriter::new(order),
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.writer.set_debug(debug);
    }

    pub fn encode(&mut self, shape: &Shape, record: &Record) -> Result<(), CodecError> {
        encode_next(&mut self.writer, shape, record)
    }

    pub fn bytes(&self) -> &[u8] {
        self.writer.bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

// ---- decode walk ----

fn decode_level(
    r: &mut ByteReader<'_>,
    shape: &Shape,
    record: &mut Record,
    ancestors: &[Level<'_>],
) -> Result<(), CodecError> {
    for (idx, field) in shape.fields().iter().enumerate() {
        let desc = &field.descriptor;
        if desc.ignore {
            continue;
        }
        let prev = desc.byte_order.map(|o| r.swap_order(o));
        let result = decode_slot(r, shape, &field.name, &field.kind, desc, idx, record, ancestors);
        if let Some(o) = prev {
            r.swap_order(o);
        }
        if let Some(v) = result? {
            record.insert(field.name.clone(), v);
        }
    }
    Ok(())
}

/// Decode one slot: a field, or one element of a container field. `idx` is
/// the owning field's index; container elements resolve references against
/// the owning level, not a level of their own.
#[allow(clippy::too_many_arguments)]
fn decode_slot(
    r: &mut ByteReader<'_>,
    shape: &Shape,
    field: &str,
    kind: &Kind,
    desc: &FieldDescriptor,
    idx: usize,
    record: &mut Record,
    ancestors: &[Level<'_>],
) -> Result<Option<Value>, CodecError> {
    if let Some(name) = desc.function.as_deref() {
        if is_builtin(name) {
            // Read direction: the prefix arrives like any sized integer and
            // is not recomputed.
            if !kind.is_integer() {
                return Err(unsupported(
                    shape,
                    field,
                    format!("{} requires an integer field, not {}", name, kind.name()),
                ));
            }
            let length = resolve_length(desc, shape, field, idx, record, ancestors)?;
            return Ok(Some(decode_integer(r, kind, length)?));
        }
        let func = find_decode_fn(shape, ancestors, name).ok_or_else(|| {
            CodecError::FunctionNotFound {
                shape: shape.name().to_string(),
                field: field.to_string(),
                name: name.to_string(),
                direction: "decode",
            }
        })?;
        return func(r, record);
    }

    match kind {
        Kind::U8
        | Kind::U16
        | Kind::U32
        | Kind::U64
        | Kind::I8
        | Kind::I16
        | Kind::I32
        | Kind::I64
        | Kind::Uint
        | Kind::Int => {
            let length = resolve_length(desc, shape, field, idx, record, ancestors)?;
            if matches!(kind, Kind::Uint | Kind::Int) && length.is_none() {
                return Err(missing_length(shape, field, kind));
            }
            Ok(Some(decode_integer(r, kind, length)?))
        }
        Kind::F32 => Ok(Some(Value::F32(r.read_f32()?))),
        Kind::F64 => Ok(Some(Value::F64(r.read_f64()?))),
        Kind::Bool => Err(unsupported(shape, field, "bool is reserved and not implemented")),
        Kind::Str => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .ok_or_else(|| missing_length(shape, field, kind))?;
            let bytes = r.read_bytes(n as usize)?;
            let s = String::from_utf8(bytes).map_err(|source| CodecError::Text {
                shape: shape.name().to_string(),
                field: field.to_string(),
                source,
            })?;
            Ok(Some(Value::Str(s)))
        }
        Kind::Bytes => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .ok_or_else(|| missing_length(shape, field, kind))?;
            Ok(Some(Value::Bytes(r.read_bytes(n as usize)?)))
        }
        Kind::Slice(elem) => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .ok_or_else(|| missing_length(shape, field, kind))?;
            decode_elements(r, shape, field, elem, desc, idx, record, ancestors, n)
        }
        Kind::Array(elem, size) => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .unwrap_or(*size as u64);
            decode_elements(r, shape, field, elem, desc, idx, record, ancestors, n)
        }
        Kind::Struct(child) => {
            let mut child_record = Record::new();
            {
                let mut chain = ancestors.to_vec();
                chain.push(Level::partial(shape, record, idx));
                decode_level(r, child, &mut child_record, &chain)?;
            }
            Ok(Some(Value::Struct(child_record)))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_elements(
    r: &mut ByteReader<'_>,
    shape: &Shape,
    field: &str,
    elem_kind: &Kind,
    desc: &FieldDescriptor,
    idx: usize,
    record: &mut Record,
    ancestors: &[Level<'_>],
    count: u64,
) -> Result<Option<Value>, CodecError> {
    let default_desc = FieldDescriptor::default();
    let elem_desc = desc.element.as_deref().unwrap_or(&default_desc);
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let prev = elem_desc.byte_order.map(|o| r.swap_order(o));
        let item = decode_slot(r, shape, field, elem_kind, elem_desc, idx, record, ancestors);
        if let Some(o) = prev {
            r.swap_order(o);
        }
        if let Some(v) = item? {
            items.push(v);
        }
    }
    Ok(Some(Value::List(items)))
}

fn decode_integer(
    r: &mut ByteReader<'_>,
    kind: &Kind,
    length: Option<u64>,
) -> Result<Value, StreamError> {
    if kind.is_signed() {
        let raw = match length {
            Some(n) => r.read_int_x(n as usize)?,
            None => match kind {
                Kind::I8 => r.read_i8()? as i64,
                Kind::I16 => r.read_i16()? as i64,
                Kind::I32 => r.read_i32()? as i64,
                _ => r.read_i64()?,
            },
        };
        Ok(match kind {
            Kind::I8 => Value::I8(raw as i8),
            Kind::I16 => Value::I16(raw as i16),
            Kind::I32 => Value::I32(raw as i32),
            _ => Value::I64(raw),
        })
    } else {
        let raw = match length {
            Some(n) => r.read_uint_x(n as usize)?,
            None => match kind {
                Kind::U8 => r.read_u8()? as u64,
                Kind::U16 => r.read_u16()? as u64,
                Kind::U32 => r.read_u32()? as u64,
                _ => r.read_u64()?,
            },
        };
        Ok(match kind {
            Kind::U8 => Value::U8(raw as u8),
            Kind::U16 => Value::U16(raw as u16),
            Kind::U32 => Value::U32(raw as u32),
            _ => Value::U64(raw),
        })
    }
}

// ---- encode walk ----

fn encode_level(
    w: &mut ByteWriter,
    shape: &Shape,
    record: &Record,
    ancestors: &[Level<'_>],
) -> Result<(), CodecError> {
    for (idx, field) in shape.fields().iter().enumerate() {
        let desc = &field.descriptor;
        if desc.ignore {
            continue;
        }
        let value = field_value(record, field);
        let prev = desc.byte_order.map(|o| w.swap_order(o));
        let result = encode_slot(
            w, shape, &field.name, &field.kind, desc, idx, record, ancestors, &value,
        );
        if let Some(o) = prev {
            w.swap_order(o);
        }
        result?;
    }
    Ok(())
}

/// The field's value, or its zero/default when the record has none.
fn field_value(record: &Record, field: &Field) -> Value {
    record
        .get(&field.name)
        .cloned()
        .unwrap_or_else(|| default_for_kind(&field.kind))
}

fn default_for_kind(kind: &Kind) -> Value {
    match kind {
        Kind::U8 => Value::U8(0),
        Kind::U16 => Value::U16(0),
        Kind::U32 => Value::U32(0),
        Kind::U64 | Kind::Uint => Value::U64(0),
        Kind::I8 => Value::I8(0),
        Kind::I16 => Value::I16(0),
        Kind::I32 => Value::I32(0),
        Kind::I64 | Kind::Int => Value::I64(0),
        Kind::F32 => Value::F32(0.0),
        Kind::F64 => Value::F64(0.0),
        Kind::Bool => Value::U8(0),
        Kind::Str => Value::Str(String::new()),
        Kind::Bytes => Value::Bytes(Vec::new()),
        Kind::Slice(_) => Value::List(Vec::new()),
        Kind::Array(elem, n) => Value::List(vec![default_for_kind(elem); *n]),
        Kind::Struct(_) => Value::Struct(Record::new()),
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_slot(
    w: &mut ByteWriter,
    shape: &Shape,
    field: &str,
    kind: &Kind,
    desc: &FieldDescriptor,
    idx: usize,
    record: &Record,
    ancestors: &[Level<'_>],
    value: &Value,
) -> Result<(), CodecError> {
    if let Some(name) = desc.function.as_deref() {
        if is_builtin(name) {
            return encode_builtin(w, shape, field, kind, desc, idx, record, ancestors, name);
        }
        let func = find_encode_fn(shape, ancestors, name).ok_or_else(|| {
            CodecError::FunctionNotFound {
                shape: shape.name().to_string(),
                field: field.to_string(),
                name: name.to_string(),
                direction: "encode",
            }
        })?;
        return func(w, value);
    }

    match kind {
        Kind::U8
        | Kind::U16
        | Kind::U32
        | Kind::U64
        | Kind::I8
        | Kind::I16
        | Kind::I32
        | Kind::I64
        | Kind::Uint
        | Kind::Int => {
            let length = resolve_length(desc, shape, field, idx, record, ancestors)?;
            if matches!(kind, Kind::Uint | Kind::Int) && length.is_none() {
                return Err(missing_length(shape, field, kind));
            }
            encode_integer(w, kind, length, value)?;
            Ok(())
        }
        Kind::F32 => {
            w.write_f32(value.as_f32().unwrap_or(0.0))?;
            Ok(())
        }
        Kind::F64 => {
            w.write_f64(value.as_f64().unwrap_or(0.0))?;
            Ok(())
        }
        Kind::Bool => Err(unsupported(shape, field, "bool is reserved and not implemented")),
        Kind::Str => {
            // The clause is required for symmetry with decode; the write
            // itself emits the value's actual bytes.
            if desc.length.is_none() {
                return Err(missing_length(shape, field, kind));
            }
            w.write_bytes(value.as_str().unwrap_or("").as_bytes())?;
            Ok(())
        }
        Kind::Bytes => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .ok_or_else(|| missing_length(shape, field, kind))?;
            let bytes = value.as_bytes().unwrap_or(&[]);
            if bytes.len() as u64 != n {
                return Err(CodecError::LengthMismatch {
                    shape: shape.name().to_string(),
                    field: field.to_string(),
                    expected: n,
                    actual: bytes.len(),
                });
            }
            w.write_bytes(bytes)?;
            Ok(())
        }
        Kind::Slice(elem) => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .ok_or_else(|| missing_length(shape, field, kind))?;
            encode_elements(w, shape, field, elem, desc, idx, record, ancestors, value, n)
        }
        Kind::Array(elem, size) => {
            let n = resolve_length(desc, shape, field, idx, record, ancestors)?
                .unwrap_or(*size as u64);
            encode_elements(w, shape, field, elem, desc, idx, record, ancestors, value, n)
        }
        Kind::Struct(child) => {
            let child_record = match value {
                Value::Struct(m) => m,
                _ => {
                    return Err(CodecError::InvalidTarget {
                        shape: child.name().to_string(),
                    })
                }
            };
            let mut chain = ancestors.to_vec();
            chain.push(Level::partial(shape, record, idx));
            encode_level(w, child, child_record, &chain)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_elements(
    w: &mut ByteWriter,
    shape: &Shape,
    field: &str,
    elem_kind: &Kind,
    desc: &FieldDescriptor,
    idx: usize,
    record: &Record,
    ancestors: &[Level<'_>],
    value: &Value,
    count: u64,
) -> Result<(), CodecError> {
    let list = value.as_list().unwrap_or(&[]);
    if list.len() as u64 != count {
        return Err(CodecError::LengthMismatch {
            shape: shape.name().to_string(),
            field: field.to_string(),
            expected: count,
            actual: list.len(),
        });
    }
    let default_desc = FieldDescriptor::default();
    let elem_desc = desc.element.as_deref().unwrap_or(&default_desc);
    for item in list {
        let prev = elem_desc.byte_order.map(|o| w.swap_order(o));
        let result = encode_slot(
            w, shape, field, elem_kind, elem_desc, idx, record, ancestors, item,
        );
        if let Some(o) = prev {
            w.swap_order(o);
        }
        result?;
    }
    Ok(())
}

fn encode_integer(
    w: &mut ByteWriter,
    kind: &Kind,
    length: Option<u64>,
    value: &Value,
) -> Result<(), StreamError> {
    if kind.is_signed() {
        let v = value.as_i64().unwrap_or(0);
        match length {
            Some(n) => w.write_int_x(v, n as usize),
            None => match kind {
                Kind::I8 => w.write_i8(v as i8),
                Kind::I16 => w.write_i16(v as i16),
                Kind::I32 => w.write_i32(v as i32),
                _ => w.write_i64(v),
            },
        }
    } else {
        let v = value.as_u64().unwrap_or(0);
        match length {
            Some(n) => w.write_uint_x(v, n as usize),
            None => match kind {
                Kind::U8 => w.write_u8(v as u8),
                Kind::U16 => w.write_u16(v as u16),
                Kind::U32 => w.write_u32(v as u32),
                _ => w.write_u64(v),
            },
        }
    }
}

// ---- built-in length functions ----

#[allow(clippy::too_many_arguments)]
fn encode_builtin(
    w: &mut ByteWriter,
    shape: &Shape,
    field: &str,
    kind: &Kind,
    desc: &FieldDescriptor,
    idx: usize,
    record: &Record,
    ancestors: &[Level<'_>],
    name: &str,
) -> Result<(), CodecError> {
    if !kind.is_integer() {
        return Err(unsupported(
            shape,
            field,
            format!("{} requires an integer field, not {}", name, kind.name()),
        ));
    }
    let length = resolve_length(desc, shape, field, idx, record, ancestors)?;
    let width = match length {
        Some(n) => n,
        None => match kind.native_width() {
            Some(n) => n as u64,
            None => return Err(missing_length(shape, field, kind)),
        },
    };
    // The size pass sees every level as fully processed; a later field's
    // size may hinge on values the walk has not reached yet.
    let full_ancestors: Vec<Level<'_>> = ancestors
        .iter()
        .map(|l| Level::full(l.shape, l.values))
        .collect();
    let sum = level_size(shape, record, &full_ancestors)?;
    let value = if name == LENGTH_WITHOUT_SELF {
        sum.checked_sub(width).ok_or_else(|| {
            length_error(shape, field, ResolveError::Negative(sum as i64 - width as i64))
        })?
    } else {
        sum
    };
    encode_integer(w, kind, length, &Value::U64(value))?;
    Ok(())
}

/// Dry-run encoded size of one struct level, recursively, without touching
/// the stream. References resolve against the complete record at every
/// level: the size of a later field may hinge on a count field the walk has
/// not reached yet at the prefix field's position.
fn level_size(shape: &Shape, record: &Record, ancestors: &[Level<'_>]) -> Result<u64, CodecError> {
    let mut sum = 0u64;
    for field in shape.fields() {
        let value = field_value(record, field);
        sum += slot_size(
            shape,
            &field.name,
            &field.kind,
            &field.descriptor,
            record,
            ancestors,
            &value,
        )?;
    }
    Ok(sum)
}

fn slot_size(
    shape: &Shape,
    field: &str,
    kind: &Kind,
    desc: &FieldDescriptor,
    record: &Record,
    ancestors: &[Level<'_>],
    value: &Value,
) -> Result<u64, CodecError> {
    if desc.ignore {
        return Ok(0);
    }
    let length = match &desc.length {
        Some(expr) => {
            let current = Level::full(shape, record);
            Some(
                expr.resolve(&current, ancestors)
                    .map_err(|source| length_error(shape, field, source))?,
            )
        }
        None => None,
    };
    match kind {
        Kind::U8
        | Kind::U16
        | Kind::U32
        | Kind::U64
        | Kind::I8
        | Kind::I16
        | Kind::I32
        | Kind::I64
        | Kind::Uint
        | Kind::Int => match length.or_else(|| kind.native_width().map(|n| n as u64)) {
            Some(n) => Ok(n),
            None => Err(missing_length(shape, field, kind)),
        },
        Kind::F32 | Kind::F64 => {
            Ok(length.unwrap_or_else(|| kind.native_width().unwrap_or(0) as u64))
        }
        Kind::Bool => Err(unsupported(shape, field, "bool is reserved and not implemented")),
        Kind::Str => Ok(value.as_str().map(|s| s.len()).unwrap_or(0) as u64),
        Kind::Bytes => Ok(length
            .unwrap_or_else(|| value.as_bytes().map(|b| b.len()).unwrap_or(0) as u64)),
        Kind::Slice(elem) => {
            let list = value.as_list().unwrap_or(&[]);
            let count = length.unwrap_or(list.len() as u64);
            elements_size(shape, field, elem, desc, record, ancestors, list, count)
        }
        Kind::Array(elem, size) => {
            let list = value.as_list().unwrap_or(&[]);
            let count = length.unwrap_or(*size as u64);
            elements_size(shape, field, elem, desc, record, ancestors, list, count)
        }
        Kind::Struct(child) => {
            if let Some(n) = length {
                return Ok(n);
            }
            let empty = Record::new();
            let child_record = value.as_struct().unwrap_or(&empty);
            let mut chain = ancestors.to_vec();
            chain.push(Level::full(shape, record));
            level_size(child, child_record, &chain)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn elements_size(
    shape: &Shape,
    field: &str,
    elem_kind: &Kind,
    desc: &FieldDescriptor,
    record: &Record,
    ancestors: &[Level<'_>],
    list: &[Value],
    count: u64,
) -> Result<u64, CodecError> {
    let default_desc = FieldDescriptor::default();
    let elem_desc = desc.element.as_deref().unwrap_or(&default_desc);
    let default_value = default_for_kind(elem_kind);
    let mut sum = 0u64;
    for i in 0..count as usize {
        let v = list.get(i).unwrap_or(&default_value);
        sum += slot_size(shape, field, elem_kind, elem_desc, record, ancestors, v)?;
    }
    Ok(sum)
}

// ---- custom function lookup ----

fn find_decode_fn<'s>(
    shape: &'s Shape,
    ancestors: &[Level<'s>],
    name: &str,
) -> Option<&'s DecodeFn> {
    if let Some(f) = shape.transform(name).and_then(|t| t.decode.as_ref()) {
        return Some(f);
    }
    for level in ancestors.iter().rev() {
        if let Some(f) = level.shape.transform(name).and_then(|t| t.decode.as_ref()) {
            return Some(f);
        }
    }
    None
}

fn find_encode_fn<'s>(
    shape: &'s Shape,
    ancestors: &[Level<'s>],
    name: &str,
) -> Option<&'s EncodeFn> {
    if let Some(f) = shape.transform(name).and_then(|t| t.encode.as_ref()) {
        return Some(f);
    }
    for level in ancestors.iter().rev() {
        if let Some(f) = level.shape.transform(name).and_then(|t| t.encode.as_ref()) {
            return Some(f);
        }
    }
    None
}

// ---- length resolution ----

fn resolve_length(
    desc: &FieldDescriptor,
    shape: &Shape,
    field: &str,
    upto: usize,
    record: &Record,
    ancestors: &[Level<'_>],
) -> Result<Option<u64>, CodecError> {
    match &desc.length {
        None => Ok(None),
        Some(expr) => {
            let current = Level::partial(shape, record, upto);
            expr.resolve(&current, ancestors)
                .map(Some)
                .map_err(|source| length_error(shape, field, source))
        }
    }
}
