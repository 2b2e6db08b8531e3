//! Struct shapes: the registration-time description of a structural type.
//!
//! A [`Shape`] is the ordered list of named, kinded fields with their parsed
//! tag descriptors, plus the registry of named custom transforms reachable
//! from that type. Shapes are built once via [`ShapeBuilder`] and shared
//! behind [`Arc`] so nested struct kinds and transform closures can hold them.

use crate::codec::CodecError;
use crate::expr::LenExpr;
use crate::stream::{ByteReader, ByteWriter, Endianness};
use crate::tag::parse_tag;
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field kind. Sized integers and floats carry their width in the kind;
/// `Uint`/`Int` are width-unspecified and require an explicit `len` clause.
/// `Bool` is reserved and fails loudly on both directions.
#[derive(Debug, Clone)]
pub enum Kind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Uint,
    Int,
    F32,
    F64,
    Bool,
    Str,
    Bytes,
    Slice(Box<Kind>),
    Array(Box<Kind>, usize),
    Struct(Arc<Shape>),
}

impl Kind {
    /// Intrinsic encoded width in bytes, for kinds that have one.
    pub(crate) fn native_width(&self) -> Option<usize> {
        match self {
            Kind::U8 | Kind::I8 => Some(1),
            Kind::U16 | Kind::I16 => Some(2),
            Kind::U32 | Kind::I32 | Kind::F32 => Some(4),
            Kind::U64 | Kind::I64 | Kind::F64 => Some(8),
            _ => None,
        }
    }

    pub(crate) fn is_integer(&self) -> bool {
        matches!(
            self,
            Kind::U8
                | Kind::U16
                | Kind::U32
                | Kind::U64
                | Kind::I8
                | Kind::I16
                | Kind::I32
                | Kind::I64
                | Kind::Uint
                | Kind::Int
        )
    }

    pub(crate) fn is_signed(&self) -> bool {
        matches!(self, Kind::I8 | Kind::I16 | Kind::I32 | Kind::I64 | Kind::Int)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kind::U8 => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::I8 => "i8",
            Kind::I16 => "i16",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::Uint => "uint",
            Kind::Int => "int",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::Bool => "bool",
            Kind::Str => "str",
            Kind::Bytes => "bytes",
            Kind::Slice(_) => "slice",
            Kind::Array(_, _) => "array",
            Kind::Struct(_) => "struct",
        }
    }
}

/// Parsed form of a field's tag. Structurally identical for decoding and
/// encoding; that symmetry is what keeps the two directions in step.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    /// Byte width (scalars), byte count (text/bytes) or repeat count
    /// (containers). Absent means "use the intrinsic width".
    pub length: Option<LenExpr>,
    /// Override for this field's own codec call and its directly nested
    /// struct; reverts afterwards.
    pub byte_order: Option<Endianness>,
    /// Custom transform name, or one of the reserved built-in length
    /// function names. A function always wins over the default kind codec.
    pub function: Option<String>,
    /// Skip this field on both directions; it exists only to be referenced.
    pub ignore: bool,
    /// Effective descriptor for each element of a slice/array field.
    pub element: Option<Box<FieldDescriptor>>,
}

#[derive(Debug)]
pub struct Field {
    pub name: String,
    pub kind: Kind,
    pub descriptor: FieldDescriptor,
}

/// Decode half of a custom transform: gets the stream and mutable access to
/// the owning struct's in-progress record. Returning `Some(v)` stores `v`
/// into the field; `None` means the transform stored state itself.
pub type DecodeFn =
    Box<dyn Fn(&mut ByteReader<'_>, &mut Record) -> Result<Option<Value>, CodecError> + Send + Sync>;

/// Encode half of a custom transform: gets the stream and the field's value.
pub type EncodeFn = Box<dyn Fn(&mut ByteWriter, &Value) -> Result<(), CodecError> + Send + Sync>;

/// A named per-field transform. Either half may be absent; a transform that
/// lacks the needed direction does not match and lookup continues up the
/// ancestor chain.
#[derive(Default)]
pub struct Transform {
    pub(crate) decode: Option<DecodeFn>,
    pub(crate) encode: Option<EncodeFn>,
}

impl Transform {
    pub fn new() -> Self {
        Transform::default()
    }

    pub fn decode(
        mut self,
        f: impl Fn(&mut ByteReader<'_>, &mut Record) -> Result<Option<Value>, CodecError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.decode = Some(Box::new(f));
        self
    }

    pub fn encode(
        mut self,
        f: impl Fn(&mut ByteWriter, &Value) -> Result<(), CodecError> + Send + Sync + 'static,
    ) -> Self {
        self.encode = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("decode", &self.decode.is_some())
            .field("encode", &self.encode.is_some())
            .finish()
    }
}

/// Ordered field list and transform registry for one structural type.
pub struct Shape {
    name: String,
    fields: Vec<Field>,
    transforms: HashMap<String, Transform>,
}

impl Shape {
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder {
            name: name.into(),
            fields: Vec::new(),
            transforms: HashMap::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn transform(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Shape`]. Tag strings are parsed as fields are added; the
/// first malformed tag is reported from [`ShapeBuilder::build`], naming the
/// field and the offending clause.
pub struct ShapeBuilder {
    name: String,
    fields: Vec<Field>,
    transforms: HashMap<String, Transform>,
    error: Option<CodecError>,
}

impl ShapeBuilder {
    pub fn field(mut self, name: impl Into<String>, kind: Kind, tag: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = name.into();
        if self.fields.iter().any(|f| f.name == name) {
            self.error = Some(CodecError::Tag {
                shape: self.name.clone(),
                field: name,
                detail: "duplicate field name".to_string(),
            });
            return self;
        }
        match parse_tag(tag) {
            Ok(descriptor) => self.fields.push(Field {
                name,
                kind,
                descriptor,
            }),
            Err(detail) => {
                self.error = Some(CodecError::Tag {
                    shape: self.name.clone(),
                    field: name,
                    detail,
                });
            }
        }
        self
    }

    pub fn transform(mut self, name: impl Into<String>, transform: Transform) -> Self {
        self.transforms.insert(name.into(), transform);
        self
    }

    pub fn build(self) -> Result<Arc<Shape>, CodecError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Arc::new(Shape {
            name: self.name,
            fields: self.fields,
            transforms: self.transforms,
        }))
    }
}
