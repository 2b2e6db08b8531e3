//! # binshape — Tag-Driven Binary Struct Codec
//!
//! A declarative codec for binary protocols and file formats whose field
//! widths, repeat counts, and checksums are relationships between sibling
//! fields ("this count says how many of the next element follow", "this
//! prefix equals the encoded size of the message minus its own width").
//! One set of per-field tag descriptors drives both decoding and encoding,
//! which keeps the two directions symmetric by construction.
//!
//! ## Tag clauses
//!
//! - `len:<expr>` — byte width, byte count, or repeat count; a literal, a
//!   reference to an already-processed sibling/ancestor field, or `+ - * /`
//!   arithmetic over those (`len:DataLen/3`)
//! - `be` / `le` — byte-order override for this field and its directly
//!   nested struct
//! - `<Name>` — custom transform registered on the shape (or an enclosing
//!   shape), or one of the built-ins `Length` / `LengthWithoutSelf`
//! - `[<tag>]` — descriptor applied to each element of a slice/array field
//! - `-` — skip the field on both directions; it exists to be referenced
//!
//! ## Example
//!
//! ```
//! use binshape::{decode_le, encode_le, Kind, Shape, Value};
//!
//! let packet = Shape::builder("Packet")
//!     .field("Count", Kind::U8, "")
//!     .field("Items", Kind::Slice(Box::new(Kind::U16)), "len:Count")
//!     .build()
//!     .unwrap();
//!
//! let decoded = decode_le(&packet, &[0x02, 0x01, 0x00, 0x02, 0x00]).unwrap();
//! assert_eq!(decoded["Count"], Value::U8(2));
//! let encoded = encode_le(&packet, &decoded).unwrap();
//! assert_eq!(encoded, [0x02, 0x01, 0x00, 0x02, 0x00]);
//! ```
//!
//! Framing helpers (byte-stuffing with markers and a checksum trailer) live
//! in [`frame`]; the CRC-16 callbacks they pair with live in [`checksum`].

pub mod checksum;
pub mod codec;
pub mod expr;
pub mod frame;
pub mod shape;
pub mod stream;
pub mod tag;
pub mod value;

pub use codec::{
    decode_be, decode_le, decode_next, decode_next_into, encode_be, encode_le, encode_next,
    Codec, CodecError, Decoder, Encoder,
};
pub use expr::{ArithOp, LenExpr, ResolveError};
pub use frame::{FrameCodec, FrameError};
pub use shape::{Field, FieldDescriptor, Kind, Shape, ShapeBuilder, Transform};
pub use stream::{ByteReader, ByteWriter, Endianness, StreamError};
pub use value::{Record, Value};
