//! PNG chunk walker: an ordinary client of the shape codec.
//!
//! Portable Network Graphics (PNG) Specification: https://www.w3.org/TR/PNG/
//!
//! Demonstrates the open-ended chunk loop (read until end of stream), the
//! seeded ignore-field pattern (`len:DataLen/3` palettes), and the
//! remaining-length side channel (null-terminated iTXt keywords decrementing
//! `DataLen` so the trailing text can use `len:DataLen-2`).

use anyhow::Context;
use binshape::{
    decode_next, decode_next_into, Codec, Endianness, Kind, Record, Shape, Transform, Value,
};
use std::sync::Arc;

fn build_png_shape() -> Result<Arc<Shape>, binshape::CodecError> {
    let point = Shape::builder("Point")
        .field("X", Kind::I32, "")
        .field("Y", Kind::I32, "")
        .build()?;

    let rgb = Shape::builder("RGB")
        .field("R", Kind::I8, "")
        .field("G", Kind::I8, "")
        .field("B", Kind::I8, "")
        .build()?;

    // Seeded by ReadChunkData with the outer chunk length; each palette
    // entry is three bytes.
    let palette = Shape::builder("PaletteData")
        .field("DataLen", Kind::I32, "-")
        .field("Entries", Kind::Slice(Box::new(Kind::Struct(rgb))), "len:DataLen/3")
        .build()?;

    let chromatic = Shape::builder("ChromaticData")
        .field("White", Kind::Struct(point.clone()), "")
        .field("Red", Kind::Struct(point.clone()), "")
        .field("Green", Kind::Struct(point.clone()), "")
        .field("Blue", Kind::Struct(point.clone()), "")
        .build()?;

    let physical = Shape::builder("PhysicalPixelData")
        .field("X", Kind::I32, "")
        .field("Y", Kind::I32, "")
        .field("Unit", Kind::I8, "")
        .build()?;

    let text = Shape::builder("InternationalTextData")
        .field("DataLen", Kind::I32, "-")
        .field("Keyword", Kind::Str, "NullTerminatedString")
        .field("CompressionFlag", Kind::U8, "")
        .field("CompressionMethod", Kind::U8, "")
        .field("LanguageTag", Kind::Str, "NullTerminatedString")
        .field("TranslatedKeyword", Kind::Str, "NullTerminatedString")
        // DataLen minus CompressionFlag and CompressionMethod.
        .field("Text", Kind::Str, "len:DataLen-2")
        .transform(
            "NullTerminatedString",
            Transform::new().decode(|r, own| {
                let mut bytes = Vec::new();
                let mut consumed: i64 = 0;
                loop {
                    let b = match r.read_byte() {
                        Ok(b) => b,
                        Err(e) if e.is_eof() => break,
                        Err(e) => return Err(e.into()),
                    };
                    consumed += 1;
                    if b == 0 {
                        break;
                    }
                    bytes.push(b);
                }
                let remaining = own.get("DataLen").and_then(Value::as_i64).unwrap_or(0);
                own.insert("DataLen".to_string(), Value::I32((remaining - consumed) as i32));
                Ok(Some(Value::Str(String::from_utf8_lossy(&bytes).into_owned())))
            }),
        )
        .build()?;

    let ihdr_data = Shape::builder("IHDRData")
        .field("Width", Kind::I32, "")
        .field("Height", Kind::I32, "")
        .field("BitDepth", Kind::I8, "")
        .field("ColorType", Kind::I8, "")
        .field("CompressionMethod", Kind::I8, "")
        .field("FilterMethod", Kind::I8, "")
        .field("InterlaceMethod", Kind::I8, "")
        .build()?;

    let ihdr = Shape::builder("IHDR")
        .field("Len", Kind::I32, "")
        .field("Type", Kind::Str, "len:4")
        .field("Data", Kind::Struct(ihdr_data), "")
        .field("CRC", Kind::Bytes, "len:4")
        .build()?;

    let chunk = {
        let palette = palette.clone();
        let chromatic = chromatic.clone();
        let physical = physical.clone();
        let text = text.clone();
        Shape::builder("Chunk")
            .field("Len", Kind::I32, "")
            .field("Type", Kind::Str, "len:4")
            .field("Data", Kind::Bytes, "ReadChunkData")
            .field("CRC", Kind::Bytes, "len:4")
            .transform(
                "ReadChunkData",
                Transform::new().decode(move |r, own| {
                    let len = own.get("Len").and_then(Value::as_i64).unwrap_or(0);
                    let kind = own
                        .get("Type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    match kind.as_str() {
                        "PLTE" => {
                            let mut rec = Record::new();
                            rec.insert("DataLen".to_string(), Value::I32(len as i32));
                            decode_next_into(r, &palette, &mut rec)?;
                            Ok(Some(Value::Struct(rec)))
                        }
                        "cHRM" => Ok(Some(Value::Struct(decode_next(r, &chromatic)?))),
                        "gAMA" => Ok(Some(Value::I32(r.read_i32()?))),
                        "pHYs" => Ok(Some(Value::Struct(decode_next(r, &physical)?))),
                        "iTXt" => {
                            let mut rec = Record::new();
                            rec.insert("DataLen".to_string(), Value::I32(len as i32));
                            decode_next_into(r, &text, &mut rec)?;
                            Ok(Some(Value::Struct(rec)))
                        }
                        // IDAT, IEND and others: keep the raw bytes.
                        _ => Ok(Some(Value::Bytes(r.read_bytes(len as usize)?))),
                    }
                }),
            )
            .build()?
    };

    let png = {
        let chunk = chunk.clone();
        Shape::builder("PNG")
            // Magic: 0x89 0x50 0x4E 0x47 0x0D 0x0A 0x1A 0x0A
            .field("Header", Kind::Bytes, "len:8")
            .field("IHDR", Kind::Struct(ihdr), "")
            .field("Chunks", Kind::Slice(Box::new(Kind::Struct(chunk.clone()))), "ReadChunks")
            .transform(
                "ReadChunks",
                Transform::new().decode(move |r, _own| {
                    let mut chunks = Vec::new();
                    loop {
                        match decode_next(r, &chunk) {
                            Ok(rec) => chunks.push(Value::Struct(rec)),
                            Err(e) if e.is_eof() => break,
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(Some(Value::List(chunks)))
                }),
            )
            .build()?
    };

    Ok(png)
}

fn color_type_name(t: i64) -> &'static str {
    match t {
        0 => "Greyscale",
        2 => "Truecolor",
        3 => "Indexed",
        4 => "Greyscale with alpha",
        6 => "Truecolor with alpha",
        _ => "Invalid",
    }
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: decode_png <file.png>")?;
    let data = std::fs::read(&path).with_context(|| format!("read {}", path))?;

    let shape = build_png_shape()?;
    let codec = Codec::new(Endianness::Big);
    let png = codec.decode(&shape, &data)?;

    const MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let header = png.get("Header").and_then(Value::as_bytes).unwrap_or(&[]);
    if header != &MAGIC[..] {
        anyhow::bail!("{}: not a PNG (bad magic {:02x?})", path, header);
    }

    if let Some(ihdr) = png.get("IHDR").and_then(Value::as_struct) {
        if let Some(d) = ihdr.get("Data").and_then(Value::as_struct) {
            let width = d.get("Width").and_then(Value::as_i64).unwrap_or(0);
            let height = d.get("Height").and_then(Value::as_i64).unwrap_or(0);
            let depth = d.get("BitDepth").and_then(Value::as_i64).unwrap_or(0);
            let color = d.get("ColorType").and_then(Value::as_i64).unwrap_or(0);
            println!(
                "{}: {}x{} {}-bit {}",
                path,
                width,
                height,
                depth,
                color_type_name(color)
            );
        }
    }

    for chunk in png.get("Chunks").and_then(Value::as_list).unwrap_or(&[]) {
        let Some(c) = chunk.as_struct() else { continue };
        let kind = c.get("Type").and_then(Value::as_str).unwrap_or("????");
        let len = c.get("Len").and_then(Value::as_i64).unwrap_or(0);
        match c.get("Data") {
            Some(Value::Struct(data)) => println!("  {} ({} bytes): {:?}", kind, len, data),
            Some(Value::I32(v)) => println!("  {} ({} bytes): {}", kind, len, v),
            _ => println!("  {} ({} bytes)", kind, len),
        }
    }

    Ok(())
}
