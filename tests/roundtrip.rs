//! Integration tests: round-trip law, length references, built-in length
//! prefixes, ancestor fallback, and the concrete wire scenarios.

use binshape::{
    decode_be, decode_le, encode_be, encode_le, CodecError, Kind, Record, Shape, ShapeBuilder,
    Transform, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

fn telemetry_shape() -> Arc<Shape> {
    let position = Shape::builder("Position")
        .field("X", Kind::I32, "")
        .field("Y", Kind::I32, "")
        .build()
        .expect("build Position");
    Shape::builder("Telemetry")
        .field("Magic", Kind::Bytes, "len:2")
        .field("Flags", Kind::U8, "")
        .field("Count", Kind::U8, "")
        .field("Name", Kind::Str, "len:4")
        .field("Readings", Kind::Slice(Box::new(Kind::I16)), "len:Count")
        .field("Position", Kind::Struct(position), "")
        .field("Tail", Kind::Array(Box::new(Kind::U8), 3), "")
        .field("Big", Kind::U64, "")
        .field("Small", Kind::I8, "")
        .field("Ratio", Kind::F32, "")
        .field("Wide", Kind::F64, "")
        .build()
        .expect("build Telemetry")
}

fn telemetry_value() -> Record {
    let mut position = HashMap::new();
    position.insert("X".to_string(), Value::I32(-7));
    position.insert("Y".to_string(), Value::I32(40_000));
    let mut v = HashMap::new();
    v.insert("Magic".to_string(), Value::Bytes(vec![0xAB, 0xCD]));
    v.insert("Flags".to_string(), Value::U8(0x80));
    v.insert("Count".to_string(), Value::U8(3));
    v.insert("Name".to_string(), Value::Str("ping".to_string()));
    v.insert(
        "Readings".to_string(),
        Value::List(vec![Value::I16(-1), Value::I16(0), Value::I16(512)]),
    );
    v.insert("Position".to_string(), Value::Struct(position));
    v.insert(
        "Tail".to_string(),
        Value::List(vec![Value::U8(1), Value::U8(2), Value::U8(3)]),
    );
    v.insert("Big".to_string(), Value::U64(0x0102_0304_0506_0708));
    v.insert("Small".to_string(), Value::I8(-5));
    v.insert("Ratio".to_string(), Value::F32(1.5));
    v.insert("Wide".to_string(), Value::F64(-2.25));
    v
}

#[test]
fn round_trip_little_endian() {
    let shape = telemetry_shape();
    let value = telemetry_value();
    let encoded = encode_le(&shape, &value).expect("encode");
    let decoded = decode_le(&shape, &encoded).expect("decode");
    assert_eq!(decoded, value);
}

#[test]
fn round_trip_big_endian() {
    let shape = telemetry_shape();
    let value = telemetry_value();
    let encoded = encode_be(&shape, &value).expect("encode");
    let decoded = decode_be(&shape, &encoded).expect("decode");
    assert_eq!(decoded, value);
}

#[test]
fn length_reference_round_trips_count_field() {
    let shape = Shape::builder("Packet")
        .field("N", Kind::U8, "")
        .field("Items", Kind::Slice(Box::new(Kind::U16)), "len:N")
        .build()
        .expect("build");
    let data = [0x03, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00];
    let decoded = decode_le(&shape, &data).expect("decode");
    assert_eq!(decoded["N"], Value::U8(3));
    assert_eq!(
        decoded["Items"],
        Value::List(vec![Value::U16(1), Value::U16(2), Value::U16(3)])
    );
    let encoded = encode_le(&shape, &decoded).expect("encode");
    assert_eq!(encoded, data);
}

#[test]
fn slice_count_mismatch_is_rejected() {
    let shape = Shape::builder("Packet")
        .field("N", Kind::U8, "")
        .field("Items", Kind::Slice(Box::new(Kind::U16)), "len:N")
        .build()
        .expect("build");
    let mut value = HashMap::new();
    value.insert("N".to_string(), Value::U8(3));
    value.insert("Items".to_string(), Value::List(vec![Value::U16(1)]));
    let e = encode_le(&shape, &value).expect_err("count mismatch");
    assert!(matches!(
        e,
        CodecError::LengthMismatch { expected: 3, actual: 1, .. }
    ));
}

#[test]
fn builtin_length_matches_measured_size() {
    let shape = Shape::builder("Framed")
        .field("Len", Kind::U32, "Length")
        .field("Kind", Kind::U8, "")
        .field("Payload", Kind::Bytes, "len:5")
        .build()
        .expect("build");
    let mut value = HashMap::new();
    value.insert("Kind".to_string(), Value::U8(7));
    value.insert(
        "Payload".to_string(),
        Value::Bytes(vec![1, 2, 3, 4, 5]),
    );
    let encoded = encode_le(&shape, &value).expect("encode");
    assert_eq!(encoded.len(), 10);
    let decoded = decode_le(&shape, &encoded).expect("decode");
    // The prefix includes its own width and is read back, not recomputed.
    assert_eq!(decoded["Len"], Value::U32(10));
}

#[test]
fn builtin_length_without_self_excludes_own_width() {
    let shape = Shape::builder("Framed")
        .field("Len", Kind::U16, "len:2,LengthWithoutSelf")
        .field("Payload", Kind::Bytes, "len:4")
        .build()
        .expect("build");
    let mut value = HashMap::new();
    value.insert("Payload".to_string(), Value::Bytes(vec![9, 9, 9, 9]));
    let encoded = encode_le(&shape, &value).expect("encode");
    assert_eq!(encoded.len(), 6);
    assert_eq!(&encoded[..2], [0x04, 0x00]);
}

#[test]
fn ancestor_fallback_finds_enclosing_transform() {
    let inner = Shape::builder("Inner")
        .field("Scaled", Kind::F64, "len:2,Half")
        .build()
        .expect("build");
    let outer = Shape::builder("Outer")
        .field("Header", Kind::U8, "")
        .field("Inner", Kind::Struct(inner), "")
        .transform(
            "Half",
            Transform::new()
                .decode(|r, _own| Ok(Some(Value::F64(r.read_u16()? as f64 / 2.0))))
                .encode(|w, v| {
                    w.write_u16((v.as_f64().unwrap_or(0.0) * 2.0) as u16)?;
                    Ok(())
                }),
        )
        .build()
        .expect("build");

    let decoded = decode_le(&outer, &[0x01, 0x0A, 0x00]).expect("decode");
    let inner_rec = decoded["Inner"].as_struct().expect("struct");
    assert_eq!(inner_rec["Scaled"], Value::F64(5.0));

    let encoded = encode_le(&outer, &decoded).expect("encode");
    assert_eq!(encoded, [0x01, 0x0A, 0x00]);
}

#[test]
fn ignored_field_never_touches_the_wire() {
    let shape = Shape::builder("S")
        .field("Hidden", Kind::U32, "-")
        .field("Visible", Kind::U8, "")
        .build()
        .expect("build");

    let mut value = HashMap::new();
    value.insert("Hidden".to_string(), Value::U32(42));
    value.insert("Visible".to_string(), Value::U8(9));
    let encoded = encode_le(&shape, &value).expect("encode");
    assert_eq!(encoded, [0x09]);

    let decoded = decode_le(&shape, &encoded).expect("decode");
    assert_eq!(decoded.get("Hidden"), None);
    assert_eq!(decoded["Visible"], Value::U8(9));
}

// ==================== Concrete scenario A ====================
//
// Mixed fixed/variable-width traffic-signal frame: decode the captured
// little-endian bytes and re-encode them to the identical sequence. The
// nested message carries a LengthWithoutSelf prefix, custom fixed-point
// float transforms resolved through the ancestor chain, and doubly nested
// counted containers.

fn light_frame_shape() -> Arc<Shape> {
    let status = Shape::builder("LightStatus")
        .field("ID", Kind::U8, "")
        .field("Type", Kind::U8, "")
        .field("Color", Kind::U8, "")
        .field("RemainingTime", Kind::U8, "")
        .build()
        .expect("build LightStatus");
    let entrance = Shape::builder("EntranceLight")
        .field("InDir", Kind::U16, "")
        .field("LightCount", Kind::U8, "len:1")
        .field("Status", Kind::Slice(Box::new(Kind::Struct(status))), "len:LightCount")
        .build()
        .expect("build EntranceLight");
    let lights = Shape::builder("LightsMessage")
        .field("Length", Kind::U16, "len:2,LengthWithoutSelf")
        .field("Lon", Kind::F64, "len:4,Int32To10e6Float")
        .field("Lat", Kind::F64, "len:4,Int32To10e6Float")
        .field("Height", Kind::U16, "len:2")
        .field("CrossInCount", Kind::U8, "len:1")
        .field("InLights", Kind::Slice(Box::new(Kind::Struct(entrance))), "len:CrossInCount")
        .build()
        .expect("build LightsMessage");
    Shape::builder("LightFrame")
        .field("LinkCode", Kind::U16, "len:2")
        .field("SenderAdCode", Kind::U32, "len:3")
        .field("SenderType", Kind::U16, "len:2")
        .field("SenderNumber", Kind::U16, "len:2")
        .field("ReceiverAdCode", Kind::U32, "len:3")
        .field("ReceiveType", Kind::U16, "len:2")
        .field("ReceiverNumber", Kind::U16, "len:2")
        .field("TimeStamp", Kind::U32, "len:4")
        .field("TimeStampReserve", Kind::U16, "len:2")
        .field("TTL", Kind::U8, "len:1")
        .field("Version", Kind::U8, "len:1")
        .field("Operation", Kind::U8, "len:1")
        .field("ObjectName", Kind::U8, "len:1")
        .field("ObjectType", Kind::U8, "len:1")
        .field("Signature", Kind::U8, "len:1")
        .field("Reserve", Kind::Bytes, "len:3")
        .field("LightsMessage", Kind::Struct(lights), "")
        .field("Crc", Kind::U16, "len:2,be")
        .transform(
            "Int32To10e6Float",
            Transform::new()
                .decode(|r, _own| Ok(Some(Value::F64(r.read_i32()? as f64 / 1_000_000.0))))
                .encode(|w, v| {
                    w.write_i32((v.as_f64().unwrap_or(0.0) * 1_000_000.0) as i32)?;
                    Ok(())
                }),
        )
        .build()
        .expect("build LightFrame")
}

#[test]
fn scenario_light_frame_round_trips_byte_for_byte() {
    let data: [u8; 68] = [
        0x05, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x50, 0xff,
        0xff, 0xa2, 0x12, 0xef, 0x60, 0x00, 0x00, 0xff, 0x10, 0x87, 0x03, 0x01, 0x00, 0x00, 0x00,
        0x00, 0x21, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x02, 0x5a,
        0x00, 0x02, 0x06, 0x00, 0x25, 0x19, 0x02, 0x00, 0x25, 0x19, 0x0e, 0x01, 0x02, 0x08, 0x00,
        0x25, 0x19, 0x04, 0x00, 0x25, 0x19, 0x27, 0x99,
    ];
    let shape = light_frame_shape();

    let decoded = decode_le(&shape, &data).expect("decode");
    assert_eq!(decoded["LinkCode"], Value::U16(5));
    assert_eq!(decoded["Crc"], Value::U16(0x2799));
    let msg = decoded["LightsMessage"].as_struct().expect("struct");
    assert_eq!(msg["Length"], Value::U16(33));
    assert_eq!(msg["CrossInCount"], Value::U8(2));
    let in_lights = msg["InLights"].as_list().expect("list");
    assert_eq!(in_lights.len(), 2);
    let first = in_lights[0].as_struct().expect("struct");
    assert_eq!(first["InDir"], Value::U16(0x005a));
    assert_eq!(first["Status"].as_list().map(|s| s.len()), Some(2));

    let encoded = encode_le(&shape, &decoded).expect("encode");
    assert_eq!(encoded, data);
}

// ==================== Concrete scenario B ====================
//
// A statistics record whose only populated fields are the road count and two
// zero-valued road details. The Length-tagged prefix must equal the record's
// full encoded size: 2 (prefix) + 7 + 2 + 1 + 2*39 = 90.

fn road_detail_shape() -> Arc<Shape> {
    fn tenth(b: ShapeBuilder, name: &str) -> ShapeBuilder {
        b.field(name, Kind::F64, "len:2,Uint16To10e1Float")
    }
    let mut b = Shape::builder("RoadDetail").field("LaneID", Kind::U8, "");
    for name in ["HeadTime", "BodyTime", "Speed85p", "TimeOcc"] {
        b = tenth(b, name);
    }
    b = b.field("Car1Flow", Kind::U16, "");
    b = tenth(b, "Car1Speed");
    b = tenth(b, "Car1Occ");
    b = b.field("Car2Flow", Kind::U16, "");
    b = tenth(b, "Car2Speed");
    b = tenth(b, "Car2Occ");
    b = b.field("Car3Flow", Kind::U16, "");
    b = tenth(b, "Car3Speed");
    b = tenth(b, "Car3Occ");
    b.field("MaxVehicleQueueLength", Kind::U16, "")
        .field("MaxVehicleQueueCount", Kind::U16, "")
        .field("Reserved", Kind::Array(Box::new(Kind::U8), 8), "")
        .build()
        .expect("build RoadDetail")
}

fn statistics_shape() -> Arc<Shape> {
    Shape::builder("StatisticsData")
        .field("Len", Kind::U16, "len:2,Length")
        .field("Time", Kind::Bytes, "len:7,Time")
        .field("CollectionCycle", Kind::U16, "")
        .field("RoadCount", Kind::U8, "")
        .field("Content", Kind::Slice(Box::new(Kind::Struct(road_detail_shape()))), "len:RoadCount")
        .transform(
            "Time",
            Transform::new()
                .decode(|r, _own| Ok(Some(Value::Bytes(r.read_bytes(7)?))))
                .encode(|w, v| {
                    let mut b = v.as_bytes().unwrap_or(&[]).to_vec();
                    b.resize(7, 0);
                    w.write_bytes(&b)?;
                    Ok(())
                }),
        )
        .transform(
            "Uint16To10e1Float",
            Transform::new()
                .decode(|r, _own| Ok(Some(Value::F64(r.read_u16()? as f64 / 10.0))))
                .encode(|w, v| {
                    w.write_u16((v.as_f64().unwrap_or(0.0) * 10.0) as u16)?;
                    Ok(())
                }),
        )
        .build()
        .expect("build StatisticsData")
}

#[test]
fn scenario_statistics_length_prefix_is_90() {
    let shape = statistics_shape();
    let mut value = HashMap::new();
    value.insert("RoadCount".to_string(), Value::U8(2));
    value.insert(
        "Content".to_string(),
        Value::List(vec![
            Value::Struct(HashMap::new()),
            Value::Struct(HashMap::new()),
        ]),
    );
    let encoded = encode_le(&shape, &value).expect("encode");
    assert_eq!(encoded.len(), 90);
    assert_eq!(encoded[0], 90);
    assert_eq!(encoded[1], 0);

    // The road-detail transforms are registered on the enclosing shape and
    // found through the ancestor chain while sizing and encoding elements.
    let decoded = decode_le(&shape, &encoded).expect("decode");
    assert_eq!(decoded["Len"], Value::U16(90));
    assert_eq!(decoded["RoadCount"], Value::U8(2));
}

// ==================== Concrete scenario C ====================

#[test]
fn scenario_string_without_len_fails_both_directions() {
    let shape = Shape::builder("S")
        .field("Name", Kind::Str, "")
        .build()
        .expect("build");

    let e = decode_le(&shape, b"abcd").expect_err("decode must fail");
    assert!(matches!(e, CodecError::MissingLength { kind: "str", .. }));

    let mut value = HashMap::new();
    value.insert("Name".to_string(), Value::Str("abcd".to_string()));
    let e = encode_le(&shape, &value).expect_err("encode must fail");
    assert!(matches!(e, CodecError::MissingLength { kind: "str", .. }));
}
