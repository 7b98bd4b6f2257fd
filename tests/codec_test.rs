//! Binary codec tests: golden encodings, truncation safety, block protocol
//! acceptance and limits, and failure classification.

use huckleberry::{Codec, Value, MAX_BLOCK_COUNT, MAX_BLOCK_SIZE};

fn binary_encode_pass(schema: &str, datum: &Value, expected: &[u8]) {
    let codec = Codec::new(schema).unwrap();
    let actual = codec.encode(datum).unwrap();
    assert_eq!(actual, expected, "schema: {schema}; datum: {datum:?}");
}

fn binary_decode_pass(schema: &str, expected: &Value, buf: &[u8]) {
    let codec = Codec::new(schema).unwrap();
    let (value, remaining) = codec.decode(buf).unwrap();
    // remaining ought to be empty because there is nothing left to decode
    assert_eq!(remaining.len(), 0, "schema: {schema}");
    assert_eq!(&value, expected, "schema: {schema}");
}

/// Bi-directional check: decode the buffer to the datum, encode the datum to
/// the buffer.
fn binary_codec_pass(schema: &str, datum: Value, buf: &[u8]) {
    binary_decode_pass(schema, &datum, buf);
    binary_encode_pass(schema, &datum, buf);
}

fn binary_decode_fail_short(schema: &str, buf: &[u8]) {
    let codec = Codec::new(schema).unwrap();
    let err = codec.decode(buf).unwrap_err();
    assert!(
        err.is_short_buffer(),
        "schema: {schema}; buf: {buf:?}; err: {err}"
    );
}

fn binary_decode_fail_malformed(schema: &str, buf: &[u8]) {
    let codec = Codec::new(schema).unwrap();
    let err = codec.decode(buf).unwrap_err();
    assert!(
        err.is_malformed(),
        "schema: {schema}; buf: {buf:?}; err: {err}"
    );
}

fn binary_encode_fail(schema: &str, datum: &Value) {
    let codec = Codec::new(schema).unwrap();
    let err = codec.encode(datum).unwrap_err();
    assert!(
        err.is_type_mismatch(),
        "schema: {schema}; datum: {datum:?}; err: {err}"
    );
}

/// Every proper prefix of a valid encoding decodes to a short-buffer error.
fn truncation_sweep(schema: &str, datum: Value) {
    let codec = Codec::new(schema).unwrap();
    let full = codec.encode(&datum).unwrap();
    for end in 0..full.len() {
        let prefix = &full[..end];
        let err = codec.decode(prefix).unwrap_err();
        assert!(
            err.is_short_buffer(),
            "schema: {schema}; prefix length {end}: {err}"
        );
    }
}

#[test]
fn test_null() {
    binary_codec_pass(r#""null""#, Value::Null, &[]);
}

#[test]
fn test_boolean() {
    binary_codec_pass(r#""boolean""#, Value::Boolean(false), &[0x00]);
    binary_codec_pass(r#""boolean""#, Value::Boolean(true), &[0x01]);
    binary_decode_fail_short(r#""boolean""#, &[]);
    binary_decode_fail_malformed(r#""boolean""#, &[0x02]);
}

#[test]
fn test_long() {
    binary_codec_pass(r#""long""#, Value::Long(0), &[0x00]);
    binary_codec_pass(r#""long""#, Value::Long(3), &[0x06]);
    binary_codec_pass(r#""long""#, Value::Long(-1), &[0x01]);
    binary_codec_pass(r#""long""#, Value::Long(-64), &[0x7f]);
    binary_codec_pass(r#""long""#, Value::Long(64), &[0x80, 0x01]);
    binary_codec_pass(
        r#""long""#,
        Value::Long(i64::MAX),
        &hex::decode("feffffffffffffffff01").unwrap(),
    );
    binary_codec_pass(
        r#""long""#,
        Value::Long(i64::MIN),
        &hex::decode("ffffffffffffffffff01").unwrap(),
    );
}

#[test]
fn test_long_decode_empty_buffer_leaves_input_unchanged() {
    let codec = Codec::new(r#""long""#).unwrap();
    let buf: &[u8] = &[];
    let err = codec.decode(buf).unwrap_err();
    assert!(err.is_short_buffer());
    assert!(buf.is_empty());
}

#[test]
fn test_long_decode_overlong_varint() {
    // 11 continuation bytes can never terminate a 64-bit varint
    binary_decode_fail_malformed(r#""long""#, &[0xff; 11]);
}

#[test]
fn test_int() {
    binary_codec_pass(r#""int""#, Value::Long(0), &[0x00]);
    binary_codec_pass(r#""int""#, Value::Long(1), &[0x02]);
    binary_codec_pass(r#""int""#, Value::Long(-2), &[0x03]);
    binary_codec_pass(r#""int""#, Value::Long(i32::MAX as i64), &hex::decode("feffffff0f").unwrap());
    binary_encode_fail(r#""int""#, &Value::Long(i64::from(i32::MAX) + 1));
    binary_encode_fail(r#""int""#, &Value::Long(i64::from(i32::MIN) - 1));
    // 5th byte carries bits beyond 32
    binary_decode_fail_malformed(r#""int""#, &[0xff, 0xff, 0xff, 0xff, 0x7f]);
}

#[test]
fn test_float_and_double() {
    binary_codec_pass(r#""float""#, Value::Double(3.5), &hex::decode("00006040").unwrap());
    binary_codec_pass(
        r#""double""#,
        Value::Double(std::f64::consts::E),
        &hex::decode("6957148b0abf0540").unwrap(),
    );
    binary_decode_fail_short(r#""float""#, &[0x00, 0x00, 0x60]);
    binary_decode_fail_short(r#""double""#, &[0x00; 7]);
}

#[test]
fn test_bytes_and_string() {
    binary_codec_pass(r#""bytes""#, Value::Bytes(vec![]), &[0x00]);
    binary_codec_pass(
        r#""bytes""#,
        Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
        &hex::decode("08deadbeef").unwrap(),
    );
    binary_codec_pass(
        r#""string""#,
        Value::String("hello".into()),
        b"\x0ahello",
    );
    // length says five, three present
    binary_decode_fail_short(r#""string""#, b"\x0ahel");
    // negative length
    binary_decode_fail_malformed(r#""bytes""#, &[0x03]);
    // invalid UTF-8 is malformed, not short
    binary_decode_fail_malformed(r#""string""#, &[0x04, 0xff, 0xfe]);
    binary_encode_fail(r#""string""#, &Value::Long(13));
}

#[test]
fn test_length_limit() {
    let long_codec = Codec::new(r#""long""#).unwrap();
    let oversized = long_codec.encode(&Value::Long(MAX_BLOCK_SIZE + 1)).unwrap();
    binary_decode_fail_malformed(r#""bytes""#, &oversized);
}

#[test]
fn test_fixed() {
    let schema = r#"{"type":"fixed","name":"F4","size":4}"#;
    binary_codec_pass(schema, Value::Bytes(vec![1, 2, 3, 4]), &[1, 2, 3, 4]);
    binary_decode_fail_short(schema, &[1, 2, 3]);
    binary_encode_fail(schema, &Value::Bytes(vec![1, 2, 3]));
    binary_encode_fail(schema, &Value::String("1234".into()));
}

#[test]
fn test_enum() {
    let schema = r#"{"type":"enum","name":"Season","symbols":["SPRING","SUMMER","FALL","WINTER"]}"#;
    binary_codec_pass(schema, Value::String("SPRING".into()), &[0x00]);
    binary_codec_pass(schema, Value::String("WINTER".into()), &[0x06]);
    // index 4 and index -1 are out of range
    binary_decode_fail_malformed(schema, &[0x08]);
    binary_decode_fail_malformed(schema, &[0x01]);
    binary_decode_fail_short(schema, &[]);
    binary_encode_fail(schema, &Value::String("MONSOON".into()));
    binary_encode_fail(schema, &Value::Long(0));
}

#[test]
fn test_array_golden_bytes() {
    let schema = r#"{"type":"array","items":"long"}"#;
    binary_codec_pass(
        schema,
        vec![1i64, 2, 3].into_iter().collect(),
        &[0x06, 0x02, 0x04, 0x06, 0x00],
    );
    binary_codec_pass(schema, Value::Array(vec![]), &[0x00]);
    binary_encode_fail(schema, &Value::Long(3));
}

#[test]
fn test_array_accepts_foreign_block_framings() {
    let schema = r#"{"type":"array","items":"long"}"#;
    // two one-item blocks
    binary_decode_pass(
        schema,
        &vec![1i64, 2].into_iter().collect(),
        &[0x02, 0x02, 0x02, 0x04, 0x00],
    );
    // negative-count block with a byte size to skip over
    binary_decode_pass(
        schema,
        &vec![1i64, 2].into_iter().collect(),
        &[0x03, 0x04, 0x02, 0x04, 0x00],
    );
}

#[test]
fn test_array_mixed_element_types_fail_at_first_bad_item() {
    let schema = r#"{"type":"array","items":"long"}"#;
    let datum = Value::Array(vec![Value::Long(1), Value::String("two".into())]);
    let codec = Codec::new(schema).unwrap();
    let err = codec.encode(&datum).unwrap_err();
    assert!(err.is_type_mismatch());
    assert!(err.to_string().contains("item 1"));
}

#[test]
fn test_map_golden_bytes() {
    let schema = r#"{"type":"map","values":"long"}"#;
    binary_codec_pass(
        schema,
        Value::record([("a", 1i64)]),
        &[0x02, 0x02, b'a', 0x02, 0x00],
    );
    binary_codec_pass(schema, Value::Map(Default::default()), &[0x00]);
    // negative-count block: one entry, block size four bytes
    binary_decode_pass(
        schema,
        &Value::record([("a", 1i64)]),
        &[0x01, 0x08, 0x02, b'a', 0x02, 0x00],
    );
    binary_encode_fail(schema, &Value::Array(vec![]));
}

#[test]
fn test_block_count_limits() {
    let schema = r#"{"type":"array","items":"long"}"#;
    let long_codec = Codec::new(r#""long""#).unwrap();

    let more_positive_than_max = long_codec.encode(&Value::Long(MAX_BLOCK_COUNT + 1)).unwrap();
    binary_decode_fail_malformed(schema, &more_positive_than_max);

    let mut more_negative_than_max = long_codec
        .encode(&Value::Long(-(MAX_BLOCK_COUNT + 1)))
        .unwrap();
    // negative count is followed by a block size on the wire
    more_negative_than_max = long_codec
        .encode_append(more_negative_than_max, &Value::Long(2))
        .unwrap();
    binary_decode_fail_malformed(schema, &more_negative_than_max);

    let most_negative = long_codec.encode(&Value::Long(i64::MIN)).unwrap();
    binary_decode_fail_malformed(schema, &most_negative);

    let mut oversized_block = long_codec.encode(&Value::Long(-1)).unwrap();
    oversized_block = long_codec
        .encode_append(oversized_block, &Value::Long(MAX_BLOCK_SIZE + 1))
        .unwrap();
    binary_decode_fail_malformed(schema, &oversized_block);
}

#[test]
fn test_record_golden_bytes() {
    let schema = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"long"}]}"#;
    binary_codec_pass(schema, Value::record([("a", 5i64)]), &[0x0a]);
}

#[test]
fn test_record_field_order_is_wire_order() {
    let schema = r#"{"type":"record","name":"R","fields":[
        {"name":"a","type":"long"},
        {"name":"b","type":"string"}
    ]}"#;
    // fields encode in declared order regardless of datum insertion order
    binary_encode_pass(
        schema,
        &Value::record([("b", Value::String("x".into())), ("a", Value::Long(1))]),
        &[0x02, 0x02, b'x'],
    );
    // and decode back in declared order
    let codec = Codec::new(schema).unwrap();
    let (value, _) = codec.decode(&[0x02, 0x02, b'x']).unwrap();
    let keys: Vec<&str> = value.as_map().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
}

#[test]
fn test_record_encode_failures() {
    let schema = r#"{"type":"record","name":"R","fields":[
        {"name":"a","type":"long"},
        {"name":"b","type":"string"}
    ]}"#;
    binary_encode_fail(schema, &Value::record([("a", 1i64)]));
    binary_encode_fail(schema, &Value::Long(1));

    let codec = Codec::new(schema).unwrap();
    let err = codec
        .encode(&Value::record([
            ("a", Value::Long(1)),
            ("b", Value::Long(2)),
        ]))
        .unwrap_err();
    assert!(err.is_type_mismatch());
    assert!(err.to_string().contains("field b"));
}

#[test]
fn test_union_golden_bytes() {
    let schema = r#"["null","long"]"#;
    binary_codec_pass(schema, Value::Null, &[0x00]);
    binary_codec_pass(schema, Value::Long(7), &[0x02, 0x0e]);
    binary_decode_fail_malformed(schema, &[0x04]);
    binary_decode_fail_short(schema, &[]);
    binary_encode_fail(schema, &Value::String("neither".into()));
}

#[test]
fn test_union_of_named_types() {
    let schema = r#"[
        "null",
        {"type":"enum","name":"Suit","symbols":["CLUB","HEART"]},
        {"type":"fixed","name":"Pair","size":2}
    ]"#;
    binary_codec_pass(schema, Value::String("HEART".into()), &[0x02, 0x02]);
    binary_codec_pass(schema, Value::Bytes(vec![7, 9]), &[0x04, 7, 9]);
    // three bytes match neither the fixed size nor anything else
    binary_encode_fail(schema, &Value::Bytes(vec![1, 2, 3]));
    // a string that is not a Suit symbol matches nothing
    binary_encode_fail(schema, &Value::String("JOKER".into()));
}

#[test]
fn test_truncation_safety_across_kinds() {
    truncation_sweep(r#""long""#, Value::Long(-1234567));
    truncation_sweep(r#""boolean""#, Value::Boolean(true));
    truncation_sweep(r#""float""#, Value::Double(1.25));
    truncation_sweep(r#""double""#, Value::Double(-0.5));
    truncation_sweep(r#""bytes""#, Value::Bytes(vec![1, 2, 3]));
    truncation_sweep(r#""string""#, Value::String("huckleberry".into()));
    truncation_sweep(
        r#"{"type":"fixed","name":"F8","size":8}"#,
        Value::Bytes(vec![0; 8]),
    );
    truncation_sweep(
        r#"{"type":"enum","name":"E","symbols":["A","B"]}"#,
        Value::String("B".into()),
    );
    truncation_sweep(
        r#"{"type":"array","items":"string"}"#,
        vec!["one", "two", "three"].into_iter().collect(),
    );
    truncation_sweep(
        r#"{"type":"map","values":"long"}"#,
        Value::record([("k1", 1i64), ("k2", 2i64)]),
    );
    truncation_sweep(r#"["null","string"]"#, Value::String("tail".into()));
    truncation_sweep(
        r#"{"type":"record","name":"R","fields":[
            {"name":"a","type":"long"},
            {"name":"b","type":{"type":"array","items":"long"}}
        ]}"#,
        Value::record([
            ("a", Value::Long(9)),
            ("b", vec![1i64, 2].into_iter().collect()),
        ]),
    );
}

#[test]
fn test_kitchen_sink_roundtrip() {
    let schema = r#"{"type":"record","name":"Sample","namespace":"demo","fields":[
        {"name":"id","type":"long"},
        {"name":"score","type":"double"},
        {"name":"label","type":["null","string"]},
        {"name":"tags","type":{"type":"array","items":"string"}},
        {"name":"attrs","type":{"type":"map","values":"int"}},
        {"name":"digest","type":{"type":"fixed","name":"Digest","size":4}},
        {"name":"state","type":{"type":"enum","name":"State","symbols":["NEW","DONE"]}}
    ]}"#;
    let codec = Codec::new(schema).unwrap();
    assert_eq!(codec.name(), "demo.Sample");

    let datum = Value::record([
        ("id", Value::Long(42)),
        ("score", Value::Double(0.75)),
        ("label", Value::String("answer".into())),
        ("tags", vec!["a", "b"].into_iter().collect()),
        ("attrs", Value::record([("depth", 3i64)])),
        ("digest", Value::Bytes(vec![0xca, 0xfe, 0xba, 0xbe])),
        ("state", Value::String("DONE".into())),
    ]);

    let encoded = codec.encode(&datum).unwrap();
    let (decoded, remaining) = codec.decode(&encoded).unwrap();
    assert!(remaining.is_empty());
    assert_eq!(decoded, datum);

    // the same record with a null label picks union branch 0
    let datum = Value::record([
        ("id", Value::Long(0)),
        ("score", Value::Double(0.0)),
        ("label", Value::Null),
        ("tags", Value::Array(vec![])),
        ("attrs", Value::Map(Default::default())),
        ("digest", Value::Bytes(vec![0; 4])),
        ("state", Value::String("NEW".into())),
    ]);
    let encoded = codec.encode(&datum).unwrap();
    let (decoded, remaining) = codec.decode(&encoded).unwrap();
    assert!(remaining.is_empty());
    assert_eq!(decoded, datum);
}

#[test]
fn test_decode_failure_returns_original_buffer() {
    let schema = r#"{"type":"array","items":"long"}"#;
    let codec = Codec::new(schema).unwrap();
    // count of one, then a truncated varint
    let buf: Vec<u8> = vec![0x02, 0x80];
    let err = codec.decode(&buf).unwrap_err();
    assert!(err.is_short_buffer());
    assert_eq!(buf, vec![0x02, 0x80]);
}
