//! Tests for the ARC-4 binary encoding rules

use avmc::arc4::{Arc4Value, decode, encode, static_size};
use avmc::wtypes::{Arc4Type, WType, arc4_address, arc4_byte, arc4_string};
use num_bigint::BigUint;
use quickcheck_macros::quickcheck;

fn bools(values: &[bool]) -> Arc4Value {
    Arc4Value::Sequence(values.iter().map(|&b| Arc4Value::Bool(b)).collect())
}

#[test]
fn test_twelve_true_bools_encode_to_fff0() {
    let wtype = Arc4Type::static_array(WType::Arc4(Arc4Type::Bool), 12, None).unwrap();
    let encoded = encode(&wtype, &bools(&[true; 12])).unwrap();
    assert_eq!(hex::encode_upper(&encoded), "FFF0");
}

#[test]
fn test_dynamic_bool_array_encodes_to_0003a0() {
    let wtype = Arc4Type::dynamic_array(WType::Arc4(Arc4Type::Bool), None).unwrap();
    let encoded = encode(&wtype, &bools(&[true, false, true])).unwrap();
    assert_eq!(hex::encode_upper(&encoded), "0003A0");
}

#[test]
fn test_string_encoding_has_length_prefix() {
    let value = Arc4Value::Sequence(
        "hi".bytes().map(|b| Arc4Value::UInt(BigUint::from(b))).collect(),
    );
    let encoded = encode(&arc4_string(), &value).unwrap();
    assert_eq!(encoded, [0x00, 0x02, b'h', b'i']);
    assert_eq!(decode(&arc4_string(), &encoded).unwrap(), value);
}

#[test]
fn test_address_is_32_raw_bytes() {
    let value = Arc4Value::Sequence(
        (0u8..32).map(|b| Arc4Value::UInt(BigUint::from(b))).collect(),
    );
    let encoded = encode(&arc4_address(), &value).unwrap();
    assert_eq!(encoded.len(), 32);
    assert_eq!(static_size(&arc4_address()), Some(32));
}

#[test]
fn test_tuple_with_dynamic_tail() {
    // (bool, string): 1 packed bool byte + 2-byte offset, then the tail
    let wtype = Arc4Type::tuple(
        vec![WType::Arc4(Arc4Type::Bool), WType::Arc4(arc4_string())],
        None,
    )
    .unwrap();
    let value = Arc4Value::Sequence(vec![
        Arc4Value::Bool(true),
        Arc4Value::Sequence(vec![Arc4Value::uint(b'x' as u64)]),
    ]);
    let encoded = encode(&wtype, &value).unwrap();
    assert_eq!(encoded, [0x80, 0x00, 0x03, 0x00, 0x01, b'x']);
    assert_eq!(decode(&wtype, &encoded).unwrap(), value);
}

#[test]
fn test_struct_encodes_like_its_tuple() {
    let fields = vec![
        ("a".to_string(), WType::Arc4(arc4_byte())),
        ("b".to_string(), WType::Arc4(Arc4Type::Bool)),
    ];
    let struct_type = Arc4Type::struct_type("Pair", fields, true, None).unwrap();
    let tuple_type = Arc4Type::tuple(
        vec![WType::Arc4(arc4_byte()), WType::Arc4(Arc4Type::Bool)],
        None,
    )
    .unwrap();
    let value = Arc4Value::Sequence(vec![Arc4Value::uint(7), Arc4Value::Bool(true)]);
    assert_eq!(
        encode(&struct_type, &value).unwrap(),
        encode(&tuple_type, &value).unwrap()
    );
}

#[quickcheck]
fn prop_uint64_round_trips(value: u64) -> bool {
    let wtype = Arc4Type::uint_n(64, None).unwrap();
    let encoded = encode(&wtype, &Arc4Value::uint(value)).unwrap();
    encoded.len() == 8 && decode(&wtype, &encoded).unwrap() == Arc4Value::uint(value)
}

#[quickcheck]
fn prop_bool_arrays_round_trip(values: Vec<bool>) -> bool {
    if values.len() > u16::MAX as usize {
        return true;
    }
    let wtype = Arc4Type::dynamic_array(WType::Arc4(Arc4Type::Bool), None).unwrap();
    let value = bools(&values);
    let encoded = encode(&wtype, &value).unwrap();
    decode(&wtype, &encoded).unwrap() == value
}

#[quickcheck]
fn prop_byte_arrays_round_trip(values: Vec<u8>) -> bool {
    if values.len() > u16::MAX as usize {
        return true;
    }
    let wtype = Arc4Type::dynamic_array(WType::Arc4(arc4_byte()), None).unwrap();
    let value = Arc4Value::Sequence(
        values
            .iter()
            .map(|b| Arc4Value::UInt(BigUint::from(*b)))
            .collect(),
    );
    let encoded = encode(&wtype, &value).unwrap();
    // count prefix + one byte per element
    encoded.len() == 2 + values.len() && decode(&wtype, &encoded).unwrap() == value
}

#[quickcheck]
fn prop_bool_array_size_is_bit_packed(len: u8) -> bool {
    let len = len as usize;
    let wtype = Arc4Type::static_array(WType::Arc4(Arc4Type::Bool), len as i64, None).unwrap();
    static_size(&wtype) == Some(len.div_ceil(8))
}
