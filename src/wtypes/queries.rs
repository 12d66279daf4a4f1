//! Derived queries over the wire-type universe, plus the literal validation
//! helpers used when checking address / bytes constants.

use base32::Alphabet;
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha512_256};

use crate::error::{CodeError, InternalError};
use crate::source::SourceLocation;
use crate::wtypes::{
    ADDRESS_CHECKSUM_LENGTH, Arc4Type, AvmType, ENCODED_ADDRESS_LENGTH, MAX_BYTES_LENGTH,
    PUBLIC_KEY_HASH_LENGTH, WType, arc4_dynamic_bytes, arc4_string, arc4_uint_n_decoding_to,
};

/// The storage slot type a persisted value of this wtype occupies.
///
/// Fails with a user-directed error for ephemeral types and for aggregates
/// that have no scalar representation.
pub fn persistable_stack_type(
    wtype: &WType,
    location: Option<SourceLocation>,
) -> Result<AvmType, CodeError> {
    if wtype.is_ephemeral() {
        return Err(CodeError::new(
            "ephemeral types (such as transaction related types) are not suitable for storage",
            location,
        ));
    }
    wtype
        .scalar_type()
        .ok_or_else(|| CodeError::new("type is not suitable for storage", location))
}

/// Reference types are passed to ABI methods by foreign-array index
pub fn is_reference_type(wtype: &WType) -> bool {
    matches!(wtype, WType::Asset | WType::Account | WType::Application)
}

/// Whether a wtype may appear in an ARC-4 method argument list
pub fn is_arc4_argument_type(wtype: &WType) -> bool {
    is_reference_type(wtype)
        || matches!(wtype, WType::Arc4(_) | WType::GroupTransaction(_))
}

/// Whether a non-ARC-4 type has a canonical ARC-4 equivalent
pub fn has_arc4_equivalent_type(wtype: &WType) -> bool {
    match wtype {
        WType::Bool | WType::Uint64 | WType::Bytes | WType::BigUInt | WType::String => true,
        WType::Tuple(tuple) => tuple.types.iter().all(|t| {
            (has_arc4_equivalent_type(t) || t.is_arc4()) && !matches!(t, WType::Tuple(_))
        }),
        _ => false,
    }
}

/// The canonical AVM→ARC-4 mapping
pub fn avm_to_arc4_equivalent_type(
    wtype: &WType,
    location: Option<SourceLocation>,
) -> Result<Arc4Type, InternalError> {
    match wtype {
        WType::Bool => Ok(Arc4Type::Bool),
        WType::Uint64 => arc4_uint_n_decoding_to(64, wtype, location),
        WType::BigUInt => arc4_uint_n_decoding_to(512, wtype, location),
        WType::Bytes => Ok(arc4_dynamic_bytes()),
        WType::String => Ok(arc4_string()),
        WType::Tuple(tuple) => {
            let mut types = Vec::with_capacity(tuple.types.len());
            for t in &tuple.types {
                let arc4 = match t.as_arc4() {
                    Some(arc4) => arc4.clone(),
                    None => avm_to_arc4_equivalent_type(t, location)?,
                };
                types.push(WType::Arc4(arc4));
            }
            Arc4Type::tuple(types, location)
                .map_err(|e| InternalError::new(e.message, location))
        }
        other => Err(InternalError::new(
            format!("{} does not have an ARC-4 equivalent type", other.name()),
            location,
        )),
    }
}

/// Check that `s` is valid RFC-4648 base32 and decodes within the AVM bytes
/// limit
pub fn valid_base32(s: &str) -> bool {
    let unpadded = s.trim_end_matches('=');
    match base32::decode(Alphabet::Rfc4648 { padding: false }, unpadded) {
        Some(value) => value.len() <= MAX_BYTES_LENGTH,
        None => false,
    }
}

/// Check that `s` is valid base16 and decodes within the AVM bytes limit
pub fn valid_base16(s: &str) -> bool {
    match hex::decode(s) {
        Ok(value) => value.len() <= MAX_BYTES_LENGTH,
        Err(_) => false,
    }
}

/// Check that `s` is valid base64 and decodes within the AVM bytes limit
pub fn valid_base64(s: &str) -> bool {
    match general_purpose::STANDARD.decode(s) {
        Ok(value) => value.len() <= MAX_BYTES_LENGTH,
        Err(_) => false,
    }
}

/// Check that `address` is a valid address with checksum: 58 characters of
/// base32, decoding to 36 bytes, whose final 4 bytes equal the last 4 bytes
/// of SHA-512/256 of the first 32.
pub fn valid_address(address: &str) -> bool {
    if address.len() != ENCODED_ADDRESS_LENGTH {
        return false;
    }
    let Some(address_bytes) = base32::decode(Alphabet::Rfc4648 { padding: false }, address) else {
        return false;
    };
    if address_bytes.len() != PUBLIC_KEY_HASH_LENGTH + ADDRESS_CHECKSUM_LENGTH {
        return false;
    }
    let (public_key_hash, check_sum) = address_bytes.split_at(PUBLIC_KEY_HASH_LENGTH);
    let hash = Sha512_256::digest(public_key_hash);
    check_sum == &hash[hash.len() - ADDRESS_CHECKSUM_LENGTH..]
}

#[cfg(test)]
mod tests {
    use super::*;

    // deliberately longer than the 58 characters an address must have
    const OVERLONG_ADDRESS: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn encode_address(public_key: &[u8; 32]) -> String {
        let hash = Sha512_256::digest(public_key);
        let mut full = public_key.to_vec();
        full.extend_from_slice(&hash[hash.len() - 4..]);
        base32::encode(Alphabet::Rfc4648 { padding: false }, &full)
    }

    #[test]
    fn test_valid_address_roundtrip() {
        let addr = encode_address(&[0u8; 32]);
        assert_eq!(addr.len(), 58);
        assert!(valid_address(&addr));

        let addr = encode_address(&[0xAB; 32]);
        assert!(valid_address(&addr));
    }

    #[test]
    fn test_invalid_address_checksum() {
        let mut addr = encode_address(&[7u8; 32]);
        // corrupt a character inside the checksum region
        let last = addr.pop().unwrap();
        addr.push(if last == 'A' { 'B' } else { 'A' });
        assert!(!valid_address(&addr));
    }

    #[test]
    fn test_invalid_address_length() {
        assert!(!valid_address(""));
        assert!(!valid_address("AAAA"));
        assert!(!valid_address(OVERLONG_ADDRESS));
    }

    #[test]
    fn test_persistable() {
        assert_eq!(
            persistable_stack_type(&WType::Uint64, None).unwrap(),
            AvmType::Uint64
        );
        assert_eq!(
            persistable_stack_type(&WType::Arc4(arc4_string()), None).unwrap(),
            AvmType::Bytes
        );
        assert!(persistable_stack_type(&WType::GroupTransaction(None), None).is_err());
        assert!(persistable_stack_type(&WType::Void, None).is_err());
    }

    #[test]
    fn test_reference_and_argument_types() {
        assert!(is_reference_type(&WType::Asset));
        assert!(is_reference_type(&WType::Account));
        assert!(!is_reference_type(&WType::Uint64));

        assert!(is_arc4_argument_type(&WType::Application));
        assert!(is_arc4_argument_type(&WType::GroupTransaction(None)));
        assert!(is_arc4_argument_type(&WType::Arc4(Arc4Type::Bool)));
        assert!(!is_arc4_argument_type(&WType::Bytes));
    }

    #[test]
    fn test_has_arc4_equivalent() {
        assert!(has_arc4_equivalent_type(&WType::Uint64));
        assert!(has_arc4_equivalent_type(&WType::String));
        assert!(!has_arc4_equivalent_type(&WType::Asset));

        let flat = WType::tuple_type(vec![WType::Uint64, WType::Bool], None).unwrap();
        assert!(has_arc4_equivalent_type(&flat));

        // nested tuples have no equivalent
        let nested = WType::tuple_type(vec![flat.clone(), WType::Uint64], None).unwrap();
        assert!(!has_arc4_equivalent_type(&nested));
    }

    #[test]
    fn test_avm_to_arc4_equivalents() {
        assert_eq!(
            avm_to_arc4_equivalent_type(&WType::Bool, None).unwrap(),
            Arc4Type::Bool
        );
        assert_eq!(
            avm_to_arc4_equivalent_type(&WType::Uint64, None)
                .unwrap()
                .arc4_name(),
            "uint64"
        );
        assert_eq!(
            avm_to_arc4_equivalent_type(&WType::BigUInt, None)
                .unwrap()
                .arc4_name(),
            "uint512"
        );
        assert_eq!(
            avm_to_arc4_equivalent_type(&WType::Bytes, None)
                .unwrap()
                .arc4_name(),
            "byte[]"
        );
        assert_eq!(
            avm_to_arc4_equivalent_type(&WType::String, None).unwrap(),
            arc4_string()
        );

        let tuple = WType::tuple_type(vec![WType::Uint64, WType::String], None).unwrap();
        let arc4_tuple = avm_to_arc4_equivalent_type(&tuple, None).unwrap();
        assert_eq!(arc4_tuple.arc4_name(), "(uint64,string)");

        assert!(avm_to_arc4_equivalent_type(&WType::Asset, None).is_err());
    }

    #[test]
    fn test_base_validators() {
        assert!(valid_base16("DEADBEEF"));
        assert!(!valid_base16("XYZ"));
        assert!(valid_base64("aGVsbG8="));
        assert!(!valid_base64("not base64!!"));
        assert!(valid_base32("MFRGG")); // "abc"
        assert!(!valid_base32("01"));
    }
}
