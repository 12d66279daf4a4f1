//! Tests for ARC-4 method-signature parsing and selector derivation

use avmc::arc4::signature::{
    Arc4Signature, is_valid_method_name, method_selector, parse_method_signature,
    signature_type_name, split_signature,
};
use sha2::{Digest, Sha512_256};

#[test]
fn test_hello_signature_parses_and_hashes() {
    let (split, args, returns) =
        parse_method_signature("hello(uint64,string)uint64", None).unwrap();
    assert_eq!(split.name, "hello");
    let args = args.unwrap();
    assert_eq!(signature_type_name(&args[0]), "uint64");
    assert_eq!(signature_type_name(&args[1]), "string");
    let signature = Arc4Signature {
        method_name: split.name,
        arg_types: args,
        return_type: returns,
    };
    assert_eq!(signature.canonical(), "hello(uint64,string)uint64");

    let expected = Sha512_256::digest(b"hello(uint64,string)uint64");
    assert_eq!(signature.selector(), expected[..4]);
}

#[test]
fn test_text_after_returns_is_rejected() {
    let err = split_signature("(a)b(c)", None).unwrap_err();
    assert!(
        err.message.contains("invalid signature, text after returns"),
        "got: {}",
        err.message
    );
}

#[test]
fn test_omitted_args_are_inferred_later() {
    // a bare name parses; arg types then come from the call site
    let (split, args, returns) = parse_method_signature("opt_in", None).unwrap();
    assert_eq!(split.name, "opt_in");
    assert!(args.is_none());
    assert!(returns.is_none());
}

#[test]
fn test_empty_return_is_void() {
    let (_, _, returns) = parse_method_signature("go(uint64)", None).unwrap();
    assert!(returns.is_none());

    let signature = Arc4Signature {
        method_name: "go".into(),
        arg_types: vec![avmc::wtypes::WType::Arc4(
            avmc::wtypes::Arc4Type::uint_n(64, None).unwrap(),
        )],
        return_type: None,
    };
    assert_eq!(signature.canonical(), "go(uint64)void");
}

#[test]
fn test_selector_is_prefix_of_sha512_256() {
    let canonical = "add(uint64,uint64)uint64";
    let digest = Sha512_256::digest(canonical.as_bytes());
    assert_eq!(method_selector(canonical), digest[..4]);
}

#[test]
fn test_method_names_follow_identifier_rules() {
    assert!(is_valid_method_name("transfer"));
    assert!(is_valid_method_name("_internal"));
    assert!(is_valid_method_name("v2_swap"));
    assert!(!is_valid_method_name("2swap"));
    assert!(!is_valid_method_name(""));
    assert!(!is_valid_method_name("has space"));
}

#[test]
fn test_alias_names_resolve_in_signatures() {
    let (_, args, returns) =
        parse_method_signature("check(address,byte[8])bool", None).unwrap();
    let args = args.unwrap();
    assert_eq!(signature_type_name(&args[0]), "address");
    assert_eq!(signature_type_name(&args[1]), "byte[8]");
    assert_eq!(returns.unwrap().arc4_name(), "bool");
}
