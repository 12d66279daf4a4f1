//! Copy-on-write array semantics at the expression-builder layer

use avmc::arc4::{Arc4Value, encode};
use avmc::awst::nodes::ExprKind;
use avmc::diagnostic::DiagnosticContext;
use avmc::eb::arc4::array::Arc4ArrayTypeBuilder;
use avmc::eb::{BoxedInstance, LiteralBuilder, LiteralValue, TypeBuilder};
use avmc::wtypes::{Arc4Type, WType};
use num_bigint::BigInt;

fn uint64_array_type() -> Arc4Type {
    Arc4Type::dynamic_array(
        WType::Arc4(Arc4Type::uint_n(64, None).unwrap()),
        None,
    )
    .unwrap()
}

fn literal(ctx: &DiagnosticContext, value: i64) -> BoxedInstance {
    Box::new(LiteralBuilder::new(
        ctx.clone(),
        LiteralValue::Int(BigInt::from(value)),
        None,
    ))
}

fn length_of(array: &BoxedInstance) -> u64 {
    match array.member_access("length", None).resolve().kind {
        ExprKind::UInt64Constant(value) => value,
        other => panic!("length did not fold: {other:?}"),
    }
}

fn element_at(ctx: &DiagnosticContext, array: &BoxedInstance, index: i64) -> u64 {
    let item = array.index(&*literal(ctx, index), None);
    let encoded = match item.resolve().kind {
        ExprKind::BytesConstant(bytes) => bytes,
        other => panic!("element did not fold: {other:?}"),
    };
    assert_eq!(encoded.len(), 8);
    u64::from_be_bytes(encoded.try_into().unwrap())
}

#[test]
fn test_append_pop_replace_sequence() {
    let ctx = DiagnosticContext::new();
    let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), uint64_array_type(), None);

    let mut arr = builder.call(vec![], None);
    assert_eq!(length_of(&arr), 0);

    // append 42
    arr = arr.member_access("append", None).call(vec![literal(&ctx, 42)], None);
    assert_eq!(length_of(&arr), 1);
    assert_eq!(element_at(&ctx, &arr, -1), 42);

    // append 0..=4
    for i in 0..5 {
        arr = arr.member_access("append", None).call(vec![literal(&ctx, i)], None);
    }
    assert_eq!(length_of(&arr), 6);
    assert_eq!(element_at(&ctx, &arr, -1), 4);

    // append 43, pop 3
    arr = arr.member_access("append", None).call(vec![literal(&ctx, 43)], None);
    assert_eq!(element_at(&ctx, &arr, 0), 42);
    arr = arr.member_access("pop", None).call(vec![literal(&ctx, 3)], None);
    assert_eq!(length_of(&arr), 4);
    assert_eq!(element_at(&ctx, &arr, -1), 2);

    // append 0..=9 then 44
    for i in 0..10 {
        arr = arr.member_access("append", None).call(vec![literal(&ctx, i)], None);
    }
    arr = arr.member_access("append", None).call(vec![literal(&ctx, 44)], None);
    assert_eq!(length_of(&arr), 15);

    // replace index 2 with 23
    arr = arr
        .member_access("replace", None)
        .call(vec![literal(&ctx, 2), literal(&ctx, 23)], None);

    assert_eq!(length_of(&arr), 15);
    assert_eq!(element_at(&ctx, &arr, 2), 23);
    assert_eq!(element_at(&ctx, &arr, -1), 44);
    assert_eq!(element_at(&ctx, &arr, 0), 42);
    assert_eq!(ctx.error_count(), 0);
}

#[test]
fn test_pop_from_empty_array_reports() {
    let ctx = DiagnosticContext::new();
    let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), uint64_array_type(), None);
    let arr = builder.call(vec![], None);
    arr.member_access("pop", None).call(vec![], None);
    assert_eq!(ctx.error_count(), 1);
}

#[test]
fn test_array_equality_uses_encoding() {
    let ctx = DiagnosticContext::new();
    let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), uint64_array_type(), None);
    let arr = builder.call(vec![literal(&ctx, 7)], None);
    let expected = encode(
        &uint64_array_type(),
        &Arc4Value::Sequence(vec![Arc4Value::uint(7)]),
    )
    .unwrap();
    assert!(matches!(
        arr.resolve().kind,
        ExprKind::BytesConstant(ref b) if *b == expected
    ));
}
