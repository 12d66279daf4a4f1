//! Builders for ARC-4 encoded types, and the implicit conversion path used
//! when coercing call-site arguments to a method signature

pub mod array;
pub mod bool_;
pub mod tuple;
pub mod uintn;

use crate::arc4::signature::Arc4Signature;
use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::error::InternalError;
use crate::source::SourceLocation;
use crate::wtypes::queries::avm_to_arc4_equivalent_type;
use crate::wtypes::{Arc4Type, TransactionType, WType};

use super::{BoxedInstance, InstanceBuilder, LiteralValue, TypeBuilder, dummy_builder};

/// Wrap an ARC-4 typed expression in the builder for its variant
pub fn builder_for_arc4_instance(
    ctx: DiagnosticContext,
    arc4: Arc4Type,
    expr: Expression,
) -> BoxedInstance {
    match arc4 {
        Arc4Type::Bool => Box::new(bool_::Arc4BoolExpressionBuilder::new(ctx, expr)),
        Arc4Type::UIntN(_) => Box::new(uintn::Arc4UIntNExpressionBuilder::new(ctx, arc4, expr)),
        Arc4Type::Tuple(_) => Box::new(tuple::Arc4TupleExpressionBuilder::new(ctx, arc4, expr)),
        Arc4Type::DynamicArray(_) | Arc4Type::StaticArray(_) => {
            Box::new(array::Arc4ArrayExpressionBuilder::new(ctx, arc4, expr))
        }
        // structs and ufixed values only support the capabilities every
        // bytes-backed value has
        _ => Box::new(super::AnyExpressionBuilder::new(ctx, expr)),
    }
}

/// The type-builder for an ARC-4 type in source position
pub fn builder_for_arc4_type(
    ctx: DiagnosticContext,
    arc4: Arc4Type,
    loc: Option<SourceLocation>,
) -> Option<Box<dyn TypeBuilder>> {
    match arc4 {
        Arc4Type::Bool => Some(Box::new(bool_::Arc4BoolTypeBuilder::new(ctx, loc))),
        Arc4Type::UIntN(_) => Some(Box::new(uintn::Arc4UIntNTypeBuilder::new(ctx, arc4, loc))),
        Arc4Type::Tuple(_) => Some(Box::new(tuple::Arc4TupleTypeBuilder::new(ctx, arc4, loc))),
        Arc4Type::DynamicArray(_) | Arc4Type::StaticArray(_) => {
            Some(Box::new(array::Arc4ArrayTypeBuilder::new(ctx, arc4, loc)))
        }
        Arc4Type::Struct(_) => Some(Box::new(tuple::Arc4StructTypeBuilder::new(ctx, arc4, loc))),
        Arc4Type::UFixedNxM(_) => None,
    }
}

/// The ARC-4 type a call-site argument implies when the signature omits its
/// arg list
pub fn implicit_arc4_type_of(
    operand: &dyn InstanceBuilder,
    ctx: &DiagnosticContext,
    loc: Option<SourceLocation>,
) -> Result<WType, InternalError> {
    if let Some(literal) = operand.resolve_literal() {
        let arc4 = match literal {
            LiteralValue::Str(_) => crate::wtypes::arc4_string(),
            LiteralValue::Bytes(_) => crate::wtypes::arc4_dynamic_bytes(),
            LiteralValue::Int(_) => avm_to_arc4_equivalent_type(&WType::Uint64, loc)?,
            LiteralValue::Bool(_) => Arc4Type::Bool,
        };
        return Ok(WType::Arc4(arc4));
    }
    let wtype = operand.wtype();
    match &wtype {
        WType::Arc4(_)
        | WType::Asset
        | WType::Account
        | WType::Application
        | WType::GroupTransaction(_) => Ok(wtype),
        _ if crate::wtypes::queries::has_arc4_equivalent_type(&wtype) => {
            Ok(WType::Arc4(avm_to_arc4_equivalent_type(&wtype, loc)?))
        }
        other => {
            ctx.error(
                format!(
                    "{} is not an ARC-4 type and no implicit ARC-4 conversion possible",
                    other.name()
                ),
                loc,
            );
            Ok(WType::Arc4(Arc4Type::Bool))
        }
    }
}

/// Coerce the call-site arguments of an ABI method invocation to its
/// signature. With `expect_itxn_args`, group-transaction argument types are
/// replaced by their inner-transaction fieldsets (inner calls provide the
/// transactions themselves).
pub fn convert_method_args(
    ctx: &DiagnosticContext,
    signature: &Arc4Signature,
    native_args: Vec<BoxedInstance>,
    loc: Option<SourceLocation>,
    expect_itxn_args: bool,
) -> Result<Vec<BoxedInstance>, InternalError> {
    let num_args = native_args.len();
    let num_sig_args = signature.arg_types.len();
    if num_sig_args != num_args {
        ctx.error(
            format!(
                "expected {num_sig_args} ABI argument{}, got {num_args}",
                if num_sig_args == 1 { "" } else { "s" }
            ),
            loc,
        );
    }
    let arg_types: Vec<WType> = signature
        .arg_types
        .iter()
        .map(|t| if expect_itxn_args { gtxn_to_itxn(t) } else { t.clone() })
        .collect();
    native_args
        .into_iter()
        .zip(arg_types)
        .map(|(arg, target)| implicit_arc4_conversion(ctx, arg, &target))
        .collect()
}

fn gtxn_to_itxn(wtype: &WType) -> WType {
    match wtype {
        WType::GroupTransaction(kind) => WType::InnerTransactionFields(*kind),
        other => other.clone(),
    }
}

fn transaction_kind_matches(instance: Option<TransactionType>, target: Option<TransactionType>) -> bool {
    instance == target || instance.is_none() || target.is_none()
}

/// Coerce one operand into a declared argument type, per the ladder:
/// match, transaction compatibility, ARC-4 mismatch, encodability,
/// struct-from-tuple, and finally type-builder construction.
pub fn implicit_arc4_conversion(
    ctx: &DiagnosticContext,
    operand: BoxedInstance,
    target: &WType,
) -> Result<BoxedInstance, InternalError> {
    let loc = operand.loc();
    let operand = maybe_resolve_arc4_literal(ctx, operand, target);
    if operand.wtype() == *target {
        return Ok(operand);
    }
    match target {
        WType::GroupTransaction(target_kind) => {
            if let WType::GroupTransaction(kind) = operand.wtype()
                && transaction_kind_matches(kind, *target_kind)
            {
                return Ok(operand);
            }
            ctx.error(
                format!(
                    "expected type {}, got type {}",
                    target.name(),
                    operand.wtype().name()
                ),
                loc,
            );
            return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
        }
        WType::InnerTransactionFields(target_kind) => {
            if let WType::InnerTransactionFields(kind) = operand.wtype()
                && transaction_kind_matches(kind, *target_kind)
            {
                return Ok(operand);
            }
            ctx.error(
                format!(
                    "expected type {}, got type {}",
                    target.name(),
                    operand.wtype().name()
                ),
                loc,
            );
            return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
        }
        // reference types pass through only on exact match, handled above
        WType::Asset | WType::Account | WType::Application => {
            ctx.error(
                format!(
                    "expected type {}, got type {}",
                    target.name(),
                    operand.wtype().name()
                ),
                loc,
            );
            return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
        }
        _ => {}
    }
    let WType::Arc4(target_arc4) = target else {
        return Err(InternalError::new(
            format!(
                "implicit operand conversion expected an ARC-4 target type, got {}",
                target.name()
            ),
            loc,
        ));
    };
    if operand.wtype().is_arc4() && operand.resolve_literal().is_none() {
        ctx.error(
            format!(
                "expected type {}, got type {}",
                target.name(),
                operand.wtype().name()
            ),
            loc,
        );
        return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
    }
    if operand.resolve_literal().is_none() && !target_arc4.can_encode_type(&operand.wtype()) {
        ctx.error(
            format!(
                "cannot encode {} to {}",
                operand.wtype().name(),
                target.name()
            ),
            loc,
        );
        return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
    }
    // named and unnamed tuples map field-wise onto ARC-4 structs
    let conversion_args = match (target_arc4, operand.as_tuple_items()) {
        (Arc4Type::Struct(struct_type), Some(items))
            if struct_type.fields.len() == items.len() =>
        {
            let mut converted = Vec::with_capacity(items.len());
            for (item, (_, field_type)) in items.into_iter().zip(&struct_type.fields) {
                converted.push(implicit_arc4_conversion(
                    ctx,
                    item,
                    &WType::Arc4(field_type.clone()),
                )?);
            }
            converted
        }
        _ => vec![operand],
    };
    let Some(target_builder) = builder_for_arc4_type(ctx.clone(), target_arc4.clone(), loc) else {
        ctx.error(
            format!("cannot construct values of type {}", target.name()),
            loc,
        );
        return Ok(dummy_builder(ctx.clone(), target.clone(), loc));
    };
    Ok(target_builder.call(conversion_args, loc))
}

/// Literals destined for an ARC-4 target commit against its type-builder
fn maybe_resolve_arc4_literal(
    ctx: &DiagnosticContext,
    operand: BoxedInstance,
    target: &WType,
) -> BoxedInstance {
    if let WType::Arc4(arc4) = target
        && let Some(converter) = builder_for_arc4_type(ctx.clone(), arc4.clone(), operand.loc())
    {
        return super::maybe_resolve_literal(operand, &*converter);
    }
    operand
}

/// Constant-fold an expression into its ARC-4 compile-time value, when the
/// whole tree is constant
pub fn try_fold_arc4_constant(expr: &Expression) -> Option<crate::arc4::Arc4Value> {
    use crate::arc4::Arc4Value;
    use num_bigint::BigUint;

    match &expr.kind {
        ExprKind::BytesConstant(bytes) => match &expr.wtype {
            WType::Arc4(arc4) => crate::arc4::decode(arc4, bytes).ok(),
            _ => None,
        },
        ExprKind::BoolConstant(value) => Some(Arc4Value::Bool(*value)),
        ExprKind::UInt64Constant(value) => Some(Arc4Value::UInt(BigUint::from(*value))),
        ExprKind::BigUIntConstant(value) => Some(Arc4Value::UInt(value.clone())),
        ExprKind::StringConstant(value) => Some(Arc4Value::Sequence(
            value
                .bytes()
                .map(|b| Arc4Value::UInt(BigUint::from(b)))
                .collect(),
        )),
        ExprKind::Arc4Encode { value } => try_fold_arc4_constant(value),
        ExprKind::TupleExpression(items) => {
            let folded: Option<Vec<_>> = items.iter().map(try_fold_arc4_constant).collect();
            Some(Arc4Value::Sequence(folded?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eb::{LiteralBuilder, builder_for_instance};
    use num_bigint::BigInt;

    fn sig(text: &str) -> Arc4Signature {
        let (split, args, ret) = crate::arc4::parse_method_signature(text, None).unwrap();
        Arc4Signature {
            method_name: split.name,
            arg_types: args.unwrap(),
            return_type: ret,
        }
    }

    #[test]
    fn test_inferred_arg_types_for_omitted_lists() {
        let ctx = DiagnosticContext::new();
        let int_literal = LiteralBuilder::new(
            ctx.clone(),
            LiteralValue::Int(BigInt::from(3)),
            None,
        );
        let inferred = implicit_arc4_type_of(&int_literal, &ctx, None).unwrap();
        assert_eq!(inferred.name(), "arc4.uint64");

        let str_literal = LiteralBuilder::new(
            ctx.clone(),
            LiteralValue::Str("hey".into()),
            None,
        );
        let inferred = implicit_arc4_type_of(&str_literal, &ctx, None).unwrap();
        assert_eq!(inferred, WType::Arc4(crate::wtypes::arc4_string()));

        // native types map through the canonical equivalence
        let native = builder_for_instance(ctx.clone(), Expression::uint64(1, None));
        let inferred = implicit_arc4_type_of(&*native, &ctx, None).unwrap();
        assert_eq!(inferred.name(), "arc4.uint64");

        // types with no equivalent report and recover
        let txn = builder_for_instance(
            ctx.clone(),
            Expression::new(
                ExprKind::VarExpression("t".into()),
                WType::InnerTransaction(None),
                None,
            ),
        );
        implicit_arc4_type_of(&*txn, &ctx, None).unwrap();
        assert_eq!(ctx.error_count(), 1);
    }

    #[test]
    fn test_convert_args_arity_mismatch() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(uint64)void");
        let converted = convert_method_args(&ctx, &signature, vec![], None, false).unwrap();
        assert_eq!(ctx.error_count(), 1);
        assert!(converted.is_empty());
    }

    #[test]
    fn test_convert_int_literal_to_uint64() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(uint64)void");
        let arg: BoxedInstance = Box::new(LiteralBuilder::new(
            ctx.clone(),
            LiteralValue::Int(BigInt::from(7)),
            None,
        ));
        let converted =
            convert_method_args(&ctx, &signature, vec![arg], None, false).unwrap();
        assert_eq!(ctx.error_count(), 0);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].wtype().name(), "arc4.uint64");
    }

    #[test]
    fn test_convert_native_uint64_encodes() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(uint64)void");
        let arg = builder_for_instance(ctx.clone(), Expression::uint64(9, None));
        let converted =
            convert_method_args(&ctx, &signature, vec![arg], None, false).unwrap();
        assert_eq!(ctx.error_count(), 0);
        assert!(matches!(
            converted[0].resolve().kind,
            ExprKind::Arc4Encode { .. } | ExprKind::BytesConstant(_)
        ));
    }

    #[test]
    fn test_mismatched_arc4_value_reports() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(uint64)void");
        let arg = builder_for_instance(
            ctx.clone(),
            Expression::new(
                ExprKind::BytesConstant(vec![0x80]),
                WType::Arc4(Arc4Type::Bool),
                None,
            ),
        );
        convert_method_args(&ctx, &signature, vec![arg], None, false).unwrap();
        assert_eq!(ctx.error_count(), 1);
    }

    #[test]
    fn test_unencodable_type_reports() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(bool)void");
        let arg = builder_for_instance(ctx.clone(), Expression::string("nope", None));
        convert_method_args(&ctx, &signature, vec![arg], None, false).unwrap();
        assert_eq!(ctx.error_count(), 1);
    }

    #[test]
    fn test_gtxn_arg_passthrough_and_itxn_substitution() {
        let ctx = DiagnosticContext::new();
        let signature = sig("f(pay)void");
        let gtxn = builder_for_instance(
            ctx.clone(),
            Expression::new(
                ExprKind::VarExpression("t".into()),
                WType::GroupTransaction(Some(TransactionType::Pay)),
                None,
            ),
        );
        let converted =
            convert_method_args(&ctx, &signature, vec![gtxn], None, false).unwrap();
        assert_eq!(ctx.error_count(), 0);
        assert_eq!(
            converted[0].wtype(),
            WType::GroupTransaction(Some(TransactionType::Pay))
        );

        // inner call sites expect fieldsets instead
        let fields = builder_for_instance(
            ctx.clone(),
            Expression::new(
                ExprKind::VarExpression("t".into()),
                WType::InnerTransactionFields(None),
                None,
            ),
        );
        let converted =
            convert_method_args(&ctx, &signature, vec![fields], None, true).unwrap();
        assert_eq!(ctx.error_count(), 0);
        assert_eq!(converted[0].wtype(), WType::InnerTransactionFields(None));
    }
}
