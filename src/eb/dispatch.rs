//! Operator dispatch across two instance builders.
//!
//! Binary operators and comparisons are attempted on the left operand first;
//! a declined attempt is retried on the right operand with `reverse` set, and
//! only when both sides decline is an error reported.

use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;

use super::{
    BoxedInstance, BuilderBinaryOp, BuilderComparisonOp, DispatchResult, InstanceBuilder,
    dummy_builder,
};

/// Resolve a binary operation, trying both operands before giving up
pub fn binary_op(
    ctx: &DiagnosticContext,
    lhs: &dyn InstanceBuilder,
    rhs: &dyn InstanceBuilder,
    op: BuilderBinaryOp,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    match lhs.binary_op(rhs, op, loc, false) {
        DispatchResult::Built(result) => result,
        DispatchResult::NotImplemented => match rhs.binary_op(lhs, op, loc, true) {
            DispatchResult::Built(result) => result,
            DispatchResult::NotImplemented => {
                ctx.error(
                    format!(
                        "unsupported operand types for {}: {} and {}",
                        op.symbol(),
                        lhs.wtype().name(),
                        rhs.wtype().name()
                    ),
                    loc,
                );
                dummy_builder(ctx.clone(), lhs.wtype(), loc)
            }
        },
    }
}

/// Resolve a comparison, trying the reversed form on the right operand when
/// the left declines
pub fn compare(
    ctx: &DiagnosticContext,
    lhs: &dyn InstanceBuilder,
    rhs: &dyn InstanceBuilder,
    op: BuilderComparisonOp,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    match lhs.compare(rhs, op, loc) {
        DispatchResult::Built(result) => result,
        DispatchResult::NotImplemented => match rhs.compare(lhs, op.reversed(), loc) {
            DispatchResult::Built(result) => result,
            DispatchResult::NotImplemented => {
                ctx.error(
                    format!(
                        "unsupported comparison {} between {} and {}",
                        op.symbol(),
                        lhs.wtype().name(),
                        rhs.wtype().name()
                    ),
                    loc,
                );
                dummy_builder(ctx.clone(), crate::wtypes::WType::Bool, loc)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eb::{LiteralBuilder, LiteralValue, builder_for_instance};
    use crate::awst::nodes::{Expression, ExprKind};
    use crate::wtypes::WType;
    use num_bigint::BigInt;

    #[test]
    fn test_uint64_plus_literal() {
        let ctx = DiagnosticContext::new();
        let lhs = builder_for_instance(ctx.clone(), Expression::uint64(1, None));
        let rhs = LiteralBuilder::new(ctx.clone(), LiteralValue::Int(BigInt::from(2u32)), None);
        let result = binary_op(&ctx, &*lhs, &rhs, BuilderBinaryOp::Add, None);
        assert_eq!(result.wtype(), WType::Uint64);
        assert_eq!(ctx.error_count(), 0);
        assert!(matches!(
            result.resolve().kind,
            ExprKind::UInt64BinaryOp { .. }
        ));
    }

    #[test]
    fn test_reverse_dispatch_reaches_rhs() {
        let ctx = DiagnosticContext::new();
        // literal + typed value: the literal declines, the uint64 side builds
        // the reversed operation
        let lhs = LiteralBuilder::new(ctx.clone(), LiteralValue::Int(BigInt::from(2u32)), None);
        let rhs = builder_for_instance(ctx.clone(), Expression::uint64(1, None));
        let result = binary_op(&ctx, &lhs, &*rhs, BuilderBinaryOp::Sub, None);
        assert_eq!(result.wtype(), WType::Uint64);
        assert_eq!(ctx.error_count(), 0);
        match result.resolve().kind {
            ExprKind::UInt64BinaryOp { left, .. } => {
                assert!(matches!(left.kind, ExprKind::UInt64Constant(2)));
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_both_sides_declining_is_an_error() {
        let ctx = DiagnosticContext::new();
        let lhs = builder_for_instance(ctx.clone(), Expression::uint64(1, None));
        let rhs = builder_for_instance(ctx.clone(), Expression::string("x", None));
        let result = binary_op(&ctx, &*lhs, &*rhs, BuilderBinaryOp::Mult, None);
        assert_eq!(ctx.error_count(), 1);
        // dummy keeps the left type so traversal continues
        assert_eq!(result.wtype(), WType::Uint64);
    }

    #[test]
    fn test_comparison_type_mismatch_is_an_error() {
        let ctx = DiagnosticContext::new();
        let lhs = builder_for_instance(ctx.clone(), Expression::string("a", None));
        let rhs = builder_for_instance(ctx.clone(), Expression::uint64(1, None));
        let result = compare(&ctx, &*lhs, &*rhs, BuilderComparisonOp::Lt, None);
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(result.wtype(), WType::Bool);
    }
}
