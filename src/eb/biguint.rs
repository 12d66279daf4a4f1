//! Builders for the native `biguint` type (arbitrary precision up to 512
//! bits, bytes-encoded on the stack)

use num_bigint::{BigInt, BigUint, Sign};

use crate::awst::nodes::{
    BigUIntBinaryOperator, Expression, ExprKind, Lvalue, NumericComparisonOp, Statement,
};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::{MAX_BIGUINT_BITS, WType};

use super::bool_::BoolExpressionBuilder;
use super::{
    BoxedInstance, BuilderBinaryOp, BuilderComparisonOp, BuilderUnaryOp, DispatchResult,
    InstanceBuilder, LiteralValue, TypeBuilder,
};

pub struct BigUIntTypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl BigUIntTypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }

    fn constant_checked(&self, value: &BigInt, loc: Option<SourceLocation>) -> Expression {
        if value.sign() == Sign::Minus || value.bits() > u64::from(MAX_BIGUINT_BITS) {
            self.ctx
                .error(format!("value {value} does not fit in biguint"), loc);
            return Expression::dummy(WType::BigUInt, loc);
        }
        Expression::biguint(value.magnitude().clone(), loc)
    }
}

impl TypeBuilder for BigUIntTypeBuilder {
    fn produces(&self) -> WType {
        WType::BigUInt
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let expr = match args.as_slice() {
            [] => Expression::biguint(BigUint::ZERO, loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Int(int_value)) => self.constant_checked(int_value, loc),
                _ if value.wtype() == WType::BigUInt => value.resolve(),
                _ if value.wtype() == WType::Uint64 => uint64_to_biguint(value.resolve(), loc),
                _ => {
                    self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                    Expression::dummy(WType::BigUInt, loc)
                }
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(WType::BigUInt, loc)
            }
        };
        Box::new(BigUIntExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Int(value) => Some(Box::new(BigUIntExpressionBuilder::new(
                self.ctx.clone(),
                self.constant_checked(value, loc),
            ))),
            _ => None,
        }
    }
}

pub struct BigUIntExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl BigUIntExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    /// Resolve the other operand: commit int literals to biguint, widen
    /// uint64 operands, decline the rest
    fn resolve_rhs(&self, other: &dyn InstanceBuilder) -> Option<Expression> {
        let converter = BigUIntTypeBuilder::new(self.ctx.clone(), other.loc());
        if let Some(literal) = other.resolve_literal() {
            let resolved = converter.convert_literal(literal, other.loc())?;
            return Some(resolved.resolve());
        }
        match other.wtype() {
            WType::BigUInt => Some(other.resolve()),
            WType::Uint64 => Some(uint64_to_biguint(other.resolve(), other.loc())),
            _ => None,
        }
    }
}

impl InstanceBuilder for BigUIntExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::BigUInt
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.expr.loc
    }

    fn resolve(&self) -> Expression {
        self.expr.clone()
    }

    fn resolve_lvalue(&self) -> Result<Lvalue, crate::error::CodeError> {
        match &self.expr.kind {
            ExprKind::VarExpression(name) => Ok(Lvalue::Var {
                name: name.clone(),
                wtype: WType::BigUInt,
                loc: self.expr.loc,
            }),
            _ => Err(crate::error::CodeError::new(
                "expression is not a valid assignment target",
                self.expr.loc,
            )),
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        let op = if negate {
            NumericComparisonOp::Eq
        } else {
            NumericComparisonOp::Ne
        };
        let expr = Expression::new(
            ExprKind::NumericComparison {
                left: Box::new(self.expr.clone()),
                op,
                right: Box::new(Expression::biguint(BigUint::ZERO, loc)),
            },
            WType::Bool,
            loc,
        );
        Box::new(BoolExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn unary_op(&self, op: BuilderUnaryOp, loc: Option<SourceLocation>) -> BoxedInstance {
        match op {
            // unary + is allowed but has no effect on an unsigned value
            BuilderUnaryOp::Positive => {
                let mut expr = self.expr.clone();
                expr.loc = loc;
                Box::new(Self::new(self.ctx.clone(), expr))
            }
            _ => self.unsupported("unary operator", loc),
        }
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        let Some(other_expr) = self.resolve_rhs(other) else {
            return DispatchResult::NotImplemented;
        };
        let operator = match op {
            BuilderComparisonOp::Eq => NumericComparisonOp::Eq,
            BuilderComparisonOp::Ne => NumericComparisonOp::Ne,
            BuilderComparisonOp::Lt => NumericComparisonOp::Lt,
            BuilderComparisonOp::Le => NumericComparisonOp::Le,
            BuilderComparisonOp::Gt => NumericComparisonOp::Gt,
            BuilderComparisonOp::Ge => NumericComparisonOp::Ge,
        };
        let expr = Expression::new(
            ExprKind::NumericComparison {
                left: Box::new(self.expr.clone()),
                op: operator,
                right: Box::new(other_expr),
            },
            WType::Bool,
            loc,
        );
        DispatchResult::Built(Box::new(BoolExpressionBuilder::new(self.ctx.clone(), expr)))
    }

    fn binary_op(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderBinaryOp,
        loc: Option<SourceLocation>,
        reverse: bool,
    ) -> DispatchResult {
        let Some(other_expr) = self.resolve_rhs(other) else {
            return DispatchResult::NotImplemented;
        };
        let (mut lhs, mut rhs) = (self.expr.clone(), other_expr);
        if reverse {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        let Some(operator) = translate_biguint_math_operator(&self.ctx, op, loc) else {
            self.ctx.error(
                format!("unsupported biguint math operator {}", op.symbol()),
                loc,
            );
            return DispatchResult::Built(super::dummy_builder(
                self.ctx.clone(),
                WType::BigUInt,
                loc,
            ));
        };
        let expr = Expression::new(
            ExprKind::BigUIntBinaryOp {
                left: Box::new(lhs),
                op: operator,
                right: Box::new(rhs),
            },
            WType::BigUInt,
            loc,
        );
        DispatchResult::Built(Box::new(Self::new(self.ctx.clone(), expr)))
    }

    fn augmented_assignment(
        &self,
        op: BuilderBinaryOp,
        rhs: &dyn InstanceBuilder,
        loc: Option<SourceLocation>,
    ) -> Statement {
        let Some(value) = self.resolve_rhs(rhs) else {
            self.ctx.error(
                format!(
                    "invalid operand type {} for {}= with {}",
                    rhs.wtype().name(),
                    op.symbol(),
                    self.wtype().name()
                ),
                loc,
            );
            return Statement::Expression(Expression::dummy(WType::Void, loc));
        };
        let target = match self.resolve_lvalue() {
            Ok(target) => target,
            Err(err) => {
                self.ctx.report(err);
                return Statement::Expression(Expression::dummy(WType::Void, loc));
            }
        };
        let Some(operator) = translate_biguint_math_operator(&self.ctx, op, loc) else {
            self.ctx.error(
                format!("unsupported biguint math operator {}", op.symbol()),
                loc,
            );
            return Statement::Expression(Expression::dummy(WType::Void, loc));
        };
        let value = Expression::new(
            ExprKind::BigUIntBinaryOp {
                left: Box::new(self.expr.clone()),
                op: operator,
                right: Box::new(value),
            },
            WType::BigUInt,
            loc,
        );
        Statement::Assign {
            target,
            value,
            loc,
        }
    }
}

fn translate_biguint_math_operator(
    ctx: &DiagnosticContext,
    op: BuilderBinaryOp,
    loc: Option<SourceLocation>,
) -> Option<BigUIntBinaryOperator> {
    match op {
        BuilderBinaryOp::Add => Some(BigUIntBinaryOperator::Add),
        BuilderBinaryOp::Sub => Some(BigUIntBinaryOperator::Sub),
        BuilderBinaryOp::Mult => Some(BigUIntBinaryOperator::Mult),
        BuilderBinaryOp::Div => {
            // keep compiling with floor-division semantics so further errors
            // still surface
            ctx.error(
                "only the truncating division operator (//) is supported",
                loc,
            );
            Some(BigUIntBinaryOperator::FloorDiv)
        }
        BuilderBinaryOp::FloorDiv => Some(BigUIntBinaryOperator::FloorDiv),
        BuilderBinaryOp::Mod => Some(BigUIntBinaryOperator::Mod),
        BuilderBinaryOp::BitOr => Some(BigUIntBinaryOperator::BitOr),
        BuilderBinaryOp::BitXor => Some(BigUIntBinaryOperator::BitXor),
        BuilderBinaryOp::BitAnd => Some(BigUIntBinaryOperator::BitAnd),
        _ => None,
    }
}

/// Widen a uint64 expression to biguint via its big-endian byte encoding
pub fn uint64_to_biguint(value: Expression, loc: Option<SourceLocation>) -> Expression {
    Expression::new(
        ExprKind::IntrinsicCall {
            op_code: "itob".into(),
            immediates: vec![],
            stack_args: vec![value],
        },
        WType::BigUInt,
        loc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biguint_value(ctx: &DiagnosticContext, value: u64) -> BigUIntExpressionBuilder {
        BigUIntExpressionBuilder::new(
            ctx.clone(),
            Expression::biguint(BigUint::from(value), None),
        )
    }

    #[test]
    fn test_true_division_reports_and_continues() {
        let ctx = DiagnosticContext::new();
        let lhs = biguint_value(&ctx, 10);
        let rhs = biguint_value(&ctx, 3);
        let result = match lhs.binary_op(&rhs, BuilderBinaryOp::Div, None, false) {
            DispatchResult::Built(b) => b,
            DispatchResult::NotImplemented => panic!("div should build"),
        };
        assert_eq!(ctx.error_count(), 1);
        match result.resolve().kind {
            ExprKind::BigUIntBinaryOp { op, .. } => {
                assert_eq!(op, BigUIntBinaryOperator::FloorDiv);
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_uint64_operand_is_widened() {
        let ctx = DiagnosticContext::new();
        let lhs = biguint_value(&ctx, 1);
        let rhs = super::super::uint64::UInt64ExpressionBuilder::new(
            ctx.clone(),
            Expression::uint64(2, None),
        );
        let result = match lhs.binary_op(&rhs, BuilderBinaryOp::Add, None, false) {
            DispatchResult::Built(b) => b,
            DispatchResult::NotImplemented => panic!("add should build"),
        };
        match result.resolve().kind {
            ExprKind::BigUIntBinaryOp { right, .. } => match right.kind {
                ExprKind::IntrinsicCall { ref op_code, .. } => assert_eq!(op_code, "itob"),
                other => panic!("expected widening, got {other:?}"),
            },
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_reverse_swaps_operands() {
        let ctx = DiagnosticContext::new();
        let builder = biguint_value(&ctx, 1);
        let rhs = biguint_value(&ctx, 2);
        let result = match builder.binary_op(&rhs, BuilderBinaryOp::Sub, None, true) {
            DispatchResult::Built(b) => b,
            DispatchResult::NotImplemented => panic!("sub should build"),
        };
        match result.resolve().kind {
            ExprKind::BigUIntBinaryOp { left, .. } => {
                assert!(matches!(left.kind, ExprKind::BigUIntConstant(ref v) if *v == BigUint::from(2u32)));
            }
            other => panic!("unexpected expression: {other:?}"),
        }
    }

    #[test]
    fn test_shift_is_not_supported() {
        let ctx = DiagnosticContext::new();
        let lhs = biguint_value(&ctx, 1);
        let rhs = biguint_value(&ctx, 2);
        match lhs.binary_op(&rhs, BuilderBinaryOp::LShift, None, false) {
            DispatchResult::Built(_) => assert_eq!(ctx.error_count(), 1),
            DispatchResult::NotImplemented => panic!("should report, not decline"),
        }
    }

    #[test]
    fn test_literal_too_wide_for_biguint() {
        let ctx = DiagnosticContext::new();
        let builder = BigUIntTypeBuilder::new(ctx.clone(), None);
        let too_big = BigInt::from(1) << 512;
        builder
            .convert_literal(&LiteralValue::Int(too_big), None)
            .unwrap();
        assert_eq!(ctx.error_count(), 1);
    }
}
