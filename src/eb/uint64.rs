//! Builders for the native `uint64` type

use num_bigint::BigInt;

use crate::awst::nodes::{
    Expression, ExprKind, Lvalue, NumericComparisonOp, Statement, UInt64BinaryOperator,
};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::WType;

use super::bool_::BoolExpressionBuilder;
use super::{
    BoxedInstance, BuilderBinaryOp, BuilderComparisonOp, BuilderUnaryOp, DispatchResult,
    InstanceBuilder, LiteralValue, TypeBuilder,
};

pub struct UInt64TypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl UInt64TypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }

    fn constant_checked(&self, value: &BigInt, loc: Option<SourceLocation>) -> Expression {
        match u64::try_from(value) {
            Ok(v) => Expression::uint64(v, loc),
            Err(_) => {
                self.ctx
                    .error(format!("value {value} does not fit in uint64"), loc);
                Expression::dummy(WType::Uint64, loc)
            }
        }
    }
}

impl TypeBuilder for UInt64TypeBuilder {
    fn produces(&self) -> WType {
        WType::Uint64
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let expr = match args.as_slice() {
            [] => Expression::uint64(0, loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Int(int_value)) => self.constant_checked(int_value, loc),
                _ if value.wtype() == WType::Uint64 => value.resolve(),
                _ if value.wtype() == WType::Bool => {
                    // bool is already 0 or 1 on the stack
                    Expression::new(
                        ExprKind::ReinterpretCast {
                            value: Box::new(value.resolve()),
                        },
                        WType::Uint64,
                        loc,
                    )
                }
                _ => {
                    self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                    Expression::dummy(WType::Uint64, loc)
                }
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(WType::Uint64, loc)
            }
        };
        Box::new(UInt64ExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Int(value) => Some(Box::new(UInt64ExpressionBuilder::new(
                self.ctx.clone(),
                self.constant_checked(value, loc),
            ))),
            _ => None,
        }
    }
}

pub struct UInt64ExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl UInt64ExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    fn resolve_rhs(&self, other: &dyn InstanceBuilder) -> BoxedInstance {
        let converter = UInt64TypeBuilder::new(self.ctx.clone(), other.loc());
        if let Some(literal) = other.resolve_literal()
            && let Some(resolved) = converter.convert_literal(literal, other.loc())
        {
            return resolved;
        }
        super::builder_for_instance(self.ctx.clone(), other.resolve())
    }
}

impl InstanceBuilder for UInt64ExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Uint64
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
                wtype: WType::Uint64,
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
                right: Box::new(Expression::uint64(0, loc)),
            },
            WType::Bool,
            loc,
        );
        Box::new(BoolExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn unary_op(&self, op: BuilderUnaryOp, loc: Option<SourceLocation>) -> BoxedInstance {
        match op {
            // unary + has no effect beyond re-anchoring the location
            BuilderUnaryOp::Positive => {
                let mut expr = self.expr.clone();
                expr.loc = loc;
                Box::new(Self::new(self.ctx.clone(), expr))
            }
            BuilderUnaryOp::BitInvert => {
                let expr = Expression::new(
                    ExprKind::IntrinsicCall {
                        op_code: "~".into(),
                        immediates: vec![],
                        stack_args: vec![self.expr.clone()],
                    },
                    WType::Uint64,
                    loc,
                );
                Box::new(Self::new(self.ctx.clone(), expr))
            }
            BuilderUnaryOp::Negative => self.unsupported("unary -", loc),
        }
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        let other = self.resolve_rhs(other);
        if other.wtype() != WType::Uint64 {
            return DispatchResult::NotImplemented;
        }
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
                right: Box::new(other.resolve()),
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
        let other = self.resolve_rhs(other);
        if other.wtype() != WType::Uint64 {
            return DispatchResult::NotImplemented;
        }
        let (mut lhs, mut rhs) = (self.expr.clone(), other.resolve());
        if reverse {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        let Some(operator) = translate_uint64_math_operator(&self.ctx, op, loc) else {
            return DispatchResult::NotImplemented;
        };
        let expr = Expression::new(
            ExprKind::UInt64BinaryOp {
                left: Box::new(lhs),
                op: operator,
                right: Box::new(rhs),
            },
            WType::Uint64,
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
        let rhs = self.resolve_rhs(rhs);
        if rhs.wtype() != WType::Uint64 {
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
        }
        let target = match self.resolve_lvalue() {
            Ok(target) => target,
            Err(err) => {
                self.ctx.report(err);
                return Statement::Expression(Expression::dummy(WType::Void, loc));
            }
        };
        let operator = match translate_uint64_math_operator(&self.ctx, op, loc) {
            Some(operator) => operator,
            None => {
                self.ctx.error(
                    format!("unsupported uint64 math operator {}", op.symbol()),
                    loc,
                );
                return Statement::Expression(Expression::dummy(WType::Void, loc));
            }
        };
        let value = Expression::new(
            ExprKind::UInt64BinaryOp {
                left: Box::new(self.expr.clone()),
                op: operator,
                right: Box::new(rhs.resolve()),
            },
            WType::Uint64,
            loc,
        );
        Statement::Assign {
            target,
            value,
            loc,
        }
    }
}

fn translate_uint64_math_operator(
    ctx: &DiagnosticContext,
    op: BuilderBinaryOp,
    loc: Option<SourceLocation>,
) -> Option<UInt64BinaryOperator> {
    match op {
        BuilderBinaryOp::Add => Some(UInt64BinaryOperator::Add),
        BuilderBinaryOp::Sub => Some(UInt64BinaryOperator::Sub),
        BuilderBinaryOp::Mult => Some(UInt64BinaryOperator::Mult),
        BuilderBinaryOp::Div => {
            // match the source language: true division does not exist on
            // integers, steer the user to // but keep compiling
            ctx.error(
                "only the truncating division operator (//) is supported",
                loc,
            );
            Some(UInt64BinaryOperator::FloorDiv)
        }
        BuilderBinaryOp::FloorDiv => Some(UInt64BinaryOperator::FloorDiv),
        BuilderBinaryOp::Mod => Some(UInt64BinaryOperator::Mod),
        BuilderBinaryOp::Pow => Some(UInt64BinaryOperator::Pow),
        BuilderBinaryOp::LShift => Some(UInt64BinaryOperator::LShift),
        BuilderBinaryOp::RShift => Some(UInt64BinaryOperator::RShift),
        BuilderBinaryOp::BitOr => Some(UInt64BinaryOperator::BitOr),
        BuilderBinaryOp::BitXor => Some(UInt64BinaryOperator::BitXor),
        BuilderBinaryOp::BitAnd => Some(UInt64BinaryOperator::BitAnd),
    }
}
