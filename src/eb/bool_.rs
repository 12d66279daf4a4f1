//! Builders for the native `bool` type

use crate::awst::nodes::{BooleanOperator, Expression, ExprKind, Lvalue, NumericComparisonOp};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::WType;

use super::{
    BoxedInstance, BuilderComparisonOp, DispatchResult, InstanceBuilder, LiteralValue,
    TypeBuilder,
};

pub struct BoolTypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl BoolTypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }
}

impl TypeBuilder for BoolTypeBuilder {
    fn produces(&self) -> WType {
        WType::Bool
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        match args.as_slice() {
            [] => Box::new(BoolExpressionBuilder::new(
                self.ctx.clone(),
                Expression::bool_(false, loc),
            )),
            [value] => value.bool_eval(loc, false),
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Box::new(BoolExpressionBuilder::new(
                    self.ctx.clone(),
                    Expression::dummy(WType::Bool, loc),
                ))
            }
        }
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Bool(value) => Some(Box::new(BoolExpressionBuilder::new(
                self.ctx.clone(),
                Expression::bool_(*value, loc),
            ))),
            _ => None,
        }
    }
}

pub struct BoolExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl BoolExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }
}

impl InstanceBuilder for BoolExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Bool
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
                wtype: WType::Bool,
                loc: self.expr.loc,
            }),
            _ => Err(crate::error::CodeError::new(
                "expression is not a valid assignment target",
                self.expr.loc,
            )),
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        if negate {
            let expr = Expression::new(
                ExprKind::Not(Box::new(self.expr.clone())),
                WType::Bool,
                loc,
            );
            Box::new(Self::new(self.ctx.clone(), expr))
        } else {
            Box::new(Self::new(self.ctx.clone(), self.expr.clone()))
        }
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        let converter = BoolTypeBuilder::new(self.ctx.clone(), other.loc());
        let other = match other.resolve_literal() {
            Some(literal) => match converter.convert_literal(literal, other.loc()) {
                Some(resolved) => resolved,
                None => return DispatchResult::NotImplemented,
            },
            None => super::builder_for_instance(self.ctx.clone(), other.resolve()),
        };
        if other.wtype() != WType::Bool {
            return DispatchResult::NotImplemented;
        }
        let operator = match op {
            BuilderComparisonOp::Eq => NumericComparisonOp::Eq,
            BuilderComparisonOp::Ne => NumericComparisonOp::Ne,
            _ => return DispatchResult::NotImplemented,
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
        DispatchResult::Built(Box::new(Self::new(self.ctx.clone(), expr)))
    }
}

/// Combine two already-bool expressions with a non-short-circuiting connective
pub fn bool_binary_op(
    ctx: &DiagnosticContext,
    lhs: &dyn InstanceBuilder,
    rhs: &dyn InstanceBuilder,
    op: BooleanOperator,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    let lhs = lhs.bool_eval(loc, false);
    let rhs = rhs.bool_eval(loc, false);
    let expr = Expression::new(
        ExprKind::BooleanBinaryOp {
            left: Box::new(lhs.resolve()),
            op,
            right: Box::new(rhs.resolve()),
        },
        WType::Bool,
        loc,
    );
    Box::new(BoolExpressionBuilder::new(ctx.clone(), expr))
}
