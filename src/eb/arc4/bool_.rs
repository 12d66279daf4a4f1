//! Builders for `arc4.bool`

use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, WType};

use super::super::{
    BoxedInstance, BuilderComparisonOp, DispatchResult, InstanceBuilder, LiteralValue,
    TypeBuilder, bytes_member, compare_bytes,
};

pub struct Arc4BoolTypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl Arc4BoolTypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }

    fn constant(&self, value: bool, loc: Option<SourceLocation>) -> Expression {
        Expression::new(
            ExprKind::BytesConstant(vec![if value { 0x80 } else { 0x00 }]),
            WType::Arc4(Arc4Type::Bool),
            loc,
        )
    }
}

impl TypeBuilder for Arc4BoolTypeBuilder {
    fn produces(&self) -> WType {
        WType::Arc4(Arc4Type::Bool)
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let expr = match args.as_slice() {
            [] => self.constant(false, loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Bool(b)) => self.constant(*b, loc),
                _ if value.wtype() == WType::Bool => Expression::new(
                    ExprKind::Arc4Encode {
                        value: Box::new(value.resolve()),
                    },
                    WType::Arc4(Arc4Type::Bool),
                    loc,
                ),
                _ if value.wtype() == WType::Arc4(Arc4Type::Bool) => value.resolve(),
                _ => {
                    self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                    Expression::dummy(WType::Arc4(Arc4Type::Bool), loc)
                }
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(WType::Arc4(Arc4Type::Bool), loc)
            }
        };
        Box::new(Arc4BoolExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Bool(value) => Some(Box::new(Arc4BoolExpressionBuilder::new(
                self.ctx.clone(),
                self.constant(*value, loc),
            ))),
            _ => None,
        }
    }
}

pub struct Arc4BoolExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl Arc4BoolExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    fn native_expr(&self, loc: Option<SourceLocation>) -> Expression {
        Expression::new(
            ExprKind::Arc4Decode {
                value: Box::new(self.expr.clone()),
            },
            WType::Bool,
            loc,
        )
    }
}

impl InstanceBuilder for Arc4BoolExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Arc4(Arc4Type::Bool)
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.expr.loc
    }

    fn resolve(&self) -> Expression {
        self.expr.clone()
    }

    fn member_access(&self, name: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        match name {
            "native" => {
                super::super::builder_for_instance(self.ctx.clone(), self.native_expr(loc))
            }
            "bytes" => bytes_member(&self.ctx, self, loc),
            _ => {
                self.ctx
                    .error(format!("unrecognised member of arc4.bool: {name}"), loc);
                super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
            }
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        super::super::builder_for_instance(self.ctx.clone(), self.native_expr(loc))
            .bool_eval(loc, negate)
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        let converter = Arc4BoolTypeBuilder::new(self.ctx.clone(), other.loc());
        let other: BoxedInstance = match other.resolve_literal() {
            Some(literal) => match converter.convert_literal(literal, other.loc()) {
                Some(resolved) => resolved,
                None => return DispatchResult::NotImplemented,
            },
            None => super::super::builder_for_instance(self.ctx.clone(), other.resolve()),
        };
        compare_bytes(&self.ctx, self, &*other, op, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_encode_to_single_byte() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4BoolTypeBuilder::new(ctx.clone(), None);
        let truthy = builder
            .convert_literal(&LiteralValue::Bool(true), None)
            .unwrap();
        assert!(matches!(
            truthy.resolve().kind,
            ExprKind::BytesConstant(ref b) if b == &vec![0x80]
        ));
        let falsy = builder
            .convert_literal(&LiteralValue::Bool(false), None)
            .unwrap();
        assert!(matches!(
            falsy.resolve().kind,
            ExprKind::BytesConstant(ref b) if b == &vec![0x00]
        ));
    }

    #[test]
    fn test_encode_from_native_bool() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4BoolTypeBuilder::new(ctx.clone(), None);
        let native = super::super::super::builder_for_instance(
            ctx.clone(),
            Expression::new(ExprKind::VarExpression("b".into()), WType::Bool, None),
        );
        let value = builder.call(vec![native], None);
        assert!(matches!(value.resolve().kind, ExprKind::Arc4Encode { .. }));
    }
}
