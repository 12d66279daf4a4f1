//! Builders for the native `string` type (UTF-8 bytes on the stack)

use crate::awst::nodes::{Expression, ExprKind, Lvalue};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::WType;

use super::uint64::UInt64ExpressionBuilder;
use super::{
    BoxedInstance, BuilderBinaryOp, BuilderComparisonOp, DispatchResult, InstanceBuilder,
    LiteralValue, TypeBuilder, bytes_member, compare_bytes,
};

pub struct StringTypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl StringTypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }
}

impl TypeBuilder for StringTypeBuilder {
    fn produces(&self) -> WType {
        WType::String
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let expr = match args.as_slice() {
            [] => Expression::string("", loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Str(text)) => Expression::string(text.clone(), loc),
                _ if value.wtype() == WType::String => value.resolve(),
                _ => {
                    self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                    Expression::dummy(WType::String, loc)
                }
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(WType::String, loc)
            }
        };
        Box::new(StringExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Str(text) => Some(Box::new(StringExpressionBuilder::new(
                self.ctx.clone(),
                Expression::string(text.clone(), loc),
            ))),
            _ => None,
        }
    }
}

pub struct StringExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl StringExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    fn resolve_rhs(&self, other: &dyn InstanceBuilder) -> Option<Expression> {
        if let Some(literal) = other.resolve_literal() {
            let converter = StringTypeBuilder::new(self.ctx.clone(), other.loc());
            return converter
                .convert_literal(literal, other.loc())
                .map(|b| b.resolve());
        }
        (other.wtype() == WType::String).then(|| other.resolve())
    }
}

impl InstanceBuilder for StringExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::String
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
                wtype: WType::String,
                loc: self.expr.loc,
            }),
            _ => Err(crate::error::CodeError::new(
                "expression is not a valid assignment target",
                self.expr.loc,
            )),
        }
    }

    fn member_access(&self, name: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        match name {
            "bytes" => bytes_member(&self.ctx, self, loc),
            _ => {
                self.ctx
                    .error(format!("unrecognised member of string: {name}"), loc);
                super::dummy_builder(self.ctx.clone(), WType::String, loc)
            }
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        let length = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "len".into(),
                immediates: vec![],
                stack_args: vec![self.expr.clone()],
            },
            WType::Uint64,
            loc,
        );
        UInt64ExpressionBuilder::new(self.ctx.clone(), length).bool_eval(loc, negate)
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
        let other = StringExpressionBuilder::new(self.ctx.clone(), other_expr);
        compare_bytes(&self.ctx, self, &other, op, loc)
    }

    fn binary_op(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderBinaryOp,
        loc: Option<SourceLocation>,
        reverse: bool,
    ) -> DispatchResult {
        if op != BuilderBinaryOp::Add {
            return DispatchResult::NotImplemented;
        }
        let Some(other_expr) = self.resolve_rhs(other) else {
            return DispatchResult::NotImplemented;
        };
        let (mut lhs, mut rhs) = (self.expr.clone(), other_expr);
        if reverse {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        let expr = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "concat".into(),
                immediates: vec![],
                stack_args: vec![lhs, rhs],
            },
            WType::String,
            loc,
        );
        DispatchResult::Built(Box::new(Self::new(self.ctx.clone(), expr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eb::{LiteralBuilder, dispatch};

    #[test]
    fn test_string_plus_literal_concats() {
        let ctx = DiagnosticContext::new();
        let lhs = StringExpressionBuilder::new(ctx.clone(), Expression::string("a", None));
        let rhs = LiteralBuilder::new(ctx.clone(), LiteralValue::Str("b".into()), None);
        let result = dispatch::binary_op(&ctx, &lhs, &rhs, BuilderBinaryOp::Add, None);
        assert_eq!(ctx.error_count(), 0);
        assert_eq!(result.wtype(), WType::String);
    }

    #[test]
    fn test_bytes_member_reinterprets() {
        let ctx = DiagnosticContext::new();
        let value = StringExpressionBuilder::new(ctx.clone(), Expression::string("hi", None));
        let bytes = value.member_access("bytes", None);
        assert_eq!(bytes.wtype(), WType::Bytes);
        assert!(matches!(
            bytes.resolve().kind,
            ExprKind::ReinterpretCast { .. }
        ));
    }
}
