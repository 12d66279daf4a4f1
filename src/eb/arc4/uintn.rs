//! Builders for `arc4.uintN` types

use num_bigint::{BigInt, Sign};

use crate::arc4::{Arc4Value, encode};
use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, WType};

use super::super::{
    BoxedInstance, BuilderComparisonOp, DispatchResult, InstanceBuilder, LiteralValue,
    TypeBuilder, bytes_member, compare_bytes,
};

pub struct Arc4UIntNTypeBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    loc: Option<SourceLocation>,
}

impl Arc4UIntNTypeBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, loc: Option<SourceLocation>) -> Self {
        debug_assert!(matches!(typ, Arc4Type::UIntN(_)));
        Self { ctx, typ, loc }
    }

    fn bits(&self) -> u32 {
        match &self.typ {
            Arc4Type::UIntN(u) => u.n,
            _ => 64,
        }
    }

    fn constant_checked(&self, value: &BigInt, loc: Option<SourceLocation>) -> Expression {
        if value.sign() == Sign::Minus || value.bits() > u64::from(self.bits()) {
            self.ctx.error(
                format!("value {value} does not fit in {}", self.typ.name()),
                loc,
            );
            return Expression::dummy(WType::Arc4(self.typ.clone()), loc);
        }
        let encoded = encode(&self.typ, &Arc4Value::UInt(value.magnitude().clone()))
            .unwrap_or_default();
        Expression::new(
            ExprKind::BytesConstant(encoded),
            WType::Arc4(self.typ.clone()),
            loc,
        )
    }
}

impl TypeBuilder for Arc4UIntNTypeBuilder {
    fn produces(&self) -> WType {
        WType::Arc4(self.typ.clone())
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let wtype = WType::Arc4(self.typ.clone());
        let expr = match args.as_slice() {
            [] => self.constant_checked(&BigInt::ZERO, loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Int(int_value)) => self.constant_checked(int_value, loc),
                _ => match value.wtype() {
                    WType::Uint64 | WType::BigUInt | WType::Bool => Expression::new(
                        ExprKind::Arc4Encode {
                            value: Box::new(value.resolve()),
                        },
                        wtype.clone(),
                        loc,
                    ),
                    ref w if *w == wtype => value.resolve(),
                    _ => {
                        self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                        Expression::dummy(wtype.clone(), loc)
                    }
                },
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(wtype.clone(), loc)
            }
        };
        Box::new(Arc4UIntNExpressionBuilder::new(
            self.ctx.clone(),
            self.typ.clone(),
            expr,
        ))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Int(value) => Some(Box::new(Arc4UIntNExpressionBuilder::new(
                self.ctx.clone(),
                self.typ.clone(),
                self.constant_checked(value, loc),
            ))),
            _ => None,
        }
    }
}

pub struct Arc4UIntNExpressionBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    expr: Expression,
}

impl Arc4UIntNExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, expr: Expression) -> Self {
        Self { ctx, typ, expr }
    }

    fn native_expr(&self, loc: Option<SourceLocation>) -> Expression {
        let native = self.typ.decode_type().unwrap_or(WType::Uint64);
        Expression::new(
            ExprKind::Arc4Decode {
                value: Box::new(self.expr.clone()),
            },
            native,
            loc,
        )
    }
}

impl InstanceBuilder for Arc4UIntNExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Arc4(self.typ.clone())
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
                self.ctx.error(
                    format!("unrecognised member of {}: {name}", self.typ.name()),
                    loc,
                );
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
        let converter = Arc4UIntNTypeBuilder::new(self.ctx.clone(), self.typ.clone(), other.loc());
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

    fn uint8_type() -> Arc4Type {
        Arc4Type::uint_n(8, None).unwrap()
    }

    #[test]
    fn test_literal_encodes_big_endian() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4UIntNTypeBuilder::new(ctx.clone(), uint8_type(), None);
        let value = builder
            .convert_literal(&LiteralValue::Int(BigInt::from(0xAB)), None)
            .unwrap();
        assert!(matches!(
            value.resolve().kind,
            ExprKind::BytesConstant(ref b) if b == &vec![0xAB]
        ));
    }

    #[test]
    fn test_literal_overflow_reports() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4UIntNTypeBuilder::new(ctx.clone(), uint8_type(), None);
        builder
            .convert_literal(&LiteralValue::Int(BigInt::from(256)), None)
            .unwrap();
        assert_eq!(ctx.error_count(), 1);
    }

    #[test]
    fn test_native_member_decodes() {
        let ctx = DiagnosticContext::new();
        let value = Arc4UIntNExpressionBuilder::new(
            ctx.clone(),
            Arc4Type::uint_n(64, None).unwrap(),
            Expression::new(
                ExprKind::BytesConstant(vec![0; 8]),
                WType::Arc4(Arc4Type::uint_n(64, None).unwrap()),
                None,
            ),
        );
        let native = value.member_access("native", None);
        assert_eq!(native.wtype(), WType::Uint64);
        assert!(matches!(native.resolve().kind, ExprKind::Arc4Decode { .. }));
    }

    #[test]
    fn test_wide_uintn_decodes_to_biguint() {
        let ctx = DiagnosticContext::new();
        let typ = Arc4Type::uint_n(256, None).unwrap();
        let value = Arc4UIntNExpressionBuilder::new(
            ctx.clone(),
            typ.clone(),
            Expression::new(
                ExprKind::BytesConstant(vec![0; 32]),
                WType::Arc4(typ),
                None,
            ),
        );
        let native = value.member_access("native", None);
        assert_eq!(native.wtype(), WType::BigUInt);
    }

    #[test]
    fn test_encode_from_uint64_instance() {
        let ctx = DiagnosticContext::new();
        let builder =
            Arc4UIntNTypeBuilder::new(ctx.clone(), Arc4Type::uint_n(64, None).unwrap(), None);
        let arg = super::super::super::builder_for_instance(
            ctx.clone(),
            Expression::uint64(5, None),
        );
        let value = builder.call(vec![arg], None);
        assert!(matches!(value.resolve().kind, ExprKind::Arc4Encode { .. }));
        assert_eq!(ctx.error_count(), 0);
    }
}
