//! Builders for the native `bytes` type

use base64::{Engine as _, engine::general_purpose};

use crate::awst::nodes::{Expression, ExprKind, Lvalue};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::queries::{valid_base16, valid_base32, valid_base64};
use crate::wtypes::WType;

use super::bool_::BoolExpressionBuilder;
use super::uint64::UInt64ExpressionBuilder;
use super::{
    BoxedInstance, BuilderBinaryOp, BuilderComparisonOp, DispatchResult, InstanceBuilder,
    LiteralValue, TypeBuilder, compare_bytes,
};

pub struct BytesTypeBuilder {
    ctx: DiagnosticContext,
    loc: Option<SourceLocation>,
}

impl BytesTypeBuilder {
    pub fn new(ctx: DiagnosticContext, loc: Option<SourceLocation>) -> Self {
        Self { ctx, loc }
    }

    /// `Bytes.from_hex("DEADBEEF")`
    pub fn from_hex(&self, text: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        if !valid_base16(text) {
            self.ctx.error("invalid base16 value", loc);
            return super::dummy_builder(self.ctx.clone(), WType::Bytes, loc);
        }
        let value = hex::decode(text).unwrap_or_default();
        Box::new(BytesExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bytes(value, loc),
        ))
    }

    /// `Bytes.from_base32("MFRGG")`
    pub fn from_base32(&self, text: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        if !valid_base32(text) {
            self.ctx.error("invalid base32 value", loc);
            return super::dummy_builder(self.ctx.clone(), WType::Bytes, loc);
        }
        let value = base32::decode(
            base32::Alphabet::Rfc4648 { padding: false },
            text.trim_end_matches('='),
        )
        .unwrap_or_default();
        Box::new(BytesExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bytes(value, loc),
        ))
    }

    /// `Bytes.from_base64("aGVsbG8=")`
    pub fn from_base64(&self, text: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        if !valid_base64(text) {
            self.ctx.error("invalid base64 value", loc);
            return super::dummy_builder(self.ctx.clone(), WType::Bytes, loc);
        }
        let value = general_purpose::STANDARD.decode(text).unwrap_or_default();
        Box::new(BytesExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bytes(value, loc),
        ))
    }
}

impl TypeBuilder for BytesTypeBuilder {
    fn produces(&self) -> WType {
        WType::Bytes
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let expr = match args.as_slice() {
            [] => Expression::bytes(vec![], loc),
            [value] => match value.resolve_literal() {
                Some(LiteralValue::Bytes(bytes)) => Expression::bytes(bytes.clone(), loc),
                Some(LiteralValue::Str(text)) => {
                    Expression::bytes(text.as_bytes().to_vec(), loc)
                }
                _ if value.wtype() == WType::Bytes => value.resolve(),
                _ => {
                    self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                    Expression::dummy(WType::Bytes, loc)
                }
            },
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(WType::Bytes, loc)
            }
        };
        Box::new(BytesExpressionBuilder::new(self.ctx.clone(), expr))
    }

    fn convert_literal(
        &self,
        literal: &LiteralValue,
        loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        match literal {
            LiteralValue::Bytes(bytes) => Some(Box::new(BytesExpressionBuilder::new(
                self.ctx.clone(),
                Expression::bytes(bytes.clone(), loc),
            ))),
            _ => None,
        }
    }
}

pub struct BytesExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl BytesExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    fn length_expr(&self, loc: Option<SourceLocation>) -> Expression {
        Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "len".into(),
                immediates: vec![],
                stack_args: vec![self.expr.clone()],
            },
            WType::Uint64,
            loc,
        )
    }

    fn resolve_rhs(&self, other: &dyn InstanceBuilder) -> Option<Expression> {
        if let Some(literal) = other.resolve_literal() {
            let converter = BytesTypeBuilder::new(self.ctx.clone(), other.loc());
            return converter
                .convert_literal(literal, other.loc())
                .map(|b| b.resolve());
        }
        (other.wtype() == WType::Bytes).then(|| other.resolve())
    }
}

impl InstanceBuilder for BytesExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Bytes
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
                wtype: WType::Bytes,
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
            "length" => Box::new(UInt64ExpressionBuilder::new(
                self.ctx.clone(),
                self.length_expr(loc),
            )),
            _ => {
                self.ctx.error(
                    format!("unrecognised member of bytes: {name}"),
                    loc,
                );
                super::dummy_builder(self.ctx.clone(), WType::Bytes, loc)
            }
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        let length = UInt64ExpressionBuilder::new(self.ctx.clone(), self.length_expr(loc));
        length.bool_eval(loc, negate)
    }

    fn index(&self, index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        let index_expr = index.resolve();
        if index_expr.wtype != WType::Uint64 {
            self.ctx.error("bytes indices must be uint64", loc);
            return super::dummy_builder(self.ctx.clone(), WType::Bytes, loc);
        }
        let expr = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "extract3".into(),
                immediates: vec![],
                stack_args: vec![self.expr.clone(), index_expr, Expression::uint64(1, loc)],
            },
            WType::Bytes,
            loc,
        );
        Box::new(Self::new(self.ctx.clone(), expr))
    }

    fn slice_index(
        &self,
        begin: Option<&dyn InstanceBuilder>,
        end: Option<&dyn InstanceBuilder>,
        loc: Option<SourceLocation>,
    ) -> BoxedInstance {
        let begin_expr = match begin {
            Some(b) => b.resolve(),
            None => Expression::uint64(0, loc),
        };
        let end_expr = match end {
            Some(e) => e.resolve(),
            None => self.length_expr(loc),
        };
        let expr = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "substring3".into(),
                immediates: vec![],
                stack_args: vec![self.expr.clone(), begin_expr, end_expr],
            },
            WType::Bytes,
            loc,
        );
        Box::new(Self::new(self.ctx.clone(), expr))
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
        let other = BytesExpressionBuilder::new(self.ctx.clone(), other_expr);
        compare_bytes(&self.ctx, self, &other, op, loc)
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
        let op_code = match op {
            BuilderBinaryOp::Add => "concat",
            BuilderBinaryOp::BitOr => "b|",
            BuilderBinaryOp::BitXor => "b^",
            BuilderBinaryOp::BitAnd => "b&",
            _ => return DispatchResult::NotImplemented,
        };
        let (mut lhs, mut rhs) = (self.expr.clone(), other_expr);
        if reverse {
            std::mem::swap(&mut lhs, &mut rhs);
        }
        let expr = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: op_code.into(),
                immediates: vec![],
                stack_args: vec![lhs, rhs],
            },
            WType::Bytes,
            loc,
        );
        DispatchResult::Built(Box::new(Self::new(self.ctx.clone(), expr)))
    }

    fn contains(&self, _item: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        self.ctx
            .error("item containment of bytes is not supported", loc);
        Box::new(BoolExpressionBuilder::new(
            self.ctx.clone(),
            Expression::dummy(WType::Bool, loc),
        ))
    }
}
