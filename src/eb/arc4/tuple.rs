//! Builders for `arc4.tuple` and `arc4.struct`

use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, WType};

use super::super::{
    BoxedInstance, BuilderComparisonOp, DispatchResult, InstanceBuilder, LiteralValue,
    TypeBuilder, bytes_member, compare_bytes,
};

pub struct Arc4TupleTypeBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    loc: Option<SourceLocation>,
}

impl Arc4TupleTypeBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, loc: Option<SourceLocation>) -> Self {
        debug_assert!(matches!(typ, Arc4Type::Tuple(_)));
        Self { ctx, typ, loc }
    }
}

impl TypeBuilder for Arc4TupleTypeBuilder {
    fn produces(&self) -> WType {
        WType::Arc4(self.typ.clone())
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let wtype = WType::Arc4(self.typ.clone());
        let expected = self
            .typ
            .decode_type()
            .expect("arc4 tuples always have a native tuple equivalent");
        let expr = match args.as_slice() {
            [value]
                if value.wtype() == expected
                    || self.typ.can_encode_type(&value.wtype()) =>
            {
                Expression::new(
                    ExprKind::Arc4Encode {
                        value: Box::new(value.resolve()),
                    },
                    wtype.clone(),
                    loc,
                )
            }
            [value] => {
                self.ctx.error(
                    format!(
                        "invalid arg type: expected {}, got {}",
                        expected.name(),
                        value.wtype().name()
                    ),
                    loc.or(self.loc),
                );
                Expression::dummy(wtype.clone(), loc)
            }
            _ => {
                self.ctx.error("invalid/unhandled arguments", loc.or(self.loc));
                Expression::dummy(wtype.clone(), loc)
            }
        };
        Box::new(Arc4TupleExpressionBuilder::new(
            self.ctx.clone(),
            self.typ.clone(),
            expr,
        ))
    }
}

/// ARC-4 structs construct from their field values (often the result of the
/// tuple-to-struct conversion path)
pub struct Arc4StructTypeBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    loc: Option<SourceLocation>,
}

impl Arc4StructTypeBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, loc: Option<SourceLocation>) -> Self {
        debug_assert!(matches!(typ, Arc4Type::Struct(_)));
        Self { ctx, typ, loc }
    }
}

impl TypeBuilder for Arc4StructTypeBuilder {
    fn produces(&self) -> WType {
        WType::Arc4(self.typ.clone())
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let Arc4Type::Struct(struct_type) = &self.typ else {
            unreachable!("checked at construction");
        };
        let wtype = WType::Arc4(self.typ.clone());
        if args.len() != struct_type.fields.len() {
            self.ctx.error(
                format!(
                    "expected {} field value{} for {}, got {}",
                    struct_type.fields.len(),
                    if struct_type.fields.len() == 1 { "" } else { "s" },
                    struct_type.name,
                    args.len()
                ),
                loc.or(self.loc),
            );
            return super::super::dummy_builder(self.ctx.clone(), wtype, loc);
        }
        let mut items = Vec::with_capacity(args.len());
        for (arg, (field_name, field_type)) in args.iter().zip(&struct_type.fields) {
            let field_wtype = WType::Arc4(field_type.clone());
            if arg.wtype() != field_wtype {
                self.ctx.error(
                    format!(
                        "invalid type for field {field_name}: expected {}, got {}",
                        field_wtype.name(),
                        arg.wtype().name()
                    ),
                    arg.loc().or(loc),
                );
                items.push(Expression::dummy(field_wtype, arg.loc()));
            } else {
                items.push(arg.resolve());
            }
        }
        let tuple_wtype = WType::tuple_type(
            items.iter().map(|i| i.wtype.clone()).collect(),
            loc,
        )
        .expect("struct fields are never empty");
        let expr = Expression::new(
            ExprKind::Arc4Encode {
                value: Box::new(Expression::new(
                    ExprKind::TupleExpression(items),
                    tuple_wtype,
                    loc,
                )),
            },
            wtype,
            loc,
        );
        super::super::builder_for_instance(self.ctx.clone(), expr)
    }
}

pub struct Arc4TupleExpressionBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    expr: Expression,
}

impl Arc4TupleExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, expr: Expression) -> Self {
        Self { ctx, typ, expr }
    }

    fn item_types(&self) -> Vec<Arc4Type> {
        match &self.typ {
            Arc4Type::Tuple(tuple) => tuple.types.clone(),
            _ => vec![],
        }
    }
}

impl InstanceBuilder for Arc4TupleExpressionBuilder {
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

    fn index(&self, index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        let Some(LiteralValue::Int(index_value)) = index.resolve_literal() else {
            self.ctx
                .error("arc4.tuple can only be indexed by int constants", loc);
            return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
        };
        let types = self.item_types();
        let idx = match usize::try_from(index_value) {
            Ok(idx) if idx < types.len() => idx,
            _ => {
                self.ctx.error("tuple index out of bounds", loc);
                return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
            }
        };
        let item_wtype = WType::Arc4(types[idx].clone());
        let expr = Expression::new(
            ExprKind::TupleItem {
                base: Box::new(self.expr.clone()),
                index: idx,
            },
            item_wtype,
            loc,
        );
        super::super::builder_for_instance(self.ctx.clone(), expr)
    }

    fn member_access(&self, name: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        match name {
            "native" => {
                let native = self
                    .typ
                    .decode_type()
                    .expect("arc4 tuples always have a native tuple equivalent");
                let expr = Expression::new(
                    ExprKind::Arc4Decode {
                        value: Box::new(self.expr.clone()),
                    },
                    native,
                    loc,
                );
                super::super::builder_for_instance(self.ctx.clone(), expr)
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
        // tuples are never empty, so the value is always truthy
        Box::new(super::super::bool_::BoolExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bool_(!negate, loc),
        ))
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        compare_bytes(&self.ctx, self, other, op, loc)
    }

    fn contains(&self, _item: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        self.ctx
            .error("item containment with ARC-4 tuples is currently unsupported", loc);
        super::super::dummy_builder(self.ctx.clone(), WType::Bool, loc)
    }

    fn iterate(
        &self,
        loc: Option<SourceLocation>,
    ) -> Result<Vec<Expression>, crate::error::CodeError> {
        // only homogeneous tuples could support this; a static array is the
        // type for that
        Err(crate::error::CodeError::new(
            "iterating ARC-4 tuples is currently unsupported",
            loc.or(self.expr.loc),
        ))
    }

    fn slice_index(
        &self,
        _begin: Option<&dyn InstanceBuilder>,
        _end: Option<&dyn InstanceBuilder>,
        loc: Option<SourceLocation>,
    ) -> BoxedInstance {
        self.ctx
            .error("slicing ARC-4 tuples is currently unsupported", loc);
        super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
    }
}
