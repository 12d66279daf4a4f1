//! Builders for native tuples

use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::error::CodeError;
use crate::source::SourceLocation;
use crate::wtypes::WType;

use super::bool_::BoolExpressionBuilder;
use super::{BoxedInstance, InstanceBuilder, LiteralValue};

/// A tuple display whose items have not been resolved into one expression
/// yet; the ARC-4 conversion path iterates these item-wise
pub struct TupleLiteralBuilder {
    ctx: DiagnosticContext,
    items: Vec<BoxedInstance>,
    loc: Option<SourceLocation>,
}

impl TupleLiteralBuilder {
    pub fn new(
        ctx: DiagnosticContext,
        items: Vec<BoxedInstance>,
        loc: Option<SourceLocation>,
    ) -> Self {
        Self { ctx, items, loc }
    }

    pub fn items(&self) -> &[BoxedInstance] {
        &self.items
    }
}

impl InstanceBuilder for TupleLiteralBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        let types: Vec<WType> = self.items.iter().map(|i| i.wtype()).collect();
        match WType::tuple_type(types, self.loc) {
            Ok(wtype) => wtype,
            Err(_) => WType::Void,
        }
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.loc
    }

    fn resolve(&self) -> Expression {
        let items: Vec<Expression> = self.items.iter().map(|i| i.resolve()).collect();
        Expression::new(ExprKind::TupleExpression(items), self.wtype(), self.loc)
    }

    fn index(&self, index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        match tuple_index_value(index) {
            Some(idx) if idx < self.items.len() => {
                super::builder_for_instance(self.ctx.clone(), self.items[idx].resolve())
            }
            Some(_) => {
                self.ctx.error("tuple index out of bounds", loc);
                super::dummy_builder(self.ctx.clone(), WType::Void, loc)
            }
            None => {
                self.ctx
                    .error("tuples can only be indexed by int constants", loc);
                super::dummy_builder(self.ctx.clone(), WType::Void, loc)
            }
        }
    }

    fn iterate(&self, _loc: Option<SourceLocation>) -> Result<Vec<Expression>, CodeError> {
        Ok(self.items.iter().map(|i| i.resolve()).collect())
    }

    fn as_tuple_items(&self) -> Option<Vec<BoxedInstance>> {
        Some(
            self.items
                .iter()
                .map(|i| super::builder_for_instance(self.ctx.clone(), i.resolve()))
                .collect(),
        )
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        // tuples are never empty, so they are always truthy
        Box::new(BoolExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bool_(!negate, loc),
        ))
    }
}

/// A typed value of tuple type
pub struct TupleExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl TupleExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }

    fn item_types(&self) -> Vec<WType> {
        match &self.expr.wtype {
            WType::Tuple(tuple) => tuple.types.clone(),
            _ => vec![],
        }
    }
}

impl InstanceBuilder for TupleExpressionBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        self.expr.wtype.clone()
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.expr.loc
    }

    fn resolve(&self) -> Expression {
        self.expr.clone()
    }

    fn index(&self, index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        let types = self.item_types();
        match tuple_index_value(index) {
            Some(idx) if idx < types.len() => {
                let expr = Expression::new(
                    ExprKind::TupleItem {
                        base: Box::new(self.expr.clone()),
                        index: idx,
                    },
                    types[idx].clone(),
                    loc,
                );
                super::builder_for_instance(self.ctx.clone(), expr)
            }
            Some(_) => {
                self.ctx.error("tuple index out of bounds", loc);
                super::dummy_builder(self.ctx.clone(), WType::Void, loc)
            }
            None => {
                self.ctx
                    .error("tuples can only be indexed by int constants", loc);
                super::dummy_builder(self.ctx.clone(), WType::Void, loc)
            }
        }
    }

    fn iterate(&self, loc: Option<SourceLocation>) -> Result<Vec<Expression>, CodeError> {
        let types = self.item_types();
        Ok(types
            .into_iter()
            .enumerate()
            .map(|(idx, wtype)| {
                Expression::new(
                    ExprKind::TupleItem {
                        base: Box::new(self.expr.clone()),
                        index: idx,
                    },
                    wtype,
                    loc,
                )
            })
            .collect())
    }

    fn as_tuple_items(&self) -> Option<Vec<BoxedInstance>> {
        let items = self.iterate(self.expr.loc).ok()?;
        Some(
            items
                .into_iter()
                .map(|item| super::builder_for_instance(self.ctx.clone(), item))
                .collect(),
        )
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        Box::new(BoolExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bool_(!negate, loc),
        ))
    }
}

/// The compile-time index a tuple subscript requires, if present
fn tuple_index_value(index: &dyn InstanceBuilder) -> Option<usize> {
    match index.resolve_literal() {
        Some(LiteralValue::Int(value)) => usize::try_from(value.clone()).ok(),
        _ => match index.resolve().kind {
            ExprKind::UInt64Constant(value) => usize::try_from(value).ok(),
            _ => None,
        },
    }
}
