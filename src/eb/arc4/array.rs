//! Builders for `arc4.dynamic_array` and `arc4.static_array`.
//!
//! Arrays of compile-time constants fold to their encoded bytes; runtime
//! construction is expressed as a `NewArray` node and lowered element-wise.
//! The copy-on-write update surface (`append`, `pop`, `replace`) folds on
//! constant arrays.

use num_bigint::BigInt;

use crate::arc4::{Arc4Value, decode, encode, static_size};
use crate::awst::nodes::{Expression, ExprKind};
use crate::diagnostic::DiagnosticContext;
use crate::error::CodeError;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, WType};

use super::super::uint64::UInt64ExpressionBuilder;
use super::super::{
    BoxedInstance, BuilderComparisonOp, DispatchResult, InstanceBuilder, TypeBuilder,
    bytes_member, compare_bytes,
};
use super::{implicit_arc4_conversion, try_fold_arc4_constant};

pub struct Arc4ArrayTypeBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    loc: Option<SourceLocation>,
}

impl Arc4ArrayTypeBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, loc: Option<SourceLocation>) -> Self {
        debug_assert!(matches!(
            typ,
            Arc4Type::DynamicArray(_) | Arc4Type::StaticArray(_)
        ));
        Self { ctx, typ, loc }
    }

    fn element_type(&self) -> Arc4Type {
        match &self.typ {
            Arc4Type::DynamicArray(a) => a.element.clone(),
            Arc4Type::StaticArray(a) => a.element.clone(),
            _ => unreachable!("checked at construction"),
        }
    }
}

impl TypeBuilder for Arc4ArrayTypeBuilder {
    fn produces(&self) -> WType {
        WType::Arc4(self.typ.clone())
    }

    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let wtype = WType::Arc4(self.typ.clone());
        if let Arc4Type::StaticArray(a) = &self.typ
            && args.len() != a.size
        {
            self.ctx.error(
                format!(
                    "expected {} element{} for {}, got {}",
                    a.size,
                    if a.size == 1 { "" } else { "s" },
                    self.typ.name(),
                    args.len()
                ),
                loc.or(self.loc),
            );
            return super::super::dummy_builder(self.ctx.clone(), wtype, loc);
        }
        let element_wtype = WType::Arc4(self.element_type());
        let mut elements = Vec::with_capacity(args.len());
        for arg in args {
            match implicit_arc4_conversion(&self.ctx, arg, &element_wtype) {
                Ok(converted) => elements.push(converted.resolve()),
                Err(err) => {
                    self.ctx.error(err.message, err.location.or(loc));
                    elements.push(Expression::dummy(element_wtype.clone(), loc));
                }
            }
        }
        // all-constant arrays encode at compile time
        let folded: Option<Vec<Arc4Value>> =
            elements.iter().map(try_fold_arc4_constant).collect();
        let expr = match folded.and_then(|values| {
            encode(&self.typ, &Arc4Value::Sequence(values)).ok()
        }) {
            Some(encoded) => Expression::new(ExprKind::BytesConstant(encoded), wtype, loc),
            None => Expression::new(ExprKind::NewArray { elements }, wtype, loc),
        };
        Box::new(Arc4ArrayExpressionBuilder::new(
            self.ctx.clone(),
            self.typ.clone(),
            expr,
        ))
    }
}

pub struct Arc4ArrayExpressionBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    expr: Expression,
}

impl Arc4ArrayExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, typ: Arc4Type, expr: Expression) -> Self {
        Self { ctx, typ, expr }
    }

    fn element_type(&self) -> Arc4Type {
        match &self.typ {
            Arc4Type::DynamicArray(a) => a.element.clone(),
            Arc4Type::StaticArray(a) => a.element.clone(),
            _ => Arc4Type::Bool,
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self.typ, Arc4Type::DynamicArray(_))
    }

    /// The element values when this array is a compile-time constant
    fn constant_elements(&self) -> Option<Vec<Arc4Value>> {
        match &self.expr.kind {
            ExprKind::BytesConstant(bytes) => match decode(&self.typ, bytes).ok()? {
                Arc4Value::Sequence(values) => Some(values),
                _ => None,
            },
            _ => None,
        }
    }

    fn rebuild_constant(
        &self,
        values: Vec<Arc4Value>,
        loc: Option<SourceLocation>,
    ) -> BoxedInstance {
        match encode(&self.typ, &Arc4Value::Sequence(values)) {
            Ok(encoded) => Box::new(Self::new(
                self.ctx.clone(),
                self.typ.clone(),
                Expression::new(
                    ExprKind::BytesConstant(encoded),
                    WType::Arc4(self.typ.clone()),
                    loc,
                ),
            )),
            Err(err) => {
                self.ctx.report(err);
                super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
            }
        }
    }

    fn length_builder(&self, loc: Option<SourceLocation>) -> BoxedInstance {
        if let Some(values) = self.constant_elements() {
            return Box::new(UInt64ExpressionBuilder::new(
                self.ctx.clone(),
                Expression::uint64(values.len() as u64, loc),
            ));
        }
        let expr = match &self.typ {
            Arc4Type::StaticArray(a) => Expression::uint64(a.size as u64, loc),
            _ => Expression::new(
                ExprKind::IntrinsicCall {
                    op_code: "extract_uint16".into(),
                    immediates: vec![],
                    stack_args: vec![self.expr.clone(), Expression::uint64(0, loc)],
                },
                WType::Uint64,
                loc,
            ),
        };
        Box::new(UInt64ExpressionBuilder::new(self.ctx.clone(), expr))
    }

    /// Resolve an index operand: a literal (possibly negative, counting from
    /// the back) or a runtime uint64 expression
    fn index_operand(&self, index: &dyn InstanceBuilder) -> IndexOperand {
        if let Some(crate::eb::LiteralValue::Int(value)) = index.resolve_literal() {
            return IndexOperand::Literal(value.clone());
        }
        match index.resolve().kind {
            ExprKind::UInt64Constant(value) => IndexOperand::Literal(BigInt::from(value)),
            _ => IndexOperand::Runtime(index.resolve()),
        }
    }

    fn known_length(&self) -> Option<usize> {
        if let Some(values) = self.constant_elements() {
            return Some(values.len());
        }
        match &self.typ {
            Arc4Type::StaticArray(a) => Some(a.size),
            _ => None,
        }
    }

    /// Normalise a literal index against the known length, supporting
    /// negative indices when the length is known
    fn literal_index(&self, value: &BigInt, loc: Option<SourceLocation>) -> Option<usize> {
        let idx = if value.sign() == num_bigint::Sign::Minus {
            let length = self.known_length()?;
            match usize::try_from(-value)
                .ok()
                .and_then(|back| length.checked_sub(back))
            {
                Some(idx) => idx,
                None => {
                    self.ctx.error("array index out of bounds", loc);
                    return None;
                }
            }
        } else {
            usize::try_from(value).ok()?
        };
        if let Some(length) = self.known_length()
            && idx >= length
        {
            self.ctx.error("array index out of bounds", loc);
            return None;
        }
        Some(idx)
    }
}

enum IndexOperand {
    Literal(BigInt),
    Runtime(Expression),
}

impl InstanceBuilder for Arc4ArrayExpressionBuilder {
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
            "length" => self.length_builder(loc),
            "bytes" => bytes_member(&self.ctx, self, loc),
            "append" | "pop" | "replace" if self.is_dynamic() => {
                Box::new(ArrayMethodBuilder {
                    ctx: self.ctx.clone(),
                    typ: self.typ.clone(),
                    base: self.expr.clone(),
                    method: name.to_string(),
                    loc,
                })
            }
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
        self.length_builder(loc).bool_eval(loc, negate)
    }

    fn index(&self, index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        let element = self.element_type();
        let element_wtype = WType::Arc4(element.clone());
        let operand = self.index_operand(index);

        // constant array + constant index folds to the element value
        if let (Some(values), IndexOperand::Literal(value)) =
            (self.constant_elements(), &operand)
        {
            let Some(idx) = self.literal_index(value, loc) else {
                return super::super::dummy_builder(self.ctx.clone(), element_wtype, loc);
            };
            return match encode(&element, &values[idx]) {
                Ok(encoded) => super::super::builder_for_instance(
                    self.ctx.clone(),
                    Expression::new(ExprKind::BytesConstant(encoded), element_wtype, loc),
                ),
                Err(err) => {
                    self.ctx.report(err);
                    super::super::dummy_builder(self.ctx.clone(), element_wtype, loc)
                }
            };
        }

        let header = if self.is_dynamic() { 2u64 } else { 0u64 };
        let index_expr = match operand {
            IndexOperand::Literal(value) => match self.literal_index(&value, loc) {
                Some(idx) => Expression::uint64(idx as u64, loc),
                None if value.sign() == num_bigint::Sign::Minus => {
                    self.ctx.error(
                        "negative indexing requires a statically-sized array",
                        loc,
                    );
                    return super::super::dummy_builder(self.ctx.clone(), element_wtype, loc);
                }
                None => {
                    return super::super::dummy_builder(self.ctx.clone(), element_wtype, loc);
                }
            },
            IndexOperand::Runtime(expr) => expr,
        };

        if matches!(element, Arc4Type::Bool) {
            // bools are bit-packed: read the bit and re-encode
            let bit_base = header * 8;
            let bit_index = Expression::new(
                ExprKind::UInt64BinaryOp {
                    left: Box::new(Expression::uint64(bit_base, loc)),
                    op: crate::awst::nodes::UInt64BinaryOperator::Add,
                    right: Box::new(index_expr),
                },
                WType::Uint64,
                loc,
            );
            let bit = Expression::new(
                ExprKind::IntrinsicCall {
                    op_code: "getbit".into(),
                    immediates: vec![],
                    stack_args: vec![self.expr.clone(), bit_index],
                },
                WType::Uint64,
                loc,
            );
            let native_bool = Expression::new(
                ExprKind::ReinterpretCast {
                    value: Box::new(bit),
                },
                WType::Bool,
                loc,
            );
            let expr = Expression::new(
                ExprKind::Arc4Encode {
                    value: Box::new(native_bool),
                },
                element_wtype,
                loc,
            );
            return super::super::builder_for_instance(self.ctx.clone(), expr);
        }

        let Some(element_size) = static_size(&element) else {
            self.ctx.error(
                "indexing arrays of dynamically-sized elements is not supported",
                loc,
            );
            return super::super::dummy_builder(self.ctx.clone(), element_wtype, loc);
        };
        let offset = Expression::new(
            ExprKind::UInt64BinaryOp {
                left: Box::new(Expression::new(
                    ExprKind::UInt64BinaryOp {
                        left: Box::new(index_expr),
                        op: crate::awst::nodes::UInt64BinaryOperator::Mult,
                        right: Box::new(Expression::uint64(element_size as u64, loc)),
                    },
                    WType::Uint64,
                    loc,
                )),
                op: crate::awst::nodes::UInt64BinaryOperator::Add,
                right: Box::new(Expression::uint64(header, loc)),
            },
            WType::Uint64,
            loc,
        );
        let raw = Expression::new(
            ExprKind::IntrinsicCall {
                op_code: "extract3".into(),
                immediates: vec![],
                stack_args: vec![
                    self.expr.clone(),
                    offset,
                    Expression::uint64(element_size as u64, loc),
                ],
            },
            WType::Bytes,
            loc,
        );
        super::super::arc4_from_bytes(self.ctx.clone(), element, raw, loc)
    }

    fn iterate(&self, loc: Option<SourceLocation>) -> Result<Vec<Expression>, CodeError> {
        let Some(values) = self.constant_elements() else {
            return Err(CodeError::new(
                "only arrays of known contents can be expanded statically",
                loc.or(self.expr.loc),
            ));
        };
        let element = self.element_type();
        let element_wtype = WType::Arc4(element.clone());
        values
            .into_iter()
            .map(|value| {
                encode(&element, &value)
                    .map(|encoded| {
                        Expression::new(
                            ExprKind::BytesConstant(encoded),
                            element_wtype.clone(),
                            loc,
                        )
                    })
                    .map_err(|e| CodeError::new(e.message, loc))
            })
            .collect()
    }

    fn compare(
        &self,
        other: &dyn InstanceBuilder,
        op: BuilderComparisonOp,
        loc: Option<SourceLocation>,
    ) -> DispatchResult {
        compare_bytes(&self.ctx, self, other, op, loc)
    }
}

/// A bound `append`/`pop`/`replace` on a dynamic array; these fold on
/// constant arrays and report otherwise
struct ArrayMethodBuilder {
    ctx: DiagnosticContext,
    typ: Arc4Type,
    base: Expression,
    method: String,
    loc: Option<SourceLocation>,
}

impl InstanceBuilder for ArrayMethodBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        WType::Arc4(self.typ.clone())
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.loc
    }

    fn resolve(&self) -> Expression {
        self.base.clone()
    }

    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        let array = Arc4ArrayExpressionBuilder::new(
            self.ctx.clone(),
            self.typ.clone(),
            self.base.clone(),
        );
        let Some(mut values) = array.constant_elements() else {
            self.ctx.error(
                format!(
                    "{} is only supported on arrays of known contents",
                    self.method
                ),
                loc,
            );
            return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
        };
        let element_wtype = WType::Arc4(array.element_type());
        match (self.method.as_str(), args.as_slice()) {
            ("append", [item]) => {
                let converted = match implicit_arc4_conversion(
                    &self.ctx,
                    reclone(&self.ctx, item),
                    &element_wtype,
                ) {
                    Ok(converted) => converted,
                    Err(err) => {
                        self.ctx.error(err.message, err.location.or(loc));
                        return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
                    }
                };
                match try_fold_arc4_constant(&converted.resolve()) {
                    Some(value) => {
                        values.push(value);
                        array.rebuild_constant(values, loc)
                    }
                    None => {
                        self.ctx
                            .error("append requires a constant element here", loc);
                        super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
                    }
                }
            }
            ("pop", []) => {
                if values.pop().is_none() {
                    self.ctx.error("cannot pop from an empty array", loc);
                }
                array.rebuild_constant(values, loc)
            }
            ("pop", [count]) => match constant_index(count) {
                Some(n) if n <= values.len() => {
                    values.truncate(values.len() - n);
                    array.rebuild_constant(values, loc)
                }
                _ => {
                    self.ctx.error("invalid pop count", loc);
                    super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
                }
            },
            ("replace", [index, item]) => {
                let Some(idx) = constant_index(index).filter(|i| *i < values.len()) else {
                    self.ctx.error("replace index out of bounds", loc);
                    return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
                };
                let converted = match implicit_arc4_conversion(
                    &self.ctx,
                    reclone(&self.ctx, item),
                    &element_wtype,
                ) {
                    Ok(converted) => converted,
                    Err(err) => {
                        self.ctx.error(err.message, err.location.or(loc));
                        return super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc);
                    }
                };
                match try_fold_arc4_constant(&converted.resolve()) {
                    Some(value) => {
                        values[idx] = value;
                        array.rebuild_constant(values, loc)
                    }
                    None => {
                        self.ctx
                            .error("replace requires a constant element here", loc);
                        super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
                    }
                }
            }
            _ => {
                self.ctx.error(
                    format!("invalid arguments for {}", self.method),
                    loc,
                );
                super::super::dummy_builder(self.ctx.clone(), self.wtype(), loc)
            }
        }
    }
}

fn constant_index(operand: &BoxedInstance) -> Option<usize> {
    if let Some(crate::eb::LiteralValue::Int(value)) = operand.resolve_literal() {
        return usize::try_from(value).ok();
    }
    match operand.resolve().kind {
        ExprKind::UInt64Constant(value) => usize::try_from(value).ok(),
        _ => None,
    }
}

/// Re-box an operand without losing its literal-ness
fn reclone(ctx: &DiagnosticContext, item: &BoxedInstance) -> BoxedInstance {
    match item.resolve_literal() {
        Some(literal) => Box::new(super::super::LiteralBuilder::new(
            ctx.clone(),
            literal.clone(),
            item.loc(),
        )),
        None => super::super::builder_for_instance(ctx.clone(), item.resolve()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    use super::super::super::{LiteralBuilder, LiteralValue};

    fn bool_static(size: i64) -> Arc4Type {
        Arc4Type::static_array(WType::Arc4(Arc4Type::Bool), size, None).unwrap()
    }

    fn uint64_dynamic() -> Arc4Type {
        Arc4Type::dynamic_array(
            WType::Arc4(Arc4Type::uint_n(64, None).unwrap()),
            None,
        )
        .unwrap()
    }

    fn literal(ctx: &DiagnosticContext, value: i64) -> LiteralBuilder {
        LiteralBuilder::new(ctx.clone(), LiteralValue::Int(BigInt::from(value)), None)
    }

    #[test]
    fn test_static_bool_array_folds_to_fff0() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), bool_static(12), None);
        let args: Vec<BoxedInstance> = (0..12)
            .map(|_| {
                Box::new(LiteralBuilder::new(
                    ctx.clone(),
                    LiteralValue::Bool(true),
                    None,
                )) as BoxedInstance
            })
            .collect();
        let array = builder.call(args, None);
        assert_eq!(ctx.error_count(), 0);
        assert!(matches!(
            array.resolve().kind,
            ExprKind::BytesConstant(ref b) if hex::encode_upper(b) == "FFF0"
        ));
    }

    #[test]
    fn test_dynamic_bool_array_folds_with_prefix() {
        let ctx = DiagnosticContext::new();
        let typ = Arc4Type::dynamic_array(WType::Arc4(Arc4Type::Bool), None).unwrap();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), typ, None);
        let args: Vec<BoxedInstance> = [true, false, true]
            .into_iter()
            .map(|b| {
                Box::new(LiteralBuilder::new(ctx.clone(), LiteralValue::Bool(b), None))
                    as BoxedInstance
            })
            .collect();
        let array = builder.call(args, None);
        assert!(matches!(
            array.resolve().kind,
            ExprKind::BytesConstant(ref b) if hex::encode_upper(b) == "0003A0"
        ));
    }

    #[test]
    fn test_static_size_mismatch_reports() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), bool_static(2), None);
        builder.call(vec![], None);
        assert_eq!(ctx.error_count(), 1);
    }

    #[test]
    fn test_constant_array_append_pop_replace() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), uint64_dynamic(), None);
        // start empty, append 42
        let arr = builder.call(vec![], None);
        let arr = arr
            .member_access("append", None)
            .call(vec![Box::new(literal(&ctx, 42)) as BoxedInstance], None);
        let length = arr.member_access("length", None);
        assert!(matches!(length.resolve().kind, ExprKind::UInt64Constant(1)));

        // append 0..=4
        let mut arr = arr;
        for i in 0..5 {
            arr = arr
                .member_access("append", None)
                .call(vec![Box::new(literal(&ctx, i)) as BoxedInstance], None);
        }
        // pop 3
        let arr = arr
            .member_access("pop", None)
            .call(vec![Box::new(literal(&ctx, 3)) as BoxedInstance], None);
        let length = arr.member_access("length", None);
        assert!(matches!(length.resolve().kind, ExprKind::UInt64Constant(3)));

        // replace index 2
        let arr = arr.member_access("replace", None).call(
            vec![
                Box::new(literal(&ctx, 2)) as BoxedInstance,
                Box::new(literal(&ctx, 23)) as BoxedInstance,
            ],
            None,
        );
        let item = arr.index(&literal(&ctx, 2), None);
        let expected = encode(
            &Arc4Type::uint_n(64, None).unwrap(),
            &Arc4Value::uint(23),
        )
        .unwrap();
        assert!(matches!(
            item.resolve().kind,
            ExprKind::BytesConstant(ref b) if *b == expected
        ));
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_negative_index_on_constant_array() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), uint64_dynamic(), None);
        let args: Vec<BoxedInstance> = [1, 2, 3]
            .into_iter()
            .map(|v| Box::new(literal(&ctx, v)) as BoxedInstance)
            .collect();
        let arr = builder.call(args, None);
        let last = arr.index(&literal(&ctx, -1), None);
        let expected = encode(
            &Arc4Type::uint_n(64, None).unwrap(),
            &Arc4Value::uint(3),
        )
        .unwrap();
        assert!(matches!(
            last.resolve().kind,
            ExprKind::BytesConstant(ref b) if *b == expected
        ));
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_runtime_index_emits_extract(){
        let ctx = DiagnosticContext::new();
        let typ = uint64_dynamic();
        let arr = Arc4ArrayExpressionBuilder::new(
            ctx.clone(),
            typ.clone(),
            Expression::new(
                ExprKind::VarExpression("xs".into()),
                WType::Arc4(typ),
                None,
            ),
        );
        let idx = super::super::super::builder_for_instance(
            ctx.clone(),
            Expression::new(ExprKind::VarExpression("i".into()), WType::Uint64, None),
        );
        let item = arr.index(&*idx, None);
        assert_eq!(ctx.error_count(), 0);
        assert!(matches!(item.resolve().kind, ExprKind::ReinterpretCast { .. }));
    }

    #[test]
    fn test_out_of_bounds_literal_reports() {
        let ctx = DiagnosticContext::new();
        let builder = Arc4ArrayTypeBuilder::new(ctx.clone(), bool_static(2), None);
        let args: Vec<BoxedInstance> = (0..2)
            .map(|_| {
                Box::new(LiteralBuilder::new(
                    ctx.clone(),
                    LiteralValue::Bool(false),
                    None,
                )) as BoxedInstance
            })
            .collect();
        let arr = builder.call(args, None);
        arr.index(&literal(&ctx, 5), None);
        assert_eq!(ctx.error_count(), 1);
    }
}
