//! The expression-builder ("eb") layer: semantic resolution of source
//! constructs into typed AWST expressions.
//!
//! Two families of builders exist. A [`TypeBuilder`] stands for a type
//! appearing in source position (callable for construction or conversion); an
//! [`InstanceBuilder`] stands for a typed value and exposes the operations
//! valid on it. Capabilities a builder does not support fall through to
//! defaults that report a diagnostic and substitute a typed dummy value, so
//! one user error never cascades.

pub mod arc4;
pub mod biguint;
pub mod bool_;
pub mod bytes;
pub mod dispatch;
pub mod string;
pub mod tuple;
pub mod uint64;

use num_bigint::BigInt;

use crate::awst::nodes::{Expression, Lvalue, Statement};
use crate::diagnostic::DiagnosticContext;
use crate::error::CodeError;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, WType};

/// Binary operators as written in source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderBinaryOp {
    Add,
    Sub,
    Mult,
    /// true division; integer types redirect this to floor division with a
    /// diagnostic
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BuilderBinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
        }
    }
}

/// Comparison operators as written in source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BuilderComparisonOp {
    /// The comparison with operands swapped
    pub fn reversed(&self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Unary operators as written in source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderUnaryOp {
    Positive,
    Negative,
    BitInvert,
}

/// A literal whose wire type has not been committed yet. Ints are signed so
/// that negative literals survive to the site that decides their meaning
/// (e.g. indexing from the back of an array).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Int(BigInt),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

/// Boxed instance builders flow through the whole layer
pub type BoxedInstance = Box<dyn InstanceBuilder>;

/// Result of an operator attempt: builders decline combinations they do not
/// understand so the dispatch pipeline can try the other operand
pub enum DispatchResult {
    Built(BoxedInstance),
    NotImplemented,
}

/// A type in source position
pub trait TypeBuilder {
    fn produces(&self) -> WType;

    fn context(&self) -> &DiagnosticContext;

    /// Construct or convert: `TypeName(args...)`
    fn call(&self, args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance;

    /// Literal-conversion capability. `None` means this type does not convert
    /// the given literal kind; implementors report conversion failures
    /// themselves and return a dummy.
    fn convert_literal(
        &self,
        _literal: &LiteralValue,
        _loc: Option<SourceLocation>,
    ) -> Option<BoxedInstance> {
        None
    }
}

/// A typed value in source position
pub trait InstanceBuilder {
    fn context(&self) -> &DiagnosticContext;

    fn wtype(&self) -> WType;

    fn loc(&self) -> Option<SourceLocation>;

    /// The underlying AWST expression
    fn resolve(&self) -> Expression;

    /// The assignment target this value denotes, if it denotes one
    fn resolve_lvalue(&self) -> Result<Lvalue, CodeError> {
        Err(CodeError::new(
            format!("{} is not a valid assignment target", self.wtype().name()),
            self.loc(),
        ))
    }

    /// The uncommitted literal behind this builder, if it is one
    fn resolve_literal(&self) -> Option<&LiteralValue> {
        None
    }

    /// For statically-sized tuple values: one builder per item, in order.
    /// Used by the ARC-4 struct conversion path.
    fn as_tuple_items(&self) -> Option<Vec<BoxedInstance>> {
        None
    }

    /// Invoke this value as a callable (bound methods are values too)
    fn call(&self, _args: Vec<BoxedInstance>, loc: Option<SourceLocation>) -> BoxedInstance {
        self.unsupported("calling", loc)
    }

    fn index(&self, _index: &dyn InstanceBuilder, loc: Option<SourceLocation>) -> BoxedInstance {
        self.unsupported("indexing", loc)
    }

    fn member_access(&self, name: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        self.context().error(
            format!("unrecognised member of {}: {name}", self.wtype().name()),
            loc,
        );
        dummy_builder(self.context().clone(), self.wtype(), loc)
    }

    /// Evaluate for truthiness, producing a `bool`-typed builder
    fn bool_eval(&self, loc: Option<SourceLocation>, _negate: bool) -> BoxedInstance {
        self.unsupported("boolean evaluation", loc)
    }

    fn unary_op(&self, op: BuilderUnaryOp, loc: Option<SourceLocation>) -> BoxedInstance {
        let name = match op {
            BuilderUnaryOp::Positive => "unary +",
            BuilderUnaryOp::Negative => "unary -",
            BuilderUnaryOp::BitInvert => "~",
        };
        self.unsupported(name, loc)
    }

    fn compare(
        &self,
        _other: &dyn InstanceBuilder,
        _op: BuilderComparisonOp,
        _loc: Option<SourceLocation>,
    ) -> DispatchResult {
        DispatchResult::NotImplemented
    }

    fn binary_op(
        &self,
        _other: &dyn InstanceBuilder,
        _op: BuilderBinaryOp,
        _loc: Option<SourceLocation>,
        _reverse: bool,
    ) -> DispatchResult {
        DispatchResult::NotImplemented
    }

    fn augmented_assignment(
        &self,
        op: BuilderBinaryOp,
        _rhs: &dyn InstanceBuilder,
        loc: Option<SourceLocation>,
    ) -> Statement {
        self.context().error(
            format!(
                "{}= is not supported for {}",
                op.symbol(),
                self.wtype().name()
            ),
            loc,
        );
        Statement::Expression(Expression::dummy(WType::Void, loc))
    }

    /// The element expressions of a statically-sized collection
    fn iterate(&self, loc: Option<SourceLocation>) -> Result<Vec<Expression>, CodeError> {
        Err(CodeError::new(
            format!("{} is not iterable", self.wtype().name()),
            loc,
        ))
    }

    fn contains(
        &self,
        _item: &dyn InstanceBuilder,
        loc: Option<SourceLocation>,
    ) -> BoxedInstance {
        self.unsupported("item containment", loc)
    }

    fn slice_index(
        &self,
        _begin: Option<&dyn InstanceBuilder>,
        _end: Option<&dyn InstanceBuilder>,
        loc: Option<SourceLocation>,
    ) -> BoxedInstance {
        self.unsupported("slicing", loc)
    }

    /// Report a capability this builder lacks and substitute a dummy of the
    /// same type
    fn unsupported(&self, what: &str, loc: Option<SourceLocation>) -> BoxedInstance {
        self.context().error(
            format!("{what} is not supported for {}", self.wtype().name()),
            loc,
        );
        dummy_builder(self.context().clone(), self.wtype(), loc)
    }
}

/// A literal with no committed wire type yet. Most operations first resolve
/// it against a type-builder; resolving without one commits the default type
/// for the literal kind.
pub struct LiteralBuilder {
    ctx: DiagnosticContext,
    value: LiteralValue,
    loc: Option<SourceLocation>,
}

impl LiteralBuilder {
    pub fn new(ctx: DiagnosticContext, value: LiteralValue, loc: Option<SourceLocation>) -> Self {
        Self { ctx, value, loc }
    }

    pub fn value(&self) -> &LiteralValue {
        &self.value
    }
}

impl InstanceBuilder for LiteralBuilder {
    fn context(&self) -> &DiagnosticContext {
        &self.ctx
    }

    fn wtype(&self) -> WType {
        match &self.value {
            LiteralValue::Int(_) => WType::Uint64,
            LiteralValue::Str(_) => WType::String,
            LiteralValue::Bytes(_) => WType::Bytes,
            LiteralValue::Bool(_) => WType::Bool,
        }
    }

    fn loc(&self) -> Option<SourceLocation> {
        self.loc
    }

    fn resolve_literal(&self) -> Option<&LiteralValue> {
        Some(&self.value)
    }

    fn resolve(&self) -> Expression {
        match &self.value {
            LiteralValue::Int(value) => match u64::try_from(value) {
                Ok(v) => Expression::uint64(v, self.loc),
                Err(_) => {
                    self.ctx
                        .error(format!("value {value} does not fit in uint64"), self.loc);
                    Expression::dummy(WType::Uint64, self.loc)
                }
            },
            LiteralValue::Str(value) => Expression::string(value.clone(), self.loc),
            LiteralValue::Bytes(value) => Expression::bytes(value.clone(), self.loc),
            LiteralValue::Bool(value) => Expression::bool_(*value, self.loc),
        }
    }

    fn bool_eval(&self, loc: Option<SourceLocation>, negate: bool) -> BoxedInstance {
        let truthy = match &self.value {
            LiteralValue::Int(v) => *v != BigInt::ZERO,
            LiteralValue::Str(s) => !s.is_empty(),
            LiteralValue::Bytes(b) => !b.is_empty(),
            LiteralValue::Bool(b) => *b,
        };
        Box::new(bool_::BoolExpressionBuilder::new(
            self.ctx.clone(),
            Expression::bool_(truthy != negate, loc),
        ))
    }
}

/// If `operand` is an unresolved literal the converter understands, commit it;
/// otherwise hand the operand back untouched
pub fn maybe_resolve_literal(
    operand: BoxedInstance,
    converter: &dyn TypeBuilder,
) -> BoxedInstance {
    if let Some(literal) = operand.resolve_literal()
        && let Some(resolved) = converter.convert_literal(literal, operand.loc())
    {
        return resolved;
    }
    operand
}

/// A builder over a typed value with no extra capabilities; used for
/// reference types, transactions, and as the error-recovery dummy
pub struct AnyExpressionBuilder {
    ctx: DiagnosticContext,
    expr: Expression,
}

impl AnyExpressionBuilder {
    pub fn new(ctx: DiagnosticContext, expr: Expression) -> Self {
        Self { ctx, expr }
    }
}

impl InstanceBuilder for AnyExpressionBuilder {
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
}

/// A typed dummy value for error recovery
pub fn dummy_builder(
    ctx: DiagnosticContext,
    wtype: WType,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    builder_for_instance(ctx, Expression::dummy(wtype, loc))
}

/// Wrap an AWST expression in the builder for its wire type
pub fn builder_for_instance(ctx: DiagnosticContext, expr: Expression) -> BoxedInstance {
    match &expr.wtype {
        WType::Bool => Box::new(bool_::BoolExpressionBuilder::new(ctx, expr)),
        WType::Uint64 => Box::new(uint64::UInt64ExpressionBuilder::new(ctx, expr)),
        WType::BigUInt => Box::new(biguint::BigUIntExpressionBuilder::new(ctx, expr)),
        WType::Bytes => Box::new(bytes::BytesExpressionBuilder::new(ctx, expr)),
        WType::String => Box::new(string::StringExpressionBuilder::new(ctx, expr)),
        WType::Tuple(_) => Box::new(tuple::TupleExpressionBuilder::new(ctx, expr)),
        WType::Arc4(arc4) => arc4::builder_for_arc4_instance(ctx, arc4.clone(), expr),
        _ => Box::new(AnyExpressionBuilder::new(ctx, expr)),
    }
}

/// The type-builder for a wire type appearing in source position, when the
/// type is denotable there
pub fn builder_for_type(
    ctx: DiagnosticContext,
    wtype: &WType,
    loc: Option<SourceLocation>,
) -> Option<Box<dyn TypeBuilder>> {
    match wtype {
        WType::Bool => Some(Box::new(bool_::BoolTypeBuilder::new(ctx, loc))),
        WType::Uint64 => Some(Box::new(uint64::UInt64TypeBuilder::new(ctx, loc))),
        WType::BigUInt => Some(Box::new(biguint::BigUIntTypeBuilder::new(ctx, loc))),
        WType::Bytes => Some(Box::new(bytes::BytesTypeBuilder::new(ctx, loc))),
        WType::String => Some(Box::new(string::StringTypeBuilder::new(ctx, loc))),
        WType::Arc4(arc4) => arc4::builder_for_arc4_type(ctx, arc4.clone(), loc),
        _ => None,
    }
}

/// Shared comparison path for bytes-backed builders: equality of the encoded
/// value. Ordering comparisons are declined.
pub(crate) fn compare_bytes(
    ctx: &DiagnosticContext,
    lhs: &dyn InstanceBuilder,
    rhs: &dyn InstanceBuilder,
    op: BuilderComparisonOp,
    loc: Option<SourceLocation>,
) -> DispatchResult {
    use crate::awst::nodes::{ExprKind, NumericComparisonOp};

    if lhs.wtype() != rhs.wtype() {
        return DispatchResult::NotImplemented;
    }
    let operator = match op {
        BuilderComparisonOp::Eq => NumericComparisonOp::Eq,
        BuilderComparisonOp::Ne => NumericComparisonOp::Ne,
        _ => return DispatchResult::NotImplemented,
    };
    let expr = Expression::new(
        ExprKind::NumericComparison {
            left: Box::new(lhs.resolve()),
            op: operator,
            right: Box::new(rhs.resolve()),
        },
        WType::Bool,
        loc,
    );
    DispatchResult::Built(Box::new(bool_::BoolExpressionBuilder::new(
        ctx.clone(),
        expr,
    )))
}

/// Shared `.bytes` member for bytes-backed builders: reinterpret the encoded
/// value as raw bytes
pub(crate) fn bytes_member(
    ctx: &DiagnosticContext,
    value: &dyn InstanceBuilder,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    use crate::awst::nodes::ExprKind;

    let expr = Expression::new(
        ExprKind::ReinterpretCast {
            value: Box::new(value.resolve()),
        },
        WType::Bytes,
        loc,
    );
    Box::new(bytes::BytesExpressionBuilder::new(ctx.clone(), expr))
}

/// Reinterpret raw bytes as a value of the given ARC-4 type
pub(crate) fn arc4_from_bytes(
    ctx: DiagnosticContext,
    target: Arc4Type,
    value: Expression,
    loc: Option<SourceLocation>,
) -> BoxedInstance {
    use crate::awst::nodes::ExprKind;

    let expr = Expression::new(
        ExprKind::ReinterpretCast {
            value: Box::new(value),
        },
        WType::Arc4(target),
        loc,
    );
    builder_for_instance(ctx, expr)
}
