//! AWST node definitions.
//!
//! Nodes are immutable once built: the expression-builder layer constructs
//! them, every later stage only reads them. Each expression carries its wire
//! type and an optional source location.

use std::fmt;

use num_bigint::BigUint;

use crate::source::SourceLocation;
use crate::wtypes::WType;

/// Binary operators over `uint64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UInt64BinaryOperator {
    Add,
    Sub,
    Mult,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl UInt64BinaryOperator {
    /// The TEAL op this operator lowers to
    pub fn teal_op(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::FloorDiv => "/",
            Self::Mod => "%",
            Self::Pow => "exp",
            Self::LShift => "shl",
            Self::RShift => "shr",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
        }
    }
}

/// Binary operators over `biguint`; all lower to byte-math ops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigUIntBinaryOperator {
    Add,
    Sub,
    Mult,
    FloorDiv,
    Mod,
    BitOr,
    BitXor,
    BitAnd,
}

impl BigUIntBinaryOperator {
    pub fn teal_op(&self) -> &'static str {
        match self {
            Self::Add => "b+",
            Self::Sub => "b-",
            Self::Mult => "b*",
            Self::FloorDiv => "b/",
            Self::Mod => "b%",
            Self::BitOr => "b|",
            Self::BitXor => "b^",
            Self::BitAnd => "b&",
        }
    }
}

/// Numeric comparison operators, shared by `uint64` and `biguint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl NumericComparisonOp {
    pub fn teal_op(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    pub fn biguint_teal_op(&self) -> &'static str {
        match self {
            Self::Eq => "b==",
            Self::Ne => "b!=",
            Self::Lt => "b<",
            Self::Le => "b<=",
            Self::Gt => "b>",
            Self::Ge => "b>=",
        }
    }
}

/// Non-short-circuiting boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn teal_op(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Immediate argument to an intrinsic op call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Immediate(pub u64);

/// A typed expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub wtype: WType,
    pub loc: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    UInt64Constant(u64),
    BigUIntConstant(BigUint),
    BoolConstant(bool),
    BytesConstant(Vec<u8>),
    StringConstant(String),
    /// a checksummed 58-character address literal
    AddressConstant(String),
    /// placeholder substituted at assembly time
    TemplateVar(String),
    VoidConstant,
    VarExpression(String),
    UInt64BinaryOp {
        left: Box<Expression>,
        op: UInt64BinaryOperator,
        right: Box<Expression>,
    },
    BigUIntBinaryOp {
        left: Box<Expression>,
        op: BigUIntBinaryOperator,
        right: Box<Expression>,
    },
    NumericComparison {
        left: Box<Expression>,
        op: NumericComparisonOp,
        right: Box<Expression>,
    },
    BooleanBinaryOp {
        left: Box<Expression>,
        op: BooleanOperator,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    /// direct AVM op invocation: `op_code` with immediates, stack args in
    /// evaluation order
    IntrinsicCall {
        op_code: String,
        immediates: Vec<Immediate>,
        stack_args: Vec<Expression>,
    },
    /// re-encode a native value into the ARC-4 type carried by `wtype`
    Arc4Encode { value: Box<Expression> },
    /// decode an ARC-4 value into the native type carried by `wtype`
    Arc4Decode { value: Box<Expression> },
    TupleExpression(Vec<Expression>),
    TupleItem {
        base: Box<Expression>,
        index: usize,
    },
    /// construct an ARC-4 array (the wtype) from element expressions
    NewArray { elements: Vec<Expression> },
    SubroutineCall {
        name: String,
        args: Vec<Expression>,
    },
    /// reinterpret the same stack value as a different wtype
    ReinterpretCast { value: Box<Expression> },
}

impl Expression {
    pub fn new(kind: ExprKind, wtype: WType, loc: Option<SourceLocation>) -> Self {
        Self { kind, wtype, loc }
    }

    pub fn uint64(value: u64, loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::UInt64Constant(value), WType::Uint64, loc)
    }

    pub fn biguint(value: BigUint, loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::BigUIntConstant(value), WType::BigUInt, loc)
    }

    pub fn bool_(value: bool, loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::BoolConstant(value), WType::Bool, loc)
    }

    pub fn bytes(value: Vec<u8>, loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::BytesConstant(value), WType::Bytes, loc)
    }

    pub fn string(value: impl Into<String>, loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::StringConstant(value.into()), WType::String, loc)
    }

    pub fn void(loc: Option<SourceLocation>) -> Self {
        Self::new(ExprKind::VoidConstant, WType::Void, loc)
    }

    /// A placeholder of the given type, substituted at error sites so that
    /// traversal can continue after a reported error
    pub fn dummy(wtype: WType, loc: Option<SourceLocation>) -> Self {
        let kind = match &wtype {
            WType::Uint64 | WType::Bool | WType::Asset | WType::Application => {
                ExprKind::UInt64Constant(0)
            }
            WType::BigUInt => ExprKind::BigUIntConstant(BigUint::ZERO),
            WType::Void => ExprKind::VoidConstant,
            _ => ExprKind::BytesConstant(vec![]),
        };
        Self::new(kind, wtype, loc)
    }
}

/// Assignment targets
#[derive(Debug, Clone, PartialEq)]
pub enum Lvalue {
    Var {
        name: String,
        wtype: WType,
        loc: Option<SourceLocation>,
    },
}

impl Lvalue {
    pub fn wtype(&self) -> &WType {
        match self {
            Self::Var { wtype, .. } => wtype,
        }
    }
}

/// A statement in a subroutine body
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Assign {
        target: Lvalue,
        value: Expression,
        loc: Option<SourceLocation>,
    },
    Return {
        value: Option<Expression>,
        loc: Option<SourceLocation>,
    },
    Assert {
        condition: Expression,
        comment: Option<String>,
        loc: Option<SourceLocation>,
    },
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
        loc: Option<SourceLocation>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
        loc: Option<SourceLocation>,
    },
}

/// A subroutine parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub wtype: WType,
}

/// A single subroutine: the unit MIR lowering works on
#[derive(Debug, Clone, PartialEq)]
pub struct Subroutine {
    pub name: String,
    pub params: Vec<Parameter>,
    pub returns: WType,
    pub body: Vec<Statement>,
    pub loc: Option<SourceLocation>,
}

/// A contract: approval and clear-state programs plus shared subroutines
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub name: String,
    pub approval: Subroutine,
    pub clear_state: Subroutine,
    pub subroutines: Vec<Subroutine>,
    pub loc: Option<SourceLocation>,
}

/// One compilation unit as handed over by the front end
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub contracts: Vec<Contract>,
    pub subroutines: Vec<Subroutine>,
}

// diagnostics only need the type, the full tree is too noisy
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} expression", self.wtype.name())
    }
}
