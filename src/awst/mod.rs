//! The typed abstract syntax tree ("AWST") the expression-builder layer
//! produces and the lowering pipeline consumes

pub mod nodes;

pub use nodes::{
    Contract, Expression, ExprKind, Lvalue, Module, Parameter, Statement, Subroutine,
    BigUIntBinaryOperator, BooleanOperator, NumericComparisonOp, UInt64BinaryOperator,
};
