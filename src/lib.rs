//! Compiler core lowering a typed contract AST into AVM bytecode.
//!
//! The pipeline is a straight function composition over immutable IRs:
//! typed AST → AWST (via the expression-builder layer) → MIR → TEAL →
//! bytecode, with a shared diagnostic context collecting user-facing
//! errors along the way.

pub mod arc4;
pub mod assemble;
pub mod awst;
pub mod compile;
pub mod diagnostic;
pub mod eb;
pub mod error;
pub mod mir;
pub mod options;
pub mod source;
pub mod teal;
pub mod varuint;
pub mod wtypes;

// Re-export main types
pub use compile::{CompiledProgram, compile_contract, compile_module};
pub use diagnostic::{Diagnostic, DiagnosticContext, DiagnosticLevel};
pub use error::{CodeError, CompileError, CompileResult, InternalError};
pub use options::{CompileOptions, TemplateValue};
pub use source::{FileId, FileTable, SourceLocation};
pub use wtypes::{Arc4Type, AvmType, WType};
