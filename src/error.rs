//! Error types for the compiler pipeline

use thiserror::Error;

use crate::source::SourceLocation;

/// Result type for operations that can fail with a compiler error
pub type CompileResult<T> = Result<T, CompileError>;

/// A user-addressable error, attributable to the source being compiled.
///
/// Code errors are normally accumulated into the diagnostic context so that
/// compilation can continue and surface further errors in the same run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CodeError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl CodeError {
    pub fn new(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// An invariant violation inside the compiler itself.
///
/// These abort the pipeline: well-formed source must never produce one. The
/// location, when present, is only a hint for bug reports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("internal error: {message}")]
pub struct InternalError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl InternalError {
    pub fn new(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Umbrella error for a compilation run
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Code(#[from] CodeError),

    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error("compilation halted: {errors} error(s) reported")]
    ErrorsReported { errors: usize },

    #[error("assembly error: {0}")]
    Assembly(String),
}

impl CompileError {
    /// Create a new code error without a source location
    pub fn code_error(msg: impl Into<String>) -> Self {
        Self::Code(CodeError::new(msg, None))
    }

    /// Create a new internal error without a source location
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(InternalError::new(msg, None))
    }

    /// Create a new assembly error
    pub fn assembly_error(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }
}
