//! Diagnostic collection for a single compilation

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodeError, CompileError};
use crate::source::SourceLocation;

/// Severity of a diagnostic, in the order the language-server protocol
/// expects them to map
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {} ({loc})", self.level, self.message),
            None => write!(f, "{}: {}", self.level, self.message),
        }
    }
}

/// Append-only diagnostic context for one compilation.
///
/// Cheaply cloneable; all clones share the same underlying store so that the
/// expression-builder layer can capture it at construction time instead of
/// threading it through every call. A fresh context is constructed per
/// invocation; nothing survives across compilations.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticContext {
    store: Rc<RefCell<Vec<Diagnostic>>>,
}

impl DiagnosticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, level: DiagnosticLevel, message: impl Into<String>, location: Option<SourceLocation>) {
        let diagnostic = Diagnostic {
            level,
            message: message.into(),
            location,
        };
        debug!(target: "avmc::diagnostics", %diagnostic, "reported");
        self.store.borrow_mut().push(diagnostic);
    }

    pub fn error(&self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.add(DiagnosticLevel::Error, message, location);
    }

    pub fn warning(&self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.add(DiagnosticLevel::Warning, message, location);
    }

    pub fn info(&self, message: impl Into<String>, location: Option<SourceLocation>) {
        self.add(DiagnosticLevel::Info, message, location);
    }

    /// Record a code error as an error-level diagnostic
    pub fn report(&self, err: CodeError) {
        self.add(DiagnosticLevel::Error, err.message, err.location);
    }

    pub fn error_count(&self) -> usize {
        self.store
            .borrow()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// Drain all diagnostics, sorted by source location within each file.
    /// Diagnostics without a location keep their emission order and sort
    /// before located ones.
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut diagnostics = std::mem::take(&mut *self.store.borrow_mut());
        diagnostics.sort_by_key(|d| d.location.map(|l| (l.file, l.line, l.column)));
        diagnostics
    }

    /// Error gate: check after a pipeline stage whether compilation may
    /// proceed to code generation
    pub fn check_gate(&self) -> Result<(), CompileError> {
        match self.error_count() {
            0 => Ok(()),
            errors => Err(CompileError::ErrorsReported { errors }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileId;

    #[test]
    fn test_gate_passes_on_warnings_only() {
        let ctx = DiagnosticContext::new();
        ctx.warning("something looks off", None);
        ctx.info("fyi", None);
        assert!(ctx.check_gate().is_ok());
    }

    #[test]
    fn test_gate_counts_errors() {
        let ctx = DiagnosticContext::new();
        ctx.error("bad", None);
        ctx.error("worse", None);
        match ctx.check_gate() {
            Err(CompileError::ErrorsReported { errors }) => assert_eq!(errors, 2),
            other => panic!("unexpected gate result: {other:?}"),
        }
    }

    #[test]
    fn test_drain_orders_by_location() {
        let ctx = DiagnosticContext::new();
        ctx.error("later", Some(SourceLocation::new(FileId(0), 9, 0)));
        ctx.error("earlier", Some(SourceLocation::new(FileId(0), 2, 4)));
        let drained = ctx.drain();
        assert_eq!(drained[0].message, "earlier");
        assert_eq!(drained[1].message, "later");
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_clones_share_the_store() {
        let ctx = DiagnosticContext::new();
        let clone = ctx.clone();
        clone.error("seen by both", None);
        assert_eq!(ctx.error_count(), 1);
    }
}
