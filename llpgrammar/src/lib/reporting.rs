//! Collecting the errors and warnings found while generating tables, so that as many as possible
//! can be reported to the user in one go.

use std::fmt;

use crate::{Span, Spanned, SpansKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

/// A rendered error or warning. Table-phase problems refer to productions rather than to
/// places in the source, so they are turned into a `Diagnostic` once, when the grammar is still
/// at hand to name things.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// May be empty if the problem can't be tied to any part of the source.
    pub spans: Vec<Span>,
    pub spanskind: SpansKind,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: String,
        spans: Vec<Span>,
        spanskind: SpansKind,
    ) -> Self {
        Diagnostic {
            severity,
            message,
            spans,
            spanskind,
        }
    }

    pub fn error(e: &impl Spanned) -> Self {
        Self::from_spanned(Severity::Error, e)
    }

    pub fn warning(w: &impl Spanned) -> Self {
        Self::from_spanned(Severity::Warning, w)
    }

    fn from_spanned(severity: Severity, s: &impl Spanned) -> Self {
        Diagnostic::new(severity, s.to_string(), s.spans().to_vec(), s.spanskind())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Spanned for Diagnostic {
    fn spans(&self) -> &[Span] {
        self.spans.as_slice()
    }

    fn spanskind(&self) -> SpansKind {
        self.spanskind
    }
}

/// A sink for diagnostics. Implementations decide whether to print diagnostics as they arrive
/// or to hold on to them.
pub trait ErrorReport {
    fn report(&mut self, d: Diagnostic);
    /// Has at least one diagnostic of [Severity::Error] been reported?
    fn has_errors(&self) -> bool;
    /// Called once no more diagnostics will be reported.
    fn finish(&mut self) {}
}

/// An [ErrorReport] which stores every diagnostic it is given.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

impl ErrorReport for Diagnostics {
    fn report(&mut self, d: Diagnostic) {
        match d.severity {
            Severity::Error => self.errors.push(d),
            Severity::Warning => self.warnings.push(d),
        }
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
