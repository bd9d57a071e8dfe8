//! Diagnostics sink
//!
//! Every [`CodeModel`](crate::CodeModel) and source reader reports non-fatal
//! findings (replaced accessors, malformed annotation syntax, unresolved field
//! references) into an injected [`DiagnosticSink`] instead of a global logger.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Fine grained tracing output
    Trace,
    /// Information useful while debugging a model
    Debug,
    /// Input was malformed but processing continued
    Warning,
    /// Processing of an element failed
    Error,
}

/// Stable classification of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Unexpected syntax in annotations, modifiers, or literals
    MalformedInput,
    /// A property accessor or field replaced an earlier one
    ReplacedAccessor,
    /// A method looked like an accessor but was rejected
    IgnoredAccessor,
    /// A field reference could not be resolved
    UnresolvedField,
    /// More than one doc comment precedes an element
    DuplicateDoc,
    /// Syntax the reader does not understand was skipped
    UnknownSyntax,
    /// A type reference could not be resolved and a placeholder was created
    UnresolvedType,
}

impl DiagnosticCode {
    /// Short identifier of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::MalformedInput => "S001",
            DiagnosticCode::ReplacedAccessor => "S002",
            DiagnosticCode::IgnoredAccessor => "S003",
            DiagnosticCode::UnresolvedField => "S004",
            DiagnosticCode::DuplicateDoc => "S005",
            DiagnosticCode::UnknownSyntax => "S006",
            DiagnosticCode::UnresolvedType => "S007",
        }
    }
}

/// Position inside a character source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Byte offset
    pub offset: usize,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic message
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Classification
    pub code: DiagnosticCode,
    /// Human readable message
    pub message: String,
    /// What the message is about (file name, node path)
    pub subject: Option<String>,
    /// Source position, if the diagnostic originates from text
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            code,
            message: message.into(),
            subject: None,
            location: None,
        }
    }

    /// Create a debug diagnostic
    pub fn debug(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, code, message)
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Attach the subject
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attach a source location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " in {}", subject)?;
        }
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        Ok(())
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink {
    /// Report a diagnostic
    fn report(&self, diagnostic: Diagnostic);
}

/// Shared handle to a sink
pub type SharedSink = Rc<dyn DiagnosticSink>;

/// Forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let code = diagnostic.code.as_str();
        match diagnostic.severity {
            Severity::Trace => tracing::trace!(code, "{}", diagnostic),
            Severity::Debug => tracing::debug!(code, "{}", diagnostic),
            Severity::Warning => tracing::warn!(code, "{}", diagnostic),
            Severity::Error => tracing::error!(code, "{}", diagnostic),
        }
    }
}

/// Records diagnostics in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded diagnostics
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Number of recorded diagnostics with the given code
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.code == code)
            .count()
    }

    /// Check whether nothing at warning level or above was recorded
    pub fn is_clean(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .all(|d| d.severity < Severity::Warning)
    }

    /// Drop all recorded diagnostics
    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_counts_by_code() {
        let sink = CollectingSink::new();
        sink.report(Diagnostic::warning(DiagnosticCode::MalformedInput, "bad"));
        sink.report(Diagnostic::debug(DiagnosticCode::ReplacedAccessor, "replaced"));
        sink.report(Diagnostic::warning(DiagnosticCode::MalformedInput, "worse"));

        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 2);
        assert_eq!(sink.count(DiagnosticCode::ReplacedAccessor), 1);
        assert!(!sink.is_clean());

        sink.clear();
        assert!(sink.is_clean());
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::warning(DiagnosticCode::MalformedInput, "missing '='")
            .with_subject("Foo.java")
            .with_location(Location {
                offset: 10,
                line: 2,
                column: 5,
            });
        assert_eq!(
            diagnostic.to_string(),
            "[S001] missing '=' in Foo.java at 2:5"
        );
    }
}
