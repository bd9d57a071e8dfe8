//! Rendering of parse errors and reader diagnostics
//!
//! Errors and diagnostics carrying a source position are rendered with
//! `codespan-reporting`, either to the terminal or into a plain string.

use crate::error::ParseError;
use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::{self, SimpleFiles};
use codespan_reporting::term;
use std::ops::Range;
use strata_model::{Diagnostic, Severity};
use termcolor::{ColorChoice, NoColor, StandardStream, WriteColor};

/// Single file database for rendering
pub fn create_files(name: &str, source: &str) -> (SimpleFiles<String, String>, usize) {
    let mut files = SimpleFiles::new();
    let file_id = files.add(name.to_string(), source.to_string());
    (files, file_id)
}

/// Byte range of one character starting at `offset`, clamped to the source
fn label_range(source: &str, offset: usize, end: usize) -> Range<usize> {
    let start = offset.min(source.len());
    if end > start {
        return start..end.min(source.len());
    }
    let width = source[start..].chars().next().map(char::len_utf8).unwrap_or(0);
    start..start + width
}

fn severity(severity: Severity) -> CsSeverity {
    match severity {
        Severity::Trace | Severity::Debug => CsSeverity::Note,
        Severity::Warning => CsSeverity::Warning,
        Severity::Error => CsSeverity::Error,
    }
}

/// Convert a parse error into a codespan diagnostic
pub fn parse_error_diagnostic(error: &ParseError, source: &str, file_id: usize) -> CsDiagnostic<usize> {
    let range = label_range(source, error.span.start, error.span.end);
    CsDiagnostic::error()
        .with_message(&error.message)
        .with_labels(vec![Label::primary(file_id, range)])
}

/// Convert a model diagnostic into a codespan diagnostic
///
/// Diagnostics without a location render without a label.
pub fn model_diagnostic(diagnostic: &Diagnostic, source: &str, file_id: usize) -> CsDiagnostic<usize> {
    let mut inner = CsDiagnostic::new(severity(diagnostic.severity))
        .with_code(diagnostic.code.as_str())
        .with_message(&diagnostic.message);
    if let Some(location) = diagnostic.location {
        let range = label_range(source, location.offset, location.offset);
        inner = inner.with_labels(vec![Label::primary(file_id, range)]);
    }
    if let Some(subject) = &diagnostic.subject {
        inner = inner.with_notes(vec![format!("in {}", subject)]);
    }
    inner
}

fn emit_all(
    writer: &mut dyn WriteColor,
    files: &SimpleFiles<String, String>,
    diagnostics: &[CsDiagnostic<usize>],
) -> Result<(), files::Error> {
    let config = term::Config::default();
    for diagnostic in diagnostics {
        term::emit(writer, &config, files, diagnostic)?;
    }
    Ok(())
}

/// Print a parse error to stderr
pub fn emit_parse_error(error: &ParseError, name: &str, source: &str) -> Result<(), files::Error> {
    let (files, file_id) = create_files(name, source);
    let mut writer = StandardStream::stderr(ColorChoice::Auto);
    emit_all(&mut writer, &files, &[parse_error_diagnostic(error, source, file_id)])
}

/// Print model diagnostics to stderr
pub fn emit_diagnostics(diagnostics: &[Diagnostic], name: &str, source: &str) -> Result<(), files::Error> {
    let (files, file_id) = create_files(name, source);
    let rendered: Vec<_> = diagnostics
        .iter()
        .map(|d| model_diagnostic(d, source, file_id))
        .collect();
    let mut writer = StandardStream::stderr(ColorChoice::Auto);
    emit_all(&mut writer, &files, &rendered)
}

/// Render a parse error without colors
pub fn render_parse_error(error: &ParseError, name: &str, source: &str) -> Result<String, files::Error> {
    let (files, file_id) = create_files(name, source);
    render(&files, &[parse_error_diagnostic(error, source, file_id)])
}

/// Render model diagnostics without colors
pub fn render_diagnostics(diagnostics: &[Diagnostic], name: &str, source: &str) -> Result<String, files::Error> {
    let (files, file_id) = create_files(name, source);
    let rendered: Vec<_> = diagnostics
        .iter()
        .map(|d| model_diagnostic(d, source, file_id))
        .collect();
    render(&files, &rendered)
}

fn render(files: &SimpleFiles<String, String>, diagnostics: &[CsDiagnostic<usize>]) -> Result<String, files::Error> {
    let mut writer = NoColor::new(Vec::new());
    emit_all(&mut writer, files, diagnostics)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Span;
    use strata_model::{DiagnosticCode, Location};

    const SOURCE: &str = "class A {\n    int x\n}\n";

    #[test]
    fn test_render_parse_error() {
        let error = ParseError::unexpected_char("';'", '}', Span::new(20, 21, 3, 1));
        let text = render_parse_error(&error, "A.java", SOURCE).unwrap();
        assert!(text.contains("error"));
        assert!(text.contains("Expected ';'"));
        assert!(text.contains("A.java:3:1"));
    }

    #[test]
    fn test_render_diagnostic_with_location() {
        let diagnostic = Diagnostic::warning(DiagnosticCode::MalformedInput, "Duplicate modifier 'static'")
            .with_subject("A.java")
            .with_location(Location {
                offset: 14,
                line: 2,
                column: 5,
            });
        let text = render_diagnostics(&[diagnostic], "A.java", SOURCE).unwrap();
        assert!(text.contains("warning[S001]"));
        assert!(text.contains("Duplicate modifier"));
        assert!(text.contains("A.java:2:5"));
        assert!(text.contains("in A.java"));
    }

    #[test]
    fn test_render_diagnostic_without_location() {
        let diagnostic = Diagnostic::debug(DiagnosticCode::UnknownSyntax, "Initializer block skipped");
        let text = render_diagnostics(&[diagnostic], "A.java", SOURCE).unwrap();
        assert!(text.contains("note[S006]"));
        assert!(!text.contains("A.java:"));
    }

    #[test]
    fn test_label_range_clamped() {
        assert_eq!(label_range("ab", 5, 5), 2..2);
        assert_eq!(label_range("ab", 0, 0), 0..1);
        assert_eq!(label_range("ab", 0, 9), 0..2);
    }
}
