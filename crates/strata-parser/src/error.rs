//! Parse error types

use crate::scanner::Span;
use strata_model::CodeError;
use thiserror::Error;

/// A structural parse error with location.
///
/// Only input the reader cannot continue after (end of input inside a
/// declaration, a missing brace) is an error. Malformed annotation or
/// modifier syntax is reported as a diagnostic instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error at {}:{}: {}", .span.line, .span.column, .message)]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,

    /// Source location of the error
    pub span: Span,

    /// Human-readable error message
    pub message: String,
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A specific character or keyword was required
    UnexpectedChar {
        /// What the reader needed
        expected: String,
        /// What it found
        found: char,
    },

    /// Input ended inside a construct
    UnexpectedEof {
        /// What the reader needed
        expected: String,
    },

    /// Construct the reader does not understand
    InvalidSyntax {
        /// Why the input was rejected
        reason: String,
    },

    /// Reader exceeded its nesting or iteration limit
    ParserLimitExceeded {
        /// Which limit was hit
        message: String,
    },
}

impl ParseError {
    /// Create an "unexpected character" error.
    pub fn unexpected_char(expected: impl Into<String>, found: char, span: Span) -> Self {
        let expected = expected.into();
        Self {
            message: format!("Expected {}, found {:?}", expected, found),
            kind: ParseErrorKind::UnexpectedChar { expected, found },
            span,
        }
    }

    /// Create an "unexpected end of input" error.
    pub fn unexpected_eof(expected: impl Into<String>, span: Span) -> Self {
        let expected = expected.into();
        Self {
            message: format!("Unexpected end of input, expected {}", expected),
            kind: ParseErrorKind::UnexpectedEof { expected },
            span,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            message: format!("Invalid syntax: {}", reason),
            kind: ParseErrorKind::InvalidSyntax { reason },
            span,
        }
    }

    /// Create a "limit exceeded" error.
    pub fn parser_limit_exceeded(message: impl Into<String>, span: Span) -> Self {
        let message = message.into();
        Self {
            message: message.clone(),
            kind: ParseErrorKind::ParserLimitExceeded { message },
            span,
        }
    }

    /// Convert into a model error for the compilation unit `name`
    pub fn into_code_error(self, name: impl Into<String>) -> CodeError {
        CodeError::Source {
            name: name.into(),
            message: self.to_string(),
        }
    }
}

/// Result alias of the reader.
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let error = ParseError::unexpected_char("'{'", ';', Span::new(10, 11, 2, 5));
        assert_eq!(error.to_string(), "Parse error at 2:5: Expected '{', found ';'");
    }

    #[test]
    fn test_into_code_error() {
        let error = ParseError::unexpected_eof("'}'", Span::new(0, 0, 1, 1));
        match error.into_code_error("a.B") {
            CodeError::Source { name, message } => {
                assert_eq!(name, "a.B");
                assert!(message.contains("Unexpected end of input"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
