//! Buffered character scanner
//!
//! The scanner walks a fully buffered source text one character at a time
//! with a single character of lookahead (`peek`) and tracks the byte offset,
//! line, and column of every position for diagnostics.

use crate::error::{ParseError, ParseResult};
use strata_model::Location;
use unicode_xid::UnicodeXID;

/// Source range with the line and column of its start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset after the last character
    pub end: usize,
    /// 1-based line of `start`
    pub line: u32,
    /// 1-based column of `start`
    pub column: u32,
}

impl Span {
    /// Create a span
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check for an empty span
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Text covered by the span
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Start position as a model location
    pub fn location(&self) -> Location {
        Location {
            offset: self.start,
            line: self.line,
            column: self.column,
        }
    }
}

/// Saved scanner position for backtracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    line: u32,
    column: u32,
}

/// Check whether a character can start an identifier
pub fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || UnicodeXID::is_xid_start(c)
}

/// Check whether a character can continue an identifier
pub fn is_identifier_part(c: char) -> bool {
    c == '$' || UnicodeXID::is_xid_continue(c)
}

/// Character scanner over a buffered source text
#[derive(Debug, Clone)]
pub struct CharScanner<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> CharScanner<'a> {
    /// Create a scanner at the start of `source`
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// The whole source text
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Check whether all input was consumed
    pub fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Next character without consuming it
    pub fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// Character `n` positions ahead without consuming anything
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    /// Check whether the remaining input starts with `text`
    pub fn starts_with(&self, text: &str) -> bool {
        self.source[self.pos..].starts_with(text)
    }

    /// Consume one character
    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `c` if it is next
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `text` if the remaining input starts with it
    pub fn eat_str(&mut self, text: &str) -> bool {
        if !self.starts_with(text) {
            return false;
        }
        for _ in text.chars() {
            self.advance();
        }
        true
    }

    /// Consume a keyword if it is next and not the prefix of a longer identifier
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if !self.starts_with(keyword) {
            return false;
        }
        let follows = self.source[self.pos + keyword.len()..].chars().next();
        if follows.is_some_and(is_identifier_part) {
            return false;
        }
        self.eat_str(keyword)
    }

    /// Consume `c` or fail
    pub fn expect(&mut self, c: char) -> ParseResult<()> {
        match self.peek() {
            Some(found) if found == c => {
                self.advance();
                Ok(())
            }
            Some(found) => Err(ParseError::unexpected_char(
                format!("{:?}", c),
                found,
                self.span_here(),
            )),
            None => Err(ParseError::unexpected_eof(format!("{:?}", c), self.span_here())),
        }
    }

    /// Consume characters while `predicate` holds and return them
    pub fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
        }
        &self.source[start..self.pos]
    }

    /// Consume an identifier, `None` if none starts here
    pub fn identifier(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(is_identifier_start) {
            return None;
        }
        let start = self.pos;
        self.advance();
        self.take_while(is_identifier_part);
        Some(&self.source[start..self.pos])
    }

    /// Consume an identifier or fail
    pub fn expect_identifier(&mut self) -> ParseResult<&'a str> {
        match self.identifier() {
            Some(identifier) => Ok(identifier),
            None => Err(self.unexpected("identifier")),
        }
    }

    /// Error for the current position
    pub fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(found) => ParseError::unexpected_char(expected, found, self.span_here()),
            None => ParseError::unexpected_eof(expected, self.span_here()),
        }
    }

    /// Empty span at the current position
    pub fn span_here(&self) -> Span {
        Span::new(self.pos, self.pos, self.line, self.column)
    }

    /// Span from a checkpoint to the current position
    pub fn span_from(&self, start: Checkpoint) -> Span {
        Span::new(start.pos, self.pos, start.line, start.column)
    }

    /// Current position as a model location
    pub fn location(&self) -> Location {
        self.span_here().location()
    }

    /// Save the current position
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    /// Return to a saved position
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
    }

    /// Text between a checkpoint and the current position
    pub fn text_since(&self, checkpoint: Checkpoint) -> &'a str {
        &self.source[checkpoint.pos..self.pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_advance_track_lines() {
        let mut scanner = CharScanner::new("ab\ncd");
        assert_eq!(scanner.peek(), Some('a'));
        assert_eq!(scanner.peek_nth(1), Some('b'));
        scanner.advance();
        scanner.advance();
        scanner.advance();
        let span = scanner.span_here();
        assert_eq!((span.line, span.column, span.start), (2, 1, 3));
    }

    #[test]
    fn test_keywords_need_a_boundary() {
        let mut scanner = CharScanner::new("publicity public");
        assert!(!scanner.eat_keyword("public"));
        assert_eq!(scanner.identifier(), Some("publicity"));
        scanner.take_while(char::is_whitespace);
        assert!(scanner.eat_keyword("public"));
        assert!(scanner.at_eof());
    }

    #[test]
    fn test_expect_reports_found_character() {
        let mut scanner = CharScanner::new(";");
        let error = scanner.expect('{').unwrap_err();
        assert!(error.message.contains("found ';'"));
        scanner.advance();
        assert!(scanner.expect('{').is_err());
    }

    #[test]
    fn test_unicode_identifiers() {
        let mut scanner = CharScanner::new("größe $x _y 1z");
        assert_eq!(scanner.identifier(), Some("größe"));
        scanner.advance();
        assert_eq!(scanner.identifier(), Some("$x"));
        scanner.advance();
        assert_eq!(scanner.identifier(), Some("_y"));
        scanner.advance();
        assert_eq!(scanner.identifier(), None);
    }

    #[test]
    fn test_checkpoint_restore() {
        let mut scanner = CharScanner::new("abc");
        let start = scanner.checkpoint();
        scanner.advance();
        scanner.advance();
        assert_eq!(scanner.text_since(start), "ab");
        scanner.restore(start);
        assert_eq!(scanner.peek(), Some('a'));
    }
}
