//! Guards against runaway parser loops and unbounded nesting

use crate::error::{ParseError, ParseResult};
use crate::scanner::Span;

/// Maximum iterations of any parser loop
const MAX_LOOP_ITERATIONS: usize = 100_000;

/// Maximum nesting of type declarations and type arguments
///
/// Kept low so the recursive descent stays far away from the stack limit of
/// test threads in debug builds.
pub const MAX_NESTING_DEPTH: usize = 30;

/// Counts iterations of one parser loop
///
/// ```ignore
/// let mut guard = LoopGuard::new("members");
/// while !done {
///     guard.check(span)?;
/// }
/// ```
pub struct LoopGuard {
    name: &'static str,
    count: usize,
    max: usize,
}

impl LoopGuard {
    /// Guard with the default limit
    pub fn new(name: &'static str) -> Self {
        Self::with_limit(name, MAX_LOOP_ITERATIONS)
    }

    /// Guard with a custom limit
    pub fn with_limit(name: &'static str, max: usize) -> Self {
        Self { name, count: 0, max }
    }

    /// Count one iteration
    pub fn check(&mut self, span: Span) -> ParseResult<()> {
        self.count += 1;
        if self.count > self.max {
            return Err(ParseError::parser_limit_exceeded(
                format!("Loop '{}' exceeded {} iterations", self.name, self.max),
                span,
            ));
        }
        Ok(())
    }
}

/// Fail once `depth` exceeds [`MAX_NESTING_DEPTH`]
pub fn check_depth(depth: usize, span: Span) -> ParseResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::parser_limit_exceeded(
            format!("Nesting exceeds {} levels", MAX_NESTING_DEPTH),
            span,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    #[test]
    fn test_loop_guard_limit() {
        let mut guard = LoopGuard::with_limit("test", 2);
        assert!(guard.check(Span::default()).is_ok());
        assert!(guard.check(Span::default()).is_ok());
        let error = guard.check(Span::default()).unwrap_err();
        assert!(matches!(error.kind, ParseErrorKind::ParserLimitExceeded { .. }));
    }

    #[test]
    fn test_depth_limit() {
        assert!(check_depth(MAX_NESTING_DEPTH, Span::default()).is_ok());
        assert!(check_depth(MAX_NESTING_DEPTH + 1, Span::default()).is_err());
    }
}
