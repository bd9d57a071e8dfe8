//! Low level source reading
//!
//! [`LowLevelReader`] consumes the constructs every declaration shares:
//! whitespace and comments (separating doc comments from ordinary ones),
//! annotation usages, modifier keywords, literals, and the constant
//! expressions found in annotation values and field initializers.
//!
//! Malformed annotation parameters and modifiers never fail the read. They
//! are reported as [`DiagnosticCode::MalformedInput`] warnings and the reader
//! continues with the next parameter or keyword.

use crate::error::{ParseError, ParseResult};
use crate::scanner::{is_identifier_part, is_identifier_start, CharScanner, Checkpoint, Span};
use indexmap::IndexMap;
use strata_model::{
    Comment, Diagnostic, DiagnosticCode, Expression, FieldReference, Literal, Modifier, Modifiers,
    Operator, SharedSink, Visibility,
};

/// Maximum nesting of parenthesized expressions and array initializers
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Comments preceding a declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trivia {
    /// Lines of the last doc comment
    pub doc: Option<Vec<String>>,
    /// Ordinary comments, joined
    pub comment: Option<Comment>,
}

impl Trivia {
    fn add_comment(&mut self, comment: Comment) {
        self.comment = Some(match self.comment.take() {
            Some(existing) => existing.join(comment),
            None => comment,
        });
    }

    fn absorb(&mut self, other: Trivia) {
        if other.doc.is_some() {
            self.doc = other.doc;
        }
        if let Some(comment) = other.comment {
            self.add_comment(comment);
        }
    }
}

/// An annotation usage as written
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSyntax {
    /// Annotation type name as written (possibly simple)
    pub name: String,
    /// Parameters in source order
    pub parameters: IndexMap<String, Expression>,
    /// Source range
    pub span: Span,
}

/// Everything in front of a declaration's keyword or type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationPrefix {
    /// Leading comments
    pub trivia: Trivia,
    /// Annotation usages in source order
    pub annotations: Vec<AnnotationSyntax>,
    /// Modifier keywords and visibility
    pub modifiers: Modifiers,
}

/// Reader for the shared low level constructs of a source text
pub struct LowLevelReader<'a> {
    scanner: CharScanner<'a>,
    sink: SharedSink,
    subject: String,
}

impl<'a> LowLevelReader<'a> {
    /// Create a reader reporting to `sink`; `subject` names the source in diagnostics
    pub fn new(source: &'a str, sink: SharedSink, subject: impl Into<String>) -> Self {
        Self {
            scanner: CharScanner::new(source),
            sink,
            subject: subject.into(),
        }
    }

    /// The underlying scanner
    pub fn scanner(&mut self) -> &mut CharScanner<'a> {
        &mut self.scanner
    }

    /// Read-only view of the underlying scanner
    pub fn scanner_ref(&self) -> &CharScanner<'a> {
        &self.scanner
    }

    /// Report a diagnostic about the current source
    pub fn report(&self, code: DiagnosticCode, warning: bool, message: impl Into<String>, span: Span) {
        let diagnostic = if warning {
            Diagnostic::warning(code, message)
        } else {
            Diagnostic::debug(code, message)
        };
        self.sink.report(
            diagnostic
                .with_subject(self.subject.clone())
                .with_location(span.location()),
        );
    }

    fn malformed(&self, message: impl Into<String>, span: Span) {
        self.report(DiagnosticCode::MalformedInput, true, message, span);
    }

    /// Skip whitespace
    pub fn skip_whitespace(&mut self) {
        self.scanner.take_while(char::is_whitespace);
    }

    /// Skip whitespace and comments, collecting them
    pub fn skip_trivia(&mut self) -> ParseResult<Trivia> {
        let mut trivia = Trivia::default();
        loop {
            self.skip_whitespace();
            let start = self.scanner.checkpoint();
            if self.scanner.starts_with("/**") && !self.scanner.starts_with("/**/") {
                self.scanner.eat_str("/**");
                let text = self.block_body(start)?;
                if trivia.doc.is_some() {
                    self.report(
                        DiagnosticCode::DuplicateDoc,
                        false,
                        "Doc comment replaces an earlier doc comment",
                        self.scanner.span_from(start),
                    );
                }
                trivia.doc = Some(comment_lines(text));
            } else if self.scanner.eat_str("/*") {
                let text = self.block_body(start)?;
                trivia.add_comment(Comment::Block(comment_lines(text)));
            } else if self.scanner.eat_str("//") {
                let text = self.scanner.take_while(|c| c != '\n');
                trivia.add_comment(Comment::SingleLine(text.trim().to_string()));
            } else {
                return Ok(trivia);
            }
        }
    }

    fn block_body(&mut self, start: Checkpoint) -> ParseResult<&'a str> {
        let body = self.scanner.checkpoint();
        while !self.scanner.starts_with("*/") {
            if self.scanner.advance().is_none() {
                return Err(ParseError::unexpected_eof("'*/'", self.scanner.span_from(start)));
            }
        }
        let text = self.scanner.text_since(body);
        self.scanner.eat_str("*/");
        Ok(text)
    }

    /// Read a dotted name (`a.b.C`), allowing whitespace around the dots
    pub fn qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.scanner.expect_identifier()?.to_string();
        loop {
            let before = self.scanner.checkpoint();
            self.skip_whitespace();
            if self.scanner.peek() == Some('.') && self.scanner.peek_nth(1).is_some_and(|c| c != '.') {
                self.scanner.advance();
                self.skip_whitespace();
                match self.scanner.identifier() {
                    Some(segment) => {
                        name.push('.');
                        name.push_str(segment);
                        continue;
                    }
                    None => {
                        self.scanner.restore(before);
                        return Ok(name);
                    }
                }
            }
            self.scanner.restore(before);
            return Ok(name);
        }
    }

    /// Read annotations, modifiers, and comments in any order
    pub fn read_declaration_prefix(&mut self, default_visibility: Visibility) -> ParseResult<DeclarationPrefix> {
        let mut prefix = DeclarationPrefix::default();
        let mut visibility: Option<Visibility> = None;
        let mut keywords: Vec<Modifier> = Vec::new();
        loop {
            let trivia = self.skip_trivia()?;
            prefix.trivia.absorb(trivia);
            if self.scanner.peek() == Some('@') && !self.scanner.starts_with("@interface") {
                let annotation = self.read_annotation()?;
                prefix.annotations.push(annotation);
                continue;
            }
            let start = self.scanner.checkpoint();
            match self.modifier_keyword() {
                Some(Ok(found)) => {
                    let span = self.scanner.span_from(start);
                    match visibility {
                        Some(existing) if existing == found => {
                            self.malformed(format!("Duplicate modifier {}", found.keyword()), span)
                        }
                        Some(existing) => self.malformed(
                            format!("Visibility {} conflicts with {}", found.keyword(), existing.keyword()),
                            span,
                        ),
                        None => visibility = Some(found),
                    }
                }
                Some(Err(found)) => {
                    if keywords.contains(&found) {
                        self.malformed(
                            format!("Duplicate modifier {}", found.keyword()),
                            self.scanner.span_from(start),
                        );
                    }
                    keywords.push(found);
                }
                None => break,
            }
        }
        prefix.modifiers = Modifiers::new(visibility.unwrap_or(default_visibility), keywords);
        Ok(prefix)
    }

    /// Read only modifier keywords
    pub fn read_modifiers(&mut self, default_visibility: Visibility) -> ParseResult<Modifiers> {
        Ok(self.read_declaration_prefix(default_visibility)?.modifiers)
    }

    /// Consume a modifier keyword: `Ok` for visibility, `Err` for the others
    fn modifier_keyword(&mut self) -> Option<Result<Visibility, Modifier>> {
        let start = self.scanner.checkpoint();
        let word = self.scanner.identifier()?;
        if let Some(visibility) = Visibility::from_keyword(word) {
            return Some(Ok(visibility));
        }
        if let Some(modifier) = Modifier::from_keyword(word) {
            // `default` only modifies interface methods; `default:` and
            // annotation defaults are not modifiers
            let rest = self.scanner.checkpoint();
            self.skip_whitespace();
            let is_label = modifier == Modifier::Default && matches!(self.scanner.peek(), Some(':') | Some('"'));
            self.scanner.restore(rest);
            if !is_label {
                return Some(Err(modifier));
            }
        }
        self.scanner.restore(start);
        None
    }

    /// Read one annotation usage starting at `@`
    pub fn read_annotation(&mut self) -> ParseResult<AnnotationSyntax> {
        let start = self.scanner.checkpoint();
        self.scanner.expect('@')?;
        self.skip_whitespace();
        let name = self.qualified_name()?;
        let mut parameters = IndexMap::new();

        let before = self.scanner.checkpoint();
        self.skip_whitespace();
        if self.scanner.eat('(') {
            self.read_annotation_parameters(&name, &mut parameters)?;
        } else {
            self.scanner.restore(before);
        }
        Ok(AnnotationSyntax {
            name,
            parameters,
            span: self.scanner.span_from(start),
        })
    }

    fn read_annotation_parameters(
        &mut self,
        annotation: &str,
        parameters: &mut IndexMap<String, Expression>,
    ) -> ParseResult<()> {
        self.skip_trivia()?;
        if self.scanner.eat(')') {
            return Ok(());
        }
        let mut index = 0usize;
        loop {
            self.skip_trivia()?;
            let start = self.scanner.checkpoint();
            let key = self.parameter_key(annotation);
            self.skip_trivia()?;
            let value = if self.at_value_end() {
                None
            } else {
                Some(self.read_expression()?)
            };
            let span = self.scanner.span_from(start);

            match (key, value) {
                (key, None) => self.malformed(
                    format!(
                        "Missing value of parameter {} of @{}",
                        key.unwrap_or_else(|| (index + 1).to_string()),
                        annotation
                    ),
                    span,
                ),
                (Some(key), Some(value)) => {
                    if parameters.insert(key.clone(), value).is_some() {
                        self.malformed(
                            format!("Parameter {} of @{} is given twice", key, annotation),
                            span,
                        );
                    }
                }
                (None, Some(value)) if index == 0 => {
                    parameters.insert("value".to_string(), value);
                }
                (None, Some(_)) => self.malformed(
                    format!("Unnamed parameter {} of @{} is ignored", index + 1, annotation),
                    span,
                ),
            }
            index += 1;

            self.skip_trivia()?;
            match self.scanner.peek() {
                Some(',') => {
                    self.scanner.advance();
                }
                Some(')') => {
                    self.scanner.advance();
                    return Ok(());
                }
                Some(found) => {
                    // read on after the stray character, the next `)` still closes
                    self.malformed(
                        format!("Unexpected {:?} in parameters of @{}", found, annotation),
                        self.scanner.span_here(),
                    );
                    self.scanner.advance();
                }
                None => return Err(ParseError::unexpected_eof("')'", self.scanner.span_here())),
            }
        }
    }

    fn at_value_end(&self) -> bool {
        matches!(
            self.scanner.peek(),
            None | Some(',') | Some(';') | Some(')') | Some('}') | Some(']')
        )
    }

    /// Key of a `key = value` parameter. A key followed by a value without
    /// `=` is reported and still used as the key.
    fn parameter_key(&mut self, annotation: &str) -> Option<String> {
        let start = self.scanner.checkpoint();
        let Some(identifier) = self.scanner.identifier() else {
            return None;
        };
        let identifier = identifier.to_string();
        self.skip_whitespace();
        if self.scanner.peek() == Some('=') && self.scanner.peek_nth(1) != Some('=') {
            self.scanner.advance();
            self.skip_whitespace();
            return Some(identifier);
        }
        let starts_value = self.scanner.peek().is_some_and(|c| {
            c == '"' || c == '\'' || c == '{' || c == '@' || c.is_ascii_digit() || is_identifier_start(c)
        });
        let is_literal_keyword = matches!(identifier.as_str(), "true" | "false" | "null" | "new");
        if starts_value && !is_literal_keyword {
            self.malformed(
                format!("Missing '=' after parameter {} of @{}", identifier, annotation),
                self.scanner.span_from(start),
            );
            return Some(identifier);
        }
        self.scanner.restore(start);
        None
    }

    /// Read a literal, `None` if no literal starts here
    pub fn read_literal(&mut self) -> ParseResult<Option<Literal>> {
        let start = self.scanner.checkpoint();
        match self.scanner.peek() {
            Some('"') => self.read_string().map(Some),
            Some('\'') => self.read_char().map(Some),
            Some(c) if c.is_ascii_digit() => Ok(Some(self.read_number())),
            Some('.') if self.scanner.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                Ok(Some(self.read_number()))
            }
            Some(c) if is_identifier_start(c) => {
                let literal = match self.scanner.identifier() {
                    Some("true") => Some(Literal::Boolean(true)),
                    Some("false") => Some(Literal::Boolean(false)),
                    Some("null") => Some(Literal::Null),
                    _ => None,
                };
                if literal.is_none() {
                    self.scanner.restore(start);
                }
                Ok(literal)
            }
            _ => Ok(None),
        }
    }

    fn read_escape(&mut self) -> ParseResult<char> {
        let span = self.scanner.span_here();
        let Some(c) = self.scanner.advance() else {
            return Err(ParseError::unexpected_eof("escape sequence", span));
        };
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            's' => ' ',
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                while let Some(digit) = self.scanner.peek().and_then(|d| d.to_digit(8)) {
                    if value * 8 + digit > 0o377 {
                        break;
                    }
                    value = value * 8 + digit;
                    self.scanner.advance();
                }
                char::from_u32(value).unwrap_or('\0')
            }
            'u' => {
                while self.scanner.eat('u') {}
                let digits = self.scanner.take_while(|d| d.is_ascii_hexdigit());
                match u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == 4 => decoded,
                    _ => {
                        self.malformed(format!("Invalid unicode escape \\u{}", digits), span);
                        '\u{fffd}'
                    }
                }
            }
            other => other,
        })
    }

    fn read_string(&mut self) -> ParseResult<Literal> {
        let start = self.scanner.checkpoint();
        self.scanner.expect('"')?;
        let mut value = String::new();
        loop {
            match self.scanner.advance() {
                Some('"') => return Ok(Literal::String(value)),
                Some('\\') => value.push(self.read_escape()?),
                Some('\n') | None => {
                    return Err(ParseError::unexpected_eof("'\"'", self.scanner.span_from(start)))
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_char(&mut self) -> ParseResult<Literal> {
        let start = self.scanner.checkpoint();
        self.scanner.expect('\'')?;
        let value = match self.scanner.advance() {
            Some('\\') => self.read_escape()?,
            Some(c) => c,
            None => return Err(ParseError::unexpected_eof("character", self.scanner.span_from(start))),
        };
        if !self.scanner.eat('\'') {
            self.malformed("Unterminated character literal", self.scanner.span_from(start));
        }
        Ok(Literal::Char(value))
    }

    /// Numeric literal; the suffix picks long, float, or double, a fraction or
    /// exponent without suffix makes a double
    fn read_number(&mut self) -> Literal {
        let start = self.scanner.checkpoint();
        let radix = if self.scanner.starts_with("0x") || self.scanner.starts_with("0X") {
            16
        } else if self.scanner.starts_with("0b") || self.scanner.starts_with("0B") {
            2
        } else {
            10
        };
        if radix != 10 {
            self.scanner.advance();
            self.scanner.advance();
            let digits: String = self
                .scanner
                .take_while(|c| c.is_digit(radix) || c == '_')
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let long = self.scanner.eat('l') || self.scanner.eat('L');
            let span = self.scanner.span_from(start);
            return match u64::from_str_radix(&digits, radix) {
                Ok(value) if long => Literal::Long(value as i64),
                Ok(value) if value <= u32::MAX as u64 => Literal::Int(value as u32 as i32),
                Ok(value) => {
                    self.malformed("Integer literal out of range, read as long", span);
                    Literal::Long(value as i64)
                }
                Err(_) => {
                    self.malformed(format!("Malformed number {}", self.scanner.text_since(start)), span);
                    Literal::Int(0)
                }
            };
        }

        let mut floating = false;
        self.scanner.take_while(|c| c.is_ascii_digit() || c == '_');
        if self.scanner.peek() == Some('.') && self.scanner.peek_nth(1).map_or(true, |c| !is_identifier_start(c)) {
            floating = true;
            self.scanner.advance();
            self.scanner.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.scanner.peek(), Some('e') | Some('E')) {
            let exponent = self.scanner.checkpoint();
            self.scanner.advance();
            if !self.scanner.eat('+') {
                self.scanner.eat('-');
            }
            if self.scanner.take_while(|c| c.is_ascii_digit()).is_empty() {
                self.scanner.restore(exponent);
            } else {
                floating = true;
            }
        }
        let text: String = self
            .scanner
            .text_since(start)
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let suffix = self.scanner.peek().filter(|c| "lLfFdD".contains(*c));
        if suffix.is_some() {
            self.scanner.advance();
        }
        let span = self.scanner.span_from(start);

        let literal = match suffix {
            Some('l') | Some('L') if !floating => text.parse::<i64>().ok().map(Literal::Long),
            Some('f') | Some('F') => text.parse::<f32>().ok().map(Literal::Float),
            Some('d') | Some('D') => text.parse::<f64>().ok().map(Literal::Double),
            None if floating => text.parse::<f64>().ok().map(Literal::Double),
            None => match text.parse::<i32>() {
                Ok(value) => Some(Literal::Int(value)),
                Err(_) => text.parse::<i64>().ok().map(|value| {
                    self.malformed("Integer literal out of range, read as long", span);
                    Literal::Long(value)
                }),
            },
            _ => None,
        };
        literal.unwrap_or_else(|| {
            self.malformed(format!("Malformed number {}", self.scanner.text_since(start)), span);
            Literal::Int(0)
        })
    }

    /// Read a constant expression up to the next `,` `;` or closing bracket
    ///
    /// Expressions the reader cannot structure (method calls, instance
    /// creation, lambdas) are kept as written in an [`Expression::Name`].
    pub fn read_expression(&mut self) -> ParseResult<Expression> {
        let start = self.scanner.checkpoint();
        if let Some(expression) = self.binary(0, 0)? {
            let after = self.scanner.checkpoint();
            self.skip_whitespace();
            let ends = matches!(self.scanner.peek(), None | Some(',') | Some(';') | Some(')') | Some('}') | Some(']'));
            self.scanner.restore(after);
            if ends {
                return Ok(expression);
            }
        }
        self.scanner.restore(start);
        let raw = self.skip_raw();
        if raw.is_empty() {
            return Err(self.scanner.unexpected("expression"));
        }
        self.report(
            DiagnosticCode::UnknownSyntax,
            false,
            format!("Expression kept as written: {}", raw),
            self.scanner.span_from(start),
        );
        Ok(Expression::Name(raw))
    }

    /// Consume text up to the next top level `,` `;` or closing bracket
    fn skip_raw(&mut self) -> String {
        let start = self.scanner.checkpoint();
        let mut depth = 0usize;
        let mut angle = 0usize;
        let mut previous_word_upper = false;
        while let Some(c) = self.scanner.peek() {
            match c {
                '"' | '\'' => {
                    let quote = c;
                    self.scanner.advance();
                    while let Some(inner) = self.scanner.advance() {
                        if inner == '\\' {
                            self.scanner.advance();
                        } else if inner == quote || inner == '\n' {
                            break;
                        }
                    }
                    previous_word_upper = false;
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                '<' if previous_word_upper => angle += 1,
                '>' if angle > 0 => angle -= 1,
                ',' if depth == 0 && angle == 0 => break,
                ';' if depth == 0 => break,
                _ => {}
            }
            if is_identifier_start(c) {
                let word = self.scanner.identifier().unwrap_or_default();
                previous_word_upper = word.chars().next().is_some_and(char::is_uppercase);
                continue;
            }
            if !c.is_whitespace() {
                previous_word_upper = false;
            }
            self.scanner.advance();
        }
        self.scanner.text_since(start).trim().to_string()
    }

    fn operator(&mut self) -> Option<(Operator, u8)> {
        let before = self.scanner.checkpoint();
        self.skip_whitespace();
        for symbol in [
            "&&", "||", "<<", ">>", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "&", "|", "^", "<", ">",
        ] {
            if !self.scanner.starts_with(symbol) {
                continue;
            }
            // `>>>`, `+=`, `a -> b` and friends are not constant operators
            let rest = &self.scanner.source()[self.scanner.position() + symbol.len()..];
            if rest.starts_with('=') && !matches!(symbol, "==" | "!=" | "<=" | ">=")
                || rest.starts_with('>')
                || (symbol == "-" && rest.starts_with('-'))
                || (symbol == "+" && rest.starts_with('+'))
            {
                break;
            }
            if let Some(operator) = Operator::from_symbol(symbol) {
                self.scanner.eat_str(symbol);
                return Some((operator, precedence(operator)));
            }
        }
        self.scanner.restore(before);
        None
    }

    /// Precedence climbing over [`Operator`]; runs of one operator become one
    /// n-ary expression
    fn binary(&mut self, min_precedence: u8, depth: usize) -> ParseResult<Option<Expression>> {
        let Some(mut left) = self.unary(depth)? else {
            return Ok(None);
        };
        loop {
            let before = self.scanner.checkpoint();
            let Some((operator, level)) = self.operator() else {
                return Ok(Some(left));
            };
            if level < min_precedence {
                self.scanner.restore(before);
                return Ok(Some(left));
            }
            let Some(right) = self.binary(level + 1, depth)? else {
                return Ok(None);
            };
            left = match left {
                Expression::NAry {
                    operator: existing,
                    mut operands,
                } if existing == operator => {
                    operands.push(right);
                    Expression::NAry { operator, operands }
                }
                other => Expression::NAry {
                    operator,
                    operands: vec![other, right],
                },
            };
        }
    }

    fn unary(&mut self, depth: usize) -> ParseResult<Option<Expression>> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(ParseError::parser_limit_exceeded(
                format!("Expression nesting exceeds {}", MAX_EXPRESSION_DEPTH),
                self.scanner.span_here(),
            ));
        }
        self.skip_trivia()?;
        if self.scanner.peek() == Some('-') && self.scanner.peek_nth(1) != Some('-') {
            self.scanner.advance();
            let Some(operand) = self.unary(depth + 1)? else {
                return Ok(None);
            };
            return Ok(Some(match operand {
                Expression::Literal(Literal::Int(v)) => Expression::Literal(Literal::Int(v.wrapping_neg())),
                Expression::Literal(Literal::Long(v)) => Expression::Literal(Literal::Long(v.wrapping_neg())),
                Expression::Literal(Literal::Float(v)) => Expression::Literal(Literal::Float(-v)),
                Expression::Literal(Literal::Double(v)) => Expression::Literal(Literal::Double(-v)),
                other => Expression::NAry {
                    operator: Operator::Sub,
                    operands: vec![Expression::int(0), other],
                },
            }));
        }
        self.primary(depth)
    }

    fn primary(&mut self, depth: usize) -> ParseResult<Option<Expression>> {
        if self.scanner.eat('(') {
            let Some(inner) = self.binary(0, depth + 1)? else {
                return Ok(None);
            };
            self.skip_whitespace();
            if !self.scanner.eat(')') {
                return Ok(None);
            }
            return Ok(Some(inner));
        }
        if self.scanner.eat('{') {
            let mut items = Vec::new();
            loop {
                self.skip_trivia()?;
                if self.scanner.eat('}') {
                    return Ok(Some(Expression::ArrayInit(items)));
                }
                items.push(self.read_nested_expression(depth + 1)?);
                self.skip_trivia()?;
                if self.scanner.eat(',') {
                    continue;
                }
                if self.scanner.eat('}') {
                    return Ok(Some(Expression::ArrayInit(items)));
                }
                return Ok(None);
            }
        }
        if self.scanner.peek() == Some('@') {
            let annotation = self.read_annotation()?;
            let text = annotation.span.slice(self.scanner.source()).to_string();
            return Ok(Some(Expression::Name(text)));
        }
        if let Some(literal) = self.read_literal()? {
            return Ok(Some(Expression::Literal(literal)));
        }
        if !self.scanner.peek().is_some_and(is_identifier_start) {
            return Ok(None);
        }
        let start = self.scanner.checkpoint();
        let path = self.qualified_name()?;
        if path == "new" || path.starts_with("new.") {
            self.scanner.restore(start);
            return Ok(None);
        }
        let before = self.scanner.checkpoint();
        self.skip_whitespace();
        if matches!(self.scanner.peek(), Some('(') | Some('[')) || self.scanner.starts_with("->") {
            self.scanner.restore(start);
            return Ok(None);
        }
        self.scanner.restore(before);
        Ok(Some(name_expression(&path)))
    }

    fn read_nested_expression(&mut self, depth: usize) -> ParseResult<Expression> {
        let start = self.scanner.checkpoint();
        if let Some(expression) = self.binary(0, depth)? {
            let after = self.scanner.checkpoint();
            self.skip_whitespace();
            if matches!(self.scanner.peek(), Some(',') | Some('}')) {
                self.scanner.restore(after);
                return Ok(expression);
            }
        }
        self.scanner.restore(start);
        let raw = self.skip_raw();
        Ok(Expression::Name(raw))
    }

    /// Skip a balanced `{ ... }` block and return its inner text
    pub fn read_block(&mut self) -> ParseResult<&'a str> {
        self.read_balanced('{', '}')
    }

    /// Skip a balanced bracket pair, ignoring brackets in strings and
    /// comments, and return the text between the brackets
    pub fn read_balanced(&mut self, opening: char, closing: char) -> ParseResult<&'a str> {
        let open = self.scanner.checkpoint();
        self.scanner.expect(opening)?;
        let inner = self.scanner.checkpoint();
        let mut depth = 1usize;
        loop {
            let Some(c) = self.scanner.peek() else {
                return Err(ParseError::unexpected_eof(
                    format!("{:?}", closing),
                    self.scanner.span_from(open),
                ));
            };
            match c {
                '"' | '\'' => {
                    self.skip_raw_quoted(c);
                    continue;
                }
                '/' if self.scanner.starts_with("//") || self.scanner.starts_with("/*") => {
                    self.skip_trivia()?;
                    continue;
                }
                c if c == opening => depth += 1,
                c if c == closing => {
                    depth -= 1;
                    if depth == 0 {
                        let text = self.scanner.text_since(inner);
                        self.scanner.advance();
                        return Ok(text);
                    }
                }
                _ => {}
            }
            self.scanner.advance();
        }
    }

    fn skip_raw_quoted(&mut self, quote: char) {
        self.scanner.advance();
        while let Some(inner) = self.scanner.advance() {
            if inner == '\\' {
                self.scanner.advance();
            } else if inner == quote || inner == '\n' {
                break;
            }
        }
    }
}

/// Operator precedence, higher binds tighter
fn precedence(operator: Operator) -> u8 {
    match operator {
        Operator::Or => 1,
        Operator::And => 2,
        Operator::BitOr => 3,
        Operator::Xor => 4,
        Operator::BitAnd => 5,
        Operator::Eq | Operator::Ne => 6,
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => 7,
        Operator::Shl | Operator::Shr => 8,
        Operator::Add | Operator::Sub => 9,
        Operator::Mul | Operator::Div | Operator::Rem => 10,
    }
}

/// `Type.class`, `Type.FIELD`, or a plain name
fn name_expression(path: &str) -> Expression {
    if let Some(type_name) = path.strip_suffix(".class") {
        return Expression::TypeLiteral(type_name.to_string());
    }
    if let Some((owner, field)) = path.rsplit_once('.') {
        let owner_is_type = owner
            .rsplit('.')
            .next()
            .and_then(|segment| segment.chars().next())
            .is_some_and(char::is_uppercase);
        if owner_is_type {
            return Expression::FieldReference(FieldReference::new(owner, field, Some(owner.contains('.'))));
        }
    }
    Expression::Name(path.to_string())
}

/// Lines of a comment body with the leading `*` decoration removed
fn comment_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
        })
        .collect();
    while lines.first().is_some_and(String::is_empty) {
        lines.remove(0);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Check whether `word` is an identifier
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use strata_model::CollectingSink;

    fn reader(source: &str) -> (LowLevelReader<'_>, Rc<CollectingSink>) {
        let sink = Rc::new(CollectingSink::new());
        (LowLevelReader::new(source, sink.clone(), "Test.java"), sink)
    }

    #[test]
    fn test_trivia_separates_doc_from_comments() {
        let (mut reader, _) = reader("// one\n/* two\n * three */\n/**\n * Doc line\n */ class");
        let trivia = reader.skip_trivia().unwrap();
        assert_eq!(trivia.doc, Some(vec!["Doc line".to_string()]));
        assert_eq!(
            trivia.comment,
            Some(Comment::Composite(vec![
                Comment::SingleLine("one".into()),
                Comment::Block(vec!["two".into(), "three".into()]),
            ]))
        );
        assert!(reader.scanner().starts_with("class"));
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let (mut reader, _) = reader("/* open");
        assert!(reader.skip_trivia().is_err());
    }

    #[test]
    fn test_annotation_parameters_in_order() {
        let (mut reader, sink) = reader("@Foo(bar=1,baz=\"x\")");
        let annotation = reader.read_annotation().unwrap();
        assert_eq!(annotation.name, "Foo");
        let entries: Vec<(&String, &Expression)> = annotation.parameters.iter().collect();
        assert_eq!(
            entries,
            vec![
                (&"bar".to_string(), &Expression::int(1)),
                (&"baz".to_string(), &Expression::string("x")),
            ]
        );
        assert!(sink.is_clean());
    }

    #[test]
    fn test_first_positional_parameter_is_value() {
        let (mut reader, _) = reader("@SuppressWarnings({\"a\", \"b\"})");
        let annotation = reader.read_annotation().unwrap();
        assert_eq!(
            annotation.parameters.get("value"),
            Some(&Expression::ArrayInit(vec![
                Expression::string("a"),
                Expression::string("b")
            ]))
        );
    }

    #[test]
    fn test_malformed_parameters_are_warnings() {
        let (mut reader, sink) = reader("@Foo(1, 2, bar 3, baz = 4) next");
        let annotation = reader.read_annotation().unwrap();
        let keys: Vec<&str> = annotation.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["value", "bar", "baz"]);
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 2);
        reader.skip_whitespace();
        assert!(reader.scanner().starts_with("next"));
    }

    #[test]
    fn test_annotation_recovers_from_stray_separator() {
        let (mut reader, sink) = reader("@Foo(a=1;b=2) int");
        let annotation = reader.read_annotation().unwrap();
        assert_eq!(annotation.parameters.get("a"), Some(&Expression::int(1)));
        assert_eq!(annotation.parameters.get("b"), Some(&Expression::int(2)));
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 1);
        reader.skip_whitespace();
        assert!(reader.scanner().starts_with("int"));
    }

    #[test]
    fn test_annotation_recovers_from_missing_value() {
        let (mut reader, sink) = reader("@Foo(a=, b=2)");
        let annotation = reader.read_annotation().unwrap();
        assert_eq!(annotation.parameters.len(), 1);
        assert_eq!(annotation.parameters.get("b"), Some(&Expression::int(2)));
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 1);

        let (mut reader, sink) = self::reader("@Foo(x = 1 ], y = 3)");
        let annotation = reader.read_annotation().unwrap();
        assert_eq!(annotation.parameters.get("x"), Some(&Expression::int(1)));
        assert_eq!(annotation.parameters.get("y"), Some(&Expression::int(3)));
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 2);
    }

    #[test]
    fn test_modifiers_with_interleaved_annotations() {
        let (mut reader, sink) = reader("public @Deprecated static final static int");
        let prefix = reader.read_declaration_prefix(Visibility::Default).unwrap();
        assert_eq!(prefix.modifiers.to_string(), "public static final");
        assert_eq!(prefix.annotations.len(), 1);
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 1);
        assert!(reader.scanner().starts_with("int"));
    }

    #[test]
    fn test_default_visibility_applies() {
        let (mut reader, _) = reader("abstract void run();");
        let modifiers = reader.read_modifiers(Visibility::Public).unwrap();
        assert_eq!(modifiers.visibility(), Visibility::Public);
        assert!(modifiers.is_abstract());
    }

    #[test]
    fn test_numeric_literals() {
        let cases = [
            ("42", Literal::Int(42)),
            ("42L", Literal::Long(42)),
            ("1_000", Literal::Int(1000)),
            ("0xFF", Literal::Int(255)),
            ("0xFFFFFFFF", Literal::Int(-1)),
            ("1.5", Literal::Double(1.5)),
            ("1.5f", Literal::Float(1.5)),
            ("2d", Literal::Double(2.0)),
            ("1e3", Literal::Double(1000.0)),
            ("3000000000", Literal::Long(3_000_000_000)),
        ];
        for (text, expected) in cases {
            let (mut reader, _) = reader(text);
            assert_eq!(reader.read_literal().unwrap(), Some(expected), "{}", text);
        }
    }

    #[test]
    fn test_string_and_char_literals() {
        let (mut reader, _) = reader(r#""a\"b\nA" 'c' '\t' true null"#);
        assert_eq!(
            reader.read_literal().unwrap(),
            Some(Literal::String("a\"b\nA".into()))
        );
        reader.skip_whitespace();
        assert_eq!(reader.read_literal().unwrap(), Some(Literal::Char('c')));
        reader.skip_whitespace();
        assert_eq!(reader.read_literal().unwrap(), Some(Literal::Char('\t')));
        reader.skip_whitespace();
        assert_eq!(reader.read_literal().unwrap(), Some(Literal::Boolean(true)));
        reader.skip_whitespace();
        assert_eq!(reader.read_literal().unwrap(), Some(Literal::Null));
    }

    #[test]
    fn test_expressions_follow_precedence() {
        let (mut reader, _) = reader("1 + 2 * 3 + 4;");
        let expression = reader.read_expression().unwrap();
        assert_eq!(
            expression,
            Expression::NAry {
                operator: Operator::Add,
                operands: vec![
                    Expression::int(1),
                    Expression::NAry {
                        operator: Operator::Mul,
                        operands: vec![Expression::int(2), Expression::int(3)],
                    },
                    Expression::int(4),
                ],
            }
        );
    }

    #[test]
    fn test_field_references_and_raw_expressions() {
        let (mut reader, _) = reader("Limits.MAX, String.class, new Foo(1, 2);");
        assert!(matches!(
            reader.read_expression().unwrap(),
            Expression::FieldReference(ref r) if r.type_name == "Limits" && r.field_name == "MAX"
        ));
        reader.scanner().expect(',').unwrap();
        reader.skip_whitespace();
        assert_eq!(
            reader.read_expression().unwrap(),
            Expression::TypeLiteral("String".into())
        );
        reader.scanner().expect(',').unwrap();
        reader.skip_whitespace();
        assert_eq!(
            reader.read_expression().unwrap(),
            Expression::Name("new Foo(1, 2)".into())
        );
        assert_eq!(reader.scanner().peek(), Some(';'));
    }

    #[test]
    fn test_read_block_skips_nested_braces_and_strings() {
        let (mut reader, _) = reader("{ if (x) { s = \"}\"; } // }\n} rest");
        let body = reader.read_block().unwrap();
        assert!(body.contains("if (x)"));
        reader.skip_whitespace();
        assert!(reader.scanner().starts_with("rest"));
    }
}
