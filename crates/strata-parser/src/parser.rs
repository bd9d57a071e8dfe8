//! Declaration parser
//!
//! Recursive descent over the declaration level of a compilation unit:
//! package, imports, types, and their members. Operation bodies are not
//! parsed; their text is kept line by line.

use crate::ast::{
    CompilationUnit, FieldDeclaration, ImportDeclaration, Member, OperationDeclaration, ParameterDeclaration,
    TypeArgument, TypeDeclaration, TypeParameter, TypeReference,
};
use crate::error::{ParseError, ParseResult};
use crate::guards::{check_depth, LoopGuard};
use crate::lowlevel::{DeclarationPrefix, LowLevelReader};
use crate::scanner::{CharScanner, Checkpoint, Span};
use strata_model::{
    BoundKind, DiagnosticCode, Modifier, Modifiers, OperationKind, SharedSink, TypeCategory, Visibility,
};

/// Parser for one compilation unit
pub struct Parser<'a> {
    reader: LowLevelReader<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser; `subject` names the unit in diagnostics
    pub fn new(source: &'a str, sink: SharedSink, subject: impl Into<String>) -> Self {
        Self {
            reader: LowLevelReader::new(source, sink, subject),
            depth: 0,
        }
    }

    /// Parse the whole unit
    pub fn parse(mut self) -> ParseResult<CompilationUnit> {
        let mut unit = CompilationUnit::default();
        let mut prefix = self.prefix(Visibility::Default)?;
        if self.keyword("package") {
            self.ws()?;
            unit.package = Some(self.reader.qualified_name()?);
            self.ws()?;
            self.scanner().expect(';')?;
            prefix = self.prefix(Visibility::Default)?;
        }

        let mut guard = LoopGuard::new("imports");
        while self.keyword("import") {
            guard.check(self.here())?;
            unit.imports.push(self.import()?);
            prefix = self.prefix(Visibility::Default)?;
        }

        let mut guard = LoopGuard::new("types");
        while !self.scanner().at_eof() {
            guard.check(self.here())?;
            if !self.scanner().eat(';') {
                unit.types.push(self.type_declaration(prefix)?);
            }
            prefix = self.prefix(Visibility::Default)?;
        }
        Ok(unit)
    }

    fn scanner(&mut self) -> &mut CharScanner<'a> {
        self.reader.scanner()
    }

    fn here(&self) -> Span {
        self.reader.scanner_ref().span_here()
    }

    fn checkpoint(&self) -> Checkpoint {
        self.reader.scanner_ref().checkpoint()
    }

    fn span_from(&self, start: Checkpoint) -> Span {
        self.reader.scanner_ref().span_from(start)
    }

    fn peek(&self) -> Option<char> {
        self.reader.scanner_ref().peek()
    }

    fn ws(&mut self) -> ParseResult<()> {
        self.reader.skip_trivia().map(|_| ())
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        self.scanner().eat_keyword(keyword)
    }

    fn prefix(&mut self, default_visibility: Visibility) -> ParseResult<DeclarationPrefix> {
        self.reader.read_declaration_prefix(default_visibility)
    }

    fn skip(&self, message: String, span: Span) {
        self.reader.report(DiagnosticCode::UnknownSyntax, false, message, span);
    }

    fn import(&mut self) -> ParseResult<ImportDeclaration> {
        let start = self.checkpoint();
        self.ws()?;
        let is_static = self.keyword("static");
        self.ws()?;
        let mut name = self.reader.qualified_name()?;
        self.ws()?;
        if self.scanner().eat('.') {
            self.ws()?;
            self.scanner().expect('*')?;
            name.push_str(".*");
        }
        self.ws()?;
        self.scanner().expect(';')?;
        Ok(ImportDeclaration {
            name,
            is_static,
            span: self.span_from(start),
        })
    }

    fn at_type_keyword(&mut self) -> bool {
        if self.scanner().starts_with("@interface") {
            return true;
        }
        let start = self.checkpoint();
        let found = ["class", "interface", "enum", "record"]
            .iter()
            .any(|keyword| self.scanner().eat_keyword(keyword));
        self.scanner().restore(start);
        found
    }

    fn type_declaration(&mut self, prefix: DeclarationPrefix) -> ParseResult<TypeDeclaration> {
        check_depth(self.depth, self.here())?;
        let start = self.checkpoint();
        let category = if self.keyword("class") {
            TypeCategory::Class
        } else if self.keyword("interface") {
            TypeCategory::Interface
        } else if self.keyword("enum") {
            TypeCategory::Enumeration
        } else if self.scanner().eat('@') {
            self.ws()?;
            if !self.keyword("interface") {
                return Err(self.scanner().unexpected("'interface'"));
            }
            TypeCategory::Annotation
        } else if self.scanner().starts_with("record") && self.at_type_keyword() {
            return Err(ParseError::invalid_syntax("record declarations are not supported", self.here()));
        } else {
            return Err(self.scanner().unexpected("type declaration"));
        };
        self.ws()?;
        let name = self.scanner().expect_identifier()?.to_string();
        self.ws()?;
        let type_parameters = if self.peek() == Some('<') {
            self.type_parameters()?
        } else {
            Vec::new()
        };

        let mut extends = Vec::new();
        let mut implements = Vec::new();
        loop {
            self.ws()?;
            if self.keyword("extends") {
                extends.extend(self.type_list()?);
            } else if self.keyword("implements") {
                implements.extend(self.type_list()?);
            } else if self.keyword("permits") {
                self.type_list()?;
            } else {
                break;
            }
        }
        let span = self.span_from(start);
        self.ws()?;
        self.scanner().expect('{')?;

        self.depth += 1;
        let members = self.members(&name, category)?;
        self.depth -= 1;

        Ok(TypeDeclaration {
            prefix,
            category,
            name,
            type_parameters,
            extends,
            implements,
            members,
            span,
        })
    }

    /// Members up to and including the closing brace
    fn members(&mut self, type_name: &str, category: TypeCategory) -> ParseResult<Vec<Member>> {
        let mut members = Vec::new();
        if category == TypeCategory::Enumeration && self.enum_constants(type_name, &mut members)? {
            return Ok(members);
        }
        let default_visibility = if category.is_interface() {
            Visibility::Public
        } else {
            Visibility::Default
        };

        let mut guard = LoopGuard::new("members");
        loop {
            guard.check(self.here())?;
            let prefix = self.prefix(default_visibility)?;
            if self.scanner().eat('}') {
                return Ok(members);
            }
            if self.scanner().at_eof() {
                return Err(ParseError::unexpected_eof("'}'", self.here()));
            }
            if self.scanner().eat(';') {
                continue;
            }
            if self.peek() == Some('{') {
                let start = self.checkpoint();
                self.reader.read_block()?;
                self.skip(
                    format!("Initializer block in {} skipped", type_name),
                    self.span_from(start),
                );
                continue;
            }
            if self.at_type_keyword() {
                members.push(Member::Type(self.type_declaration(prefix)?));
                continue;
            }
            self.member(prefix, type_name, category, &mut members)?;
        }
    }

    /// Field declarators or one operation
    fn member(
        &mut self,
        mut prefix: DeclarationPrefix,
        type_name: &str,
        category: TypeCategory,
        members: &mut Vec<Member>,
    ) -> ParseResult<()> {
        let type_parameters = if self.peek() == Some('<') {
            let parameters = self.type_parameters()?;
            self.ws()?;
            parameters
        } else {
            Vec::new()
        };

        let start = self.checkpoint();
        if self.scanner().identifier() == Some(type_name) {
            self.ws()?;
            if self.peek() == Some('(') {
                let span = self.span_from(start);
                let operation = self.operation(
                    prefix,
                    OperationKind::Constructor,
                    type_parameters,
                    type_name.to_string(),
                    None,
                    category,
                    span,
                )?;
                members.push(Member::Operation(operation));
                return Ok(());
            }
        }
        self.scanner().restore(start);

        let returns = self.type_ref()?;
        self.ws()?;
        let name_start = self.checkpoint();
        let name = self.scanner().expect_identifier()?.to_string();
        let span = self.span_from(name_start);
        self.ws()?;

        if self.peek() == Some('(') {
            let operation = self.operation(
                prefix,
                OperationKind::Method,
                type_parameters,
                name,
                Some(returns),
                category,
                span,
            )?;
            members.push(Member::Operation(operation));
            return Ok(());
        }

        if category.is_interface() {
            prefix.modifiers = prefix.modifiers.with(Modifier::Static).with(Modifier::Final);
        }
        self.fields(prefix, returns, name, span, members)
    }

    #[allow(clippy::too_many_arguments)]
    fn operation(
        &mut self,
        mut prefix: DeclarationPrefix,
        kind: OperationKind,
        type_parameters: Vec<TypeParameter>,
        name: String,
        mut returns: Option<TypeReference>,
        category: TypeCategory,
        span: Span,
    ) -> ParseResult<OperationDeclaration> {
        self.scanner().expect('(')?;
        let parameters = self.parameters()?;
        self.ws()?;
        // `int values()[]` declares an array return type
        while self.scanner().eat('[') {
            self.ws()?;
            self.scanner().expect(']')?;
            self.ws()?;
            if let Some(returns) = returns.as_mut() {
                returns.dimensions += 1;
            }
        }
        let exceptions = if self.keyword("throws") {
            self.type_list()?
        } else {
            Vec::new()
        };
        self.ws()?;
        if category == TypeCategory::Annotation && self.keyword("default") {
            self.ws()?;
            let start = self.checkpoint();
            self.reader.read_expression()?;
            self.skip(
                format!("Default value of annotation member {} dropped", name),
                self.span_from(start),
            );
            self.ws()?;
        }

        let body = if self.scanner().eat(';') {
            None
        } else if self.peek() == Some('{') {
            Some(body_lines(self.reader.read_block()?))
        } else {
            return Err(self.scanner().unexpected("'{' or ';'"));
        };

        let modifiers = &prefix.modifiers;
        if category.is_interface()
            && body.is_none()
            && !modifiers.is_static()
            && !modifiers.has(Modifier::Default)
        {
            prefix.modifiers = prefix.modifiers.with(Modifier::Abstract);
        }

        Ok(OperationDeclaration {
            prefix,
            kind,
            type_parameters,
            name,
            returns,
            parameters,
            exceptions,
            body,
            span,
        })
    }

    /// Parameters after `(` up to and including `)`
    fn parameters(&mut self) -> ParseResult<Vec<ParameterDeclaration>> {
        let mut parameters = Vec::new();
        self.ws()?;
        if self.scanner().eat(')') {
            return Ok(parameters);
        }
        let mut guard = LoopGuard::new("parameters");
        loop {
            guard.check(self.here())?;
            let prefix = self.prefix(Visibility::Default)?;
            let mut ty = self.type_ref()?;
            self.ws()?;
            let varargs = self.scanner().eat_str("...");
            self.ws()?;
            let name = self.scanner().expect_identifier()?.to_string();
            self.ws()?;
            while self.scanner().eat('[') {
                self.ws()?;
                self.scanner().expect(']')?;
                self.ws()?;
                ty.dimensions += 1;
            }
            parameters.push(ParameterDeclaration {
                annotations: prefix.annotations,
                is_final: prefix.modifiers.is_final(),
                ty,
                varargs,
                name,
            });
            if self.scanner().eat(',') {
                continue;
            }
            self.scanner().expect(')')?;
            return Ok(parameters);
        }
    }

    /// One or more declarators sharing a prefix and type
    fn fields(
        &mut self,
        prefix: DeclarationPrefix,
        ty: TypeReference,
        first: String,
        first_span: Span,
        members: &mut Vec<Member>,
    ) -> ParseResult<()> {
        let mut name = first;
        let mut span = first_span;
        let mut guard = LoopGuard::new("declarators");
        loop {
            guard.check(span)?;
            let mut field_type = ty.clone();
            while self.scanner().eat('[') {
                self.ws()?;
                self.scanner().expect(']')?;
                self.ws()?;
                field_type.dimensions += 1;
            }
            let initializer = if self.scanner().eat('=') {
                self.ws()?;
                Some(self.reader.read_expression()?)
            } else {
                None
            };
            members.push(Member::Field(FieldDeclaration {
                prefix: prefix.clone(),
                ty: field_type,
                name,
                initializer,
                span,
            }));
            self.ws()?;
            if self.scanner().eat(';') {
                return Ok(());
            }
            if !self.scanner().eat(',') {
                return Err(self.scanner().unexpected("',' or ';'"));
            }
            self.ws()?;
            let start = self.checkpoint();
            name = self.scanner().expect_identifier()?.to_string();
            span = self.span_from(start);
            self.ws()?;
        }
    }

    /// Enum constants as `public static final` fields; `true` if the body
    /// closed after them
    fn enum_constants(&mut self, type_name: &str, members: &mut Vec<Member>) -> ParseResult<bool> {
        let mut guard = LoopGuard::new("enum constants");
        loop {
            guard.check(self.here())?;
            let prefix = self.prefix(Visibility::Public)?;
            if self.scanner().eat(';') {
                return Ok(false);
            }
            if self.scanner().eat('}') {
                return Ok(true);
            }
            let start = self.checkpoint();
            let name = self.scanner().expect_identifier()?.to_string();
            let span = self.span_from(start);
            self.ws()?;
            if self.peek() == Some('(') {
                self.reader.read_balanced('(', ')')?;
                self.ws()?;
            }
            if self.peek() == Some('{') {
                let body = self.checkpoint();
                self.reader.read_block()?;
                self.skip(format!("Body of enum constant {} skipped", name), self.span_from(body));
                self.ws()?;
            }
            members.push(Member::Field(FieldDeclaration {
                prefix: DeclarationPrefix {
                    modifiers: Modifiers::new(Visibility::Public, [Modifier::Static, Modifier::Final]),
                    ..prefix
                },
                ty: TypeReference::named(type_name, span),
                name,
                initializer: None,
                span,
            }));
            if self.scanner().eat(',') {
                continue;
            }
            if self.scanner().eat(';') {
                return Ok(false);
            }
            if self.scanner().eat('}') {
                return Ok(true);
            }
            return Err(self.scanner().unexpected("',', ';' or '}'"));
        }
    }

    fn skip_type_annotations(&mut self) -> ParseResult<()> {
        while self.peek() == Some('@') && !self.scanner().starts_with("@interface") {
            self.reader.read_annotation()?;
            self.ws()?;
        }
        Ok(())
    }

    fn type_list(&mut self) -> ParseResult<Vec<TypeReference>> {
        let mut types = Vec::new();
        loop {
            types.push(self.type_ref()?);
            self.ws()?;
            if !self.scanner().eat(',') {
                return Ok(types);
            }
        }
    }

    fn type_ref(&mut self) -> ParseResult<TypeReference> {
        self.ws()?;
        self.skip_type_annotations()?;
        let start = self.checkpoint();
        let mut name = self.scanner().expect_identifier()?.to_string();
        let mut arguments = Vec::new();
        loop {
            let before = self.checkpoint();
            self.ws()?;
            if self.peek() == Some('<') {
                arguments = self.type_arguments()?;
                continue;
            }
            if self.peek() == Some('.') && self.reader.scanner_ref().peek_nth(1) != Some('.') {
                self.scanner().advance();
                self.ws()?;
                self.skip_type_annotations()?;
                if let Some(segment) = self.scanner().identifier() {
                    name.push('.');
                    name.push_str(segment);
                    arguments.clear();
                    continue;
                }
            }
            self.scanner().restore(before);
            break;
        }

        let mut dimensions = 0;
        loop {
            let before = self.checkpoint();
            self.ws()?;
            if self.scanner().eat('[') {
                self.ws()?;
                if self.scanner().eat(']') {
                    dimensions += 1;
                    continue;
                }
            }
            self.scanner().restore(before);
            break;
        }
        Ok(TypeReference {
            name,
            arguments,
            dimensions,
            span: self.span_from(start),
        })
    }

    fn type_arguments(&mut self) -> ParseResult<Vec<TypeArgument>> {
        check_depth(self.depth, self.here())?;
        self.depth += 1;
        self.scanner().expect('<')?;
        let mut arguments = Vec::new();
        self.ws()?;
        if !self.scanner().eat('>') {
            loop {
                self.ws()?;
                self.skip_type_annotations()?;
                let argument = if self.scanner().eat('?') {
                    self.ws()?;
                    if self.keyword("extends") {
                        TypeArgument::Wildcard {
                            kind: BoundKind::Extends,
                            bound: Some(self.type_ref()?),
                        }
                    } else if self.keyword("super") {
                        TypeArgument::Wildcard {
                            kind: BoundKind::Super,
                            bound: Some(self.type_ref()?),
                        }
                    } else {
                        TypeArgument::Wildcard {
                            kind: BoundKind::Extends,
                            bound: None,
                        }
                    }
                } else {
                    TypeArgument::Type(self.type_ref()?)
                };
                arguments.push(argument);
                self.ws()?;
                if self.scanner().eat(',') {
                    continue;
                }
                self.scanner().expect('>')?;
                break;
            }
        }
        self.depth -= 1;
        Ok(arguments)
    }

    fn type_parameters(&mut self) -> ParseResult<Vec<TypeParameter>> {
        self.scanner().expect('<')?;
        let mut parameters = Vec::new();
        loop {
            self.ws()?;
            self.skip_type_annotations()?;
            let start = self.checkpoint();
            let name = self.scanner().expect_identifier()?.to_string();
            let span = self.span_from(start);
            self.ws()?;
            let mut bounds = Vec::new();
            if self.keyword("extends") {
                loop {
                    bounds.push(self.type_ref()?);
                    self.ws()?;
                    if !self.scanner().eat('&') {
                        break;
                    }
                }
            }
            parameters.push(TypeParameter { name, bounds, span });
            self.ws()?;
            if self.scanner().eat(',') {
                continue;
            }
            self.scanner().expect('>')?;
            return Ok(parameters);
        }
    }
}

/// Body text split into lines with the common indentation removed
fn body_lines(text: &str) -> Vec<String> {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                line.chars().skip(indent).collect::<String>().trim_end().to_string()
            }
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

/// Parse a compilation unit, reporting recoverable problems to `sink`
pub fn parse_compilation_unit(source: &str, sink: SharedSink, subject: &str) -> ParseResult<CompilationUnit> {
    Parser::new(source, sink, subject).parse()
}
