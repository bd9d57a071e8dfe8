//! Source text emission
//!
//! [`CodeModel::write`] emits either a full declaration (when a default
//! indentation unit is given) or a reference to the node (when it is not).
//! Type names are shortened when the compilation unit of the written node
//! makes them visible: same file, same package, explicit or on-demand
//! import, or `java.lang`.

use crate::doc::Comment;
use crate::error::CodeResult;
use crate::expression::Expression;
use crate::model::CodeModel;
use crate::node::{BoundKind, NodeId, NodeKind, OperationKind, TypeCategory};
use crate::statement::{BlockKind, Statement};
use crate::JAVA_LANG;
use std::io;

struct CodeWriter<'m> {
    model: &'m CodeModel,
    newline: &'m str,
    unit: Option<&'m str>,
    scope: Option<NodeId>,
    out: String,
}

impl<'m> CodeWriter<'m> {
    fn new(model: &'m CodeModel, newline: &'m str, unit: Option<&'m str>, scope: Option<NodeId>) -> Self {
        CodeWriter {
            model,
            newline,
            unit,
            scope,
            out: String::new(),
        }
    }

    fn line(&mut self, indent: &str, text: &str) {
        self.out.push_str(indent);
        self.out.push_str(text);
        self.out.push_str(self.newline);
    }

    fn deeper(&self, indent: &str) -> String {
        format!("{}{}", indent, self.unit.unwrap_or_default())
    }

    fn terminator(&self) -> &'m str {
        &self.model.syntax().statement_terminator
    }

    /// Shortest name under which a qualified type is visible in the scope
    fn name_in_scope(&self, qualified: &str) -> String {
        let model = self.model;
        let separator = model.syntax().package_separator;
        let strip = |prefix: &str| -> Option<String> {
            if prefix.is_empty() {
                return None;
            }
            qualified
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(separator))
                .filter(|rest| rest.chars().next().is_some_and(char::is_uppercase))
                .map(str::to_string)
        };

        if let Some(rest) = strip(JAVA_LANG) {
            if !rest.contains(separator) {
                return rest;
            }
        }
        let Some(file) = self.scope else {
            return qualified.to_string();
        };
        if let Ok(imports) = model.imports(file) {
            for import in imports.iter().filter(|i| !i.is_static) {
                if import.is_wildcard() {
                    let package = import.name.trim_end_matches('*').trim_end_matches(separator);
                    if let Some(rest) = strip(package) {
                        if !rest.contains(separator) {
                            return rest;
                        }
                    }
                } else if qualified == import.name
                    || qualified
                        .strip_prefix(import.name.as_str())
                        .is_some_and(|rest| rest.starts_with(separator))
                {
                    let parent = import
                        .name
                        .rsplit_once(separator)
                        .map(|(parent, _)| parent)
                        .unwrap_or_default();
                    if let Some(rest) = strip(parent) {
                        return rest;
                    }
                }
            }
        }
        let package = model
            .package_of(file)
            .map(|p| model.package_qualified_name(p))
            .unwrap_or_default();
        strip(&package).unwrap_or_else(|| qualified.to_string())
    }

    fn type_name(&self, ty: NodeId) -> String {
        let model = self.model;
        match &model.node(ty).kind {
            NodeKind::Type(data) if data.primitive => data.simple_name.clone(),
            NodeKind::Type(_) => self.name_in_scope(&model.qualified_name(ty)),
            NodeKind::Parameterized(data) => {
                let arguments: Vec<String> = data.arguments.iter().map(|a| self.type_name(*a)).collect();
                format!("{}<{}>", self.type_name(data.base), arguments.join(", "))
            }
            NodeKind::Array(data) => format!("{}[]", self.type_name(data.component)),
            NodeKind::TypeVariable(data) => data.name.clone(),
            NodeKind::Wildcard(data) => match (data.bound, data.bound_kind) {
                (Some(bound), BoundKind::Extends) => format!("? extends {}", self.type_name(bound)),
                (Some(bound), BoundKind::Super) => format!("? super {}", self.type_name(bound)),
                (None, _) => "?".to_string(),
            },
            kind => kind.name_of().unwrap_or_default().to_string(),
        }
    }

    fn type_variables(&self, variables: &[NodeId]) -> String {
        if variables.is_empty() {
            return String::new();
        }
        let declared: Vec<String> = variables
            .iter()
            .map(|v| match &self.model.node(*v).kind {
                NodeKind::TypeVariable(data) => match data.bound {
                    Some(bound) => format!("{} extends {}", data.name, self.type_name(bound)),
                    None => data.name.clone(),
                },
                _ => self.type_name(*v),
            })
            .collect();
        format!("<{}>", declared.join(", "))
    }

    fn expression(&self, expression: &Expression) -> String {
        match expression {
            Expression::Literal(literal) => literal.to_string(),
            Expression::Name(name) => name.clone(),
            Expression::TypeLiteral(name) => format!("{}.class", self.name_in_scope(name)),
            Expression::FieldReference(reference) => match reference.qualification {
                Some(true) => format!("{}.{}", reference.type_name, reference.field_name),
                Some(false) => format!(
                    "{}.{}",
                    self.name_in_scope(&reference.type_name),
                    reference.field_name
                ),
                None => reference.field_name.clone(),
            },
            Expression::NAry { operator, operands } => {
                let parts: Vec<String> = operands
                    .iter()
                    .map(|operand| match operand {
                        Expression::NAry { .. } => format!("({})", self.expression(operand)),
                        _ => self.expression(operand),
                    })
                    .collect();
                parts.join(&format!(" {} ", operator.symbol()))
            }
            Expression::ArrayInit(items) => {
                let items: Vec<String> = items.iter().map(|i| self.expression(i)).collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }

    fn annotation(&self, annotation: NodeId) -> String {
        let NodeKind::Annotation(data) = &self.model.node(annotation).kind else {
            return String::new();
        };
        let start = &self.model.syntax().annotation_start;
        let name = self.name_in_scope(&data.type_name);
        if data.parameters.is_empty() {
            return format!("{}{}", start, name);
        }
        if data.parameters.len() == 1 {
            if let Some(value) = data.parameters.get("value") {
                return format!("{}{}({})", start, name, self.expression(value));
            }
        }
        let parameters: Vec<String> = data
            .parameters
            .iter()
            .map(|(key, value)| format!("{} = {}", key, self.expression(value)))
            .collect();
        format!("{}{}({})", start, name, parameters.join(", "))
    }

    fn leading(&mut self, id: NodeId, indent: &str) {
        let model = self.model;
        let node = model.node(id);
        if let Some(comment) = &node.comment {
            for line in comment.lines() {
                self.line(indent, &line);
            }
        }
        if !node.doc.is_empty() {
            self.line(indent, "/**");
            for doc in &node.doc {
                if doc.is_empty() {
                    self.line(indent, " *");
                } else {
                    self.line(indent, &format!(" * {}", doc));
                }
            }
            self.line(indent, " */");
        }
        for annotation in &node.annotations {
            let text = self.annotation(*annotation);
            self.line(indent, &text);
        }
    }

    fn modifiers_prefix(modifiers: &crate::modifiers::Modifiers) -> String {
        let text = modifiers.to_string();
        if text.is_empty() {
            text
        } else {
            format!("{} ", text)
        }
    }

    fn declaration(&mut self, id: NodeId, indent: &str) {
        let model = self.model;
        match &model.node(id).kind {
            NodeKind::Package(_) => {
                let name = model.package_qualified_name(id);
                self.leading(id, indent);
                if !name.is_empty() {
                    let text = format!("package {}{}", name, self.terminator());
                    self.line(indent, &text);
                }
            }
            NodeKind::File(_) => self.file(id, indent),
            NodeKind::Type(_) => self.type_declaration(id, indent),
            NodeKind::Field(_) => self.field(id, indent),
            NodeKind::Operation(_) => self.operation(id, indent),
            NodeKind::Annotation(_) => {
                let text = self.annotation(id);
                self.line(indent, &text);
            }
            NodeKind::Property(data) => {
                let ty = data.ty.map(|t| self.type_name(t)).unwrap_or_default();
                let text = format!("{} {}", ty, data.name);
                self.line(indent, text.trim_start());
            }
            _ => {
                let text = self.reference(id);
                self.out.push_str(indent);
                self.out.push_str(&text);
            }
        }
    }

    fn file(&mut self, file: NodeId, indent: &str) {
        let model = self.model;
        let NodeKind::File(data) = &model.node(file).kind else {
            return;
        };
        if let Some(comment) = &model.node(file).comment {
            for line in comment.lines() {
                self.line(indent, &line);
            }
        }
        let package = model
            .package_of(file)
            .map(|p| model.package_qualified_name(p))
            .unwrap_or_default();
        if !package.is_empty() {
            let text = format!("package {}{}", package, self.terminator());
            self.line(indent, &text);
            self.out.push_str(self.newline);
        }
        if !data.imports.is_empty() {
            for import in &data.imports {
                let keyword = if import.is_static { "import static" } else { "import" };
                let text = format!("{} {}{}", keyword, import.name, self.terminator());
                self.line(indent, &text);
            }
            self.out.push_str(self.newline);
        }
        for (index, ty) in data.types.iter().enumerate() {
            if index > 0 {
                self.out.push_str(self.newline);
            }
            self.type_declaration(*ty, indent);
        }
    }

    fn type_declaration(&mut self, ty: NodeId, indent: &str) {
        let model = self.model;
        let NodeKind::Type(data) = &model.node(ty).kind else {
            return;
        };
        let keywords = &model.syntax().category_keywords;
        let keyword = match data.category {
            TypeCategory::Class => &keywords.class,
            TypeCategory::Interface => &keywords.interface,
            TypeCategory::Enumeration => &keywords.enumeration,
            TypeCategory::Annotation => &keywords.annotation,
        };
        let mut header = format!(
            "{}{} {}{}",
            Self::modifiers_prefix(&data.modifiers),
            keyword,
            data.simple_name,
            self.type_variables(&data.type_variables)
        );
        if let Some(super_class) = data.super_class {
            if model.erasure(super_class) != crate::ROOT_TYPE {
                header.push_str(&model.syntax().keyword_extends);
                header.push_str(&self.type_name(super_class));
            }
        }
        if !data.super_interfaces.is_empty() {
            let interfaces: Vec<String> = data.super_interfaces.iter().map(|i| self.type_name(*i)).collect();
            if data.category.is_interface() {
                header.push_str(&model.syntax().keyword_extends);
            } else {
                header.push_str(&model.syntax().keyword_implements);
            }
            header.push_str(&interfaces.join(", "));
        }
        header.push_str(" {");

        self.leading(ty, indent);
        self.line(indent, &header);
        let inner = self.deeper(indent);
        let mut first = true;
        for field in &data.fields {
            self.field(*field, &inner);
            first = false;
        }
        for operation in data.constructors.iter().chain(&data.methods) {
            if !first {
                self.out.push_str(self.newline);
            }
            self.operation(*operation, &inner);
            first = false;
        }
        for nested in &data.nested_types {
            if !first {
                self.out.push_str(self.newline);
            }
            self.type_declaration(*nested, &inner);
            first = false;
        }
        self.line(indent, "}");
    }

    fn field(&mut self, field: NodeId, indent: &str) {
        let model = self.model;
        let NodeKind::Field(data) = &model.node(field).kind else {
            return;
        };
        let ty = data
            .ty
            .map(|t| self.type_name(t))
            .unwrap_or_else(|| crate::ROOT_TYPE.to_string());
        let mut text = format!("{}{} {}", Self::modifiers_prefix(&data.modifiers), ty, data.name);
        if let Some(initializer) = &data.initializer {
            text.push_str(" = ");
            text.push_str(&self.expression(initializer));
        }
        text.push_str(self.terminator());
        self.leading(field, indent);
        self.line(indent, &text);
    }

    fn parameter(&self, parameter: NodeId) -> String {
        let model = self.model;
        let node = model.node(parameter);
        let NodeKind::Parameter(data) = &node.kind else {
            return String::new();
        };
        let mut text = String::new();
        for annotation in &node.annotations {
            text.push_str(&self.annotation(*annotation));
            text.push(' ');
        }
        if data.is_final {
            text.push_str("final ");
        }
        let ty = data
            .ty
            .map(|t| self.type_name(t))
            .unwrap_or_else(|| crate::ROOT_TYPE.to_string());
        text.push_str(&ty);
        if data.varargs {
            text.push_str("...");
        }
        text.push(' ');
        text.push_str(&data.name);
        text
    }

    fn operation(&mut self, operation: NodeId, indent: &str) {
        let model = self.model;
        let NodeKind::Operation(data) = &model.node(operation).kind else {
            return;
        };
        let mut text = Self::modifiers_prefix(&data.modifiers);
        let variables = self.type_variables(&data.type_variables);
        if !variables.is_empty() {
            text.push_str(&variables);
            text.push(' ');
        }
        if data.kind == OperationKind::Method {
            let returns = data.returns.map(|r| self.type_name(r)).unwrap_or_else(|| "void".to_string());
            text.push_str(&returns);
            text.push(' ');
        }
        let parameters: Vec<String> = data.parameters.iter().map(|p| self.parameter(*p)).collect();
        text.push_str(&format!("{}({})", data.name, parameters.join(", ")));
        if !data.exceptions.is_empty() {
            let exceptions: Vec<String> = data.exceptions.iter().map(|e| self.type_name(*e)).collect();
            text.push_str(" throws ");
            text.push_str(&exceptions.join(", "));
        }

        self.leading(operation, indent);
        match &data.body {
            None => {
                text.push_str(self.terminator());
                self.line(indent, &text);
            }
            Some(body) => {
                text.push_str(" {");
                self.line(indent, &text);
                let inner = self.deeper(indent);
                for statement in body {
                    self.statement(statement, &inner);
                }
                self.line(indent, "}");
            }
        }
    }

    fn statement(&mut self, statement: &Statement, indent: &str) {
        let terminator = self.terminator().to_string();
        match statement {
            Statement::Expression(expression) => {
                let text = format!("{}{}", self.expression(expression), terminator);
                self.line(indent, &text);
            }
            Statement::LocalVariable {
                ty,
                name,
                value,
                is_final,
            } => {
                let mut text = String::new();
                if *is_final {
                    text.push_str("final ");
                }
                text.push_str(&format!("{} {}", self.type_name(*ty), name));
                if let Some(value) = value {
                    text.push_str(" = ");
                    text.push_str(&self.expression(value));
                }
                text.push_str(&terminator);
                self.line(indent, &text);
            }
            Statement::Return(value) => {
                let text = match value {
                    Some(value) => format!("return {}{}", self.expression(value), terminator),
                    None => format!("return{}", terminator),
                };
                self.line(indent, &text);
            }
            Statement::Block { kind, statements } => {
                let header = match kind {
                    BlockKind::Plain => "{".to_string(),
                    BlockKind::If(condition) => format!("if ({}) {{", self.expression(condition)),
                    BlockKind::While(condition) => format!("while ({}) {{", self.expression(condition)),
                    BlockKind::DoWhile(_) => "do {".to_string(),
                    BlockKind::For(header) => format!(
                        "for ({}; {}; {}) {{",
                        header.init,
                        self.expression(&header.condition),
                        header.update
                    ),
                };
                self.line(indent, &header);
                let inner = self.deeper(indent);
                for statement in statements {
                    self.statement(statement, &inner);
                }
                let footer = match kind {
                    BlockKind::DoWhile(condition) => {
                        format!("}} while ({}){}", self.expression(condition), terminator)
                    }
                    _ => "}".to_string(),
                };
                self.line(indent, &footer);
            }
            Statement::Verbatim(text) => {
                for line in text.lines() {
                    self.line(indent, line.trim_end());
                }
            }
        }
    }

    fn reference(&self, id: NodeId) -> String {
        let model = self.model;
        let node = model.node(id);
        match &node.kind {
            NodeKind::Package(_) | NodeKind::File(_) => model.qualified_name(id),
            NodeKind::Field(data) => match node.parent {
                Some(owner) => format!("{}.{}", self.type_name(owner), data.name),
                None => data.name.clone(),
            },
            NodeKind::Operation(data) => {
                let parameters: Vec<String> = data
                    .parameters
                    .iter()
                    .map(|p| match &model.node(*p).kind {
                        NodeKind::Parameter(parameter) => {
                            let ty = parameter.ty.map(|t| self.type_name(t)).unwrap_or_default();
                            if parameter.varargs {
                                format!("{}...", ty)
                            } else {
                                ty
                            }
                        }
                        _ => String::new(),
                    })
                    .collect();
                format!("{}({})", data.name, parameters.join(", "))
            }
            NodeKind::Parameter(_) => self.parameter(id),
            NodeKind::Annotation(_) => self.annotation(id),
            NodeKind::Property(data) => data.name.clone(),
            _ => self.type_name(id),
        }
    }
}

impl CodeModel {
    /// Write a node as source text
    ///
    /// With `default_indent` the full declaration is written, each nesting
    /// level indented by one more unit. Without it only a reference to the
    /// node (type name, member signature) is written.
    pub fn write(
        &mut self,
        id: NodeId,
        out: &mut dyn io::Write,
        newline: &str,
        default_indent: Option<&str>,
        current_indent: &str,
    ) -> CodeResult<()> {
        match default_indent {
            Some(_) => self.initialize_deep(id)?,
            None => self.initialize(id)?,
        }
        let scope = self.file_of(id);
        let mut writer = CodeWriter::new(self, newline, default_indent, scope);
        match default_indent {
            Some(_) => writer.declaration(id, current_indent),
            None => {
                let text = writer.reference(id);
                writer.out.push_str(current_indent);
                writer.out.push_str(&text);
            }
        }
        out.write_all(writer.out.as_bytes())?;
        Ok(())
    }

    /// Full declaration of a node with the configured newline and indentation
    pub fn write_to_string(&mut self, id: NodeId) -> CodeResult<String> {
        let newline = self.syntax().newline.clone();
        let indent = self.syntax().default_indent.clone();
        let mut buffer = Vec::new();
        self.write(id, &mut buffer, &newline, Some(&indent), "")?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Reference to a node as seen from its own compilation unit
    pub fn write_reference(&mut self, id: NodeId) -> CodeResult<String> {
        let newline = self.syntax().newline.clone();
        let mut buffer = Vec::new();
        self.write(id, &mut buffer, &newline, None, "")?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Render a standalone comment with the configured newline
pub fn render_comment(comment: &Comment, newline: &str) -> String {
    let mut out = String::new();
    for line in comment.lines() {
        out.push_str(&line);
        out.push_str(newline);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{Modifier, Modifiers, Visibility};
    use crate::node::{Import, Layer};

    #[test]
    fn test_write_class() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "com.example").unwrap();
        let file = model.create_file(package, "Point").unwrap();
        model.add_import(file, Import::of("java.util.List")).unwrap();
        let point = model.add_type(file, "Point").unwrap();
        model.set_modifiers(point, Modifiers::public()).unwrap();
        model.add_doc_line(point, "A point").unwrap();

        let int = model.primitive("int").unwrap();
        let x = model.add_field(point, "x").unwrap();
        model.set_field_type(x, int).unwrap();
        model
            .set_modifiers(x, Modifiers::new(Visibility::Private, [Modifier::Final]))
            .unwrap();
        model.set_initializer(x, Some(Expression::int(0))).unwrap();

        let list = model.type_or_placeholder("java.util.List").unwrap();
        let string = model.type_or_placeholder("java.lang.String").unwrap();
        let getter = model.add_method(point, "names").unwrap();
        let names = model.parameterize(getter, list, vec![string]).unwrap();
        model.set_return_type(getter, names).unwrap();
        model.set_modifiers(getter, Modifiers::public()).unwrap();
        model.add_statement(getter, Statement::Return(None)).unwrap();

        let text = model.write_to_string(file).unwrap();
        assert_eq!(
            text,
            "package com.example;\n\
             \n\
             import java.util.List;\n\
             \n\
             /**\n \
             * A point\n \
             */\n\
             public class Point {\n    \
             private final int x = 0;\n\
             \n    \
             public List<String> names() {\n        \
             return;\n    \
             }\n\
             }\n"
        );
    }

    #[test]
    fn test_write_reference() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, "A").unwrap();
        let ty = model.add_type(file, "A").unwrap();
        let int = model.primitive("int").unwrap();
        let method = model.add_method(ty, "sum").unwrap();
        let values = model.add_parameter(method, "values", int).unwrap();
        model.set_parameter_flags(values, true, false).unwrap();
        let other = model.type_or_placeholder("b.Other").unwrap();
        let take = model.add_method(ty, "take").unwrap();
        model.add_parameter(take, "other", other).unwrap();

        assert_eq!(model.write_reference(method).unwrap(), "sum(int...)");
        assert_eq!(model.write_reference(take).unwrap(), "take(b.Other)");
        assert_eq!(model.write_reference(ty).unwrap(), "A");
    }

    #[test]
    fn test_annotation_parameters() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, "A").unwrap();
        let ty = model.add_type(file, "A").unwrap();
        let single = model.add_annotation(ty, "java.lang.SuppressWarnings").unwrap();
        model
            .set_annotation_parameter(single, "value", Some(Expression::string("unused")))
            .unwrap();
        let named = model.add_annotation(ty, "a.Named").unwrap();
        model.set_annotation_parameter(named, "bar", Some(Expression::int(1))).unwrap();
        model
            .set_annotation_parameter(named, "baz", Some(Expression::string("x")))
            .unwrap();

        assert_eq!(
            model.write_reference(single).unwrap(),
            "@SuppressWarnings(\"unused\")"
        );
        assert_eq!(model.write_reference(named).unwrap(), "@Named(bar = 1, baz = \"x\")");
    }

    #[test]
    fn test_render_comment() {
        let comment = Comment::SingleLine("note".into()).join(Comment::Block(vec!["a".into()]));
        assert_eq!(render_comment(&comment, "\n"), "// note\n/*\n * a\n */\n");
    }
}
