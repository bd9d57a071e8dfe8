//! Source layer construction
//!
//! [`SourceCodeReader`] parses a compilation unit and builds its nodes in
//! the source layer of a [`CodeModel`]. Types are declared first and
//! defined second, so members may refer to any type of the unit.
//!
//! Names resolve in this order: type variables in scope, types of the unit
//! (including nested ones), then [`CodeModel::qualified_name_for`] against
//! the imports. Types outside the unit are main layer nodes; types inside it
//! stay source layer nodes, which the merge maps onto their main layer
//! counterparts.

use crate::ast::{
    CompilationUnit, FieldDeclaration, Member, OperationDeclaration, TypeArgument, TypeDeclaration, TypeParameter,
    TypeReference,
};
use crate::lowlevel::{AnnotationSyntax, DeclarationPrefix};
use crate::parser::parse_compilation_unit;
use crate::scanner::Span;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_model::{
    CodeError, CodeModel, CodeResult, Diagnostic, DiagnosticCode, Expression, FieldReference, GenericKind, Import,
    Layer, NodeId, OperationKind, Statement, TypeCategory,
};

/// Reads compilation units into the source layer of a model
pub struct SourceCodeReader<'m> {
    model: &'m mut CodeModel,
}

impl<'m> SourceCodeReader<'m> {
    /// Reader for `model`
    pub fn new(model: &'m mut CodeModel) -> Self {
        Self { model }
    }

    /// Parse `text` and build its types; `name` identifies the unit in
    /// errors and diagnostics
    ///
    /// Returns the top level types. Structural syntax errors fail the read
    /// with [`CodeError::Source`]; everything else is reported to the
    /// model's diagnostics and skipped.
    pub fn read(&mut self, name: &str, text: &str) -> CodeResult<Vec<NodeId>> {
        let sink = self.model.diagnostics();
        let unit = parse_compilation_unit(text, sink, name).map_err(|error| error.into_code_error(name))?;
        self.build(name, &unit)
    }

    /// Build the nodes of an already parsed unit
    pub fn build(&mut self, name: &str, unit: &CompilationUnit) -> CodeResult<Vec<NodeId>> {
        let Some(primary) = unit.primary_type() else {
            tracing::debug!(unit = name, "compilation unit declares no types");
            return Ok(Vec::new());
        };
        let package_name = unit.package.clone().unwrap_or_default();
        let package = self.model.get_or_create_package(Layer::Source, &package_name)?;
        let file = self.model.create_file(package, &primary.name)?;
        for import in &unit.imports {
            let import = if import.is_static {
                Import::of_static(import.name.clone())
            } else {
                Import::of(import.name.clone())
            };
            self.model.add_import(file, import)?;
        }

        let mut builder = UnitBuilder {
            model: &mut *self.model,
            unit: name,
            file,
            signatures: FxHashMap::default(),
        };
        let mut declared = Vec::new();
        let mut top = Vec::new();
        for declaration in &unit.types {
            match builder.model.add_type(file, &declaration.name) {
                Ok(ty) => {
                    top.push(ty);
                    builder.declare(ty, declaration, &mut declared)?;
                }
                Err(CodeError::DuplicateMember { .. }) => builder.duplicate("type", &declaration.name, declaration.span),
                Err(error) => return Err(error),
            }
        }
        for (ty, declaration) in &declared {
            builder.define(*ty, declaration)?;
        }
        for ty in &top {
            self.model.register_source_type(*ty);
        }
        tracing::debug!(unit = name, types = top.len(), "read compilation unit");
        Ok(top)
    }
}

/// Parse `text` into the source layer of `model`
pub fn read_compilation_unit(model: &mut CodeModel, name: &str, text: &str) -> CodeResult<Vec<NodeId>> {
    SourceCodeReader::new(model).read(name, text)
}

struct UnitBuilder<'r> {
    model: &'r mut CodeModel,
    unit: &'r str,
    file: NodeId,
    signatures: FxHashMap<(NodeId, OperationKind), FxHashSet<String>>,
}

impl<'r> UnitBuilder<'r> {
    fn report(&self, code: DiagnosticCode, warning: bool, message: String, span: Span) {
        let diagnostic = if warning {
            Diagnostic::warning(code, message)
        } else {
            Diagnostic::debug(code, message)
        };
        self.model.report(
            diagnostic
                .with_subject(self.unit.to_string())
                .with_location(span.location()),
        );
    }

    fn duplicate(&self, what: &str, name: &str, span: Span) {
        self.report(
            DiagnosticCode::MalformedInput,
            true,
            format!("Duplicate {} {} ignored", what, name),
            span,
        );
    }

    /// First pass: the type, its variables, and its nested types
    fn declare<'u>(
        &mut self,
        ty: NodeId,
        declaration: &'u TypeDeclaration,
        declared: &mut Vec<(NodeId, &'u TypeDeclaration)>,
    ) -> CodeResult<()> {
        self.model.set_category(ty, declaration.category)?;
        self.model.set_modifiers(ty, declaration.prefix.modifiers.clone())?;
        self.apply_trivia(ty, &declaration.prefix)?;
        self.declare_variables(ty, &declaration.type_parameters)?;
        declared.push((ty, declaration));

        for member in &declaration.members {
            let Member::Type(nested) = member else {
                continue;
            };
            match self.model.add_nested_type(ty, &nested.name) {
                Ok(id) => self.declare(id, nested, declared)?,
                Err(CodeError::DuplicateMember { .. }) => self.duplicate("type", &nested.name, nested.span),
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn declare_variables(&mut self, owner: NodeId, parameters: &[TypeParameter]) -> CodeResult<()> {
        for parameter in parameters {
            match self.model.add_type_variable(owner, &parameter.name) {
                Ok(_) => {}
                Err(CodeError::DuplicateMember { .. }) => {
                    self.duplicate("type variable", &parameter.name, parameter.span)
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn bind_variables(&mut self, owner: NodeId, parameters: &[TypeParameter]) -> CodeResult<()> {
        for parameter in parameters {
            let Some(first) = parameter.bounds.first() else {
                continue;
            };
            let Some(variable) = self.model.type_variable(owner, &parameter.name)? else {
                continue;
            };
            let bound = self.resolve(owner, variable, first)?;
            self.model.set_bound(variable, Some(bound))?;
            if parameter.bounds.len() > 1 {
                self.report(
                    DiagnosticCode::UnknownSyntax,
                    false,
                    format!("Additional bounds of {} dropped", parameter.name),
                    parameter.span,
                );
            }
        }
        Ok(())
    }

    /// Second pass: supertypes, annotations, and members
    fn define(&mut self, ty: NodeId, declaration: &TypeDeclaration) -> CodeResult<()> {
        self.bind_variables(ty, &declaration.type_parameters)?;
        if declaration.category.is_interface() {
            for reference in &declaration.extends {
                let interface = self.resolve(ty, ty, reference)?;
                self.model.add_super_interface(ty, interface)?;
            }
        } else {
            if let Some(reference) = declaration.extends.first() {
                let super_class = self.resolve(ty, ty, reference)?;
                self.model.set_super_class(ty, Some(super_class))?;
            }
            for reference in &declaration.implements {
                let interface = self.resolve(ty, ty, reference)?;
                self.model.add_super_interface(ty, interface)?;
            }
        }
        self.annotate(ty, ty, &declaration.prefix.annotations)?;

        for member in &declaration.members {
            match member {
                Member::Field(field) => self.define_field(ty, field)?,
                Member::Operation(operation) => self.define_operation(ty, declaration.category, operation)?,
                Member::Type(_) => {}
            }
        }
        Ok(())
    }

    fn define_field(&mut self, ty: NodeId, declaration: &FieldDeclaration) -> CodeResult<()> {
        let field = match self.model.add_field(ty, &declaration.name) {
            Ok(field) => field,
            Err(CodeError::DuplicateMember { .. }) => {
                self.duplicate("field", &declaration.name, declaration.span);
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        let field_type = self.resolve(ty, field, &declaration.ty)?;
        self.model.set_field_type(field, field_type)?;
        self.model.set_modifiers(field, declaration.prefix.modifiers.clone())?;
        if let Some(initializer) = &declaration.initializer {
            let initializer = self.qualify_expression(ty, initializer)?;
            self.model.set_initializer(field, Some(initializer))?;
        }
        self.apply_trivia(field, &declaration.prefix)?;
        self.annotate(field, ty, &declaration.prefix.annotations)
    }

    fn define_operation(
        &mut self,
        ty: NodeId,
        category: TypeCategory,
        declaration: &OperationDeclaration,
    ) -> CodeResult<()> {
        if category == TypeCategory::Annotation && !declaration.parameters.is_empty() {
            self.report(
                DiagnosticCode::MalformedInput,
                true,
                format!("Annotation member {} declares parameters", declaration.name),
                declaration.span,
            );
        }
        let operation = self.model.declare_operation(ty, declaration.kind, &declaration.name)?;
        self.model.set_modifiers(operation, declaration.prefix.modifiers.clone())?;
        self.declare_variables(operation, &declaration.type_parameters)?;
        self.bind_variables(operation, &declaration.type_parameters)?;

        if let Some(returns) = &declaration.returns {
            let returns = self.resolve(operation, operation, returns)?;
            self.model.set_return_type(operation, returns)?;
        }
        for parameter in &declaration.parameters {
            let parameter_type = self.resolve(operation, operation, &parameter.ty)?;
            let node = self.model.add_parameter(operation, &parameter.name, parameter_type)?;
            self.model.set_parameter_flags(node, parameter.varargs, parameter.is_final)?;
            self.annotate(node, operation, &parameter.annotations)?;
        }
        for exception in &declaration.exceptions {
            let exception = self.resolve(operation, operation, exception)?;
            self.model.add_exception(operation, exception)?;
        }
        let body = declaration
            .body
            .as_ref()
            .map(|lines| lines.iter().cloned().map(Statement::Verbatim).collect());
        self.model.set_body(operation, body)?;
        self.apply_trivia(operation, &declaration.prefix)?;
        self.annotate(operation, operation, &declaration.prefix.annotations)?;

        let signature = self.model.signature(operation)?;
        let seen = self.signatures.entry((ty, declaration.kind)).or_default();
        if !seen.insert(signature.clone()) {
            self.model.remove_member(ty, operation)?;
            self.duplicate("operation", &signature, declaration.span);
        }
        Ok(())
    }

    fn apply_trivia(&mut self, id: NodeId, prefix: &DeclarationPrefix) -> CodeResult<()> {
        if let Some(doc) = &prefix.trivia.doc {
            for line in doc {
                self.model.add_doc_line(id, line.clone())?;
            }
        }
        if let Some(comment) = &prefix.trivia.comment {
            self.model.set_comment(id, Some(comment.clone()))?;
        }
        Ok(())
    }

    fn annotate(&mut self, owner: NodeId, scope: NodeId, annotations: &[AnnotationSyntax]) -> CodeResult<()> {
        for syntax in annotations {
            let type_name = self.model.qualified_name_for(&syntax.name, Some(scope))?;
            let annotation = match self.model.add_annotation(owner, &type_name) {
                Ok(annotation) => annotation,
                Err(CodeError::DuplicateMember { .. }) => {
                    self.duplicate("annotation", &format!("@{}", syntax.name), syntax.span);
                    continue;
                }
                Err(error) => return Err(error),
            };
            for (key, value) in &syntax.parameters {
                let value = self.qualify_expression(scope, value)?;
                self.model.set_annotation_parameter(annotation, key, Some(value))?;
            }
        }
        Ok(())
    }

    /// Qualify the type names inside an expression
    fn qualify_expression(&mut self, scope: NodeId, expression: &Expression) -> CodeResult<Expression> {
        Ok(match expression {
            Expression::TypeLiteral(name) => {
                Expression::TypeLiteral(self.model.qualified_name_for(name, Some(scope))?)
            }
            Expression::FieldReference(reference) => {
                let type_name = self.model.qualified_name_for(&reference.type_name, Some(scope))?;
                Expression::FieldReference(FieldReference::new(
                    type_name,
                    reference.field_name.clone(),
                    reference.qualification,
                ))
            }
            Expression::NAry { operator, operands } => {
                let mut qualified = Vec::with_capacity(operands.len());
                for operand in operands {
                    qualified.push(self.qualify_expression(scope, operand)?);
                }
                Expression::NAry {
                    operator: *operator,
                    operands: qualified,
                }
            }
            Expression::ArrayInit(items) => {
                let mut qualified = Vec::with_capacity(items.len());
                for item in items {
                    qualified.push(self.qualify_expression(scope, item)?);
                }
                Expression::ArrayInit(qualified)
            }
            other => other.clone(),
        })
    }

    /// Generic type node for a written type; generic nodes are owned by `owner`
    fn resolve(&mut self, scope: NodeId, owner: NodeId, reference: &TypeReference) -> CodeResult<NodeId> {
        let mut ty = self.resolve_name(scope, &reference.name)?;
        if !reference.arguments.is_empty() {
            if self.model.generic_kind(ty) == Some(GenericKind::Type) {
                let mut arguments = Vec::with_capacity(reference.arguments.len());
                for argument in &reference.arguments {
                    let argument = match argument {
                        TypeArgument::Type(inner) => self.resolve(scope, owner, inner)?,
                        TypeArgument::Wildcard { kind, bound } => {
                            let bound = match bound {
                                Some(bound) => Some(self.resolve(scope, owner, bound)?),
                                None => None,
                            };
                            self.model.add_wildcard(owner, *kind, bound)?
                        }
                    };
                    arguments.push(argument);
                }
                ty = self.model.parameterize(owner, ty, arguments)?;
            } else {
                self.report(
                    DiagnosticCode::UnknownSyntax,
                    false,
                    format!("Type arguments of {} dropped", reference.name),
                    reference.span,
                );
            }
        }
        for _ in 0..reference.dimensions {
            ty = self.model.create_array(ty)?;
        }
        Ok(ty)
    }

    fn resolve_name(&mut self, scope: NodeId, name: &str) -> CodeResult<NodeId> {
        if !name.contains('.') {
            if let Some(variable) = self.model.type_variable(scope, name)? {
                return Ok(variable);
            }
        }
        if let Some(local) = self.model.child_type(self.file, name)? {
            return Ok(local);
        }
        let qualified = self.model.qualified_name_for(name, Some(scope))?;
        self.model.type_or_placeholder(&qualified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use strata_model::{CollectingSink, Literal};

    fn model() -> (CodeModel, Rc<CollectingSink>) {
        let sink = Rc::new(CollectingSink::new());
        (CodeModel::new().with_diagnostics(sink.clone()), sink)
    }

    const SHAPES: &str = r#"
package com.example.shapes;

import java.util.List;

/**
 * A shape with corners
 */
public class Polygon<P extends Point> extends Shape implements Comparable<Polygon<P>> {
    private List<P> corners;
    private Kind kind = Kind.CONVEX;

    public Polygon(List<P> corners) {
        this.corners = corners;
    }

    public int compareTo(Polygon<P> other) {
        return 0;
    }

    public enum Kind { CONVEX, CONCAVE }
}

class Point {
    int x, y;
}
"#;

    #[test]
    fn test_unit_builds_source_layer() {
        let (mut model, sink) = model();
        let types = read_compilation_unit(&mut model, "Polygon.java", SHAPES).unwrap();
        assert_eq!(types.len(), 2);
        let polygon = types[0];
        assert_eq!(model.layer(polygon), Layer::Source);
        assert_eq!(model.qualified_name(polygon), "com.example.shapes.Polygon");
        assert_eq!(model.loaded_source_type("com.example.shapes.Polygon"), Some(polygon));
        assert_eq!(model.loaded_source_type("com.example.shapes.Point"), Some(types[1]));
        assert_eq!(
            model.loaded_source_type("com.example.shapes.Polygon.Kind").map(|k| model.simple_name(k)),
            Some("Kind".to_string())
        );
        assert_eq!(model.doc(polygon).unwrap(), vec!["A shape with corners".to_string()]);
        assert!(sink.is_clean());
    }

    #[test]
    fn test_references_inside_the_unit_stay_local() {
        let (mut model, _) = model();
        let types = read_compilation_unit(&mut model, "Polygon.java", SHAPES).unwrap();
        let polygon = types[0];

        let variable = model.type_variables(polygon).unwrap()[0];
        assert_eq!(model.bound(variable).unwrap(), Some(types[1]));

        let corners = model.field(polygon, "corners").unwrap().unwrap();
        let list = model.field_type(corners).unwrap().unwrap();
        assert_eq!(model.qualified_name(list), "java.util.List");
        assert_eq!(model.type_arguments(list), vec![variable]);
        assert_eq!(model.parent(list), Some(corners));

        let kind = model.field(polygon, "kind").unwrap().unwrap();
        let kind_type = model.field_type(kind).unwrap().unwrap();
        assert_eq!(model.layer(kind_type), Layer::Source);
        assert_eq!(model.qualified_name(kind_type), "com.example.shapes.Polygon.Kind");
        match model.initializer(kind).unwrap() {
            Some(Expression::FieldReference(reference)) => {
                assert_eq!(reference.type_name, "com.example.shapes.Polygon.Kind");
                assert_eq!(reference.field_name, "CONVEX");
            }
            other => panic!("unexpected initializer {:?}", other),
        }

        let super_class = model.super_class(polygon).unwrap().unwrap();
        assert_eq!(model.qualified_name(super_class), "com.example.shapes.Shape");
        assert_eq!(model.layer(super_class), Layer::Main);
    }

    #[test]
    fn test_operations_and_overloads() {
        let (mut model, sink) = model();
        let types = read_compilation_unit(
            &mut model,
            "Runner.java",
            "class Runner { void run() {} void run(int times) {} void run(int count) {} Runner(String... args) {} }",
        )
        .unwrap();
        let runner = types[0];
        let methods = model.methods(runner).unwrap();
        let signatures: Vec<String> = methods.iter().map(|m| model.signature(*m).unwrap()).collect();
        assert_eq!(signatures, vec!["run()".to_string(), "run(int)".to_string()]);
        assert_eq!(sink.count(DiagnosticCode::MalformedInput), 1);

        let constructor = model.constructors(runner).unwrap()[0];
        let parameter = model.parameters(constructor).unwrap()[0];
        assert!(model.is_varargs(parameter).unwrap());
        assert_eq!(model.signature(constructor).unwrap(), "Runner(java.lang.String[])");
    }

    #[test]
    fn test_annotation_parameters_keep_order() {
        let (mut model, _) = model();
        let types = read_compilation_unit(
            &mut model,
            "A.java",
            "package p; import q.Foo; @Foo(bar=1,baz=\"x\") @Foo class A {}",
        )
        .unwrap();
        let annotations = model.annotations(types[0]).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(model.annotation_type_name(annotations[0]).unwrap(), "q.Foo");
        let parameters = model.annotation_parameters(annotations[0]).unwrap();
        let entries: Vec<(&str, &Expression)> = parameters.iter().map(|(k, v)| (k.as_str(), v)).collect();
        assert_eq!(
            entries,
            vec![
                ("bar", &Expression::Literal(Literal::Int(1))),
                ("baz", &Expression::Literal(Literal::String("x".into()))),
            ]
        );
    }

    #[test]
    fn test_syntax_errors_fail_the_read() {
        let (mut model, _) = model();
        let error = read_compilation_unit(&mut model, "Broken.java", "class Broken {").unwrap_err();
        assert!(matches!(error, CodeError::Source { ref name, .. } if name == "Broken.java"));
    }
}
