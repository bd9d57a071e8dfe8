//! Syntax tree of a compilation unit
//!
//! The parser produces these plain structures first; the reader turns them
//! into model nodes once every type of the unit is known, so references
//! between types of one file resolve regardless of declaration order.

use crate::lowlevel::{AnnotationSyntax, DeclarationPrefix};
use crate::scanner::Span;
use strata_model::{BoundKind, Expression, OperationKind, TypeCategory};

/// A parsed source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    /// Declared package, `None` for the root package
    pub package: Option<String>,
    /// Import declarations in source order
    pub imports: Vec<ImportDeclaration>,
    /// Top level types
    pub types: Vec<TypeDeclaration>,
}

impl CompilationUnit {
    /// The public top level type, or the first one
    pub fn primary_type(&self) -> Option<&TypeDeclaration> {
        self.types
            .iter()
            .find(|t| t.prefix.modifiers.visibility() == strata_model::Visibility::Public)
            .or_else(|| self.types.first())
    }
}

/// `import [static] name;`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    /// Imported name, ending in `*` for on-demand imports
    pub name: String,
    /// `import static`
    pub is_static: bool,
    /// Source range
    pub span: Span,
}

/// A type as written at a use site
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    /// Name as written, possibly dotted
    pub name: String,
    /// Type arguments of the last name segment
    pub arguments: Vec<TypeArgument>,
    /// Array dimensions
    pub dimensions: usize,
    /// Source range
    pub span: Span,
}

impl TypeReference {
    /// Plain reference to a named type
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        TypeReference {
            name: name.into(),
            arguments: Vec::new(),
            dimensions: 0,
            span,
        }
    }
}

/// Argument inside `<...>`
#[derive(Debug, Clone, PartialEq)]
pub enum TypeArgument {
    /// Concrete type
    Type(TypeReference),
    /// `?`, `? extends T`, `? super T`
    Wildcard {
        /// Direction of the bound
        kind: BoundKind,
        /// Bound, `None` for `?`
        bound: Option<TypeReference>,
    },
}

/// Declared type variable
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameter {
    /// Variable name
    pub name: String,
    /// `extends` bounds in source order
    pub bounds: Vec<TypeReference>,
    /// Source range
    pub span: Span,
}

/// Class, interface, enum, or annotation type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    /// Comments, annotations, and modifiers
    pub prefix: DeclarationPrefix,
    /// Declaration keyword
    pub category: TypeCategory,
    /// Simple name
    pub name: String,
    /// Type variables
    pub type_parameters: Vec<TypeParameter>,
    /// `extends` clause (several for interfaces)
    pub extends: Vec<TypeReference>,
    /// `implements` clause
    pub implements: Vec<TypeReference>,
    /// Members in source order
    pub members: Vec<Member>,
    /// Source range of the header
    pub span: Span,
}

/// Member of a type body
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// Field or enum constant
    Field(FieldDeclaration),
    /// Method or constructor
    Operation(OperationDeclaration),
    /// Nested type
    Type(TypeDeclaration),
}

/// One declarator of a field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Comments, annotations, and modifiers
    pub prefix: DeclarationPrefix,
    /// Declared type including declarator dimensions
    pub ty: TypeReference,
    /// Field name
    pub name: String,
    /// `= value`
    pub initializer: Option<Expression>,
    /// Source range of the name
    pub span: Span,
}

/// Method or constructor
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDeclaration {
    /// Comments, annotations, and modifiers
    pub prefix: DeclarationPrefix,
    /// Method or constructor
    pub kind: OperationKind,
    /// Type variables
    pub type_parameters: Vec<TypeParameter>,
    /// Name (the type name for constructors)
    pub name: String,
    /// Return type, `None` for constructors
    pub returns: Option<TypeReference>,
    /// Parameters in order
    pub parameters: Vec<ParameterDeclaration>,
    /// `throws` clause
    pub exceptions: Vec<TypeReference>,
    /// Body lines, `None` without a body
    pub body: Option<Vec<String>>,
    /// Source range of the name
    pub span: Span,
}

/// Formal parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    /// Annotations in source order
    pub annotations: Vec<AnnotationSyntax>,
    /// `final`
    pub is_final: bool,
    /// Declared type; for `T...` the component type
    pub ty: TypeReference,
    /// `...`
    pub varargs: bool,
    /// Parameter name
    pub name: String,
}
