//! Node arena types
//!
//! Every construct of the code model is a [`Node`] stored in the
//! [`CodeModel`](crate::CodeModel) arena and addressed by a [`NodeId`].
//! Structural children are the nodes whose `parent` is the owner; every other
//! [`NodeId`] inside a node's data is a plain reference.

use crate::annotation::AnnotationData;
use crate::doc::Comment;
use crate::expression::Expression;
use crate::modifiers::Modifiers;
use crate::reflect::ReflectiveObject;
use crate::statement::Statement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a node inside one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tree a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// The merged tree handed out to callers
    Main,
    /// Shadow tree populated from parsed text
    Source,
}

/// Link from a node to its parsed shadow
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceOrigin {
    /// Node has no textual origin
    #[default]
    None,
    /// Type whose source is available but not yet parsed
    Pending(String),
    /// Shadow node in the source layer
    Resolved(NodeId),
}

/// Category of a type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    /// `class`
    #[default]
    Class,
    /// `interface`
    Interface,
    /// `enum`
    Enumeration,
    /// `@interface`
    Annotation,
}

impl TypeCategory {
    /// Check for the interface-like categories
    pub fn is_interface(self) -> bool {
        matches!(self, TypeCategory::Interface | TypeCategory::Annotation)
    }
}

/// Kind of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// A method
    Method,
    /// A constructor
    Constructor,
}

/// Direction of a type variable or wildcard bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoundKind {
    /// `extends` (upper bound)
    #[default]
    Extends,
    /// `super` (lower bound)
    Super,
}

/// Kind of a generic type node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericKind {
    /// Concrete nominal type
    Type,
    /// Declared type variable
    TypeVariable,
    /// `?` with an optional bound
    Wildcard,
    /// Nominal type with arguments
    Parameterized,
    /// Array of a component type
    Array,
}

/// Single import of a file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Import {
    /// Imported name (`java.util.List`, `java.util.*`)
    pub name: String,
    /// `import static`
    pub is_static: bool,
}

impl Import {
    /// Regular type import
    pub fn of(name: impl Into<String>) -> Self {
        Import {
            name: name.into(),
            is_static: false,
        }
    }

    /// Static member import
    pub fn of_static(name: impl Into<String>) -> Self {
        Import {
            name: name.into(),
            is_static: true,
        }
    }

    /// Check for an on-demand import (`a.b.*`)
    pub fn is_wildcard(&self) -> bool {
        self.name.ends_with('*')
    }
}

/// Package data
#[derive(Debug, Clone, Default)]
pub struct PackageData {
    /// Simple name, empty for the root
    pub name: String,
    /// Sub packages
    pub packages: Vec<NodeId>,
    /// Compilation units
    pub files: Vec<NodeId>,
}

/// Compilation unit data
#[derive(Debug, Clone, Default)]
pub struct FileData {
    /// Simple name of the primary type
    pub name: String,
    /// Imports in declaration order
    pub imports: Vec<Import>,
    /// Top level types, primary first
    pub types: Vec<NodeId>,
}

/// Type declaration data
#[derive(Debug, Clone, Default)]
pub struct TypeData {
    /// Simple name
    pub simple_name: String,
    /// Category
    pub category: TypeCategory,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Declared type variables
    pub type_variables: Vec<NodeId>,
    /// Declared superclass
    pub super_class: Option<NodeId>,
    /// Declared super interfaces
    pub super_interfaces: Vec<NodeId>,
    /// Fields in declaration order
    pub fields: Vec<NodeId>,
    /// Methods in declaration order
    pub methods: Vec<NodeId>,
    /// Constructors in declaration order
    pub constructors: Vec<NodeId>,
    /// Nested types
    pub nested_types: Vec<NodeId>,
    /// Synthesized properties, `None` until computed
    pub properties: Option<Vec<NodeId>>,
    /// Predefined primitive
    pub primitive: bool,
}

/// Field data
#[derive(Debug, Clone, Default)]
pub struct FieldData {
    /// Name
    pub name: String,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Declared type
    pub ty: Option<NodeId>,
    /// Initializer expression
    pub initializer: Option<Expression>,
}

/// Method or constructor data
#[derive(Debug, Clone)]
pub struct OperationData {
    /// Method or constructor
    pub kind: OperationKind,
    /// Name (simple type name for constructors)
    pub name: String,
    /// Modifiers
    pub modifiers: Modifiers,
    /// Method level type variables
    pub type_variables: Vec<NodeId>,
    /// Parameters
    pub parameters: Vec<NodeId>,
    /// Return type, `None` for constructors
    pub returns: Option<NodeId>,
    /// Declared exceptions
    pub exceptions: Vec<NodeId>,
    /// Body, `None` for abstract operations
    pub body: Option<Vec<Statement>>,
}

impl OperationData {
    /// Empty operation of the given kind
    pub fn new(kind: OperationKind, name: impl Into<String>) -> Self {
        OperationData {
            kind,
            name: name.into(),
            modifiers: Modifiers::default(),
            type_variables: Vec::new(),
            parameters: Vec::new(),
            returns: None,
            exceptions: Vec::new(),
            body: None,
        }
    }
}

/// Parameter data
#[derive(Debug, Clone, Default)]
pub struct ParameterData {
    /// Name
    pub name: String,
    /// Declared type
    pub ty: Option<NodeId>,
    /// Variable arity
    pub varargs: bool,
    /// `final`
    pub is_final: bool,
}

/// Type variable or wildcard data
#[derive(Debug, Clone, Default)]
pub struct VariableData {
    /// Name (`?` for wildcards)
    pub name: String,
    /// Bound
    pub bound: Option<NodeId>,
    /// Direction of the bound
    pub bound_kind: BoundKind,
}

/// Parameterized type data
#[derive(Debug, Clone)]
pub struct ParameterizedData {
    /// Nominal type
    pub base: NodeId,
    /// Ordered type arguments
    pub arguments: Vec<NodeId>,
}

/// Array type data
#[derive(Debug, Clone)]
pub struct ArrayData {
    /// Component type
    pub component: NodeId,
}

/// Synthesized property data
#[derive(Debug, Clone, Default)]
pub struct PropertyData {
    /// Property name
    pub name: String,
    /// Resolved type
    pub ty: Option<NodeId>,
    /// Getter link
    pub getter: Option<NodeId>,
    /// Setter link
    pub setter: Option<NodeId>,
    /// Field link
    pub field: Option<NodeId>,
}

impl PropertyData {
    /// A property without any link is never exposed
    pub fn is_empty(&self) -> bool {
        self.getter.is_none() && self.setter.is_none() && self.field.is_none()
    }
}

/// Data of a node by kind
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Package
    Package(PackageData),
    /// Compilation unit
    File(FileData),
    /// Type declaration
    Type(TypeData),
    /// Field
    Field(FieldData),
    /// Method or constructor
    Operation(OperationData),
    /// Operation parameter
    Parameter(ParameterData),
    /// Declared type variable
    TypeVariable(VariableData),
    /// Wildcard
    Wildcard(VariableData),
    /// Parameterized type
    Parameterized(ParameterizedData),
    /// Array type
    Array(ArrayData),
    /// Annotation usage
    Annotation(AnnotationData),
    /// Synthesized property
    Property(PropertyData),
}

impl NodeKind {
    /// Short kind name used in errors and paths
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Package(_) => "package",
            NodeKind::File(_) => "file",
            NodeKind::Type(_) => "type",
            NodeKind::Field(_) => "field",
            NodeKind::Operation(op) => match op.kind {
                OperationKind::Method => "method",
                OperationKind::Constructor => "constructor",
            },
            NodeKind::Parameter(_) => "parameter",
            NodeKind::TypeVariable(_) => "type variable",
            NodeKind::Wildcard(_) => "wildcard",
            NodeKind::Parameterized(_) => "parameterized type",
            NodeKind::Array(_) => "array type",
            NodeKind::Annotation(_) => "annotation",
            NodeKind::Property(_) => "property",
        }
    }

    /// Generic kind, if this node can be used as a type
    pub fn generic_kind(&self) -> Option<GenericKind> {
        match self {
            NodeKind::Type(_) => Some(GenericKind::Type),
            NodeKind::TypeVariable(_) => Some(GenericKind::TypeVariable),
            NodeKind::Wildcard(_) => Some(GenericKind::Wildcard),
            NodeKind::Parameterized(_) => Some(GenericKind::Parameterized),
            NodeKind::Array(_) => Some(GenericKind::Array),
            _ => None,
        }
    }

    /// Declared name of named kinds
    pub fn name_of(&self) -> Option<&str> {
        match self {
            NodeKind::Package(p) => Some(&p.name),
            NodeKind::File(f) => Some(&f.name),
            NodeKind::Type(t) => Some(&t.simple_name),
            NodeKind::Field(f) => Some(&f.name),
            NodeKind::Operation(o) => Some(&o.name),
            NodeKind::Parameter(p) => Some(&p.name),
            NodeKind::TypeVariable(v) | NodeKind::Wildcard(v) => Some(&v.name),
            NodeKind::Property(p) => Some(&p.name),
            _ => None,
        }
    }
}

/// A node of the code model
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) layer: Layer,
    pub(crate) kind: NodeKind,
    pub(crate) initialized: bool,
    pub(crate) initializing: bool,
    pub(crate) immutable: bool,
    pub(crate) system_immutable: bool,
    pub(crate) reflective: Option<ReflectiveObject>,
    pub(crate) source: SourceOrigin,
    pub(crate) annotations: Vec<NodeId>,
    pub(crate) doc: Vec<String>,
    pub(crate) comment: Option<Comment>,
    pub(crate) array: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeId>, layer: Layer, kind: NodeKind) -> Self {
        Node {
            parent,
            layer,
            kind,
            initialized: false,
            initializing: false,
            immutable: false,
            system_immutable: false,
            reflective: None,
            source: SourceOrigin::None,
            annotations: Vec::new(),
            doc: Vec::new(),
            comment: None,
            array: None,
        }
    }

    /// Parent node, `None` only for layer roots
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Layer the node belongs to
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Kind specific data
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Reflective origin, if any
    pub fn reflective_object(&self) -> Option<&ReflectiveObject> {
        self.reflective.as_ref()
    }

    /// Source origin
    pub fn source_origin(&self) -> &SourceOrigin {
        &self.source
    }

    /// Documentation lines
    pub fn doc(&self) -> &[String] {
        &self.doc
    }

    /// Attached comment
    pub fn comment(&self) -> Option<&Comment> {
        self.comment.as_ref()
    }
}
