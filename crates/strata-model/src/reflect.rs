//! Reflective loader boundary
//!
//! Binary metadata is delivered as plain serde descriptors. A
//! [`ReflectiveLoader`] hands out class descriptors by qualified name; the
//! model attaches the matching descriptor to every node it materializes from
//! them as its [`ReflectiveObject`].

use crate::error::CodeResult;
use crate::expression::Literal;
use crate::modifiers::Modifiers;
use crate::node::TypeCategory;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

/// Reference to a type inside a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// Nominal or primitive type by qualified name
    Class {
        /// Qualified name
        name: String,
    },
    /// Type variable visible in the declaring scope
    Variable {
        /// Variable name
        name: String,
    },
    /// Parameterized type
    Parameterized {
        /// Qualified name of the nominal type
        base: String,
        /// Arguments
        arguments: Vec<TypeRef>,
    },
    /// Array type
    Array {
        /// Component type
        component: Box<TypeRef>,
    },
    /// Wildcard argument
    Wildcard {
        /// `? extends`
        #[serde(default)]
        upper: Option<Box<TypeRef>>,
        /// `? super`
        #[serde(default)]
        lower: Option<Box<TypeRef>>,
    },
}

impl TypeRef {
    /// Nominal reference
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class { name: name.into() }
    }

    /// Type variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        TypeRef::Variable { name: name.into() }
    }

    /// Parameterized reference
    pub fn parameterized(base: impl Into<String>, arguments: Vec<TypeRef>) -> Self {
        TypeRef::Parameterized {
            base: base.into(),
            arguments,
        }
    }

    /// Array reference
    pub fn array(component: TypeRef) -> Self {
        TypeRef::Array {
            component: Box::new(component),
        }
    }

    /// Erased qualified name
    pub fn erasure(&self, variables: &dyn Fn(&str) -> String) -> String {
        match self {
            TypeRef::Class { name } => name.clone(),
            TypeRef::Variable { name } => variables(name),
            TypeRef::Parameterized { base, .. } => base.clone(),
            TypeRef::Array { component } => format!("{}[]", component.erasure(variables)),
            TypeRef::Wildcard { upper, .. } => upper
                .as_ref()
                .map(|u| u.erasure(variables))
                .unwrap_or_else(|| crate::ROOT_TYPE.to_string()),
        }
    }
}

/// Annotation usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDescriptor {
    /// Qualified annotation type
    pub type_name: String,
    /// Parameter values in declaration order
    #[serde(default)]
    pub values: IndexMap<String, Literal>,
}

/// Declared type variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParameterDescriptor {
    /// Name
    pub name: String,
    /// Upper bound
    #[serde(default)]
    pub bound: Option<TypeRef>,
}

/// Field metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Modifiers
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Compile time constant value
    #[serde(default)]
    pub constant: Option<Literal>,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// Parameter metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Name, absent when compiled without parameter names
    #[serde(default)]
    pub name: Option<String>,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Variable arity
    #[serde(default)]
    pub varargs: bool,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// Method or constructor metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Name
    pub name: String,
    /// Modifiers
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Method level type variables
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterDescriptor>,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Return type, absent for constructors and `void`
    #[serde(default)]
    pub returns: Option<TypeRef>,
    /// Declared exceptions
    #[serde(default)]
    pub exceptions: Vec<TypeRef>,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// Class metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Qualified name
    pub name: String,
    /// Package name
    #[serde(default)]
    pub package: String,
    /// Qualified name of the declaring class of nested types
    #[serde(default)]
    pub declaring_class: Option<String>,
    /// Category
    #[serde(default)]
    pub category: TypeCategory,
    /// Modifiers
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Type variables
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterDescriptor>,
    /// Superclass
    #[serde(default)]
    pub super_class: Option<TypeRef>,
    /// Super interfaces
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Fields
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Methods
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    /// Constructors
    #[serde(default)]
    pub constructors: Vec<MethodDescriptor>,
    /// Qualified names of nested classes
    #[serde(default)]
    pub nested: Vec<String>,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

impl ClassDescriptor {
    /// Simple name (last segment of the qualified name)
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Package metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Qualified name
    pub name: String,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// Reflective handle of a node
#[derive(Debug, Clone, PartialEq)]
pub enum ReflectiveObject {
    /// Package
    Package(Rc<PackageDescriptor>),
    /// Type
    Class(Rc<ClassDescriptor>),
    /// Field
    Field(FieldDescriptor),
    /// Method or constructor
    Method(MethodDescriptor),
    /// Parameter
    Parameter(ParameterDescriptor),
}

impl ReflectiveObject {
    /// Annotations carried by the handle
    pub fn annotations(&self) -> &[AnnotationDescriptor] {
        match self {
            ReflectiveObject::Package(p) => &p.annotations,
            ReflectiveObject::Class(c) => &c.annotations,
            ReflectiveObject::Field(f) => &f.annotations,
            ReflectiveObject::Method(m) => &m.annotations,
            ReflectiveObject::Parameter(p) => &p.annotations,
        }
    }
}

/// Provider of binary metadata
pub trait ReflectiveLoader {
    /// Look up a class by qualified name
    fn load_class(&self, qualified_name: &str) -> Option<Rc<ClassDescriptor>>;

    /// Look up a package by qualified name
    fn load_package(&self, _qualified_name: &str) -> Option<Rc<PackageDescriptor>> {
        None
    }
}

/// JSON document accepted by [`DescriptorRegistry::from_json`]
#[derive(Debug, Default, Serialize, Deserialize)]
struct DescriptorDocument {
    #[serde(default)]
    packages: Vec<PackageDescriptor>,
    #[serde(default)]
    classes: Vec<ClassDescriptor>,
}

/// In-memory [`ReflectiveLoader`]
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    classes: FxHashMap<String, Rc<ClassDescriptor>>,
    packages: FxHashMap<String, Rc<PackageDescriptor>>,
}

impl DescriptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a registry from `{ "packages": [...], "classes": [...] }`
    pub fn from_json(json: &str) -> CodeResult<Self> {
        let document: DescriptorDocument = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for package in document.packages {
            registry.add_package(package);
        }
        for class in document.classes {
            registry.add_class(class);
        }
        Ok(registry)
    }

    /// Decode a registry from a JSON file
    pub fn from_file(path: &Path) -> CodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Register a class
    pub fn add_class(&mut self, class: ClassDescriptor) {
        self.classes.insert(class.name.clone(), Rc::new(class));
    }

    /// Register a package
    pub fn add_package(&mut self, package: PackageDescriptor) {
        self.packages.insert(package.name.clone(), Rc::new(package));
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ReflectiveLoader for DescriptorRegistry {
    fn load_class(&self, qualified_name: &str) -> Option<Rc<ClassDescriptor>> {
        self.classes.get(qualified_name).cloned()
    }

    fn load_package(&self, qualified_name: &str) -> Option<Rc<PackageDescriptor>> {
        self.packages.get(qualified_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_json() {
        let registry = DescriptorRegistry::from_json(
            r#"{
  "classes": [
    {
      "name": "com.example.Box",
      "package": "com.example",
      "type_parameters": [{ "name": "T" }],
      "fields": [
        { "name": "value", "type": { "kind": "variable", "name": "T" } }
      ],
      "methods": [
        {
          "name": "get",
          "modifiers": { "visibility": "public", "keywords": [] },
          "returns": { "kind": "variable", "name": "T" }
        }
      ]
    }
  ]
}"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 1);
        let class = registry.load_class("com.example.Box").unwrap();
        assert_eq!(class.simple_name(), "Box");
        assert_eq!(class.fields[0].ty, TypeRef::variable("T"));
        assert_eq!(class.category, TypeCategory::Class);
        assert!(registry.load_class("com.example.Missing").is_none());
    }

    #[test]
    fn test_invalid_json() {
        let result = DescriptorRegistry::from_json("{ \"classes\": 3 }");
        assert!(matches!(result, Err(crate::CodeError::Descriptor(_))));
    }

    #[test]
    fn test_erasure() {
        let bound = |_: &str| "java.lang.Number".to_string();
        let list = TypeRef::parameterized("java.util.List", vec![TypeRef::variable("T")]);
        assert_eq!(list.erasure(&bound), "java.util.List");
        assert_eq!(
            TypeRef::array(TypeRef::variable("T")).erasure(&bound),
            "java.lang.Number[]"
        );
    }
}
