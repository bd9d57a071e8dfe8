//! Strata code model
//!
//! A layered, lazily initialized model of Java-like source code. Every
//! package, compilation unit, type, member, generic type node, annotation and
//! synthesized property is a node in one [`CodeModel`] arena.
//!
//! Nodes are populated on first access: the reflective origin (compiled type
//! descriptors) first, the source origin (parsed text in the shadow layer)
//! second. On top of that kernel the model offers
//!
//! - generic type resolution in the context of a subtype ([`CodeModel::resolve`])
//! - JavaBean style property synthesis ([`CodeModel::properties`])
//! - the effective annotation view along the type hierarchy
//!   ([`CodeModel::annotation_walk`])
//! - deep copies with reference remapping ([`CodeModel::copy`])
//! - KEEP / OVERRIDE / COMBINE merges ([`CodeModel::merge`])
//! - source text emission ([`CodeModel::write`])
//!
//! # Example
//!
//! ```ignore
//! use strata_model::{CodeModel, Layer};
//!
//! let mut model = CodeModel::new();
//! let package = model.get_or_create_package(Layer::Main, "com.example")?;
//! let file = model.create_file(package, "Person")?;
//! let person = model.add_type(file, "Person")?;
//! let age = model.add_field(person, "age")?;
//! println!("{}", model.write_to_string(file)?);
//! ```

#![warn(missing_docs)]

pub mod annotation;
pub mod config;
pub mod copy;
pub mod diagnostics;
pub mod doc;
pub mod error;
pub mod expression;
pub mod generic;
pub mod member;
pub mod merge;
pub mod model;
pub mod modifiers;
pub mod node;
pub mod package;
pub mod property;
pub mod reflect;
pub mod source;
pub mod statement;
pub mod types;
pub mod writer;

/// Qualified name of the root of the type hierarchy
pub const ROOT_TYPE: &str = "java.lang.Object";

/// Qualified name of the root of the exception hierarchy
pub const ROOT_EXCEPTION_TYPE: &str = "java.lang.Throwable";

/// Qualified name of the common base of enumerations
pub const ROOT_ENUMERATION_TYPE: &str = "java.lang.Enum";

/// Package whose types are visible without an import
pub const JAVA_LANG: &str = "java.lang";

// Re-exports for convenience
pub use annotation::{AnnotationData, AnnotationWalk};
pub use config::{AccessorKind, AccessorPrefix, CategoryKeywords, LanguageSyntax, ModelConfig};
pub use copy::CopyMapper;
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticCode, DiagnosticSink, Location, Severity, SharedSink,
    TracingSink,
};
pub use doc::{Comment, DocMethodLink};
pub use error::{CodeError, CodeResult};
pub use expression::{Expression, FieldReference, Literal, Operator};
pub use merge::MergeStrategy;
pub use model::{CodeModel, PRIMITIVES};
pub use modifiers::{Modifier, Modifiers, Visibility};
pub use node::{
    BoundKind, GenericKind, Import, Layer, Node, NodeId, NodeKind, OperationKind, SourceOrigin,
    TypeCategory,
};
pub use reflect::{
    AnnotationDescriptor, ClassDescriptor, DescriptorRegistry, FieldDescriptor, MethodDescriptor,
    PackageDescriptor, ParameterDescriptor, ReflectiveLoader, ReflectiveObject,
    TypeParameterDescriptor, TypeRef,
};
pub use source::SourceLoader;
pub use statement::{BlockKind, ForHeader, Statement};
