//! Type declarations and the type registry
//!
//! `get_type` is the single entry point that materializes types: the
//! registry cache first, then predefined primitives, then the reflective
//! loader, then the source loader. Types materialized from a loader are
//! created empty and populated by [`CodeModel::initialize`].

use crate::copy::CopyMapper;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{CodeError, CodeResult};
use crate::model::{CodeModel, PRIMITIVES};
use crate::modifiers::{Modifier, Modifiers, Visibility};
use crate::node::{
    Layer, NodeId, NodeKind, OperationData, OperationKind, SourceOrigin, TypeCategory, TypeData,
    VariableData,
};
use crate::reflect::{ClassDescriptor, MethodDescriptor, ReflectiveObject, TypeRef};
use crate::{JAVA_LANG, ROOT_ENUMERATION_TYPE, ROOT_EXCEPTION_TYPE, ROOT_TYPE};
use rustc_hash::FxHashSet;
use std::rc::Rc;

const SERIALIZABLE: &str = "java.io.Serializable";
const COMPARABLE: &str = "java.lang.Comparable";

/// Simple names that resolve to `java.lang` without an import
const JAVA_LANG_TYPES: &[&str] = &[
    "AutoCloseable",
    "Boolean",
    "Byte",
    "CharSequence",
    "Character",
    "Class",
    "Cloneable",
    "Comparable",
    "Deprecated",
    "Double",
    "Enum",
    "Error",
    "Exception",
    "Float",
    "FunctionalInterface",
    "IllegalArgumentException",
    "IllegalStateException",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "NullPointerException",
    "Number",
    "Object",
    "Override",
    "Runnable",
    "RuntimeException",
    "SafeVarargs",
    "Short",
    "String",
    "StringBuilder",
    "SuppressWarnings",
    "System",
    "Thread",
    "Throwable",
    "UnsupportedOperationException",
    "Void",
];

impl CodeModel {
    pub(crate) fn type_data(&self, id: NodeId) -> CodeResult<&TypeData> {
        match &self.node(id).kind {
            NodeKind::Type(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "type")),
        }
    }

    pub(crate) fn type_data_mut(&mut self, id: NodeId) -> CodeResult<&mut TypeData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Type(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "type")),
        }
    }

    /// Predefined primitive type by name (`int`, `void`, ...)
    pub fn primitive(&self, name: &str) -> Option<NodeId> {
        self.primitives.get(name).copied()
    }

    /// Check whether a type is a predefined primitive
    pub fn is_primitive(&self, id: NodeId) -> bool {
        matches!(&self.node(id).kind, NodeKind::Type(data) if data.primitive)
    }

    /// Check whether a type is `void`
    pub fn is_void(&self, id: NodeId) -> bool {
        self.primitive("void") == Some(id)
    }

    /// The root of the type hierarchy (`java.lang.Object`), always frozen
    pub fn root_type(&mut self) -> CodeResult<NodeId> {
        let root = self.type_or_placeholder(ROOT_TYPE)?;
        self.mark_system_immutable(root);
        Ok(root)
    }

    /// The root of the exception hierarchy (`java.lang.Throwable`), always frozen
    ///
    /// Without metadata from a loader it is predefined as a public class
    /// extending the root type and implementing `java.io.Serializable`.
    pub fn root_exception_type(&mut self) -> CodeResult<NodeId> {
        let throwable = self.type_or_placeholder(ROOT_EXCEPTION_TYPE)?;
        if self.is_system_immutable(throwable) {
            return Ok(throwable);
        }
        if self.is_bare_type(throwable) {
            let root = self.root_type()?;
            let serializable = self.type_or_placeholder(SERIALIZABLE)?;
            self.set_modifiers(throwable, Modifiers::public())?;
            self.set_super_class(throwable, Some(root))?;
            self.add_super_interface(throwable, serializable)?;
        }
        self.initialize(throwable)?;
        self.mark_system_immutable(throwable);
        Ok(throwable)
    }

    /// The common base of enumerations (`java.lang.Enum<E extends Enum<E>>`),
    /// always frozen
    ///
    /// Without metadata from a loader it is predefined as an abstract class
    /// extending the root type and implementing `Comparable<E>` and
    /// `java.io.Serializable`.
    pub fn root_enumeration_type(&mut self) -> CodeResult<NodeId> {
        let enumeration = self.type_or_placeholder(ROOT_ENUMERATION_TYPE)?;
        if self.is_system_immutable(enumeration) {
            return Ok(enumeration);
        }
        if self.is_bare_type(enumeration) {
            let root = self.root_type()?;
            let comparable = self.type_or_placeholder(COMPARABLE)?;
            let serializable = self.type_or_placeholder(SERIALIZABLE)?;
            self.set_modifiers(
                enumeration,
                Modifiers::new(Visibility::Public, [Modifier::Abstract]),
            )?;
            let e = self.add_type_variable(enumeration, "E")?;
            let bound = self.parameterize(e, enumeration, vec![e])?;
            self.set_bound(e, Some(bound))?;
            self.set_super_class(enumeration, Some(root))?;
            let comparable_of_e = self.parameterize(enumeration, comparable, vec![e])?;
            self.add_super_interface(enumeration, comparable_of_e)?;
            self.add_super_interface(enumeration, serializable)?;
        }
        self.initialize(enumeration)?;
        self.mark_system_immutable(enumeration);
        Ok(enumeration)
    }

    /// A type no origin describes and nobody has declared anything on
    fn is_bare_type(&self, ty: NodeId) -> bool {
        let node = self.node(ty);
        if node.reflective.is_some() || !matches!(node.source, SourceOrigin::None) {
            return false;
        }
        matches!(&node.kind, NodeKind::Type(data)
            if data.super_class.is_none()
                && data.super_interfaces.is_empty()
                && data.type_variables.is_empty()
                && data.fields.is_empty()
                && data.methods.is_empty())
    }

    /// Simple name of a type or generic type
    pub fn simple_name(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Type(data) => data.simple_name.clone(),
            NodeKind::TypeVariable(data) => data.name.clone(),
            NodeKind::Wildcard(_) => "?".to_string(),
            NodeKind::Parameterized(data) => self.simple_name(data.base),
            NodeKind::Array(data) => format!("{}[]", self.simple_name(data.component)),
            kind => kind.name_of().unwrap_or_default().to_string(),
        }
    }

    /// Fully qualified name of a node
    pub fn qualified_name(&self, id: NodeId) -> String {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Package(_) => self.package_qualified_name(id),
            NodeKind::Type(data) => {
                if data.primitive {
                    return data.simple_name.clone();
                }
                let Some(parent) = node.parent else {
                    return data.simple_name.clone();
                };
                let owner = match &self.node(parent).kind {
                    NodeKind::Type(_) => self.qualified_name(parent),
                    NodeKind::File(_) => self
                        .node(parent)
                        .parent
                        .map(|p| self.package_qualified_name(p))
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                self.syntax().qualify(&owner, &data.simple_name)
            }
            NodeKind::File(data) => {
                let package = node
                    .parent
                    .map(|p| self.package_qualified_name(p))
                    .unwrap_or_default();
                self.syntax().qualify(&package, &data.name)
            }
            NodeKind::Parameterized(data) => self.qualified_name(data.base),
            NodeKind::Array(data) => format!("{}[]", self.qualified_name(data.component)),
            NodeKind::Wildcard(_) => "?".to_string(),
            kind => kind.name_of().unwrap_or_default().to_string(),
        }
    }

    /// Look up or load a type of the main layer by qualified name
    pub fn get_type(&mut self, qualified: &str) -> CodeResult<Option<NodeId>> {
        if let Some(id) = self.types.get(qualified) {
            return Ok(Some(*id));
        }
        if let Some(id) = self.primitive(qualified) {
            return Ok(Some(id));
        }
        if let Some(loader) = self.reflective_loader.clone() {
            if let Some(descriptor) = loader.load_class(qualified) {
                return self.create_reflective_type(descriptor).map(Some);
            }
        }
        if let Some(loader) = self.source_loader.clone() {
            if loader.has_type(qualified) {
                return self.create_source_backed_type(qualified).map(Some);
            }
        }
        let separator = self.syntax().package_separator;
        if let Some((outer, simple)) = qualified.rsplit_once(separator) {
            let starts_upper = outer
                .rsplit(separator)
                .next()
                .and_then(|s| s.chars().next())
                .is_some_and(char::is_uppercase);
            if starts_upper {
                if let Some(outer) = self.get_type(outer)? {
                    return self.nested_type(outer, simple);
                }
            }
        }
        Ok(None)
    }

    /// Look up a type, creating an origin-less placeholder if nobody provides it
    pub fn type_or_placeholder(&mut self, qualified: &str) -> CodeResult<NodeId> {
        if let Some(id) = self.get_type(qualified)? {
            return Ok(id);
        }
        self.report(Diagnostic::debug(
            DiagnosticCode::UnresolvedType,
            format!("Creating placeholder for unresolved type {}", qualified),
        ));
        let (package, simple) = self.split_qualified(qualified);
        let package = self.get_or_create_package(Layer::Main, &package)?;
        let file = self.file_internal(package, &simple);
        let id = self.new_type(file, &simple);
        self.node_mut(id).initialized = true;
        self.file_data_mut(file)?.types.push(id);
        self.types.insert(qualified.to_string(), id);
        Ok(id)
    }

    /// Check whether any origin knows a qualified type name
    pub fn is_type_known(&self, qualified: &str) -> bool {
        self.types.contains_key(qualified)
            || self
                .reflective_loader
                .as_ref()
                .is_some_and(|loader| loader.load_class(qualified).is_some())
            || self
                .source_loader
                .as_ref()
                .is_some_and(|loader| loader.has_type(qualified))
    }

    /// Resolve a simple (or partially qualified) name as seen from a scope node
    ///
    /// Resolution order: types of the scope's compilation unit, explicit
    /// imports, primitives, `java.lang`, on-demand imports, and finally the
    /// package of the scope.
    pub fn qualified_name_for(&mut self, simple: &str, scope: Option<NodeId>) -> CodeResult<String> {
        if PRIMITIVES.contains(&simple) {
            return Ok(simple.to_string());
        }
        let separator = self.syntax().package_separator;
        if let Some((head, rest)) = simple.split_once(separator) {
            if head.chars().next().is_some_and(char::is_lowercase) {
                return Ok(simple.to_string());
            }
            let head = self.qualified_name_for(head, scope)?;
            return Ok(format!("{}{}{}", head, separator, rest));
        }

        let file = scope.and_then(|s| self.file_of(s));
        if let Some(file) = file {
            if let Some(ty) = self.child_type(file, simple)? {
                return Ok(self.qualified_name(ty));
            }
            for import in self.imports(file)? {
                if import.is_static || import.is_wildcard() {
                    continue;
                }
                if import.name.rsplit(separator).next() == Some(simple) {
                    return Ok(import.name);
                }
            }
        }

        let lang = self.syntax().qualify(JAVA_LANG, simple);
        if JAVA_LANG_TYPES.contains(&simple) || self.is_type_known(&lang) {
            return Ok(lang);
        }

        if let Some(file) = file {
            for import in self.imports(file)? {
                if import.is_static || !import.is_wildcard() {
                    continue;
                }
                let prefix = import.name.trim_end_matches('*');
                let candidate = format!("{}{}", prefix, simple);
                if self.is_type_known(&candidate) {
                    return Ok(candidate);
                }
            }
        }

        let package = file
            .and_then(|f| self.package_of(f))
            .map(|p| self.package_qualified_name(p))
            .unwrap_or_default();
        Ok(self.syntax().qualify(&package, simple))
    }

    fn split_qualified(&self, qualified: &str) -> (String, String) {
        match qualified.rsplit_once(self.syntax().package_separator) {
            Some((package, simple)) => (package.to_string(), simple.to_string()),
            None => (String::new(), qualified.to_string()),
        }
    }

    fn new_type(&mut self, parent: NodeId, simple: &str) -> NodeId {
        self.alloc(
            Some(parent),
            NodeKind::Type(TypeData {
                simple_name: simple.to_string(),
                ..TypeData::default()
            }),
        )
    }

    pub(crate) fn register_type(&mut self, id: NodeId) {
        let qualified = self.qualified_name(id);
        let registry = match self.node(id).layer {
            Layer::Main => &mut self.types,
            Layer::Source => &mut self.source_types,
        };
        registry.entry(qualified).or_insert(id);
    }

    /// Create a top level type in a compilation unit
    pub fn add_type(&mut self, file: NodeId, simple: &str) -> CodeResult<NodeId> {
        self.verify_mutable(file)?;
        let exists = self
            .file_data(file)?
            .types
            .iter()
            .any(|t| self.simple_name(*t) == simple);
        if exists {
            return Err(CodeError::DuplicateMember {
                name: simple.to_string(),
            });
        }
        let id = self.new_type(file, simple);
        self.node_mut(id).initialized = true;
        self.file_data_mut(file)?.types.push(id);
        self.register_type(id);
        Ok(id)
    }

    /// Create a nested type
    pub fn add_nested_type(&mut self, outer: NodeId, simple: &str) -> CodeResult<NodeId> {
        self.initialize(outer)?;
        self.verify_mutable(outer)?;
        if self.nested_type(outer, simple)?.is_some() {
            return Err(CodeError::DuplicateMember {
                name: simple.to_string(),
            });
        }
        let id = self.new_type(outer, simple);
        self.node_mut(id).initialized = true;
        self.type_data_mut(outer)?.nested_types.push(id);
        self.register_type(id);
        Ok(id)
    }

    /// Nested types of a type
    pub fn nested_types(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.nested_types.clone())
    }

    /// Nested type by simple name
    pub fn nested_type(&mut self, ty: NodeId, simple: &str) -> CodeResult<Option<NodeId>> {
        let nested = self.nested_types(ty)?;
        Ok(nested.into_iter().find(|t| self.simple_name(*t) == simple))
    }

    /// Declaring type of a nested type or member
    pub fn declaring_type(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        matches!(self.node(parent).kind, NodeKind::Type(_)).then_some(parent)
    }

    /// Category of a type
    pub fn category(&mut self, ty: NodeId) -> CodeResult<TypeCategory> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.category)
    }

    /// Change the category of a type
    pub fn set_category(&mut self, ty: NodeId, category: TypeCategory) -> CodeResult<()> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        self.type_data_mut(ty)?.category = category;
        Ok(())
    }

    /// Modifiers of a type, field, or operation
    pub fn modifiers(&mut self, id: NodeId) -> CodeResult<Modifiers> {
        self.initialize(id)?;
        match &self.node(id).kind {
            NodeKind::Type(data) => Ok(data.modifiers.clone()),
            NodeKind::Field(data) => Ok(data.modifiers.clone()),
            NodeKind::Operation(data) => Ok(data.modifiers.clone()),
            _ => Err(CodeError::kind_mismatch(id, "type or member")),
        }
    }

    /// Replace the modifiers of a type, field, or operation
    pub fn set_modifiers(&mut self, id: NodeId, modifiers: Modifiers) -> CodeResult<()> {
        self.initialize(id)?;
        self.verify_mutable(id)?;
        match &mut self.node_mut(id).kind {
            NodeKind::Type(data) => data.modifiers = modifiers,
            NodeKind::Field(data) => data.modifiers = modifiers,
            NodeKind::Operation(data) => data.modifiers = modifiers,
            _ => return Err(CodeError::kind_mismatch(id, "type or member")),
        }
        if let Some(owner) = self.declaring_type(id) {
            self.invalidate_properties(owner);
        }
        Ok(())
    }

    /// Declared superclass
    pub fn super_class(&mut self, ty: NodeId) -> CodeResult<Option<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.super_class)
    }

    /// Replace the declared superclass
    pub fn set_super_class(&mut self, ty: NodeId, super_class: Option<NodeId>) -> CodeResult<()> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        self.type_data_mut(ty)?.super_class = super_class;
        Ok(())
    }

    /// Declared super interfaces
    pub fn super_interfaces(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        Ok(self.type_data(ty)?.super_interfaces.clone())
    }

    /// Add a super interface
    pub fn add_super_interface(&mut self, ty: NodeId, interface: NodeId) -> CodeResult<()> {
        self.initialize(ty)?;
        self.verify_mutable(ty)?;
        self.type_data_mut(ty)?.super_interfaces.push(interface);
        Ok(())
    }

    /// All nominal super types
    ///
    /// The superclass chain comes first, then for the type and each class of
    /// that chain its interfaces in declaration order, each followed by its
    /// own super interfaces. Every type occurs once.
    pub fn super_type_walk(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        let ty = self.as_type(ty)?;
        let mut seen = FxHashSet::default();
        seen.insert(ty);
        let mut chain = Vec::new();
        let mut current = ty;
        while let Some(super_class) = self.super_class(current)? {
            let super_class = self.as_type(super_class)?;
            if !seen.insert(super_class) {
                break;
            }
            chain.push(super_class);
            current = super_class;
        }

        let mut walk = chain.clone();
        for class in std::iter::once(ty).chain(chain) {
            let mut stack: Vec<NodeId> = self.super_interfaces(class)?;
            stack.reverse();
            while let Some(interface) = stack.pop() {
                let interface = self.as_type(interface)?;
                if !seen.insert(interface) {
                    continue;
                }
                walk.push(interface);
                let mut parents = self.super_interfaces(interface)?;
                parents.reverse();
                stack.extend(parents);
            }
        }
        Ok(walk)
    }

    /// Source layer type by qualified name, parsing it on first request
    pub fn source_type(&mut self, qualified: &str) -> CodeResult<Option<NodeId>> {
        if let Some(id) = self.source_types.get(qualified) {
            return Ok(Some(*id));
        }
        let Some(loader) = self.source_loader.clone() else {
            return Ok(None);
        };
        loader.load_type(self, qualified)
    }

    fn create_reflective_type(&mut self, descriptor: Rc<ClassDescriptor>) -> CodeResult<NodeId> {
        if let Some(declaring) = &descriptor.declaring_class {
            if let Some(outer) = self.get_type(declaring)? {
                self.initialize(outer)?;
                return self.types.get(&descriptor.name).copied().ok_or_else(|| {
                    CodeError::IdentityMismatch {
                        expected: declaring.clone(),
                        actual: descriptor.name.clone(),
                    }
                });
            }
        }

        let separator = self.syntax().package_separator;
        let in_package = descriptor.package.is_empty()
            || descriptor
                .name
                .strip_prefix(descriptor.package.as_str())
                .is_some_and(|rest| rest.starts_with(separator));
        if !in_package {
            return Err(CodeError::IdentityMismatch {
                expected: descriptor.package.clone(),
                actual: descriptor.name.clone(),
            });
        }

        let package = self.get_or_create_package(Layer::Main, &descriptor.package)?;
        let simple = descriptor.simple_name().to_string();
        let file = self.file_internal(package, &simple);
        let id = self.new_type(file, &simple);
        self.file_data_mut(file)?.types.push(id);
        self.attach_class_descriptor(id, descriptor);
        let qualified = self.qualified_name(id);
        if self
            .source_loader
            .as_ref()
            .is_some_and(|loader| loader.has_type(&qualified))
        {
            self.node_mut(id).source = SourceOrigin::Pending(qualified);
        }
        self.register_type(id);
        Ok(id)
    }

    fn attach_class_descriptor(&mut self, id: NodeId, descriptor: Rc<ClassDescriptor>) {
        if let NodeKind::Type(data) = &mut self.node_mut(id).kind {
            data.category = descriptor.category;
            data.modifiers = descriptor.modifiers.clone();
        }
        self.node_mut(id).reflective = Some(ReflectiveObject::Class(descriptor));
    }

    fn create_source_backed_type(&mut self, qualified: &str) -> CodeResult<NodeId> {
        let (package, simple) = self.split_qualified(qualified);
        let package = self.get_or_create_package(Layer::Main, &package)?;
        let file = self.file_internal(package, &simple);
        let id = self.new_type(file, &simple);
        self.file_data_mut(file)?.types.push(id);
        self.node_mut(id).source = SourceOrigin::Pending(qualified.to_string());
        self.types.insert(qualified.to_string(), id);
        Ok(id)
    }

    /// Shadow of a node in the source layer, loading it if still pending
    pub(crate) fn resolve_source_origin(&mut self, id: NodeId) -> CodeResult<Option<NodeId>> {
        if self.node(id).layer == Layer::Source {
            return Ok(None);
        }
        match self.node(id).source.clone() {
            SourceOrigin::None => Ok(None),
            SourceOrigin::Resolved(source) => Ok(Some(source)),
            SourceOrigin::Pending(qualified) => {
                let source = self.source_type(&qualified)?;
                self.node_mut(id).source = match source {
                    Some(source) => SourceOrigin::Resolved(source),
                    None => SourceOrigin::None,
                };
                Ok(source)
            }
        }
    }

    pub(crate) fn initialize_type(&mut self, id: NodeId) -> CodeResult<()> {
        if let Some(ReflectiveObject::Class(descriptor)) = self.node(id).reflective.clone() {
            self.initialize_type_reflective(id, &descriptor)?;
        }
        if let Some(source) = self.resolve_source_origin(id)? {
            self.merge_type_source(id, source)?;
        }
        Ok(())
    }

    fn initialize_type_reflective(&mut self, id: NodeId, descriptor: &ClassDescriptor) -> CodeResult<()> {
        let variables = self.declare_reflective_variables(id, &descriptor.type_parameters)?;
        self.type_data_mut(id)?.type_variables = variables;

        let super_class = match &descriptor.super_class {
            Some(reference) => Some(self.type_from_ref(id, id, reference)?),
            None => None,
        };
        let mut interfaces = Vec::with_capacity(descriptor.interfaces.len());
        for reference in &descriptor.interfaces {
            interfaces.push(self.type_from_ref(id, id, reference)?);
        }

        let mut fields = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            let node = self.alloc(
                Some(id),
                NodeKind::Field(crate::node::FieldData {
                    name: field.name.clone(),
                    modifiers: field.modifiers.clone(),
                    ..Default::default()
                }),
            );
            self.node_mut(node).reflective = Some(ReflectiveObject::Field(field.clone()));
            fields.push(node);
        }
        let methods = self.declare_reflective_operations(id, OperationKind::Method, &descriptor.methods);
        let constructors =
            self.declare_reflective_operations(id, OperationKind::Constructor, &descriptor.constructors);

        {
            let data = self.type_data_mut(id)?;
            data.super_class = super_class;
            data.super_interfaces = interfaces;
            data.fields = fields;
            data.methods = methods;
            data.constructors = constructors;
        }

        let loader = self.reflective_loader.clone();
        for nested_name in &descriptor.nested {
            let Some(nested) = loader.as_ref().and_then(|l| l.load_class(nested_name)) else {
                self.report(Diagnostic::debug(
                    DiagnosticCode::UnresolvedType,
                    format!("Nested type {} of {} not found", nested_name, descriptor.name),
                ));
                continue;
            };
            if nested.declaring_class.as_deref() != Some(descriptor.name.as_str()) {
                return Err(CodeError::IdentityMismatch {
                    expected: descriptor.name.clone(),
                    actual: nested.declaring_class.clone().unwrap_or_default(),
                });
            }
            let simple = nested.simple_name().to_string();
            let node = self.new_type(id, &simple);
            self.attach_class_descriptor(node, nested);
            self.type_data_mut(id)?.nested_types.push(node);
            self.register_type(node);
        }

        self.add_reflective_annotations(id, &descriptor.annotations)
    }

    fn declare_reflective_operations(
        &mut self,
        owner: NodeId,
        kind: OperationKind,
        descriptors: &[MethodDescriptor],
    ) -> Vec<NodeId> {
        let simple = self.simple_name(owner);
        descriptors
            .iter()
            .map(|descriptor| {
                let name = match kind {
                    OperationKind::Method => descriptor.name.clone(),
                    OperationKind::Constructor => simple.clone(),
                };
                let mut data = OperationData::new(kind, name);
                data.modifiers = descriptor.modifiers.clone();
                let node = self.alloc(Some(owner), NodeKind::Operation(data));
                self.node_mut(node).reflective = Some(ReflectiveObject::Method(descriptor.clone()));
                node
            })
            .collect()
    }

    /// Create type variables of a reflective scope, then their bounds
    pub(crate) fn declare_reflective_variables(
        &mut self,
        owner: NodeId,
        parameters: &[crate::reflect::TypeParameterDescriptor],
    ) -> CodeResult<Vec<NodeId>> {
        let variables: Vec<NodeId> = parameters
            .iter()
            .map(|parameter| {
                let variable = self.alloc(
                    Some(owner),
                    NodeKind::TypeVariable(VariableData {
                        name: parameter.name.clone(),
                        ..VariableData::default()
                    }),
                );
                self.node_mut(variable).initialized = true;
                variable
            })
            .collect();
        // Variables are visible to the bounds before the bounds are built
        match &mut self.node_mut(owner).kind {
            NodeKind::Type(data) => data.type_variables = variables.clone(),
            NodeKind::Operation(data) => data.type_variables = variables.clone(),
            _ => return Err(CodeError::kind_mismatch(owner, "type or operation")),
        }
        for (variable, parameter) in variables.iter().zip(parameters) {
            if let Some(bound) = &parameter.bound {
                let bound = self.type_from_ref(owner, *variable, bound)?;
                if let NodeKind::TypeVariable(data) = &mut self.node_mut(*variable).kind {
                    data.bound = Some(bound);
                }
            }
        }
        Ok(variables)
    }

    /// Materialize a descriptor type reference
    ///
    /// Variables are looked up from `scope` outwards; generic nodes created for
    /// the reference are owned by `owner`.
    pub(crate) fn type_from_ref(&mut self, scope: NodeId, owner: NodeId, reference: &TypeRef) -> CodeResult<NodeId> {
        match reference {
            TypeRef::Class { name } => self.type_or_placeholder(name),
            TypeRef::Variable { name } => match self.find_type_variable(scope, name) {
                Some(variable) => Ok(variable),
                None => {
                    self.report(Diagnostic::debug(
                        DiagnosticCode::UnresolvedType,
                        format!("Type variable {} not visible from {}", name, self.path_string(scope)),
                    ));
                    let variable = self.alloc(
                        Some(owner),
                        NodeKind::TypeVariable(VariableData {
                            name: name.clone(),
                            ..VariableData::default()
                        }),
                    );
                    self.node_mut(variable).initialized = true;
                    Ok(variable)
                }
            },
            TypeRef::Parameterized { base, arguments } => {
                let base = self.type_or_placeholder(base)?;
                let parameterized = self.parameterize(owner, base, Vec::new())?;
                let mut resolved = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    resolved.push(self.type_from_ref(scope, parameterized, argument)?);
                }
                if let NodeKind::Parameterized(data) = &mut self.node_mut(parameterized).kind {
                    data.arguments = resolved;
                }
                Ok(parameterized)
            }
            TypeRef::Array { component } => {
                let component = self.type_from_ref(scope, owner, component)?;
                self.create_array(component)
            }
            TypeRef::Wildcard { upper, lower } => {
                let (kind, bound) = match (upper, lower) {
                    (_, Some(lower)) => (crate::node::BoundKind::Super, Some(lower)),
                    (Some(upper), None) => (crate::node::BoundKind::Extends, Some(upper)),
                    (None, None) => (crate::node::BoundKind::Extends, None),
                };
                let wildcard = self.add_wildcard(owner, kind, None)?;
                if let Some(bound) = bound {
                    let bound = self.type_from_ref(scope, wildcard, bound)?;
                    if let NodeKind::Wildcard(data) = &mut self.node_mut(wildcard).kind {
                        data.bound = Some(bound);
                    }
                }
                Ok(wildcard)
            }
        }
    }

    /// Merge the parsed shadow of a type into the type
    ///
    /// Shadow members matching a declared member (fields by name, operations
    /// by erased signature, nested types and variables by name) become that
    /// member's source origin; all other shadow members are copied in.
    fn merge_type_source(&mut self, id: NodeId, source: NodeId) -> CodeResult<()> {
        self.initialize(source)?;
        let shadow = self.type_data(source)?.clone();
        let has_reflective = self.node(id).reflective.is_some();
        let mut mapper = CopyMapper::new();
        mapper.register(source, id);
        let mut copied = Vec::new();
        let mut copied_types = Vec::new();

        if !has_reflective {
            let data = self.type_data_mut(id)?;
            data.category = shadow.category;
            data.modifiers = shadow.modifiers.clone();
        }

        for variable in &shadow.type_variables {
            let name = self.simple_name(*variable);
            let existing = self
                .type_data(id)?
                .type_variables
                .iter()
                .copied()
                .find(|v| self.simple_name(*v) == name);
            match existing {
                Some(existing) => mapper.register(*variable, existing),
                None => {
                    let copy = self.copy_detached(*variable, id, &mut mapper)?;
                    self.type_data_mut(id)?.type_variables.push(copy);
                    copied.push(copy);
                }
            }
        }

        for nested in &shadow.nested_types {
            let name = self.simple_name(*nested);
            let existing = self
                .type_data(id)?
                .nested_types
                .iter()
                .copied()
                .find(|t| self.simple_name(*t) == name);
            match existing {
                Some(existing) => {
                    mapper.register(*nested, existing);
                    if self.node(existing).source == SourceOrigin::None {
                        self.node_mut(existing).source = SourceOrigin::Resolved(*nested);
                    }
                }
                None => {
                    let copy = self.copy_detached(*nested, id, &mut mapper)?;
                    self.type_data_mut(id)?.nested_types.push(copy);
                    copied.push(copy);
                    copied_types.push(copy);
                }
            }
        }

        for field in &shadow.fields {
            let name = self.simple_name(*field);
            let existing = self
                .type_data(id)?
                .fields
                .iter()
                .copied()
                .find(|f| self.simple_name(*f) == name);
            match existing {
                Some(existing) => {
                    mapper.register(*field, existing);
                    self.node_mut(existing).source = SourceOrigin::Resolved(*field);
                }
                None => {
                    let copy = self.copy_detached(*field, id, &mut mapper)?;
                    self.type_data_mut(id)?.fields.push(copy);
                    copied.push(copy);
                }
            }
        }

        for (kind, operations) in [
            (OperationKind::Constructor, &shadow.constructors),
            (OperationKind::Method, &shadow.methods),
        ] {
            let declared: Vec<(NodeId, String)> = {
                let data = self.type_data(id)?;
                let list = match kind {
                    OperationKind::Method => &data.methods,
                    OperationKind::Constructor => &data.constructors,
                };
                list.iter()
                    .map(|op| (*op, self.declared_signature(*op)))
                    .collect()
            };
            for operation in operations {
                let signature = self.signature(*operation)?;
                match declared.iter().find(|(_, s)| *s == signature) {
                    Some((existing, _)) => {
                        mapper.register(*operation, *existing);
                        self.node_mut(*existing).source = SourceOrigin::Resolved(*operation);
                    }
                    None => {
                        let copy = self.copy_detached(*operation, id, &mut mapper)?;
                        let data = self.type_data_mut(id)?;
                        match kind {
                            OperationKind::Method => data.methods.push(copy),
                            OperationKind::Constructor => data.constructors.push(copy),
                        }
                        copied.push(copy);
                    }
                }
            }
        }

        if !has_reflective {
            let super_class = match shadow.super_class {
                Some(reference) => Some(self.adopt_reference(reference, source, id, &mut mapper, &mut copied)?),
                None => None,
            };
            let mut interfaces = Vec::with_capacity(shadow.super_interfaces.len());
            for reference in &shadow.super_interfaces {
                interfaces.push(self.adopt_reference(*reference, source, id, &mut mapper, &mut copied)?);
            }
            let data = self.type_data_mut(id)?;
            data.super_class = super_class;
            data.super_interfaces = interfaces;
        }

        self.merge_source_extras(id, source)?;
        for copy in copied {
            self.remap_references(copy, &mapper)?;
        }
        for copy in copied_types {
            self.register_types_in(copy);
        }
        Ok(())
    }

    /// Main layer type of a parsed source type, created on demand
    ///
    /// Secondary types of a compilation unit have no loader entry of their
    /// own; their main type links straight to the parsed shadow.
    pub(crate) fn main_type_for_source(&mut self, source: NodeId) -> CodeResult<NodeId> {
        let qualified = self.qualified_name(source);
        if let Some(id) = self.types.get(&qualified) {
            return Ok(*id);
        }
        if let Some(outer) = self.declaring_type(source) {
            let outer = self.main_type_for_source(outer)?;
            self.initialize(outer)?;
            return self.type_or_placeholder(&qualified);
        }
        if let Some(id) = self.get_type(&qualified)? {
            return Ok(id);
        }
        let id = self.create_source_backed_type(&qualified)?;
        self.node_mut(id).source = SourceOrigin::Resolved(source);
        Ok(id)
    }

    /// Take over a generic reference of a shadow node, copying it when the
    /// shadow owns it
    fn adopt_reference(
        &mut self,
        reference: NodeId,
        shadow_owner: NodeId,
        owner: NodeId,
        mapper: &mut CopyMapper,
        copied: &mut Vec<NodeId>,
    ) -> CodeResult<NodeId> {
        if self.node(reference).parent == Some(shadow_owner) {
            let copy = self.copy_detached(reference, owner, mapper)?;
            copied.push(copy);
            Ok(copy)
        } else {
            self.remap_target(reference, mapper)
        }
    }

    /// Annotations, documentation and comment of a shadow node
    pub(crate) fn merge_source_extras(&mut self, id: NodeId, source: NodeId) -> CodeResult<()> {
        self.merge_source_annotations(id, source)?;
        let shadow = self.node(source);
        let doc = shadow.doc.clone();
        let comment = shadow.comment.clone();
        let node = self.node_mut(id);
        if node.doc.is_empty() {
            node.doc = doc;
        }
        if node.comment.is_none() {
            node.comment = comment;
        }
        Ok(())
    }

    /// Signature of an operation without forcing its initialization
    pub(crate) fn declared_signature(&self, operation: NodeId) -> String {
        let node = self.node(operation);
        match (&node.reflective, &node.kind) {
            (Some(ReflectiveObject::Method(descriptor)), NodeKind::Operation(data)) if !node.initialized => {
                let class_parameters = match node.parent.map(|p| &self.node(p).reflective) {
                    Some(Some(ReflectiveObject::Class(class))) => class.type_parameters.clone(),
                    _ => Vec::new(),
                };
                let variable_erasure = |name: &str| {
                    descriptor
                        .type_parameters
                        .iter()
                        .chain(class_parameters.iter())
                        .find(|p| p.name == name)
                        .and_then(|p| p.bound.as_ref())
                        .map(|bound| bound.erasure(&|_| ROOT_TYPE.to_string()))
                        .unwrap_or_else(|| ROOT_TYPE.to_string())
                };
                let parameters: Vec<String> = descriptor
                    .parameters
                    .iter()
                    .map(|p| p.ty.erasure(&variable_erasure))
                    .collect();
                format!("{}({})", data.name, parameters.join(","))
            }
            (_, NodeKind::Operation(data)) => {
                let parameters: Vec<String> =
                    data.parameters.iter().map(|p| self.erasure(*p)).collect();
                format!("{}({})", data.name, parameters.join(","))
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_registration() {
        let mut model = CodeModel::new();
        let foo = model.type_or_placeholder("com.example.Foo").unwrap();
        assert_eq!(model.qualified_name(foo), "com.example.Foo");
        assert_eq!(model.simple_name(foo), "Foo");
        assert_eq!(model.get_type("com.example.Foo").unwrap(), Some(foo));
        assert_eq!(model.get_type("com.example.Bar").unwrap(), None);
    }

    #[test]
    fn test_root_type_is_system_immutable() {
        let mut model = CodeModel::new();
        let root = model.root_type().unwrap();
        assert_eq!(model.qualified_name(root), ROOT_TYPE);
        assert!(model.is_system_immutable(root));
        assert!(model.add_field(root, "x").is_err());
    }

    #[test]
    fn test_predefined_root_exception_type() {
        let mut model = CodeModel::new();
        let throwable = model.root_exception_type().unwrap();
        assert_eq!(model.qualified_name(throwable), ROOT_EXCEPTION_TYPE);
        assert!(model.is_system_immutable(throwable));
        assert_eq!(model.root_exception_type().unwrap(), throwable);

        let root = model.root_type().unwrap();
        assert_eq!(model.super_class(throwable).unwrap(), Some(root));
        let interfaces = model.super_interfaces(throwable).unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(model.qualified_name(interfaces[0]), SERIALIZABLE);
        assert!(model.add_field(throwable, "cause").is_err());
    }

    #[test]
    fn test_predefined_root_enumeration_type() {
        let mut model = CodeModel::new();
        let enumeration = model.root_enumeration_type().unwrap();
        assert_eq!(model.qualified_name(enumeration), ROOT_ENUMERATION_TYPE);
        assert!(model.is_system_immutable(enumeration));
        assert!(model.modifiers(enumeration).unwrap().is_abstract());

        let variables = model.type_variables(enumeration).unwrap();
        assert_eq!(variables.len(), 1);
        let e = variables[0];
        assert_eq!(model.simple_name(e), "E");
        let bound = model.bound(e).unwrap().unwrap();
        assert_eq!(model.base_type(bound), Some(enumeration));
        assert_eq!(model.type_arguments(bound), vec![e]);

        let root = model.root_type().unwrap();
        assert_eq!(model.super_class(enumeration).unwrap(), Some(root));
        let interfaces = model.super_interfaces(enumeration).unwrap();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(model.base_type(interfaces[0]).map(|c| model.qualified_name(c)).as_deref(), Some(COMPARABLE));
        assert_eq!(model.type_arguments(interfaces[0]), vec![e]);
        assert_eq!(model.qualified_name(interfaces[1]), SERIALIZABLE);
        assert!(model.add_type_variable(enumeration, "F").is_err());
    }

    #[test]
    fn test_qualified_name_for() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "com.example").unwrap();
        let file = model.create_file(package, "Foo").unwrap();
        let foo = model.add_type(file, "Foo").unwrap();
        model.add_nested_type(foo, "Inner").unwrap();
        model
            .add_import(file, crate::node::Import::of("java.util.List"))
            .unwrap();

        assert_eq!(model.qualified_name_for("int", Some(foo)).unwrap(), "int");
        assert_eq!(
            model.qualified_name_for("Inner", Some(foo)).unwrap(),
            "com.example.Foo.Inner"
        );
        assert_eq!(
            model.qualified_name_for("List", Some(foo)).unwrap(),
            "java.util.List"
        );
        assert_eq!(
            model.qualified_name_for("String", Some(foo)).unwrap(),
            "java.lang.String"
        );
        assert_eq!(
            model.qualified_name_for("Bar", Some(foo)).unwrap(),
            "com.example.Bar"
        );
        assert_eq!(
            model.qualified_name_for("List.Entry", Some(foo)).unwrap(),
            "java.util.List.Entry"
        );
        assert_eq!(
            model.qualified_name_for("java.util.Map", Some(foo)).unwrap(),
            "java.util.Map"
        );
    }

    #[test]
    fn test_duplicate_types_rejected() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, "A").unwrap();
        let a = model.add_type(file, "A").unwrap();
        assert!(model.add_type(file, "A").is_err());
        model.add_nested_type(a, "B").unwrap();
        assert!(matches!(
            model.add_nested_type(a, "B"),
            Err(CodeError::DuplicateMember { .. })
        ));
        assert_eq!(model.get_type("a.A.B").unwrap(), model.nested_type(a, "B").unwrap());
    }
}
