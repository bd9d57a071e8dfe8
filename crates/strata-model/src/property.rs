//! Property synthesis
//!
//! Properties group a field, a getter, and a setter by naming convention.
//! They are computed once per type from the declared members and cached
//! until a member of the type changes.
//!
//! Accessor rules:
//! - a getter prefix (`get`, `is`, `has`, `can` by default) with no
//!   parameters and a non-`void` return
//! - a setter prefix (`set`) with exactly one parameter
//! - the remainder after the prefix must start with an uppercase character
//!
//! Static members never form properties.

use crate::config::AccessorKind;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{CodeError, CodeResult};
use crate::model::CodeModel;
use crate::modifiers::Visibility;
use crate::node::{NodeId, NodeKind, PropertyData};
use indexmap::IndexMap;

/// Result of matching a method against the accessor rules
#[derive(Debug, Clone, PartialEq, Eq)]
enum AccessorMatch {
    NotAccessor,
    Rejected(&'static str),
    Accessor(AccessorKind, String),
}

/// Lower-case the first character of an accessor remainder
fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl CodeModel {
    fn property_data(&self, id: NodeId) -> CodeResult<&PropertyData> {
        match &self.node(id).kind {
            NodeKind::Property(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "property")),
        }
    }

    fn classify_accessor(&mut self, method: NodeId) -> CodeResult<AccessorMatch> {
        if self.modifiers(method)?.is_static() {
            return Ok(AccessorMatch::NotAccessor);
        }
        let name = self.simple_name(method);
        let Some((kind, remainder)) = self.config.accessor_prefix(&name) else {
            return Ok(AccessorMatch::NotAccessor);
        };
        if !remainder.chars().next().is_some_and(char::is_uppercase) {
            return Ok(AccessorMatch::Rejected("name does not continue with an uppercase character"));
        }
        let parameters = self.parameters(method)?.len();
        let valid = match kind {
            AccessorKind::Getter => {
                let returns = self.returns(method)?;
                parameters == 0 && returns.is_some_and(|r| !self.is_void(r))
            }
            AccessorKind::Setter => parameters == 1,
        };
        if !valid {
            return Ok(AccessorMatch::Rejected(match kind {
                AccessorKind::Getter => "getter must take no parameters and return a value",
                AccessorKind::Setter => "setter must take exactly one parameter",
            }));
        }
        Ok(AccessorMatch::Accessor(kind, decapitalize(remainder)))
    }

    /// Name of the property a method is an accessor of
    pub fn property_name_of(&mut self, method: NodeId) -> CodeResult<Option<String>> {
        match self.classify_accessor(method)? {
            AccessorMatch::Accessor(_, name) => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    /// Synthesized properties of a type
    pub fn properties(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(ty)?;
        if let Some(cached) = &self.type_data(ty)?.properties {
            return Ok(cached.clone());
        }

        let mut groups: IndexMap<String, PropertyData> = IndexMap::new();
        for field in self.fields(ty)? {
            if self.modifiers(field)?.is_static() {
                continue;
            }
            let name = self.simple_name(field);
            let group = groups.entry(name.clone()).or_insert_with(|| PropertyData {
                name,
                ..PropertyData::default()
            });
            group.field = Some(field);
        }

        for method in self.methods(ty)? {
            let (kind, name) = match self.classify_accessor(method)? {
                AccessorMatch::NotAccessor => continue,
                AccessorMatch::Rejected(reason) => {
                    self.report(
                        Diagnostic::debug(
                            DiagnosticCode::IgnoredAccessor,
                            format!("Ignoring accessor candidate: {}", reason),
                        )
                        .with_subject(self.path_string(method)),
                    );
                    continue;
                }
                AccessorMatch::Accessor(kind, name) => (kind, name),
            };
            let group = groups.entry(name.clone()).or_insert_with(|| PropertyData {
                name: name.clone(),
                ..PropertyData::default()
            });
            let slot = match kind {
                AccessorKind::Getter => &mut group.getter,
                AccessorKind::Setter => &mut group.setter,
            };
            if let Some(previous) = slot.replace(method) {
                let message = format!(
                    "Replacing {:?} of property {} ({} by {})",
                    kind,
                    name,
                    self.path_string(previous),
                    self.path_string(method)
                );
                tracing::debug!(property = %name, "replacing accessor");
                self.report(Diagnostic::debug(DiagnosticCode::ReplacedAccessor, message));
            }
        }

        let frozen = self.node(ty).immutable;
        let mut properties = Vec::with_capacity(groups.len());
        for (_, mut data) in groups {
            if data.is_empty() {
                continue;
            }
            data.ty = self.accessor_type(&data)?;
            let property = self.alloc(Some(ty), NodeKind::Property(data));
            let node = self.node_mut(property);
            node.initialized = true;
            node.immutable = frozen;
            properties.push(property);
        }
        self.type_data_mut(ty)?.properties = Some(properties.clone());
        Ok(properties)
    }

    /// Getter return type, else setter parameter type, else field type
    fn accessor_type(&mut self, data: &PropertyData) -> CodeResult<Option<NodeId>> {
        if let Some(getter) = data.getter {
            if let Some(returns) = self.returns(getter)? {
                return Ok(Some(returns));
            }
        }
        if let Some(setter) = data.setter {
            if let Some(parameter) = self.parameters(setter)?.first() {
                if let Some(ty) = self.parameter_type(*parameter)? {
                    return Ok(Some(ty));
                }
            }
        }
        match data.field {
            Some(field) => self.field_type(field),
            None => Ok(None),
        }
    }

    /// Declared property by name
    pub fn property(&mut self, ty: NodeId, name: &str) -> CodeResult<Option<NodeId>> {
        let properties = self.properties(ty)?;
        Ok(properties.into_iter().find(|p| self.simple_name(*p) == name))
    }

    /// Declared and inherited properties
    ///
    /// Inherited properties are seen through [`inherit_property`](Self::inherit_property);
    /// a property of a nearer type hides one with the same name further up.
    pub fn all_properties(&mut self, ty: NodeId) -> CodeResult<Vec<NodeId>> {
        let mut result = self.properties(ty)?;
        let mut names: Vec<String> = result.iter().map(|p| self.simple_name(*p)).collect();
        for super_type in self.super_type_walk(ty)? {
            for property in self.properties(super_type)? {
                let name = self.simple_name(property);
                if names.contains(&name) {
                    continue;
                }
                names.push(name);
                result.push(self.inherit_property(property, ty)?);
            }
        }
        Ok(result)
    }

    /// A property as seen from an inheriting type
    ///
    /// The property type is resolved against `declaring`; when that changes
    /// nothing the property itself is returned.
    pub fn inherit_property(&mut self, property: NodeId, declaring: NodeId) -> CodeResult<NodeId> {
        let data = self.property_data(property)?.clone();
        let Some(ty) = data.ty else {
            return Ok(property);
        };
        let resolved = self.resolve(ty, declaring)?;
        if resolved == ty {
            return Ok(property);
        }
        let inherited = self.alloc(
            Some(declaring),
            NodeKind::Property(PropertyData {
                ty: Some(resolved),
                ..data
            }),
        );
        self.node_mut(inherited).initialized = true;
        Ok(inherited)
    }

    /// Getter of a property
    pub fn property_getter(&self, property: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.property_data(property)?.getter)
    }

    /// Setter of a property
    pub fn property_setter(&self, property: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.property_data(property)?.setter)
    }

    /// Field of a property
    pub fn property_field(&self, property: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.property_data(property)?.field)
    }

    /// Type of a property
    pub fn property_type(&self, property: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.property_data(property)?.ty)
    }

    /// Check whether the property can be read from code with the given access
    ///
    /// The weaker visibility of getter and field decides.
    pub fn is_readable(&mut self, property: NodeId, access: Visibility) -> CodeResult<bool> {
        let data = self.property_data(property)?.clone();
        let mut best: Option<Visibility> = None;
        for member in [data.getter, data.field].into_iter().flatten() {
            let visibility = self.modifiers(member)?.visibility();
            best = Some(best.map_or(visibility, |b| b.weakest(visibility)));
        }
        Ok(best.is_some_and(|v| v.is_weaker_or_equal_to(access)))
    }

    /// Check whether the property can be written from code with the given access
    ///
    /// The weaker visibility of setter and a non-final field decides.
    pub fn is_writable(&mut self, property: NodeId, access: Visibility) -> CodeResult<bool> {
        let data = self.property_data(property)?.clone();
        let mut best: Option<Visibility> = None;
        if let Some(setter) = data.setter {
            best = Some(self.modifiers(setter)?.visibility());
        }
        if let Some(field) = data.field {
            let modifiers = self.modifiers(field)?;
            if !modifiers.is_final() {
                let visibility = modifiers.visibility();
                best = Some(best.map_or(visibility, |b| b.weakest(visibility)));
            }
        }
        Ok(best.is_some_and(|v| v.is_weaker_or_equal_to(access)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::modifiers::{Modifier, Modifiers};
    use crate::node::Layer;
    use std::rc::Rc;

    fn new_type(model: &mut CodeModel, name: &str) -> NodeId {
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, name).unwrap();
        model.add_type(file, name).unwrap()
    }

    #[test]
    fn test_decapitalize() {
        assert_eq!(decapitalize("Age"), "age");
        assert_eq!(decapitalize("URL"), "uRL");
        assert_eq!(decapitalize(""), "");
    }

    #[test]
    fn test_static_members_are_skipped() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let int = model.primitive("int").unwrap();
        let field = model.add_field(ty, "count").unwrap();
        model.set_field_type(field, int).unwrap();
        model
            .set_modifiers(field, Modifiers::new(Visibility::Private, [Modifier::Static]))
            .unwrap();
        let getter = model.add_method(ty, "getCount").unwrap();
        model.set_return_type(getter, int).unwrap();
        model
            .set_modifiers(getter, Modifiers::new(Visibility::Public, [Modifier::Static]))
            .unwrap();
        assert!(model.properties(ty).unwrap().is_empty());
    }

    #[test]
    fn test_second_setter_replaces_first() {
        let sink = Rc::new(CollectingSink::new());
        let mut model = CodeModel::new().with_diagnostics(sink.clone());
        let ty = new_type(&mut model, "A");
        let int = model.primitive("int").unwrap();
        let long = model.primitive("long").unwrap();
        let first = model.add_method(ty, "setSize").unwrap();
        model.add_parameter(first, "size", int).unwrap();

        // a differently typed overload is a second setter of the same property
        let overload = model.add_method(ty, "resize").unwrap();
        model.add_parameter(overload, "size", long).unwrap();
        model.rename(overload, "setSize").unwrap();

        let properties = model.properties(ty).unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(model.property_setter(properties[0]).unwrap(), Some(overload));
        assert_eq!(model.property_type(properties[0]).unwrap(), Some(long));
        assert_eq!(sink.count(DiagnosticCode::ReplacedAccessor), 1);
    }

    #[test]
    fn test_cache_is_invalidated_by_new_members() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let boolean = model.primitive("boolean").unwrap();
        assert!(model.properties(ty).unwrap().is_empty());
        let getter = model.add_method(ty, "isActive").unwrap();
        model.set_return_type(getter, boolean).unwrap();
        let property = model.property(ty, "active").unwrap().unwrap();
        assert_eq!(model.property_getter(property).unwrap(), Some(getter));
        assert_eq!(model.property_name_of(getter).unwrap().as_deref(), Some("active"));
    }

    #[test]
    fn test_cache_follows_parameter_and_modifier_changes() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let int = model.primitive("int").unwrap();
        let long = model.primitive("long").unwrap();
        let setter = model.add_method(ty, "setAge").unwrap();
        let parameter = model.add_parameter(setter, "age", int).unwrap();
        let age = model.property(ty, "age").unwrap().unwrap();
        assert_eq!(model.property_type(age).unwrap(), Some(int));

        model.set_parameter_type(parameter, long).unwrap();
        let age = model.property(ty, "age").unwrap().unwrap();
        assert_eq!(model.property_type(age).unwrap(), Some(long));

        let field = model.add_field(ty, "count").unwrap();
        model.set_field_type(field, int).unwrap();
        assert!(model.property(ty, "count").unwrap().is_some());
        model
            .set_modifiers(field, Modifiers::new(Visibility::Private, [Modifier::Static]))
            .unwrap();
        assert!(model.property(ty, "count").unwrap().is_none());

        model
            .set_modifiers(setter, Modifiers::new(Visibility::Public, [Modifier::Static]))
            .unwrap();
        assert!(model.properties(ty).unwrap().is_empty());
    }

    #[test]
    fn test_lowercase_remainder_is_no_accessor() {
        let sink = Rc::new(CollectingSink::new());
        let mut model = CodeModel::new().with_diagnostics(sink.clone());
        let ty = new_type(&mut model, "A");
        let boolean = model.primitive("boolean").unwrap();
        let getup = model.add_method(ty, "getup").unwrap();
        model.set_return_type(getup, boolean).unwrap();
        let get = model.add_method(ty, "get").unwrap();
        model.set_return_type(get, boolean).unwrap();

        assert!(model.properties(ty).unwrap().is_empty());
        assert_eq!(model.property_name_of(getup).unwrap(), None);
        assert_eq!(model.property_name_of(get).unwrap(), None);
        assert_eq!(sink.count(DiagnosticCode::IgnoredAccessor), 2);
    }

    #[test]
    fn test_readability_follows_weakest_member() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let int = model.primitive("int").unwrap();
        let field = model.add_field(ty, "id").unwrap();
        model.set_field_type(field, int).unwrap();
        model
            .set_modifiers(field, Modifiers::new(Visibility::Private, [Modifier::Final]))
            .unwrap();
        let getter = model.add_method(ty, "getId").unwrap();
        model.set_return_type(getter, int).unwrap();
        model.set_modifiers(getter, Modifiers::public()).unwrap();

        let property = model.property(ty, "id").unwrap().unwrap();
        assert!(model.is_readable(property, Visibility::Public).unwrap());
        assert!(!model.is_writable(property, Visibility::Private).unwrap());

        let setter = model.add_method(ty, "setId").unwrap();
        model.add_parameter(setter, "id", int).unwrap();
        model
            .set_modifiers(setter, Modifiers::default().with_visibility(Visibility::Protected))
            .unwrap();
        let property = model.property(ty, "id").unwrap().unwrap();
        assert!(model.is_writable(property, Visibility::Protected).unwrap());
        assert!(!model.is_writable(property, Visibility::Public).unwrap());
    }
}
