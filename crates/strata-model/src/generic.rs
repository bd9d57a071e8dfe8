//! Generic type model
//!
//! Generic types are nodes of the kinds [`GenericKind`] lists. Type variables
//! are owned by the type or operation declaring them; parameterized types and
//! wildcards are owned by the node that uses them; array types are owned by
//! their component and created once per component.
//!
//! [`CodeModel::resolve`] substitutes type variables with the arguments a
//! context type supplies for its super types. Whenever nothing changes the
//! input id is returned unchanged.

use crate::error::{CodeError, CodeResult};
use crate::model::CodeModel;
use crate::node::{
    ArrayData, BoundKind, GenericKind, NodeId, NodeKind, ParameterizedData, VariableData,
};
use crate::ROOT_TYPE;
use rustc_hash::FxHashSet;

impl CodeModel {
    /// Generic kind of a node, `None` for non-type nodes
    pub fn generic_kind(&self, id: NodeId) -> Option<GenericKind> {
        self.node(id).kind.generic_kind()
    }

    fn variable_data(&self, id: NodeId) -> CodeResult<&VariableData> {
        match &self.node(id).kind {
            NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "type variable")),
        }
    }

    /// Declared type variables of a type or operation
    pub fn type_variables(&mut self, owner: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(owner)?;
        match &self.node(owner).kind {
            NodeKind::Type(data) => Ok(data.type_variables.clone()),
            NodeKind::Operation(data) => Ok(data.type_variables.clone()),
            _ => Err(CodeError::kind_mismatch(owner, "type or operation")),
        }
    }

    /// Declare a type variable on a type or operation
    pub fn add_type_variable(&mut self, owner: NodeId, name: &str) -> CodeResult<NodeId> {
        self.initialize(owner)?;
        self.verify_mutable(owner)?;
        if self.type_variables(owner)?.iter().any(|v| self.simple_name(*v) == name) {
            return Err(CodeError::DuplicateMember {
                name: name.to_string(),
            });
        }
        let variable = self.alloc(
            Some(owner),
            NodeKind::TypeVariable(VariableData {
                name: name.to_string(),
                ..VariableData::default()
            }),
        );
        self.node_mut(variable).initialized = true;
        match &mut self.node_mut(owner).kind {
            NodeKind::Type(data) => data.type_variables.push(variable),
            NodeKind::Operation(data) => data.type_variables.push(variable),
            _ => return Err(CodeError::kind_mismatch(owner, "type or operation")),
        }
        Ok(variable)
    }

    /// Look up a type variable visible from a scope (operation, then
    /// declaring type, then outer types)
    pub fn type_variable(&mut self, scope: NodeId, name: &str) -> CodeResult<Option<NodeId>> {
        let mut current = Some(scope);
        while let Some(node) = current {
            if matches!(
                self.node(node).kind,
                NodeKind::Type(_) | NodeKind::Operation(_)
            ) {
                self.initialize(node)?;
            }
            current = self.node(node).parent;
        }
        Ok(self.find_type_variable(scope, name))
    }

    /// Variable lookup on already initialized scopes
    pub(crate) fn find_type_variable(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(scope);
        while let Some(node) = current {
            let variables = match &self.node(node).kind {
                NodeKind::Type(data) => Some(&data.type_variables),
                NodeKind::Operation(data) => Some(&data.type_variables),
                NodeKind::File(_) | NodeKind::Package(_) => return None,
                _ => None,
            };
            if let Some(found) = variables
                .and_then(|vars| vars.iter().copied().find(|v| self.simple_name(*v) == name))
            {
                return Some(found);
            }
            current = self.node(node).parent;
        }
        None
    }

    /// Bound of a type variable or wildcard
    pub fn bound(&self, variable: NodeId) -> CodeResult<Option<NodeId>> {
        Ok(self.variable_data(variable)?.bound)
    }

    /// Replace the bound of a type variable or wildcard
    pub fn set_bound(&mut self, variable: NodeId, bound: Option<NodeId>) -> CodeResult<()> {
        self.variable_data(variable)?;
        self.verify_mutable(variable)?;
        if let NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) = &mut self.node_mut(variable).kind {
            data.bound = bound;
        }
        Ok(())
    }

    /// Create a wildcard owned by `owner`
    pub fn add_wildcard(
        &mut self,
        owner: NodeId,
        bound_kind: BoundKind,
        bound: Option<NodeId>,
    ) -> CodeResult<NodeId> {
        let wildcard = self.alloc(
            Some(owner),
            NodeKind::Wildcard(VariableData {
                name: "?".to_string(),
                bound,
                bound_kind,
            }),
        );
        self.node_mut(wildcard).initialized = true;
        Ok(wildcard)
    }

    /// Create a parameterized type owned by `owner`
    pub fn parameterize(
        &mut self,
        owner: NodeId,
        base: NodeId,
        arguments: Vec<NodeId>,
    ) -> CodeResult<NodeId> {
        self.type_data(base)?;
        for argument in &arguments {
            if self.generic_kind(*argument).is_none() {
                return Err(CodeError::kind_mismatch(*argument, "generic type"));
            }
        }
        let parameterized = self.alloc(
            Some(owner),
            NodeKind::Parameterized(ParameterizedData { base, arguments }),
        );
        self.node_mut(parameterized).initialized = true;
        Ok(parameterized)
    }

    /// The array type of a component, created once and frozen immediately
    pub fn create_array(&mut self, component: NodeId) -> CodeResult<NodeId> {
        if self.generic_kind(component).is_none() {
            return Err(CodeError::kind_mismatch(component, "generic type"));
        }
        if let Some(array) = self.node(component).array {
            return Ok(array);
        }
        let array = self.alloc(Some(component), NodeKind::Array(ArrayData { component }));
        let node = self.node_mut(array);
        node.initialized = true;
        node.immutable = true;
        self.node_mut(component).array = Some(array);
        Ok(array)
    }

    /// Component of an array type
    pub fn component_type(&self, array: NodeId) -> Option<NodeId> {
        match &self.node(array).kind {
            NodeKind::Array(data) => Some(data.component),
            _ => None,
        }
    }

    /// Arguments of a parameterized type, empty for other kinds
    pub fn type_arguments(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::Parameterized(data) => data.arguments.clone(),
            _ => Vec::new(),
        }
    }

    /// Nominal type of a parameterized type
    pub fn base_type(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id).kind {
            NodeKind::Parameterized(data) => Some(data.base),
            _ => None,
        }
    }

    /// `extends` bound (type variables and upper bounded wildcards)
    pub fn is_extends(&self, id: NodeId) -> bool {
        matches!(
            &self.node(id).kind,
            NodeKind::TypeVariable(data) | NodeKind::Wildcard(data)
                if data.bound_kind == BoundKind::Extends
        )
    }

    /// `super` bound
    pub fn is_super(&self, id: NodeId) -> bool {
        matches!(
            &self.node(id).kind,
            NodeKind::TypeVariable(data) | NodeKind::Wildcard(data)
                if data.bound_kind == BoundKind::Super
        )
    }

    /// `?` wildcard
    pub fn is_wildcard(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Wildcard(_))
    }

    /// Nominal type a generic type stands for
    ///
    /// Variables and wildcards without an upper bound stand for the root type.
    pub fn as_type(&mut self, id: NodeId) -> CodeResult<NodeId> {
        let mut current = id;
        let mut visited = FxHashSet::default();
        loop {
            if !visited.insert(current) {
                return self.root_type();
            }
            current = match &self.node(current).kind {
                NodeKind::Type(_) => return Ok(current),
                NodeKind::Parameterized(data) => data.base,
                NodeKind::Array(data) => data.component,
                NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => {
                    match (data.bound, data.bound_kind) {
                        (Some(bound), BoundKind::Extends) => bound,
                        _ => return self.root_type(),
                    }
                }
                _ => return Err(CodeError::kind_mismatch(id, "generic type")),
            };
        }
    }

    /// Erased qualified name, without forcing initialization
    pub(crate) fn erasure(&self, id: NodeId) -> String {
        let mut visited = FxHashSet::default();
        self.erasure_guarded(id, &mut visited)
    }

    fn erasure_guarded(&self, id: NodeId, visited: &mut FxHashSet<NodeId>) -> String {
        if !visited.insert(id) {
            return ROOT_TYPE.to_string();
        }
        match &self.node(id).kind {
            NodeKind::Type(_) => self.qualified_name(id),
            NodeKind::Parameterized(data) => self.qualified_name(data.base),
            NodeKind::Array(data) => format!("{}[]", self.erasure_guarded(data.component, visited)),
            NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => match (data.bound, data.bound_kind) {
                (Some(bound), BoundKind::Extends) => self.erasure_guarded(bound, visited),
                _ => ROOT_TYPE.to_string(),
            },
            NodeKind::Parameter(data) => {
                let erased = data
                    .ty
                    .map(|ty| self.erasure_guarded(ty, visited))
                    .unwrap_or_else(|| ROOT_TYPE.to_string());
                // variable arity is part of the erased signature as an array
                if data.varargs && !erased.ends_with("[]") {
                    format!("{}[]", erased)
                } else {
                    erased
                }
            }
            NodeKind::Field(data) => data
                .ty
                .map(|ty| self.erasure_guarded(ty, visited))
                .unwrap_or_else(|| ROOT_TYPE.to_string()),
            _ => String::new(),
        }
    }

    /// Erased qualified name of a generic type
    pub fn erased_name(&mut self, id: NodeId) -> CodeResult<String> {
        self.initialize(id)?;
        Ok(self.erasure(id))
    }

    /// Substitute the type variables of `generic` with the arguments that
    /// `context` supplies
    ///
    /// Returns `generic` itself when nothing is substituted.
    pub fn resolve(&mut self, generic: NodeId, context: NodeId) -> CodeResult<NodeId> {
        let mut resolving = FxHashSet::default();
        self.resolve_guarded(generic, context, &mut resolving)
    }

    /// Resolve the bound of a type variable against a context
    ///
    /// The variable itself counts as being resolved, so a self-referential
    /// bound such as `E extends Enum<E>` yields back the identical bound.
    pub fn resolve_bound(&mut self, variable: NodeId, context: NodeId) -> CodeResult<Option<NodeId>> {
        let Some(bound) = self.bound(variable)? else {
            return Ok(None);
        };
        let mut resolving = FxHashSet::default();
        resolving.insert(variable);
        self.resolve_guarded(bound, context, &mut resolving).map(Some)
    }

    fn resolve_guarded(
        &mut self,
        generic: NodeId,
        context: NodeId,
        resolving: &mut FxHashSet<NodeId>,
    ) -> CodeResult<NodeId> {
        match self.node(generic).kind.clone() {
            NodeKind::Type(_) => Ok(generic),
            NodeKind::TypeVariable(_) => {
                if !resolving.insert(generic) {
                    return Ok(generic);
                }
                let mut visited = FxHashSet::default();
                let binding = self.bind_variable(context, generic, resolving, &mut visited);
                resolving.remove(&generic);
                Ok(binding?.unwrap_or(generic))
            }
            NodeKind::Parameterized(data) => {
                let mut arguments = Vec::with_capacity(data.arguments.len());
                for argument in &data.arguments {
                    arguments.push(self.resolve_guarded(*argument, context, resolving)?);
                }
                if arguments == data.arguments {
                    return Ok(generic);
                }
                let owner = self.node(generic).parent.unwrap_or(context);
                self.parameterize(owner, data.base, arguments)
            }
            NodeKind::Array(data) => {
                let component = self.resolve_guarded(data.component, context, resolving)?;
                if component == data.component {
                    return Ok(generic);
                }
                self.create_array(component)
            }
            NodeKind::Wildcard(data) => {
                let Some(bound) = data.bound else {
                    return Ok(generic);
                };
                let resolved = self.resolve_guarded(bound, context, &mut *resolving)?;
                if resolved == bound {
                    return Ok(generic);
                }
                let owner = self.node(generic).parent.unwrap_or(context);
                self.add_wildcard(owner, data.bound_kind, Some(resolved))
            }
            _ => Err(CodeError::kind_mismatch(generic, "generic type")),
        }
    }

    /// Argument that `context` (or one of its super types) binds to `variable`
    fn bind_variable(
        &mut self,
        context: NodeId,
        variable: NodeId,
        resolving: &mut FxHashSet<NodeId>,
        visited: &mut FxHashSet<NodeId>,
    ) -> CodeResult<Option<NodeId>> {
        let Some(declaring) = self.node(variable).parent else {
            return Ok(None);
        };
        if !matches!(self.node(declaring).kind, NodeKind::Type(_)) {
            return Ok(None);
        }
        let Some(index) = self
            .type_data(declaring)?
            .type_variables
            .iter()
            .position(|v| *v == variable)
        else {
            return Ok(None);
        };

        let (base, arguments) = match &self.node(context).kind {
            NodeKind::Parameterized(data) => (data.base, Some(data.arguments.clone())),
            NodeKind::Type(_) => (context, None),
            NodeKind::TypeVariable(_) | NodeKind::Wildcard(_) | NodeKind::Array(_) => {
                let nominal = self.as_type(context)?;
                (nominal, None)
            }
            _ => return Err(CodeError::kind_mismatch(context, "generic type")),
        };
        if !visited.insert(base) {
            return Ok(None);
        }
        if base == declaring {
            return Ok(arguments.and_then(|args| args.get(index).copied()));
        }

        let mut supers: Vec<NodeId> = self.super_class(base)?.into_iter().collect();
        supers.extend(self.super_interfaces(base)?);
        for super_type in supers {
            let Some(argument) = self.bind_variable(super_type, variable, resolving, visited)? else {
                continue;
            };
            // the argument is expressed in the variables of `base`
            if arguments.is_some() {
                return self.resolve_guarded(argument, context, resolving).map(Some);
            }
            return Ok(Some(argument));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Layer;

    fn new_type(model: &mut CodeModel, package: &str, name: &str) -> NodeId {
        let package = model.get_or_create_package(Layer::Main, package).unwrap();
        let file = model.create_file(package, name).unwrap();
        model.add_type(file, name).unwrap()
    }

    #[test]
    fn test_array_is_memoized_and_frozen() {
        let mut model = CodeModel::new();
        let int = model.primitive("int").unwrap();
        let first = model.create_array(int).unwrap();
        let second = model.create_array(int).unwrap();
        assert_eq!(first, second);
        assert!(model.is_immutable(first));
        assert_eq!(model.component_type(first), Some(int));
        assert_eq!(model.qualified_name(first), "int[]");
        assert_eq!(model.generic_kind(first), Some(GenericKind::Array));
    }

    #[test]
    fn test_resolve_without_variables_is_identity() {
        let mut model = CodeModel::new();
        let list = new_type(&mut model, "java.util", "List");
        let string = new_type(&mut model, "java.lang", "String");
        let owner = new_type(&mut model, "a", "Owner");
        let parameterized = model.parameterize(owner, list, vec![string]).unwrap();
        let array = model.create_array(parameterized).unwrap();

        assert_eq!(model.resolve(parameterized, owner).unwrap(), parameterized);
        assert_eq!(model.resolve(array, owner).unwrap(), array);
        assert_eq!(model.resolve(string, owner).unwrap(), string);
    }

    #[test]
    fn test_resolve_through_intermediate_super_type() {
        // class Base<T> { }  class Middle<M> extends Base<M> { }  class Leaf extends Middle<String> { }
        let mut model = CodeModel::new();
        let string = new_type(&mut model, "java.lang", "String");
        let base = new_type(&mut model, "a", "Base");
        let t = model.add_type_variable(base, "T").unwrap();
        let middle = new_type(&mut model, "a", "Middle");
        let m = model.add_type_variable(middle, "M").unwrap();
        let base_of_m = model.parameterize(middle, base, vec![m]).unwrap();
        model.set_super_class(middle, Some(base_of_m)).unwrap();
        let leaf = new_type(&mut model, "a", "Leaf");
        let middle_of_string = model.parameterize(leaf, middle, vec![string]).unwrap();
        model.set_super_class(leaf, Some(middle_of_string)).unwrap();

        assert_eq!(model.resolve(t, leaf).unwrap(), string);
        assert_eq!(model.resolve(m, leaf).unwrap(), string);
        assert_eq!(model.resolve(t, middle).unwrap(), m);
        assert_eq!(model.resolve(t, base).unwrap(), t);

        let list = new_type(&mut model, "java.util", "List");
        let list_of_t = model.parameterize(base, list, vec![t]).unwrap();
        let resolved = model.resolve(list_of_t, leaf).unwrap();
        assert_ne!(resolved, list_of_t);
        assert_eq!(model.base_type(resolved), Some(list));
        assert_eq!(model.type_arguments(resolved), vec![string]);
    }

    #[test]
    fn test_self_referential_bound_terminates() {
        // class Enum<E extends Enum<E>>
        let mut model = CodeModel::new();
        let enumeration = new_type(&mut model, "java.lang", "Enum");
        let e = model.add_type_variable(enumeration, "E").unwrap();
        let bound = model.parameterize(e, enumeration, vec![e]).unwrap();
        model.set_bound(e, Some(bound)).unwrap();

        assert!(model.is_extends(e));
        assert!(!model.is_super(e));
        assert!(!model.is_wildcard(e));
        assert_eq!(model.as_type(e).unwrap(), enumeration);

        let resolved = model.resolve_bound(e, enumeration).unwrap().unwrap();
        assert_eq!(resolved, bound);
        assert_eq!(model.type_arguments(resolved), vec![e]);
        assert_eq!(model.resolve(e, enumeration).unwrap(), e);
    }

    #[test]
    fn test_wildcards() {
        let mut model = CodeModel::new();
        let number = new_type(&mut model, "java.lang", "Number");
        let owner = new_type(&mut model, "a", "Owner");
        let upper = model.add_wildcard(owner, BoundKind::Extends, Some(number)).unwrap();
        let lower = model.add_wildcard(owner, BoundKind::Super, Some(number)).unwrap();
        let any = model.add_wildcard(owner, BoundKind::Extends, None).unwrap();

        assert!(model.is_wildcard(upper) && model.is_extends(upper));
        assert!(model.is_super(lower));
        assert_eq!(model.as_type(upper).unwrap(), number);
        let root = model.root_type().unwrap();
        assert_eq!(model.as_type(lower).unwrap(), root);
        assert_eq!(model.as_type(any).unwrap(), root);
        assert_eq!(model.resolve(upper, owner).unwrap(), upper);
    }

    #[test]
    fn test_type_variable_scopes() {
        let mut model = CodeModel::new();
        let owner = new_type(&mut model, "a", "Owner");
        let t = model.add_type_variable(owner, "T").unwrap();
        let method = model.add_method(owner, "map").unwrap();
        let r = model.add_type_variable(method, "R").unwrap();

        assert_eq!(model.type_variable(method, "R").unwrap(), Some(r));
        assert_eq!(model.type_variable(method, "T").unwrap(), Some(t));
        assert_eq!(model.type_variable(owner, "R").unwrap(), None);
        assert!(model.add_type_variable(owner, "T").is_err());
    }
}
