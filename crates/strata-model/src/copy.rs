//! Structural deep copy
//!
//! A copy runs in two passes. The first clones the template's owned subtree
//! under the new parent and records every `old -> new` pair in a
//! [`CopyMapper`]. The second rewrites every node reference inside the
//! clones through the mapper, so references between copied nodes (a property
//! to its getter, a parameter type to a method type variable) point at the
//! clones while references to anything outside the subtree stay untouched.
//!
//! A mapper can be shared between several copies; references across the
//! copied subtrees are then rewritten as well.

use crate::error::{CodeError, CodeResult};
use crate::model::CodeModel;
use crate::node::{Layer, NodeId, NodeKind, OperationKind, SourceOrigin};
use rustc_hash::FxHashMap;

/// Identity map from template nodes to their copies
#[derive(Debug, Clone, Default)]
pub struct CopyMapper {
    map: FxHashMap<NodeId, NodeId>,
}

impl CopyMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `template` is represented by `copy`
    pub fn register(&mut self, template: NodeId, copy: NodeId) {
        self.map.insert(template, copy);
    }

    /// The copy of a template node, if it was copied
    pub fn get(&self, template: NodeId) -> Option<NodeId> {
        self.map.get(&template).copied()
    }

    /// The copy of a node, or the node itself when it was not copied
    pub fn map(&self, id: NodeId) -> NodeId {
        self.get(id).unwrap_or(id)
    }

    /// Check whether a node was copied
    pub fn contains(&self, template: NodeId) -> bool {
        self.map.contains_key(&template)
    }

    /// Number of recorded pairs
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Every node referenced by the data of a node kind
fn references(kind: &NodeKind) -> Vec<NodeId> {
    let mut out = Vec::new();
    match kind {
        NodeKind::Package(data) => {
            out.extend(&data.packages);
            out.extend(&data.files);
        }
        NodeKind::File(data) => out.extend(&data.types),
        NodeKind::Type(data) => {
            out.extend(&data.type_variables);
            out.extend(data.super_class);
            out.extend(&data.super_interfaces);
            out.extend(&data.fields);
            out.extend(&data.methods);
            out.extend(&data.constructors);
            out.extend(&data.nested_types);
            if let Some(properties) = &data.properties {
                out.extend(properties);
            }
        }
        NodeKind::Field(data) => out.extend(data.ty),
        NodeKind::Operation(data) => {
            out.extend(&data.type_variables);
            out.extend(&data.parameters);
            out.extend(data.returns);
            out.extend(&data.exceptions);
            if let Some(body) = &data.body {
                for statement in body {
                    statement_references(statement, &mut out);
                }
            }
        }
        NodeKind::Parameter(data) => out.extend(data.ty),
        NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => out.extend(data.bound),
        NodeKind::Parameterized(data) => {
            out.push(data.base);
            out.extend(&data.arguments);
        }
        NodeKind::Array(data) => out.push(data.component),
        NodeKind::Annotation(_) => {}
        NodeKind::Property(data) => {
            out.extend(data.ty);
            out.extend(data.getter);
            out.extend(data.setter);
            out.extend(data.field);
        }
    }
    out
}

fn statement_references(statement: &crate::statement::Statement, out: &mut Vec<NodeId>) {
    use crate::statement::Statement;
    match statement {
        Statement::LocalVariable { ty, .. } => out.push(*ty),
        Statement::Block { statements, .. } => {
            for statement in statements {
                statement_references(statement, out);
            }
        }
        _ => {}
    }
}

/// Rewrite the references of a node kind and reset expression caches
fn rewrite(kind: &mut NodeKind, map: &dyn Fn(NodeId) -> NodeId) {
    let list = |ids: &mut Vec<NodeId>| ids.iter_mut().for_each(|id| *id = map(*id));
    let one = |id: &mut Option<NodeId>| {
        if let Some(id) = id {
            *id = map(*id);
        }
    };
    match kind {
        NodeKind::Package(data) => {
            list(&mut data.packages);
            list(&mut data.files);
        }
        NodeKind::File(data) => list(&mut data.types),
        NodeKind::Type(data) => {
            list(&mut data.type_variables);
            one(&mut data.super_class);
            list(&mut data.super_interfaces);
            list(&mut data.fields);
            list(&mut data.methods);
            list(&mut data.constructors);
            list(&mut data.nested_types);
            if let Some(properties) = &mut data.properties {
                list(properties);
            }
        }
        NodeKind::Field(data) => {
            one(&mut data.ty);
            data.initializer = data.initializer.as_ref().map(|e| e.detached());
        }
        NodeKind::Operation(data) => {
            list(&mut data.type_variables);
            list(&mut data.parameters);
            one(&mut data.returns);
            list(&mut data.exceptions);
            if let Some(body) = &mut data.body {
                for statement in body {
                    statement.remap(map);
                }
            }
        }
        NodeKind::Parameter(data) => one(&mut data.ty),
        NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => one(&mut data.bound),
        NodeKind::Parameterized(data) => {
            data.base = map(data.base);
            list(&mut data.arguments);
        }
        NodeKind::Array(data) => data.component = map(data.component),
        NodeKind::Annotation(data) => {
            for value in data.parameters.values_mut() {
                *value = value.detached();
            }
        }
        NodeKind::Property(data) => {
            one(&mut data.ty);
            one(&mut data.getter);
            one(&mut data.setter);
            one(&mut data.field);
        }
    }
}

impl CodeModel {
    /// Deep-copy a node into a new parent
    ///
    /// The copy is mutable and has no reflective or source origin; the
    /// template is left untouched apart from being initialized.
    pub fn copy(&mut self, template: NodeId, new_parent: NodeId) -> CodeResult<NodeId> {
        let mut mapper = CopyMapper::new();
        self.copy_with(template, new_parent, &mut mapper)
    }

    /// Deep-copy a node into a new parent, recording every copied node
    pub fn copy_with(
        &mut self,
        template: NodeId,
        new_parent: NodeId,
        mapper: &mut CopyMapper,
    ) -> CodeResult<NodeId> {
        self.initialize(new_parent)?;
        self.verify_mutable(new_parent)?;
        let copy = self.copy_detached(template, new_parent, mapper)?;
        self.remap_references(copy, mapper)?;
        self.attach(new_parent, copy)?;
        Ok(copy)
    }

    /// Clone the owned subtree of `template` under `parent` without adding
    /// it to any of the parent's collections and without remapping
    pub(crate) fn copy_detached(
        &mut self,
        template: NodeId,
        parent: NodeId,
        mapper: &mut CopyMapper,
    ) -> CodeResult<NodeId> {
        self.initialize_deep(template)?;
        Ok(self.clone_subtree(template, parent, mapper))
    }

    fn clone_subtree(&mut self, template: NodeId, parent: NodeId, mapper: &mut CopyMapper) -> NodeId {
        let layer = self.node(parent).layer;
        let mut node = self.node(template).clone();
        node.parent = Some(parent);
        node.layer = layer;
        node.initialized = true;
        node.initializing = false;
        node.immutable = false;
        node.system_immutable = false;
        node.reflective = None;
        node.source = SourceOrigin::None;
        node.array = None;

        let copy = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        mapper.register(template, copy);

        for child in self.children(template) {
            self.clone_subtree(child, copy, mapper);
        }
        copy
    }

    /// Rewrite the references inside a subtree through a mapper
    ///
    /// Array types of copied components are re-created for the copies.
    pub fn remap_references(&mut self, root: NodeId, mapper: &CopyMapper) -> CodeResult<()> {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let mut kind = self.node(current).kind.clone();
            let mut targets = FxHashMap::default();
            for reference in references(&kind) {
                let target = self.remap_target(reference, mapper)?;
                if target != reference {
                    targets.insert(reference, target);
                }
            }
            rewrite(&mut kind, &|id| targets.get(&id).copied().unwrap_or(id));
            let annotations: Vec<NodeId> = self
                .node(current)
                .annotations
                .iter()
                .map(|a| mapper.map(*a))
                .collect();

            let node = self.node_mut(current);
            node.kind = kind;
            node.annotations = annotations;
            stack.extend(self.children(current));
        }
        Ok(())
    }

    /// Target of one reference; source layer types the mapper does not know
    /// resolve to their main layer counterpart
    pub(crate) fn remap_target(&mut self, reference: NodeId, mapper: &CopyMapper) -> CodeResult<NodeId> {
        if let Some(copy) = mapper.get(reference) {
            return Ok(copy);
        }
        if self.node(reference).layer == Layer::Source && matches!(self.node(reference).kind, NodeKind::Type(_)) {
            return self.main_type_for_source(reference);
        }
        if let NodeKind::Array(data) = &self.node(reference).kind {
            let component = data.component;
            let mapped = self.remap_target(component, mapper)?;
            if mapped != component {
                return self.create_array(mapped);
            }
        }
        Ok(reference)
    }

    /// Add an owned, detached node to the matching collection of its parent
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) -> CodeResult<()> {
        let child_kind = self.node(child).kind.clone();
        if let NodeKind::Annotation(data) = &child_kind {
            if self.find_annotation_by_type(parent, &data.type_name) {
                return Err(CodeError::DuplicateMember {
                    name: data.type_name.clone(),
                });
            }
            self.node_mut(parent).annotations.push(child);
            return Ok(());
        }

        let siblings = match (&self.node(parent).kind, &child_kind) {
            (NodeKind::Package(data), NodeKind::Package(_)) => data.packages.clone(),
            (NodeKind::Package(data), NodeKind::File(_)) => data.files.clone(),
            (NodeKind::File(data), NodeKind::Type(_)) => data.types.clone(),
            (NodeKind::Type(data), NodeKind::Field(_)) => data.fields.clone(),
            (NodeKind::Type(data), NodeKind::Type(_)) => data.nested_types.clone(),
            (NodeKind::Type(data), NodeKind::TypeVariable(_)) => data.type_variables.clone(),
            (NodeKind::Type(data), NodeKind::Operation(op)) => match op.kind {
                OperationKind::Method => data.methods.clone(),
                OperationKind::Constructor => data.constructors.clone(),
            },
            (NodeKind::Operation(data), NodeKind::TypeVariable(_)) => data.type_variables.clone(),
            (NodeKind::Operation(data), NodeKind::Parameter(_)) => data.parameters.clone(),
            _ => return Err(CodeError::kind_mismatch(child, "member of its new parent")),
        };
        let duplicate = match &child_kind {
            NodeKind::Operation(_) => {
                let signature = self.declared_signature(child);
                siblings.iter().any(|s| self.declared_signature(*s) == signature)
            }
            kind => {
                let name = kind.name_of();
                siblings.iter().any(|s| self.node(*s).kind.name_of() == name)
            }
        };
        if duplicate {
            return Err(CodeError::DuplicateMember {
                name: self.path_string(child),
            });
        }

        match (&mut self.node_mut(parent).kind, &child_kind) {
            (NodeKind::Package(data), NodeKind::Package(_)) => data.packages.push(child),
            (NodeKind::Package(data), NodeKind::File(_)) => data.files.push(child),
            (NodeKind::File(data), NodeKind::Type(_)) => data.types.push(child),
            (NodeKind::Type(data), NodeKind::Field(_)) => data.fields.push(child),
            (NodeKind::Type(data), NodeKind::Type(_)) => data.nested_types.push(child),
            (NodeKind::Type(data), NodeKind::TypeVariable(_)) => data.type_variables.push(child),
            (NodeKind::Type(data), NodeKind::Operation(op)) => match op.kind {
                OperationKind::Method => data.methods.push(child),
                OperationKind::Constructor => data.constructors.push(child),
            },
            (NodeKind::Operation(data), NodeKind::TypeVariable(_)) => data.type_variables.push(child),
            (NodeKind::Operation(data), NodeKind::Parameter(_)) => data.parameters.push(child),
            _ => {}
        }
        if let Some(ty) = self.declaring_type(child) {
            self.invalidate_properties(ty);
        }
        self.register_types_in(child);
        Ok(())
    }

    /// Register every type of a subtree under its current qualified name
    pub(crate) fn register_types_in(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if matches!(self.node(current).kind, NodeKind::Type(_)) && !self.is_primitive(current) {
                let qualified = self.qualified_name(current);
                match self.node(current).layer {
                    Layer::Main => self.types.insert(qualified, current),
                    Layer::Source => self.source_types.insert(qualified, current),
                };
            }
            stack.extend(self.children(current));
        }
    }

    fn find_annotation_by_type(&self, owner: NodeId, type_name: &str) -> bool {
        self.node(owner).annotations.iter().any(|a| {
            matches!(&self.node(*a).kind, NodeKind::Annotation(data) if data.type_name == type_name)
        })
    }
}
