//! Annotation usages and inherited annotation lookup
//!
//! Declared annotations of a node form an ordered list keyed by annotation
//! type: a type occurs at most once. Reflective annotations are added first
//! during initialization, source annotations only fill in types that are not
//! declared yet.
//!
//! The effective view of an element ([`CodeModel::effective_annotations`])
//! continues into the super types of a type or the overridden method of a
//! method; the first declaration of an annotation type wins.

use crate::copy::CopyMapper;
use crate::error::{CodeError, CodeResult};
use crate::expression::Expression;
use crate::model::CodeModel;
use crate::node::{NodeId, NodeKind};
use crate::reflect::AnnotationDescriptor;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Annotation usage data
#[derive(Debug, Clone, Default)]
pub struct AnnotationData {
    /// Qualified annotation type
    pub type_name: String,
    /// Parameters in declaration order
    pub parameters: IndexMap<String, Expression>,
}

impl CodeModel {
    fn annotation_data(&self, id: NodeId) -> CodeResult<&AnnotationData> {
        match &self.node(id).kind {
            NodeKind::Annotation(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "annotation")),
        }
    }

    fn annotation_data_mut(&mut self, id: NodeId) -> CodeResult<&mut AnnotationData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Annotation(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "annotation")),
        }
    }

    /// Declared annotations of a node in declaration order
    pub fn annotations(&mut self, owner: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(owner)?;
        Ok(self.node(owner).annotations.clone())
    }

    fn find_annotation(&self, owner: NodeId, type_name: &str) -> Option<NodeId> {
        self.node(owner).annotations.iter().copied().find(|a| {
            matches!(&self.node(*a).kind, NodeKind::Annotation(data) if data.type_name == type_name)
        })
    }

    /// Declared annotation of the given type
    pub fn annotation_declared(&mut self, owner: NodeId, type_name: &str) -> CodeResult<Option<NodeId>> {
        self.initialize(owner)?;
        Ok(self.find_annotation(owner, type_name))
    }

    /// Declare an annotation without parameters
    pub fn add_annotation(&mut self, owner: NodeId, type_name: &str) -> CodeResult<NodeId> {
        self.initialize(owner)?;
        self.verify_mutable(owner)?;
        if self.find_annotation(owner, type_name).is_some() {
            return Err(CodeError::DuplicateMember {
                name: format!("{}{}", self.syntax().annotation_start, type_name),
            });
        }
        Ok(self.push_annotation(owner, type_name.to_string(), IndexMap::new()))
    }

    /// Declared annotation of the given type, declaring it if missing
    pub fn annotation_declared_or_add(&mut self, owner: NodeId, type_name: &str) -> CodeResult<NodeId> {
        match self.annotation_declared(owner, type_name)? {
            Some(existing) => Ok(existing),
            None => self.add_annotation(owner, type_name),
        }
    }

    fn push_annotation(
        &mut self,
        owner: NodeId,
        type_name: String,
        parameters: IndexMap<String, Expression>,
    ) -> NodeId {
        let annotation = self.alloc(
            Some(owner),
            NodeKind::Annotation(AnnotationData {
                type_name,
                parameters,
            }),
        );
        self.node_mut(annotation).initialized = true;
        self.node_mut(owner).annotations.push(annotation);
        annotation
    }

    /// Remove the declared annotation of a type
    pub fn remove_annotation(&mut self, owner: NodeId, type_name: &str) -> CodeResult<bool> {
        self.initialize(owner)?;
        self.verify_mutable(owner)?;
        let Some(annotation) = self.find_annotation(owner, type_name) else {
            return Ok(false);
        };
        self.node_mut(owner).annotations.retain(|a| *a != annotation);
        Ok(true)
    }

    /// Qualified type of an annotation usage
    pub fn annotation_type_name(&self, annotation: NodeId) -> CodeResult<String> {
        Ok(self.annotation_data(annotation)?.type_name.clone())
    }

    /// Parameters of an annotation usage in declaration order
    pub fn annotation_parameters(&self, annotation: NodeId) -> CodeResult<IndexMap<String, Expression>> {
        Ok(self.annotation_data(annotation)?.parameters.clone())
    }

    /// Single parameter of an annotation usage
    pub fn annotation_parameter(&self, annotation: NodeId, name: &str) -> CodeResult<Option<Expression>> {
        Ok(self.annotation_data(annotation)?.parameters.get(name).cloned())
    }

    /// Set a parameter, or remove it with `None`
    ///
    /// Existing parameters keep their position.
    pub fn set_annotation_parameter(
        &mut self,
        annotation: NodeId,
        name: &str,
        value: Option<Expression>,
    ) -> CodeResult<()> {
        self.annotation_data(annotation)?;
        self.verify_mutable(annotation)?;
        let parameters = &mut self.annotation_data_mut(annotation)?.parameters;
        match value {
            Some(value) => {
                parameters.insert(name.to_string(), value);
            }
            None => {
                parameters.shift_remove(name);
            }
        }
        Ok(())
    }

    /// Annotations visible at an element, including inherited ones
    pub fn effective_annotations(&mut self, element: NodeId) -> CodeResult<Vec<NodeId>> {
        self.annotation_walk(element).collect()
    }

    /// Lazily walk the effective annotations of an element
    pub fn annotation_walk(&mut self, element: NodeId) -> AnnotationWalk<'_> {
        AnnotationWalk {
            model: self,
            origin: element,
            current: Some(element),
            pending: VecDeque::new(),
            loaded: false,
            supers: None,
            seen: FxHashSet::default(),
            done: false,
        }
    }

    /// Annotations of a reflective descriptor, skipping declared types
    pub(crate) fn add_reflective_annotations(
        &mut self,
        owner: NodeId,
        descriptors: &[AnnotationDescriptor],
    ) -> CodeResult<()> {
        for descriptor in descriptors {
            if self.find_annotation(owner, &descriptor.type_name).is_some() {
                continue;
            }
            let parameters = descriptor
                .values
                .iter()
                .map(|(key, value)| (key.clone(), Expression::Literal(value.clone())))
                .collect();
            self.push_annotation(owner, descriptor.type_name.clone(), parameters);
        }
        Ok(())
    }

    /// Annotations of a shadow node whose type is not declared yet
    pub(crate) fn merge_source_annotations(&mut self, owner: NodeId, source: NodeId) -> CodeResult<()> {
        let shadow = self.node(source).annotations.clone();
        let mut mapper = CopyMapper::new();
        for annotation in shadow {
            let type_name = self.annotation_data(annotation)?.type_name.clone();
            if self.find_annotation(owner, &type_name).is_some() {
                continue;
            }
            let copy = self.copy_detached(annotation, owner, &mut mapper)?;
            self.remap_references(copy, &mapper)?;
            self.node_mut(owner).annotations.push(copy);
        }
        Ok(())
    }
}

/// Iterator over the effective annotations of an element
///
/// Yields the element's own annotations first, then those of the next
/// element up the hierarchy, skipping annotation types that were already
/// yielded. Stops after the first error.
pub struct AnnotationWalk<'m> {
    model: &'m mut CodeModel,
    origin: NodeId,
    current: Option<NodeId>,
    pending: VecDeque<NodeId>,
    loaded: bool,
    supers: Option<VecDeque<NodeId>>,
    seen: FxHashSet<String>,
    done: bool,
}

impl AnnotationWalk<'_> {
    /// Next element up the hierarchy
    fn advance(&mut self, element: NodeId) -> CodeResult<Option<NodeId>> {
        let kind = &self.model.node(element).kind;
        let is_generic = kind.generic_kind().is_some();
        let is_operation = matches!(kind, NodeKind::Operation(_));
        let is_parameter = matches!(kind, NodeKind::Parameter(_));

        if is_generic {
            if self.supers.is_none() {
                let walk = self.model.super_type_walk(self.origin)?;
                self.supers = Some(walk.into());
            }
            return Ok(self.supers.as_mut().and_then(VecDeque::pop_front));
        }
        if is_operation {
            return self.model.parent_method(element);
        }
        if !is_parameter {
            return Ok(None);
        }
        let Some(operation) = self.model.parent(element) else {
            return Ok(None);
        };
        let index = self
            .model
            .parameters(operation)?
            .iter()
            .position(|p| *p == element);
        let Some(index) = index else {
            return Ok(None);
        };
        match self.model.parent_method(operation)? {
            Some(overridden) => Ok(self.model.parameters(overridden)?.get(index).copied()),
            None => Ok(None),
        }
    }

    fn step(&mut self) -> CodeResult<Option<NodeId>> {
        loop {
            let Some(element) = self.current else {
                return Ok(None);
            };
            if !self.loaded {
                let owner = match self.model.generic_kind(element) {
                    Some(_) => self.model.as_type(element)?,
                    None => element,
                };
                self.pending = self.model.annotations(owner)?.into();
                self.loaded = true;
            }
            while let Some(annotation) = self.pending.pop_front() {
                let type_name = self.model.annotation_type_name(annotation)?;
                if self.seen.insert(type_name) {
                    return Ok(Some(annotation));
                }
            }
            self.current = self.advance(element)?;
            self.loaded = false;
        }
    }
}

impl Iterator for AnnotationWalk<'_> {
    type Item = CodeResult<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(annotation)) => Some(Ok(annotation)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Layer;

    fn new_type(model: &mut CodeModel, name: &str) -> NodeId {
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, name).unwrap();
        model.add_type(file, name).unwrap()
    }

    #[test]
    fn test_annotation_types_are_unique() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let first = model.add_annotation(ty, "a.Marker").unwrap();
        assert!(matches!(
            model.add_annotation(ty, "a.Marker"),
            Err(CodeError::DuplicateMember { .. })
        ));
        assert_eq!(model.annotation_declared_or_add(ty, "a.Marker").unwrap(), first);
        assert_eq!(model.annotations(ty).unwrap(), vec![first]);
        assert!(model.remove_annotation(ty, "a.Marker").unwrap());
        assert!(model.annotations(ty).unwrap().is_empty());
    }

    #[test]
    fn test_parameters_keep_order() {
        let mut model = CodeModel::new();
        let ty = new_type(&mut model, "A");
        let annotation = model.add_annotation(ty, "a.Named").unwrap();
        model
            .set_annotation_parameter(annotation, "b", Some(Expression::int(1)))
            .unwrap();
        model
            .set_annotation_parameter(annotation, "a", Some(Expression::int(2)))
            .unwrap();
        model
            .set_annotation_parameter(annotation, "b", Some(Expression::int(3)))
            .unwrap();
        let keys: Vec<String> = model
            .annotation_parameters(annotation)
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
        model.set_annotation_parameter(annotation, "b", None).unwrap();
        assert_eq!(model.annotation_parameter(annotation, "b").unwrap(), None);
    }

    #[test]
    fn test_method_annotations_are_inherited() {
        let mut model = CodeModel::new();
        let base = new_type(&mut model, "Base");
        let derived = new_type(&mut model, "Derived");
        model.set_super_class(derived, Some(base)).unwrap();
        let overridden = model.add_method(base, "run").unwrap();
        model.add_annotation(overridden, "a.Traced").unwrap();
        let method = model.add_method(derived, "run").unwrap();
        model.add_annotation(method, "java.lang.Override").unwrap();

        let names: Vec<String> = model
            .effective_annotations(method)
            .unwrap()
            .into_iter()
            .map(|a| model.annotation_type_name(a).unwrap())
            .collect();
        assert_eq!(names, vec!["java.lang.Override", "a.Traced"]);
    }
}
