//! Merging of two nodes of the same kind
//!
//! - [`MergeStrategy::Keep`] leaves the left node untouched
//! - [`MergeStrategy::Override`] replaces the left collection with copies of
//!   the right one
//! - [`MergeStrategy::Combine`] pairs elements by key (annotation type, member
//!   name or signature) or by position (parameters), merges the pairs, and
//!   copies the unmatched right elements in

use crate::error::{CodeError, CodeResult};
use crate::model::CodeModel;
use crate::node::{NodeId, NodeKind, OperationKind};
use serde::{Deserialize, Serialize};

/// Conflict policy of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Left wins, nothing changes
    Keep,
    /// Right replaces left
    Override,
    /// Pair up, merge pairs, append the rest
    #[default]
    Combine,
}

/// Synthetic parameter names of binary metadata (`arg0`, `arg1`, ...)
fn is_synthetic_name(name: &str) -> bool {
    name.strip_prefix("arg")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

impl CodeModel {
    /// Merge `right` into `left`
    ///
    /// Both nodes must be of the same kind. Types merge members and
    /// annotations, operations merge parameters, annotations, and body,
    /// fields merge annotations and initializer, annotations merge parameters.
    pub fn merge(&mut self, left: NodeId, right: NodeId, strategy: MergeStrategy) -> CodeResult<()> {
        if strategy == MergeStrategy::Keep {
            return Ok(());
        }
        self.initialize_deep(right)?;
        self.initialize(left)?;
        self.verify_mutable(left)?;
        tracing::trace!(left = %left, right = %right, ?strategy, "merging");

        let left_kind = self.node(left).kind.name();
        let right_kind = self.node(right).kind.name();
        if left_kind != right_kind {
            return Err(CodeError::UnsupportedMerge {
                reason: format!("cannot merge a {} into a {}", right_kind, left_kind),
            });
        }

        match self.node(left).kind.clone() {
            NodeKind::Type(_) => {
                self.merge_members(left, right, strategy)?;
                self.merge_annotations(left, right, strategy)?;
                if self.node(left).doc.is_empty() || strategy == MergeStrategy::Override {
                    let doc = self.node(right).doc.clone();
                    self.node_mut(left).doc = doc;
                }
            }
            NodeKind::Field(data) => {
                self.merge_annotations(left, right, strategy)?;
                let initializer = self.initializer(right)?;
                if data.initializer.is_none() || strategy == MergeStrategy::Override {
                    self.set_initializer(left, initializer)?;
                }
            }
            NodeKind::Operation(data) => {
                self.merge_parameters(left, right, strategy)?;
                self.merge_annotations(left, right, strategy)?;
                let body = self.body(right)?;
                let empty = data.body.as_ref().map_or(true, Vec::is_empty);
                if empty || strategy == MergeStrategy::Override {
                    self.set_body(left, body)?;
                }
            }
            NodeKind::Parameter(_) => {
                self.merge_annotations(left, right, strategy)?;
                let name = self.simple_name(right);
                let current = self.simple_name(left);
                if strategy == MergeStrategy::Override
                    || (is_synthetic_name(&current) && !is_synthetic_name(&name))
                {
                    self.rename(left, &name)?;
                }
            }
            NodeKind::Annotation(_) => self.merge_annotation_parameters(left, right, strategy)?,
            _ => {
                return Err(CodeError::UnsupportedMerge {
                    reason: format!("{} nodes cannot be merged", left_kind),
                })
            }
        }
        Ok(())
    }

    fn merge_annotation_parameters(
        &mut self,
        left: NodeId,
        right: NodeId,
        strategy: MergeStrategy,
    ) -> CodeResult<()> {
        let incoming = self.annotation_parameters(right)?;
        let existing = self.annotation_parameters(left)?;
        if strategy == MergeStrategy::Override {
            for key in existing.keys() {
                self.set_annotation_parameter(left, key, None)?;
            }
        }
        for (key, value) in incoming {
            if strategy == MergeStrategy::Combine && existing.contains_key(&key) {
                continue;
            }
            self.set_annotation_parameter(left, &key, Some(value.detached()))?;
        }
        Ok(())
    }

    /// Merge the declared annotations of two nodes, keyed by annotation type
    pub fn merge_annotations(&mut self, left: NodeId, right: NodeId, strategy: MergeStrategy) -> CodeResult<()> {
        if strategy == MergeStrategy::Keep {
            return Ok(());
        }
        let incoming = self.annotations(right)?;
        self.initialize(left)?;
        self.verify_mutable(left)?;

        if strategy == MergeStrategy::Override {
            self.node_mut(left).annotations.clear();
            for annotation in incoming {
                self.copy(annotation, left)?;
            }
            return Ok(());
        }

        for annotation in incoming {
            let type_name = self.annotation_type_name(annotation)?;
            match self.annotation_declared(left, &type_name)? {
                Some(existing) if existing == annotation => {}
                Some(existing) => self.merge_annotation_parameters(existing, annotation, strategy)?,
                None => {
                    self.copy(annotation, left)?;
                }
            }
        }
        Ok(())
    }

    /// Merge the parameter lists of two operations
    ///
    /// Under [`MergeStrategy::Combine`] both lists must have the same length;
    /// parameters are paired by position.
    pub fn merge_parameters(&mut self, left: NodeId, right: NodeId, strategy: MergeStrategy) -> CodeResult<()> {
        if strategy == MergeStrategy::Keep {
            return Ok(());
        }
        let incoming = self.parameters(right)?;
        let existing = self.parameters(left)?;
        self.verify_mutable(left)?;

        if strategy == MergeStrategy::Override {
            if let NodeKind::Operation(data) = &mut self.node_mut(left).kind {
                data.parameters.clear();
            }
            for parameter in incoming {
                self.copy(parameter, left)?;
            }
            if let Some(ty) = self.declaring_type(left) {
                self.invalidate_properties(ty);
            }
            return Ok(());
        }

        if incoming.len() != existing.len() {
            return Err(CodeError::UnsupportedMerge {
                reason: format!(
                    "{} has {} parameters, {} has {}",
                    self.path_string(left),
                    existing.len(),
                    self.path_string(right),
                    incoming.len()
                ),
            });
        }
        for (left_parameter, right_parameter) in existing.into_iter().zip(incoming) {
            if left_parameter != right_parameter {
                self.merge(left_parameter, right_parameter, strategy)?;
            }
        }
        Ok(())
    }

    /// Merge the members of two types
    ///
    /// Fields and nested types pair by name, methods and constructors by
    /// erased signature.
    pub fn merge_members(&mut self, left: NodeId, right: NodeId, strategy: MergeStrategy) -> CodeResult<()> {
        if strategy == MergeStrategy::Keep {
            return Ok(());
        }
        self.initialize(left)?;
        self.verify_mutable(left)?;
        let fields = self.fields(right)?;
        let constructors = self.constructors(right)?;
        let methods = self.methods(right)?;
        let nested = self.nested_types(right)?;

        if strategy == MergeStrategy::Override {
            let data = self.type_data_mut(left)?;
            data.fields.clear();
            data.constructors.clear();
            data.methods.clear();
            data.nested_types.clear();
            self.invalidate_properties(left);
            for member in fields.into_iter().chain(constructors).chain(methods).chain(nested) {
                self.copy(member, left)?;
            }
            return Ok(());
        }

        for field in fields {
            let name = self.simple_name(field);
            match self.field(left, &name)? {
                Some(existing) if existing == field => {}
                Some(existing) => self.merge(existing, field, strategy)?,
                None => {
                    self.copy(field, left)?;
                }
            }
        }
        for (kind, operations) in [
            (OperationKind::Constructor, constructors),
            (OperationKind::Method, methods),
        ] {
            for operation in operations {
                let signature = self.signature(operation)?;
                let candidates = match kind {
                    OperationKind::Method => self.methods(left)?,
                    OperationKind::Constructor => self.constructors(left)?,
                };
                let mut matched = None;
                for candidate in candidates {
                    if self.signature(candidate)? == signature {
                        matched = Some(candidate);
                        break;
                    }
                }
                match matched {
                    Some(existing) if existing == operation => {}
                    Some(existing) => self.merge(existing, operation, strategy)?,
                    None => {
                        self.copy(operation, left)?;
                    }
                }
            }
        }
        for ty in nested {
            let name = self.simple_name(ty);
            match self.nested_type(left, &name)? {
                Some(existing) if existing == ty => {}
                Some(existing) => self.merge(existing, ty, strategy)?,
                None => {
                    self.copy(ty, left)?;
                }
            }
        }
        Ok(())
    }
}
