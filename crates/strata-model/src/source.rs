//! Source origin boundary
//!
//! A [`SourceLoader`] parses the text of a type into the source layer of a
//! model. Main layer types whose text is available link to that shadow and
//! merge from it when they are initialized.

use crate::error::CodeResult;
use crate::model::CodeModel;
use crate::node::NodeId;

/// Provider of parsed source
pub trait SourceLoader {
    /// Check whether source text exists for a qualified type name
    fn has_type(&self, qualified_name: &str) -> bool;

    /// Parse the compilation unit declaring `qualified_name` into the source
    /// layer of `model` and return the source type
    ///
    /// Loading an already loaded unit returns the registered type.
    fn load_type(&self, model: &mut CodeModel, qualified_name: &str) -> CodeResult<Option<NodeId>>;
}

impl CodeModel {
    /// Register the type of the source layer under its qualified name
    ///
    /// Loaders call this for every type they create.
    pub fn register_source_type(&mut self, ty: NodeId) {
        self.register_types_in(ty);
    }

    /// Look up an already loaded source layer type
    pub fn loaded_source_type(&self, qualified_name: &str) -> Option<NodeId> {
        self.source_types.get(qualified_name).copied()
    }
}
