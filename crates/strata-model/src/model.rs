//! Code model arena
//!
//! [`CodeModel`] owns every node of the main tree and of the source shadow
//! tree, the type registries of both layers, the loaders that populate nodes
//! lazily, and the diagnostics sink.
//!
//! # Lifecycle
//!
//! Nodes are created un-initialized. The first accessor that needs declared
//! content calls [`CodeModel::initialize`], which pulls the reflective origin
//! first and the source origin second. Initialization writes node data
//! directly and therefore also works on frozen nodes. After
//! [`CodeModel::set_immutable`] every public mutator of the node and its owned
//! children fails with [`CodeError::ImmutableState`].

use crate::config::{LanguageSyntax, ModelConfig};
use crate::diagnostics::{Diagnostic, SharedSink, TracingSink};
use crate::error::{CodeError, CodeResult};
use crate::node::{Layer, Node, NodeId, NodeKind, PackageData, TypeData};
use crate::reflect::ReflectiveLoader;
use crate::source::SourceLoader;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Names of the predefined primitive types
pub const PRIMITIVES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// Layered in-memory code model
pub struct CodeModel {
    pub(crate) nodes: Vec<Node>,
    pub(crate) config: ModelConfig,
    pub(crate) root: NodeId,
    pub(crate) source_root: NodeId,
    pub(crate) types: FxHashMap<String, NodeId>,
    pub(crate) source_types: FxHashMap<String, NodeId>,
    pub(crate) primitives: FxHashMap<String, NodeId>,
    pub(crate) reflective_loader: Option<Rc<dyn ReflectiveLoader>>,
    pub(crate) source_loader: Option<Rc<dyn SourceLoader>>,
    pub(crate) diagnostics: SharedSink,
}

impl Default for CodeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeModel")
            .field("nodes", &self.nodes.len())
            .field("types", &self.types.len())
            .field("source_types", &self.source_types.len())
            .field("syntax", &self.config.syntax.name)
            .finish()
    }
}

impl CodeModel {
    /// Create a model for the default (Java) syntax
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    /// Create a model with the given configuration
    pub fn with_config(config: ModelConfig) -> Self {
        let mut model = CodeModel {
            nodes: Vec::new(),
            config,
            root: NodeId(0),
            source_root: NodeId(0),
            types: FxHashMap::default(),
            source_types: FxHashMap::default(),
            primitives: FxHashMap::default(),
            reflective_loader: None,
            source_loader: None,
            diagnostics: Rc::new(TracingSink),
        };

        model.root = model.alloc_in(Layer::Main, None, NodeKind::Package(PackageData::default()));
        model.source_root =
            model.alloc_in(Layer::Source, None, NodeKind::Package(PackageData::default()));
        for root in [model.root, model.source_root] {
            model.node_mut(root).initialized = true;
        }

        for name in PRIMITIVES {
            let id = model.alloc(
                Some(model.root),
                NodeKind::Type(TypeData {
                    simple_name: name.to_string(),
                    primitive: true,
                    ..TypeData::default()
                }),
            );
            let node = model.node_mut(id);
            node.initialized = true;
            node.system_immutable = true;
            node.immutable = true;
            model.primitives.insert(name.to_string(), id);
        }

        model
    }

    /// Attach the provider of binary metadata
    pub fn with_reflective_loader(mut self, loader: Rc<dyn ReflectiveLoader>) -> Self {
        self.reflective_loader = Some(loader);
        self
    }

    /// Attach the provider of parsed source
    pub fn with_source_loader(mut self, loader: Rc<dyn SourceLoader>) -> Self {
        self.source_loader = Some(loader);
        self
    }

    /// Replace the diagnostics sink
    pub fn with_diagnostics(mut self, sink: SharedSink) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Syntax table
    pub fn syntax(&self) -> &LanguageSyntax {
        &self.config.syntax
    }

    /// Report a diagnostic into the model's sink
    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    /// Shared handle of the diagnostics sink
    pub fn diagnostics(&self) -> SharedSink {
        Rc::clone(&self.diagnostics)
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the arena is empty (never true after construction)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc_in(&mut self, layer: Layer, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(parent, layer, kind));
        id
    }

    /// Allocate a node in the layer of its parent
    pub(crate) fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let layer = parent.map(|p| self.node(p).layer).unwrap_or(Layer::Main);
        self.alloc_in(layer, parent, kind)
    }

    /// Access a node
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this model
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Layer of a node
    pub fn layer(&self, id: NodeId) -> Layer {
        self.node(id).layer
    }

    /// Root of a layer
    pub fn layer_root(&self, layer: Layer) -> NodeId {
        match layer {
            Layer::Main => self.root,
            Layer::Source => self.source_root,
        }
    }

    /// Run the one-time initialization of a node
    ///
    /// Idempotent. Re-entrant calls while the node is initializing return
    /// immediately.
    pub fn initialize(&mut self, id: NodeId) -> CodeResult<()> {
        {
            let node = self.node_mut(id);
            if node.initialized || node.initializing {
                return Ok(());
            }
            node.initializing = true;
        }
        tracing::trace!(node = %id, kind = self.node(id).kind.name(), "initializing");

        let initializer: fn(&mut Self, NodeId) -> CodeResult<()> = match &self.node(id).kind {
            NodeKind::Package(_) => Self::initialize_package,
            NodeKind::Type(_) => Self::initialize_type,
            NodeKind::Field(_) => Self::initialize_field,
            NodeKind::Operation(_) => Self::initialize_operation,
            _ => |_, _| Ok(()),
        };
        let result = initializer(self, id);

        let node = self.node_mut(id);
        node.initializing = false;
        if result.is_ok() {
            node.initialized = true;
        }
        result
    }

    /// Initialize a node and all of its owned descendants
    pub fn initialize_deep(&mut self, id: NodeId) -> CodeResult<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.initialize(current)?;
            stack.extend(self.children(current));
        }
        Ok(())
    }

    /// Check whether a node has been initialized
    pub fn is_initialized(&self, id: NodeId) -> bool {
        self.node(id).initialized
    }

    /// Freeze a node and everything it owns
    ///
    /// Forces initialization first. Synthesized properties of types are
    /// computed before the type is frozen.
    pub fn set_immutable(&mut self, id: NodeId) -> CodeResult<()> {
        if self.node(id).immutable {
            return Ok(());
        }
        self.initialize(id)?;
        if matches!(self.node(id).kind, NodeKind::Type(_)) {
            self.properties(id)?;
        }
        let children = self.children(id);
        self.node_mut(id).immutable = true;
        for child in children {
            self.set_immutable(child)?;
        }
        Ok(())
    }

    /// Check whether a node is frozen
    pub fn is_immutable(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.immutable || node.system_immutable
    }

    /// Check whether a node is one of the predefined, always frozen nodes
    pub fn is_system_immutable(&self, id: NodeId) -> bool {
        self.node(id).system_immutable
    }

    pub(crate) fn mark_system_immutable(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.system_immutable = true;
        node.immutable = true;
    }

    /// Fail with [`CodeError::ImmutableState`] if the node is frozen
    pub fn verify_mutable(&self, id: NodeId) -> CodeResult<()> {
        if self.is_immutable(id) {
            return Err(CodeError::ImmutableState {
                path: self.path_string(id),
            });
        }
        Ok(())
    }

    /// Owned children of a node
    ///
    /// Only nodes whose parent is `id` are returned; referenced nodes such as
    /// a field's nominal type are not.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut children: Vec<NodeId> = Vec::new();
        match &node.kind {
            NodeKind::Package(data) => {
                children.extend(&data.packages);
                children.extend(&data.files);
            }
            NodeKind::File(data) => children.extend(&data.types),
            NodeKind::Type(data) => {
                children.extend(&data.type_variables);
                children.extend(data.super_class);
                children.extend(&data.super_interfaces);
                children.extend(&data.fields);
                children.extend(&data.constructors);
                children.extend(&data.methods);
                children.extend(&data.nested_types);
                if let Some(properties) = &data.properties {
                    children.extend(properties);
                }
            }
            NodeKind::Field(data) => children.extend(data.ty),
            NodeKind::Operation(data) => {
                children.extend(&data.type_variables);
                children.extend(&data.parameters);
                children.extend(data.returns);
                children.extend(&data.exceptions);
            }
            NodeKind::Parameter(data) => children.extend(data.ty),
            NodeKind::TypeVariable(data) | NodeKind::Wildcard(data) => {
                children.extend(data.bound)
            }
            NodeKind::Parameterized(data) => children.extend(&data.arguments),
            NodeKind::Array(_) | NodeKind::Annotation(_) | NodeKind::Property(_) => {}
        }
        children.extend(&node.annotations);
        children.retain(|child| *child != id && self.node(*child).parent == Some(id));
        children
    }

    /// Human readable location of a node
    pub fn path_string(&self, id: NodeId) -> String {
        let node = self.node(id);
        let owner = || {
            node.parent
                .map(|p| self.path_string(p))
                .unwrap_or_default()
        };
        match &node.kind {
            NodeKind::Package(_) | NodeKind::Type(_) => self.qualified_name(id),
            NodeKind::File(data) => {
                let package = owner();
                let file = format!("{}{}", data.name, self.syntax().file_extension);
                if package.is_empty() {
                    file
                } else {
                    format!("{}/{}", package.replace(self.syntax().package_separator, "/"), file)
                }
            }
            NodeKind::Field(data) => format!("{}.{}", owner(), data.name),
            NodeKind::Operation(data) => {
                let parameters: Vec<String> = data
                    .parameters
                    .iter()
                    .map(|p| self.erasure(*p))
                    .collect();
                format!("{}.{}({})", owner(), data.name, parameters.join(","))
            }
            NodeKind::Parameter(data) => format!("{}:{}", owner(), data.name),
            NodeKind::TypeVariable(data) => format!("{}<{}>", owner(), data.name),
            NodeKind::Annotation(data) => format!("{}@{}", owner(), data.type_name),
            NodeKind::Property(data) => format!("{}#{}", owner(), data.name),
            NodeKind::Wildcard(_) | NodeKind::Parameterized(_) | NodeKind::Array(_) => {
                format!("{}{}", owner(), id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_model_has_roots_and_primitives() {
        let model = CodeModel::new();
        assert_eq!(model.parent(model.layer_root(Layer::Main)), None);
        assert_eq!(model.layer(model.layer_root(Layer::Source)), Layer::Source);

        let int = model.primitive("int").unwrap();
        assert!(model.is_system_immutable(int));
        assert!(model.is_immutable(int));
        assert!(model.verify_mutable(int).is_err());
        assert!(model.primitive("string").is_none());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut model = CodeModel::new();
        let root = model.root_package();
        model.initialize(root).unwrap();
        model.initialize(root).unwrap();
        assert!(model.is_initialized(root));
    }
}
