//! Packages and compilation units

use crate::error::{CodeError, CodeResult};
use crate::model::CodeModel;
use crate::node::{FileData, Import, Layer, NodeId, NodeKind, PackageData};
use crate::reflect::ReflectiveObject;

impl CodeModel {
    /// Root package of the main tree
    pub fn root_package(&self) -> NodeId {
        self.root
    }

    /// Root package of the source tree
    pub fn source_root_package(&self) -> NodeId {
        self.source_root
    }

    pub(crate) fn package_data(&self, id: NodeId) -> CodeResult<&PackageData> {
        match &self.node(id).kind {
            NodeKind::Package(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "package")),
        }
    }

    fn package_data_mut(&mut self, id: NodeId) -> CodeResult<&mut PackageData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Package(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "package")),
        }
    }

    pub(crate) fn file_data(&self, id: NodeId) -> CodeResult<&FileData> {
        match &self.node(id).kind {
            NodeKind::File(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "file")),
        }
    }

    pub(crate) fn file_data_mut(&mut self, id: NodeId) -> CodeResult<&mut FileData> {
        match &mut self.node_mut(id).kind {
            NodeKind::File(data) => Ok(data),
            _ => Err(CodeError::kind_mismatch(id, "file")),
        }
    }

    /// Check whether a package is the root of its layer
    pub fn is_root_package(&self, id: NodeId) -> bool {
        id == self.root || id == self.source_root
    }

    /// Qualified name of a package, empty for the root
    pub fn package_qualified_name(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(package) = current {
            if let NodeKind::Package(data) = &self.node(package).kind {
                if !data.name.is_empty() {
                    segments.push(data.name.as_str());
                }
            }
            current = self.node(package).parent;
        }
        segments.reverse();
        segments.join(&self.syntax().separator())
    }

    /// Look up a package by qualified name
    pub fn get_package(&self, layer: Layer, qualified: &str) -> Option<NodeId> {
        let mut current = self.layer_root(layer);
        if qualified.is_empty() {
            return Some(current);
        }
        for segment in qualified.split(self.syntax().package_separator) {
            current = self.sub_package(current, segment)?;
        }
        Some(current)
    }

    fn sub_package(&self, package: NodeId, name: &str) -> Option<NodeId> {
        let data = self.package_data(package).ok()?;
        data.packages
            .iter()
            .copied()
            .find(|p| self.node(*p).kind.name_of() == Some(name))
    }

    /// Look up a package, creating missing segments
    ///
    /// Packages of the main layer pick up their reflective descriptor when the
    /// loader knows one.
    pub fn get_or_create_package(&mut self, layer: Layer, qualified: &str) -> CodeResult<NodeId> {
        let mut current = self.layer_root(layer);
        if qualified.is_empty() {
            return Ok(current);
        }
        let separator = self.syntax().package_separator;
        let mut prefix = String::new();
        for segment in qualified.split(separator) {
            if !prefix.is_empty() {
                prefix.push(separator);
            }
            prefix.push_str(segment);
            current = match self.sub_package(current, segment) {
                Some(existing) => existing,
                None => {
                    self.verify_mutable(current)?;
                    let package = self.alloc(
                        Some(current),
                        NodeKind::Package(PackageData {
                            name: segment.to_string(),
                            ..PackageData::default()
                        }),
                    );
                    if layer == Layer::Main {
                        let descriptor = self
                            .reflective_loader
                            .as_ref()
                            .and_then(|loader| loader.load_package(&prefix));
                        self.node_mut(package).reflective = descriptor.map(ReflectiveObject::Package);
                    }
                    self.package_data_mut(current)?.packages.push(package);
                    package
                }
            };
        }
        Ok(current)
    }

    /// Sub packages of a package
    pub fn sub_packages(&self, package: NodeId) -> CodeResult<Vec<NodeId>> {
        Ok(self.package_data(package)?.packages.clone())
    }

    /// Compilation units of a package
    pub fn package_files(&self, package: NodeId) -> CodeResult<Vec<NodeId>> {
        Ok(self.package_data(package)?.files.clone())
    }

    pub(crate) fn initialize_package(&mut self, id: NodeId) -> CodeResult<()> {
        if let Some(ReflectiveObject::Package(descriptor)) = self.node(id).reflective.clone() {
            self.add_reflective_annotations(id, &descriptor.annotations)?;
        }
        Ok(())
    }

    /// Look up a compilation unit by the name of its primary type
    pub fn file(&self, package: NodeId, name: &str) -> Option<NodeId> {
        let data = self.package_data(package).ok()?;
        data.files
            .iter()
            .copied()
            .find(|f| self.node(*f).kind.name_of() == Some(name))
    }

    /// Create an empty compilation unit
    pub fn create_file(&mut self, package: NodeId, name: &str) -> CodeResult<NodeId> {
        self.verify_mutable(package)?;
        if self.file(package, name).is_some() {
            return Err(CodeError::DuplicateMember {
                name: self.syntax().qualify(&self.package_qualified_name(package), name),
            });
        }
        Ok(self.file_internal(package, name))
    }

    /// Compilation unit for a type materialized by a loader
    pub(crate) fn file_internal(&mut self, package: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.file(package, name) {
            return existing;
        }
        let file = self.alloc(
            Some(package),
            NodeKind::File(FileData {
                name: name.to_string(),
                ..FileData::default()
            }),
        );
        self.node_mut(file).initialized = true;
        if let NodeKind::Package(data) = &mut self.node_mut(package).kind {
            data.files.push(file);
        }
        file
    }

    /// Top level types of a compilation unit
    pub fn file_types(&mut self, file: NodeId) -> CodeResult<Vec<NodeId>> {
        self.initialize(file)?;
        Ok(self.file_data(file)?.types.clone())
    }

    /// The type named like the compilation unit, or the first type
    pub fn primary_type(&mut self, file: NodeId) -> CodeResult<Option<NodeId>> {
        let types = self.file_types(file)?;
        let name = self.file_data(file)?.name.clone();
        Ok(types
            .iter()
            .copied()
            .find(|t| self.simple_name(*t) == name)
            .or_else(|| types.first().copied()))
    }

    /// Find a type of the compilation unit by (possibly dotted) simple name,
    /// searching nested types recursively
    pub fn child_type(&mut self, file: NodeId, simple: &str) -> CodeResult<Option<NodeId>> {
        let separator = self.syntax().package_separator;
        if let Some((head, rest)) = simple.split_once(separator) {
            let Some(mut current) = self.child_type(file, head)? else {
                return Ok(None);
            };
            for segment in rest.split(separator) {
                match self.nested_type(current, segment)? {
                    Some(nested) => current = nested,
                    None => return Ok(None),
                }
            }
            return Ok(Some(current));
        }

        let mut queue: std::collections::VecDeque<NodeId> = self.file_types(file)?.into();
        while let Some(ty) = queue.pop_front() {
            if self.simple_name(ty) == simple {
                return Ok(Some(ty));
            }
            queue.extend(self.nested_types(ty)?);
        }
        Ok(None)
    }

    /// Add an import, ignoring duplicates
    pub fn add_import(&mut self, file: NodeId, import: Import) -> CodeResult<()> {
        self.verify_mutable(file)?;
        let data = self.file_data_mut(file)?;
        if !data.imports.contains(&import) {
            data.imports.push(import);
        }
        Ok(())
    }

    /// Imports of a compilation unit
    pub fn imports(&self, file: NodeId) -> CodeResult<Vec<Import>> {
        Ok(self.file_data(file)?.imports.clone())
    }

    /// Compilation unit enclosing a node
    pub fn file_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if matches!(self.node(node).kind, NodeKind::File(_)) {
                return Some(node);
            }
            current = self.node(node).parent;
        }
        None
    }

    /// Package enclosing a node
    pub fn package_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.node(id).parent;
        while let Some(node) = current {
            if matches!(self.node(node).kind, NodeKind::Package(_)) {
                return Some(node);
            }
            current = self.node(node).parent;
        }
        None
    }

    /// Copy a compilation unit into another package
    ///
    /// The qualified names of the copied types follow the new package.
    pub fn copy_file(&mut self, file: NodeId, package: NodeId) -> CodeResult<NodeId> {
        self.file_data(file)?;
        self.package_data(package)?;
        self.copy(file, package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packages_are_created_once() {
        let mut model = CodeModel::new();
        let util = model.get_or_create_package(Layer::Main, "java.util").unwrap();
        let again = model.get_or_create_package(Layer::Main, "java.util").unwrap();
        assert_eq!(util, again);
        assert_eq!(model.package_qualified_name(util), "java.util");
        assert_eq!(model.get_package(Layer::Main, "java.util"), Some(util));
        assert_eq!(model.get_package(Layer::Source, "java.util"), None);
        assert_eq!(model.get_package(Layer::Main, ""), Some(model.root_package()));
        assert!(model.is_root_package(model.root_package()));
        assert_eq!(model.package_qualified_name(model.root_package()), "");
    }

    #[test]
    fn test_file_name_unique_in_package() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        model.create_file(package, "Foo").unwrap();
        let duplicate = model.create_file(package, "Foo");
        assert!(matches!(duplicate, Err(CodeError::DuplicateMember { .. })));
    }

    #[test]
    fn test_imports_deduplicate() {
        let mut model = CodeModel::new();
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, "Foo").unwrap();
        model.add_import(file, Import::of("java.util.List")).unwrap();
        model.add_import(file, Import::of("java.util.List")).unwrap();
        model.add_import(file, Import::of_static("java.util.Collections.emptyList")).unwrap();
        assert_eq!(model.imports(file).unwrap().len(), 2);
    }
}
