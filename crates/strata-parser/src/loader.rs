//! Source loaders
//!
//! Both loaders map a qualified type name to the text of the compilation unit
//! declaring it and read that unit into the source layer on demand. Each unit
//! is read once; later requests return the registered type.

use crate::reader::read_compilation_unit;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use strata_model::{CodeModel, CodeResult, LanguageSyntax, NodeId, SourceLoader};

fn load_unit(model: &mut CodeModel, qualified_name: &str, text: &str) -> CodeResult<Option<NodeId>> {
    if let Some(loaded) = model.loaded_source_type(qualified_name) {
        return Ok(Some(loaded));
    }
    tracing::debug!(qualified_name, bytes = text.len(), "reading source");
    read_compilation_unit(model, qualified_name, text)?;
    let loaded = model.loaded_source_type(qualified_name);
    if loaded.is_none() {
        tracing::warn!(qualified_name, "source does not declare the requested type");
    }
    Ok(loaded)
}

/// Source texts held in memory, keyed by qualified type name
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceLoader {
    units: IndexMap<String, String>,
}

impl InMemorySourceLoader {
    /// Empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the unit declaring `qualified_name`
    pub fn with_unit(mut self, qualified_name: impl Into<String>, text: impl Into<String>) -> Self {
        self.add_unit(qualified_name, text);
        self
    }

    /// Add or replace the unit declaring `qualified_name`
    pub fn add_unit(&mut self, qualified_name: impl Into<String>, text: impl Into<String>) {
        self.units.insert(qualified_name.into(), text.into());
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check for an empty loader
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl SourceLoader for InMemorySourceLoader {
    fn has_type(&self, qualified_name: &str) -> bool {
        self.units.contains_key(qualified_name)
    }

    fn load_type(&self, model: &mut CodeModel, qualified_name: &str) -> CodeResult<Option<NodeId>> {
        match self.units.get(qualified_name) {
            Some(text) => load_unit(model, qualified_name, text),
            None => Ok(None),
        }
    }
}

/// Source files below a root directory, one file per top level type
/// (`root/com/example/Person.java` for `com.example.Person`)
#[derive(Debug, Clone)]
pub struct DirectorySourceLoader {
    root: PathBuf,
    extension: String,
}

impl DirectorySourceLoader {
    /// Loader for `root` using the default file extension
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: LanguageSyntax::default().file_extension,
        }
    }

    /// Use another file extension (with or without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File expected to declare `qualified_name`
    pub fn path_for(&self, qualified_name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in qualified_name.split('.') {
            path.push(segment);
        }
        path.set_extension(self.extension.trim_start_matches('.'));
        path
    }
}

impl SourceLoader for DirectorySourceLoader {
    fn has_type(&self, qualified_name: &str) -> bool {
        self.path_for(qualified_name).is_file()
    }

    fn load_type(&self, model: &mut CodeModel, qualified_name: &str) -> CodeResult<Option<NodeId>> {
        if let Some(loaded) = model.loaded_source_type(qualified_name) {
            return Ok(Some(loaded));
        }
        let path = self.path_for(qualified_name);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        load_unit(model, qualified_name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for() {
        let loader = DirectorySourceLoader::new("/src");
        assert_eq!(loader.path_for("com.example.Person"), PathBuf::from("/src/com/example/Person.java"));
        let loader = loader.with_extension("kt");
        assert_eq!(loader.path_for("Main"), PathBuf::from("/src/Main.kt"));
    }

    #[test]
    fn test_in_memory_loads_once() {
        let loader = InMemorySourceLoader::new().with_unit("a.B", "package a; public class B { int x; }");
        assert!(loader.has_type("a.B"));
        assert!(!loader.has_type("a.C"));

        let mut model = CodeModel::new();
        let first = loader.load_type(&mut model, "a.B").unwrap();
        let second = loader.load_type(&mut model, "a.B").unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(loader.load_type(&mut model, "a.C").unwrap(), None);
    }
}
