//! Language syntax and model configuration
//!
//! The keyword tables of the modeled language are loaded from TOML
//! (`strata.toml` style). Every key is optional and defaults to Java.

use crate::error::{CodeError, CodeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Syntax table of the modeled language
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageSyntax {
    /// Display name of the language
    pub name: String,

    /// Separator between package segments and nested type names
    pub package_separator: char,

    /// Terminator of statements and declarations
    pub statement_terminator: String,

    /// Extension of source files (including the dot)
    pub file_extension: String,

    /// Prefix introducing an annotation usage
    pub annotation_start: String,

    /// Keyword between a type and its superclass (including spaces)
    pub keyword_extends: String,

    /// Keyword between a type and its interfaces (including spaces)
    pub keyword_implements: String,

    /// Indentation unit used for full declarations
    pub default_indent: String,

    /// Line separator
    pub newline: String,

    /// Keywords of the type categories
    pub category_keywords: CategoryKeywords,
}

/// Keywords introducing each type category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryKeywords {
    /// Class keyword
    pub class: String,
    /// Interface keyword
    pub interface: String,
    /// Enumeration keyword
    pub enumeration: String,
    /// Annotation declaration keyword
    pub annotation: String,
}

impl Default for CategoryKeywords {
    fn default() -> Self {
        CategoryKeywords {
            class: "class".to_string(),
            interface: "interface".to_string(),
            enumeration: "enum".to_string(),
            annotation: "@interface".to_string(),
        }
    }
}

impl Default for LanguageSyntax {
    fn default() -> Self {
        LanguageSyntax {
            name: "Java".to_string(),
            package_separator: '.',
            statement_terminator: ";".to_string(),
            file_extension: ".java".to_string(),
            annotation_start: "@".to_string(),
            keyword_extends: " extends ".to_string(),
            keyword_implements: " implements ".to_string(),
            default_indent: "    ".to_string(),
            newline: "\n".to_string(),
            category_keywords: CategoryKeywords::default(),
        }
    }
}

impl LanguageSyntax {
    /// Load a syntax table from a file
    pub fn from_file(path: &Path) -> CodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a syntax table from TOML text
    pub fn from_toml_str(content: &str) -> CodeResult<Self> {
        let syntax: LanguageSyntax = toml::from_str(content)?;
        syntax.validate()?;
        Ok(syntax)
    }

    /// Validate the syntax table
    pub fn validate(&self) -> CodeResult<()> {
        if self.statement_terminator.is_empty() {
            return Err(CodeError::InvalidConfig(
                "statement_terminator cannot be empty".to_string(),
            ));
        }
        if self.package_separator.is_whitespace() {
            return Err(CodeError::InvalidConfig(format!(
                "Invalid package separator: {:?}",
                self.package_separator
            )));
        }
        if self.annotation_start.is_empty() {
            return Err(CodeError::InvalidConfig(
                "annotation_start cannot be empty".to_string(),
            ));
        }
        if self.newline.is_empty() {
            return Err(CodeError::InvalidConfig("newline cannot be empty".to_string()));
        }
        let keywords = &self.category_keywords;
        for keyword in [
            &keywords.class,
            &keywords.interface,
            &keywords.enumeration,
            &keywords.annotation,
        ] {
            if keyword.trim().is_empty() {
                return Err(CodeError::InvalidConfig(
                    "category keywords cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Separator as a string slice helper
    pub fn separator(&self) -> String {
        self.package_separator.to_string()
    }

    /// Join a parent qualified name and a simple name
    pub fn qualify(&self, parent: &str, simple: &str) -> String {
        if parent.is_empty() {
            simple.to_string()
        } else {
            format!("{}{}{}", parent, self.package_separator, simple)
        }
    }
}

/// Accessor prefix of a property method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorKind {
    /// Zero parameters, non-void return
    Getter,
    /// Exactly one parameter
    Setter,
}

/// A method name prefix that makes a method a property accessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorPrefix {
    /// The prefix (`get`, `is`, ...)
    pub prefix: String,
    /// Accessor kind the prefix introduces
    pub kind: AccessorKind,
}

impl AccessorPrefix {
    fn new(prefix: &str, kind: AccessorKind) -> Self {
        AccessorPrefix {
            prefix: prefix.to_string(),
            kind,
        }
    }
}

/// Configuration of a [`CodeModel`](crate::CodeModel)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Syntax table used when writing and reading
    pub syntax: LanguageSyntax,

    /// Accessor prefixes used by property synthesis, checked in order
    pub property_prefixes: Vec<AccessorPrefix>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            syntax: LanguageSyntax::default(),
            property_prefixes: vec![
                AccessorPrefix::new("get", AccessorKind::Getter),
                AccessorPrefix::new("has", AccessorKind::Getter),
                AccessorPrefix::new("can", AccessorKind::Getter),
                AccessorPrefix::new("set", AccessorKind::Setter),
                AccessorPrefix::new("is", AccessorKind::Getter),
            ],
        }
    }
}

impl ModelConfig {
    /// Parse a model configuration from TOML text
    pub fn from_toml_str(content: &str) -> CodeResult<Self> {
        let config: ModelConfig = toml::from_str(content)?;
        config.syntax.validate()?;
        if config.property_prefixes.iter().any(|p| p.prefix.is_empty()) {
            return Err(CodeError::InvalidConfig(
                "property prefixes cannot be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Load a model configuration from a file
    pub fn from_file(path: &Path) -> CodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Split an accessor method name into its kind and the raw remainder
    pub fn accessor_prefix<'a>(&self, method_name: &'a str) -> Option<(AccessorKind, &'a str)> {
        self.property_prefixes.iter().find_map(|p| {
            method_name
                .strip_prefix(p.prefix.as_str())
                .map(|rest| (p.kind, rest))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_java() {
        let syntax = LanguageSyntax::default();
        assert_eq!(syntax.name, "Java");
        assert_eq!(syntax.package_separator, '.');
        assert_eq!(syntax.statement_terminator, ";");
        assert!(syntax.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_default() {
        let syntax = LanguageSyntax::from_toml_str(
            r#"
name = "Groovy"
statement_terminator = ""
"#,
        );
        assert!(matches!(syntax, Err(CodeError::InvalidConfig(_))));

        let syntax = LanguageSyntax::from_toml_str(
            r#"
name = "Jav"
file_extension = ".jav"

[category_keywords]
enumeration = "enumeration"
"#,
        )
        .unwrap();
        assert_eq!(syntax.name, "Jav");
        assert_eq!(syntax.file_extension, ".jav");
        assert_eq!(syntax.statement_terminator, ";");
        assert_eq!(syntax.category_keywords.enumeration, "enumeration");
        assert_eq!(syntax.category_keywords.class, "class");
    }

    #[test]
    fn test_invalid_toml() {
        let result = LanguageSyntax::from_toml_str("name = ");
        assert!(matches!(result, Err(CodeError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_indent = \"\\t\"").unwrap();
        let syntax = LanguageSyntax::from_file(file.path()).unwrap();
        assert_eq!(syntax.default_indent, "\t");
    }

    #[test]
    fn test_accessor_prefix() {
        let config = ModelConfig::default();
        assert_eq!(
            config.accessor_prefix("getAge"),
            Some((AccessorKind::Getter, "Age"))
        );
        assert_eq!(
            config.accessor_prefix("isActive"),
            Some((AccessorKind::Getter, "Active"))
        );
        assert_eq!(
            config.accessor_prefix("setAge"),
            Some((AccessorKind::Setter, "Age"))
        );
        assert_eq!(config.accessor_prefix("compute"), None);
    }

    #[test]
    fn test_model_config_prefixes_from_toml() {
        let config = ModelConfig::from_toml_str(
            r#"
[[property_prefixes]]
prefix = "get"
kind = "getter"

[[property_prefixes]]
prefix = "with"
kind = "setter"
"#,
        )
        .unwrap();
        assert_eq!(config.property_prefixes.len(), 2);
        assert_eq!(
            config.accessor_prefix("withName"),
            Some((AccessorKind::Setter, "Name"))
        );
        assert_eq!(config.accessor_prefix("setName"), None);
    }
}
