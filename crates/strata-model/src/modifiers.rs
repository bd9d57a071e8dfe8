//! Modifiers and visibility

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Declared visibility, ordered from weakest restriction to strongest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible everywhere
    Public,
    /// Visible to subtypes and the package
    Protected,
    /// Package private
    #[default]
    Default,
    /// Visible inside the declaring type only
    Private,
}

impl Visibility {
    /// Check whether `self` restricts access at most as much as `other`
    pub fn is_weaker_or_equal_to(self, other: Visibility) -> bool {
        self <= other
    }

    /// The weaker (less restrictive) of two visibilities
    pub fn weakest(self, other: Visibility) -> Visibility {
        self.min(other)
    }

    /// Source keyword, empty for package private
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Default => "",
            Visibility::Private => "private",
        }
    }

    /// Parse a visibility keyword
    pub fn from_keyword(keyword: &str) -> Option<Visibility> {
        match keyword {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Non-visibility modifier keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// `abstract`
    Abstract,
    /// `static`
    Static,
    /// `final`
    Final,
    /// `transient`
    Transient,
    /// `volatile`
    Volatile,
    /// `synchronized`
    Synchronized,
    /// `native`
    Native,
    /// `strictfp`
    Strictfp,
    /// `default` (interface methods)
    Default,
}

impl Modifier {
    /// Source keyword
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Abstract => "abstract",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Synchronized => "synchronized",
            Modifier::Native => "native",
            Modifier::Strictfp => "strictfp",
            Modifier::Default => "default",
        }
    }

    /// Parse a modifier keyword
    pub fn from_keyword(keyword: &str) -> Option<Modifier> {
        Some(match keyword {
            "abstract" => Modifier::Abstract,
            "static" => Modifier::Static,
            "final" => Modifier::Final,
            "transient" => Modifier::Transient,
            "volatile" => Modifier::Volatile,
            "synchronized" => Modifier::Synchronized,
            "native" => Modifier::Native,
            "strictfp" => Modifier::Strictfp,
            "default" => Modifier::Default,
            _ => return None,
        })
    }
}

/// Immutable, deduplicated modifier set plus a visibility
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    visibility: Visibility,
    keywords: BTreeSet<Modifier>,
}

impl Modifiers {
    /// Create a modifier set
    pub fn new(visibility: Visibility, keywords: impl IntoIterator<Item = Modifier>) -> Self {
        Modifiers {
            visibility,
            keywords: keywords.into_iter().collect(),
        }
    }

    /// `public` without further keywords
    pub fn public() -> Self {
        Self::new(Visibility::Public, [])
    }

    /// `private` without further keywords
    pub fn private() -> Self {
        Self::new(Visibility::Private, [])
    }

    /// Visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Check for a keyword
    pub fn has(&self, modifier: Modifier) -> bool {
        self.keywords.contains(&modifier)
    }

    /// Iterate the keywords in canonical order
    pub fn keywords(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.keywords.iter().copied()
    }

    /// `static` is present
    pub fn is_static(&self) -> bool {
        self.has(Modifier::Static)
    }

    /// `final` is present
    pub fn is_final(&self) -> bool {
        self.has(Modifier::Final)
    }

    /// `abstract` is present
    pub fn is_abstract(&self) -> bool {
        self.has(Modifier::Abstract)
    }

    /// Copy with another visibility
    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Modifiers {
            visibility,
            keywords: self.keywords.clone(),
        }
    }

    /// Copy with an additional keyword
    pub fn with(&self, modifier: Modifier) -> Self {
        let mut keywords = self.keywords.clone();
        keywords.insert(modifier);
        Modifiers {
            visibility: self.visibility,
            keywords,
        }
    }

    /// Copy without a keyword
    pub fn without(&self, modifier: Modifier) -> Self {
        let mut keywords = self.keywords.clone();
        keywords.remove(&modifier);
        Modifiers {
            visibility: self.visibility,
            keywords,
        }
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let visibility = self.visibility.keyword();
        if !visibility.is_empty() {
            f.write_str(visibility)?;
            first = false;
        }
        for keyword in &self.keywords {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(keyword.keyword())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_order() {
        assert!(Visibility::Public.is_weaker_or_equal_to(Visibility::Protected));
        assert!(Visibility::Protected.is_weaker_or_equal_to(Visibility::Default));
        assert!(Visibility::Default.is_weaker_or_equal_to(Visibility::Private));
        assert!(Visibility::Private.is_weaker_or_equal_to(Visibility::Private));
        assert!(!Visibility::Private.is_weaker_or_equal_to(Visibility::Public));
        assert_eq!(
            Visibility::Private.weakest(Visibility::Protected),
            Visibility::Protected
        );
    }

    #[test]
    fn test_modifiers_dedup_and_order() {
        let modifiers = Modifiers::new(
            Visibility::Public,
            [Modifier::Final, Modifier::Static, Modifier::Final],
        );
        assert_eq!(modifiers.keywords().count(), 2);
        assert_eq!(modifiers.to_string(), "public static final");

        let package_private = Modifiers::new(Visibility::Default, [Modifier::Abstract]);
        assert_eq!(package_private.to_string(), "abstract");
        assert_eq!(Modifiers::default().to_string(), "");
    }

    #[test]
    fn test_modifiers_copy_on_change() {
        let modifiers = Modifiers::public();
        let with_static = modifiers.with(Modifier::Static);
        assert!(!modifiers.is_static());
        assert!(with_static.is_static());
        assert!(!with_static.without(Modifier::Static).is_static());
        assert_eq!(
            with_static.with_visibility(Visibility::Private).visibility(),
            Visibility::Private
        );
    }

    #[test]
    fn test_keywords_round_trip() {
        assert_eq!(Modifier::from_keyword("volatile"), Some(Modifier::Volatile));
        assert_eq!(Modifier::from_keyword("public"), None);
        assert_eq!(Visibility::from_keyword("protected"), Some(Visibility::Protected));
        assert_eq!(Visibility::from_keyword("static"), None);
    }
}
