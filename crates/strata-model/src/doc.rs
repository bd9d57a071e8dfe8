//! Comments and documentation

use crate::error::CodeResult;
use crate::model::CodeModel;
use crate::node::NodeId;

/// Comment attached to an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comment {
    /// `// text`
    SingleLine(String),
    /// `/* lines */`
    Block(Vec<String>),
    /// Several comments in a row
    Composite(Vec<Comment>),
}

impl Comment {
    /// Combine two comments into one
    pub fn join(self, other: Comment) -> Comment {
        match self {
            Comment::Composite(mut comments) => {
                comments.push(other);
                Comment::Composite(comments)
            }
            first => Comment::Composite(vec![first, other]),
        }
    }

    /// Source lines of the comment, without trailing newlines
    pub fn lines(&self) -> Vec<String> {
        match self {
            Comment::SingleLine(text) => vec![format!("// {}", text.trim())],
            Comment::Block(lines) => {
                let mut out = Vec::with_capacity(lines.len() + 2);
                out.push("/*".to_string());
                out.extend(lines.iter().map(|line| format!(" * {}", line)));
                out.push(" */".to_string());
                out
            }
            Comment::Composite(comments) => comments.iter().flat_map(Comment::lines).collect(),
        }
    }
}

/// Link from documentation to a method (`name(Type, Type)`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocMethodLink {
    /// Method name
    pub name: String,
    /// Parameter type names, `None` when the anchor has no parentheses
    pub parameters: Option<Vec<String>>,
}

impl DocMethodLink {
    /// Parse an anchor such as `put(String, Object)`
    pub fn parse(anchor: &str) -> Option<DocMethodLink> {
        let anchor = anchor.trim();
        let Some(open) = anchor.find('(') else {
            if anchor.is_empty() {
                return None;
            }
            return Some(DocMethodLink {
                name: anchor.to_string(),
                parameters: None,
            });
        };
        if !anchor.ends_with(')') || open == 0 {
            return None;
        }
        let name = anchor[..open].trim().to_string();
        let inner = anchor[open + 1..anchor.len() - 1].trim();
        let parameters = if inner.is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|p| p.trim().to_string()).collect()
        };
        Some(DocMethodLink {
            name,
            parameters: Some(parameters),
        })
    }

    /// Canonical anchor
    pub fn anchor(&self) -> String {
        match &self.parameters {
            Some(parameters) => format!("{}({})", self.name, parameters.join(",")),
            None => self.name.clone(),
        }
    }
}

impl CodeModel {
    /// Documentation lines of a node
    pub fn doc(&mut self, id: NodeId) -> CodeResult<Vec<String>> {
        self.initialize(id)?;
        Ok(self.node(id).doc.clone())
    }

    /// Append a documentation line
    pub fn add_doc_line(&mut self, id: NodeId, line: impl Into<String>) -> CodeResult<()> {
        self.initialize(id)?;
        self.verify_mutable(id)?;
        self.node_mut(id).doc.push(line.into());
        Ok(())
    }

    /// Attach a comment, replacing an existing one
    pub fn set_comment(&mut self, id: NodeId, comment: Option<Comment>) -> CodeResult<()> {
        self.verify_mutable(id)?;
        self.node_mut(id).comment = comment;
        Ok(())
    }

    /// Attached comment
    pub fn comment(&self, id: NodeId) -> Option<&Comment> {
        self.node(id).comment.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_link() {
        let link = DocMethodLink::parse("put(String, Object)").unwrap();
        assert_eq!(link.name, "put");
        assert_eq!(
            link.parameters,
            Some(vec!["String".to_string(), "Object".to_string()])
        );
        assert_eq!(link.anchor(), "put(String,Object)");

        let link = DocMethodLink::parse("clear()").unwrap();
        assert_eq!(link.parameters, Some(Vec::new()));

        let link = DocMethodLink::parse("size").unwrap();
        assert_eq!(link.parameters, None);

        assert!(DocMethodLink::parse("broken(").is_none());
        assert!(DocMethodLink::parse("").is_none());
    }

    #[test]
    fn test_comment_lines() {
        let comment = Comment::SingleLine("first".into()).join(Comment::Block(vec!["a".into()]));
        assert_eq!(comment.lines(), vec!["// first", "/*", " * a", " */"]);
    }
}
