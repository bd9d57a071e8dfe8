//! Statements and blocks

use crate::expression::Expression;
use crate::node::NodeId;

/// Header of a `for` loop
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    /// Initialization statement text
    pub init: String,
    /// Loop condition
    pub condition: Expression,
    /// Update statement text
    pub update: String,
}

/// Kind of a block statement
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// `{ ... }`
    Plain,
    /// `if (condition) { ... }`
    If(Expression),
    /// `while (condition) { ... }`
    While(Expression),
    /// `do { ... } while (condition);`
    DoWhile(Expression),
    /// `for (init; condition; update) { ... }`
    For(ForHeader),
}

/// Statement inside an operation body
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `expression;`
    Expression(Expression),
    /// `[final] Type name [= value];`
    LocalVariable {
        /// Declared type
        ty: NodeId,
        /// Variable name
        name: String,
        /// Initial value
        value: Option<Expression>,
        /// `final`
        is_final: bool,
    },
    /// `return [value];`
    Return(Option<Expression>),
    /// Nested block
    Block {
        /// Block header
        kind: BlockKind,
        /// Contained statements
        statements: Vec<Statement>,
    },
    /// Source text kept as written
    Verbatim(String),
}

impl Statement {
    /// Plain block
    pub fn block(statements: Vec<Statement>) -> Self {
        Statement::Block {
            kind: BlockKind::Plain,
            statements,
        }
    }

    /// Rewrite every node reference
    pub(crate) fn remap(&mut self, map: &dyn Fn(NodeId) -> NodeId) {
        match self {
            Statement::LocalVariable { ty, value, .. } => {
                *ty = map(*ty);
                if let Some(value) = value {
                    *value = value.detached();
                }
            }
            Statement::Expression(expression) | Statement::Return(Some(expression)) => {
                *expression = expression.detached();
            }
            Statement::Block { statements, .. } => {
                for statement in statements {
                    statement.remap(map);
                }
            }
            Statement::Return(None) | Statement::Verbatim(_) => {}
        }
    }
}
