//! Expressions and constant evaluation
//!
//! Expressions are plain values stored inside field initializers, annotation
//! parameters and statements. The only expression that refers back into the
//! model is [`FieldReference`], which resolves its target field lazily and
//! caches the result.

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::CodeResult;
use crate::model::CodeModel;
use crate::node::{NodeId, NodeKind};
use crate::reflect::ReflectiveObject;
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// `"text"`
    String(String),
    /// `'c'`
    Char(char),
    /// `true` / `false`
    Boolean(bool),
    /// 32 bit integer
    Int(i32),
    /// 64 bit integer (`L` suffix)
    Long(i64),
    /// 32 bit float (`f` suffix)
    Float(f32),
    /// 64 bit float
    Double(f64),
    /// `null`
    Null,
}

impl Literal {
    fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Literal::Int(v) => *v as f64,
            Literal::Long(v) => *v as f64,
            Literal::Float(v) => *v as f64,
            Literal::Double(v) => *v,
            Literal::Char(c) => *c as u32 as f64,
            _ => return None,
        })
    }

    fn as_i64(&self) -> Option<i64> {
        Some(match self {
            Literal::Int(v) => *v as i64,
            Literal::Long(v) => *v,
            Literal::Char(c) => *c as u32 as i64,
            _ => return None,
        })
    }

    /// Numeric promotion rank (int < long < float < double)
    fn rank(&self) -> Option<u8> {
        match self {
            Literal::Char(_) | Literal::Int(_) => Some(0),
            Literal::Long(_) => Some(1),
            Literal::Float(_) => Some(2),
            Literal::Double(_) => Some(3),
            _ => None,
        }
    }
}

fn escape(c: char, quote: char, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    match c {
        '\n' => out.write_str("\\n"),
        '\r' => out.write_str("\\r"),
        '\t' => out.write_str("\\t"),
        '\\' => out.write_str("\\\\"),
        c if c == quote => write!(out, "\\{}", c),
        c => write!(out, "{}", c),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    escape(c, '"', f)?;
                }
                f.write_str("\"")
            }
            Literal::Char(c) => {
                f.write_str("'")?;
                escape(*c, '\'', f)?;
                f.write_str("'")
            }
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::Float(v) => write!(f, "{:?}f", v),
            Literal::Double(v) => write!(f, "{:?}", v),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// Binary operator of an n-ary expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Operator {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::Xor => "^",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    /// Parse a source symbol
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        Some(match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Rem,
            "&&" => Operator::And,
            "||" => Operator::Or,
            "&" => Operator::BitAnd,
            "|" => Operator::BitOr,
            "^" => Operator::Xor,
            "<<" => Operator::Shl,
            ">>" => Operator::Shr,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            _ => return None,
        })
    }

    /// Fold two constants. `None` if the combination is not a constant expression.
    pub fn apply(self, left: &Literal, right: &Literal) -> Option<Literal> {
        use Operator::*;
        match (self, left, right) {
            (Add, Literal::String(l), r) => return Some(Literal::String(format!("{}{}", l, plain(r)))),
            (Add, l, Literal::String(r)) => return Some(Literal::String(format!("{}{}", plain(l), r))),
            (And, Literal::Boolean(l), Literal::Boolean(r)) => return Some(Literal::Boolean(*l && *r)),
            (Or, Literal::Boolean(l), Literal::Boolean(r)) => return Some(Literal::Boolean(*l || *r)),
            (Eq, Literal::Boolean(l), Literal::Boolean(r)) => return Some(Literal::Boolean(l == r)),
            (Ne, Literal::Boolean(l), Literal::Boolean(r)) => return Some(Literal::Boolean(l != r)),
            _ => {}
        }
        let rank = left.rank()?.max(right.rank()?);
        if rank >= 2 {
            let (l, r) = (left.as_f64()?, right.as_f64()?);
            let compared = match self {
                Eq => Some(l == r),
                Ne => Some(l != r),
                Lt => Some(l < r),
                Le => Some(l <= r),
                Gt => Some(l > r),
                Ge => Some(l >= r),
                _ => None,
            };
            if let Some(result) = compared {
                return Some(Literal::Boolean(result));
            }
            let value = match self {
                Add => l + r,
                Sub => l - r,
                Mul => l * r,
                Div => l / r,
                Rem => l % r,
                _ => return None,
            };
            return Some(if rank == 2 {
                Literal::Float(value as f32)
            } else {
                Literal::Double(value)
            });
        }
        let (l, r) = (left.as_i64()?, right.as_i64()?);
        let value = match self {
            Eq => return Some(Literal::Boolean(l == r)),
            Ne => return Some(Literal::Boolean(l != r)),
            Lt => return Some(Literal::Boolean(l < r)),
            Le => return Some(Literal::Boolean(l <= r)),
            Gt => return Some(Literal::Boolean(l > r)),
            Ge => return Some(Literal::Boolean(l >= r)),
            Add => l.wrapping_add(r),
            Sub => l.wrapping_sub(r),
            Mul => l.wrapping_mul(r),
            Div => l.checked_div(r)?,
            Rem => l.checked_rem(r)?,
            BitAnd => l & r,
            BitOr => l | r,
            Xor => l ^ r,
            Shl => l.wrapping_shl(r as u32),
            Shr => l.wrapping_shr(r as u32),
            And | Or => return None,
        };
        Some(if rank == 1 {
            Literal::Long(value)
        } else {
            Literal::Int(value as i32)
        })
    }
}

/// Literal rendered the way string concatenation renders it
fn plain(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => s.clone(),
        Literal::Char(c) => c.to_string(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Int(v) => v.to_string(),
        Literal::Long(v) => v.to_string(),
        Literal::Float(v) => format!("{:?}", v),
        Literal::Double(v) => format!("{:?}", v),
        Literal::Null => "null".to_string(),
    }
}

/// Reference to a field of another type, resolved on first use
#[derive(Clone)]
pub struct FieldReference {
    /// Qualified name of the declaring type
    pub type_name: String,
    /// Field name
    pub field_name: String,
    /// `Some(true)` writes the qualified type, `Some(false)` the simple type,
    /// `None` omits the type
    pub qualification: Option<bool>,
    resolved: Rc<OnceCell<NodeId>>,
}

impl FieldReference {
    /// Create an unresolved reference
    pub fn new(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        qualification: Option<bool>,
    ) -> Self {
        FieldReference {
            type_name: type_name.into(),
            field_name: field_name.into(),
            qualification,
            resolved: Rc::new(OnceCell::new()),
        }
    }

    /// Cached target, if already resolved
    pub fn resolved(&self) -> Option<NodeId> {
        self.resolved.get().copied()
    }

    /// Same reference with an empty cache
    pub fn detached(&self) -> Self {
        Self::new(
            self.type_name.clone(),
            self.field_name.clone(),
            self.qualification,
        )
    }
}

impl fmt::Debug for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReference")
            .field("type_name", &self.type_name)
            .field("field_name", &self.field_name)
            .field("qualification", &self.qualification)
            .finish()
    }
}

impl PartialEq for FieldReference {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.field_name == other.field_name
            && self.qualification == other.qualification
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant
    Literal(Literal),
    /// Plain (possibly dotted) name
    Name(String),
    /// `Type.class`
    TypeLiteral(String),
    /// Static field of a type
    FieldReference(FieldReference),
    /// Operands joined by one operator
    NAry {
        /// Operator between every pair of operands
        operator: Operator,
        /// Operands, at least two
        operands: Vec<Expression>,
    },
    /// `{ a, b }`
    ArrayInit(Vec<Expression>),
}

impl Expression {
    /// String constant
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    /// Int constant
    pub fn int(value: i32) -> Self {
        Expression::Literal(Literal::Int(value))
    }

    /// Boolean constant
    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    /// The constant, if this is a literal
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Copy with field reference caches reset
    pub fn detached(&self) -> Self {
        match self {
            Expression::FieldReference(r) => Expression::FieldReference(r.detached()),
            Expression::NAry { operator, operands } => Expression::NAry {
                operator: *operator,
                operands: operands.iter().map(Expression::detached).collect(),
            },
            Expression::ArrayInit(items) => {
                Expression::ArrayInit(items.iter().map(Expression::detached).collect())
            }
            other => other.clone(),
        }
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Expression::Literal(literal)
    }
}

impl CodeModel {
    /// Evaluate an expression to a constant, if it is a constant expression
    pub fn evaluate(&mut self, expression: &Expression) -> CodeResult<Option<Literal>> {
        let mut visiting = FxHashSet::default();
        self.evaluate_guarded(expression, &mut visiting)
    }

    fn evaluate_guarded(
        &mut self,
        expression: &Expression,
        visiting: &mut FxHashSet<NodeId>,
    ) -> CodeResult<Option<Literal>> {
        match expression {
            Expression::Literal(literal) => Ok(Some(literal.clone())),
            Expression::NAry { operator, operands } => {
                let mut result: Option<Literal> = None;
                for operand in operands {
                    let Some(value) = self.evaluate_guarded(operand, visiting)? else {
                        return Ok(None);
                    };
                    result = match result {
                        None => Some(value),
                        Some(acc) => match operator.apply(&acc, &value) {
                            Some(folded) => Some(folded),
                            None => return Ok(None),
                        },
                    };
                }
                Ok(result)
            }
            Expression::FieldReference(reference) => {
                let Some(field) = self.resolve_field_reference(reference)? else {
                    return Ok(None);
                };
                if !visiting.insert(field) {
                    return Ok(None);
                }
                let result = self.evaluate_field(field, visiting);
                visiting.remove(&field);
                result
            }
            Expression::Name(_) | Expression::TypeLiteral(_) | Expression::ArrayInit(_) => Ok(None),
        }
    }

    fn evaluate_field(
        &mut self,
        field: NodeId,
        visiting: &mut FxHashSet<NodeId>,
    ) -> CodeResult<Option<Literal>> {
        self.initialize(field)?;
        let (is_static, initializer) = match &self.node(field).kind {
            NodeKind::Field(data) => (data.modifiers.is_static(), data.initializer.clone()),
            _ => return Ok(None),
        };
        if !is_static {
            return Ok(None);
        }
        if let Some(initializer) = initializer {
            return self.evaluate_guarded(&initializer, visiting);
        }
        if let Some(ReflectiveObject::Field(descriptor)) = &self.node(field).reflective {
            return Ok(descriptor.constant.clone());
        }
        Ok(None)
    }

    /// Resolve the target field of a reference, caching success
    pub fn resolve_field_reference(
        &mut self,
        reference: &FieldReference,
    ) -> CodeResult<Option<NodeId>> {
        if let Some(field) = reference.resolved() {
            return Ok(Some(field));
        }
        let field = match self.get_type(&reference.type_name)? {
            Some(ty) => self.field(ty, &reference.field_name)?,
            None => None,
        };
        match field {
            Some(field) => {
                let _ = reference.resolved.set(field);
            }
            None => self.report(Diagnostic::debug(
                DiagnosticCode::UnresolvedField,
                format!(
                    "Failed to resolve field {}.{}",
                    reference.type_name, reference.field_name
                ),
            )),
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::String("a\"b\n".into()).to_string(), "\"a\\\"b\\n\"");
        assert_eq!(Literal::Char('\'').to_string(), "'\\''");
        assert_eq!(Literal::Long(42).to_string(), "42L");
        assert_eq!(Literal::Float(1.5).to_string(), "1.5f");
        assert_eq!(Literal::Double(2.0).to_string(), "2.0");
        assert_eq!(Literal::Null.to_string(), "null");
    }

    #[test]
    fn test_operator_promotion() {
        assert_eq!(
            Operator::Add.apply(&Literal::Int(1), &Literal::Int(2)),
            Some(Literal::Int(3))
        );
        assert_eq!(
            Operator::Mul.apply(&Literal::Int(3), &Literal::Long(2)),
            Some(Literal::Long(6))
        );
        assert_eq!(
            Operator::Add.apply(&Literal::Int(1), &Literal::Double(0.5)),
            Some(Literal::Double(1.5))
        );
        assert_eq!(
            Operator::Add.apply(&Literal::String("v".into()), &Literal::Int(2)),
            Some(Literal::String("v2".into()))
        );
        assert_eq!(
            Operator::Lt.apply(&Literal::Int(1), &Literal::Int(2)),
            Some(Literal::Boolean(true))
        );
        assert_eq!(Operator::Div.apply(&Literal::Int(1), &Literal::Int(0)), None);
        assert_eq!(
            Operator::And.apply(&Literal::Int(1), &Literal::Boolean(true)),
            None
        );
    }

    #[test]
    fn test_field_reference_equality_ignores_cache() {
        let a = FieldReference::new("a.B", "C", Some(false));
        let b = a.detached();
        let _ = a.resolved.set(NodeId(3));
        assert_eq!(a, b);
        assert_eq!(a.resolved(), Some(NodeId(3)));
        assert_eq!(b.resolved(), None);

        let shared = a.clone();
        assert_eq!(shared.resolved(), Some(NodeId(3)));
    }

    #[test]
    fn test_field_reference_reports_only_failures() {
        use crate::diagnostics::{CollectingSink, DiagnosticCode};
        use crate::modifiers::{Modifier, Modifiers, Visibility};
        use crate::node::Layer;

        let sink = Rc::new(CollectingSink::new());
        let mut model = CodeModel::new().with_diagnostics(sink.clone());
        let package = model.get_or_create_package(Layer::Main, "a").unwrap();
        let file = model.create_file(package, "Limits").unwrap();
        let limits = model.add_type(file, "Limits").unwrap();
        let max = model.add_field(limits, "MAX").unwrap();
        model
            .set_modifiers(max, Modifiers::new(Visibility::Public, [Modifier::Static, Modifier::Final]))
            .unwrap();
        model.set_initializer(max, Some(Expression::int(10))).unwrap();

        let found = FieldReference::new("a.Limits", "MAX", Some(true));
        assert_eq!(model.resolve_field_reference(&found).unwrap(), Some(max));
        assert_eq!(found.resolved(), Some(max));
        assert_eq!(
            model.evaluate(&Expression::FieldReference(found)).unwrap(),
            Some(Literal::Int(10))
        );
        assert_eq!(sink.count(DiagnosticCode::UnresolvedField), 0);

        let missing = FieldReference::new("a.Limits", "MIN", Some(true));
        assert_eq!(model.resolve_field_reference(&missing).unwrap(), None);
        assert_eq!(missing.resolved(), None);
        assert_eq!(sink.count(DiagnosticCode::UnresolvedField), 1);
        let unknown = FieldReference::new("a.Missing", "MAX", Some(true));
        assert_eq!(model.evaluate(&Expression::FieldReference(unknown)).unwrap(), None);
        assert_eq!(sink.count(DiagnosticCode::UnresolvedField), 2);
    }

    #[test]
    fn test_evaluate_nary() {
        let mut model = CodeModel::new();
        let expression = Expression::NAry {
            operator: Operator::Add,
            operands: vec![Expression::int(1), Expression::int(2), Expression::int(3)],
        };
        assert_eq!(model.evaluate(&expression).unwrap(), Some(Literal::Int(6)));
        assert_eq!(
            model.evaluate(&Expression::Name("x".into())).unwrap(),
            None
        );
    }
}
