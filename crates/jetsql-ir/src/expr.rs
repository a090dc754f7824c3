//! Expression nodes consumed and produced by the UDF library.
//!
//! These are the nodes the expression rewriter works on. The parser and the
//! full AST live outside this crate; rewritten subtrees built here are
//! spliced back by the rewriter.

use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value. Also used as the initial accumulator of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Literal {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Literal {
    /// Logical type of the literal, if it has one (`Null` does not).
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Literal::Null => None,
            Literal::Bool(_) => Some(LogicalType::Bool),
            Literal::Int16(_) => Some(LogicalType::Int16),
            Literal::Int32(_) => Some(LogicalType::Int32),
            Literal::Int64(_) => Some(LogicalType::Int64),
            Literal::Float(_) => Some(LogicalType::Float),
            Literal::Double(_) => Some(LogicalType::Double),
            Literal::Str(_) => Some(LogicalType::Str),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Literal { value: Literal },
    Column { name: String },
    /// Call bound to a canonical function name. The name has already been
    /// resolved through the library's alias map, so re-resolving it against
    /// a frozen library yields the same registry entry.
    Call { func: String, args: Vec<Expr> },
    BinaryOp { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    UnaryOp { op: UnOp, expr: Box<Expr> },
    Cast { expr: Box<Expr>, to: LogicalType },
}

impl Expr {
    pub fn literal(value: Literal) -> Self {
        Expr::Literal { value }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call { func: func.into(), args }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn cast(expr: Expr, to: LogicalType) -> Self {
        Expr::Cast { expr: Box::new(expr), to }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => write!(f, "{value:?}"),
            Expr::Column { name } => write!(f, "{name}"),
            Expr::Call { func, args } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::BinaryOp { op, left, right } => write!(f, "({left} {op:?} {right})"),
            Expr::UnaryOp { op, expr } => write!(f, "{op:?}({expr})"),
            Expr::Cast { expr, to } => write!(f, "cast({expr} as {to})"),
        }
    }
}

/// An expression paired with its inferred logical type.
///
/// Type inference happens before the UDF library is consulted; resolution
/// only reads the types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedExpr {
    pub expr: Expr,
    pub ty: LogicalType,
}

impl TypedExpr {
    pub fn new(expr: Expr, ty: LogicalType) -> Self {
        Self { expr, ty }
    }
}

/// Collect the types of a typed argument list.
pub fn arg_types(args: &[TypedExpr]) -> Vec<LogicalType> {
    args.iter().map(|a| a.ty.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_display() {
        let e = Expr::call(
            "substr",
            vec![Expr::Column { name: "name".to_string() }, Expr::literal(Literal::Int32(2))],
        );
        assert_eq!(e.to_string(), "substr(name, Int32(2))");
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(Literal::Int64(1).logical_type(), Some(LogicalType::Int64));
        assert_eq!(Literal::Null.logical_type(), None);
    }

    #[test]
    fn test_json_round_trip() {
        let e = Expr::binary(
            BinOp::Add,
            Expr::Column { name: "a".to_string() },
            Expr::literal(Literal::Double(1.5)),
        );
        let json = serde_json::to_string(&e).unwrap();
        let parsed: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, e);
    }
}
