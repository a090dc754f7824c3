//! Logical type system for JetSQL

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical type descriptor used by the query engine.
///
/// Nullability is tracked separately (per column / per argument), not inside
/// the type itself, so signature matching stays purely structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Str,
    Date,
    Timestamp,

    /// Homogeneous list with embedded size metadata.
    List(Box<LogicalType>),
    /// Forward iterator over elements, used for windowed/aggregate inputs.
    Iterator(Box<LogicalType>),
}

impl LogicalType {
    pub fn list_of(elem: LogicalType) -> Self {
        LogicalType::List(Box::new(elem))
    }

    pub fn iterator_of(elem: LogicalType) -> Self {
        LogicalType::Iterator(Box::new(elem))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, LogicalType::List(_))
    }

    pub fn is_iterator(&self) -> bool {
        matches!(self, LogicalType::Iterator(_))
    }

    /// Element type for list/iterator types.
    pub fn element(&self) -> Option<&LogicalType> {
        match self {
            LogicalType::List(elem) | LogicalType::Iterator(elem) => Some(elem),
            _ => None,
        }
    }

    /// Short name used when deriving per-type native symbol names
    /// (e.g. `abs` expands to `abs_i32`, `abs_double`, ...).
    pub fn suffix(&self) -> String {
        match self {
            LogicalType::Bool => "bool".to_string(),
            LogicalType::Int16 => "i16".to_string(),
            LogicalType::Int32 => "i32".to_string(),
            LogicalType::Int64 => "i64".to_string(),
            LogicalType::Float => "float".to_string(),
            LogicalType::Double => "double".to_string(),
            LogicalType::Str => "string".to_string(),
            LogicalType::Date => "date".to_string(),
            LogicalType::Timestamp => "timestamp".to_string(),
            LogicalType::List(elem) => format!("list_{}", elem.suffix()),
            LogicalType::Iterator(elem) => format!("iter_{}", elem.suffix()),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Bool => write!(f, "bool"),
            LogicalType::Int16 => write!(f, "int16"),
            LogicalType::Int32 => write!(f, "int32"),
            LogicalType::Int64 => write!(f, "int64"),
            LogicalType::Float => write!(f, "float"),
            LogicalType::Double => write!(f, "double"),
            LogicalType::Str => write!(f, "string"),
            LogicalType::Date => write!(f, "date"),
            LogicalType::Timestamp => write!(f, "timestamp"),
            LogicalType::List(elem) => write!(f, "list<{}>", elem),
            LogicalType::Iterator(elem) => write!(f, "iterator<{}>", elem),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown logical type: {0}")]
pub struct TypeParseError(pub String);

impl FromStr for LogicalType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("list<").and_then(|r| r.strip_suffix('>')) {
            return Ok(LogicalType::list_of(inner.parse()?));
        }
        if let Some(inner) = s.strip_prefix("iterator<").and_then(|r| r.strip_suffix('>')) {
            return Ok(LogicalType::iterator_of(inner.parse()?));
        }
        match s {
            "bool" => Ok(LogicalType::Bool),
            "int16" | "smallint" => Ok(LogicalType::Int16),
            "int32" | "int" => Ok(LogicalType::Int32),
            "int64" | "bigint" => Ok(LogicalType::Int64),
            "float" => Ok(LogicalType::Float),
            "double" => Ok(LogicalType::Double),
            "string" | "varchar" => Ok(LogicalType::Str),
            "date" => Ok(LogicalType::Date),
            "timestamp" => Ok(LogicalType::Timestamp),
            other => Err(TypeParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for LogicalType {
    type Error = TypeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LogicalType> for String {
    fn from(ty: LogicalType) -> String {
        ty.to_string()
    }
}

/// Render an argument-type list the way diagnostics expect: `int32, string`.
pub fn display_types(types: &[LogicalType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_round_trip() {
        let types = vec![
            LogicalType::Bool,
            LogicalType::Int16,
            LogicalType::Int32,
            LogicalType::Int64,
            LogicalType::Float,
            LogicalType::Double,
            LogicalType::Str,
            LogicalType::Date,
            LogicalType::Timestamp,
            LogicalType::list_of(LogicalType::Double),
            LogicalType::iterator_of(LogicalType::list_of(LogicalType::Int32)),
        ];

        for ty in types {
            let rendered = ty.to_string();
            let parsed: LogicalType = rendered.parse().unwrap();
            assert_eq!(parsed, ty, "round trip failed for {rendered}");
        }
    }

    #[test]
    fn test_parse_sql_names() {
        assert_eq!("int".parse::<LogicalType>().unwrap(), LogicalType::Int32);
        assert_eq!("bigint".parse::<LogicalType>().unwrap(), LogicalType::Int64);
        assert_eq!("varchar".parse::<LogicalType>().unwrap(), LogicalType::Str);
        assert!("list<int32".parse::<LogicalType>().is_err());
        assert!("decimal".parse::<LogicalType>().is_err());
    }

    #[test]
    fn test_element_access() {
        let list = LogicalType::list_of(LogicalType::Int32);
        assert!(list.is_list());
        assert_eq!(list.element(), Some(&LogicalType::Int32));
        assert_eq!(LogicalType::Bool.element(), None);
    }

    #[test]
    fn test_suffix_for_symbol_names() {
        assert_eq!(LogicalType::Int32.suffix(), "i32");
        assert_eq!(LogicalType::list_of(LogicalType::Double).suffix(), "list_double");
    }
}
