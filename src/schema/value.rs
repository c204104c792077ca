//! Column values and logical rows.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ColumnType;

/// A logical row: ordered column values matching a schema
pub type Row = Vec<Value>;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Float(f32),
    Char(String),
    Varchar(String),
}

impl Value {
    /// Whether this value is storable in a column of the given type
    pub fn matches(&self, ty: &ColumnType) -> bool {
        matches!(
            (self, ty),
            (Value::Int(_), ColumnType::Int)
                | (Value::Float(_), ColumnType::Float)
                | (Value::Char(_), ColumnType::Char(_))
                | (Value::Varchar(_), ColumnType::Varchar(_))
        )
    }

    /// Human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Char(_) => "CHAR",
            Value::Varchar(_) => "VARCHAR",
        }
    }

    /// String content, for CHAR/VARCHAR values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Char(s) | Value::Varchar(s) => Some(s),
            _ => None,
        }
    }
}

/// Cross-type comparisons yield None, which condition evaluation treats
/// as "does not match". CHAR and VARCHAR contents compare with each other.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f32).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f32)),
            (Value::Char(a) | Value::Varchar(a), Value::Char(b) | Value::Varchar(b)) => {
                a.partial_cmp(b)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Char(s) | Value::Varchar(s) => write!(f, "{}", s),
        }
    }
}
