//! Schema Descriptor Module
//!
//! Immutable description of a table's columns, supplied by the catalog and
//! persisted in the table file header. The codec uses it to compute the
//! fixed row size and per-column field offsets; it is never mutated for the
//! lifetime of an open table handle.

mod value;

pub use value::{Row, Value};

use serde::{Deserialize, Serialize};

use crate::block::BLOCK_SIZE;
use crate::error::{Result, StoreError};

/// Width of the length prefix stored before each varchar value (u16 LE)
pub const VARCHAR_PREFIX_WIDTH: usize = 2;

/// Width of the per-row deleted-flag byte
pub const ROW_FLAG_WIDTH: usize = 1;

/// Column data types
///
/// Widths are fixed per type: INT and FLOAT are 4-byte little-endian,
/// CHAR(n) is a raw n-byte buffer, VARCHAR(n) is a 2-byte length prefix
/// followed by an n-byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// 32-bit signed integer, little-endian
    Int,

    /// 32-bit IEEE 754 float, little-endian
    Float,

    /// Fixed-width character string, NUL-padded
    Char(u16),

    /// Variable-width character string with declared maximum width
    Varchar(u16),
}

impl ColumnType {
    /// Maximum value width in bytes (excluding any length prefix)
    pub fn width(&self) -> usize {
        match self {
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Char(len) => *len as usize,
            ColumnType::Varchar(max) => *max as usize,
        }
    }

    /// Whether values of this type carry a length prefix
    pub fn is_variable_width(&self) -> bool {
        matches!(self, ColumnType::Varchar(_))
    }

    /// Total bytes this type occupies in an encoded row
    pub fn encoded_width(&self) -> usize {
        if self.is_variable_width() {
            VARCHAR_PREFIX_WIDTH + self.width()
        } else {
            self.width()
        }
    }

    /// One-byte tag used in the table file header
    pub fn tag(&self) -> u8 {
        match self {
            ColumnType::Int => 0,
            ColumnType::Float => 1,
            ColumnType::Char(_) => 2,
            ColumnType::Varchar(_) => 3,
        }
    }

    /// Reconstruct a type from its header tag and width
    pub fn from_tag(tag: u8, width: u16) -> Result<Self> {
        match tag {
            0 => Ok(ColumnType::Int),
            1 => Ok(ColumnType::Float),
            2 => Ok(ColumnType::Char(width)),
            3 => Ok(ColumnType::Varchar(width)),
            _ => Err(StoreError::CorruptFile(format!(
                "unknown column type tag: {}",
                tag
            ))),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int => write!(f, "INT"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Char(len) => write!(f, "CHAR({})", len),
            ColumnType::Varchar(max) => write!(f, "VARCHAR({})", max),
        }
    }
}

/// A single named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered column metadata for one table
///
/// Row layout is derived entirely from this: encoded row size is
/// 1 flag byte + the sum of each column's encoded width, so the size is
/// constant for a given schema regardless of actual varchar content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from an ordered column list
    ///
    /// Fails if the column list is empty or if one encoded row would not
    /// fit inside a single block (rows never span block boundaries).
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(StoreError::SchemaMismatch(
                "schema must have at least one column".to_string(),
            ));
        }
        let schema = Self { columns };
        if schema.row_size() > BLOCK_SIZE {
            return Err(StoreError::SchemaMismatch(format!(
                "row size {} exceeds block size {}",
                schema.row_size(),
                BLOCK_SIZE
            )));
        }
        Ok(schema)
    }

    /// Ordered columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Encoded size of one row slot in bytes:
    /// 1 (deleted flag) + Σ encoded column widths
    pub fn row_size(&self) -> usize {
        ROW_FLAG_WIDTH
            + self
                .columns
                .iter()
                .map(|c| c.ty.encoded_width())
                .sum::<usize>()
    }

    /// Number of row slots per block (integer division; the remainder of
    /// each block is unused padding)
    pub fn rows_per_block(&self) -> usize {
        BLOCK_SIZE / self.row_size()
    }

    /// Check that a row's arity and value types match this schema
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(StoreError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row.iter()) {
            if !value.matches(&column.ty) {
                return Err(StoreError::SchemaMismatch(format!(
                    "column '{}' expects {}, got {}",
                    column.name,
                    column.ty,
                    value.type_name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Varchar(10)),
            Column::new("gpa", ColumnType::Float),
        ])
        .unwrap()
    }

    #[test]
    fn row_size_counts_flag_and_varchar_prefix() {
        // 1 flag + 4 int + (2 prefix + 10 max) + 4 float = 21
        assert_eq!(student_schema().row_size(), 21);
    }

    #[test]
    fn rows_per_block_is_integer_division() {
        assert_eq!(student_schema().rows_per_block(), 1024 / 21);
    }

    #[test]
    fn empty_schema_rejected() {
        assert!(matches!(
            Schema::new(vec![]),
            Err(StoreError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn oversized_row_rejected() {
        let result = Schema::new(vec![
            Column::new("a", ColumnType::Char(600)),
            Column::new("b", ColumnType::Char(600)),
        ]);
        assert!(matches!(result, Err(StoreError::SchemaMismatch(_))));
    }

    #[test]
    fn validate_row_checks_arity_and_types() {
        let schema = student_schema();
        assert!(schema
            .validate_row(&vec![
                Value::Int(1),
                Value::Varchar("a".to_string()),
                Value::Float(1.0),
            ])
            .is_ok());
        assert!(schema.validate_row(&vec![Value::Int(1)]).is_err());
        assert!(schema
            .validate_row(&vec![
                Value::Float(1.0),
                Value::Varchar("a".to_string()),
                Value::Float(1.0),
            ])
            .is_err());
    }
}
