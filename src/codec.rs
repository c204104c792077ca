//! Row Codec
//!
//! Bidirectional mapping between a logical row and its fixed-width byte
//! encoding, driven by a Schema Descriptor.
//!
//! ## Slot Format
//! ```text
//! ┌──────────────┬──────────────────┬──────────────────┬─────┐
//! │ flag (1)     │ column 1         │ column 2         │ ... │
//! └──────────────┴──────────────────┴──────────────────┴─────┘
//! ```
//! Fixed-width columns are raw little-endian values (INT/FLOAT) or
//! NUL-padded buffers (CHAR). Variable-width columns are
//! `[len: u16 LE][value bytes][zero padding to max width]`.
//!
//! The encoded size is constant per schema: varchar columns always occupy
//! their declared maximum width, so slot offsets are pure arithmetic.
//! Strings longer than a column's declared width are truncated silently
//! (on a UTF-8 character boundary); callers validate beforehand when
//! truncation must be avoided.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, StoreError};
use crate::schema::{ColumnType, Row, Schema, Value};

/// Flag byte for a slot that has never been written
pub const FLAG_EMPTY: u8 = 0x00;

/// Flag byte for a live row
pub const FLAG_LIVE: u8 = b'A';

/// Flag byte for a logically deleted row
pub const FLAG_DELETED: u8 = b'D';

/// Encode a row into its fixed-width slot representation
///
/// The output is exactly `schema.row_size()` bytes, starting with a live
/// flag. Fails with SchemaMismatch if the row's arity or value types do
/// not match the schema.
pub fn encode_row(schema: &Schema, row: &Row) -> Result<BytesMut> {
    schema.validate_row(row)?;

    let mut buf = BytesMut::with_capacity(schema.row_size());
    buf.put_u8(FLAG_LIVE);

    for (column, value) in schema.columns().iter().zip(row.iter()) {
        match (&column.ty, value) {
            (ColumnType::Int, Value::Int(v)) => buf.put_i32_le(*v),
            (ColumnType::Float, Value::Float(v)) => buf.put_f32_le(*v),
            (ColumnType::Char(len), Value::Char(s)) => {
                let bytes = truncate_utf8(s, *len as usize);
                buf.put_slice(bytes);
                buf.put_bytes(0, *len as usize - bytes.len());
            }
            (ColumnType::Varchar(max), Value::Varchar(s)) => {
                let bytes = truncate_utf8(s, *max as usize);
                buf.put_u16_le(bytes.len() as u16);
                buf.put_slice(bytes);
                buf.put_bytes(0, *max as usize - bytes.len());
            }
            // validate_row already rejected everything else
            _ => unreachable!("validated row diverged from schema"),
        }
    }

    debug_assert_eq!(buf.len(), schema.row_size());
    Ok(buf)
}

/// Decode one slot back into a row and its deleted state
///
/// `bytes` must hold at least `schema.row_size()` bytes. Varchar values
/// are read up to their stored length only, never into the padding.
pub fn decode_row(schema: &Schema, bytes: &[u8]) -> Result<(Row, bool)> {
    if bytes.len() < schema.row_size() {
        return Err(StoreError::CorruptFile(format!(
            "slot buffer of {} bytes shorter than row size {}",
            bytes.len(),
            schema.row_size()
        )));
    }

    let mut buf = &bytes[..schema.row_size()];
    let deleted = buf.get_u8() != FLAG_LIVE;

    let mut row = Row::with_capacity(schema.column_count());
    for column in schema.columns() {
        let value = match &column.ty {
            ColumnType::Int => Value::Int(buf.get_i32_le()),
            ColumnType::Float => Value::Float(buf.get_f32_le()),
            ColumnType::Char(len) => {
                let raw = &buf[..*len as usize];
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                let s = std::str::from_utf8(&raw[..end])
                    .map_err(|_| {
                        StoreError::CorruptFile(format!(
                            "column '{}' holds invalid UTF-8",
                            column.name
                        ))
                    })?
                    .to_string();
                buf.advance(*len as usize);
                Value::Char(s)
            }
            ColumnType::Varchar(max) => {
                let stored_len = buf.get_u16_le() as usize;
                if stored_len > *max as usize {
                    return Err(StoreError::CorruptFile(format!(
                        "column '{}' stored length {} exceeds max width {}",
                        column.name, stored_len, max
                    )));
                }
                let s = std::str::from_utf8(&buf[..stored_len])
                    .map_err(|_| {
                        StoreError::CorruptFile(format!(
                            "column '{}' holds invalid UTF-8",
                            column.name
                        ))
                    })?
                    .to_string();
                buf.advance(*max as usize);
                Value::Varchar(s)
            }
        };
        row.push(value);
    }

    Ok((row, deleted))
}

/// Byte offset of a slot within its block
pub fn slot_offset(schema: &Schema, slot: usize) -> usize {
    slot * schema.row_size()
}

/// Byte range of a slot within its block
pub fn slot_range(schema: &Schema, slot: usize) -> std::ops::Range<usize> {
    let start = slot_offset(schema, slot);
    start..start + schema.row_size()
}

/// Truncate a string to at most `max` bytes on a character boundary
fn truncate_utf8(s: &str, max: usize) -> &[u8] {
    if s.len() <= max {
        return s.as_bytes();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn student_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Varchar(10)),
            Column::new("gpa", ColumnType::Float),
        ])
        .unwrap()
    }

    #[test]
    fn round_trip_preserves_values() {
        let schema = student_schema();
        let row = vec![
            Value::Int(123),
            Value::Varchar("Budi".to_string()),
            Value::Float(3.5),
        ];
        let encoded = encode_row(&schema, &row).unwrap();
        let (decoded, deleted) = decode_row(&schema, &encoded).unwrap();
        assert_eq!(decoded, row);
        assert!(!deleted);
    }

    #[test]
    fn encoded_size_ignores_varchar_content() {
        let schema = student_schema();
        let short = encode_row(
            &schema,
            &vec![Value::Int(1), Value::Varchar("a".into()), Value::Float(0.0)],
        )
        .unwrap();
        let long = encode_row(
            &schema,
            &vec![
                Value::Int(1),
                Value::Varchar("abcdefghij".into()),
                Value::Float(0.0),
            ],
        )
        .unwrap();
        assert_eq!(short.len(), schema.row_size());
        assert_eq!(long.len(), schema.row_size());
    }

    #[test]
    fn varchar_truncated_to_max_width() {
        let schema = student_schema();
        let row = vec![
            Value::Int(1),
            Value::Varchar("exactly ten plus more".to_string()),
            Value::Float(0.0),
        ];
        let encoded = encode_row(&schema, &row).unwrap();

        // Stored length prefix reflects the truncated length
        let name_offset = 1 + 4;
        let stored_len =
            u16::from_le_bytes([encoded[name_offset], encoded[name_offset + 1]]) as usize;
        assert_eq!(stored_len, 10);

        let (decoded, _) = decode_row(&schema, &encoded).unwrap();
        assert_eq!(decoded[1], Value::Varchar("exactly te".to_string()));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let schema = Schema::new(vec![Column::new("s", ColumnType::Varchar(5))]).unwrap();
        // 'é' is 2 bytes; a 5-byte cut would split the third 'é'
        let row = vec![Value::Varchar("ééé".to_string())];
        let encoded = encode_row(&schema, &row).unwrap();
        let (decoded, _) = decode_row(&schema, &encoded).unwrap();
        assert_eq!(decoded[0], Value::Varchar("éé".to_string()));
    }

    #[test]
    fn char_padding_stripped_on_decode() {
        let schema = Schema::new(vec![Column::new("code", ColumnType::Char(8))]).unwrap();
        let row = vec![Value::Char("ab12".to_string())];
        let encoded = encode_row(&schema, &row).unwrap();
        assert_eq!(encoded.len(), 1 + 8);
        let (decoded, _) = decode_row(&schema, &encoded).unwrap();
        assert_eq!(decoded[0], Value::Char("ab12".to_string()));
    }

    #[test]
    fn type_mismatch_is_schema_error() {
        let schema = student_schema();
        let row = vec![
            Value::Varchar("123".to_string()),
            Value::Varchar("Budi".to_string()),
            Value::Float(3.5),
        ];
        assert!(matches!(
            encode_row(&schema, &row).unwrap_err(),
            StoreError::SchemaMismatch(_)
        ));
    }

    #[test]
    fn corrupt_varchar_length_detected() {
        let schema = Schema::new(vec![Column::new("s", ColumnType::Varchar(4))]).unwrap();
        let mut encoded = encode_row(&schema, &vec![Value::Varchar("ab".into())])
            .unwrap()
            .to_vec();
        // Stored length larger than the declared max
        encoded[1] = 200;
        assert!(matches!(
            decode_row(&schema, &encoded).unwrap_err(),
            StoreError::CorruptFile(_)
        ));
    }

    #[test]
    fn deleted_flag_round_trips() {
        let schema = student_schema();
        let mut encoded = encode_row(
            &schema,
            &vec![Value::Int(1), Value::Varchar("x".into()), Value::Float(0.0)],
        )
        .unwrap();
        encoded[0] = FLAG_DELETED;
        let (_, deleted) = decode_row(&schema, &encoded).unwrap();
        assert!(deleted);
    }
}
