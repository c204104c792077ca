//! Table file header
//!
//! Variable-length region at the start of every table file carrying the
//! schema plus the row count and last-block cursor. The header must be
//! read before any block access, since block offsets depend on its
//! length. A trailing CRC32 catches torn or hand-edited headers.

use std::io::Read;

use bytes::{Buf, BufMut};

use crate::error::{Result, StoreError};
use crate::schema::{Column, ColumnType, Schema};

use super::{FORMAT_VERSION, MAGIC};

/// Decoded table file header
#[derive(Debug, Clone)]
pub struct TableHeader {
    pub schema: Schema,
    /// Number of live (not deleted) rows
    pub row_count: u64,
    /// Index of the block currently receiving inserts (0 when empty)
    pub last_block: u64,
}

impl TableHeader {
    /// Header for a freshly created, empty table
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            row_count: 0,
            last_block: 0,
        }
    }

    /// Encoded header length in bytes for a given schema
    ///
    /// Fixed part: magic (4) + version (2) + column count (2)
    /// + row count (8) + last block (8) + crc (4) = 28.
    /// Per column: name len (2) + name + tag (1) + width (2) + flag (1).
    pub fn encoded_len(schema: &Schema) -> u64 {
        let columns: u64 = schema
            .columns()
            .iter()
            .map(|c| 6 + c.name.len() as u64)
            .sum();
        28 + columns
    }

    /// Encode the full header, including the trailing CRC32
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.encode_body();
        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);
        debug_assert_eq!(buf.len() as u64, Self::encoded_len(&self.schema));
        buf
    }

    /// Everything before the CRC, in canonical order
    fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(&self.schema) as usize);
        buf.put_slice(MAGIC);
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u16_le(self.schema.column_count() as u16);
        for column in self.schema.columns() {
            buf.put_u16_le(column.name.len() as u16);
            buf.put_slice(column.name.as_bytes());
            buf.put_u8(column.ty.tag());
            buf.put_u16_le(column.ty.width() as u16);
            buf.put_u8(column.ty.is_variable_width() as u8);
        }
        buf.put_u64_le(self.row_count);
        buf.put_u64_le(self.last_block);
        buf
    }

    /// Read and validate a header from the start of a table file
    ///
    /// Any short read, bad magic, unsupported version, undecodable
    /// column, or CRC mismatch yields CorruptFile.
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut prefix = [0u8; 8];
        read_header_bytes(reader, &mut prefix)?;

        if &prefix[0..4] != MAGIC {
            return Err(StoreError::CorruptFile(format!(
                "invalid magic: expected RSTB, got {:?}",
                &prefix[0..4]
            )));
        }
        let version = u16::from_le_bytes([prefix[4], prefix[5]]);
        if version != FORMAT_VERSION {
            return Err(StoreError::CorruptFile(format!(
                "unsupported table file version: {}",
                version
            )));
        }
        let column_count = u16::from_le_bytes([prefix[6], prefix[7]]);

        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let mut name_len = [0u8; 2];
            read_header_bytes(reader, &mut name_len)?;
            let name_len = u16::from_le_bytes(name_len) as usize;

            let mut name = vec![0u8; name_len];
            read_header_bytes(reader, &mut name)?;
            let name = String::from_utf8(name).map_err(|_| {
                StoreError::CorruptFile("column name is not valid UTF-8".to_string())
            })?;

            let mut meta = [0u8; 4];
            read_header_bytes(reader, &mut meta)?;
            let tag = meta[0];
            let width = u16::from_le_bytes([meta[1], meta[2]]);
            let ty = ColumnType::from_tag(tag, width)?;
            if (meta[3] != 0) != ty.is_variable_width() {
                return Err(StoreError::CorruptFile(format!(
                    "column '{}' variable-width flag disagrees with type tag",
                    name
                )));
            }

            columns.push(Column::new(name, ty));
        }

        let mut tail = [0u8; 20];
        read_header_bytes(reader, &mut tail)?;
        let mut tail_buf = &tail[..];
        let row_count = tail_buf.get_u64_le();
        let last_block = tail_buf.get_u64_le();
        let stored_crc = tail_buf.get_u32_le();

        let schema = Schema::new(columns)
            .map_err(|e| StoreError::CorruptFile(format!("invalid stored schema: {}", e)))?;

        let header = Self {
            schema,
            row_count,
            last_block,
        };

        // The encoding is canonical, so re-encoding the parsed fields
        // reproduces the exact bytes the CRC was computed over.
        let actual_crc = crc32fast::hash(&header.encode_body());
        if actual_crc != stored_crc {
            return Err(StoreError::CorruptFile(format!(
                "header CRC mismatch: stored {:08x}, computed {:08x}",
                stored_crc, actual_crc
            )));
        }

        Ok(header)
    }
}

/// read_exact with truncation reported as corruption, not plain IO
fn read_header_bytes(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            StoreError::CorruptFile("truncated header".to_string())
        } else {
            StoreError::Io(e)
        }
    })
}
