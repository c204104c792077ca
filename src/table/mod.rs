//! Table Store Module
//!
//! One file per table, self-describing and block-addressed.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (variable length)                                     │
//! │   Magic: "RSTB" (4) | Version: u16 (2) | ColumnCount: u16    │
//! │   Per column: NameLen u16 | Name | TypeTag u8 | Width u16    │
//! │               | VarWidth u8                                  │
//! │   RowCount: u64 | LastBlock: u64 | HeaderCRC: u32            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block 0 (1024 bytes): row slots + tail padding               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Block 1 (1024 bytes)                                         │
//! │ ...                                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! Because the header length varies with the schema, block offsets are
//! always `header_len + index * 1024`. Every block holds
//! `rows_per_block` fixed-size slots; no row ever spans two blocks.

mod file;
mod header;
mod scan;

pub use file::Table;
pub use header::TableHeader;
pub use scan::Scan;

use std::fmt;

// =============================================================================
// Shared Constants (used by header, file, scan)
// =============================================================================

/// Magic bytes identifying a rowstore table file
pub(crate) const MAGIC: &[u8; 4] = b"RSTB";

/// Current table file format version
pub(crate) const FORMAT_VERSION: u16 = 1;

// =============================================================================
// Row Location
// =============================================================================

/// Identifies a row's storage position: (block index, slot index)
///
/// Locations are stable across inserts and deletes but are invalidated
/// by compaction, which moves rows to close the gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowLocation {
    /// Zero-based block index within the table file
    pub block: u64,
    /// Zero-based slot index within the block
    pub slot: u32,
}

impl RowLocation {
    pub fn new(block: u64, slot: u32) -> Self {
        Self { block, slot }
    }
}

impl fmt::Display for RowLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block, self.slot)
    }
}
