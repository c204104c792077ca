//! Open table handle
//!
//! The only component that mutates a table file. Sequences the block
//! layer and the row codec to implement insert/scan/delete/update/compact.
//!
//! ## Write Cursor
//! Inserts fill the last block slot by slot and allocate a new block when
//! it is full; space freed by deletes is never reused until `compact`.
//! The slot occupancy of the last block is process-local state: it is
//! rederived on open by scanning the block's flag bytes, since no
//! free-space map is persisted.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::block::{BlockFile, BLOCK_SIZE};
use crate::codec::{self, FLAG_DELETED, FLAG_EMPTY, FLAG_LIVE};
use crate::error::{Result, StoreError};
use crate::schema::{Row, Schema};

use super::header::TableHeader;
use super::scan::Scan;
use super::RowLocation;

/// An open table: exclusive owner of the underlying file handle and the
/// in-memory header/write-cursor state. Dropping or closing the handle
/// releases the file; reopening rebuilds the cursor from disk.
#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    header: TableHeader,
    blocks: BlockFile,
    /// Occupied slots (live or deleted) in the last block
    rows_in_last_block: u32,
    /// fsync after every mutation
    sync_writes: bool,
}

impl Table {
    /// Create a new, empty table file with the given schema
    ///
    /// Fails if the file already exists.
    pub fn create(path: &Path, schema: Schema) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;

        let header = TableHeader::new(schema);
        let header_len = TableHeader::encoded_len(&header.schema);

        use std::io::Write;
        file.write_all(&header.encode())?;
        file.sync_all()?;

        debug!(path = %path.display(), header_len, "created table file");

        Ok(Self {
            path: path.to_path_buf(),
            header,
            blocks: BlockFile::new(file, header_len),
            rows_in_last_block: 0,
            sync_writes: true,
        })
    }

    /// Open an existing table file
    ///
    /// Reads and validates the header, checks that the data region is an
    /// exact multiple of the block size, and rederives the last block's
    /// slot occupancy by scanning its flag bytes.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let header = TableHeader::read_from(&mut file)?;
        let header_len = TableHeader::encoded_len(&header.schema);
        let mut blocks = BlockFile::new(file, header_len);

        let block_count = blocks.block_count()?;
        if block_count > 0 && header.last_block != block_count - 1 {
            return Err(StoreError::CorruptFile(format!(
                "header last block {} disagrees with block count {}",
                header.last_block, block_count
            )));
        }

        let rows_in_last_block = if block_count == 0 {
            0
        } else {
            Self::scan_occupancy(&mut blocks, &header.schema, header.last_block)?
        };

        debug!(
            path = %path.display(),
            block_count,
            rows_in_last_block,
            row_count = header.row_count,
            "opened table file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            blocks,
            rows_in_last_block,
            sync_writes: true,
        })
    }

    /// Enable or disable fsync-per-mutation
    pub fn set_sync_writes(&mut self, sync: bool) {
        self.sync_writes = sync;
    }

    // =========================================================================
    // Logical Operations
    // =========================================================================

    /// Insert a row, returning its final location
    ///
    /// Never fails for lack of space: when the last block is full (or the
    /// table is empty) a fresh block is allocated at end-of-file. The
    /// remainder of a full block stays as padding; rows never span blocks.
    pub fn insert(&mut self, row: &Row) -> Result<RowLocation> {
        let encoded = codec::encode_row(&self.header.schema, row)?;
        let rows_per_block = self.header.schema.rows_per_block() as u32;
        let block_count = self.blocks.block_count()?;

        let location = if block_count == 0 || self.rows_in_last_block >= rows_per_block {
            // Allocate: zero-filled block with the row in slot 0
            let index = block_count;
            let mut block = [0u8; BLOCK_SIZE];
            block[..encoded.len()].copy_from_slice(&encoded);
            self.blocks.write_block(index, &block)?;
            self.header.last_block = index;
            self.rows_in_last_block = 1;
            debug!(block = index, "allocated new block");
            RowLocation::new(index, 0)
        } else {
            let slot = self.rows_in_last_block;
            let offset = codec::slot_offset(&self.header.schema, slot as usize);
            self.blocks
                .write_at(self.header.last_block, offset, &encoded)?;
            self.rows_in_last_block += 1;
            RowLocation::new(self.header.last_block, slot)
        };

        self.header.row_count += 1;
        self.write_header()?;
        self.maybe_sync()?;
        Ok(location)
    }

    /// Iterate all live rows, in storage order
    ///
    /// Each call starts a fresh, restartable pass over blocks 0..=last.
    /// Deleted and never-written slots are skipped. The pass reflects
    /// on-disk state at the time each block is read, not a snapshot.
    pub fn scan(&mut self) -> Result<Scan<'_>> {
        Scan::new(self, None)
    }

    /// Iterate live rows that satisfy an opaque caller-supplied predicate
    ///
    /// Predicate semantics (WHERE-clause evaluation) belong to the query
    /// processor; the storage layer only applies the callback.
    pub fn scan_filter<'a, P>(&'a mut self, predicate: P) -> Result<Scan<'a>>
    where
        P: Fn(&Row) -> bool + 'a,
    {
        Scan::new(self, Some(Box::new(predicate)))
    }

    /// Logically delete the row at `location`
    ///
    /// Flips the slot's flag byte in place; the slot keeps its bytes and
    /// is not reused until `compact`. Fails with OutOfRange if the
    /// location does not name an occupied slot.
    pub fn delete(&mut self, location: RowLocation) -> Result<()> {
        let flag = self.slot_flag(location)?;
        if flag == FLAG_EMPTY {
            return Err(StoreError::OutOfRange(format!(
                "no row at location {}",
                location
            )));
        }

        let offset = codec::slot_offset(&self.header.schema, location.slot as usize);
        self.blocks
            .write_at(location.block, offset, &[FLAG_DELETED])?;

        if flag == FLAG_LIVE {
            self.header.row_count -= 1;
            self.write_header()?;
        }
        self.maybe_sync()?;
        Ok(())
    }

    /// Rewrite the live row at `location` in place
    ///
    /// The encoded row always fits its original slot because slot size is
    /// fixed per schema and string content is truncated to the declared
    /// maximum width.
    pub fn update(&mut self, location: RowLocation, row: &Row) -> Result<()> {
        let flag = self.slot_flag(location)?;
        if flag != FLAG_LIVE {
            return Err(StoreError::OutOfRange(format!(
                "no live row at location {}",
                location
            )));
        }

        let encoded = codec::encode_row(&self.header.schema, row)?;
        let offset = codec::slot_offset(&self.header.schema, location.slot as usize);
        self.blocks.write_at(location.block, offset, &encoded)?;
        self.maybe_sync()?;
        Ok(())
    }

    /// Rewrite the file with live rows packed contiguously from block 0,
    /// then truncate. Returns the number of deleted rows discarded.
    ///
    /// This is the only operation that reclaims space, and it is a
    /// manually triggered maintenance action; `&mut self` makes it
    /// exclusive against every other operation on this handle. All
    /// previously handed-out `RowLocation`s are invalidated.
    pub fn compact(&mut self) -> Result<usize> {
        let schema = self.header.schema.clone();
        let rows_per_block = schema.rows_per_block();
        let row_size = schema.row_size();
        let old_block_count = self.blocks.block_count()?;

        // Gather raw slot bytes of live rows; no decode needed
        let mut live: Vec<Vec<u8>> = Vec::new();
        let mut discarded = 0usize;
        for block_index in 0..old_block_count {
            let block = self.blocks.read_block(block_index)?;
            for slot in 0..rows_per_block {
                let range = codec::slot_range(&schema, slot);
                match block[range.start] {
                    FLAG_LIVE => live.push(block[range].to_vec()),
                    FLAG_DELETED => discarded += 1,
                    _ => {}
                }
            }
        }

        // Pack them back, block by block
        let new_block_count = live.len().div_ceil(rows_per_block) as u64;
        for block_index in 0..new_block_count {
            let mut block = [0u8; BLOCK_SIZE];
            let first = block_index as usize * rows_per_block;
            let last = (first + rows_per_block).min(live.len());
            for (slot, row_bytes) in live[first..last].iter().enumerate() {
                block[slot * row_size..slot * row_size + row_size].copy_from_slice(row_bytes);
            }
            self.blocks.write_block(block_index, &block)?;
        }
        self.blocks.truncate_blocks(new_block_count)?;

        self.header.row_count = live.len() as u64;
        self.header.last_block = new_block_count.saturating_sub(1);
        self.rows_in_last_block =
            (live.len() - (new_block_count.saturating_sub(1) as usize * rows_per_block)) as u32;
        self.write_header()?;
        self.blocks.sync()?;

        info!(
            live = live.len(),
            discarded,
            blocks_before = old_block_count,
            blocks_after = new_block_count,
            "compacted table"
        );
        Ok(discarded)
    }

    /// Flush all pending writes and release the file handle
    pub fn close(mut self) -> Result<()> {
        self.write_header()?;
        self.blocks.sync()?;
        Ok(())
    }

    /// Force pending writes to disk without closing
    pub fn sync(&mut self) -> Result<()> {
        self.blocks.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of live rows
    pub fn row_count(&self) -> u64 {
        self.header.row_count
    }

    /// Number of allocated blocks
    pub fn block_count(&self) -> Result<u64> {
        self.blocks.block_count()
    }

    /// The table's schema
    pub fn schema(&self) -> &Schema {
        &self.header.schema
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn blocks_mut(&mut self) -> &mut BlockFile {
        &mut self.blocks
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Read the flag byte at a location, validating the location first
    fn slot_flag(&mut self, location: RowLocation) -> Result<u8> {
        let block_count = self.blocks.block_count()?;
        if location.block >= block_count {
            return Err(StoreError::OutOfRange(format!(
                "block {} out of range (block count {})",
                location.block, block_count
            )));
        }
        let rows_per_block = self.header.schema.rows_per_block() as u32;
        if location.slot >= rows_per_block {
            return Err(StoreError::OutOfRange(format!(
                "slot {} out of range (rows per block {})",
                location.slot, rows_per_block
            )));
        }
        let block = self.blocks.read_block(location.block)?;
        Ok(block[codec::slot_offset(&self.header.schema, location.slot as usize)])
    }

    /// Rewrite the header in place with the current counters
    fn write_header(&mut self) -> Result<()> {
        let bytes = self.header.encode();
        self.blocks.write_header(&bytes)
    }

    fn maybe_sync(&mut self) -> Result<()> {
        if self.sync_writes {
            self.blocks.sync()?;
        }
        Ok(())
    }

    /// Count occupied slots in a block by scanning flag bytes
    ///
    /// Rows are written densely from slot 0, so occupancy is the index of
    /// the first empty flag.
    fn scan_occupancy(blocks: &mut BlockFile, schema: &Schema, block_index: u64) -> Result<u32> {
        let block = blocks.read_block(block_index)?;
        let mut occupied = 0u32;
        for slot in 0..schema.rows_per_block() {
            if block[codec::slot_offset(schema, slot)] == FLAG_EMPTY {
                break;
            }
            occupied += 1;
        }
        Ok(occupied)
    }
}
