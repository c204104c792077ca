//! Block I/O Layer
//!
//! Raw fixed-size block transfer between a table file and memory.
//! This layer never interprets row contents; it only moves 1024-byte
//! blocks by index. Because the table file starts with a variable-length
//! header, every block offset is `header_len + index * BLOCK_SIZE`, and
//! the header length must be known before any block access.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, StoreError};

/// Fixed size of every on-disk block, in bytes
pub const BLOCK_SIZE: usize = 1024;

/// One fixed-size block buffer
pub type Block = [u8; BLOCK_SIZE];

/// Block-granular access to a single table file
///
/// Owns the open file handle exclusively. Allocation is append-only:
/// writing at `index == block_count()` grows the file by exactly one
/// block; writing past that is rejected (no sparse allocation).
#[derive(Debug)]
pub struct BlockFile {
    file: File,
    header_len: u64,
}

impl BlockFile {
    /// Wrap an open table file whose header occupies `header_len` bytes
    pub fn new(file: File, header_len: u64) -> Self {
        Self { file, header_len }
    }

    /// Header length in bytes (blocks start after it)
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Current number of allocated blocks, derived from file length.
    ///
    /// Fails with CorruptFile if the region after the header is not an
    /// exact multiple of the block size.
    pub fn block_count(&self) -> Result<u64> {
        let len = self.file.metadata()?.len();
        if len < self.header_len {
            return Err(StoreError::CorruptFile(format!(
                "file length {} shorter than header length {}",
                len, self.header_len
            )));
        }
        let data_len = len - self.header_len;
        if data_len % BLOCK_SIZE as u64 != 0 {
            return Err(StoreError::CorruptFile(format!(
                "data region length {} is not a multiple of block size {}",
                data_len, BLOCK_SIZE
            )));
        }
        Ok(data_len / BLOCK_SIZE as u64)
    }

    /// Read the block at `index` into a fresh buffer
    pub fn read_block(&mut self, index: u64) -> Result<Block> {
        let count = self.block_count()?;
        if index >= count {
            return Err(StoreError::OutOfRange(format!(
                "block {} out of range (block count {})",
                index, count
            )));
        }
        self.file.seek(SeekFrom::Start(self.block_offset(index)))?;
        let mut block = [0u8; BLOCK_SIZE];
        self.file.read_exact(&mut block)?;
        Ok(block)
    }

    /// Write (or append-allocate) the block at `index`
    ///
    /// `index == block_count()` allocates a new block at end-of-file;
    /// any larger index is rejected.
    pub fn write_block(&mut self, index: u64, block: &Block) -> Result<()> {
        let count = self.block_count()?;
        if index > count {
            return Err(StoreError::OutOfRange(format!(
                "cannot write block {} (block count {}, no sparse allocation)",
                index, count
            )));
        }
        self.file.seek(SeekFrom::Start(self.block_offset(index)))?;
        self.file.write_all(block)?;
        Ok(())
    }

    /// Write `bytes` at `offset` within an already-allocated block
    ///
    /// Sub-block writes are used for single-byte flag flips and in-place
    /// slot rewrites; the range must lie entirely inside the block.
    pub fn write_at(&mut self, index: u64, offset: usize, bytes: &[u8]) -> Result<()> {
        let count = self.block_count()?;
        if index >= count {
            return Err(StoreError::OutOfRange(format!(
                "block {} out of range (block count {})",
                index, count
            )));
        }
        if offset + bytes.len() > BLOCK_SIZE {
            return Err(StoreError::OutOfRange(format!(
                "write of {} bytes at offset {} exceeds block size {}",
                bytes.len(),
                offset,
                BLOCK_SIZE
            )));
        }
        self.file
            .seek(SeekFrom::Start(self.block_offset(index) + offset as u64))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Rewrite the header region at the start of the file
    ///
    /// The caller guarantees `bytes` is exactly the header length; the
    /// block layer does not interpret it.
    pub fn write_header(&mut self, bytes: &[u8]) -> Result<()> {
        debug_assert_eq!(bytes.len() as u64, self.header_len);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Truncate the file to hold exactly `count` blocks
    pub fn truncate_blocks(&mut self, count: u64) -> Result<()> {
        self.file
            .set_len(self.header_len + count * BLOCK_SIZE as u64)?;
        Ok(())
    }

    /// Force pending writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Byte offset of a block within the file
    fn block_offset(&self, index: u64) -> u64 {
        self.header_len + index * BLOCK_SIZE as u64
    }
}
