//! Lazy table scan
//!
//! Streams (location, row) pairs block by block, skipping deleted and
//! never-written slots. Each block is read from disk when the scan
//! reaches it, so the pass reflects on-disk state at that moment rather
//! than a frozen snapshot.

use crate::block::Block;
use crate::codec::{self, FLAG_LIVE};
use crate::error::Result;
use crate::schema::Row;

use super::{RowLocation, Table};

/// Predicate applied to decoded rows; semantics belong to the caller
pub type ScanPredicate<'a> = Box<dyn Fn(&Row) -> bool + 'a>;

/// Iterator over the live rows of one table
///
/// The pass is finite: it covers the blocks allocated when the scan
/// started. Errors are yielded once, after which the iterator is fused.
pub struct Scan<'a> {
    table: &'a mut Table,
    predicate: Option<ScanPredicate<'a>>,
    /// Blocks allocated at scan start; later allocations are not visited
    block_count: u64,
    next_block: u64,
    /// Block currently being walked, copied into memory
    current: Option<(u64, Block)>,
    next_slot: usize,
    done: bool,
}

impl<'a> Scan<'a> {
    pub(super) fn new(table: &'a mut Table, predicate: Option<ScanPredicate<'a>>) -> Result<Self> {
        let block_count = table.block_count()?;
        Ok(Self {
            table,
            predicate,
            block_count,
            next_block: 0,
            current: None,
            next_slot: 0,
            done: false,
        })
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<(RowLocation, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.current.is_none() {
                if self.next_block >= self.block_count {
                    self.done = true;
                    return None;
                }
                match self.table.blocks_mut().read_block(self.next_block) {
                    Ok(block) => {
                        self.current = Some((self.next_block, block));
                        self.next_slot = 0;
                        self.next_block += 1;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            let (block_index, block) = self.current.as_ref().unwrap();
            let block_index = *block_index;
            let schema = self.table.schema();
            let rows_per_block = schema.rows_per_block();

            while self.next_slot < rows_per_block {
                let slot = self.next_slot;
                self.next_slot += 1;

                let range = codec::slot_range(schema, slot);
                if block[range.start] != FLAG_LIVE {
                    continue;
                }

                let row = match codec::decode_row(schema, &block[range]) {
                    Ok((row, _)) => row,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                };

                if let Some(pred) = &self.predicate {
                    if !pred(&row) {
                        continue;
                    }
                }

                return Some(Ok((RowLocation::new(block_index, slot as u32), row)));
            }

            self.current = None;
        }
    }
}
