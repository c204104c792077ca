//! Engine Module
//!
//! The multi-table storage engine that the query-processing layer talks
//! to. Owns one data directory: the catalog plus one block file per
//! table.
//!
//! ## Concurrency Model: Single Writer Per Table
//!
//! The engine keeps at most one open `Table` handle per table, guarded by
//! a `parking_lot::Mutex` over the open-handles map. Every operation
//! locks the map for its (short, synchronous) duration, which serializes
//! insert/delete/update/compact per table as the storage core requires.
//! The core itself performs no internal locking.
//!
//! Condition evaluation lives here, not in the table layer: the storage
//! core only ever sees an opaque `Fn(&Row) -> bool` callback.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::schema::{Row, Schema, Value};
use crate::table::{RowLocation, Table};

/// Extension of per-table data files
const TABLE_FILE_EXT: &str = "tbl";

// =============================================================================
// Conditions (the engine-side predicate language)
// =============================================================================

/// Comparison operator for simple column/operand conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "=" => Ok(CompareOp::Eq),
            "<>" | "!=" => Ok(CompareOp::Neq),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Gte),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Lte),
            other => Err(format!("unknown comparison operator: {}", other)),
        }
    }
}

/// One `column <op> operand` condition
///
/// A row matches when the named column's value compares accordingly.
/// Incomparable values (missing column, cross-type comparison) never
/// match.
#[derive(Debug, Clone)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub operand: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CompareOp, operand: Value) -> Self {
        Self {
            column: column.into(),
            op,
            operand,
        }
    }

    /// Evaluate this condition against a decoded row
    pub fn matches(&self, schema: &Schema, row: &Row) -> bool {
        let Some(index) = schema.column_index(&self.column) else {
            return false;
        };
        let Some(ordering) = row[index].partial_cmp(&self.operand) else {
            return false;
        };
        match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Neq => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

// =============================================================================
// Table Statistics
// =============================================================================

/// Point-in-time statistics snapshot for one table
#[derive(Debug, Clone)]
pub struct Stats {
    /// Live rows (n_r)
    pub row_count: u64,
    /// Allocated blocks (b_r)
    pub block_count: u64,
    /// Fixed row size in bytes (l_r)
    pub row_size: usize,
    /// Row slots per block (f_r)
    pub rows_per_block: usize,
    /// Total file size including header
    pub file_size: u64,
}

// =============================================================================
// Storage Engine
// =============================================================================

/// The storage engine: catalog plus open table handles for one directory
pub struct StorageEngine {
    config: Config,
    catalog: Mutex<Catalog>,
    /// Open handles; at most one per table (single-writer discipline)
    open_tables: Mutex<HashMap<String, Table>>,
}

impl StorageEngine {
    /// Open or create an engine over the configured data directory
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let catalog = Catalog::open(&config.data_dir)?;

        info!(data_dir = %config.data_dir.display(), "storage engine ready");

        Ok(Self {
            config,
            catalog: Mutex::new(catalog),
            open_tables: Mutex::new(HashMap::new()),
        })
    }

    /// Open with a path (convenience method)
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Create a new table: an empty block file plus a catalog entry
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if catalog.contains(name) {
            return Err(StoreError::TableExists(name.to_string()));
        }

        let table = Table::create(&self.table_path(name), schema.clone())?;
        table.close()?;
        catalog.create_table(name, schema)?;

        info!(table = name, "created table");
        Ok(())
    }

    /// Drop a table: close it if open, remove the catalog entry and file
    pub fn drop_table(&self, name: &str) -> Result<()> {
        if let Some(table) = self.open_tables.lock().remove(name) {
            table.close()?;
        }
        self.catalog.lock().drop_table(name)?;
        fs::remove_file(self.table_path(name))?;

        info!(table = name, "dropped table");
        Ok(())
    }

    /// Registered table names
    pub fn tables(&self) -> Vec<String> {
        self.catalog.lock().tables()
    }

    /// Schema of a registered table
    pub fn schema(&self, name: &str) -> Result<Schema> {
        self.catalog
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    // =========================================================================
    // Handle Lifecycle
    // =========================================================================

    /// Open a table handle; idempotent when the table is already open
    pub fn open_table(&self, name: &str) -> Result<()> {
        if !self.catalog.lock().contains(name) {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        let mut open_tables = self.open_tables.lock();
        if !open_tables.contains_key(name) {
            let mut table = Table::open(&self.table_path(name))?;
            table.set_sync_writes(self.config.sync_writes);
            open_tables.insert(name.to_string(), table);
            debug!(table = name, "opened table handle");
        }
        Ok(())
    }

    /// Close a table handle, flushing pending state
    pub fn close_table(&self, name: &str) -> Result<()> {
        let table = self.open_tables.lock().remove(name).ok_or_else(|| {
            StoreError::InvalidState(format!("table '{}' is not open", name))
        })?;
        table.close()?;
        debug!(table = name, "closed table handle");
        Ok(())
    }

    /// Close every open table handle
    pub fn close(self) -> Result<()> {
        let tables = self.open_tables.into_inner();
        for (_, table) in tables {
            table.close()?;
        }
        Ok(())
    }

    // =========================================================================
    // Row Operations (require an open handle)
    // =========================================================================

    /// Insert a row into an open table
    pub fn insert(&self, name: &str, row: &Row) -> Result<RowLocation> {
        self.with_table(name, |table| table.insert(row))
    }

    /// Collect the live rows matching every condition (full rows; any
    /// column projection is the caller's job)
    pub fn scan_collect(
        &self,
        name: &str,
        conditions: &[Condition],
    ) -> Result<Vec<(RowLocation, Row)>> {
        self.with_table(name, |table| {
            let schema = table.schema().clone();
            let rows = table
                .scan_filter(|row| conditions.iter().all(|c| c.matches(&schema, row)))?
                .collect();
            rows
        })
    }

    /// Delete the row at an explicit location
    pub fn delete(&self, name: &str, location: RowLocation) -> Result<()> {
        self.with_table(name, |table| table.delete(location))
    }

    /// Delete every row matching the conditions; returns rows affected
    pub fn delete_where(&self, name: &str, conditions: &[Condition]) -> Result<usize> {
        self.with_table(name, |table| {
            let schema = table.schema().clone();
            let matches: Vec<RowLocation> = table
                .scan_filter(|row| conditions.iter().all(|c| c.matches(&schema, row)))?
                .map(|item| item.map(|(location, _)| location))
                .collect::<Result<_>>()?;
            for location in &matches {
                table.delete(*location)?;
            }
            Ok(matches.len())
        })
    }

    /// Assign new values to the named columns of every matching row, in
    /// place; returns rows affected. Fixed slot sizes guarantee the
    /// rewritten row fits its original slot.
    pub fn update_where(
        &self,
        name: &str,
        assignments: &[(String, Value)],
        conditions: &[Condition],
    ) -> Result<usize> {
        self.with_table(name, |table| {
            let schema = table.schema().clone();
            for (column, _) in assignments {
                if schema.column_index(column).is_none() {
                    return Err(StoreError::SchemaMismatch(format!(
                        "unknown column '{}'",
                        column
                    )));
                }
            }

            let matches: Vec<(RowLocation, Row)> = table
                .scan_filter(|row| conditions.iter().all(|c| c.matches(&schema, row)))?
                .collect::<Result<_>>()?;

            for (location, row) in &matches {
                let mut updated = row.clone();
                for (column, value) in assignments {
                    // index checked above
                    updated[schema.column_index(column).unwrap()] = value.clone();
                }
                table.update(*location, &updated)?;
            }
            Ok(matches.len())
        })
    }

    /// Compact an open table; returns the number of deleted rows
    /// discarded. Exclusive against every other operation on the table.
    pub fn compact(&self, name: &str) -> Result<usize> {
        self.with_table(name, |table| table.compact())
    }

    /// Statistics snapshot for an open table
    pub fn table_stats(&self, name: &str) -> Result<Stats> {
        self.with_table(name, |table| {
            let schema = table.schema();
            Ok(Stats {
                row_count: table.row_count(),
                block_count: table.block_count()?,
                row_size: schema.row_size(),
                rows_per_block: schema.rows_per_block(),
                file_size: fs::metadata(table.path())?.len(),
            })
        })
    }

    /// The engine's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run `f` against the open handle for `name`
    ///
    /// Fails with InvalidState when the table has not been opened; this
    /// is the Closed-handle error the table lifecycle defines.
    fn with_table<R>(&self, name: &str, f: impl FnOnce(&mut Table) -> Result<R>) -> Result<R> {
        let mut open_tables = self.open_tables.lock();
        let table = open_tables.get_mut(name).ok_or_else(|| {
            StoreError::InvalidState(format!("table '{}' is not open", name))
        })?;
        f(table)
    }

    /// Data file path for a table
    fn table_path(&self, name: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", name, TABLE_FILE_EXT))
    }
}
