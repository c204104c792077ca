//! Table Catalog
//!
//! Persistent map of table name → schema for one data directory. The
//! authoritative schema for interpreting a table file lives in that
//! file's own header; the catalog exists so the engine can enumerate
//! tables and validate create/drop without opening every file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema::Schema;

/// Catalog file name inside the data directory
const CATALOG_FILE: &str = "catalog.db";

/// On-disk catalog contents
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    tables: BTreeMap<String, Schema>,
}

/// Persistent table catalog for one data directory
pub struct Catalog {
    path: PathBuf,
    data: CatalogData,
}

impl Catalog {
    /// Load the catalog from a data directory, or start empty
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CATALOG_FILE);
        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Catalog(format!("cannot decode catalog: {}", e)))?
        } else {
            CatalogData::default()
        };
        Ok(Self { path, data })
    }

    /// Register a new table
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        if self.data.tables.contains_key(name) {
            return Err(StoreError::TableExists(name.to_string()));
        }
        self.data.tables.insert(name.to_string(), schema);
        self.persist()?;
        debug!(table = name, "registered table in catalog");
        Ok(())
    }

    /// Remove a table's registration
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.data.tables.remove(name).is_none() {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        self.persist()?;
        debug!(table = name, "dropped table from catalog");
        Ok(())
    }

    /// Schema registered for a table
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.data.tables.get(name)
    }

    /// Whether a table is registered
    pub fn contains(&self, name: &str) -> bool {
        self.data.tables.contains_key(name)
    }

    /// Registered table names, in sorted order
    pub fn tables(&self) -> Vec<String> {
        self.data.tables.keys().cloned().collect()
    }

    fn persist(&self) -> Result<()> {
        let bytes = bincode::serialize(&self.data)
            .map_err(|e| StoreError::Catalog(format!("cannot encode catalog: {}", e)))?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}
