//! Error types for rowstore
//!
//! Provides a unified error type for all storage operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for rowstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Block / Slot Errors
    // -------------------------------------------------------------------------
    #[error("out of range: {0}")]
    OutOfRange(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    // -------------------------------------------------------------------------
    // File Integrity Errors
    // -------------------------------------------------------------------------
    #[error("corrupt table file: {0}")]
    CorruptFile(String),

    // -------------------------------------------------------------------------
    // Handle Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("catalog error: {0}")]
    Catalog(String),
}
