//! # rowstore
//!
//! A block-based relational table storage engine:
//! - Fixed 1024-byte blocks, allocated by appending to the table file
//! - Fixed-width row encoding with silent varchar truncation
//! - Logical deletes via per-row flag bytes
//! - Manual compaction to reclaim deleted space
//! - Self-describing table files (schema lives in the file header)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Query Processor                            │
//! │            (external collaborator, e.g. the CLI)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  StorageEngine                               │
//! │         (catalog + one open handle per table)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Table     │────────▶ │  Row Codec  │
//!   │  (cursor)   │          │  (Schema)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  BlockFile  │
//!   │ (1024-byte) │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod block;
pub mod catalog;
pub mod codec;
pub mod engine;
pub mod schema;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::{CompareOp, Condition, Stats, StorageEngine};
pub use error::{Result, StoreError};
pub use schema::{Column, ColumnType, Row, Schema, Value};
pub use table::{RowLocation, Table};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rowstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
