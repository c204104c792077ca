//! Tests for the table store
//!
//! These tests verify:
//! - Insert/scan round-trips and varchar truncation
//! - Append-fill-allocate block placement (rows never span blocks)
//! - Logical delete and manual compaction
//! - Write-cursor recovery on reopen
//! - Header corruption detection

use std::path::PathBuf;

use rowstore::schema::{Column, ColumnType};
use rowstore::table::Table;
use rowstore::{Row, RowLocation, Schema, StoreError, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_table() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("students.tbl");
    (temp_dir, path)
}

/// Schema: id INT, name VARCHAR(10), gpa FLOAT — row size 21 bytes,
/// so 48 rows fit per 1024-byte block.
fn student_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", ColumnType::Int),
        Column::new("name", ColumnType::Varchar(10)),
        Column::new("gpa", ColumnType::Float),
    ])
    .unwrap()
}

fn student(id: i32, name: &str, gpa: f32) -> Row {
    vec![
        Value::Int(id),
        Value::Varchar(name.to_string()),
        Value::Float(gpa),
    ]
}

fn collect_rows(table: &mut Table) -> Vec<(RowLocation, Row)> {
    table.scan().unwrap().collect::<Result<_, _>>().unwrap()
}

// =============================================================================
// Insert / Scan
// =============================================================================

#[test]
fn test_insert_then_scan_returns_row() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    let location = table.insert(&student(123, "Budi", 3.5)).unwrap();
    assert_eq!(location, RowLocation::new(0, 0));

    let rows = collect_rows(&mut table);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, location);
    assert_eq!(rows[0].1, student(123, "Budi", 3.5));
}

#[test]
fn test_scan_is_restartable() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    for i in 0..5 {
        table.insert(&student(i, "row", 1.0)).unwrap();
    }

    assert_eq!(collect_rows(&mut table).len(), 5);
    // A second pass starts from the beginning again
    assert_eq!(collect_rows(&mut table).len(), 5);
}

#[test]
fn test_scan_filter_applies_opaque_predicate() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    for i in 0..10 {
        table.insert(&student(i, "row", i as f32)).unwrap();
    }

    let matched: Vec<_> = table
        .scan_filter(|row| matches!(row[0], Value::Int(id) if id % 2 == 0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(matched.len(), 5);
}

#[test]
fn test_varchar_longer_than_max_is_truncated() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    table
        .insert(&student(1, "a very long name indeed", 2.0))
        .unwrap();

    let rows = collect_rows(&mut table);
    assert_eq!(rows[0].1[1], Value::Varchar("a very lon".to_string()));
}

#[test]
fn test_insert_rejects_mismatched_row() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    let err = table.insert(&vec![Value::Int(1)]).unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch(_)));

    // A failed insert leaves the table untouched
    assert_eq!(table.row_count(), 0);
    assert_eq!(table.block_count().unwrap(), 0);
}

// =============================================================================
// Block Placement
// =============================================================================

#[test]
fn test_append_fill_allocate() {
    let (_temp, path) = setup_temp_table();
    let schema = student_schema();
    let rows_per_block = schema.rows_per_block();
    let mut table = Table::create(&path, schema).unwrap();

    // rows_per_block + 1 inserts must produce exactly 2 blocks,
    // with the first rows_per_block rows all in block 0
    let mut locations = Vec::new();
    for i in 0..=rows_per_block {
        locations.push(table.insert(&student(i as i32, "s", 0.0)).unwrap());
    }

    assert_eq!(table.block_count().unwrap(), 2);
    for (i, location) in locations.iter().enumerate() {
        if i < rows_per_block {
            assert_eq!(location.block, 0);
            assert_eq!(location.slot as usize, i);
        } else {
            assert_eq!(*location, RowLocation::new(1, 0));
        }
    }
}

#[test]
fn test_rows_never_cross_block_boundary() {
    let (_temp, path) = setup_temp_table();
    let schema = student_schema();
    let row_size = schema.row_size();
    let mut table = Table::create(&path, schema).unwrap();

    for i in 0..200 {
        let location = table.insert(&student(i, "student", 3.0)).unwrap();
        let start = location.slot as usize * row_size;
        assert!(start + row_size <= 1024, "row at {} crosses block boundary", location);
    }
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn test_delete_then_scan_skips_row() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    table.insert(&student(1, "a", 1.0)).unwrap();
    let victim = table.insert(&student(2, "b", 2.0)).unwrap();
    table.insert(&student(3, "c", 3.0)).unwrap();

    let blocks_before = table.block_count().unwrap();
    table.delete(victim).unwrap();

    let rows = collect_rows(&mut table);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|(location, _)| *location != victim));

    // Deletes never release blocks
    assert_eq!(table.block_count().unwrap(), blocks_before);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn test_delete_invalid_locations_rejected() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    table.insert(&student(1, "a", 1.0)).unwrap();

    // Block past the end
    assert!(matches!(
        table.delete(RowLocation::new(9, 0)).unwrap_err(),
        StoreError::OutOfRange(_)
    ));
    // Slot past rows_per_block
    assert!(matches!(
        table.delete(RowLocation::new(0, 10_000)).unwrap_err(),
        StoreError::OutOfRange(_)
    ));
    // Slot allocated but never written
    assert!(matches!(
        table.delete(RowLocation::new(0, 5)).unwrap_err(),
        StoreError::OutOfRange(_)
    ));
}

#[test]
fn test_delete_already_deleted_slot_is_noop() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    let location = table.insert(&student(1, "a", 1.0)).unwrap();

    table.delete(location).unwrap();
    table.delete(location).unwrap();
    assert_eq!(table.row_count(), 0);
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_rewrites_slot_in_place() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    let location = table.insert(&student(1, "x", 1.0)).unwrap();

    // Growing the varchar never needs more space than the slot reserves
    table
        .update(location, &student(1, "longername", 4.0))
        .unwrap();

    let rows = collect_rows(&mut table);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, location);
    assert_eq!(rows[0].1, student(1, "longername", 4.0));
    assert_eq!(table.block_count().unwrap(), 1);
}

#[test]
fn test_update_of_deleted_row_rejected() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();
    let location = table.insert(&student(1, "x", 1.0)).unwrap();
    table.delete(location).unwrap();

    assert!(matches!(
        table.update(location, &student(1, "y", 2.0)).unwrap_err(),
        StoreError::OutOfRange(_)
    ));
}

// =============================================================================
// Compaction
// =============================================================================

#[test]
fn test_compact_preserves_live_rows_and_shrinks_file() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    let mut live = Vec::new();
    for i in 0..100 {
        let location = table.insert(&student(i, "s", i as f32)).unwrap();
        if i % 2 == 0 {
            live.push(student(i, "s", i as f32));
        } else {
            table.delete(location).unwrap();
        }
    }
    let blocks_before = table.block_count().unwrap();

    let discarded = table.compact().unwrap();
    assert_eq!(discarded, 50);

    let rows: Vec<Row> = collect_rows(&mut table).into_iter().map(|(_, r)| r).collect();
    assert_eq!(rows, live);
    assert!(table.block_count().unwrap() <= blocks_before);
    assert_eq!(table.row_count(), 50);
}

#[test]
fn test_compact_packs_rows_densely() {
    let (_temp, path) = setup_temp_table();
    let schema = student_schema();
    let rows_per_block = schema.rows_per_block();
    let mut table = Table::create(&path, schema).unwrap();

    // Fill two blocks, then delete all of block 0
    let mut block0 = Vec::new();
    for i in 0..rows_per_block * 2 {
        let location = table.insert(&student(i as i32, "s", 0.0)).unwrap();
        if location.block == 0 {
            block0.push(location);
        }
    }
    for location in block0 {
        table.delete(location).unwrap();
    }

    table.compact().unwrap();
    assert_eq!(table.block_count().unwrap(), 1);

    // Survivors sit contiguously from slot 0 of block 0
    let rows = collect_rows(&mut table);
    assert_eq!(rows.len(), rows_per_block);
    for (i, (location, _)) in rows.iter().enumerate() {
        assert_eq!(*location, RowLocation::new(0, i as u32));
    }
}

#[test]
fn test_end_to_end_scenario() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    let location = table.insert(&student(123, "Budi", 3.5)).unwrap();

    let rows = collect_rows(&mut table);
    assert_eq!(rows, vec![(location, student(123, "Budi", 3.5))]);

    table.delete(location).unwrap();
    assert!(collect_rows(&mut table).is_empty());

    table.compact().unwrap();
    assert_eq!(table.block_count().unwrap(), 0);
    assert_eq!(table.row_count(), 0);
}

#[test]
fn test_insert_after_compact_to_empty() {
    let (_temp, path) = setup_temp_table();
    let mut table = Table::create(&path, student_schema()).unwrap();

    let location = table.insert(&student(1, "a", 1.0)).unwrap();
    table.delete(location).unwrap();
    table.compact().unwrap();

    let location = table.insert(&student(2, "b", 2.0)).unwrap();
    assert_eq!(location, RowLocation::new(0, 0));
    assert_eq!(collect_rows(&mut table).len(), 1);
}

// =============================================================================
// Reopen / Recovery
// =============================================================================

#[test]
fn test_reopen_rederives_write_cursor() {
    let (_temp, path) = setup_temp_table();
    {
        let mut table = Table::create(&path, student_schema()).unwrap();
        for i in 0..3 {
            table.insert(&student(i, "s", 0.0)).unwrap();
        }
        table.close().unwrap();
    }

    let mut table = Table::open(&path).unwrap();
    assert_eq!(table.row_count(), 3);

    // The next insert continues in the partially filled last block
    let location = table.insert(&student(3, "s", 0.0)).unwrap();
    assert_eq!(location, RowLocation::new(0, 3));
    assert_eq!(collect_rows(&mut table).len(), 4);
}

#[test]
fn test_reopen_counts_deleted_slots_as_occupied() {
    let (_temp, path) = setup_temp_table();
    {
        let mut table = Table::create(&path, student_schema()).unwrap();
        table.insert(&student(0, "a", 0.0)).unwrap();
        let victim = table.insert(&student(1, "b", 0.0)).unwrap();
        table.insert(&student(2, "c", 0.0)).unwrap();
        table.delete(victim).unwrap();
        table.close().unwrap();
    }

    let mut table = Table::open(&path).unwrap();
    // Deleted slots are not reused before compaction
    let location = table.insert(&student(3, "d", 0.0)).unwrap();
    assert_eq!(location, RowLocation::new(0, 3));
    assert_eq!(collect_rows(&mut table).len(), 3);
}

#[test]
fn test_reopen_preserves_schema() {
    let (_temp, path) = setup_temp_table();
    {
        Table::create(&path, student_schema())
            .unwrap()
            .close()
            .unwrap();
    }
    let table = Table::open(&path).unwrap();
    assert_eq!(*table.schema(), student_schema());
}

// =============================================================================
// Corruption Detection
// =============================================================================

#[test]
fn test_open_rejects_garbage_header() {
    let (_temp, path) = setup_temp_table();
    std::fs::write(&path, b"this is not a table file at all").unwrap();

    assert!(matches!(
        Table::open(&path).unwrap_err(),
        StoreError::CorruptFile(_)
    ));
}

#[test]
fn test_open_rejects_flipped_header_bit() {
    let (_temp, path) = setup_temp_table();
    {
        let mut table = Table::create(&path, student_schema()).unwrap();
        table.insert(&student(1, "a", 1.0)).unwrap();
        table.close().unwrap();
    }

    let mut bytes = std::fs::read(&path).unwrap();
    // Flip a bit inside a column name
    bytes[10] ^= 0x01;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        Table::open(&path).unwrap_err(),
        StoreError::CorruptFile(_)
    ));
}

#[test]
fn test_open_rejects_partial_trailing_block() {
    let (_temp, path) = setup_temp_table();
    {
        let mut table = Table::create(&path, student_schema()).unwrap();
        table.insert(&student(1, "a", 1.0)).unwrap();
        table.close().unwrap();
    }

    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 100).unwrap();

    assert!(matches!(
        Table::open(&path).unwrap_err(),
        StoreError::CorruptFile(_)
    ));
}
