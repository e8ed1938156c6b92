//! Integration tests for failure reporting.
//!
//! These tests damage stored tables in targeted ways and check that `load`
//! reports a single typed failure — and returns rather than hanging — and
//! that `save` rejects bad input eagerly.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::fs::OpenOptions;
use std::path::PathBuf;

use columnar_table_core::schema::SCHEMA_FILE_NAME;
use columnar_table_core::store::{StoreError, StoreOptions, TableStore};
use columnar_table_core::table::{Column, ColumnData, Table};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Test Helpers
// =============================================================================

/// Save a 24-column table and return its directory.
fn saved_wide_table(tmp: &TempDir, store: &TableStore) -> PathBuf {
    let mut columns = Vec::new();
    for c in 0..24 {
        columns.push(Column::new(
            format!("col{c}"),
            ColumnData::Float64((0..2_000).map(|i| i as f64 + c as f64).collect()),
        ));
    }
    let table = Table::with_columns("wide", columns).expect("equal-length columns");
    store.save(tmp.path(), &table).expect("save table")
}

// =============================================================================
// Corrupt Storage
// =============================================================================

#[test]
fn truncated_column_file_is_a_single_decode_failure() -> TestResult {
    let tmp = TempDir::new()?;
    // Pool smaller than the column count, so siblings are in flight when the
    // bad column is hit.
    let store = TableStore::with_options(StoreOptions {
        workers: 4,
        ..StoreOptions::default()
    });
    let dir = saved_wide_table(&tmp, &store);

    let victim = dir.join("000007.col");
    let bytes = fs::read(&victim)?;
    fs::write(&victim, &bytes[..bytes.len() / 2])?;

    let err = store.load(&dir).unwrap_err();
    assert!(
        matches!(&err, StoreError::DecodeColumn { column, .. } if column == "col7"),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[test]
fn garbage_column_bytes_are_a_decode_failure() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    fs::write(dir.join("000003.col"), b"this is not an lz4 frame")?;

    let err = store.load(&dir).unwrap_err();
    assert!(matches!(err, StoreError::DecodeColumn { .. }));
    Ok(())
}

#[test]
fn missing_column_file_is_corrupt_storage() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    fs::remove_file(dir.join("000010.col"))?;

    let err = store.load(&dir).unwrap_err();
    assert!(
        matches!(&err, StoreError::Corrupt { reason, .. } if reason.contains("000010.col")),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[test]
fn extra_file_in_the_directory_is_corrupt_storage() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    fs::write(dir.join("stray.bin"), b"left behind")?;

    let err = store.load(&dir).unwrap_err();
    assert!(
        matches!(&err, StoreError::Corrupt { reason, .. } if reason.contains("stray.bin")),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[test]
fn missing_sidecar_is_corrupt_storage() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    fs::remove_file(dir.join(SCHEMA_FILE_NAME))?;

    let err = store.load(&dir).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    Ok(())
}

#[test]
fn malformed_sidecar_json_is_a_schema_failure() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    fs::write(dir.join(SCHEMA_FILE_NAME), "{ definitely not a schema")?;

    let err = store.load(&dir).unwrap_err();
    assert!(matches!(err, StoreError::Schema { .. }));
    Ok(())
}

#[test]
fn wrong_format_version_is_a_schema_failure() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    let sidecar = dir.join(SCHEMA_FILE_NAME);
    let json = fs::read_to_string(&sidecar)?;
    fs::write(&sidecar, json.replace("\"format_version\": 1", "\"format_version\": 99"))?;

    let err = store.load(&dir).unwrap_err();
    assert!(matches!(err, StoreError::Schema { .. }));
    Ok(())
}

#[test]
fn overstated_row_count_is_a_decode_failure() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let dir = saved_wide_table(&tmp, &store);

    // Claim one more row than any column file actually holds.
    let sidecar = dir.join(SCHEMA_FILE_NAME);
    let json = fs::read_to_string(&sidecar)?;
    fs::write(&sidecar, json.replace("\"row_count\": 2000", "\"row_count\": 2001"))?;

    let err = store.load(&dir).unwrap_err();
    assert!(matches!(err, StoreError::DecodeColumn { .. }));
    Ok(())
}

#[test]
fn kind_mismatch_between_sidecar_and_payload_fails() -> TestResult {
    // A boolean payload read as Time hits validation rather than producing
    // silently wrong values.
    let tmp = TempDir::new()?;
    let store = TableStore::new();
    let table = Table::with_columns(
        "flags",
        vec![Column::new(
            "flag",
            ColumnData::Boolean(vec![None, Some(true), None, Some(false)]),
        )],
    )?;
    let dir = store.save(tmp.path(), &table)?;

    let sidecar = dir.join(SCHEMA_FILE_NAME);
    let json = fs::read_to_string(&sidecar)?;
    fs::write(&sidecar, json.replace("\"Boolean\"", "\"Time\""))?;

    let err = store.load(&dir).unwrap_err();
    assert!(
        matches!(err, StoreError::DecodeColumn { .. }),
        "unexpected error: {err:?}"
    );
    Ok(())
}

// =============================================================================
// Eager Argument Checks
// =============================================================================

#[test]
fn empty_destination_is_rejected_before_io() -> TestResult {
    let store = TableStore::new();
    let err = store.save("", &Table::new("t")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidDestination { .. }));
    Ok(())
}

#[test]
fn loading_a_nonexistent_directory_fails() -> TestResult {
    let tmp = TempDir::new()?;
    let store = TableStore::new();

    let err = store.load(tmp.path().join("never-saved.coltab")).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    Ok(())
}

// =============================================================================
// Write-Side Failure Propagation
// =============================================================================

#[test]
fn unwritable_destination_surfaces_a_typed_io_error() -> TestResult {
    // A regular file where the parent directory should be: create_dir_all
    // fails and save must propagate rather than continue.
    let tmp = TempDir::new()?;
    let blocker = tmp.path().join("occupied");
    OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&blocker)?;

    let store = TableStore::new();
    let table = Table::with_columns(
        "blocked",
        vec![Column::new("x", ColumnData::Int32(vec![1]))],
    )?;

    let err = store.save(&blocker, &table).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
    Ok(())
}
