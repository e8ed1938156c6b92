//! Schema sidecar for a stored table.
//!
//! Every table directory carries one human-readable JSON file,
//! [`SCHEMA_FILE_NAME`], describing the table name, its row count, a format
//! version, and the ordered column descriptors. The sidecar is the single
//! source of truth on read:
//!
//! - The column id list names the column files the reader must find; a
//!   missing or extra file is corrupt storage.
//! - Logical column order is the descriptor order, never directory
//!   enumeration order.
//! - The row count bounds every column decode loop.
//!
//! Column ids are deterministic zero-padded ordinals (`000000.col`,
//! `000001.col`, ...), so saving the same table twice produces identical
//! bytes. An example sidecar:
//!
//! ```json
//! {
//!   "name": "daily prices",
//!   "row_count": 3,
//!   "format_version": 1,
//!   "columns": [
//!     { "id": "000000.col", "kind": "Date", "name": "day" },
//!     { "id": "000001.col", "kind": "Float64", "name": "close" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

use crate::table::{ColumnKind, Table};

/// Current schema / column-file format version.
///
/// Bumped only when we make a breaking change to the on-disk layout.
pub const FORMAT_VERSION: u32 = 1;

/// File name of the schema sidecar inside a table directory.
///
/// The leading underscore keeps it visually apart from column files and can
/// never collide with a generated column id.
pub const SCHEMA_FILE_NAME: &str = "_schema.json";

/// Extension given to every column file.
pub const COLUMN_FILE_EXT: &str = "col";

/// Number of digits in a zero-padded column id.
const COLUMN_ID_DIGITS: usize = 6;

/// Errors produced while serializing or parsing a schema sidecar.
#[derive(Debug, Snafu)]
pub enum SchemaError {
    /// The descriptor could not be serialized to JSON.
    #[snafu(display("failed to serialize schema: {source}"))]
    Serialize {
        /// The underlying JSON error.
        source: serde_json::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The sidecar's JSON did not parse as a schema.
    #[snafu(display("malformed schema sidecar: {source}"))]
    Malformed {
        /// The underlying JSON error.
        source: serde_json::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The sidecar was written by an incompatible format revision.
    #[snafu(display(
        "schema format version {found} is not supported (this build reads version {FORMAT_VERSION})"
    ))]
    VersionMismatch {
        /// Version found in the sidecar.
        found: u32,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Descriptor of one stored column: file id, declared type, declared name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Stable id, used verbatim as the column's file name.
    pub id: String,
    /// Declared type tag.
    pub kind: ColumnKind,
    /// Declared column name.
    pub name: String,
}

/// Descriptor of a stored table, serialized as the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// The table's display name, exactly as the caller set it.
    pub name: String,
    /// Number of rows in every column.
    pub row_count: usize,
    /// On-disk format revision that wrote this table.
    pub format_version: u32,
    /// Ordered column descriptors; order here is the table's column order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Build the descriptor for a table about to be saved.
    pub fn describe(table: &Table) -> TableSchema {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| ColumnSchema {
                id: column_id(index),
                kind: column.kind(),
                name: column.name().to_string(),
            })
            .collect();

        TableSchema {
            name: table.name().to_string(),
            row_count: table.row_count(),
            format_version: FORMAT_VERSION,
            columns,
        }
    }

    /// Serialize to the sidecar's JSON representation.
    ///
    /// # Errors
    /// Returns [`SchemaError::Serialize`] when JSON serialization fails.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        serde_json::to_string_pretty(self).context(SerializeSnafu)
    }

    /// Parse a sidecar read back from disk.
    ///
    /// # Errors
    /// Returns [`SchemaError::Malformed`] on JSON that is not a schema and
    /// [`SchemaError::VersionMismatch`] for sidecars written by another
    /// format revision.
    pub fn from_json(json: &str) -> Result<TableSchema, SchemaError> {
        let schema: TableSchema = serde_json::from_str(json).context(MalformedSnafu)?;
        ensure!(
            schema.format_version == FORMAT_VERSION,
            VersionMismatchSnafu {
                found: schema.format_version,
            }
        );
        Ok(schema)
    }

    /// Number of columns described.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Deterministic file id for the column at `index`: `000000.col`,
/// `000001.col`, ...
pub fn column_id(index: usize) -> String {
    format!("{index:0width$}.{COLUMN_FILE_EXT}", width = COLUMN_ID_DIGITS)
}
