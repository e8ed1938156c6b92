//! In-memory table model consumed by the storage engine.
//!
//! This module defines the minimal ordered-named-typed-column model that
//! `columnar-table-core` persists and reconstructs:
//!
//! - [`ColumnKind`]: the closed set of twelve supported column types. The
//!   enum doubles as the declared-type tag written to the schema sidecar.
//! - [`ColumnData`]: the values of one column, one vector variant per kind.
//! - [`Column`]: a named, typed column.
//! - [`Table`]: an ordered sequence of columns sharing one row count, plus a
//!   display name used to derive the storage directory.
//!
//! The storage engine only reads this model; saving a table never mutates it.
//! Higher layers (importers, column arithmetic, plotting) are expected to
//! build on these types rather than re-implement them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

/// Errors produced when assembling a [`Table`].
#[derive(Debug, Snafu)]
pub enum TableError {
    /// A column's length does not match the table's established row count.
    #[snafu(display(
        "column '{column}' has {actual} rows but the table has {expected}"
    ))]
    RowCountMismatch {
        /// Name of the offending column.
        column: String,
        /// Row count established by the columns already in the table.
        expected: usize,
        /// Row count of the rejected column.
        actual: usize,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// The closed set of column types the storage format understands.
///
/// The variant name is the declared-type tag recorded in the schema sidecar.
/// Every codec dispatch matches this enum exhaustively, so adding a variant
/// without teaching the codec about it is a compile-time error rather than a
/// runtime surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// 32-bit IEEE754 float.
    Float32,
    /// 64-bit IEEE754 float.
    Float64,
    /// 32-bit signed integer.
    Int32,
    /// 16-bit signed integer.
    Int16,
    /// 64-bit signed integer.
    Int64,
    /// Boolean with an explicit missing state.
    Boolean,
    /// Calendar date without a time zone.
    Date,
    /// Time of day without a time zone, millisecond precision.
    Time,
    /// Date and time without a time zone, millisecond precision.
    DateTime,
    /// An absolute point on the UTC timeline, millisecond precision.
    Instant,
    /// Dictionary-backed string, intended for low-cardinality categorical text.
    ShortText,
    /// Free-form string stored verbatim, no dictionary indirection.
    LongText,
}

/// The values of one column, one vector variant per [`ColumnKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Values of a [`ColumnKind::Float32`] column.
    Float32(Vec<f32>),
    /// Values of a [`ColumnKind::Float64`] column.
    Float64(Vec<f64>),
    /// Values of a [`ColumnKind::Int32`] column.
    Int32(Vec<i32>),
    /// Values of a [`ColumnKind::Int16`] column.
    Int16(Vec<i16>),
    /// Values of a [`ColumnKind::Int64`] column.
    Int64(Vec<i64>),
    /// Values of a [`ColumnKind::Boolean`] column; `None` is the missing state.
    Boolean(Vec<Option<bool>>),
    /// Values of a [`ColumnKind::Date`] column.
    Date(Vec<NaiveDate>),
    /// Values of a [`ColumnKind::Time`] column.
    Time(Vec<NaiveTime>),
    /// Values of a [`ColumnKind::DateTime`] column.
    DateTime(Vec<NaiveDateTime>),
    /// Values of a [`ColumnKind::Instant`] column.
    Instant(Vec<DateTime<Utc>>),
    /// Values of a [`ColumnKind::ShortText`] column.
    ShortText(Vec<String>),
    /// Values of a [`ColumnKind::LongText`] column.
    LongText(Vec<String>),
}

impl ColumnData {
    /// The declared type of this data.
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Float32(_) => ColumnKind::Float32,
            ColumnData::Float64(_) => ColumnKind::Float64,
            ColumnData::Int32(_) => ColumnKind::Int32,
            ColumnData::Int16(_) => ColumnKind::Int16,
            ColumnData::Int64(_) => ColumnKind::Int64,
            ColumnData::Boolean(_) => ColumnKind::Boolean,
            ColumnData::Date(_) => ColumnKind::Date,
            ColumnData::Time(_) => ColumnKind::Time,
            ColumnData::DateTime(_) => ColumnKind::DateTime,
            ColumnData::Instant(_) => ColumnKind::Instant,
            ColumnData::ShortText(_) => ColumnKind::ShortText,
            ColumnData::LongText(_) => ColumnKind::LongText,
        }
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Time(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Instant(v) => v.len(),
            ColumnData::ShortText(v) => v.len(),
            ColumnData::LongText(v) => v.len(),
        }
    }

    /// True when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named, typed column.
///
/// The declared type is fixed at construction; replacing a column's values
/// with values of another kind means building a new `Column`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a column from a name and its values.
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            data,
        }
    }

    /// The column's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The column's declared type.
    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    /// The column's values.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An ordered sequence of equally-long columns with a display name.
///
/// The display name is what the storage engine sanitizes into a directory
/// name; it is not required to be filesystem-safe itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    /// Create an empty table with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Create a table from a full set of columns.
    ///
    /// # Errors
    /// Returns [`TableError::RowCountMismatch`] if the columns do not all
    /// share one length.
    pub fn with_columns(
        name: impl Into<String>,
        columns: Vec<Column>,
    ) -> Result<Self, TableError> {
        let mut table = Table::new(name);
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Append a column to the table.
    ///
    /// The first column establishes the table's row count; every later column
    /// must match it.
    ///
    /// # Errors
    /// Returns [`TableError::RowCountMismatch`] if the column's length differs
    /// from the established row count.
    pub fn push_column(&mut self, column: Column) -> Result<(), TableError> {
        if let Some(first) = self.columns.first() {
            ensure!(
                column.len() == first.len(),
                RowCountMismatchSnafu {
                    column: column.name().to_string(),
                    expected: first.len(),
                    actual: column.len(),
                }
            );
        }
        self.columns.push(column);
        Ok(())
    }

    /// The table's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's columns, in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows; an empty table has zero rows.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
