//! Compressed, column-oriented table storage.
//!
//! This crate persists an in-memory table as a directory of per-column
//! binary files plus a human-readable JSON schema sidecar, and reconstructs
//! the exact original column types, values, and order on read:
//!
//! - A closed twelve-kind column model (`table` module): floats, signed
//!   integers, booleans with a missing state, calendar/clock/timestamp
//!   types, and two string flavors.
//! - Adaptive dictionary encoding for categorical text, with 1/2/4-byte
//!   keys picked from cardinality (`dictionary` module).
//! - A bit-exact big-endian layout per kind (`codec` module) inside an
//!   interoperable LZ4 frame stream (`frame` module).
//! - A schema sidecar that drives reading: file set, column order, declared
//!   types, row count (`schema` module).
//! - A bounded-worker-pool orchestrator with one independent task per
//!   column and first-failure reporting (`store` module).
//!
//! ## Quick start
//!
//! ```no_run
//! use columnar_table_core::store::TableStore;
//! use columnar_table_core::table::{Column, ColumnData, Table};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::with_columns(
//!     "daily prices",
//!     vec![
//!         Column::new("close", ColumnData::Float64(vec![101.5, 99.25])),
//!         Column::new("venue", ColumnData::ShortText(vec!["X".into(), "X".into()])),
//!     ],
//! )?;
//!
//! let store = TableStore::new();
//! let path = store.save("mytables", &table)?;
//! let restored = store.load(&path)?;
//! assert_eq!(restored, table);
//! # Ok(())
//! # }
//! ```
//!
//! Higher-level table features — CSV/Excel/JSON import, statistics, column
//! arithmetic, plotting — belong to the surrounding library; this crate is
//! only the storage engine they call into.
#![deny(missing_docs)]

pub mod codec;
pub mod dictionary;
pub mod frame;
pub mod schema;
pub mod store;
pub mod table;

pub use store::{StoreError, StoreOptions, TableStore};
pub use table::{Column, ColumnData, ColumnKind, Table};
