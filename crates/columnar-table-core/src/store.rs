//! Storage orchestrator: directory lifecycle, parallel column dispatch, and
//! the `save`/`load` entry points.
//!
//! A table is persisted as one directory:
//!
//! ```text
//! <parent>/
//!   <sanitized-name>.coltab/
//!     _schema.json             # sidecar, written first, atomically
//!     000000.col               # one LZ4-framed column file per column
//!     000001.col
//!     ...
//! ```
//!
//! `save` sanitizes the table name into the directory name, recreates the
//! directory from scratch (overwrite-by-replacement, never a merge), writes
//! the sidecar, then encodes every column on a bounded worker pool. `load`
//! reads the sidecar first, checks that the directory holds exactly the files
//! the sidecar names, then decodes the columns on the same kind of pool and
//! reassembles them in sidecar order.
//!
//! Column tasks are independent: each owns its file handle and compression
//! stream, and none blocks on a sibling. The orchestrator is the only
//! synchronization point; it waits for all tasks and reports the first
//! failure. A failure mid-save can leave a partially populated directory
//! behind (only the sidecar write is staged-and-renamed); a later save of the
//! same table replaces the directory wholesale.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rayon::prelude::*;
use snafu::{Backtrace, prelude::*};

use crate::codec::{CodecError, ColumnReader, ColumnWriter};
use crate::frame::{FrameReader, FrameWriter};
use crate::schema::{ColumnSchema, SCHEMA_FILE_NAME, SchemaError, TableSchema};
use crate::table::{Column, Table};

/// Extension appended to the sanitized table name to form the directory name.
pub const STORAGE_EXTENSION: &str = "coltab";

/// Default worker-pool size for column encode/decode tasks.
pub const DEFAULT_WORKERS: usize = 10;

/// Default number of values a column writer encodes between stream flushes.
pub const DEFAULT_FLUSH_EVERY: usize = 10_000;

/// Errors surfaced by [`TableStore::save`] and [`TableStore::load`].
#[derive(Debug, Snafu)]
pub enum StoreError {
    /// The destination folder argument was empty.
    #[snafu(display("destination folder path must not be empty"))]
    InvalidDestination {
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A filesystem operation failed.
    #[snafu(display("I/O error at {path}: {source}"))]
    Io {
        /// The path involved in the failed operation.
        path: String,
        /// The underlying I/O error.
        source: io::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The column worker pool could not be built.
    #[snafu(display("failed to build the column worker pool: {source}"))]
    WorkerPool {
        /// The underlying pool construction error.
        source: rayon::ThreadPoolBuildError,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// One column failed to encode; sibling columns ran to completion and
    /// were discarded.
    #[snafu(display("failed to encode column '{column}': {source}"))]
    EncodeColumn {
        /// Name of the failing column.
        column: String,
        /// The underlying codec error.
        #[snafu(backtrace)]
        source: CodecError,
    },

    /// One column failed to decode.
    #[snafu(display("failed to decode column '{column}': {source}"))]
    DecodeColumn {
        /// Name of the failing column.
        column: String,
        /// The underlying codec error.
        #[snafu(backtrace)]
        source: CodecError,
    },

    /// The schema sidecar could not be serialized or parsed.
    #[snafu(display("{source}"))]
    Schema {
        /// The underlying schema error.
        #[snafu(backtrace)]
        source: SchemaError,
    },

    /// The stored directory does not match its own sidecar.
    #[snafu(display("corrupt table storage at {path}: {reason}"))]
    Corrupt {
        /// The table directory.
        path: String,
        /// What the reader found.
        reason: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Performance knobs for the storage engine.
///
/// Both fields tune throughput/latency, never on-disk semantics: any
/// combination of settings reads any file produced by any other combination.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Worker threads in the column pool. The pool is bounded regardless of
    /// column count; `0` lets the pool size itself to the machine.
    pub workers: usize,
    /// Values encoded between mid-stream flushes; `0` flushes only at close.
    pub flush_every: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            workers: DEFAULT_WORKERS,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

/// Reads and writes tables in the compressed column-per-file layout.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    options: StoreOptions,
}

impl TableStore {
    /// A store with default options.
    pub fn new() -> Self {
        TableStore::default()
    }

    /// A store with explicit options.
    pub fn with_options(options: StoreOptions) -> Self {
        TableStore { options }
    }

    /// The options this store runs with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Persist `table` under `parent`, returning the table directory path.
    ///
    /// The directory name is derived from the table's display name via
    /// [`sanitize_table_name`]; distinct display names that sanitize to the
    /// same string land in the same directory and overwrite each other. An
    /// existing directory for the name is deleted and recreated, never merged
    /// into.
    ///
    /// # Errors
    /// - [`StoreError::InvalidDestination`] for an empty `parent`, checked
    ///   before any I/O.
    /// - [`StoreError::Io`] for filesystem failures, including directory
    ///   setup — setup failures abort the save rather than being logged and
    ///   ignored.
    /// - [`StoreError::EncodeColumn`] when a column task fails; the first
    ///   failure is reported and the partial directory is left behind.
    /// - [`StoreError::WorkerPool`] when the pool cannot be built.
    pub fn save(&self, parent: impl AsRef<Path>, table: &Table) -> Result<PathBuf, StoreError> {
        let parent = parent.as_ref();
        ensure!(!parent.as_os_str().is_empty(), InvalidDestinationSnafu);

        let schema = TableSchema::describe(table);

        fs::create_dir_all(parent).context(IoSnafu {
            path: parent.display().to_string(),
        })?;

        let table_dir = parent.join(storage_dir_name(table.name()));
        match fs::metadata(&table_dir) {
            Ok(_) => {
                warn!(
                    "replacing existing table directory {}",
                    table_dir.display()
                );
                fs::remove_dir_all(&table_dir).context(IoSnafu {
                    path: table_dir.display().to_string(),
                })?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).context(IoSnafu {
                    path: table_dir.display().to_string(),
                });
            }
        }
        fs::create_dir(&table_dir).context(IoSnafu {
            path: table_dir.display().to_string(),
        })?;

        write_schema_atomic(&table_dir, &schema)?;

        let pool = self.build_pool()?;
        pool.install(|| {
            table
                .columns()
                .par_iter()
                .zip(schema.columns.par_iter())
                .try_for_each(|(column, descriptor)| {
                    self.write_column_file(&table_dir, descriptor, column)
                })
        })?;

        debug!(
            "saved table '{}' ({} columns, {} rows) to {}",
            table.name(),
            table.column_count(),
            table.row_count(),
            table_dir.display()
        );
        Ok(table_dir)
    }

    /// Load the table stored in `table_dir` (a path previously returned by
    /// [`TableStore::save`]).
    ///
    /// Column order, names, and types come from the sidecar; the directory
    /// listing is only consulted to verify that exactly the expected files
    /// are present.
    ///
    /// # Errors
    /// - [`StoreError::Corrupt`] when the sidecar is missing, names files
    ///   that are absent, or the directory holds files the sidecar does not
    ///   name.
    /// - [`StoreError::Schema`] for a malformed or wrong-version sidecar.
    /// - [`StoreError::DecodeColumn`] when a column file cannot be decoded.
    /// - [`StoreError::Io`] for other filesystem failures.
    pub fn load(&self, table_dir: impl AsRef<Path>) -> Result<Table, StoreError> {
        let dir = table_dir.as_ref();
        let schema_path = dir.join(SCHEMA_FILE_NAME);

        let json = match fs::read_to_string(&schema_path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return CorruptSnafu {
                    path: dir.display().to_string(),
                    reason: format!("schema sidecar {SCHEMA_FILE_NAME} is missing"),
                }
                .fail();
            }
            Err(e) => {
                return Err(e).context(IoSnafu {
                    path: schema_path.display().to_string(),
                });
            }
        };
        let schema = TableSchema::from_json(&json).context(SchemaSnafu)?;

        validate_file_set(dir, &schema)?;

        let pool = self.build_pool()?;
        let columns: Vec<Column> = pool.install(|| {
            schema
                .columns
                .par_iter()
                .map(|descriptor| self.read_column_file(dir, &schema, descriptor))
                .collect::<Result<_, _>>()
        })?;

        let table =
            Table::with_columns(schema.name.clone(), columns).map_err(|e| StoreError::Corrupt {
                path: dir.display().to_string(),
                reason: e.to_string(),
                backtrace: Backtrace::capture(),
            })?;

        debug!(
            "loaded table '{}' ({} columns, {} rows) from {}",
            table.name(),
            table.column_count(),
            table.row_count(),
            dir.display()
        );
        Ok(table)
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool, StoreError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .context(WorkerPoolSnafu)
    }

    /// Encode one column into its own file. Runs on a pool worker; owns the
    /// file handle and compression stream exclusively.
    fn write_column_file(
        &self,
        dir: &Path,
        descriptor: &ColumnSchema,
        column: &Column,
    ) -> Result<(), StoreError> {
        let path = dir.join(&descriptor.id);
        let file = File::create(&path).context(IoSnafu {
            path: path.display().to_string(),
        })?;

        let mut writer = ColumnWriter::new(FrameWriter::new(file), self.options.flush_every);
        writer.write(column.data()).context(EncodeColumnSnafu {
            column: column.name().to_string(),
        })?;
        writer.into_inner().finish().context(IoSnafu {
            path: path.display().to_string(),
        })?;
        Ok(())
    }

    /// Decode one column file back into memory. Runs on a pool worker.
    fn read_column_file(
        &self,
        dir: &Path,
        schema: &TableSchema,
        descriptor: &ColumnSchema,
    ) -> Result<Column, StoreError> {
        let path = dir.join(&descriptor.id);
        let file = File::open(&path).context(IoSnafu {
            path: path.display().to_string(),
        })?;

        let mut reader = ColumnReader::new(FrameReader::new(file), schema.row_count);
        let data = reader.read(descriptor.kind).context(DecodeColumnSnafu {
            column: descriptor.name.clone(),
        })?;
        Ok(Column::new(descriptor.name.clone(), data))
    }
}

/// Strip all whitespace from a table name and replace path separators with
/// `_`, yielding a filesystem-safe directory stem.
///
/// Both `/` and `\` are treated as separators on every platform so a table
/// sanitizes to the same name everywhere. The transformation is idempotent.
pub fn sanitize_table_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Directory name for a table: sanitized display name plus the fixed
/// extension, e.g. `MyTable_Name.coltab`.
pub fn storage_dir_name(table_name: &str) -> String {
    format!("{}.{STORAGE_EXTENSION}", sanitize_table_name(table_name))
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during the sidecar's atomic write.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we're likely already handling another error.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Write the sidecar with write-then-rename semantics so no reader can ever
/// observe a half-written schema.
fn write_schema_atomic(dir: &Path, schema: &TableSchema) -> Result<(), StoreError> {
    let target = dir.join(SCHEMA_FILE_NAME);
    let json = schema.to_json().context(SchemaSnafu)?;

    let tmp = target.with_extension("tmp");
    let mut guard = TempFileGuard::new(tmp.clone());

    {
        let mut file = File::create(&tmp).context(IoSnafu {
            path: tmp.display().to_string(),
        })?;
        file.write_all(json.as_bytes()).context(IoSnafu {
            path: tmp.display().to_string(),
        })?;
        file.sync_all().context(IoSnafu {
            path: tmp.display().to_string(),
        })?;
    }

    fs::rename(&tmp, &target).context(IoSnafu {
        path: target.display().to_string(),
    })?;
    guard.disarm();
    Ok(())
}

/// Check that `dir` holds exactly the sidecar plus the column files the
/// schema names — nothing missing, nothing extra, ids sane.
fn validate_file_set(dir: &Path, schema: &TableSchema) -> Result<(), StoreError> {
    let dir_str = dir.display().to_string();

    let mut expected: BTreeSet<String> = BTreeSet::new();
    expected.insert(SCHEMA_FILE_NAME.to_string());
    for descriptor in &schema.columns {
        validate_column_id(&descriptor.id).map_err(|reason| StoreError::Corrupt {
            path: dir_str.clone(),
            reason,
            backtrace: Backtrace::capture(),
        })?;
        let fresh = expected.insert(descriptor.id.clone());
        ensure!(
            fresh,
            CorruptSnafu {
                path: dir_str.clone(),
                reason: format!("duplicate column id '{}' in schema", descriptor.id),
            }
        );
    }

    let mut actual: BTreeSet<String> = BTreeSet::new();
    let entries = fs::read_dir(dir).context(IoSnafu {
        path: dir_str.clone(),
    })?;
    for entry in entries {
        let entry = entry.context(IoSnafu {
            path: dir_str.clone(),
        })?;
        actual.insert(entry.file_name().to_string_lossy().into_owned());
    }

    if let Some(missing) = expected.difference(&actual).next() {
        return CorruptSnafu {
            path: dir_str,
            reason: format!("schema names '{missing}' but the file is absent"),
        }
        .fail();
    }
    if let Some(extra) = actual.difference(&expected).next() {
        return CorruptSnafu {
            path: dir_str,
            reason: format!("directory holds '{extra}', which the schema does not name"),
        }
        .fail();
    }
    Ok(())
}

/// A column id must be a plain file name: no separators, no traversal, no
/// leading dot.
fn validate_column_id(id: &str) -> Result<(), String> {
    if id.is_empty()
        || id.starts_with('.')
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
    {
        return Err(format!("invalid column id '{id}' in schema"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_whitespace_and_maps_separators() {
        assert_eq!(sanitize_table_name("My Table/Name"), "MyTable_Name");
        assert_eq!(sanitize_table_name("a\\b"), "a_b");
        assert_eq!(sanitize_table_name(" tabs\tand\nnewlines "), "tabsandnewlines");
        assert_eq!(sanitize_table_name("already-clean"), "already-clean");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let cases = ["My Table/Name", "a\\ b/c", "plain", ""];
        for case in cases {
            let once = sanitize_table_name(case);
            assert_eq!(sanitize_table_name(&once), once);
        }
    }

    #[test]
    fn storage_dir_name_appends_the_extension() {
        assert_eq!(storage_dir_name("My Table/Name"), "MyTable_Name.coltab");
    }

    #[test]
    fn empty_destination_fails_before_any_io() {
        let store = TableStore::new();
        let err = store.save("", &Table::new("t")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDestination { .. }));
    }

    #[test]
    fn column_id_validation_rejects_traversal() {
        assert!(validate_column_id("000000.col").is_ok());
        assert!(validate_column_id("../escape").is_err());
        assert!(validate_column_id("a/b").is_err());
        assert!(validate_column_id(".hidden").is_err());
        assert!(validate_column_id("").is_err());
    }
}
