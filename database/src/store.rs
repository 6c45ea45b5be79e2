use std::path::PathBuf;

use collector_data::{AccountingRecord, FilterParams};
use rusqlite::{ffi, Connection, ErrorCode, OpenFlags, ToSql};
use tracing::{debug, error, info, instrument, trace};

use crate::{
    error::StoreError,
    schema::{self, Table, COLUMNS},
};

pub const DEFAULT_COMMIT_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file, `:memory:` for a private in-memory database.
    pub target: PathBuf,
    /// Pending writes are committed once this many records were saved.
    pub commit_every: usize,
}

impl StoreConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            commit_every: DEFAULT_COMMIT_EVERY,
        }
    }
}

/// Result of a single `INSERT`, with the unique-key violation on `JobID` split out from all
/// other failures.
enum Insert {
    Inserted,
    UniqueViolation,
}

/// Connection to the job report database, held for the duration of a run.
///
/// Writes are grouped into transactions of at most `commit_every` records. Pending writes are
/// committed by [`Store::flush`], before schema changes and on drop.
pub struct Store {
    conn: Connection,
    commit_every: usize,
    uncommitted: usize,
    insert_sql: String,
    update_sql: String,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .field("commit_every", &self.commit_every)
            .field("uncommitted", &self.uncommitted)
            .finish()
    }
}

impl Store {
    #[instrument(skip_all, fields(target = %config.target.display()))]
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let connection_error = |source| StoreError::Connection {
            target: config.target.clone(),
            source,
        };
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&config.target, flags).map_err(connection_error)?;
        // opening is lazy, reading the header catches files that aren't databases
        conn.pragma_query_value(None, "schema_version", |row| row.get::<_, i64>(0))
            .map_err(connection_error)?;

        info!("connected to job report database");
        Ok(Self {
            conn,
            commit_every: config.commit_every.max(1),
            uncommitted: 0,
            insert_sql: schema::insert_sql(Table::JobReport),
            update_sql: schema::update_sql(Table::JobReport),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates both tables unless they already exist.
    #[instrument(skip(self))]
    pub fn create_schema(&mut self) -> Result<(), StoreError> {
        self.flush()?;
        for table in Table::ALL {
            self.conn
                .execute_batch(&schema::create_table_sql(table))
                .map_err(|source| StoreError::Schema {
                    operation: "create",
                    source,
                })?;
        }
        debug!("schema in place");
        Ok(())
    }

    /// Drops both tables if present. Destroys all loaded job reports.
    #[instrument(skip(self))]
    pub fn drop_schema(&mut self) -> Result<(), StoreError> {
        self.flush()?;
        for table in Table::ALL {
            self.conn
                .execute_batch(&schema::drop_table_sql(table))
                .map_err(|source| StoreError::Schema { operation: "drop", source })?;
        }
        info!("dropped job report tables");
        Ok(())
    }

    /// Writes `records` to `jobreport`, one row per `JobID`.
    ///
    /// An existing row with the same `JobID` is overwritten when `replace` is set and reported as
    /// [`StoreError::Conflict`] otherwise. Only declared columns are written, `extra` fields are
    /// dropped. Stops at the first failing record and returns its error.
    pub fn save(&mut self, records: &[AccountingRecord], replace: bool) -> Result<usize, StoreError> {
        let mut written = 0;
        for record in records {
            self.save_one(record, replace)?;
            written += 1;
        }
        Ok(written)
    }

    fn save_one(&mut self, record: &AccountingRecord, replace: bool) -> Result<(), StoreError> {
        let persistence_error = |source| StoreError::Persistence {
            job_id: record.job_id.clone(),
            source,
        };
        if !record.extra.is_empty() {
            trace!(job_id = %record.job_id, ignored = ?record.extra.keys(), "fields without column");
        }

        self.begin_if_needed()?;
        let values = column_values(record);
        match self.insert(&values).map_err(persistence_error)? {
            Insert::Inserted => {}
            Insert::UniqueViolation if replace => {
                trace!(job_id = %record.job_id, "already stored, replacing");
                self.conn
                    .prepare_cached(&self.update_sql)
                    .and_then(|mut stmt| stmt.execute(values.as_slice()))
                    .map_err(persistence_error)?;
            }
            Insert::UniqueViolation => {
                return Err(StoreError::Conflict {
                    job_id: record.job_id.clone(),
                })
            }
        }

        self.uncommitted += 1;
        if self.uncommitted >= self.commit_every {
            self.flush()?;
        }
        Ok(())
    }

    fn insert(&self, values: &[&dyn ToSql]) -> rusqlite::Result<Insert> {
        let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
        match stmt.execute(values) {
            Ok(_) => Ok(Insert::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(Insert::UniqueViolation),
            Err(e) => Err(e),
        }
    }

    fn begin_if_needed(&self) -> Result<(), StoreError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN").map_err(StoreError::Commit)?;
        }
        Ok(())
    }

    /// Commits pending writes, making them visible to other connections.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT").map_err(StoreError::Commit)?;
            debug!(records = self.uncommitted, "committed");
        }
        self.uncommitted = 0;
        Ok(())
    }

    pub fn row_count(&self, table: Table) -> Result<u64, StoreError> {
        self.conn
            .query_row(&format!("SELECT count(*) FROM \"{}\"", table.name()), [], |row| row.get::<_, i64>(0))
            .map(|count| u64::try_from(count).unwrap_or_default())
            .map_err(StoreError::Query)
    }

    /// Query side of the store. Reporting isn't part of the loader yet.
    pub fn fetch(&self, _filter: &FilterParams) -> Result<Vec<AccountingRecord>, StoreError> {
        Err(StoreError::NotImplemented("fetching job reports"))
    }

    /// Writes records that failed validation to the `rejected` table. No validation exists yet.
    pub fn reject(&mut self, _records: &[AccountingRecord]) -> Result<usize, StoreError> {
        Err(StoreError::NotImplemented("storing rejected job reports"))
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("committing on close failed: {e:#}");
        }
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && matches!(e.extended_code, ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Values in [`COLUMNS`] order.
fn column_values(record: &AccountingRecord) -> Vec<&dyn ToSql> {
    let values: Vec<&dyn ToSql> = vec![
        &record.job_id,
        &record.user,
        &record.job_name,
        &record.state,
        &record.partition,
        &record.ncpus,
        &record.nnodes,
        &record.cpu_time,
        &record.total_cpu,
        &record.user_cpu,
        &record.system_cpu,
        &record.max_rss_kb,
        &record.req_mem_bytes_per_node,
        &record.req_mem_bytes_per_core,
        &record.req_mem_bytes,
        &record.start,
        &record.end,
        &record.node_list,
        &record.req_mem_bytes_total,
        &record.cpu_efficiency,
        &record.cpu_wasted,
        &record.cancelled_by,
    ];
    debug_assert_eq!(values.len(), COLUMNS.len());
    values
}
