//! `SQLite` record store.
//!
//! Persists named tables of records and serves them through the
//! [`TableSource`] port. Browse order is insertion order within a table.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use super::TableSource;
use super::import::NewRecord;
use super::matching::filter_by_term;
use super::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, PAGE_SQL, SCHEMA_SQL,
    SET_VERSION_SQL,
};
use crate::config::SourceConfig;
use crate::core::{Record, SearchResult};
use crate::error::{SourceError, SourceResult};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// SQLite-backed table source.
///
/// # Examples
///
/// ```no_run
/// use marksplice::config::SourceConfig;
/// use marksplice::source::SqliteSource;
///
/// let source = SqliteSource::open("records.db", SourceConfig::default()).unwrap();
/// source.init().unwrap();
/// ```
#[derive(Debug)]
pub struct SqliteSource {
    /// `SQLite` connection.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
    /// Paging and catalog settings.
    config: SourceConfig,
}

/// Record store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    /// Per-table record counts, in catalog order.
    pub tables: Vec<TableStats>,
    /// Total number of records across all tables.
    pub record_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}

/// Record count for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of records.
    pub records: usize,
}

impl SqliteSource {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open<P: AsRef<Path>>(path: P, config: SourceConfig) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| SourceError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        let _: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            config,
        })
    }

    /// Creates an in-memory database. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory(config: SourceConfig) -> SourceResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            config,
        })
    }


    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> SourceResult<T>,
    ) -> SourceResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| SourceError::Unavailable("record store lock poisoned".to_string()))?;
        f(&mut conn)
    }

    /// Creates the schema. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails or the database was written
    /// by a newer schema version.
    pub fn init(&self) -> SourceResult<()> {
        self.with_conn(|conn| {
            let is_init: i64 = conn.query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))?;
            if is_init == 0 {
                conn.execute_batch(SCHEMA_SQL)?;
                conn.execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])?;
                return Ok(());
            }

            if let Some(version) = schema_version(conn)?
                && version > CURRENT_SCHEMA_VERSION
            {
                return Err(SourceError::Migration(format!(
                    "database schema v{version} is newer than supported v{CURRENT_SCHEMA_VERSION}"
                )));
            }
            Ok(())
        })
    }

    /// Checks if the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    pub fn is_initialized(&self) -> SourceResult<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))?;
            Ok(count > 0)
        })
    }

    /// Declares a table. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_table(&self, name: &str) -> SourceResult<bool> {
        self.with_conn(|conn| create_table(conn, name))
    }

    /// Names of the declared tables, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn table_names(&self) -> SourceResult<Vec<String>> {
        self.with_conn(|conn| table_names(conn))
    }

    /// Removes a table and its records. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn drop_table(&self, name: &str) -> SourceResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM source_tables WHERE name = ?", params![name])?;
            Ok(removed > 0)
        })
    }

    /// Appends records to a table, declaring the table if needed.
    ///
    /// Records without an identifier are assigned one. Returns the stored
    /// identifiers in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or an identifier is already
    /// taken; no records are stored in that case.
    pub fn insert_records(&self, table: &str, records: &[NewRecord]) -> SourceResult<Vec<String>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            create_table(&tx, table)?;

            let mut position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM records WHERE table_name = ?",
                params![table],
                |row| row.get(0),
            )?;
            let mut sequence: i64 =
                tx.query_row("SELECT COALESCE(MAX(rowid), 0) FROM records", [], |row| {
                    row.get(0)
                })?;
            let now = now();

            let mut ids = Vec::with_capacity(records.len());
            for record in records {
                let id = record.id.clone().unwrap_or_else(|| {
                    sequence += 1;
                    format!("rec{sequence:014}")
                });
                let fields = serde_json::to_string(&record.fields)?;
                tx.execute(
                    r"
                INSERT INTO records (id, table_name, position, fields, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
            ",
                    params![id, table, position, fields, now, now],
                )?;
                position += 1;
                ids.push(id);
            }

            tx.commit()?;
            Ok(ids)
        })
    }

    /// Gathers record store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    pub fn stats(&self) -> SourceResult<SourceStats> {
        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT t.name, COUNT(r.id)
                FROM source_tables t LEFT JOIN records r ON r.table_name = t.name
                GROUP BY t.name
                ORDER BY t.position
            ",
            )?;
            let tables = stmt
                .query_map([], |row| {
                    Ok(TableStats {
                        name: row.get(0)?,
                        records: row.get::<_, i64>(1)? as usize,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(SourceStats {
                record_count: tables.iter().map(|t| t.records).sum(),
                tables,
                schema_version: schema_version(conn)?.unwrap_or(0),
                db_size,
            })
        })
    }

    fn browse(&self, table: &str, limit: usize) -> SourceResult<Vec<Record>> {
        self.with_conn(|conn| {
            if !table_exists(conn, table)? {
                debug!(table, "browse of undeclared table");
                return Ok(Vec::new());
            }
            fetch_page(conn, table, limit, 0)
        })
    }

    fn count_pages(&self, table: &str) -> SourceResult<usize> {
        let page_size = self.config.page_size.max(1);
        self.with_conn(|conn| {
            let mut total = 0;
            loop {
                let in_page: i64 = conn.query_row(
                    r"
                SELECT COUNT(*) FROM (
                    SELECT 1 FROM records WHERE table_name = ?
                    ORDER BY position LIMIT ? OFFSET ?
                )
            ",
                    params![table, page_size as i64, total as i64],
                    |row| row.get(0),
                )?;
                total += in_page as usize;
                if (in_page as usize) < page_size {
                    return Ok(total);
                }
            }
        })
    }
}

#[async_trait]
impl TableSource for SqliteSource {
    async fn list_tables(&self) -> SourceResult<Vec<String>> {
        match &self.config.catalog {
            Some(catalog) => Ok(catalog.clone()),
            None => self.table_names(),
        }
    }

    async fn search_table(&self, table: &str, limit: usize) -> SourceResult<SearchResult> {
        let records = self.browse(table, limit.min(self.config.page_size))?;
        debug!(table, limit, found = records.len(), "sqlite browse");
        Ok(SearchResult::from_records(records))
    }

    async fn search_table_by_term(
        &self,
        table: &str,
        term: &str,
        limit: usize,
    ) -> SourceResult<SearchResult> {
        if term.trim().is_empty() {
            return self.search_table(table, limit).await;
        }
        let scanned = self.browse(table, self.config.scan_limit)?;
        let records = filter_by_term(scanned, term, limit);
        debug!(table, term, limit, found = records.len(), "sqlite term search");
        Ok(SearchResult::from_records(records))
    }

    async fn count_table(&self, table: &str) -> SourceResult<usize> {
        match self.count_pages(table) {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(table, error = %e, "count failed, reporting zero");
                Ok(0)
            }
        }
    }
}

fn schema_version(conn: &Connection) -> SourceResult<Option<u32>> {
    let version: Option<String> = conn
        .query_row(GET_VERSION_SQL, [], |row| row.get(0))
        .optional()?;
    Ok(version.and_then(|v| v.parse().ok()))
}

fn table_exists(conn: &Connection, name: &str) -> SourceResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM source_tables WHERE name = ?",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn create_table(conn: &Connection, name: &str) -> SourceResult<bool> {
    if table_exists(conn, name)? {
        return Ok(false);
    }
    conn.execute(
        r"
        INSERT INTO source_tables (name, position, created_at)
        VALUES (?, (SELECT COALESCE(MAX(position), -1) + 1 FROM source_tables), ?)
    ",
        params![name, now()],
    )?;
    Ok(true)
}

fn table_names(conn: &Connection) -> SourceResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM source_tables ORDER BY position")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

fn fetch_page(
    conn: &Connection,
    table: &str,
    limit: usize,
    offset: usize,
) -> SourceResult<Vec<Record>> {
    let mut stmt = conn.prepare(PAGE_SQL)?;
    let rows = stmt
        .query_map(params![table, limit as i64, offset as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, fields)| {
            let fields: Map<String, Value> = serde_json::from_str(&fields)?;
            Ok(Record::with_fields(id, fields))
        })
        .collect()
}

/// Returns current Unix timestamp.
fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
