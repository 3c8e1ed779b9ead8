//! Database schema for the record store.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Table catalog, in declaration order
CREATE TABLE IF NOT EXISTS source_tables (
    name TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

-- Records (JSON field maps, insertion-ordered keys)
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    table_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    fields TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (table_name) REFERENCES source_tables(name) ON DELETE CASCADE
);

-- Default browse order within a table
CREATE INDEX IF NOT EXISTS idx_records_view ON records(table_name, position);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// One page of a table in browse order.
pub const PAGE_SQL: &str = r"
SELECT id, fields FROM records
WHERE table_name = ?
ORDER BY position
LIMIT ? OFFSET ?;
";
