//! Database schema for the persistent response cache

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 2;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One live response per request fingerprint
CREATE TABLE IF NOT EXISTS responses (
    fingerprint TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    final_url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    fetched_at TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    ttl_ms INTEGER NOT NULL,
    -- epoch milliseconds, rounded up
    expires_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_responses_expires ON responses(expires_at_ms);
"#;

/// Initializes the database schema
///
/// Safe to run against an existing database. A cache written by an older
/// schema version is dropped and recreated empty.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let version = get_schema_version(conn)?;
    if version != 0 && version < SCHEMA_VERSION {
        tracing::info!(
            "Cache schema v{} is outdated, recreating as v{}",
            version,
            SCHEMA_VERSION
        );
        conn.execute_batch("DROP TABLE IF EXISTS responses;")?;
    }
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}
