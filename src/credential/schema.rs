//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the credential database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per account
CREATE TABLE IF NOT EXISTS accounts (
    account_id INTEGER PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    last_refreshed TEXT NOT NULL
);

-- Session cookies, ordered by position
CREATE TABLE IF NOT EXISTS account_cookies (
    account_id INTEGER NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (account_id, position)
);

-- Every refresh attempt, successful or not
CREATE TABLE IF NOT EXISTS refresh_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL,
    attempted_at TEXT NOT NULL,
    outcome TEXT NOT NULL,
    response TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_refresh_log_account ON refresh_log(account_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
