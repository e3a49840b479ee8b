//! SQLite credential store
//!
//! This module provides a SQLite-based implementation of the `CredentialStore`
//! and `AuditLog` traits.

use crate::credential::schema::initialize_schema;
use crate::credential::traits::{
    AuditLog, CredentialStore, RefreshAuditEntry, StoreError, StoreResult,
};
use crate::credential::{Cookie, Credential};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend for credentials and the refresh audit log
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the credential database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(account_id: i64, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            account_id,
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

impl CredentialStore for SqliteStore {
    fn get(&self, account_id: i64) -> StoreResult<Option<Credential>> {
        // Both reads happen inside one transaction so a concurrent writer in
        // another process cannot interleave between them.
        let tx = self.conn.unchecked_transaction()?;

        let row: Option<(String, String, String)> = tx
            .query_row(
                "SELECT access_token, refresh_token, last_refreshed FROM accounts
                 WHERE account_id = ?1",
                params![account_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((access_token, refresh_token, last_refreshed)) = row else {
            return Ok(None);
        };

        let cookies = {
            let mut stmt = tx.prepare(
                "SELECT name, value FROM account_cookies WHERE account_id = ?1 ORDER BY position",
            )?;
            let rows = stmt
                .query_map(params![account_id], |row| {
                    Ok(Cookie {
                        name: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        tx.commit()?;

        Ok(Some(Credential {
            account_id,
            access_token,
            refresh_token,
            cookies,
            last_refreshed: parse_timestamp(account_id, &last_refreshed)?,
        }))
    }

    fn update(&mut self, credential: &Credential) -> StoreResult<()> {
        let account_id = credential.account_id;
        let tx = self.conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT last_refreshed FROM accounts WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(raw) = current {
            let current = parse_timestamp(account_id, &raw)?;
            if credential.last_refreshed <= current {
                return Err(StoreError::NonMonotonic {
                    account_id,
                    current,
                    attempted: credential.last_refreshed,
                });
            }
        }

        tx.execute(
            "INSERT INTO accounts (account_id, access_token, refresh_token, last_refreshed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(account_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                last_refreshed = excluded.last_refreshed",
            params![
                account_id,
                credential.access_token,
                credential.refresh_token,
                format_timestamp(&credential.last_refreshed)
            ],
        )?;

        tx.execute(
            "DELETE FROM account_cookies WHERE account_id = ?1",
            params![account_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO account_cookies (account_id, position, name, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, cookie) in credential.cookies.iter().enumerate() {
                stmt.execute(params![account_id, position as i64, cookie.name, cookie.value])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl AuditLog for SqliteStore {
    fn append_refresh_attempt(&mut self, entry: &RefreshAuditEntry) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO refresh_log (account_id, attempted_at, outcome, response)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.account_id,
                format_timestamp(&entry.attempted_at),
                entry.outcome,
                entry.response
            ],
        )?;
        Ok(())
    }

    fn refresh_history(&self, account_id: i64) -> StoreResult<Vec<RefreshAuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT attempted_at, outcome, response FROM refresh_log
             WHERE account_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![account_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(attempted_at, outcome, response)| {
                Ok(RefreshAuditEntry {
                    account_id,
                    attempted_at: parse_timestamp(account_id, &attempted_at)?,
                    outcome,
                    response,
                })
            })
            .collect()
    }
}
