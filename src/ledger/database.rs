//! SQLite database shared by the session and ledger stores.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::DateTime;
use rusqlite::{Connection, params};
use tracing::{info, warn};

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// A stored row could not be decoded.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "database error: {e}"),
            Self::Corrupt(msg) => write!(f, "corrupt row: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Persistent SQLite database for sessions, expenses and incomes.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Self::init(Connection::open(path)?)?;
        let (expenses, incomes, sessions) = db.counts()?;
        info!(
            "Loaded database from {:?} ({} expenses, {} incomes, {} sessions)",
            path, expenses, incomes, sessions
        );
        Ok(db)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        db.backfill_epochs()?;
        Ok(db)
    }

    /// Lock the connection. A poisoned lock still holds a usable
    /// connection since every statement is atomic.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn();

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS sessions (
                user TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                amount TEXT
            );

            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                amount TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                category_name TEXT NOT NULL,
                ts_utc TEXT NOT NULL,
                ts_epoch INTEGER
            );

            CREATE TABLE IF NOT EXISTS incomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                amount TEXT NOT NULL,
                source TEXT NOT NULL,
                ts_utc TEXT NOT NULL,
                ts_epoch INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_user_epoch ON expenses(user, ts_epoch);
            CREATE INDEX IF NOT EXISTS idx_incomes_user_epoch ON incomes(user, ts_epoch);
        "#)?;
        Ok(())
    }

    /// Fill `ts_epoch` for legacy rows that only carry `ts_utc`.
    fn backfill_epochs(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        let mut updated = 0;

        for table in ["expenses", "incomes"] {
            let pending: Vec<(i64, String)> = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, ts_utc FROM {table} WHERE ts_epoch IS NULL"
                ))?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<Result<_, _>>()?
            };

            for (id, ts) in pending {
                match DateTime::parse_from_rfc3339(&ts.replace('Z', "+00:00")) {
                    Ok(dt) => {
                        conn.execute(
                            &format!("UPDATE {table} SET ts_epoch = ?1 WHERE id = ?2"),
                            params![dt.timestamp(), id],
                        )?;
                        updated += 1;
                    }
                    Err(e) => warn!("Backfill parse error for {table} row {id} ({ts}): {e}"),
                }
            }
        }

        if updated > 0 {
            info!("Backfilled ts_epoch on {updated} row(s)");
        }
        Ok(())
    }

    fn counts(&self) -> Result<(i64, i64, i64), StoreError> {
        let conn = self.conn();
        let count = |table: &str| -> Result<i64, rusqlite::Error> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };
        Ok((count("expenses")?, count("incomes")?, count("sessions")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_legacy_rows() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let db = Database::open(file.path()).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO expenses (user, amount, category_id, category_name, ts_utc, ts_epoch)
                     VALUES ('u', '5.00', 1, 'Renta', '2025-03-01T12:00:00Z', NULL)",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(file.path()).unwrap();
        let epoch: Option<i64> = db
            .conn()
            .query_row("SELECT ts_epoch FROM expenses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(epoch, Some(1_740_830_400));
    }

    #[test]
    fn test_unparseable_legacy_row_is_left_alone() {
        let db = Database::in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO incomes (user, amount, source, ts_utc, ts_epoch)
                 VALUES ('u', '5.00', 'x', 'not a date', NULL)",
                [],
            )
            .unwrap();
        db.backfill_epochs().unwrap();
        let epoch: Option<i64> = db
            .conn()
            .query_row("SELECT ts_epoch FROM incomes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(epoch, None);
    }
}
