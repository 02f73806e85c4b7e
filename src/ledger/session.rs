//! Per-user conversation state, persisted one row per user.

use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::warn;

use crate::ledger::database::{Database, StoreError};

/// Conversation state. Pending amounts only exist in the states that
/// captured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Idle,
    AwaitingAmount,
    AwaitingCategory { amount: Decimal },
    AwaitingIncomeAmount,
    AwaitingIncomeSource { amount: Decimal },
}

impl Session {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAmount => "awaiting_amount",
            Self::AwaitingCategory { .. } => "awaiting_category",
            Self::AwaitingIncomeAmount => "awaiting_income_amount",
            Self::AwaitingIncomeSource { .. } => "awaiting_income_source",
        }
    }

    pub fn pending_amount(&self) -> Option<Decimal> {
        match self {
            Self::AwaitingCategory { amount } | Self::AwaitingIncomeSource { amount } => Some(*amount),
            _ => None,
        }
    }

    /// Rebuild a session from its stored columns. Combinations that cannot
    /// be represented (an amount-captured state without an amount) are `None`.
    fn from_columns(tag: &str, amount: Option<Decimal>) -> Option<Self> {
        match (tag, amount) {
            ("idle", _) => Some(Self::Idle),
            ("awaiting_amount", _) => Some(Self::AwaitingAmount),
            ("awaiting_income_amount", _) => Some(Self::AwaitingIncomeAmount),
            ("awaiting_category", Some(amount)) => Some(Self::AwaitingCategory { amount }),
            ("awaiting_income_source", Some(amount)) => Some(Self::AwaitingIncomeSource { amount }),
            _ => None,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Database {
    /// Load the session for `user`, persisting a fresh `idle` one if absent.
    pub fn get_or_create_session(&self, user: &str) -> Result<Session, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO sessions (user, state, amount) VALUES (?1, 'idle', NULL)",
            params![user],
        )?;

        let (tag, amount): (String, Option<String>) = conn.query_row(
            "SELECT state, amount FROM sessions WHERE user = ?1",
            params![user],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let amount = match amount {
            Some(raw) => Some(
                Decimal::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("session amount {raw:?} for {user}: {e}")))?,
            ),
            None => None,
        };

        Ok(Session::from_columns(&tag, amount).unwrap_or_else(|| {
            warn!("Unrepresentable session state {tag:?} for {user}, treating as idle");
            Session::Idle
        }))
    }

    /// Last-write-wins replacement of the user's session.
    pub fn upsert_session(&self, user: &str, session: Session) -> Result<(), StoreError> {
        let amount = session.pending_amount().map(|a| a.to_string());
        self.conn().execute(
            "INSERT INTO sessions (user, state, amount) VALUES (?1, ?2, ?3)
             ON CONFLICT(user) DO UPDATE SET state = excluded.state, amount = excluded.amount",
            params![user, session.tag(), amount],
        )?;
        Ok(())
    }

    pub fn reset_session(&self, user: &str) -> Result<(), StoreError> {
        self.upsert_session(user, Session::Idle)
    }

    /// Peek without creating.
    #[cfg(test)]
    pub fn find_session(&self, user: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()
            .query_row("SELECT state FROM sessions WHERE user = ?1", params![user], |row| row.get(0))
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_persists_idle() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.find_session("alice").unwrap(), None);
        assert_eq!(db.get_or_create_session("alice").unwrap(), Session::Idle);
        assert_eq!(db.find_session("alice").unwrap().as_deref(), Some("idle"));
    }

    #[test]
    fn test_upsert_round_trips_pending_amount() {
        let db = Database::in_memory().unwrap();
        let session = Session::AwaitingCategory { amount: Decimal::new(1250, 2) };
        db.upsert_session("bob", session).unwrap();
        assert_eq!(db.get_or_create_session("bob").unwrap(), session);

        db.upsert_session("bob", Session::AwaitingIncomeAmount).unwrap();
        let loaded = db.get_or_create_session("bob").unwrap();
        assert_eq!(loaded, Session::AwaitingIncomeAmount);
        assert_eq!(loaded.pending_amount(), None);
    }

    #[test]
    fn test_reset() {
        let db = Database::in_memory().unwrap();
        db.upsert_session("carol", Session::AwaitingIncomeSource { amount: Decimal::ONE }).unwrap();
        db.reset_session("carol").unwrap();
        assert_eq!(db.get_or_create_session("carol").unwrap(), Session::Idle);
    }

    #[test]
    fn test_sessions_are_per_user() {
        let db = Database::in_memory().unwrap();
        db.upsert_session("a", Session::AwaitingAmount).unwrap();
        assert_eq!(db.get_or_create_session("b").unwrap(), Session::Idle);
        assert_eq!(db.get_or_create_session("a").unwrap(), Session::AwaitingAmount);
    }

    #[test]
    fn test_missing_amount_degrades_to_idle() {
        let db = Database::in_memory().unwrap();
        db.conn()
            .execute("INSERT INTO sessions (user, state, amount) VALUES ('x', 'awaiting_category', NULL)", [])
            .unwrap();
        assert_eq!(db.get_or_create_session("x").unwrap(), Session::Idle);
    }
}
