//! Append-only expense and income records.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ToSql, params};
use rust_decimal::Decimal;

use crate::ledger::catalog::CategoryId;
use crate::ledger::database::{Database, StoreError};
use crate::ledger::window::TimeWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub user: String,
    pub amount: Decimal,
    pub category: CategoryId,
    /// Catalog name at write time.
    pub category_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ExpenseRecord {
    pub fn new(user: &str, amount: Decimal, category: CategoryId, timestamp: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            amount,
            category,
            category_name: category.name().to_string(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRecord {
    pub user: String,
    pub amount: Decimal,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl IncomeRecord {
    pub fn new(user: &str, amount: Decimal, source: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            amount,
            source: source.to_string(),
            timestamp,
        }
    }
}

/// Which records a sum runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFilter {
    AllExpenses,
    Category(CategoryId),
    Incomes,
}

pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Database {
    pub fn append_expense(&self, record: &ExpenseRecord) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO expenses (user, amount, category_id, category_name, ts_utc, ts_epoch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user,
                record.amount.to_string(),
                record.category.get(),
                record.category_name,
                iso_timestamp(&record.timestamp),
                record.timestamp.timestamp(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn append_income(&self, record: &IncomeRecord) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO incomes (user, amount, source, ts_utc, ts_epoch)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user,
                record.amount.to_string(),
                record.source,
                iso_timestamp(&record.timestamp),
                record.timestamp.timestamp(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Exact sum of matching amounts within `[window.start, window.end)`.
    pub fn sum_in_range(&self, user: &str, filter: LedgerFilter, window: &TimeWindow) -> Result<Decimal, StoreError> {
        let category_id;
        let (sql, extra): (&str, Option<&dyn ToSql>) = match filter {
            LedgerFilter::AllExpenses => (
                "SELECT amount FROM expenses WHERE user = ?1 AND ts_epoch >= ?2 AND ts_epoch < ?3",
                None,
            ),
            LedgerFilter::Category(id) => {
                category_id = id.get();
                (
                    "SELECT amount FROM expenses
                     WHERE user = ?1 AND ts_epoch >= ?2 AND ts_epoch < ?3 AND category_id = ?4",
                    Some(&category_id as &dyn ToSql),
                )
            }
            LedgerFilter::Incomes => (
                "SELECT amount FROM incomes WHERE user = ?1 AND ts_epoch >= ?2 AND ts_epoch < ?3",
                None,
            ),
        };

        let mut args: Vec<&dyn ToSql> = vec![&user, &window.start, &window.end];
        args.extend(extra);

        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let amounts = stmt.query_map(args.as_slice(), |row| row.get::<_, String>(0))?;

        let mut total = Decimal::ZERO;
        for raw in amounts {
            let raw = raw?;
            let amount = Decimal::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("amount {raw:?}: {e}")))?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| StoreError::Corrupt(format!("sum overflowed adding {raw:?}")))?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cat(id: u8) -> CategoryId {
        CategoryId::new(id).unwrap()
    }

    fn at(epoch: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(epoch, 0).unwrap()
    }

    fn window(start: i64, end: i64) -> TimeWindow {
        TimeWindow { start, end, label: String::new() }
    }

    #[test]
    fn test_append_snapshots_category_name() {
        let record = ExpenseRecord::new("u", Decimal::new(1250, 2), cat(6), at(1_000));
        assert_eq!(record.category_name, "Restaurante");

        let db = Database::in_memory().unwrap();
        db.append_expense(&record).unwrap();
        let (name, ts_utc, ts_epoch): (String, String, i64) = db
            .conn()
            .query_row("SELECT category_name, ts_utc, ts_epoch FROM expenses", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(name, "Restaurante");
        assert_eq!(ts_utc, "1970-01-01T00:16:40Z");
        assert_eq!(ts_epoch, 1_000);
    }

    #[test]
    fn test_duplicates_are_appended() {
        let db = Database::in_memory().unwrap();
        let record = ExpenseRecord::new("u", Decimal::ONE, cat(1), at(100));
        let first = db.append_expense(&record).unwrap();
        let second = db.append_expense(&record).unwrap();
        assert_ne!(first, second);
        let total = db.sum_in_range("u", LedgerFilter::AllExpenses, &window(0, 1_000)).unwrap();
        assert_eq!(total, Decimal::TWO);
    }

    #[test]
    fn test_sum_is_half_open_and_scoped() {
        let db = Database::in_memory().unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(1000, 2), cat(1), at(100))).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(250, 2), cat(2), at(150))).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(999, 2), cat(1), at(200))).unwrap();
        db.append_expense(&ExpenseRecord::new("other", Decimal::new(500, 2), cat(1), at(120))).unwrap();
        db.append_income(&IncomeRecord::new("u", Decimal::new(30000, 2), "Salario", at(110))).unwrap();

        let w = window(100, 200);
        assert_eq!(db.sum_in_range("u", LedgerFilter::Category(cat(1)), &w).unwrap(), Decimal::new(1000, 2));
        assert_eq!(db.sum_in_range("u", LedgerFilter::AllExpenses, &w).unwrap(), Decimal::new(1250, 2));
        assert_eq!(db.sum_in_range("u", LedgerFilter::Incomes, &w).unwrap(), Decimal::new(30000, 2));
        assert_eq!(db.sum_in_range("u", LedgerFilter::Category(cat(8)), &w).unwrap(), Decimal::ZERO);
        assert_eq!(db.sum_in_range("nobody", LedgerFilter::Incomes, &w).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_sums_are_exact() {
        let db = Database::in_memory().unwrap();
        for _ in 0..10 {
            db.append_expense(&ExpenseRecord::new("u", Decimal::new(10, 2), cat(3), at(5))).unwrap();
        }
        let total = db.sum_in_range("u", LedgerFilter::Category(cat(3)), &window(0, 10)).unwrap();
        assert_eq!(total, Decimal::ONE);
    }

    #[test]
    fn test_overflowing_sum_is_an_error() {
        let db = Database::in_memory().unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::MAX, cat(1), at(5))).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::MAX, cat(1), at(6))).unwrap();

        let result = db.sum_in_range("u", LedgerFilter::AllExpenses, &window(0, 10));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
