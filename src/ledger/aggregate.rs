//! Category totals and balances, reconciled between the mirror and the
//! local store.
//!
//! Every request asks the mirror first. A well-formed mirror answer is
//! used verbatim; any mirror failure (including "not configured") falls
//! back to the same computation over the local store. The decision is made
//! per call, nothing is cached.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::ledger::catalog::{self, CategoryId};
use crate::ledger::database::{Database, StoreError};
use crate::ledger::mirror::{LedgerMirror, MirrorError, MirrorTotals};
use crate::ledger::store::LedgerFilter;
use crate::ledger::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsSource {
    Mirror,
    Local,
}

/// A value together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: TotalsSource,
}

impl<T> Sourced<T> {
    fn mirror(value: T) -> Self {
        Self { value, source: TotalsSource::Mirror }
    }

    fn local(value: T) -> Self {
        Self { value, source: TotalsSource::Local }
    }
}

/// Per-category totals; always holds every catalog category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotals(BTreeMap<CategoryId, Decimal>);

impl CategoryTotals {
    pub fn from_partial(mut partial: MirrorTotals) -> Self {
        Self(
            catalog::ids()
                .map(|id| (id, partial.remove(&id).unwrap_or(Decimal::ZERO)))
                .collect(),
        )
    }

    pub fn get(&self, id: CategoryId) -> Decimal {
        self.0.get(&id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, Decimal)> + '_ {
        self.0.iter().map(|(id, total)| (*id, *total))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Saturates instead of overflowing on absurd local totals.
    pub fn grand_total(&self) -> Decimal {
        self.0.values().fold(Decimal::ZERO, |acc, total| acc.saturating_add(*total))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub incomes: Decimal,
    pub expenses: Decimal,
}

impl Balance {
    pub fn net(&self) -> Decimal {
        self.incomes.saturating_sub(self.expenses)
    }
}

pub struct Aggregator {
    db: Arc<Database>,
    mirror: Arc<dyn LedgerMirror>,
}

impl Aggregator {
    pub fn new(db: Arc<Database>, mirror: Arc<dyn LedgerMirror>) -> Self {
        Self { db, mirror }
    }

    pub async fn category_total(
        &self,
        user: &str,
        category: CategoryId,
        window: &TimeWindow,
    ) -> Result<Sourced<Decimal>, StoreError> {
        match self.mirror.summary(user, window, Some(category)).await {
            Ok(totals) => Ok(Sourced::mirror(totals.get(&category).copied().unwrap_or(Decimal::ZERO))),
            Err(e) => {
                log_fallback("category total", &e);
                let total = self.db.sum_in_range(user, LedgerFilter::Category(category), window)?;
                Ok(Sourced::local(total))
            }
        }
    }

    pub async fn all_category_totals(
        &self,
        user: &str,
        window: &TimeWindow,
    ) -> Result<Sourced<CategoryTotals>, StoreError> {
        match self.mirror.summary(user, window, None).await {
            Ok(totals) => Ok(Sourced::mirror(CategoryTotals::from_partial(totals))),
            Err(e) => {
                log_fallback("category totals", &e);
                let mut totals = MirrorTotals::new();
                for id in catalog::ids() {
                    totals.insert(id, self.db.sum_in_range(user, LedgerFilter::Category(id), window)?);
                }
                Ok(Sourced::local(CategoryTotals::from_partial(totals)))
            }
        }
    }

    pub async fn income_total(&self, user: &str, window: &TimeWindow) -> Result<Sourced<Decimal>, StoreError> {
        match self.mirror.balance(user, window).await {
            Ok(balance) => Ok(Sourced::mirror(balance.incomes_total)),
            Err(e) => {
                log_fallback("income total", &e);
                Ok(Sourced::local(self.db.sum_in_range(user, LedgerFilter::Incomes, window)?))
            }
        }
    }

    /// Incomes minus expenses over the same window.
    pub async fn balance(&self, user: &str, window: &TimeWindow) -> Result<Sourced<Balance>, StoreError> {
        match self.mirror.balance(user, window).await {
            Ok(b) => Ok(Sourced::mirror(Balance {
                incomes: b.incomes_total,
                expenses: b.expenses_total,
            })),
            Err(e) => {
                log_fallback("balance", &e);
                Ok(Sourced::local(Balance {
                    incomes: self.db.sum_in_range(user, LedgerFilter::Incomes, window)?,
                    expenses: self.db.sum_in_range(user, LedgerFilter::AllExpenses, window)?,
                }))
            }
        }
    }
}

fn log_fallback(what: &str, error: &MirrorError) {
    match error {
        MirrorError::NotConfigured => debug!("Mirror not configured, {what} from local store"),
        e => warn!("Mirror unavailable ({e}), {what} from local store"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::{ExpenseRecord, IncomeRecord};
    use crate::ledger::testing::ScriptedMirror;
    use chrono::{TimeZone, Utc};

    fn cat(id: u8) -> CategoryId {
        CategoryId::new(id).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow { start: 0, end: 10_000, label: "w".into() }
    }

    fn seeded_db() -> Arc<Database> {
        let db = Database::in_memory().unwrap();
        let at = |s| Utc.timestamp_opt(s, 0).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(1000, 2), cat(1), at(100))).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(550, 2), cat(6), at(200))).unwrap();
        db.append_expense(&ExpenseRecord::new("u", Decimal::new(450, 2), cat(6), at(300))).unwrap();
        db.append_income(&IncomeRecord::new("u", Decimal::new(20000, 2), "Salario", at(400))).unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn test_local_fallback_when_mirror_down() {
        let agg = Aggregator::new(seeded_db(), Arc::new(ScriptedMirror::down()));

        let total = agg.category_total("u", cat(6), &window()).await.unwrap();
        assert_eq!(total, Sourced::local(Decimal::new(1000, 2)));

        let all = agg.all_category_totals("u", &window()).await.unwrap();
        assert_eq!(all.source, TotalsSource::Local);
        assert_eq!(all.value.len(), 8);
        assert_eq!(all.value.get(cat(1)), Decimal::new(1000, 2));
        assert_eq!(all.value.get(cat(8)), Decimal::ZERO);
        assert_eq!(all.value.grand_total(), Decimal::new(2000, 2));

        let balance = agg.balance("u", &window()).await.unwrap();
        assert_eq!(balance.source, TotalsSource::Local);
        assert_eq!(balance.value.net(), Decimal::new(18000, 2));

        let income = agg.income_total("u", &window()).await.unwrap();
        assert_eq!(income, Sourced::local(Decimal::new(20000, 2)));
    }

    #[tokio::test]
    async fn test_malformed_mirror_falls_back_to_local() {
        let agg = Aggregator::new(seeded_db(), Arc::new(ScriptedMirror::malformed()));
        let total = agg.category_total("u", cat(1), &window()).await.unwrap();
        assert_eq!(total, Sourced::local(Decimal::new(1000, 2)));
    }

    #[tokio::test]
    async fn test_mirror_totals_are_used_verbatim() {
        let mut totals = MirrorTotals::new();
        totals.insert(cat(6), Decimal::new(99900, 2));
        totals.insert(cat(2), Decimal::new(100, 2));
        let mirror = ScriptedMirror::up(totals, Decimal::new(5, 0), Decimal::new(7, 0));
        let agg = Aggregator::new(seeded_db(), Arc::new(mirror));

        // Differs from the local 10.00 on purpose.
        let total = agg.category_total("u", cat(6), &window()).await.unwrap();
        assert_eq!(total, Sourced::mirror(Decimal::new(99900, 2)));

        let all = agg.all_category_totals("u", &window()).await.unwrap();
        assert_eq!(all.source, TotalsSource::Mirror);
        assert_eq!(all.value.len(), 8);
        assert_eq!(all.value.get(cat(1)), Decimal::ZERO);
        assert_eq!(all.value.grand_total(), Decimal::new(100000, 2));

        let balance = agg.balance("u", &window()).await.unwrap();
        assert_eq!(balance.value, Balance { incomes: Decimal::new(7, 0), expenses: Decimal::new(5, 0) });
        assert_eq!(balance.value.net(), Decimal::new(2, 0));
    }

    #[test]
    fn test_totals_saturate_instead_of_panicking() {
        let mut partial = MirrorTotals::new();
        partial.insert(cat(1), Decimal::MAX);
        partial.insert(cat(2), Decimal::MAX);
        assert_eq!(CategoryTotals::from_partial(partial).grand_total(), Decimal::MAX);

        let balance = Balance { incomes: Decimal::MIN, expenses: Decimal::MAX };
        assert_eq!(balance.net(), Decimal::MIN);
    }

    #[tokio::test]
    async fn test_each_call_decides_its_own_source() {
        let mirror = Arc::new(ScriptedMirror::down());
        let agg = Aggregator::new(seeded_db(), mirror.clone());
        assert_eq!(agg.category_total("u", cat(1), &window()).await.unwrap().source, TotalsSource::Local);

        mirror.set_up(MirrorTotals::new(), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(agg.category_total("u", cat(1), &window()).await.unwrap().source, TotalsSource::Mirror);
    }
}
