//! Conversation state machine: decides what each inbound message means
//! given the user's session, performs the writes and reads, and replies.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::ledger::aggregate::Aggregator;
use crate::ledger::catalog::{self, CATALOG, CategoryId};
use crate::ledger::commands::{self, Command, SummaryRequest, Trigger};
use crate::ledger::database::{Database, StoreError};
use crate::ledger::message::InboundEvent;
use crate::ledger::mirror::{LedgerMirror, MirrorEntry};
use crate::ledger::notifier::{ChoiceOption, Notifier};
use crate::ledger::report;
use crate::ledger::session::Session;
use crate::ledger::store::{ExpenseRecord, IncomeRecord};
use crate::ledger::user_locks::UserLocks;
use crate::ledger::window::WindowResolver;

pub struct MessageRouter {
    db: Arc<Database>,
    mirror: Arc<dyn LedgerMirror>,
    notifier: Arc<dyn Notifier>,
    aggregator: Aggregator,
    windows: WindowResolver,
    locks: UserLocks,
}

impl MessageRouter {
    pub fn new(
        db: Arc<Database>,
        mirror: Arc<dyn LedgerMirror>,
        notifier: Arc<dyn Notifier>,
        windows: WindowResolver,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(db.clone(), mirror.clone()),
            db,
            mirror,
            notifier,
            windows,
            locks: UserLocks::new(),
        }
    }

    /// Handle one inbound event to completion. Never fails: store errors are
    /// logged and answered with an apology, everything else degrades locally.
    pub async fn handle(&self, event: InboundEvent) {
        let user = event.sender.as_str();
        // The whole read-decide-write sequence runs under the user's lock.
        let _guard = self.locks.acquire(user).await;

        if let Err(e) = self.dispatch(&event).await {
            error!("Failed to handle message from {user}: {e}");
            self.reply(user, report::STORE_FAILURE).await;
        }
    }

    async fn dispatch(&self, event: &InboundEvent) -> Result<(), StoreError> {
        let user = event.sender.as_str();
        let session = self.db.get_or_create_session(user)?;
        let lowered = event.visible_text().trim().to_lowercase();
        debug!("Message from {user} in state {session}: {lowered:?}");

        if let Some(command) = Command::parse(&lowered) {
            return self.run_command(user, session, command).await;
        }

        match session {
            Session::Idle => self.on_idle(user, &lowered).await,
            Session::AwaitingAmount => self.on_expense_amount(user, event).await,
            Session::AwaitingCategory { amount } => self.on_category(user, event, &lowered, amount).await,
            Session::AwaitingIncomeAmount => self.on_income_amount(user, event).await,
            Session::AwaitingIncomeSource { amount } => self.on_income_source(user, event, amount).await,
        }
    }

    async fn run_command(&self, user: &str, session: Session, command: Command) -> Result<(), StoreError> {
        match command {
            Command::Reset => {
                self.db.reset_session(user)?;
                info!("🔄 Session reset for {user} (was {session})");
                self.reply(user, &report::reset_done()).await;
            }
            Command::Status => {
                self.reply(user, &report::status(session.tag(), session.pending_amount())).await;
            }
            Command::Summary(request) => self.send_summary(user, request).await?,
            Command::Balance(spec) => {
                let window = self.windows.resolve(spec);
                let balance = self.aggregator.balance(user, &window).await?;
                debug!("Balance for {user} from {:?}", balance.source);
                self.reply(user, &report::balance_summary(&window.label, &balance.value)).await;
            }
        }
        Ok(())
    }

    async fn send_summary(&self, user: &str, request: SummaryRequest) -> Result<(), StoreError> {
        let text = match request {
            SummaryRequest::AllTime => {
                let window = self.windows.all_time_window();
                let totals = self.aggregator.all_category_totals(user, &window).await?;
                report::all_time_summary(&totals.value)
            }
            SummaryRequest::Windowed { category: Some(category), window } => {
                let window = self.windows.resolve(window);
                let total = self.aggregator.category_total(user, category, &window).await?;
                report::category_summary(&window.label, category, total.value)
            }
            SummaryRequest::Windowed { category: None, window } => {
                let window = self.windows.resolve(window);
                let totals = self.aggregator.all_category_totals(user, &window).await?;
                report::windowed_summary(&window.label, &totals.value)
            }
        };
        self.reply(user, &text).await;
        Ok(())
    }

    async fn on_idle(&self, user: &str, lowered: &str) -> Result<(), StoreError> {
        match Trigger::parse(lowered) {
            Some(Trigger::Expense) => {
                self.db.upsert_session(user, Session::AwaitingAmount)?;
                info!("💸 {user} started an expense");
                self.reply(user, report::ASK_EXPENSE_AMOUNT).await;
            }
            Some(Trigger::Income) => {
                self.db.upsert_session(user, Session::AwaitingIncomeAmount)?;
                info!("💵 {user} started an income");
                self.reply(user, report::ASK_INCOME_AMOUNT).await;
            }
            None => self.reply(user, report::HELP).await,
        }
        Ok(())
    }

    async fn on_expense_amount(&self, user: &str, event: &InboundEvent) -> Result<(), StoreError> {
        let Some(amount) = commands::parse_amount(event.visible_text()) else {
            self.reply(user, report::INVALID_AMOUNT).await;
            return Ok(());
        };

        self.db.upsert_session(user, Session::AwaitingCategory { amount })?;
        self.reply(user, &report::amount_captured(amount)).await;
        self.present_categories(user).await;
        Ok(())
    }

    async fn on_category(
        &self,
        user: &str,
        event: &InboundEvent,
        lowered: &str,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let Some(category) = resolve_category(event, lowered) else {
            self.reply(user, report::INVALID_CATEGORY).await;
            self.present_categories(user).await;
            return Ok(());
        };

        let record = ExpenseRecord::new(user, amount, category, Utc::now());
        self.db.append_expense(&record)?;
        // Back to idle before any later step can fail.
        self.db.reset_session(user)?;
        info!("✅ Expense saved for {user}: {} in {}", amount, category.name());

        if let Err(e) = self.mirror.append(MirrorEntry::Expense(&record)).await {
            warn!("Could not mirror expense for {user}: {e}");
        }

        let month = self.windows.month_window();
        let month_total = match self.aggregator.category_total(user, category, &month).await {
            Ok(total) => Some(total.value),
            Err(e) => {
                warn!("Month total for {user} unavailable: {e}");
                None
            }
        };

        self.reply(user, &report::expense_saved(amount, category, month_total)).await;
        Ok(())
    }

    async fn on_income_amount(&self, user: &str, event: &InboundEvent) -> Result<(), StoreError> {
        let Some(amount) = commands::parse_amount(event.visible_text()) else {
            self.reply(user, report::INVALID_AMOUNT).await;
            return Ok(());
        };

        self.db.upsert_session(user, Session::AwaitingIncomeSource { amount })?;
        self.reply(user, &report::amount_captured(amount)).await;
        self.reply(user, report::ASK_INCOME_SOURCE).await;
        Ok(())
    }

    async fn on_income_source(&self, user: &str, event: &InboundEvent, amount: Decimal) -> Result<(), StoreError> {
        let Some(source) = commands::parse_source(event.visible_text()) else {
            self.reply(user, report::INVALID_SOURCE).await;
            return Ok(());
        };

        let record = IncomeRecord::new(user, amount, source, Utc::now());
        self.db.append_income(&record)?;
        self.db.reset_session(user)?;
        info!("✅ Income saved for {user}: {} from {}", amount, source);

        if let Err(e) = self.mirror.append(MirrorEntry::Income(&record)).await {
            warn!("Could not mirror income for {user}: {e}");
        }

        self.reply(user, &report::income_saved(amount, source)).await;
        Ok(())
    }

    async fn present_categories(&self, user: &str) {
        let options: Vec<ChoiceOption> = CATALOG
            .iter()
            .map(|c| ChoiceOption { id: c.id.to_string(), label: c.label() })
            .collect();

        if !self.notifier.send_choice_list(user, report::CATEGORY_PROMPT, &options).await {
            self.reply(user, &report::category_menu_fallback()).await;
        }
    }

    async fn reply(&self, user: &str, text: &str) {
        if let Err(e) = self.notifier.send_text(user, text).await {
            warn!("Dropping reply to {user}: {e}");
        }
    }
}

/// A list selection id wins; otherwise the typed numeral.
fn resolve_category(event: &InboundEvent, lowered: &str) -> Option<CategoryId> {
    event
        .selection_id()
        .and_then(catalog::lookup)
        .or_else(|| catalog::lookup(lowered))
}
