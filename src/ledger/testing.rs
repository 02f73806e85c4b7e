//! In-memory doubles for the mirror and the chat channel.

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::ledger::catalog::CategoryId;
use crate::ledger::mirror::{LedgerMirror, MirrorBalance, MirrorEntry, MirrorError, MirrorTotals};
use crate::ledger::notifier::{ChoiceOption, Notifier, NotifyError};
use crate::ledger::window::TimeWindow;

#[derive(Clone)]
enum Mode {
    Down,
    Malformed,
    Up { totals: MirrorTotals, expenses: Decimal, incomes: Decimal },
}

/// Mirror whose answers are scripted by the test.
pub struct ScriptedMirror {
    mode: Mutex<Mode>,
    /// `(kind, user, amount)` of every append received.
    pub appended: Mutex<Vec<(&'static str, String, Decimal)>>,
}

impl ScriptedMirror {
    fn with(mode: Mode) -> Self {
        Self { mode: Mutex::new(mode), appended: Mutex::new(Vec::new()) }
    }

    pub fn down() -> Self {
        Self::with(Mode::Down)
    }

    pub fn malformed() -> Self {
        Self::with(Mode::Malformed)
    }

    pub fn up(totals: MirrorTotals, expenses: Decimal, incomes: Decimal) -> Self {
        Self::with(Mode::Up { totals, expenses, incomes })
    }

    pub fn set_up(&self, totals: MirrorTotals, expenses: Decimal, incomes: Decimal) {
        *self.mode.lock().unwrap() = Mode::Up { totals, expenses, incomes };
    }

    pub fn appended_count(&self) -> usize {
        self.appended.lock().unwrap().len()
    }

    fn mode(&self) -> Mode {
        self.mode.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerMirror for ScriptedMirror {
    async fn append(&self, entry: MirrorEntry<'_>) -> Result<(), MirrorError> {
        if let Mode::Down = self.mode() {
            return Err(MirrorError::Transport("connection refused".into()));
        }
        let row = match entry {
            MirrorEntry::Expense(r) => ("expense", r.user.clone(), r.amount),
            MirrorEntry::Income(r) => ("income", r.user.clone(), r.amount),
        };
        self.appended.lock().unwrap().push(row);
        Ok(())
    }

    async fn summary(
        &self,
        _user: &str,
        _window: &TimeWindow,
        category: Option<CategoryId>,
    ) -> Result<MirrorTotals, MirrorError> {
        match self.mode() {
            Mode::Down => Err(MirrorError::Timeout),
            Mode::Malformed => Err(MirrorError::Malformed("missing `totals` object".into())),
            Mode::Up { mut totals, .. } => {
                if let Some(category) = category {
                    totals.retain(|id, _| *id == category);
                }
                Ok(totals)
            }
        }
    }

    async fn balance(&self, _user: &str, _window: &TimeWindow) -> Result<MirrorBalance, MirrorError> {
        match self.mode() {
            Mode::Down => Err(MirrorError::Timeout),
            Mode::Malformed => Err(MirrorError::Malformed("missing `incomes_total`".into())),
            Mode::Up { expenses, incomes, .. } => Ok(MirrorBalance {
                expenses_total: expenses,
                incomes_total: incomes,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { user: String, text: String },
    ChoiceList { user: String, title: String, options: Vec<ChoiceOption> },
}

/// Notifier that records everything it is asked to send.
pub struct RecordingNotifier {
    rich_lists: bool,
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self { rich_lists: true, sent: Mutex::new(Vec::new()) }
    }

    /// A channel that refuses every choice list.
    pub fn text_only() -> Self {
        Self { rich_lists: false, sent: Mutex::new(Vec::new()) }
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                Sent::ChoiceList { .. } => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }

    pub fn choice_lists(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Sent::ChoiceList { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, user: &str, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(Sent::Text { user: user.into(), text: text.into() });
        Ok(())
    }

    async fn send_choice_list(&self, user: &str, title: &str, options: &[ChoiceOption]) -> bool {
        if !self.rich_lists {
            return false;
        }
        self.sent.lock().unwrap().push(Sent::ChoiceList {
            user: user.into(),
            title: title.into(),
            options: options.to_vec(),
        });
        true
    }
}
