//! Text command recognition and argument parsing.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::ledger::catalog::{self, CategoryId};
use crate::ledger::window::WindowSpec;

const RESET_WORDS: [&str; 4] = ["reset", "reiniciar", "cancel", "cancelar"];
const STATUS_WORD: &str = "estado";
const SUMMARY_WORD: &str = "resumen";
const BALANCE_WORD: &str = "saldo";

const EXPENSE_TRIGGERS: [&str; 4] = ["gasto", "nuevo gasto", "ingresar gasto", "ingresar un gasto"];
const INCOME_TRIGGERS: [&str; 5] = [
    "ingreso",
    "nuevo ingreso",
    "ingresar ingreso",
    "ingresar un ingreso",
    "registrar ingreso",
];

/// Minimum length of an income source description.
pub const MIN_SOURCE_LEN: usize = 2;

/// Largest amount accepted for a single record, in whole dollars.
pub const MAX_AMOUNT_USD: i64 = 1_000_000_000;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("amount regex is valid"));

/// Commands that apply regardless of the conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    Status,
    Summary(SummaryRequest),
    Balance(WindowSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryRequest {
    /// Bare `resumen`: every category over the whole history.
    AllTime,
    Windowed {
        category: Option<CategoryId>,
        window: WindowSpec,
    },
}

/// Phrases that start a capture flow from `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Expense,
    Income,
}

impl Command {
    /// Parse a lowercased, trimmed message.
    pub fn parse(lowered: &str) -> Option<Self> {
        if RESET_WORDS.contains(&lowered) {
            return Some(Self::Reset);
        }
        if lowered == STATUS_WORD {
            return Some(Self::Status);
        }

        let mut tokens = lowered.split_whitespace();
        match tokens.next() {
            Some(SUMMARY_WORD) => Some(Self::Summary(parse_summary_args(&tokens.collect::<Vec<_>>()))),
            Some(BALANCE_WORD) => Some(Self::Balance(parse_balance_args(&tokens.collect::<Vec<_>>()))),
            _ => None,
        }
    }
}

fn parse_summary_args(args: &[&str]) -> SummaryRequest {
    let window_or_month = |token: &str| WindowSpec::from_token(token).unwrap_or(WindowSpec::Month);

    match args {
        [] => SummaryRequest::AllTime,
        [only] => match (WindowSpec::from_token(only), catalog::lookup(only)) {
            (Some(window), _) => SummaryRequest::Windowed { category: None, window },
            (None, Some(category)) => SummaryRequest::Windowed {
                category: Some(category),
                window: WindowSpec::Month,
            },
            (None, None) => SummaryRequest::Windowed {
                category: None,
                window: WindowSpec::Month,
            },
        },
        [first, second, ..] => match catalog::lookup(first) {
            Some(category) => SummaryRequest::Windowed {
                category: Some(category),
                window: window_or_month(*second),
            },
            None => SummaryRequest::Windowed {
                category: None,
                window: window_or_month(*first),
            },
        },
    }
}

fn parse_balance_args(args: &[&str]) -> WindowSpec {
    args.first()
        .and_then(|token| WindowSpec::from_token(token))
        .unwrap_or(WindowSpec::Month)
}

impl Trigger {
    pub fn parse(lowered: &str) -> Option<Self> {
        if EXPENSE_TRIGGERS.contains(&lowered) {
            Some(Self::Expense)
        } else if INCOME_TRIGGERS.contains(&lowered) {
            Some(Self::Income)
        } else {
            None
        }
    }
}

/// Extract the first numeric token, accepting `,` or `.` as the decimal
/// separator, rounded to cents. Non-positive, missing or amounts above
/// [`MAX_AMOUNT_USD`] are `None`.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(',', ".");
    let matched = AMOUNT_RE.find(&cleaned)?.as_str();

    // ".5" / "-.5" need a leading zero for the decimal parser.
    let (sign, digits) = match matched.chars().next() {
        Some(c @ ('+' | '-')) => (Some(c), &matched[1..]),
        _ => (None, matched),
    };
    let mut normalized = String::with_capacity(matched.len() + 1);
    if sign == Some('-') {
        normalized.push('-');
    }
    if digits.starts_with('.') {
        normalized.push('0');
    }
    normalized.push_str(digits);

    let amount = Decimal::from_str(&normalized).ok()?.round_dp(2);
    (amount > Decimal::ZERO && amount <= Decimal::from(MAX_AMOUNT_USD)).then_some(amount)
}

/// Validate an income source description.
pub fn parse_source(text: &str) -> Option<&str> {
    let source = text.trim();
    (source.chars().count() >= MIN_SOURCE_LEN).then_some(source)
}
