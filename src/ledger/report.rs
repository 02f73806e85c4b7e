//! Text rendering of totals, balances and prompts.

use rust_decimal::Decimal;

use crate::ledger::aggregate::{Balance, CategoryTotals};
use crate::ledger::catalog::{CATALOG, CategoryId};

/// Display width of category names in tables.
const NAME_WIDTH: usize = 18;

const SUMMARY_USAGE: &str = "Puedes usar:\n\
    - resumen 7 | 15 | 30\n\
    - resumen mes\n\
    - resumen <cat>\n\
    - resumen <cat> 7 | 15 | 30 | mes\n\
    - saldo | saldo 7 | 15 | 30 | mes";

const COMMANDS: &str = "Comandos útiles:\n\
    - *resumen mes*\n\
    - *resumen 7* | *resumen 15* | *resumen 30*\n\
    - *resumen <cat>* o *resumen <cat> 7|15|30|mes*\n\
    - *saldo* o *saldo 7|15|30|mes*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrder {
    /// Fixed catalog id order.
    Catalog,
    /// Largest total first; ties keep catalog order.
    AmountDesc,
}

/// `$12.50`, `-$3.00`.
pub fn money(amount: Decimal) -> String {
    let cents = amount.round_dp(2);
    if cents.is_sign_negative() && !cents.is_zero() {
        format!("-${:.2}", cents.abs())
    } else {
        format!("${:.2}", cents.abs())
    }
}

fn truncate(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

pub fn totals_table(totals: &CategoryTotals, order: TableOrder) -> String {
    let mut rows: Vec<(CategoryId, Decimal)> = totals.iter().collect();
    if order == TableOrder::AmountDesc {
        rows.sort_by(|a, b| b.1.cmp(&a.1));
    }

    let mut lines = vec![
        "Categoría            Total (USD)".to_string(),
        "------------------- ----------".to_string(),
    ];
    for (id, total) in rows {
        lines.push(format!(
            "{}. {:<width$} ${:>10}",
            id,
            truncate(id.name(), NAME_WIDTH),
            format!("{:.2}", total),
            width = NAME_WIDTH
        ));
    }
    lines.push("------------------- ----------".to_string());
    lines.push(format!("TOTAL GENERAL        ${:>10}", format!("{:.2}", totals.grand_total())));
    lines.join("\n")
}

pub fn windowed_summary(label: &str, totals: &CategoryTotals) -> String {
    format!(
        "📊 Resumen ({label}):\n\n{}\n\nTotal general: {}\n\n{SUMMARY_USAGE}",
        totals_table(totals, TableOrder::Catalog),
        money(totals.grand_total()),
    )
}

pub fn all_time_summary(totals: &CategoryTotals) -> String {
    format!(
        "📊 Resumen total (todo el historial):\n\n{}\n\nTotal general: {}\n\n{SUMMARY_USAGE}",
        totals_table(totals, TableOrder::AmountDesc),
        money(totals.grand_total()),
    )
}

pub fn category_summary(label: &str, category: CategoryId, total: Decimal) -> String {
    format!(
        "📊 Resumen de *{}* ({label}):\nTotal: {}\n\n{SUMMARY_USAGE}",
        category.name(),
        money(total),
    )
}

pub fn balance_summary(label: &str, balance: &Balance) -> String {
    format!(
        "💰 Saldo ({label}):\nIngresos: {}\nGastos: {}\nBalance: {}",
        money(balance.incomes),
        money(balance.expenses),
        money(balance.net()),
    )
}

/// Confirmation of a saved expense. The month total line is left out when
/// it could not be computed.
pub fn expense_saved(amount: Decimal, category: CategoryId, month_total: Option<Decimal>) -> String {
    let month_line = month_total
        .map(|total| format!("📊 Total del mes en *{}*: {}\n\n", category.name(), money(total)))
        .unwrap_or_default();
    format!(
        "✅ Gasto guardado:\n- Monto: {}\n- Categoría: {}. {}\n\n\
         {month_line}{COMMANDS}\n\
         Escribe *ingresar gasto* para capturar otro.",
        money(amount),
        category,
        category.name(),
    )
}

pub fn income_saved(amount: Decimal, source: &str) -> String {
    format!(
        "✅ Ingreso guardado:\n- Monto: {}\n- Fuente: {source}\n\n{COMMANDS}\n\
         Escribe *ingreso* para registrar otro.",
        money(amount),
    )
}

pub fn status(state: &str, pending: Option<Decimal>) -> String {
    let pending = pending.map(money).unwrap_or_else(|| "—".to_string());
    format!("🧭 Estado actual: {state}\nMonto en memoria: {pending}")
}

pub fn reset_done() -> String {
    format!(
        "🔄 Sesión reiniciada.\n\
         Puedes empezar de nuevo escribiendo: *ingresar gasto* o *ingreso*.\n\n{COMMANDS}"
    )
}

pub const HELP: &str = "Hola 👋\n\
    Para registrar un gasto, escribe: *ingresar gasto*.\n\
    Para registrar un ingreso, escribe: *ingreso*.\n\n\
    Para ver totales, escribe: *resumen*, *resumen mes*, *resumen 30*, \
    *resumen 7*, *resumen 15*, o *resumen <cat>* (1–8).\n\
    Para ver tu balance: *saldo* o *saldo 7|15|30|mes*.\n\
    Comandos: *reset*, *estado*";

pub const ASK_EXPENSE_AMOUNT: &str = "Ok, vamos a ingresar un gasto. 💸\n\
    Dime el **valor del gasto en USD** (ej: 25.50).";

pub const ASK_INCOME_AMOUNT: &str = "Ok, vamos a registrar un ingreso. 💵\n\
    Dime el **valor del ingreso en USD** (ej: 1200.00).";

pub const INVALID_AMOUNT: &str = "El valor no parece válido. Intenta de nuevo (ej: 12.75).";

pub const CATEGORY_PROMPT: &str = "Elige la *categoría* del gasto:";

pub const INVALID_CATEGORY: &str =
    "Respuesta inválida. Elige una opción de la lista o escribe un número del 1 al 8.";

pub const ASK_INCOME_SOURCE: &str = "¿De dónde proviene el ingreso? (ej: Salario, Freelance)";

pub const INVALID_SOURCE: &str = "La fuente debe tener al menos 2 caracteres. Intenta de nuevo.";

pub const STORE_FAILURE: &str = "⚠️ No pude procesar tu mensaje en este momento. Intenta de nuevo en unos minutos.";

pub fn amount_captured(amount: Decimal) -> String {
    format!("Perfecto. Monto registrado: {}.", money(amount))
}

/// Plain-text category menu for channels without rich lists.
pub fn category_menu_fallback() -> String {
    let mut text = String::from("No pude enviar la lista interactiva.\nEscribe un número del 1 al 8:");
    for category in &CATALOG {
        text.push('\n');
        text.push_str(&category.label());
    }
    text
}
