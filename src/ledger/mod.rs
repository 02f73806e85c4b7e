//! Ledger module - expense/income capture conversations, storage and totals.

pub mod aggregate;
pub mod catalog;
pub mod commands;
pub mod database;
pub mod message;
pub mod mirror;
pub mod notifier;
pub mod report;
pub mod router;
pub mod session;
pub mod store;
pub mod user_locks;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;


pub use database::{Database, StoreError};
pub use message::InboundEvent;
pub use mirror::{LedgerMirror, RemoteMirror};
pub use notifier::{ChoiceOption, Notifier, NotifyError};
pub use router::MessageRouter;
pub use window::WindowResolver;
