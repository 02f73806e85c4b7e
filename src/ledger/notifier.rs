//! Outbound side of the chat channel.

use std::fmt;

use async_trait::async_trait;

#[derive(Debug)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// One entry of a choice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, user: &str, text: &str) -> Result<(), NotifyError>;

    /// Send a rich list prompt. `false` means the channel could not deliver
    /// it and the caller should fall back to plain text.
    async fn send_choice_list(&self, user: &str, title: &str, options: &[ChoiceOption]) -> bool;
}
