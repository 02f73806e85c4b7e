//! Telegram channel using teloxide.
//!
//! Private chats only. The chat id is the user key, text messages become
//! text events and inline keyboard presses become selection events.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{info, warn};

use crate::ledger::{ChoiceOption, InboundEvent, MessageRouter, Notifier, NotifyError};

/// Outbound Telegram messages.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat_id(user: &str) -> Result<ChatId, NotifyError> {
    user.parse::<i64>()
        .map(ChatId)
        .map_err(|_| NotifyError(format!("not a telegram chat id: {user:?}")))
}

/// One button per row, callback data is the option id.
fn choice_keyboard(options: &[ChoiceOption]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        options
            .iter()
            .map(|o| vec![InlineKeyboardButton::callback(o.label.clone(), o.id.clone())]),
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, user: &str, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(chat_id(user)?, text)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError(format!("telegram send failed: {e}")))
    }

    async fn send_choice_list(&self, user: &str, title: &str, options: &[ChoiceOption]) -> bool {
        let chat = match chat_id(user) {
            Ok(chat) => chat,
            Err(e) => {
                warn!("{e}");
                return false;
            }
        };

        match self.bot.send_message(chat, title).reply_markup(choice_keyboard(options)).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to send choice list to {user}: {e}");
                false
            }
        }
    }
}

/// Long-poll Telegram until ctrl-c.
pub async fn run(bot: Bot, router: Arc<MessageRouter>) {
    match bot.get_me().await {
        Ok(me) => info!("Bot user ID: {}, username: @{}", me.id, me.username()),
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, router: Arc<MessageRouter>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    router.handle(InboundEvent::text(msg.chat.id.0.to_string(), text)).await;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, router: Arc<MessageRouter>) -> ResponseResult<()> {
    // Stop the client-side spinner whatever happens next.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {e}");
    }

    let Some(data) = q.data else {
        return Ok(());
    };

    // Keyboards are only sent to private chats, where chat id == user id.
    let sender = q.from.id.0.to_string();
    router.handle(InboundEvent::selection(sender, data.clone(), data)).await;
    Ok(())
}
