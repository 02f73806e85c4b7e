//! Inbound message events, independent of the chat channel.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    /// Answer to a list or button prompt.
    Selection { id: String, title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: String,
    pub body: MessageBody,
}

impl InboundEvent {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: MessageBody::Text(text.into()),
        }
    }

    pub fn selection(sender: impl Into<String>, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: MessageBody::Selection { id: id.into(), title: title.into() },
        }
    }

    /// Visible text of the message; the title for selections.
    pub fn visible_text(&self) -> &str {
        match &self.body {
            MessageBody::Text(text) => text,
            MessageBody::Selection { title, .. } => title,
        }
    }

    pub fn selection_id(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(_) => None,
            MessageBody::Selection { id, .. } => Some(id),
        }
    }
}
