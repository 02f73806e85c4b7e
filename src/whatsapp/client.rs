//! Outbound messages through the Graph API `messages` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use crate::config::WhatsappConfig;
use crate::ledger::{ChoiceOption, Notifier, NotifyError};

const GRAPH_BASE: &str = "https://graph.facebook.com";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);
/// Platform limit for list row titles.
const ROW_TITLE_MAX: usize = 24;

pub struct GraphClient {
    http: reqwest::Client,
    url: String,
    access_token: String,
}

impl GraphClient {
    pub fn new(config: &WhatsappConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: format!("{GRAPH_BASE}/{}/{}/messages", config.graph_api_version, config.phone_number_id),
            access_token: config.access_token.clone(),
        }
    }

    async fn post(&self, payload: &Value) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError(format!("graph request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError(format!("graph returned {status}: {body}")));
        }
        Ok(())
    }
}

fn text_payload(to: &str, text: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": text }
    })
}

fn list_payload(to: &str, title: &str, options: &[ChoiceOption]) -> Value {
    let rows: Vec<Value> = options
        .iter()
        .map(|o| json!({ "id": o.id, "title": o.label.chars().take(ROW_TITLE_MAX).collect::<String>() }))
        .collect();

    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "list",
            "body": { "text": title },
            "footer": { "text": "Toca una opción 👇" },
            "action": {
                "button": "Ver categorías",
                "sections": [{ "title": "Categorías", "rows": rows }]
            }
        }
    })
}

#[async_trait]
impl Notifier for GraphClient {
    async fn send_text(&self, user: &str, text: &str) -> Result<(), NotifyError> {
        self.post(&text_payload(user, text)).await
    }

    async fn send_choice_list(&self, user: &str, title: &str, options: &[ChoiceOption]) -> bool {
        match self.post(&list_payload(user, title, options)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error sending choice list to {user}: {e}");
                false
            }
        }
    }
}
