//! WhatsApp Cloud API channel: inbound webhook plus outbound Graph API client.

pub mod client;
pub mod webhook;

use std::sync::Arc;

use tracing::info;

use crate::config::WhatsappConfig;
use crate::ledger::MessageRouter;

pub use client::GraphClient;

/// Serve the webhook until ctrl-c.
pub async fn run(config: &WhatsappConfig, router: Arc<MessageRouter>) -> std::io::Result<()> {
    let app = webhook::create_router(webhook::WebhookState::new(router, &config.verify_token));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("📡 WhatsApp webhook listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down webhook");
        })
        .await
}
