use std::sync::Arc;

use anyhow::Context;

use wa_relay::channels::{OutboundSender, WhatsAppClient};
use wa_relay::config::RelayConfig;
use wa_relay::relay::Relay;
use wa_relay::webhook::relay_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(RelayConfig::from_env()?);

    if config.verify_token.is_empty() {
        tracing::warn!("WEBHOOK_VERIFY_TOKEN is not set; verification handshakes will fail");
    }
    if config.whatsapp.credentials().is_err() {
        tracing::warn!("WhatsApp credentials missing; sends will fail until they are set");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        allowlist = config.allowlist.len(),
        "WA Relay starting"
    );

    let sender: Arc<dyn OutboundSender> = Arc::new(WhatsAppClient::new(config.whatsapp.clone())?);
    let relay = Arc::new(Relay::new(Arc::clone(&config), sender));
    let app = relay_routes(relay);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Webhook server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
