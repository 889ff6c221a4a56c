//! Fanline Gateway - Main Entry Point

use std::sync::Arc;

use fanline_common::Capabilities;
use fanline_gateway::{serve, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Fanline gateway v{}", env!("CARGO_PKG_VERSION"));

    // Capabilities are resolved once here; handlers check flags, they never
    // probe for integrations themselves
    let capabilities = Capabilities {
        payments: std::env::var("STRIPE_WEBHOOK_SECRET").is_ok(),
        text_generation: std::env::var("AI_API_KEY").is_ok(),
    };

    let webhook_secret =
        std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| "whsec_dev".into());

    if !capabilities.payments {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook intake disabled");
    }
    if !capabilities.text_generation {
        tracing::warn!("AI_API_KEY not set, guardrail endpoints disabled");
    }

    let state = Arc::new(AppState::new(&webhook_secret, capabilities));

    let addr = std::env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()?;

    serve(addr, state).await?;

    Ok(())
}
