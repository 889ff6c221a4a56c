//! Fanline Gateway - HTTP surface for the monetization core
//!
//! Exposes the three operations the rest of the platform calls over HTTP:
//! - Stripe webhook intake (`POST /webhooks/stripe`)
//! - AI guardrail check/record (`POST /api/v1/guardrail/…`)
//! - Fee and referral preview for checkout (`POST /api/v1/billing/preview`)
//!
//! Status contract on the webhook route: invalid signature is 400 (the
//! sender must not retry), a failed handler is 500 (the sender retries),
//! success and idempotent replays are 200.

#![warn(missing_docs)]

pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use fanline_billing::{MemoryReferralDirectory, ReferralDirectory};
use fanline_common::Capabilities;
use fanline_guardrail::{AiGuardrail, GuardrailConfig};
use fanline_webhooks::{MemoryLedger, SignatureVerifier, WebhookProcessor};

/// Application state shared across handlers
pub struct AppState {
    /// AI usage guardrail
    pub guardrail: Arc<AiGuardrail>,
    /// Webhook intake pipeline
    pub webhooks: Arc<WebhookProcessor>,
    /// Referral hierarchy lookup
    pub referrals: Arc<dyn ReferralDirectory>,
    /// Integrations enabled for this deployment
    pub capabilities: Capabilities,
}

impl AppState {
    /// State over in-memory collaborators, for single-node deployments
    /// and tests
    pub fn new(webhook_secret: &str, capabilities: Capabilities) -> Self {
        let processor = WebhookProcessor::new(
            SignatureVerifier::new(webhook_secret),
            Arc::new(MemoryLedger::new()),
        );
        Self {
            guardrail: Arc::new(AiGuardrail::new(GuardrailConfig::default())),
            webhooks: Arc::new(processor),
            referrals: Arc::new(MemoryReferralDirectory::new()),
            capabilities,
        }
    }
}

/// Build the API router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/stripe", post(handlers::stripe_webhook))
        .route("/api/v1/guardrail/check", post(handlers::guardrail_check))
        .route("/api/v1/guardrail/record", post(handlers::guardrail_record))
        .route("/api/v1/guardrail/usage", post(handlers::guardrail_usage))
        .route("/api/v1/billing/preview", post(handlers::billing_preview))
        .layer(axum::middleware::from_fn(middleware::logging))
        .layer(Extension(state))
}

/// Start the gateway server
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), std::io::Error> {
    let app = build_router(state);

    tracing::info!("Fanline gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
