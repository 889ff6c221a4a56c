//! API Handlers

use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fanline_billing::{commission_split, FeeBreakdown, FeePolicy, ReferralCalculation};
use fanline_common::{Cents, UserId};
use fanline_guardrail::{GuardrailDecision, UsageMetrics};
use fanline_webhooks::Outcome;

use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Webhook acknowledgement body
#[derive(Serialize)]
pub struct WebhookAck {
    /// Always true on a 200
    pub received: bool,
    /// What this delivery did
    pub outcome: String,
}

/// Stripe webhook intake.
///
/// Raw body plus `Stripe-Signature` header. 400 on signature failure (the
/// sender must not retry), 500 on handler failure (the sender retries),
/// 200 on success, replay, or an unrecognized type.
pub async fn stripe_webhook(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if !state.capabilities.payments {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let signature = match headers.get("Stripe-Signature").and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            tracing::warn!("webhook delivery missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.webhooks.process(&body, signature).await {
        Ok(outcome) => {
            let tag = match outcome {
                Outcome::Processed => "processed",
                Outcome::Replayed => "replayed",
                Outcome::Ignored => "ignored",
            };
            (
                StatusCode::OK,
                Json(WebhookAck {
                    received: true,
                    outcome: tag.to_string(),
                }),
            )
                .into_response()
        }
        Err(err) if err.retryable() => {
            tracing::error!(error = %err, "webhook handling failed, requesting redelivery");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "webhook delivery rejected");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Guardrail check request
#[derive(Deserialize)]
pub struct GuardrailCheckRequest {
    /// User about to make an AI request
    pub user_id: UserId,
    /// Estimated token count for the request
    pub estimated_tokens: u64,
}

/// Pre-flight guardrail check.
///
/// Always 200 with the decision body; callers map a denial onto whatever
/// status their surface needs.
pub async fn guardrail_check(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<GuardrailCheckRequest>,
) -> Result<Json<GuardrailDecision>, StatusCode> {
    if !state.capabilities.text_generation {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(
        state.guardrail.check_request(&req.user_id, req.estimated_tokens),
    ))
}

/// Guardrail record request
#[derive(Deserialize)]
pub struct GuardrailRecordRequest {
    /// User whose AI call succeeded
    pub user_id: UserId,
    /// Actual tokens consumed
    pub tokens: u64,
}

/// Charge a user's budget after a successful AI call
pub async fn guardrail_record(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<GuardrailRecordRequest>,
) -> StatusCode {
    state.guardrail.record_usage(&req.user_id, req.tokens);
    StatusCode::NO_CONTENT
}

/// Current usage for a user, for the account dashboard
pub async fn guardrail_usage(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<UsageQuery>,
) -> Json<UsageMetrics> {
    Json(state.guardrail.usage_snapshot(&req.user_id))
}

/// Usage query body
#[derive(Deserialize)]
pub struct UsageQuery {
    /// User to report on
    pub user_id: UserId,
}

/// Billing preview request
#[derive(Deserialize)]
pub struct BillingPreviewRequest {
    /// Purchase amount in cents
    pub amount_cents: Cents,
    /// Fee policy for this transaction type
    pub policy: FeePolicy,
    /// Fan making the purchase (their referral chain applies)
    pub buyer_id: UserId,
    /// Whether to carve out the processor fee
    #[serde(default)]
    pub include_processor_fee: bool,
}

/// Billing preview response
#[derive(Serialize)]
pub struct BillingPreviewResponse {
    /// Platform/creator/processor split
    pub fees: FeeBreakdown,
    /// Referral commissions on this purchase
    pub referral: ReferralCalculation,
}

/// Fee and commission preview for a prospective purchase
pub async fn billing_preview(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<BillingPreviewRequest>,
) -> Result<Json<BillingPreviewResponse>, StatusCode> {
    if req.amount_cents < 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let fees = if req.include_processor_fee {
        req.policy.split_with_processor(req.amount_cents)
    } else {
        req.policy.split(req.amount_cents)
    };

    let hierarchy = state
        .referrals
        .hierarchy(&req.buyer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, buyer = %req.buyer_id, "referral lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(BillingPreviewResponse {
        fees,
        referral: commission_split(req.amount_cents, &hierarchy),
    }))
}
