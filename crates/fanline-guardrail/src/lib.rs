//! Fanline Guardrail - AI usage limits
//!
//! Every AI chat completion is gated by two independent mechanisms:
//!
//! - a fixed 60-second request window per user, and
//! - a rolling 24-hour token/cost budget per user.
//!
//! The API is two-phase: [`AiGuardrail::check_request`] before the
//! (expensive) AI call, [`AiGuardrail::record_usage`] only after it
//! succeeds. Checks never charge the budget, so a failed completion costs
//! the user nothing. Denials are values, not errors - this runs on every
//! chat message.

pub mod config;
pub mod ratelimit;
pub mod usage;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fanline_common::{KeyValueStore, MemoryStore, UserId};
use serde::{Deserialize, Serialize};

pub use config::GuardrailConfig;
pub use ratelimit::{RateLimitOutcome, RateLimitWindow, RateLimiter};
pub use usage::{UsageMetrics, UsageTracker};

/// Verdict for one prospective AI request.
///
/// `allowed == false` carries a human-readable reason; callers map it to
/// whatever status their surface needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Denial reason, present only when blocked
    pub reason: Option<String>,
    /// Seconds until the rate-limit window lapses, for rate denials
    pub retry_after_secs: Option<u64>,
}

impl GuardrailDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after_secs: None,
        }
    }

    fn deny(reason: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            retry_after_secs,
        }
    }
}

/// Per-user AI usage guardrail
pub struct AiGuardrail {
    config: GuardrailConfig,
    limiter: RateLimiter,
    usage: UsageTracker,
}

impl AiGuardrail {
    /// Guardrail over process-local in-memory stores
    pub fn new(config: GuardrailConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Guardrail over injected stores (e.g. a distributed cache)
    pub fn with_stores(
        config: GuardrailConfig,
        windows: Arc<dyn KeyValueStore<RateLimitWindow>>,
        metrics: Arc<dyn KeyValueStore<UsageMetrics>>,
    ) -> Self {
        let limiter = RateLimiter::new(config.max_requests_per_minute, windows);
        let usage = UsageTracker::new(config.token_cost_per_1k, metrics);
        Self {
            config,
            limiter,
            usage,
        }
    }

    /// Active limits
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Validate a prospective request for `user`
    pub fn check_request(&self, user: &UserId, estimated_tokens: u64) -> GuardrailDecision {
        self.check_request_at(user, estimated_tokens, Utc::now())
    }

    /// Validate at an explicit instant.
    ///
    /// Order is fixed, first failure wins: rate limit, daily cost,
    /// per-request token cap, daily token cap. Only the rate check
    /// consumes anything (one window slot); the budget checks are
    /// read-only.
    pub fn check_request_at(
        &self,
        user: &UserId,
        estimated_tokens: u64,
        now: DateTime<Utc>,
    ) -> GuardrailDecision {
        if let RateLimitOutcome::Limited { resets_at } = self.limiter.check_at(user, now) {
            let retry_after = (resets_at - now).num_seconds().max(0) as u64;
            tracing::debug!(user = %user, retry_after_secs = retry_after, "rate limit hit");
            return GuardrailDecision::deny(
                format!(
                    "Rate limit exceeded: max {} requests per minute",
                    self.config.max_requests_per_minute
                ),
                Some(retry_after),
            );
        }

        let snapshot = self.usage.snapshot_at(user, now);

        let projected_cost = snapshot.total_cost + self.usage.cost_of(estimated_tokens);
        if projected_cost > self.config.max_daily_cost {
            tracing::debug!(user = %user, %projected_cost, "daily cost limit hit");
            return GuardrailDecision::deny(
                format!(
                    "Daily AI budget reached: ${} limit",
                    self.config.max_daily_cost
                ),
                None,
            );
        }

        if estimated_tokens > self.config.max_tokens_per_request {
            return GuardrailDecision::deny(
                format!(
                    "Request too large: max {} tokens per request",
                    self.config.max_tokens_per_request
                ),
                None,
            );
        }

        if snapshot.total_tokens + estimated_tokens > self.config.max_daily_tokens {
            tracing::debug!(user = %user, used = snapshot.total_tokens, "daily token limit hit");
            return GuardrailDecision::deny(
                format!(
                    "Daily token limit reached: max {} tokens per day",
                    self.config.max_daily_tokens
                ),
                None,
            );
        }

        GuardrailDecision::allow()
    }

    /// Charge `user` for a completed request's actual token count.
    ///
    /// Called only after the AI call succeeds; this is the sole step that
    /// consumes budget.
    pub fn record_usage(&self, user: &UserId, tokens: u64) -> UsageMetrics {
        self.usage.record(user, tokens)
    }

    /// Record usage at an explicit instant
    pub fn record_usage_at(&self, user: &UserId, tokens: u64, now: DateTime<Utc>) -> UsageMetrics {
        self.usage.record_at(user, tokens, now)
    }

    /// Current usage for `user`, for the account dashboard
    pub fn usage_snapshot(&self, user: &UserId) -> UsageMetrics {
        self.usage.snapshot(user)
    }
}

impl Default for AiGuardrail {
    fn default() -> Self {
        Self::new(GuardrailConfig::default())
    }
}
