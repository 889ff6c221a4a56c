//! Daily token and cost budgets
//!
//! Usage accumulates per user inside a rolling 24-hour window anchored to
//! the first request of the day (not a midnight reset). Reads treat a
//! lapsed window as zeroed; the actual reset happens on the next record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fanline_common::{KeyValueStore, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Accumulated usage for one user's current 24-hour window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Tokens consumed since the window opened
    pub total_tokens: u64,
    /// Dollars spent since the window opened
    pub total_cost: Decimal,
    /// Requests recorded since the window opened
    pub request_count: u64,
    /// Window anchor: the first recorded request of the day
    pub last_reset: DateTime<Utc>,
}

impl UsageMetrics {
    /// Zeroed metrics anchored at `now`
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            total_tokens: 0,
            total_cost: dec!(0),
            request_count: 0,
            last_reset: now,
        }
    }

    /// Whether the rolling window has lapsed at `now`
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_reset > Duration::hours(24)
    }
}

/// Per-user usage accumulator over an injectable store
pub struct UsageTracker {
    metrics: Arc<dyn KeyValueStore<UsageMetrics>>,
    cost_per_1k: Decimal,
}

impl UsageTracker {
    /// Create a tracker pricing tokens at `cost_per_1k` dollars
    pub fn new(cost_per_1k: Decimal, metrics: Arc<dyn KeyValueStore<UsageMetrics>>) -> Self {
        Self {
            metrics,
            cost_per_1k,
        }
    }

    /// Dollar cost of `tokens` at the configured rate
    pub fn cost_of(&self, tokens: u64) -> Decimal {
        Decimal::from(tokens) / dec!(1000) * self.cost_per_1k
    }

    /// Current metrics for `user`; read-only, lapsed windows read as zeroed
    pub fn snapshot(&self, user: &UserId) -> UsageMetrics {
        self.snapshot_at(user, Utc::now())
    }

    /// Current metrics at an explicit instant
    pub fn snapshot_at(&self, user: &UserId, now: DateTime<Utc>) -> UsageMetrics {
        match self.metrics.get(&user.to_string()) {
            Some(metrics) if !metrics.expired(now) => metrics,
            _ => UsageMetrics::fresh(now),
        }
    }

    /// Record a completed request's actual token count.
    ///
    /// Invoked only after the AI call succeeds; checks never consume budget.
    pub fn record(&self, user: &UserId, tokens: u64) -> UsageMetrics {
        self.record_at(user, tokens, Utc::now())
    }

    /// Record usage at an explicit instant
    pub fn record_at(&self, user: &UserId, tokens: u64, now: DateTime<Utc>) -> UsageMetrics {
        let key = user.to_string();
        loop {
            let current = self.metrics.get(&key);
            let mut next = match &current {
                Some(metrics) if !metrics.expired(now) => metrics.clone(),
                _ => UsageMetrics::fresh(now),
            };
            next.total_tokens += tokens;
            next.total_cost += self.cost_of(tokens);
            next.request_count += 1;

            if self.metrics.compare_and_swap(&key, current.as_ref(), next.clone()) {
                return next;
            }
        }
    }
}
