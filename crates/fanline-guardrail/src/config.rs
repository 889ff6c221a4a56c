//! Guardrail configuration constants

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Requests allowed per user per 60-second window
pub const MAX_REQUESTS_PER_MINUTE: u32 = 20;

/// Token ceiling for a single AI request
pub const MAX_TOKENS_PER_REQUEST: u64 = 4_000;

/// Token ceiling per user per rolling 24-hour window
pub const MAX_DAILY_TOKENS_PER_USER: u64 = 100_000;

/// Spend ceiling per user per rolling 24-hour window, in dollars
pub const MAX_DAILY_COST_PER_USER: Decimal = dec!(5.00);

/// Model cost per 1,000 tokens, in dollars
pub const TOKEN_COST_PER_1K: Decimal = dec!(0.002);

/// Guardrail limits, defaulting to the platform constants above
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Requests per user per minute
    pub max_requests_per_minute: u32,
    /// Tokens per single request
    pub max_tokens_per_request: u64,
    /// Tokens per user per day
    pub max_daily_tokens: u64,
    /// Dollars per user per day
    pub max_daily_cost: Decimal,
    /// Dollars per 1,000 tokens
    pub token_cost_per_1k: Decimal,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: MAX_REQUESTS_PER_MINUTE,
            max_tokens_per_request: MAX_TOKENS_PER_REQUEST,
            max_daily_tokens: MAX_DAILY_TOKENS_PER_USER,
            max_daily_cost: MAX_DAILY_COST_PER_USER,
            token_cost_per_1k: TOKEN_COST_PER_1K,
        }
    }
}
