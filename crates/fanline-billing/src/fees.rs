//! Fee splitting

use fanline_common::{share_of, Cents};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform share on one-off content unlocks
pub const GENERIC_UNLOCK_FEE_RATE: Decimal = dec!(0.20);

/// Platform share on subscriptions, tips, and pay-per-view
pub const SUBSCRIPTION_FEE_RATE: Decimal = dec!(0.30);

/// Payment-processor percentage fee (Stripe card rate)
pub const PROCESSOR_FEE_RATE: Decimal = dec!(0.029);

/// Payment-processor fixed fee per transaction, in cents
pub const PROCESSOR_FIXED_FEE_CENTS: Cents = 30;

/// Fee policy for a transaction type.
///
/// The two rates are separate business rules for separate product surfaces;
/// call sites pick the variant explicitly and the variants are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeePolicy {
    /// One-off content unlocks: platform keeps 20%
    GenericUnlock,
    /// Subscriptions, tips, and pay-per-view: platform keeps 30%
    Subscription,
}

impl FeePolicy {
    /// Platform share for this transaction type
    pub fn platform_rate(&self) -> Decimal {
        match self {
            Self::GenericUnlock => GENERIC_UNLOCK_FEE_RATE,
            Self::Subscription => SUBSCRIPTION_FEE_RATE,
        }
    }

    /// Split a purchase into platform fee and creator earnings.
    ///
    /// Pure arithmetic; callers validate `amount >= 0` upstream.
    pub fn split(&self, amount: Cents) -> FeeBreakdown {
        let platform_fee = share_of(amount, self.platform_rate());
        FeeBreakdown {
            amount,
            platform_fee,
            creator_earnings: amount - platform_fee,
            processor_fee: None,
        }
    }

    /// Split that also carves the processor's cut out of creator earnings
    pub fn split_with_processor(&self, amount: Cents) -> FeeBreakdown {
        let platform_fee = share_of(amount, self.platform_rate());
        let processor_fee = share_of(amount, PROCESSOR_FEE_RATE) + PROCESSOR_FIXED_FEE_CENTS;
        FeeBreakdown {
            amount,
            platform_fee,
            creator_earnings: amount - platform_fee - processor_fee,
            processor_fee: Some(processor_fee),
        }
    }
}

/// Per-transaction fee breakdown.
///
/// Recomputed from the purchase amount and the rate table on every use,
/// never persisted as mutable state. Components are rounded independently,
/// so their sum may drift from `amount` by up to one cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Purchase amount in cents
    pub amount: Cents,
    /// Platform's share
    pub platform_fee: Cents,
    /// Creator's share
    pub creator_earnings: Cents,
    /// Processor's share, when the processor-aware split was used
    pub processor_fee: Option<Cents>,
}

impl FeeBreakdown {
    /// Sum of all components, for reconciliation checks
    pub fn reassembled(&self) -> Cents {
        self.platform_fee + self.creator_earnings + self.processor_fee.unwrap_or(0)
    }
}
