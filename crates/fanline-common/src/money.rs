//! Integer-cent money arithmetic
//!
//! Amounts are carried as whole cents (`i64`) everywhere; percentage rates
//! are `Decimal` so rate tables stay exact. Rounding is half-up on cents and
//! is applied independently to each computed component.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// A monetary amount in whole cents
pub type Cents = i64;

/// Compute `amount × rate`, rounded half-up to whole cents.
///
/// Each fee component is rounded on its own; callers that split an amount
/// into several shares accept that the shares may not sum back exactly
/// (±1 cent).
pub fn share_of(amount: Cents, rate: Decimal) -> Cents {
    (Decimal::from(amount) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}
