//! Fanline Billing - Fee splitting and referral commissions
//!
//! Deterministic, auditable money splitting for every purchase on the
//! platform. All outputs are recomputed from the purchase amount and the
//! rate tables; nothing here is mutable state.
//!
//! ```text
//! purchase ──► FeePolicy::split ─────────► platform fee │ creator earnings
//!          ──► split_with_processor ─────► + processor fee
//!          ──► commission_split ─────────► L1/L2/L3 commissions out of the
//!                                          platform's share
//! ```
//!
//! The 20% (generic unlock) and 30% (subscription/tip/PPV) splits are two
//! distinct business rules selected by call site; the referral path carries
//! its own 20% base independent of either.

#![warn(missing_docs)]

pub mod fees;
pub mod referrals;

use thiserror::Error;

pub use fees::{
    FeeBreakdown, FeePolicy, GENERIC_UNLOCK_FEE_RATE, PROCESSOR_FEE_RATE,
    PROCESSOR_FIXED_FEE_CENTS, SUBSCRIPTION_FEE_RATE,
};
pub use referrals::{
    commission_split, MemoryReferralDirectory, ReferralCalculation, ReferralCommission,
    ReferralDirectory, ReferralHierarchy,
};

/// Billing error types
#[derive(Debug, Error)]
pub enum BillingError {
    /// The referral directory could not resolve a hierarchy
    #[error("referral lookup failed: {0}")]
    ReferralLookup(String),
    /// The persistence collaborator failed
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Result type for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
