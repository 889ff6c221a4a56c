//! Multi-level referral commissions
//!
//! A fan carries a fixed chain of up to three referrers, captured once at
//! signup. On every purchase the chain earns 5% / 2% / 1% by level, all of
//! it deducted from the platform's 20% base share; creator earnings are
//! never reduced by the chain.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use fanline_common::{share_of, Cents, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::BillingResult;

/// Commission rate per referral level, nearest referrer first
pub const REFERRAL_LEVEL_RATES: [Decimal; 3] = [dec!(0.05), dec!(0.02), dec!(0.01)];

/// Platform base share on the referral path, independent of [`crate::FeePolicy`]
pub const REFERRAL_BASE_PLATFORM_RATE: Decimal = dec!(0.20);

/// Maximum referral chain depth
pub const MAX_REFERRAL_DEPTH: usize = 3;

/// A fan's referrer chain, nearest referrer first.
///
/// Derived once at signup from the referrer's own chain; append-only and
/// never recomputed on later purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralHierarchy(Vec<UserId>);

impl ReferralHierarchy {
    /// Build a chain from an explicit referrer list, truncated to depth 3
    pub fn new(referrers: Vec<UserId>) -> Self {
        let mut referrers = referrers;
        referrers.truncate(MAX_REFERRAL_DEPTH);
        Self(referrers)
    }

    /// Chain for a fan signing up under `referrer`: the referrer, then the
    /// referrer's own chain, truncated to depth 3
    pub fn derive(referrer: UserId, referrer_chain: &ReferralHierarchy) -> Self {
        let mut chain = Vec::with_capacity(MAX_REFERRAL_DEPTH);
        chain.push(referrer);
        chain.extend(referrer_chain.0.iter().copied());
        chain.truncate(MAX_REFERRAL_DEPTH);
        Self(chain)
    }

    /// Referrer ids, nearest first
    pub fn referrers(&self) -> &[UserId] {
        &self.0
    }

    /// Chain length (0..=3)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the fan has no referrers
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One level's commission on one purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralCommission {
    /// Referral level (1 = nearest referrer)
    pub level: u8,
    /// Referrer earning this commission
    pub referrer: UserId,
    /// Rate applied for this level
    pub rate: Decimal,
    /// Commission amount in cents
    pub amount: Cents,
}

/// Commission outcome for one purchase.
///
/// Derived per transaction; never stored independently of the transaction
/// it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralCalculation {
    /// Purchase amount in cents
    pub amount: Cents,
    /// One entry per occupied referral level
    pub commissions: Vec<ReferralCommission>,
    /// Sum of all commission amounts (at most 8% of the purchase)
    pub total_commissions: Cents,
    /// Platform's 20% base share minus total commissions
    pub adjusted_platform_fee: Cents,
    /// Creator's share - untouched by the referral chain
    pub adjusted_creator_earnings: Cents,
}

impl ReferralCalculation {
    /// Commission totals grouped per referrer, for payout reporting.
    ///
    /// A referrer can appear at several levels of one fan's chain only
    /// through self-referral loops upstream, but the aggregation is safe
    /// either way.
    pub fn by_referrer(&self) -> HashMap<UserId, Cents> {
        let mut totals = HashMap::new();
        for commission in &self.commissions {
            *totals.entry(commission.referrer).or_insert(0) += commission.amount;
        }
        totals
    }
}

/// Split a purchase across the referral chain.
///
/// Iterates the chain by level, applies the fixed rate table, and deducts
/// the total from the platform's 20% base share. Pure given a hierarchy;
/// looking the hierarchy up is [`ReferralDirectory`]'s job.
pub fn commission_split(amount: Cents, hierarchy: &ReferralHierarchy) -> ReferralCalculation {
    let mut commissions = Vec::with_capacity(hierarchy.len());
    let mut total_commissions = 0;

    for (index, referrer) in hierarchy
        .referrers()
        .iter()
        .enumerate()
        .take(MAX_REFERRAL_DEPTH)
    {
        let rate = REFERRAL_LEVEL_RATES[index];
        let commission = share_of(amount, rate);
        commissions.push(ReferralCommission {
            level: index as u8 + 1,
            referrer: *referrer,
            rate,
            amount: commission,
        });
        total_commissions += commission;
    }

    let base_platform_fee = share_of(amount, REFERRAL_BASE_PLATFORM_RATE);

    ReferralCalculation {
        amount,
        commissions,
        total_commissions,
        adjusted_platform_fee: base_platform_fee - total_commissions,
        adjusted_creator_earnings: amount - base_platform_fee,
    }
}

/// Referral hierarchy lookup (persistence collaborator)
#[async_trait]
pub trait ReferralDirectory: Send + Sync {
    /// Chain for `user`, empty when the fan signed up without a referrer
    async fn hierarchy(&self, user: &UserId) -> BillingResult<ReferralHierarchy>;
}

/// In-memory directory for tests and single-node deployments
pub struct MemoryReferralDirectory {
    chains: DashMap<UserId, ReferralHierarchy>,
}

impl MemoryReferralDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            chains: DashMap::new(),
        }
    }

    /// Record a fan's chain at signup
    pub fn register(&self, user: UserId, chain: ReferralHierarchy) {
        self.chains.insert(user, chain);
    }
}

impl Default for MemoryReferralDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferralDirectory for MemoryReferralDirectory {
    async fn hierarchy(&self, user: &UserId) -> BillingResult<ReferralHierarchy> {
        Ok(self
            .chains
            .get(user)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chain_of(n: usize) -> ReferralHierarchy {
        ReferralHierarchy::new((0..n).map(|_| Uuid::new_v4()).collect())
    }

    #[test]
    fn test_three_level_split() {
        let hierarchy = chain_of(3);
        let calc = commission_split(10_000, &hierarchy);

        let amounts: Vec<Cents> = calc.commissions.iter().map(|c| c.amount).collect();
        assert_eq!(amounts, vec![500, 200, 100]);
        assert_eq!(calc.total_commissions, 800);
        assert_eq!(calc.adjusted_platform_fee, 2_000 - 800);
        // Creator earnings unaffected by referral deduction
        assert_eq!(calc.adjusted_creator_earnings, 8_000);
    }

    #[test]
    fn test_empty_chain() {
        let calc = commission_split(10_000, &ReferralHierarchy::default());
        assert!(calc.commissions.is_empty());
        assert_eq!(calc.total_commissions, 0);
        assert_eq!(calc.adjusted_platform_fee, 2_000);
        assert_eq!(calc.adjusted_creator_earnings, 8_000);
    }

    #[test]
    fn test_commissions_capped_at_eight_percent() {
        for len in 0..=3 {
            let hierarchy = chain_of(len);
            for amount in [0, 1, 99, 1_000, 9_999, 123_457] {
                let calc = commission_split(amount, &hierarchy);
                // Half-up rounding on three components can only exceed the
                // exact 8% by fractions of a cent each, so allow the same
                // +-1 cent tolerance the fee splits carry.
                assert!(calc.total_commissions <= share_of(amount, dec!(0.08)) + 1);
                assert!(calc.adjusted_platform_fee >= 0);
            }
        }
    }

    #[test]
    fn test_levels_assigned_in_chain_order() {
        let hierarchy = chain_of(3);
        let calc = commission_split(5_000, &hierarchy);
        for (index, commission) in calc.commissions.iter().enumerate() {
            assert_eq!(commission.level, index as u8 + 1);
            assert_eq!(commission.referrer, hierarchy.referrers()[index]);
        }
    }

    #[test]
    fn test_derive_truncates_to_three() {
        let grandparent = chain_of(3);
        let parent = ReferralHierarchy::derive(Uuid::new_v4(), &grandparent);
        assert_eq!(parent.len(), 3);

        let child = ReferralHierarchy::derive(Uuid::new_v4(), &parent);
        assert_eq!(child.len(), 3);
        // Child's L2 is the parent's L1
        assert_eq!(child.referrers()[1], parent.referrers()[0]);
    }

    #[test]
    fn test_by_referrer_aggregation() {
        let hierarchy = chain_of(2);
        let calc = commission_split(10_000, &hierarchy);
        let totals = calc.by_referrer();
        assert_eq!(totals[&hierarchy.referrers()[0]], 500);
        assert_eq!(totals[&hierarchy.referrers()[1]], 200);
    }

    #[tokio::test]
    async fn test_memory_directory_lookup() {
        let directory = MemoryReferralDirectory::new();
        let fan = Uuid::new_v4();
        let chain = chain_of(2);
        directory.register(fan, chain.clone());

        assert_eq!(directory.hierarchy(&fan).await.unwrap(), chain);
        // Unknown fans have an empty chain, not an error
        let unknown = directory.hierarchy(&Uuid::new_v4()).await.unwrap();
        assert!(unknown.is_empty());
    }
}
