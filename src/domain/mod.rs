use uuid::Uuid;

mod points;
mod privilege;
mod tier;
mod usage;

pub use points::{
    available_points, Allocation, Balance, ChangeSet, LedgerError, PointLot, Transaction,
    TransactionKind, UnitOfWork,
};
pub use privilege::{
    BenefitAction, BenefitEffect, BenefitError, BenefitParams, PointGrant, Privilege, EARN_POINTS,
    EXAMPLE_DISCOUNT, ORIGINAL_COST_PARAM, PRIVILEGE_BENEFIT_SOURCE, PRIVILEGE_DISCOUNT_SOURCE,
};
pub use tier::{Tier, UnknownTier};
pub use usage::UsageLogEntry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier for the `Member`
    ///
    /// This is also used by other services.
    pub member_id: Uuid,
    /// Current tier, managed outside of the ledger
    pub tier: Tier,
}

impl Member {
    pub fn new(member_id: Uuid, tier: Tier) -> Self {
        Self { member_id, tier }
    }

    /// Whether this member's tier allows using `privilege`, ignoring whether it is active
    pub fn meets_tier_of(&self, privilege: &Privilege) -> bool {
        self.tier.satisfies(privilege.min_tier)
    }
}

/// Point totals for a member
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberPoints {
    pub member_id: Uuid,
    pub tier: Tier,
    /// Denormalized total from the balance record
    pub total_points: i64,
    /// Remaining points in lots that have not expired yet
    pub available_points: u64,
}
