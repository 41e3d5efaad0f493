use std::{borrow::Cow, collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::usage::UsageLogEntry;

/// Points received by a member in a single issuance event
///
/// Lots are never deleted. Redemptions only drain `remaining_points`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointLot {
    pub lot_id: Uuid,
    pub member_id: Uuid,
    /// Points granted when the lot was created
    pub points_granted: u32,
    /// Points not yet redeemed, always `<= points_granted`
    pub remaining_points: u32,
    pub received_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Where the points came from, e.g. `PRIVILEGE_BENEFIT`
    pub source: String,
}

impl PointLot {
    /// Whether the lot can still be drawn from at `now`
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.remaining_points > 0 && self.expires_at > now
    }
}

/// Denormalized point balance of a member
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Balance {
    pub member_id: Uuid,
    pub total_points: i64,
    /// Cumulative redeemed points. Never decremented.
    pub used_points: i64,
    pub last_updated: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: u64,
}

impl Balance {
    pub fn new(member_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            total_points: 0,
            used_points: 0,
            last_updated: now,
            version: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    Earn,
    Redeem,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Earn => f.write_str("EARN"),
            TransactionKind::Redeem => f.write_str("REDEEM"),
        }
    }
}

/// Append-only record of a point movement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub member_id: Uuid,
    /// Signed point delta: positive for earns, negative for redemptions
    pub points: i64,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Points taken from a single lot during a redemption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub lot_id: Uuid,
    pub points: u32,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("member {member_id} cannot redeem {requested} points: only {available} available")]
    InsufficientBalance {
        member_id: Uuid,
        requested: u32,
        available: u64,
    },

    /// Data-integrity failure: lots exist without a balance record
    #[error("no point balance found for member {0}")]
    BalanceNotFound(Uuid),

    #[error("invalid point amount {points} for member {member_id}: {reason}")]
    InvalidAmount {
        member_id: Uuid,
        points: u32,
        reason: Cow<'static, str>,
    },
}

/// Sum of unexpired remaining points
pub fn available_points(lots: &[PointLot], now: DateTime<Utc>) -> u64 {
    lots.iter()
        .filter(|lot| lot.expires_at > now)
        .map(|lot| u64::from(lot.remaining_points))
        .sum()
}

/// Every write an operation wants to make to a member's ledger
///
/// Stores must apply a change set atomically and reject it when the stored balance version no
/// longer matches `expected_version`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub member_id: Uuid,
    /// Balance version observed when the unit of work was opened, `None` if there was no balance
    pub expected_version: Option<u64>,
    pub balance: Option<Balance>,
    pub lots: Vec<PointLot>,
    pub transactions: Vec<Transaction>,
    pub usage: Vec<UsageLogEntry>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.balance.is_none()
            && self.lots.is_empty()
            && self.transactions.is_empty()
            && self.usage.is_empty()
    }
}

/// Working copy of one member's ledger
///
/// Operations mutate the copy and stage their writes. Nothing is visible to other readers until
/// the resulting [`ChangeSet`] is committed, and a failed operation leaves the copy untouched.
#[derive(Clone, Debug)]
pub struct UnitOfWork {
    member_id: Uuid,
    now: DateTime<Utc>,
    expected_version: Option<u64>,
    balance: Option<Balance>,
    balance_dirty: bool,
    lots: Vec<PointLot>,
    dirty_lots: BTreeSet<usize>,
    transactions: Vec<Transaction>,
    usage: Vec<UsageLogEntry>,
}

impl UnitOfWork {
    pub fn begin(
        member_id: Uuid,
        balance: Option<Balance>,
        lots: Vec<PointLot>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            member_id,
            now,
            expected_version: balance.as_ref().map(|balance| balance.version),
            balance,
            balance_dirty: false,
            lots,
            dirty_lots: BTreeSet::new(),
            transactions: Vec::new(),
            usage: Vec::new(),
        }
    }

    pub fn member_id(&self) -> Uuid {
        self.member_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn balance(&self) -> Option<&Balance> {
        self.balance.as_ref()
    }

    pub fn lots(&self) -> &[PointLot] {
        &self.lots
    }

    /// Redeem points, draining the oldest received lots first
    ///
    /// Only lots with remaining points that have not expired at the unit's clock are considered.
    /// Lots received at the same instant are drained in store order.
    pub fn redeem(&mut self, points: u32, description: &str) -> Result<Vec<Allocation>, LedgerError> {
        if points == 0 {
            return Err(LedgerError::InvalidAmount {
                member_id: self.member_id,
                points,
                reason: "cannot redeem zero points".into(),
            });
        }

        let mut candidates: Vec<usize> = self
            .lots
            .iter()
            .enumerate()
            .filter(|(_, lot)| lot.is_available(self.now))
            .map(|(idx, _)| idx)
            .collect();
        candidates.sort_by_key(|idx| self.lots[*idx].received_at);

        // Plan the whole allocation before touching anything
        let mut remaining = points;
        let mut plan = Vec::new();
        for idx in candidates {
            if remaining == 0 {
                break;
            }
            let used = remaining.min(self.lots[idx].remaining_points);
            plan.push((idx, used));
            remaining -= used;
        }

        if remaining > 0 {
            return Err(LedgerError::InsufficientBalance {
                member_id: self.member_id,
                requested: points,
                available: u64::from(points - remaining),
            });
        }

        let balance = self
            .balance
            .as_mut()
            .ok_or(LedgerError::BalanceNotFound(self.member_id))?;
        balance.total_points -= i64::from(points);
        balance.used_points += i64::from(points);
        balance.last_updated = self.now;
        self.balance_dirty = true;

        let allocations = plan
            .into_iter()
            .map(|(idx, used)| {
                let lot = &mut self.lots[idx];
                lot.remaining_points -= used;
                self.dirty_lots.insert(idx);
                Allocation {
                    lot_id: lot.lot_id,
                    points: used,
                }
            })
            .collect();

        self.transactions.push(Transaction {
            transaction_id: Uuid::new_v4(),
            member_id: self.member_id,
            points: -i64::from(points),
            kind: TransactionKind::Redeem,
            timestamp: self.now,
            description: description.to_string(),
        });

        Ok(allocations)
    }

    /// Issue a new lot of points, creating the balance on first issuance
    pub fn earn(
        &mut self,
        points: u32,
        source: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<&PointLot, LedgerError> {
        if points == 0 {
            return Err(LedgerError::InvalidAmount {
                member_id: self.member_id,
                points,
                reason: "cannot earn zero points".into(),
            });
        }

        let member_id = self.member_id;
        let now = self.now;
        let balance = self
            .balance
            .get_or_insert_with(|| Balance::new(member_id, now));
        balance.total_points += i64::from(points);
        balance.last_updated = now;
        self.balance_dirty = true;

        self.transactions.push(Transaction {
            transaction_id: Uuid::new_v4(),
            member_id,
            points: i64::from(points),
            kind: TransactionKind::Earn,
            timestamp: now,
            description: description.to_string(),
        });

        self.lots.push(PointLot {
            lot_id: Uuid::new_v4(),
            member_id,
            points_granted: points,
            remaining_points: points,
            received_at: now,
            expires_at,
            source: source.to_string(),
        });
        let idx = self.lots.len() - 1;
        self.dirty_lots.insert(idx);

        Ok(&self.lots[idx])
    }

    /// Stage an audit entry for a privilege invocation
    pub fn record_usage(&mut self, entry: UsageLogEntry) {
        self.usage.push(entry);
    }

    pub fn into_change_set(self) -> ChangeSet {
        let lots = self
            .dirty_lots
            .iter()
            .map(|idx| self.lots[*idx].clone())
            .collect();

        ChangeSet {
            member_id: self.member_id,
            expected_version: self.expected_version,
            balance: self.balance.filter(|_| self.balance_dirty),
            lots,
            transactions: self.transactions,
            usage: self.usage,
        }
    }
}
