use uuid::Uuid;

use crate::domain::{Balance, ChangeSet, PointLot, Transaction, UsageLogEntry};

#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabasePort {
    /// All lots ever issued to the member, in insertion order
    async fn find_lots_for_member(&self, member_id: Uuid) -> Result<Vec<PointLot>, Error>;
    async fn find_balance_for_member(&self, member_id: Uuid) -> Result<Option<Balance>, Error>;
    /// Transactions of the member, in insertion order
    async fn find_transactions_for_member(&self, member_id: Uuid)
        -> Result<Vec<Transaction>, Error>;
    /// Usage log entries of the member, in insertion order
    async fn find_usage_for_member(&self, member_id: Uuid) -> Result<Vec<UsageLogEntry>, Error>;

    /// Atomically apply every write in the change set
    ///
    /// If the change set carries a balance, the stored balance version must still match
    /// `expected_version`. Otherwise nothing is written and [`Error::Conflict`] is returned.
    async fn commit(&self, change_set: ChangeSet) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Another writer updated the member's ledger since it was read
    ///
    /// The operation can be retried against fresh data.
    #[error("conflicting write on ledger of member {member_id}: expected version {expected:?}, found {actual:?}")]
    Conflict {
        member_id: Uuid,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
