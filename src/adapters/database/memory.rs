use crate::{
    domain::{Balance, ChangeSet, PointLot, Transaction, UsageLogEntry},
    ports::database::{DatabasePort, Error},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// Everything stored for a single member
#[derive(Clone, Debug, Default)]
struct MemberLedger {
    balance: Option<Balance>,
    lots: Vec<PointLot>,
    transactions: Vec<Transaction>,
    usage: Vec<UsageLogEntry>,
}

#[derive(Clone, Debug)]
pub struct MemoryDatabase {
    ledgers: Arc<Mutex<HashMap<Uuid, MemberLedger>>>,
}

impl MemoryDatabase {
    fn read<T>(&self, member_id: Uuid, f: impl FnOnce(&MemberLedger) -> T) -> Result<T, Error> {
        let ledgers = self.ledgers.lock()?;
        let empty = MemberLedger::default();
        Ok(f(ledgers.get(&member_id).unwrap_or(&empty)))
    }
}

#[async_trait::async_trait]
impl DatabasePort for MemoryDatabase {
    async fn find_lots_for_member(&self, member_id: Uuid) -> Result<Vec<PointLot>, Error> {
        self.read(member_id, |ledger| ledger.lots.clone())
    }

    async fn find_balance_for_member(&self, member_id: Uuid) -> Result<Option<Balance>, Error> {
        self.read(member_id, |ledger| ledger.balance.clone())
    }

    async fn find_transactions_for_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<Transaction>, Error> {
        self.read(member_id, |ledger| ledger.transactions.clone())
    }

    async fn find_usage_for_member(&self, member_id: Uuid) -> Result<Vec<UsageLogEntry>, Error> {
        self.read(member_id, |ledger| ledger.usage.clone())
    }

    async fn commit(&self, change_set: ChangeSet) -> Result<(), Error> {
        let mut ledgers = self.ledgers.lock()?;
        let ledger = ledgers.entry(change_set.member_id).or_default();

        // Check before writing anything so a conflict leaves the ledger untouched
        let actual = ledger.balance.as_ref().map(|balance| balance.version);
        if change_set.balance.is_some() && actual != change_set.expected_version {
            return Err(Error::Conflict {
                member_id: change_set.member_id,
                expected: change_set.expected_version,
                actual,
            });
        }

        if let Some(mut balance) = change_set.balance {
            balance.version = actual.map_or(0, |version| version + 1);
            ledger.balance = Some(balance);
        }

        for lot in change_set.lots {
            match ledger
                .lots
                .iter_mut()
                .find(|stored| stored.lot_id == lot.lot_id)
            {
                Some(stored) => *stored = lot,
                None => ledger.lots.push(lot),
            }
        }

        ledger.transactions.extend(change_set.transactions);
        ledger.usage.extend(change_set.usage);

        Ok(())
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            ledgers: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for ErasedPoisonError {
    fn from(err: PoisonError<T>) -> Self {
        Self(err.to_string())
    }
}

/// We need to create a custom `From` implementation here for an error that's specific to this
/// adapter.
impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError::from(err)))
    }
}
