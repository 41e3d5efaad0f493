use std::{borrow::Cow, sync::Arc};

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::LedgerConfig,
    domain::{BenefitError, LedgerError, Tier, UnitOfWork},
    ports::{
        database::{self, DatabasePort},
        member, privilege,
    },
};

pub mod apply_privilege;
pub mod earn_points;
pub mod eligibility;
pub mod member_points;
pub mod record_usage;
pub mod redeem_points;

pub struct DomainLogic<D, M, P> {
    database: Arc<D>,
    member: Arc<M>,
    privilege: Arc<P>,
    config: LedgerConfig,
}

impl<D, M, P> DomainLogic<D, M, P> {
    pub fn new(database: Arc<D>, member: Arc<M>, privilege: Arc<P>, config: LedgerConfig) -> Self {
        Self {
            database,
            member,
            privilege,
            config,
        }
    }
}

impl<D, M, P> Clone for DomainLogic<D, M, P> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            member: self.member.clone(),
            privilege: self.privilege.clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("member {0} not found")]
    MemberNotFound(Uuid),
    #[error("privilege {0} not found")]
    PrivilegeNotFound(Uuid),
    #[error("privilege {0} is not active")]
    PrivilegeNotActive(Uuid),
    #[error("member {member_id} ({member_tier}) is not authorized to use privilege {privilege_id} (requires {required_tier})")]
    PrivilegeNotAuthorized {
        member_id: Uuid,
        privilege_id: Uuid,
        member_tier: Tier,
        required_tier: Tier,
    },
    /// The member has lots but no balance record
    #[error("no point balance found for member {0}")]
    BalanceNotFound(Uuid),
    #[error("member {member_id} cannot redeem {requested} points: only {available} available")]
    InsufficientBalance {
        member_id: Uuid,
        requested: u32,
        available: u64,
    },
    /// `action_type` is `None` when the privilege has no action type at all
    #[error("privilege {privilege_id} has unsupported benefit action type '{}'", .action_type.as_deref().unwrap_or("<none>"))]
    UnsupportedBenefit {
        privilege_id: Uuid,
        action_type: Option<String>,
    },
    #[error("privilege {privilege_id} is misconfigured: {reason}")]
    InvalidPrivilegeConfiguration {
        privilege_id: Uuid,
        reason: Cow<'static, str>,
    },
    /// `privilege_id` is set when the parameters were sent for a privilege benefit
    #[error("invalid parameters for member {member_id}{}: {reason}", .privilege_id.map(|id| format!(" and privilege {id}")).unwrap_or_default())]
    InvalidParameters {
        member_id: Uuid,
        privilege_id: Option<Uuid>,
        reason: Cow<'static, str>,
    },

    #[error("database port error: {0:?}")]
    Database(#[from] database::Error),
    #[error("member port error: {0:?}")]
    Member(member::Error),
    #[error("privilege port error: {0:?}")]
    Privilege(privilege::Error),
}

impl From<member::Error> for Error {
    fn from(err: member::Error) -> Self {
        match err {
            member::Error::MemberDoesNotExist(member_id) => Self::MemberNotFound(member_id),
            err => Self::Member(err),
        }
    }
}

impl From<privilege::Error> for Error {
    fn from(err: privilege::Error) -> Self {
        match err {
            privilege::Error::PrivilegeDoesNotExist(privilege_id) => {
                Self::PrivilegeNotFound(privilege_id)
            }
            err => Self::Privilege(err),
        }
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                member_id,
                requested,
                available,
            } => Self::InsufficientBalance {
                member_id,
                requested,
                available,
            },
            LedgerError::BalanceNotFound(member_id) => Self::BalanceNotFound(member_id),
            LedgerError::InvalidAmount {
                member_id,
                points,
                reason,
            } => Self::InvalidParameters {
                member_id,
                privilege_id: None,
                reason: format!("{reason} (requested {points})").into(),
            },
        }
    }
}

impl Error {
    /// Map a benefit failure for the member who invoked the privilege
    pub(crate) fn from_benefit(member_id: Uuid, err: BenefitError) -> Self {
        match err {
            BenefitError::MissingAction { privilege_id } => Self::UnsupportedBenefit {
                privilege_id,
                action_type: None,
            },
            BenefitError::UnrecognizedAction {
                privilege_id,
                action_type,
            } => Self::UnsupportedBenefit {
                privilege_id,
                action_type: Some(action_type),
            },
            BenefitError::InvalidConfiguration {
                privilege_id,
                name,
                reason,
            } => Self::InvalidPrivilegeConfiguration {
                privilege_id,
                reason: format!("{name}: {reason}").into(),
            },
            BenefitError::InvalidParameters {
                privilege_id,
                reason,
            } => Self::InvalidParameters {
                member_id,
                privilege_id: Some(privilege_id),
                reason,
            },
        }
    }
}

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
{
    /// Run `operation` against a fresh copy of the member's ledger and commit its writes
    ///
    /// Conflicting commits reload the ledger and run the operation again, up to
    /// `max_commit_attempts` times. Errors returned by the operation itself are never retried.
    pub(crate) async fn transact<T, F>(&self, member_id: Uuid, mut operation: F) -> Result<T, Error>
    where
        F: FnMut(&mut UnitOfWork) -> Result<T, Error>,
    {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 1;

        loop {
            // Balance first: its version then guards the lots read after it
            let balance = self.database.find_balance_for_member(member_id).await?;
            let lots = self.database.find_lots_for_member(member_id).await?;

            let mut uow = UnitOfWork::begin(member_id, balance, lots, Utc::now());
            let value = operation(&mut uow)?;

            match self.database.commit(uow.into_change_set()).await {
                Ok(()) => return Ok(value),
                Err(database::Error::Conflict {
                    expected, actual, ..
                }) if attempt < max_attempts => {
                    warn!(
                        %member_id,
                        attempt,
                        ?expected,
                        ?actual,
                        "Ledger commit conflicted, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Balance, PointLot},
        ports::{member::MockMemberPort, privilege::MockPrivilegePort, database::MockDatabasePort},
    };
    use chrono::Duration;
    use mockall::{predicate::*, Sequence};
    use speculoos::prelude::*;

    fn conflict(member_id: Uuid) -> database::Error {
        database::Error::Conflict {
            member_id,
            expected: Some(0),
            actual: Some(1),
        }
    }

    fn mocked_database(member_id: Uuid, loads: usize) -> MockDatabasePort {
        let now = Utc::now();
        let balance = Balance {
            total_points: 100,
            ..Balance::new(member_id, now)
        };
        let lot = PointLot {
            lot_id: Uuid::new_v4(),
            member_id,
            points_granted: 100,
            remaining_points: 100,
            received_at: now - Duration::days(1),
            expires_at: now + Duration::days(1),
            source: "TEST".to_string(),
        };

        let mut database = MockDatabasePort::new();
        database
            .expect_find_balance_for_member()
            .times(loads)
            .with(eq(member_id))
            .returning(move |_| Ok(Some(balance.clone())));
        database
            .expect_find_lots_for_member()
            .times(loads)
            .with(eq(member_id))
            .returning(move |_| Ok(vec![lot.clone()]));
        database
    }

    fn domain(
        database: MockDatabasePort,
        max_commit_attempts: u32,
    ) -> DomainLogic<MockDatabasePort, MockMemberPort, MockPrivilegePort> {
        DomainLogic::new(
            Arc::new(database),
            Arc::new(MockMemberPort::new()),
            Arc::new(MockPrivilegePort::new()),
            LedgerConfig {
                max_commit_attempts,
                ..LedgerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_transact_retries_conflict() {
        // GIVEN a database that rejects the first commit
        let member_id = Uuid::new_v4();
        let mut database = mocked_database(member_id, 2);
        let mut seq = Sequence::new();
        database
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Err(conflict(member_id)));
        database
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|change_set| {
                change_set.lots.len() == 1 && change_set.lots[0].remaining_points == 60
            })
            .returning(|_| Ok(()));
        let domain = domain(database, 3);

        // WHEN running an operation
        let mut runs = 0;
        let res = domain
            .transact(member_id, |uow| {
                runs += 1;
                Ok(uow.redeem(40, "retry")?)
            })
            .await;

        // THEN the operation ran again against reloaded data
        assert_that!(res).is_ok();
        assert_that!(runs).is_equal_to(2);
    }

    #[tokio::test]
    async fn test_transact_gives_up() {
        // GIVEN a database that always conflicts
        let member_id = Uuid::new_v4();
        let mut database = mocked_database(member_id, 2);
        database
            .expect_commit()
            .times(2)
            .returning(move |_| Err(conflict(member_id)));
        let domain = domain(database, 2);

        // WHEN running an operation
        let res = domain
            .transact(member_id, |uow| Ok(uow.redeem(10, "conflict")?))
            .await;

        // THEN the conflict is surfaced after the last attempt
        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::Database(database::Error::Conflict { .. }))
        });
    }

    #[tokio::test]
    async fn test_transact_does_not_retry_business_errors() {
        // GIVEN a database that must never be committed to
        let member_id = Uuid::new_v4();
        let database = mocked_database(member_id, 1);
        let domain = domain(database, 3);

        // WHEN the operation fails
        let res = domain
            .transact(member_id, |uow| Ok(uow.redeem(500, "too much")?))
            .await;

        // THEN the error is returned as is
        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::InsufficientBalance { requested: 500, available: 100, .. })
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeems_never_overspend() {
        // GIVEN a member holding a single 100-point lot
        let harness = fixtures::Harness::new();
        let member_id = harness.member(Tier::Gold);
        harness.seed_points(member_id, 100).await;

        // WHEN eight redemptions of 30 points race each other
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let domain = harness.domain.clone();
                tokio::spawn(async move { domain.redeem(member_id, 30, "race").await })
            })
            .collect();
        let mut successes = 0;
        for task in tasks {
            match task.await.expect("redeem task panicked") {
                Ok(_) => successes += 1,
                Err(Error::InsufficientBalance { .. }) => {}
                Err(Error::Database(database::Error::Conflict { .. })) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        // THEN every point is either redeemed or still in the lot, and the balance agrees
        let remaining: u32 = harness
            .lots(member_id)
            .await
            .iter()
            .map(|lot| lot.remaining_points)
            .sum();
        assert_that!(successes).is_less_than_or_equal_to(3);
        assert_that!(successes * 30 + remaining).is_equal_to(100);
        assert_that!(harness.total_points(member_id).await).is_equal_to(Some(i64::from(remaining)));
        assert_that!(harness.transactions(member_id).await).has_length(1 + successes as usize);
    }

    #[test]
    fn test_port_not_found_errors() {
        let member_id = Uuid::new_v4();
        let privilege_id = Uuid::new_v4();

        assert_that!(Error::from(member::Error::MemberDoesNotExist(member_id)))
            .matches(|err| matches!(err, Error::MemberNotFound(id) if *id == member_id));
        assert_that!(Error::from(privilege::Error::PrivilegeDoesNotExist(privilege_id)))
            .matches(|err| matches!(err, Error::PrivilegeNotFound(id) if *id == privilege_id));
    }

    #[test]
    fn test_unsupported_benefit_message() {
        let privilege_id = Uuid::new_v4();

        let member_id = Uuid::new_v4();

        let missing = Error::from_benefit(member_id, BenefitError::MissingAction { privilege_id });
        let unknown = Error::from_benefit(
            member_id,
            BenefitError::UnrecognizedAction {
                privilege_id,
                action_type: "FREE_COFFEE".to_string(),
            },
        );

        assert_that!(missing.to_string()).contains("<none>");
        assert_that!(unknown.to_string()).contains("FREE_COFFEE");
    }

    #[test]
    fn test_invalid_parameters_carry_ids() {
        let member_id = Uuid::new_v4();
        let privilege_id = Uuid::new_v4();

        let amount = Error::from(LedgerError::InvalidAmount {
            member_id,
            points: 0,
            reason: "cannot redeem zero points".into(),
        });
        let benefit = Error::from_benefit(
            member_id,
            BenefitError::InvalidParameters {
                privilege_id,
                reason: "missing or non-numeric 'originalCost'".into(),
            },
        );

        assert_that!(amount).matches(|err| {
            matches!(err, Error::InvalidParameters { member_id: id, privilege_id: None, .. } if *id == member_id)
        });
        assert_that!(amount.to_string()).contains(member_id.to_string().as_str());
        assert_that!(benefit).matches(|err| {
            matches!(
                err,
                Error::InvalidParameters { member_id: id, privilege_id: Some(pid), .. }
                    if *id == member_id && *pid == privilege_id
            )
        });
        assert_that!(benefit.to_string()).contains(privilege_id.to_string().as_str());
    }
}
