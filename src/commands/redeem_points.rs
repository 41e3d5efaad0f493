use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::Allocation,
    ports::{database::DatabasePort, member::MemberPort, privilege::PrivilegePort},
};
use tower::Service;
use tracing::info;
use uuid::Uuid;

use super::{DomainLogic, Error};

pub struct RedeemPointsRequest {
    pub member_id: Uuid,
    pub points: u32,
    pub description: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RedeemPointsResponse {
    pub member_id: Uuid,
    pub redeemed_points: u32,
    /// Lots the points were taken from, oldest first
    pub allocations: Vec<Allocation>,
    /// Balance total after the redemption
    pub total_points: i64,
}

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
    M: MemberPort,
{
    /// Spend points from the member's oldest unexpired lots
    ///
    /// Either every touched lot, the transaction and the balance are written, or nothing is.
    pub async fn redeem(
        &self,
        member_id: Uuid,
        points: u32,
        description: &str,
    ) -> Result<RedeemPointsResponse, Error> {
        let member = self.member.get_member(member_id).await?;

        let (allocations, total_points) = self
            .transact(member.member_id, |uow| {
                let allocations = uow.redeem(points, description)?;
                let total_points = uow
                    .balance()
                    .map(|balance| balance.total_points)
                    .unwrap_or_default();
                Ok((allocations, total_points))
            })
            .await?;

        info!(
            %member_id,
            points,
            lots = allocations.len(),
            total_points,
            "Redeemed points"
        );

        Ok(RedeemPointsResponse {
            member_id,
            redeemed_points: points,
            allocations,
            total_points,
        })
    }
}

impl<D, M, P> Service<RedeemPointsRequest> for DomainLogic<D, M, P>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    P: PrivilegePort + 'static,
{
    type Response = RedeemPointsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RedeemPointsRequest) -> Self::Future {
        let domain = self.clone();
        Box::pin(async move {
            domain
                .redeem(req.member_id, req.points, &req.description)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::fixtures::Harness,
        domain::{Tier, TransactionKind},
    };
    use chrono::{Duration, Utc};
    use rstest::*;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[fixture]
    fn harness() -> Harness {
        Harness::new()
    }

    #[rstest]
    #[tokio::test]
    async fn test_call(harness: Harness) -> Result<(), BoxError> {
        // GIVEN
        // * a member with two lots, the oldest holding 30 points
        // * a newer lot holding 50 points
        let member_id = harness.member(Tier::Silver);
        let now = Utc::now();
        let older = harness
            .seed_lot(member_id, 30, now - Duration::days(20), now + Duration::days(30))
            .await;
        let newer = harness
            .seed_lot(member_id, 50, now - Duration::days(10), now + Duration::days(30))
            .await;
        let mut domain = harness.domain.clone();

        // WHEN redeeming 40 points
        let req = RedeemPointsRequest {
            member_id,
            points: 40,
            description: "Cinema ticket".to_string(),
        };
        let res = ServiceExt::<RedeemPointsRequest>::ready(&mut domain)
            .await?
            .call(req)
            .await;

        // THEN
        // * the oldest lot is drained before the newer one is touched
        // * the balance and transaction history reflect the redemption
        assert_that!(res).is_ok().is_equal_to(RedeemPointsResponse {
            member_id,
            redeemed_points: 40,
            allocations: vec![
                Allocation {
                    lot_id: older.lot_id,
                    points: 30,
                },
                Allocation {
                    lot_id: newer.lot_id,
                    points: 10,
                },
            ],
            total_points: 40,
        });
        let remaining: Vec<_> = harness
            .lots(member_id)
            .await
            .into_iter()
            .map(|lot| lot.remaining_points)
            .collect();
        assert_that!(remaining).is_equal_to(vec![0, 40]);
        let transactions = harness.transactions(member_id).await;
        assert_that!(transactions.last()).is_some().matches(|txn| {
            txn.kind == TransactionKind::Redeem
                && txn.points == -40
                && txn.description == "Cinema ticket"
        });

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_insufficient_balance(harness: Harness) {
        // GIVEN a member with 50 valid points and 100 expired points
        let member_id = harness.member(Tier::Bronze);
        let now = Utc::now();
        harness
            .seed_lot(member_id, 100, now - Duration::days(400), now - Duration::days(35))
            .await;
        harness.seed_points(member_id, 50).await;
        let lots_before = harness.lots(member_id).await;

        // WHEN redeeming more than the valid points
        let res = harness.domain.redeem(member_id, 60, "Too much").await;

        // THEN nothing changes
        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::InsufficientBalance { requested: 60, available: 50, .. })
        });
        assert_that!(harness.lots(member_id).await).is_equal_to(lots_before);
        assert_that!(harness.total_points(member_id).await).is_equal_to(Some(150));
        assert_that!(harness.transactions(member_id).await).has_length(2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_unknown_member(harness: Harness) {
        let member_id = Uuid::new_v4();

        let res = harness.domain.redeem(member_id, 10, "Ghost").await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::MemberNotFound(id) if *id == member_id));
    }

    #[rstest]
    #[tokio::test]
    async fn test_zero_points(harness: Harness) {
        let member_id = harness.member(Tier::Gold);
        harness.seed_points(member_id, 10).await;

        let res = harness.domain.redeem(member_id, 0, "Nothing").await;

        assert_that!(res).is_err().matches(|err| {
            matches!(
                err,
                Error::InvalidParameters { member_id: id, privilege_id: None, reason }
                    if *id == member_id && reason.contains("requested 0")
            )
        });
        assert_that!(harness.total_points(member_id).await).is_equal_to(Some(10));
    }

    #[rstest]
    #[tokio::test]
    async fn test_exact_balance(harness: Harness) {
        let member_id = harness.member(Tier::Gold);
        harness.seed_points(member_id, 25).await;
        harness.seed_points(member_id, 25).await;

        let res = harness.domain.redeem(member_id, 50, "Everything").await;

        assert_that!(res)
            .is_ok()
            .matches(|res| res.total_points == 0 && res.allocations.len() == 2);
        for lot in harness.lots(member_id).await {
            assert_that!(lot.remaining_points).is_equal_to(0);
        }
    }
}
