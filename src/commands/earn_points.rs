use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::PointLot,
    ports::{database::DatabasePort, member::MemberPort, privilege::PrivilegePort},
};
use chrono::{DateTime, Utc};
use tower::Service;
use tracing::info;
use uuid::Uuid;

use super::{DomainLogic, Error};

pub struct EarnPointsRequest {
    pub member_id: Uuid,
    pub points: u32,
    /// Origin of the points, stored on the lot
    pub source: String,
    pub description: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct EarnPointsResponse {
    pub member_id: Uuid,
    /// Newly created lot
    pub lot: PointLot,
    /// Balance total after the issuance
    pub total_points: i64,
}

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
    M: MemberPort,
{
    /// Issue a new lot of points to the member
    pub async fn earn(
        &self,
        member_id: Uuid,
        points: u32,
        source: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<EarnPointsResponse, Error> {
        let member = self.member.get_member(member_id).await?;

        let (lot, total_points) = self
            .transact(member.member_id, |uow| {
                let lot = uow.earn(points, source, description, expires_at)?.clone();
                let total_points = uow
                    .balance()
                    .map(|balance| balance.total_points)
                    .unwrap_or_default();
                Ok((lot, total_points))
            })
            .await?;

        info!(%member_id, points, source, lot_id = %lot.lot_id, total_points, "Earned points");

        Ok(EarnPointsResponse {
            member_id,
            lot,
            total_points,
        })
    }
}

impl<D, M, P> Service<EarnPointsRequest> for DomainLogic<D, M, P>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    P: PrivilegePort + 'static,
{
    type Response = EarnPointsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: EarnPointsRequest) -> Self::Future {
        let domain = self.clone();
        Box::pin(async move {
            domain
                .earn(
                    req.member_id,
                    req.points,
                    &req.source,
                    &req.description,
                    req.expires_at,
                )
                .await
        })
    }
}
