use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::BenefitParams,
    ports::{database::DatabasePort, member::MemberPort, privilege::PrivilegePort},
};
use chrono::{DateTime, Months, Utc};
use tower::Service;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{DomainLogic, Error};

pub struct ApplyPrivilegeRequest {
    /// Acting member, resolved by the caller
    pub member_id: Uuid,
    pub privilege_id: Uuid,
    /// Benefit type expected by the caller
    ///
    /// Informational only: the privilege's own action type always decides the benefit.
    pub benefit_type: Option<String>,
    /// Benefit parameters, empty when none were sent
    pub params: BenefitParams,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ApplyPrivilegeResponse {
    pub member_id: Uuid,
    pub privilege_id: Uuid,
    /// Points issued by the benefit, 0 if it was worth nothing
    pub points_granted: u32,
    /// Lot created for the granted points
    pub lot_id: Option<Uuid>,
    /// Notes written to the usage log
    pub notes: String,
}

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
    M: MemberPort,
    P: PrivilegePort,
{
    /// Use a privilege on behalf of a member
    ///
    /// The member and privilege are checked first: missing records, inactive privileges and
    /// insufficient tiers are rejected before the benefit is evaluated. The point issuance and the
    /// usage log entry are then committed together.
    #[instrument(skip_all, fields(member_id = %req.member_id, privilege_id = %req.privilege_id))]
    pub async fn apply(&self, req: ApplyPrivilegeRequest) -> Result<ApplyPrivilegeResponse, Error> {
        let member = self.member.get_member(req.member_id).await?;
        let privilege = self.verify_active(req.privilege_id).await?;

        if !self
            .can_use(member.member_id, privilege.privilege_id)
            .await?
        {
            warn!(tier = %member.tier, min_tier = %privilege.min_tier, "Member tier too low for privilege");
            return Err(Error::PrivilegeNotAuthorized {
                member_id: member.member_id,
                privilege_id: privilege.privilege_id,
                member_tier: member.tier,
                required_tier: privilege.min_tier,
            });
        }

        if let Some(benefit_type) = &req.benefit_type {
            if privilege.benefit_action_type.as_ref() != Some(benefit_type) {
                debug!(
                    requested = %benefit_type,
                    configured = ?privilege.benefit_action_type,
                    "Ignoring requested benefit type"
                );
            }
        }

        let effect = privilege.benefit_effect(&req.params).map_err(|err| {
            warn!(error = %err, "Rejected privilege benefit");
            Error::from_benefit(member.member_id, err)
        })?;

        let entry = self
            .usage_entry(member.member_id, privilege.privilege_id, effect.notes.clone())
            .await?;
        let validity = Months::new(self.config.benefit_validity_months);

        let lot_id = self
            .transact(member.member_id, |uow| {
                let lot_id = match &effect.grant {
                    Some(grant) => {
                        let expires_at = uow
                            .now()
                            .checked_add_months(validity)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC);
                        let lot =
                            uow.earn(grant.points, grant.source, &grant.description, expires_at)?;
                        Some(lot.lot_id)
                    }
                    None => None,
                };
                uow.record_usage(entry.clone());
                Ok(lot_id)
            })
            .await?;

        let points_granted = effect.grant.as_ref().map_or(0, |grant| grant.points);
        info!(points_granted, "Applied privilege benefit");

        Ok(ApplyPrivilegeResponse {
            member_id: member.member_id,
            privilege_id: privilege.privilege_id,
            points_granted,
            lot_id,
            notes: effect.notes,
        })
    }
}

impl<D, M, P> Service<ApplyPrivilegeRequest> for DomainLogic<D, M, P>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    P: PrivilegePort + 'static,
{
    type Response = ApplyPrivilegeResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApplyPrivilegeRequest) -> Self::Future {
        let domain = self.clone();
        Box::pin(async move { domain.apply(req).await })
    }
}
