use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    domain::{ChangeSet, UsageLogEntry},
    ports::{database::DatabasePort, member::MemberPort, privilege::PrivilegePort},
};
use chrono::Utc;
use tower::Service;
use tracing::info;
use uuid::Uuid;

use super::{DomainLogic, Error};

pub struct RecordUsageRequest {
    pub member_id: Uuid,
    pub privilege_id: Uuid,
    pub notes: String,
}

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
    M: MemberPort,
    P: PrivilegePort,
{
    /// Build a usage entry after making sure both the member and the privilege still exist
    pub(crate) async fn usage_entry(
        &self,
        member_id: Uuid,
        privilege_id: Uuid,
        notes: String,
    ) -> Result<UsageLogEntry, Error> {
        let member = self.member.get_member(member_id).await?;
        let privilege = self.privilege.get_privilege(privilege_id).await?;

        Ok(UsageLogEntry::new(
            member.member_id,
            privilege.privilege_id,
            Utc::now(),
            notes,
        ))
    }

    /// Append an entry to the privilege usage log
    pub async fn log_usage(
        &self,
        member_id: Uuid,
        privilege_id: Uuid,
        notes: &str,
    ) -> Result<UsageLogEntry, Error> {
        let entry = self
            .usage_entry(member_id, privilege_id, notes.to_string())
            .await?;

        // Appends never conflict, so there is no ledger to load
        self.database
            .commit(ChangeSet {
                member_id,
                usage: vec![entry.clone()],
                ..ChangeSet::default()
            })
            .await?;

        info!(%member_id, %privilege_id, entry_id = %entry.entry_id, "Recorded privilege usage");

        Ok(entry)
    }
}

impl<D, M, P> Service<RecordUsageRequest> for DomainLogic<D, M, P>
where
    D: DatabasePort + 'static,
    M: MemberPort + 'static,
    P: PrivilegePort + 'static,
{
    type Response = UsageLogEntry;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RecordUsageRequest) -> Self::Future {
        let domain = self.clone();
        Box::pin(async move {
            domain
                .log_usage(req.member_id, req.privilege_id, &req.notes)
                .await
        })
    }
}
