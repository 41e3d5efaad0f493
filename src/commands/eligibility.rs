use uuid::Uuid;

use crate::{
    domain::Privilege,
    ports::{member::MemberPort, privilege::PrivilegePort},
};

use super::{DomainLogic, Error};

impl<D, M, P> DomainLogic<D, M, P>
where
    M: MemberPort,
    P: PrivilegePort,
{
    /// Whether the member may use the privilege right now
    ///
    /// Inactive privileges are reported as `false` rather than as an error.
    pub async fn can_use(&self, member_id: Uuid, privilege_id: Uuid) -> Result<bool, Error> {
        let member = self.member.get_member(member_id).await?;
        let privilege = self.privilege.get_privilege(privilege_id).await?;

        Ok(privilege.active && member.meets_tier_of(&privilege))
    }

    /// Fetch a privilege, failing unless it is active
    pub async fn verify_active(&self, privilege_id: Uuid) -> Result<Privilege, Error> {
        let privilege = self.privilege.get_privilege(privilege_id).await?;
        if !privilege.active {
            return Err(Error::PrivilegeNotActive(privilege_id));
        }
        Ok(privilege)
    }

    /// Every active privilege the member's tier unlocks
    pub async fn available_privileges(&self, member_id: Uuid) -> Result<Vec<Privilege>, Error> {
        let member = self.member.get_member(member_id).await?;

        Ok(self
            .privilege
            .list_privileges()
            .await?
            .into_iter()
            .filter(|privilege| privilege.active && member.meets_tier_of(privilege))
            .collect())
    }
}
