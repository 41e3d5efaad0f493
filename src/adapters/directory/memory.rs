use crate::{
    adapters::database::memory::ErasedPoisonError,
    domain::{Member, Privilege},
    ports::{
        member::{self, MemberPort},
        privilege::{self, PrivilegePort},
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory member and privilege records
///
/// Member and privilege lifecycles are owned by other services. This adapter only offers
/// upserts so that they can be seeded.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    members: Arc<Mutex<HashMap<Uuid, Member>>>,
    privileges: Arc<Mutex<HashMap<Uuid, Privilege>>>,
}

impl MemoryDirectory {
    pub fn upsert_member(&self, member: Member) -> Result<(), member::Error> {
        self.members.lock()?.insert(member.member_id, member);
        Ok(())
    }

    /// Insert or replace a privilege
    ///
    /// Names are unique across the catalogue: a name held by another privilege is rejected.
    pub fn upsert_privilege(&self, privilege: Privilege) -> Result<(), privilege::Error> {
        let mut privileges = self.privileges.lock()?;
        if let Some(existing) = privileges.values().find(|existing| {
            existing.name == privilege.name && existing.privilege_id != privilege.privilege_id
        }) {
            return Err(privilege::Error::DuplicateName {
                name: privilege.name.clone(),
                existing_id: existing.privilege_id,
            });
        }

        privileges.insert(privilege.privilege_id, privilege);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MemberPort for MemoryDirectory {
    async fn get_member(&self, member_id: Uuid) -> Result<Member, member::Error> {
        let member = self.members.lock()?.get(&member_id).cloned();
        member.ok_or(member::Error::MemberDoesNotExist(member_id))
    }
}

#[async_trait::async_trait]
impl PrivilegePort for MemoryDirectory {
    async fn get_privilege(&self, privilege_id: Uuid) -> Result<Privilege, privilege::Error> {
        let privilege = self.privileges.lock()?.get(&privilege_id).cloned();
        privilege.ok_or(privilege::Error::PrivilegeDoesNotExist(privilege_id))
    }

    async fn list_privileges(&self) -> Result<Vec<Privilege>, privilege::Error> {
        let privileges = self.privileges.lock()?.values().cloned().collect();
        Ok(privileges)
    }
}

impl<T> From<PoisonError<T>> for member::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError::from(err)))
    }
}

impl<T> From<PoisonError<T>> for privilege::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError::from(err)))
    }
}
