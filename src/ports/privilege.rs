use uuid::Uuid;

use crate::domain::Privilege;

#[mockall::automock]
#[async_trait::async_trait]
pub trait PrivilegePort {
    async fn get_privilege(&self, privilege_id: Uuid) -> Result<Privilege, Error>;
    /// Every privilege in the catalogue, active or not
    async fn list_privileges(&self) -> Result<Vec<Privilege>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a privilege does not exist
    #[error("privilege {0} does not exist")]
    PrivilegeDoesNotExist(Uuid),

    /// Domain-level error when another privilege already uses the name
    #[error("privilege name '{name}' is already used by privilege {existing_id}")]
    DuplicateName { name: String, existing_id: Uuid },

    /// Concrete adapter errors
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
