use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Audit record of a privilege invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageLogEntry {
    pub entry_id: Uuid,
    pub member_id: Uuid,
    pub privilege_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub notes: String,
}

impl UsageLogEntry {
    pub fn new(
        member_id: Uuid,
        privilege_id: Uuid,
        timestamp: DateTime<Utc>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            member_id,
            privilege_id,
            timestamp,
            notes: notes.into(),
        }
    }
}
