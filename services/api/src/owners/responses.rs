use chrono::{DateTime, Utc};
use crmirror_db::owners::models::Owner;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub external_id: String,
    /// Effective name: override, then upstream name, then email.
    pub display_name: String,
    pub upstream_name: Option<String>,
    pub email: Option<String>,
    pub display_name_override: Option<String>,
    pub synced_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Owner> for OwnerResponse {
    fn from(owner: Owner) -> Self {
        Self {
            display_name: owner.display_name(),
            external_id: owner.external_id,
            upstream_name: owner.upstream_name,
            email: owner.email,
            display_name_override: owner.display_name_override,
            synced_at: owner.synced_at,
            updated_at: owner.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListOwnersResponse {
    pub data: Vec<OwnerResponse>,
    pub count: usize,
}
