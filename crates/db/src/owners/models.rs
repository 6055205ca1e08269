use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Salesperson as known locally: upstream identity plus an optional human override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub external_id: String,
    pub upstream_name: Option<String>,
    pub email: Option<String>,
    pub display_name_override: Option<String>,
    pub synced_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owner {
    /// Override wins over the upstream name; the email stands in when neither is set.
    pub fn display_name(&self) -> String {
        self.display_name_override
            .clone()
            .or_else(|| self.upstream_name.clone())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.external_id.clone())
    }
}

/// Owner as delivered by an upstream refresh. Carries no override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub raw: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}
