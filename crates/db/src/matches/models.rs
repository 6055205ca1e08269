use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A call resolved to the contact whose normalized phone equals the call's counterpart number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallContactMatch {
    pub call_id: String,
    pub contact_id: String,
    /// Owner of the winning contact at resolution time.
    pub owner_id: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
    pub normalized_phone: String,
    /// Contacts sharing the normalized number; more than one means the tie-break picked.
    pub candidate_count: i32,
    pub ambiguous: bool,
    pub rebuilt_at: DateTime<Utc>,
}
