use crmirror_db::sync::models::{SyncMode, TriggeredBy};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct TriggerSyncRequest {
    /// Defaults to incremental.
    pub mode: Option<SyncMode>,
    pub triggered_by: Option<TriggeredBy>,
}
