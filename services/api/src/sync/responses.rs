use chrono::{DateTime, Utc};
use crmirror_db::sync::models::{ObjectType, RunCounts, RunStatus, SyncMode, SyncRun, TriggeredBy};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub run_id: Uuid,
    pub batch_id: Uuid,
    pub object_type: ObjectType,
    pub mode: SyncMode,
    pub status: RunStatus,
    pub triggered_by: TriggeredBy,
    pub counts: RunCounts,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
}

impl From<SyncRun> for SyncRunResponse {
    fn from(run: SyncRun) -> Self {
        Self {
            counts: run.counts(),
            run_id: run.id,
            batch_id: run.batch_id,
            object_type: run.object_type,
            mode: run.mode,
            status: run.status,
            triggered_by: run.triggered_by,
            started_at: run.started_at,
            completed_at: run.completed_at,
            duration_ms: run.duration_ms,
            error_message: run.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub data: Vec<SyncRunResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ObjectSyncStatus {
    pub object_type: ObjectType,
    pub last_successful: Option<SyncRunResponse>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub data: Vec<ObjectSyncStatus>,
}
