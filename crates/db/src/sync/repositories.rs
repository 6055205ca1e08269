use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sync::models::{ObjectType, RunCounts, RunStatus, SyncMode, SyncRun, SyncRunFilter, TriggeredBy};
use crmirror_common::error::CrmirrorResult;

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Open a `running` run with fresh run and batch ids.
    /// Returns `None` if a run for the same object type is already in flight.
    async fn start(
        &self,
        object_type: ObjectType,
        mode: SyncMode,
        triggered_by: TriggeredBy,
        started_at: DateTime<Utc>,
    ) -> CrmirrorResult<Option<SyncRun>>;

    /// Close a running run with its counters and terminal status.
    /// Fails with `Conflict` if the run is no longer running (e.g. it was swept).
    async fn complete(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        status: RunStatus,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun>;

    /// Mark a running run as failed with an error message.
    async fn error(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun>;

    /// Force every run still `running` and started before `cutoff` to `failed`.
    async fn sweep_stale(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> CrmirrorResult<Vec<SyncRun>>;

    /// Latest run that produced a usable result (success or partial).
    async fn last_successful(&self, object_type: ObjectType) -> CrmirrorResult<Option<SyncRun>>;

    async fn get(&self, run_id: Uuid) -> CrmirrorResult<Option<SyncRun>>;

    /// Runs ordered by `started_at` descending.
    async fn list_recent(&self, filter: SyncRunFilter) -> CrmirrorResult<Vec<SyncRun>>;
}
