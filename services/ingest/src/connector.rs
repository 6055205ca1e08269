use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmirror_common::error::CrmirrorResult;
use crmirror_db::sync::models::{ObjectType, SyncMode, SyncRun, TriggeredBy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub object_type: ObjectType,
    /// Requested mode; incremental degrades to full without a prior successful run.
    pub mode: SyncMode,
    pub triggered_by: TriggeredBy,
}

/// A run that has been opened but whose pages have not been pulled yet.
#[derive(Debug, Clone)]
pub struct StartedSync {
    pub run: SyncRun,
    /// Lower bound on upstream modification time; `None` pulls everything.
    pub watermark: Option<DateTime<Utc>>,
}

/// Something the worker loop and the API can ask to mirror one object type.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a run. Fails with `Conflict` while another run of the same type is in flight.
    async fn begin(&self, request: SyncRequest) -> CrmirrorResult<StartedSync>;

    /// Pull every page for a started run and record its terminal status.
    async fn finish(&self, started: StartedSync) -> CrmirrorResult<SyncRun>;

    /// Fail every run still `running` past the stale timeout.
    async fn sweep_stale(&self) -> CrmirrorResult<Vec<SyncRun>>;

    /// Run one sync to completion and return the finished run.
    async fn sync(&self, request: SyncRequest) -> CrmirrorResult<SyncRun> {
        let started = self.begin(request).await?;
        self.finish(started).await
    }
}
