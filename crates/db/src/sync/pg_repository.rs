use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::db_err;
use crate::sync::models::{
    ObjectType, RunCounts, RunStatus, SyncMode, SyncRun, SyncRunFilter, TriggeredBy,
};
use crate::sync::repositories::SyncRunRepository;
use crmirror_common::error::{CrmirrorError, CrmirrorResult};

pub(crate) const RUN_COLUMNS: &str = "id, batch_id, object_type, mode, status, triggered_by, started_at, \
     completed_at, duration_ms, records_fetched, records_inserted, records_updated, \
     records_failed, error_message";

#[derive(Clone)]
pub struct PgSyncRunRepository {
    pool: PgPool,
}

impl PgSyncRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn map_row(row: &sqlx::postgres::PgRow) -> CrmirrorResult<SyncRun> {
        let parse = |col: &str| -> String { row.get(col) };
        Ok(SyncRun {
            id: row.get("id"),
            batch_id: row.get("batch_id"),
            object_type: parse("object_type")
                .parse()
                .map_err(CrmirrorError::Internal)?,
            mode: parse("mode").parse().map_err(CrmirrorError::Internal)?,
            status: parse("status").parse().map_err(CrmirrorError::Internal)?,
            triggered_by: parse("triggered_by")
                .parse()
                .map_err(CrmirrorError::Internal)?,
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            duration_ms: row.get("duration_ms"),
            records_fetched: row.get("records_fetched"),
            records_inserted: row.get("records_inserted"),
            records_updated: row.get("records_updated"),
            records_failed: row.get("records_failed"),
            error_message: row.get("error_message"),
        })
    }

    async fn finish(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        status: RunStatus,
        message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        let row = sqlx::query(&format!(
            "update sync_runs
             set status = $1,
                 completed_at = $2,
                 duration_ms = (extract(epoch from ($2 - started_at)) * 1000)::bigint,
                 records_fetched = $3,
                 records_inserted = $4,
                 records_updated = $5,
                 records_failed = $6,
                 error_message = $7
             where id = $8 and status = 'running'
             returning {RUN_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(completed_at)
        .bind(counts.fetched)
        .bind(counts.inserted)
        .bind(counts.updated)
        .bind(counts.failed)
        .bind(message)
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(r) => Self::map_row(&r),
            None => match self.get(run_id).await? {
                Some(run) => Err(CrmirrorError::Conflict(format!(
                    "run {run_id} is already {}",
                    run.status.as_str()
                ))),
                None => Err(CrmirrorError::NotFound(format!("sync run {run_id}"))),
            },
        }
    }
}

#[async_trait]
impl SyncRunRepository for PgSyncRunRepository {
    async fn start(
        &self,
        object_type: ObjectType,
        mode: SyncMode,
        triggered_by: TriggeredBy,
        started_at: DateTime<Utc>,
    ) -> CrmirrorResult<Option<SyncRun>> {
        let row = sqlx::query(&format!(
            "insert into sync_runs (id, batch_id, object_type, mode, status, triggered_by, started_at)
             values ($1, $2, $3, $4, 'running', $5, $6)
             on conflict (object_type) where status = 'running' do nothing
             returning {RUN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .bind(object_type.as_str())
        .bind(mode.as_str())
        .bind(triggered_by.as_str())
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn complete(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        status: RunStatus,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        if !status.is_terminal() {
            return Err(CrmirrorError::Validation(
                "a run can only be completed with a terminal status".to_string(),
            ));
        }
        self.finish(run_id, counts, status, None, completed_at).await
    }

    async fn error(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        self.finish(run_id, counts, RunStatus::Failed, Some(message), completed_at)
            .await
    }

    async fn sweep_stale(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> CrmirrorResult<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "update sync_runs
             set status = 'failed',
                 completed_at = $1,
                 duration_ms = (extract(epoch from ($1 - started_at)) * 1000)::bigint,
                 error_message = $2
             where status = 'running' and started_at < $3
             returning {RUN_COLUMNS}"
        ))
        .bind(now)
        .bind(message)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn last_successful(&self, object_type: ObjectType) -> CrmirrorResult<Option<SyncRun>> {
        let row = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs
             where object_type = $1 and status in ('success', 'partial')
             order by started_at desc
             limit 1"
        ))
        .bind(object_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get(&self, run_id: Uuid) -> CrmirrorResult<Option<SyncRun>> {
        let row = sqlx::query(&format!("select {RUN_COLUMNS} from sync_runs where id = $1"))
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_recent(&self, filter: SyncRunFilter) -> CrmirrorResult<Vec<SyncRun>> {
        let mut qb = QueryBuilder::new(format!("select {RUN_COLUMNS} from sync_runs where 1=1"));

        if let Some(object_type) = filter.object_type {
            qb.push(" and object_type = ").push_bind(object_type.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" and status = ").push_bind(status.as_str());
        }

        qb.push(" order by started_at desc");
        qb.push(" limit ").push_bind(filter.effective_limit());
        qb.push(" offset ").push_bind(filter.effective_offset());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(Self::map_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;
    use chrono::Duration;

    // Object types are shared across tests, so every test clears in-flight runs it owns.
    async fn test_repo() -> Option<PgSyncRunRepository> {
        let pool = test_pool().await?;
        sqlx::query("update sync_runs set status = 'failed', error_message = 'test reset' where status = 'running'")
            .execute(&pool)
            .await
            .ok()?;
        Some(PgSyncRunRepository::new(pool))
    }

    #[tokio::test]
    async fn start_opens_running_run() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let run = repo
            .start(ObjectType::Contacts, SyncMode::Full, TriggeredBy::Manual, Utc::now())
            .await
            .expect("start")
            .expect("should open");
        assert_eq!(run.status, RunStatus::Running);
        assert_ne!(run.id, run.batch_id);
        repo.error(run.id, RunCounts::default(), "cleanup", Utc::now())
            .await
            .expect("cleanup");
    }

    #[tokio::test]
    async fn second_start_for_same_type_is_rejected() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let first = repo
            .start(ObjectType::Deals, SyncMode::Full, TriggeredBy::Cron, Utc::now())
            .await
            .expect("first")
            .expect("should open");
        let second = repo
            .start(ObjectType::Deals, SyncMode::Full, TriggeredBy::Api, Utc::now())
            .await
            .expect("second");
        assert!(second.is_none());
        repo.error(first.id, RunCounts::default(), "cleanup", Utc::now())
            .await
            .expect("cleanup");
    }

    #[tokio::test]
    async fn complete_writes_counts_and_duration() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let started = Utc::now();
        let run = repo
            .start(ObjectType::Calls, SyncMode::Incremental, TriggeredBy::Cron, started)
            .await
            .expect("start")
            .expect("should open");
        let counts = RunCounts {
            fetched: 5,
            inserted: 3,
            updated: 1,
            failed: 1,
        };
        let done = repo
            .complete(run.id, counts, RunStatus::Partial, started + Duration::seconds(2))
            .await
            .expect("complete");
        assert_eq!(done.status, RunStatus::Partial);
        assert_eq!(done.counts(), counts);
        assert_eq!(done.duration_ms, Some(2000));
    }

    #[tokio::test]
    async fn swept_run_cannot_be_completed() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let now = Utc::now();
        let run = repo
            .start(ObjectType::Owners, SyncMode::Full, TriggeredBy::Cron, now - Duration::hours(3))
            .await
            .expect("start")
            .expect("should open");

        let swept = repo
            .sweep_stale(now - Duration::hours(2), now, "stale run swept")
            .await
            .expect("sweep");
        assert!(swept.iter().any(|r| r.id == run.id));

        let err = repo
            .complete(run.id, RunCounts::default(), RunStatus::Success, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::Conflict(_)));

        let last = repo.last_successful(ObjectType::Owners).await.expect("last");
        assert!(last.map(|r| r.id != run.id).unwrap_or(true));
    }

    #[tokio::test]
    async fn list_recent_is_newest_first() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let runs = repo
            .list_recent(SyncRunFilter {
                limit: Some(20),
                ..Default::default()
            })
            .await
            .expect("list");
        for pair in runs.windows(2) {
            assert!(pair[0].started_at >= pair[1].started_at);
        }
    }
}
