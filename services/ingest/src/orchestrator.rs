use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmirror_common::clock::Clock;
use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_db::mirror::models::UpsertOutcome;
use crmirror_db::mirror::repositories::MirrorRepository;
use crmirror_db::owners::repositories::OwnerRepository;
use crmirror_db::sync::models::{ObjectType, RunCounts, RunStatus, SyncMode, SyncRun};
use crmirror_db::sync::repositories::SyncRunRepository;
use uuid::Uuid;

use crate::connector::{Connector, StartedSync, SyncRequest};
use crate::crm::client::{CrmClient, UpstreamError};
use crate::crm::models::Page;
use crate::transform::{self, MirrorRecord};

/// Pulls one object type from the CRM into the mirror, with run bookkeeping.
pub struct SyncOrchestrator<R, M, O> {
    client: CrmClient,
    runs: R,
    mirror: M,
    owners: O,
    clock: Arc<dyn Clock>,
    stale_after: chrono::Duration,
}

impl<R, M, O> SyncOrchestrator<R, M, O>
where
    R: SyncRunRepository,
    M: MirrorRepository,
    O: OwnerRepository,
{
    pub fn new(
        client: CrmClient,
        runs: R,
        mirror: M,
        owners: O,
        clock: Arc<dyn Clock>,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            client,
            runs,
            mirror,
            owners,
            clock,
            stale_after,
        }
    }

    /// Effective mode and watermark. Owners are always pulled in full.
    async fn resolve_mode(
        &self,
        request: &SyncRequest,
    ) -> CrmirrorResult<(SyncMode, Option<DateTime<Utc>>)> {
        if request.object_type == ObjectType::Owners || request.mode == SyncMode::Full {
            return Ok((SyncMode::Full, None));
        }

        match self.runs.last_successful(request.object_type).await? {
            Some(last) => Ok((SyncMode::Incremental, Some(last.started_at))),
            None => {
                tracing::info!(
                    object_type = %request.object_type,
                    "no successful run yet, falling back to full sync"
                );
                Ok((SyncMode::Full, None))
            }
        }
    }

    async fn fetch_page(
        &self,
        object_type: ObjectType,
        watermark: Option<DateTime<Utc>>,
        after: Option<&str>,
    ) -> Result<Page, UpstreamError> {
        let properties = transform::properties(object_type);
        match (object_type, watermark) {
            (ObjectType::Owners, _) => self.client.owners_page(after).await,
            (_, Some(since)) => {
                self.client
                    .search_page(
                        object_type,
                        properties,
                        transform::modified_property(object_type),
                        since,
                        after,
                    )
                    .await
            }
            (_, None) => {
                self.client
                    .list_page(
                        object_type,
                        properties,
                        transform::associations(object_type),
                        after,
                    )
                    .await
            }
        }
    }

    async fn store(&self, record: &MirrorRecord) -> CrmirrorResult<UpsertOutcome> {
        match record {
            MirrorRecord::Contact(c) => self.mirror.upsert_contact(c).await,
            MirrorRecord::Deal(d) => self.mirror.upsert_deal(d).await,
            MirrorRecord::Call(c) => self.mirror.upsert_call(c).await,
            MirrorRecord::Owner(o) => self.owners.upsert_from_upstream(o).await,
        }
    }

    /// Transform and upsert one page record by record; failures are counted, never fatal.
    async fn apply_page(
        &self,
        object_type: ObjectType,
        results: Vec<serde_json::Value>,
        batch_id: Uuid,
        counts: &mut RunCounts,
    ) {
        let synced_at = self.clock.now();

        for value in results {
            counts.fetched += 1;
            let id = transform::raw_id(&value);

            let record = match transform::transform(object_type, value, batch_id, synced_at) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%object_type, external_id = %id, error = %e, "skipping malformed record");
                    counts.failed += 1;
                    continue;
                }
            };

            match self.store(&record).await {
                Ok(UpsertOutcome::Inserted) => counts.inserted += 1,
                Ok(UpsertOutcome::Updated) => counts.updated += 1,
                Err(e) => {
                    tracing::warn!(
                        %object_type,
                        external_id = %record.external_id(),
                        error = %e,
                        "failed to upsert record"
                    );
                    counts.failed += 1;
                }
            }
        }
    }

    async fn fail_run(
        &self,
        run: &SyncRun,
        counts: RunCounts,
        message: String,
    ) -> CrmirrorResult<SyncRun> {
        tracing::error!(
            object_type = %run.object_type,
            run_id = %run.id,
            fetched = counts.fetched,
            error = %message,
            "sync run failed"
        );
        self.runs
            .error(run.id, counts, &message, self.clock.now())
            .await?;
        Err(CrmirrorError::Upstream(format!(
            "{} sync run {} failed: {message}",
            run.object_type, run.id
        )))
    }
}

#[async_trait]
impl<R, M, O> Connector for SyncOrchestrator<R, M, O>
where
    R: SyncRunRepository,
    M: MirrorRepository,
    O: OwnerRepository,
{
    async fn begin(&self, request: SyncRequest) -> CrmirrorResult<StartedSync> {
        self.sweep_stale().await?;

        let object_type = request.object_type;
        let (mode, watermark) = self.resolve_mode(&request).await?;

        let run = self
            .runs
            .start(object_type, mode, request.triggered_by, self.clock.now())
            .await?
            .ok_or_else(|| {
                CrmirrorError::Conflict(format!("a {object_type} sync is already running"))
            })?;

        tracing::info!(
            %object_type,
            run_id = %run.id,
            batch_id = %run.batch_id,
            mode = mode.as_str(),
            watermark = ?watermark,
            "sync run started"
        );

        Ok(StartedSync { run, watermark })
    }

    async fn finish(&self, started: StartedSync) -> CrmirrorResult<SyncRun> {
        let StartedSync { run, watermark } = started;
        let object_type = run.object_type;
        let mut counts = RunCounts::default();
        let mut after: Option<String> = None;

        loop {
            let page = match self.fetch_page(object_type, watermark, after.as_deref()).await {
                Ok(page) => page,
                Err(e) => return self.fail_run(&run, counts, e.to_string()).await,
            };
            let next = page.next_after().map(str::to_string);

            self.apply_page(object_type, page.results, run.batch_id, &mut counts)
                .await;

            match next {
                Some(cursor) if after.as_deref() == Some(cursor.as_str()) => {
                    let message = format!("pagination cursor {cursor} did not advance");
                    return self.fail_run(&run, counts, message).await;
                }
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        let status = counts.outcome();
        let finished = self
            .runs
            .complete(run.id, counts, status, self.clock.now())
            .await?;

        match status {
            RunStatus::Failed => tracing::error!(
                %object_type,
                run_id = %run.id,
                fetched = counts.fetched,
                failed = counts.failed,
                "sync run failed: no record committed"
            ),
            _ => tracing::info!(
                %object_type,
                run_id = %run.id,
                status = status.as_str(),
                fetched = counts.fetched,
                inserted = counts.inserted,
                updated = counts.updated,
                failed = counts.failed,
                duration_ms = ?finished.duration_ms,
                "sync run completed"
            ),
        }

        Ok(finished)
    }

    async fn sweep_stale(&self) -> CrmirrorResult<Vec<SyncRun>> {
        let now = self.clock.now();
        let message = format!(
            "stale run swept: still running after {} minutes",
            self.stale_after.num_minutes()
        );
        let swept = self
            .runs
            .sweep_stale(now - self.stale_after, now, &message)
            .await?;

        for run in &swept {
            tracing::warn!(
                object_type = %run.object_type,
                run_id = %run.id,
                started_at = %run.started_at,
                "stale sync run swept to failed"
            );
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::client::CrmClientConfig;
    use crate::fakes::{running_run, MemoryMirror, MemoryOwners, MemoryRuns};
    use crate::retry::RetryPolicy;
    use chrono::{Duration, TimeZone};
    use crmirror_common::clock::FixedClock;
    use crmirror_db::sync::models::TriggeredBy;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestOrchestrator = SyncOrchestrator<MemoryRuns, MemoryMirror, MemoryOwners>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        orchestrator: TestOrchestrator,
        runs: MemoryRuns,
        mirror: MemoryMirror,
        owners: MemoryOwners,
        clock: Arc<FixedClock>,
    }

    fn harness(server: &MockServer) -> Harness {
        let config = CrmClientConfig {
            base_url: server.uri(),
            access_token: "test-token".to_string(),
            page_size: 2,
            timeout_secs: 5,
            retry: RetryPolicy {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        };
        let runs = MemoryRuns::default();
        let mirror = MemoryMirror::default();
        let owners = MemoryOwners::default();
        let clock = Arc::new(FixedClock::new(t0()));
        let orchestrator = SyncOrchestrator::new(
            CrmClient::new(config).unwrap(),
            runs.clone(),
            mirror.clone(),
            owners.clone(),
            clock.clone(),
            Duration::minutes(120),
        );
        Harness {
            orchestrator,
            runs,
            mirror,
            owners,
            clock,
        }
    }

    fn request(object_type: ObjectType, mode: SyncMode) -> SyncRequest {
        SyncRequest {
            object_type,
            mode,
            triggered_by: TriggeredBy::Manual,
        }
    }

    fn contact_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "properties": {
                "email": format!("{id}@example.com"),
                "phone": "+1 555 010 0123",
                "lifecyclestage": "lead",
                "createdate": "2026-02-01T09:00:00Z"
            }
        })
    }

    async fn mount_contacts(server: &MockServer, pages: Vec<(Option<&str>, Vec<serde_json::Value>, Option<&str>)>) {
        for (after, results, next) in pages {
            let body = match next {
                Some(n) => serde_json::json!({ "results": results, "paging": { "next": { "after": n } } }),
                None => serde_json::json!({ "results": results }),
            };
            let mut mock = Mock::given(method("GET")).and(path("/crm/v3/objects/contacts"));
            if let Some(a) = after {
                mock = mock.and(query_param("after", a));
            }
            mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }
    }

    #[tokio::test]
    async fn full_sync_twice_is_idempotent() {
        let server = MockServer::start().await;
        // the cursor-specific mock is mounted first so it takes precedence
        mount_contacts(
            &server,
            vec![
                (Some("2"), vec![contact_json("k3")], None),
                (None, vec![contact_json("k1"), contact_json("k2")], Some("2")),
            ],
        )
        .await;
        let h = harness(&server);

        let first = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(first.status, RunStatus::Success);
        assert_eq!(first.counts(), RunCounts { fetched: 3, inserted: 3, updated: 0, failed: 0 });
        let snapshot: Vec<serde_json::Value> = {
            let mut rows: Vec<_> = h.mirror.contacts.lock().unwrap().values().map(|c| c.raw.clone()).collect();
            rows.sort_by_key(|v| v["id"].as_str().unwrap_or_default().to_string());
            rows
        };

        h.clock.advance(Duration::minutes(5));
        let second = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(second.counts(), RunCounts { fetched: 3, inserted: 0, updated: 3, failed: 0 });
        assert_ne!(first.batch_id, second.batch_id);

        let mut after: Vec<_> = h.mirror.contacts.lock().unwrap().values().map(|c| c.raw.clone()).collect();
        after.sort_by_key(|v| v["id"].as_str().unwrap_or_default().to_string());
        assert_eq!(snapshot, after);
        assert!(h
            .mirror
            .contacts
            .lock()
            .unwrap()
            .values()
            .all(|c| c.batch_id == second.batch_id));
    }

    #[tokio::test]
    async fn malformed_record_makes_run_partial() {
        let server = MockServer::start().await;
        mount_contacts(
            &server,
            vec![(
                None,
                vec![
                    contact_json("k1"),
                    serde_json::json!({ "id": "k2", "properties": { "createdate": "yesterday" } }),
                ],
                None,
            )],
        )
        .await;
        let h = harness(&server);

        let run = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.records_inserted, 1);
        assert_eq!(run.records_failed, 1);
    }

    #[tokio::test]
    async fn every_record_failing_makes_run_failed() {
        let server = MockServer::start().await;
        mount_contacts(&server, vec![(None, vec![contact_json("k1")], None)]).await;
        let h = harness(&server);
        h.mirror.reject.lock().unwrap().push("k1".to_string());

        let run = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.records_failed, 1);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected() {
        let server = MockServer::start().await;
        let h = harness(&server);
        h.runs.insert(running_run(ObjectType::Deals, t0() - Duration::minutes(10)));

        let err = h
            .orchestrator
            .sync(request(ObjectType::Deals, SyncMode::Full))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::Conflict(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn stale_run_is_swept_before_new_run() {
        let server = MockServer::start().await;
        mount_contacts(&server, vec![(None, vec![contact_json("k1")], None)]).await;
        let h = harness(&server);
        let stale = running_run(ObjectType::Contacts, t0() - Duration::hours(3));
        let stale_id = stale.id;
        h.runs.insert(stale);

        let run = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Success);

        let swept = h.runs.get(stale_id).await.unwrap().unwrap();
        assert_eq!(swept.status, RunStatus::Failed);
        assert!(swept
            .error_message
            .unwrap()
            .contains("still running after 120 minutes"));

        let last = h.runs.last_successful(ObjectType::Contacts).await.unwrap().unwrap();
        assert_eq!(last.id, run.id);
    }

    #[tokio::test]
    async fn swept_run_cannot_be_completed() {
        let server = MockServer::start().await;
        let h = harness(&server);
        let stale = running_run(ObjectType::Calls, t0() - Duration::hours(3));
        let stale_id = stale.id;
        h.runs.insert(stale);

        let swept = h.orchestrator.sweep_stale().await.unwrap();
        assert_eq!(swept.len(), 1);

        let err = h
            .runs
            .complete(stale_id, RunCounts::default(), RunStatus::Success, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::Conflict(_)));
    }

    #[tokio::test]
    async fn incremental_searches_from_last_success() {
        let server = MockServer::start().await;
        let h = harness(&server);
        let previous_start = t0() - Duration::days(1);
        let mut previous = running_run(ObjectType::Deals, previous_start);
        previous.status = RunStatus::Success;
        h.runs.insert(previous);

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/deals/search"))
            .and(body_partial_json(serde_json::json!({
                "filterGroups": [{ "filters": [{
                    "propertyName": "hs_lastmodifieddate",
                    "operator": "GTE",
                    "value": previous_start.timestamp_millis().to_string(),
                }]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "d1", "properties": { "amount": "100" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let run = h
            .orchestrator
            .sync(request(ObjectType::Deals, SyncMode::Incremental))
            .await
            .unwrap();
        assert_eq!(run.mode, SyncMode::Incremental);
        assert_eq!(run.records_inserted, 1);
    }

    #[tokio::test]
    async fn incremental_deal_update_keeps_contact_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals"))
            .and(query_param("associations", "contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "d1",
                    "properties": { "amount": "100", "dealstage": "appointmentscheduled" },
                    "associations": { "contacts": { "results": [{ "id": "c9", "type": "deal_to_contact" }] } }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/deals/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "d1", "properties": { "amount": "250", "dealstage": "closedwon" } }]
            })))
            .mount(&server)
            .await;
        let h = harness(&server);

        let full = h
            .orchestrator
            .sync(request(ObjectType::Deals, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(full.status, RunStatus::Success);
        assert_eq!(
            h.mirror.deals.lock().unwrap()["d1"].contact_id.as_deref(),
            Some("c9")
        );

        h.clock.advance(Duration::minutes(30));
        let incremental = h
            .orchestrator
            .sync(request(ObjectType::Deals, SyncMode::Incremental))
            .await
            .unwrap();
        assert_eq!(incremental.mode, SyncMode::Incremental);
        assert_eq!(incremental.records_updated, 1);

        let deals = h.mirror.deals.lock().unwrap();
        let d1 = &deals["d1"];
        assert_eq!(d1.contact_id.as_deref(), Some("c9"));
        assert_eq!(d1.stage.as_deref(), Some("closedwon"));
        assert_eq!(d1.raw["associations"]["contacts"]["results"][0]["id"], "c9");
    }

    #[tokio::test]
    async fn begun_run_stays_running_until_finished() {
        let server = MockServer::start().await;
        mount_contacts(&server, vec![(None, vec![contact_json("k1")], None)]).await;
        let h = harness(&server);

        let started = h
            .orchestrator
            .begin(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap();
        assert_eq!(started.run.status, RunStatus::Running);
        assert!(started.watermark.is_none());
        assert!(h.mirror.contacts.lock().unwrap().is_empty());

        let err = h
            .orchestrator
            .begin(request(ObjectType::Contacts, SyncMode::Full))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::Conflict(_)), "got: {err:?}");

        let run_id = started.run.id;
        let finished = h.orchestrator.finish(started).await.unwrap();
        assert_eq!(finished.id, run_id);
        assert_eq!(finished.status, RunStatus::Success);
        assert_eq!(finished.records_inserted, 1);
    }

    #[tokio::test]
    async fn incremental_without_history_falls_back_to_full() {
        let server = MockServer::start().await;
        mount_contacts(&server, vec![(None, vec![contact_json("k1")], None)]).await;
        let h = harness(&server);

        let run = h
            .orchestrator
            .sync(request(ObjectType::Contacts, SyncMode::Incremental))
            .await
            .unwrap();
        assert_eq!(run.mode, SyncMode::Full);
    }

    #[tokio::test]
    async fn upstream_exhaustion_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/calls"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let h = harness(&server);

        let err = h
            .orchestrator
            .sync(request(ObjectType::Calls, SyncMode::Full))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::Upstream(_)));

        let runs = h.runs.all();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error_message.as_deref().unwrap().contains("max retries"));
        assert!(h.runs.last_successful(ObjectType::Calls).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn owner_refresh_keeps_local_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/owners"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "o1", "firstName": "Jon", "lastName": "Smith" }]
            })))
            .mount(&server)
            .await;
        let h = harness(&server);

        h.orchestrator
            .sync(request(ObjectType::Owners, SyncMode::Incremental))
            .await
            .unwrap();
        h.owners
            .set_display_name_override("o1", Some("Jonathan Smith"))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(1));
        let run = h
            .orchestrator
            .sync(request(ObjectType::Owners, SyncMode::Incremental))
            .await
            .unwrap();
        assert_eq!(run.mode, SyncMode::Full);
        assert_eq!(run.records_updated, 1);

        let owner = h.owners.get("o1").await.unwrap().unwrap();
        assert_eq!(owner.display_name(), "Jonathan Smith");
        assert_eq!(owner.upstream_name.as_deref(), Some("Jon Smith"));
    }
}
