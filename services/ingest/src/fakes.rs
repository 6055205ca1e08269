//! In-memory repositories for orchestrator tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_db::mirror::models::{
    CallNumbers, CallRecord, ContactPhones, ContactRecord, DealRecord, UpsertOutcome,
};
use crmirror_db::mirror::repositories::MirrorRepository;
use crmirror_db::owners::models::{Owner, OwnerRecord};
use crmirror_db::owners::repositories::OwnerRepository;
use crmirror_db::sync::models::{
    ObjectType, RunCounts, RunStatus, SyncMode, SyncRun, SyncRunFilter, TriggeredBy,
};
use crmirror_db::sync::repositories::SyncRunRepository;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryRuns {
    pub runs: Arc<Mutex<Vec<SyncRun>>>,
}

impl MemoryRuns {
    pub fn insert(&self, run: SyncRun) {
        self.runs.lock().unwrap().push(run);
    }

    pub fn all(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }

    fn finish(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        status: RunStatus,
        message: Option<&str>,
        at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| CrmirrorError::NotFound(format!("sync run {run_id}")))?;
        if run.status != RunStatus::Running {
            return Err(CrmirrorError::Conflict(format!(
                "sync run {run_id} is no longer running"
            )));
        }
        run.status = status;
        run.records_fetched = counts.fetched;
        run.records_inserted = counts.inserted;
        run.records_updated = counts.updated;
        run.records_failed = counts.failed;
        run.error_message = message.map(str::to_string);
        run.completed_at = Some(at);
        run.duration_ms = Some((at - run.started_at).num_milliseconds());
        Ok(run.clone())
    }
}

pub fn running_run(object_type: ObjectType, started_at: DateTime<Utc>) -> SyncRun {
    SyncRun {
        id: Uuid::new_v4(),
        batch_id: Uuid::new_v4(),
        object_type,
        mode: SyncMode::Full,
        status: RunStatus::Running,
        triggered_by: TriggeredBy::Cron,
        started_at,
        completed_at: None,
        duration_ms: None,
        records_fetched: 0,
        records_inserted: 0,
        records_updated: 0,
        records_failed: 0,
        error_message: None,
    }
}

#[async_trait]
impl SyncRunRepository for MemoryRuns {
    async fn start(
        &self,
        object_type: ObjectType,
        mode: SyncMode,
        triggered_by: TriggeredBy,
        started_at: DateTime<Utc>,
    ) -> CrmirrorResult<Option<SyncRun>> {
        let mut runs = self.runs.lock().unwrap();
        if runs
            .iter()
            .any(|r| r.object_type == object_type && r.status == RunStatus::Running)
        {
            return Ok(None);
        }
        let run = SyncRun {
            mode,
            triggered_by,
            ..running_run(object_type, started_at)
        };
        runs.push(run.clone());
        Ok(Some(run))
    }

    async fn complete(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        status: RunStatus,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        self.finish(run_id, counts, status, None, completed_at)
    }

    async fn error(
        &self,
        run_id: Uuid,
        counts: RunCounts,
        message: &str,
        completed_at: DateTime<Utc>,
    ) -> CrmirrorResult<SyncRun> {
        self.finish(run_id, counts, RunStatus::Failed, Some(message), completed_at)
    }

    async fn sweep_stale(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> CrmirrorResult<Vec<SyncRun>> {
        let mut runs = self.runs.lock().unwrap();
        let mut swept = Vec::new();
        for run in runs
            .iter_mut()
            .filter(|r| r.status == RunStatus::Running && r.started_at < cutoff)
        {
            run.status = RunStatus::Failed;
            run.error_message = Some(message.to_string());
            run.completed_at = Some(now);
            swept.push(run.clone());
        }
        Ok(swept)
    }

    async fn last_successful(&self, object_type: ObjectType) -> CrmirrorResult<Option<SyncRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.object_type == object_type
                    && matches!(r.status, RunStatus::Success | RunStatus::Partial)
            })
            .max_by_key(|r| r.started_at)
            .cloned())
    }

    async fn get(&self, run_id: Uuid) -> CrmirrorResult<Option<SyncRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == run_id)
            .cloned())
    }

    async fn list_recent(&self, filter: SyncRunFilter) -> CrmirrorResult<Vec<SyncRun>> {
        let mut runs: Vec<SyncRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.object_type.map_or(true, |t| r.object_type == t))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs
            .into_iter()
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }
}

/// Mirror keyed by external id. Ids listed in `reject` fail to store.
#[derive(Clone, Default)]
pub struct MemoryMirror {
    pub contacts: Arc<Mutex<HashMap<String, ContactRecord>>>,
    pub deals: Arc<Mutex<HashMap<String, DealRecord>>>,
    pub calls: Arc<Mutex<HashMap<String, CallRecord>>>,
    pub reject: Arc<Mutex<Vec<String>>>,
}

impl MemoryMirror {
    fn check(&self, id: &str) -> CrmirrorResult<()> {
        if self.reject.lock().unwrap().iter().any(|r| r == id) {
            return Err(CrmirrorError::Database(format!("write rejected for {id}")));
        }
        Ok(())
    }
}

fn put<T: Clone>(map: &Mutex<HashMap<String, T>>, id: &str, value: &T) -> UpsertOutcome {
    match map.lock().unwrap().insert(id.to_string(), value.clone()) {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    }
}

#[async_trait]
impl MirrorRepository for MemoryMirror {
    async fn upsert_contact(&self, contact: &ContactRecord) -> CrmirrorResult<UpsertOutcome> {
        self.check(&contact.external_id)?;
        Ok(put(&self.contacts, &contact.external_id, contact))
    }

    async fn upsert_deal(&self, deal: &DealRecord) -> CrmirrorResult<UpsertOutcome> {
        self.check(&deal.external_id)?;
        let mut deals = self.deals.lock().unwrap();
        let mut stored = deal.clone();
        // same rule as the Postgres upsert: a payload without a link keeps the stored one
        if let Some(previous) = deals.get(&deal.external_id) {
            if stored.contact_id.is_none() {
                stored.contact_id = previous.contact_id.clone();
            }
            if stored.raw.get("associations").is_none() {
                if let (Some(assoc), Some(obj)) =
                    (previous.raw.get("associations"), stored.raw.as_object_mut())
                {
                    obj.insert("associations".to_string(), assoc.clone());
                }
            }
        }
        match deals.insert(deal.external_id.clone(), stored) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Inserted),
        }
    }

    async fn upsert_call(&self, call: &CallRecord) -> CrmirrorResult<UpsertOutcome> {
        self.check(&call.external_id)?;
        Ok(put(&self.calls, &call.external_id, call))
    }

    async fn list_contact_phones(&self) -> CrmirrorResult<Vec<ContactPhones>> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .values()
            .map(|c| ContactPhones {
                external_id: c.external_id.clone(),
                phone: c.phone.clone(),
                mobile_phone: c.mobile_phone.clone(),
                owner_id: c.owner_id.clone(),
                last_updated: c.updated_at_crm.unwrap_or(c.synced_at),
            })
            .collect())
    }

    async fn list_call_numbers(&self) -> CrmirrorResult<Vec<CallNumbers>> {
        Ok(self
            .calls
            .lock()
            .unwrap()
            .values()
            .map(|c| CallNumbers {
                external_id: c.external_id.clone(),
                direction: c.direction,
                from_number: c.from_number.clone(),
                to_number: c.to_number.clone(),
                call_timestamp: c.call_timestamp,
            })
            .collect())
    }

    async fn count(&self, object_type: ObjectType) -> CrmirrorResult<i64> {
        let n = match object_type {
            ObjectType::Contacts => self.contacts.lock().unwrap().len(),
            ObjectType::Deals => self.deals.lock().unwrap().len(),
            ObjectType::Calls => self.calls.lock().unwrap().len(),
            ObjectType::Owners => 0,
        };
        Ok(n as i64)
    }
}

#[derive(Clone, Default)]
pub struct MemoryOwners {
    pub owners: Arc<Mutex<HashMap<String, Owner>>>,
}

#[async_trait]
impl OwnerRepository for MemoryOwners {
    async fn upsert_from_upstream(&self, owner: &OwnerRecord) -> CrmirrorResult<UpsertOutcome> {
        let mut owners = self.owners.lock().unwrap();
        match owners.get_mut(&owner.external_id) {
            Some(existing) => {
                existing.upstream_name = owner.name.clone();
                existing.email = owner.email.clone();
                existing.synced_at = owner.synced_at;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                owners.insert(
                    owner.external_id.clone(),
                    Owner {
                        external_id: owner.external_id.clone(),
                        upstream_name: owner.name.clone(),
                        email: owner.email.clone(),
                        display_name_override: None,
                        synced_at: owner.synced_at,
                        updated_at: owner.synced_at,
                    },
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn set_display_name_override(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> CrmirrorResult<Owner> {
        let mut owners = self.owners.lock().unwrap();
        let owner = owners
            .get_mut(external_id)
            .ok_or_else(|| CrmirrorError::NotFound(format!("owner {external_id}")))?;
        owner.display_name_override = display_name.map(str::to_string);
        Ok(owner.clone())
    }

    async fn get(&self, external_id: &str) -> CrmirrorResult<Option<Owner>> {
        Ok(self.owners.lock().unwrap().get(external_id).cloned())
    }

    async fn list(&self) -> CrmirrorResult<Vec<Owner>> {
        let mut owners: Vec<Owner> = self.owners.lock().unwrap().values().cloned().collect();
        owners.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(owners)
    }
}
