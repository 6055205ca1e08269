//! In-memory repositories for engine, resolution and API tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmirror_common::error::CrmirrorResult;
use crmirror_db::matches::models::CallContactMatch;
use crmirror_db::matches::repositories::MatchRepository;
use crmirror_db::metrics::models::{MetricsDataset, MetricsScope};
use crmirror_db::metrics::repositories::MetricsRepository;

/// What the store returns for `scope`: time window applied, owner left to the engine.
pub fn snapshot(dataset: &MetricsDataset, scope: &MetricsScope) -> MetricsDataset {
    let window = scope.without_owner();
    let mut out = dataset.clone();
    out.contacts.retain(|c| window.admits_time(c.created_at));
    out.deals.retain(|d| window.admits_time(d.created_at));
    out.calls.retain(|c| window.admits_time(c.call_timestamp));
    let kept: Vec<&str> = out.calls.iter().map(|c| c.external_id.as_str()).collect();
    let matches = out
        .matches
        .iter()
        .filter(|m| kept.contains(&m.call_id.as_str()))
        .cloned()
        .collect();
    out.matches = matches;
    out.scope = scope.clone();
    out
}

/// Serves one fixed dataset, optionally after a delay.
#[derive(Clone, Default)]
pub struct MemoryMetrics {
    pub dataset: MetricsDataset,
    pub delay: Option<Duration>,
}

impl MemoryMetrics {
    pub fn new(dataset: MetricsDataset) -> Self {
        Self {
            dataset,
            delay: None,
        }
    }

    pub fn slow(dataset: MetricsDataset, delay: Duration) -> Self {
        Self {
            dataset,
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl MetricsRepository for MemoryMetrics {
    async fn load_dataset(&self, scope: &MetricsScope) -> CrmirrorResult<MetricsDataset> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot(&self.dataset, scope))
    }

    async fn count_contacts(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        Ok(self
            .dataset
            .contacts
            .iter()
            .filter(|c| scope.admits(c.owner_id.as_deref(), c.created_at))
            .count() as i64)
    }

    async fn count_deals(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        Ok(self
            .dataset
            .deals
            .iter()
            .filter(|d| scope.admits(d.owner_id.as_deref(), d.created_at))
            .count() as i64)
    }

    async fn count_calls(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        Ok(self
            .dataset
            .calls
            .iter()
            .filter(|c| scope.admits(c.owner_id.as_deref(), c.call_timestamp))
            .count() as i64)
    }
}

#[derive(Clone, Default)]
pub struct MemoryMatches {
    pub rows: Arc<Mutex<Vec<CallContactMatch>>>,
    pub rebuilt_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

#[async_trait]
impl MatchRepository for MemoryMatches {
    async fn replace_all(
        &self,
        matches: &[CallContactMatch],
        rebuilt_at: DateTime<Utc>,
    ) -> CrmirrorResult<u64> {
        *self.rows.lock().unwrap() = matches.to_vec();
        *self.rebuilt_at.lock().unwrap() = Some(rebuilt_at);
        Ok(matches.len() as u64)
    }

    async fn list_all(&self) -> CrmirrorResult<Vec<CallContactMatch>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn count(&self) -> CrmirrorResult<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn last_rebuilt_at(&self) -> CrmirrorResult<Option<DateTime<Utc>>> {
        Ok(*self.rebuilt_at.lock().unwrap())
    }
}
