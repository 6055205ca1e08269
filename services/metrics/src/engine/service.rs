use std::sync::Arc;
use std::time::Duration;

use crmirror_common::clock::Clock;
use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_db::metrics::models::MetricsDataset;
use crmirror_db::metrics::repositories::MetricsRepository;
use tokio::time::{timeout_at, Instant};

use super::compute::{self, ScopedView};
use super::models::{
    CallToCloseReport, ConversionReport, FunnelReport, LastSync, MetricsQuery, SummaryReport,
    TimelineReport,
};
use super::timeline;

/// Read-only report engine. Each call loads one snapshot and computes purely over it.
#[derive(Clone)]
pub struct MetricsEngine {
    repo: Arc<dyn MetricsRepository>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl MetricsEngine {
    pub fn new(repo: Arc<dyn MetricsRepository>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            repo,
            clock,
            timeout,
        }
    }

    fn timed_out(&self, query: &MetricsQuery, stage: &'static str) -> CrmirrorError {
        let budget_ms = self.timeout.as_millis() as u64;
        tracing::warn!(budget_ms, stage, ?query, "aggregation timed out");
        CrmirrorError::AggregationTimeout(budget_ms)
    }

    /// Validate, then load and compute under one deadline.
    ///
    /// Past the deadline the call fails with `AggregationTimeout` and yields nothing. The
    /// computation runs on the blocking pool so it never stalls the async workers; a report
    /// that overruns is abandoned and its result dropped.
    async fn evaluate<T, F>(&self, query: &MetricsQuery, report: F) -> CrmirrorResult<T>
    where
        F: FnOnce(&MetricsDataset) -> T + Send + 'static,
        T: Send + 'static,
    {
        query.validate()?;
        let scope = query.scope();
        let deadline = Instant::now() + self.timeout;

        let dataset = timeout_at(deadline, self.repo.load_dataset(&scope))
            .await
            .map_err(|_| self.timed_out(query, "load"))??;

        if let Some(owner_id) = query.owner_id.as_deref() {
            if !dataset.owners.iter().any(|o| o.external_id == owner_id) {
                return Err(CrmirrorError::NotFound(format!("owner {owner_id}")));
            }
        }

        let task = tokio::task::spawn_blocking(move || report(&dataset));
        timeout_at(deadline, task)
            .await
            .map_err(|_| self.timed_out(query, "compute"))?
            .map_err(|e| CrmirrorError::Internal(format!("report computation failed: {e}")))
    }

    pub async fn funnel(&self, query: &MetricsQuery) -> CrmirrorResult<FunnelReport> {
        self.evaluate(query, |ds| compute::funnel(&ScopedView::new(ds)))
            .await
    }

    pub async fn conversion(&self, query: &MetricsQuery) -> CrmirrorResult<ConversionReport> {
        self.evaluate(query, |ds| compute::conversion(&ScopedView::new(ds)))
            .await
    }

    pub async fn call_to_close(&self, query: &MetricsQuery) -> CrmirrorResult<CallToCloseReport> {
        self.evaluate(query, |ds| compute::call_to_close(ds, &ScopedView::new(ds)))
            .await
    }

    pub async fn timeline(&self, query: &MetricsQuery) -> CrmirrorResult<TimelineReport> {
        let (from, to) = query.require_range()?;
        self.evaluate(query, move |ds| {
            timeline::timeline(&ScopedView::new(ds), from, to)
        })
        .await
    }

    pub async fn summary(&self, query: &MetricsQuery) -> CrmirrorResult<SummaryReport> {
        let generated_at = self.clock.now();
        let filter = query.clone();
        self.evaluate(query, move |ds| {
            let view = ScopedView::new(ds);
            let (attribution_policy, _) = compute::attribution_policy(ds);
            SummaryReport {
                generated_at,
                filter,
                funnel: compute::funnel(&view),
                conversion: compute::conversion(&view),
                calls: compute::call_totals(ds, &view),
                attribution_policy,
                last_synced: ds
                    .last_successful
                    .iter()
                    .map(|run| LastSync {
                        object_type: run.object_type,
                        status: run.status,
                        started_at: run.started_at,
                        completed_at: run.completed_at,
                    })
                    .collect(),
            }
        })
        .await
    }
}
