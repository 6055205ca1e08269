use async_trait::async_trait;

use crate::metrics::models::{MetricsDataset, MetricsScope};
use crmirror_common::error::CrmirrorResult;

#[async_trait]
pub trait MetricsRepository: Send + Sync {
    /// Load every input of an aggregation inside one read-only snapshot.
    async fn load_dataset(&self, scope: &MetricsScope) -> CrmirrorResult<MetricsDataset>;

    /// Independent counts under the full scope, owner included.
    async fn count_contacts(&self, scope: &MetricsScope) -> CrmirrorResult<i64>;
    async fn count_deals(&self, scope: &MetricsScope) -> CrmirrorResult<i64>;
    async fn count_calls(&self, scope: &MetricsScope) -> CrmirrorResult<i64>;
}
