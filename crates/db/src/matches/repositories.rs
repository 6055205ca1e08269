use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::matches::models::CallContactMatch;
use crmirror_common::error::CrmirrorResult;

#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Replace the whole match table atomically. Readers see either the old or the new set.
    async fn replace_all(
        &self,
        matches: &[CallContactMatch],
        rebuilt_at: DateTime<Utc>,
    ) -> CrmirrorResult<u64>;

    async fn list_all(&self) -> CrmirrorResult<Vec<CallContactMatch>>;
    async fn count(&self) -> CrmirrorResult<i64>;
    async fn last_rebuilt_at(&self) -> CrmirrorResult<Option<DateTime<Utc>>>;
}
