use std::sync::Arc;

use crmirror_common::clock::Clock;
use crmirror_common::error::CrmirrorResult;
use crmirror_db::matches::repositories::MatchRepository;
use crmirror_db::mirror::repositories::MirrorRepository;
use crmirror_matching::{resolve, MatchingConfig, ResolutionStats};
use tokio::sync::Mutex;

/// Rebuilds the call-to-contact match table from the current mirror.
///
/// Rebuilds are serialized in-process here and across processes by the match store.
pub struct ResolutionJob {
    mirror: Arc<dyn MirrorRepository>,
    matches: Arc<dyn MatchRepository>,
    config: MatchingConfig,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl ResolutionJob {
    pub fn new(
        mirror: Arc<dyn MirrorRepository>,
        matches: Arc<dyn MatchRepository>,
        config: MatchingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mirror,
            matches,
            config,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub async fn rebuild(&self) -> CrmirrorResult<ResolutionStats> {
        let _guard = self.lock.lock().await;

        let contacts = self.mirror.list_contact_phones().await?;
        let calls = self.mirror.list_call_numbers().await?;
        let rebuilt_at = self.clock.now();

        let resolution = resolve(&self.config, &contacts, &calls, rebuilt_at);
        let written = self
            .matches
            .replace_all(&resolution.matches, rebuilt_at)
            .await?;

        let stats = resolution.stats;
        tracing::info!(
            written,
            contacts_indexed = stats.contacts_indexed,
            contacts_without_phone = stats.contacts_without_phone,
            calls_considered = stats.calls_considered,
            calls_without_phone = stats.calls_without_phone,
            matched = stats.matched,
            unmatched = stats.unmatched,
            ambiguous = stats.ambiguous,
            "match table rebuilt"
        );
        Ok(stats)
    }
}
