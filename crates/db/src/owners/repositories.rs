use async_trait::async_trait;

use crate::mirror::models::UpsertOutcome;
use crate::owners::models::{Owner, OwnerRecord};
use crmirror_common::error::CrmirrorResult;

#[async_trait]
pub trait OwnerRepository: Send + Sync {
    /// Merge an upstream owner. Writes name and email only; a local override is kept.
    async fn upsert_from_upstream(&self, owner: &OwnerRecord) -> CrmirrorResult<UpsertOutcome>;

    /// Set (`Some`) or clear (`None`) the local display-name override.
    /// Fails with `NotFound` for an unknown owner.
    async fn set_display_name_override(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> CrmirrorResult<Owner>;

    async fn get(&self, external_id: &str) -> CrmirrorResult<Option<Owner>>;
    async fn list(&self) -> CrmirrorResult<Vec<Owner>>;
}
