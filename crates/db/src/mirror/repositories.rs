use async_trait::async_trait;

use crate::mirror::models::{
    CallNumbers, CallRecord, ContactPhones, ContactRecord, DealRecord, UpsertOutcome,
};
use crate::sync::models::ObjectType;
use crmirror_common::error::CrmirrorResult;

/// Per-object-type mirror tables keyed by the CRM's external id.
#[async_trait]
pub trait MirrorRepository: Send + Sync {
    async fn upsert_contact(&self, contact: &ContactRecord) -> CrmirrorResult<UpsertOutcome>;
    async fn upsert_deal(&self, deal: &DealRecord) -> CrmirrorResult<UpsertOutcome>;
    async fn upsert_call(&self, call: &CallRecord) -> CrmirrorResult<UpsertOutcome>;

    async fn list_contact_phones(&self) -> CrmirrorResult<Vec<ContactPhones>>;
    async fn list_call_numbers(&self) -> CrmirrorResult<Vec<CallNumbers>>;

    /// Row count for one mirror table.
    async fn count(&self, object_type: ObjectType) -> CrmirrorResult<i64>;
}
