use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::db_err;
use crate::mirror::models::{
    CallDirection, CallNumbers, CallRecord, ContactPhones, ContactRecord, DealRecord,
    UpsertOutcome,
};
use crate::mirror::repositories::MirrorRepository;
use crate::sync::models::ObjectType;
use crmirror_common::error::{CrmirrorError, CrmirrorResult};

#[derive(Clone)]
pub struct PgMirrorRepository {
    pool: PgPool,
}

impl PgMirrorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// `xmax = 0` holds only for a freshly inserted tuple, which tells inserts from updates.
fn outcome(row: &sqlx::postgres::PgRow) -> UpsertOutcome {
    if row.get::<bool, _>("inserted") {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    }
}

#[async_trait]
impl MirrorRepository for PgMirrorRepository {
    async fn upsert_contact(&self, c: &ContactRecord) -> CrmirrorResult<UpsertOutcome> {
        let row = sqlx::query(
            "insert into crm_contacts
             (external_id, email, first_name, last_name, phone, mobile_phone, owner_id,
              lifecycle_stage, created_at_crm, updated_at_crm, raw, batch_id, synced_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             on conflict (external_id) do update set
               email = excluded.email,
               first_name = excluded.first_name,
               last_name = excluded.last_name,
               phone = excluded.phone,
               mobile_phone = excluded.mobile_phone,
               owner_id = excluded.owner_id,
               lifecycle_stage = excluded.lifecycle_stage,
               created_at_crm = excluded.created_at_crm,
               updated_at_crm = excluded.updated_at_crm,
               raw = excluded.raw,
               batch_id = excluded.batch_id,
               synced_at = excluded.synced_at,
               updated_at = now()
             returning (xmax = 0) as inserted",
        )
        .bind(&c.external_id)
        .bind(&c.email)
        .bind(&c.first_name)
        .bind(&c.last_name)
        .bind(&c.phone)
        .bind(&c.mobile_phone)
        .bind(&c.owner_id)
        .bind(&c.lifecycle_stage)
        .bind(c.created_at_crm)
        .bind(c.updated_at_crm)
        .bind(&c.raw)
        .bind(c.batch_id)
        .bind(c.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(&row))
    }

    /// Search pages carry no associations, so a payload without a contact link keeps the
    /// stored link and the stored `associations` block.
    async fn upsert_deal(&self, d: &DealRecord) -> CrmirrorResult<UpsertOutcome> {
        let row = sqlx::query(
            "insert into crm_deals
             (external_id, name, stage, pipeline, amount, owner_id, contact_id,
              created_at_crm, closed_at, updated_at_crm, raw, batch_id, synced_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             on conflict (external_id) do update set
               name = excluded.name,
               stage = excluded.stage,
               pipeline = excluded.pipeline,
               amount = excluded.amount,
               owner_id = excluded.owner_id,
               contact_id = coalesce(excluded.contact_id, crm_deals.contact_id),
               created_at_crm = excluded.created_at_crm,
               closed_at = excluded.closed_at,
               updated_at_crm = excluded.updated_at_crm,
               raw = case
                 when excluded.raw ? 'associations' or not (crm_deals.raw ? 'associations')
                   then excluded.raw
                 else jsonb_set(excluded.raw, '{associations}', crm_deals.raw -> 'associations')
               end,
               batch_id = excluded.batch_id,
               synced_at = excluded.synced_at,
               updated_at = now()
             returning (xmax = 0) as inserted",
        )
        .bind(&d.external_id)
        .bind(&d.name)
        .bind(&d.stage)
        .bind(&d.pipeline)
        .bind(d.amount)
        .bind(&d.owner_id)
        .bind(&d.contact_id)
        .bind(d.created_at_crm)
        .bind(d.closed_at)
        .bind(d.updated_at_crm)
        .bind(&d.raw)
        .bind(d.batch_id)
        .bind(d.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(&row))
    }

    async fn upsert_call(&self, c: &CallRecord) -> CrmirrorResult<UpsertOutcome> {
        let row = sqlx::query(
            "insert into crm_calls
             (external_id, direction, from_number, to_number, duration_ms, disposition,
              owner_id, call_timestamp, updated_at_crm, raw, batch_id, synced_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             on conflict (external_id) do update set
               direction = excluded.direction,
               from_number = excluded.from_number,
               to_number = excluded.to_number,
               duration_ms = excluded.duration_ms,
               disposition = excluded.disposition,
               owner_id = excluded.owner_id,
               call_timestamp = excluded.call_timestamp,
               updated_at_crm = excluded.updated_at_crm,
               raw = excluded.raw,
               batch_id = excluded.batch_id,
               synced_at = excluded.synced_at,
               updated_at = now()
             returning (xmax = 0) as inserted",
        )
        .bind(&c.external_id)
        .bind(c.direction.as_str())
        .bind(&c.from_number)
        .bind(&c.to_number)
        .bind(c.duration_ms)
        .bind(&c.disposition)
        .bind(&c.owner_id)
        .bind(c.call_timestamp)
        .bind(c.updated_at_crm)
        .bind(&c.raw)
        .bind(c.batch_id)
        .bind(c.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(&row))
    }

    async fn list_contact_phones(&self) -> CrmirrorResult<Vec<ContactPhones>> {
        let rows = sqlx::query(
            "select external_id, phone, mobile_phone, owner_id,
                    coalesce(updated_at_crm, synced_at) as last_updated
             from crm_contacts
             where phone is not null or mobile_phone is not null",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|r| ContactPhones {
                external_id: r.get("external_id"),
                phone: r.get("phone"),
                mobile_phone: r.get("mobile_phone"),
                owner_id: r.get("owner_id"),
                last_updated: r.get::<DateTime<Utc>, _>("last_updated"),
            })
            .collect())
    }

    async fn list_call_numbers(&self) -> CrmirrorResult<Vec<CallNumbers>> {
        let rows = sqlx::query(
            "select external_id, direction, from_number, to_number, call_timestamp
             from crm_calls",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|r| {
                let direction: String = r.get("direction");
                Ok(CallNumbers {
                    external_id: r.get("external_id"),
                    direction: direction
                        .parse::<CallDirection>()
                        .map_err(CrmirrorError::Internal)?,
                    from_number: r.get("from_number"),
                    to_number: r.get("to_number"),
                    call_timestamp: r.get("call_timestamp"),
                })
            })
            .collect()
    }

    async fn count(&self, object_type: ObjectType) -> CrmirrorResult<i64> {
        let table = match object_type {
            ObjectType::Contacts => "crm_contacts",
            ObjectType::Deals => "crm_deals",
            ObjectType::Calls => "crm_calls",
            ObjectType::Owners => "crm_owners",
        };
        let row = sqlx::query(&format!("select count(*) as cnt from {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("cnt"))
    }
}
