use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::db_err;
use crate::matches::pg_repository::{map_match_row, MATCH_COLUMNS};
use crate::metrics::models::{CallFact, ContactFact, DealFact, MetricsDataset, MetricsScope};
use crate::metrics::repositories::MetricsRepository;
use crate::owners::pg_repository::map_owner_row;
use crate::sync::pg_repository::{PgSyncRunRepository, RUN_COLUMNS};
use crmirror_common::error::CrmirrorResult;

#[derive(Clone)]
pub struct PgMetricsRepository {
    pool: PgPool,
}

impl PgMetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Half-open time window on `col`, bound to `$1` (from) and `$2` (until).
fn window(col: &str) -> String {
    format!("($1::timestamptz is null or {col} >= $1) and ($2::timestamptz is null or {col} < $2)")
}

async fn load_contacts(
    tx: &mut Transaction<'_, Postgres>,
    scope: &MetricsScope,
) -> CrmirrorResult<Vec<ContactFact>> {
    let rows = sqlx::query(&format!(
        "select external_id, owner_id, lifecycle_stage, created_at_crm
         from crm_contacts where {}",
        window("created_at_crm")
    ))
    .bind(scope.from)
    .bind(scope.until)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_err)?;

    Ok(rows
        .iter()
        .map(|r| ContactFact {
            external_id: r.get("external_id"),
            owner_id: r.get("owner_id"),
            lifecycle_stage: r.get("lifecycle_stage"),
            created_at: r.get("created_at_crm"),
        })
        .collect())
}

async fn load_deals(
    tx: &mut Transaction<'_, Postgres>,
    scope: &MetricsScope,
) -> CrmirrorResult<Vec<DealFact>> {
    let rows = sqlx::query(&format!(
        "select external_id, owner_id, contact_id, stage, amount, created_at_crm
         from crm_deals where {}",
        window("created_at_crm")
    ))
    .bind(scope.from)
    .bind(scope.until)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_err)?;

    Ok(rows
        .iter()
        .map(|r| DealFact {
            external_id: r.get("external_id"),
            owner_id: r.get("owner_id"),
            contact_id: r.get("contact_id"),
            stage: r.get("stage"),
            amount: r.get("amount"),
            created_at: r.get("created_at_crm"),
        })
        .collect())
}

async fn load_calls(
    tx: &mut Transaction<'_, Postgres>,
    scope: &MetricsScope,
) -> CrmirrorResult<Vec<CallFact>> {
    let rows = sqlx::query(&format!(
        "select external_id, owner_id, call_timestamp from crm_calls where {}",
        window("call_timestamp")
    ))
    .bind(scope.from)
    .bind(scope.until)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_err)?;

    Ok(rows
        .iter()
        .map(|r| CallFact {
            external_id: r.get("external_id"),
            owner_id: r.get("owner_id"),
            call_timestamp: r.get("call_timestamp"),
        })
        .collect())
}

#[async_trait]
impl MetricsRepository for PgMetricsRepository {
    async fn load_dataset(&self, scope: &MetricsScope) -> CrmirrorResult<MetricsDataset> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("set transaction isolation level repeatable read, read only")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let contacts = load_contacts(&mut tx, scope).await?;
        let deals = load_deals(&mut tx, scope).await?;
        let calls = load_calls(&mut tx, scope).await?;

        let match_rows = sqlx::query(&format!(
            "select {MATCH_COLUMNS} from call_contact_matches
             where call_id in (select external_id from crm_calls where {})",
            window("call_timestamp")
        ))
        .bind(scope.from)
        .bind(scope.until)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let contact_owner_rows = sqlx::query(&format!(
            "select external_id, owner_id from crm_contacts
             where external_id in (select contact_id from crm_deals where {})",
            window("created_at_crm")
        ))
        .bind(scope.from)
        .bind(scope.until)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let owner_rows = sqlx::query(
            "select external_id, upstream_name, email, display_name_override, synced_at, updated_at
             from crm_owners order by external_id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let run_rows = sqlx::query(&format!(
            "select distinct on (object_type) {RUN_COLUMNS} from sync_runs
             where status in ('success', 'partial')
             order by object_type, started_at desc"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let deal_contact_owners: HashMap<String, Option<String>> = contact_owner_rows
            .iter()
            .map(|r| (r.get("external_id"), r.get("owner_id")))
            .collect();
        let last_successful = run_rows
            .iter()
            .map(PgSyncRunRepository::map_row)
            .collect::<CrmirrorResult<Vec<_>>>()?;

        tracing::debug!(
            contacts = contacts.len(),
            deals = deals.len(),
            calls = calls.len(),
            matches = match_rows.len(),
            "metrics dataset loaded"
        );

        Ok(MetricsDataset {
            scope: scope.clone(),
            contacts,
            deals,
            calls,
            matches: match_rows.iter().map(map_match_row).collect(),
            deal_contact_owners,
            owners: owner_rows.iter().map(map_owner_row).collect(),
            last_successful,
        })
    }

    async fn count_contacts(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        count_scoped(&self.pool, "crm_contacts", "created_at_crm", scope).await
    }

    async fn count_deals(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        count_scoped(&self.pool, "crm_deals", "created_at_crm", scope).await
    }

    async fn count_calls(&self, scope: &MetricsScope) -> CrmirrorResult<i64> {
        count_scoped(&self.pool, "crm_calls", "call_timestamp", scope).await
    }
}

async fn count_scoped(
    pool: &PgPool,
    table: &str,
    time_col: &str,
    scope: &MetricsScope,
) -> CrmirrorResult<i64> {
    sqlx::query_scalar(&format!(
        "select count(*) from {table}
         where {} and ($3::text is null or owner_id = $3)",
        window(time_col)
    ))
    .bind(scope.from)
    .bind(scope.until)
    .bind(scope.owner_id.as_deref())
    .fetch_one(pool)
    .await
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::models::ContactRecord;
    use crate::mirror::pg_repository::PgMirrorRepository;
    use crate::mirror::repositories::MirrorRepository;
    use crate::test_support::test_pool;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn contact(id: &str, owner: &str, created: chrono::DateTime<Utc>) -> ContactRecord {
        ContactRecord {
            external_id: id.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            phone: None,
            mobile_phone: None,
            owner_id: Some(owner.to_string()),
            lifecycle_stage: Some("lead".to_string()),
            created_at_crm: Some(created),
            updated_at_crm: None,
            raw: serde_json::json!({ "id": id }),
            batch_id: Uuid::new_v4(),
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dataset_and_raw_count_agree_under_owner_and_dates() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let mirror = PgMirrorRepository::new(pool.clone());
        let repo = PgMetricsRepository::new(pool);

        // unique owner id keeps the assertion independent of other rows
        let owner = format!("owner-{}", Uuid::new_v4());
        let inside = Utc.with_ymd_and_hms(1999, 6, 10, 12, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(1999, 7, 2, 12, 0, 0).unwrap();
        for (n, created) in [(1, inside), (2, inside), (3, outside)] {
            let id = format!("{owner}-c{n}");
            mirror
                .upsert_contact(&contact(&id, &owner, created))
                .await
                .expect("upsert");
        }

        let scope = MetricsScope::from_dates(
            Some(owner.clone()),
            NaiveDate::from_ymd_opt(1999, 6, 1),
            NaiveDate::from_ymd_opt(1999, 6, 30),
        );
        let dataset = repo.load_dataset(&scope).await.expect("dataset");
        let in_dataset = dataset
            .contacts
            .iter()
            .filter(|c| scope.admits(c.owner_id.as_deref(), c.created_at))
            .count() as i64;

        assert_eq!(in_dataset, 2);
        assert_eq!(repo.count_contacts(&scope).await.expect("count"), in_dataset);
    }
}
