use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db_err;
use crate::mirror::models::UpsertOutcome;
use crate::owners::models::{Owner, OwnerRecord};
use crate::owners::repositories::OwnerRepository;
use crmirror_common::error::{CrmirrorError, CrmirrorResult};

const OWNER_COLUMNS: &str =
    "external_id, upstream_name, email, display_name_override, synced_at, updated_at";

#[derive(Clone)]
pub struct PgOwnerRepository {
    pool: PgPool,
}

impl PgOwnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_owner_row(row: &sqlx::postgres::PgRow) -> Owner {
    Owner {
        external_id: row.get("external_id"),
        upstream_name: row.get("upstream_name"),
        email: row.get("email"),
        display_name_override: row.get("display_name_override"),
        synced_at: row.get("synced_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl OwnerRepository for PgOwnerRepository {
    async fn upsert_from_upstream(&self, owner: &OwnerRecord) -> CrmirrorResult<UpsertOutcome> {
        let row = sqlx::query(
            "insert into crm_owners (external_id, upstream_name, email, raw, synced_at)
             values ($1, $2, $3, $4, $5)
             on conflict (external_id) do update set
               upstream_name = excluded.upstream_name,
               email = excluded.email,
               raw = excluded.raw,
               synced_at = excluded.synced_at,
               updated_at = now()
             returning (xmax = 0) as inserted",
        )
        .bind(&owner.external_id)
        .bind(&owner.name)
        .bind(&owner.email)
        .bind(&owner.raw)
        .bind(owner.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        if row.get::<bool, _>("inserted") {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn set_display_name_override(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> CrmirrorResult<Owner> {
        let row = sqlx::query(&format!(
            "update crm_owners
             set display_name_override = $1, updated_at = now()
             where external_id = $2
             returning {OWNER_COLUMNS}"
        ))
        .bind(display_name)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref()
            .map(map_owner_row)
            .ok_or_else(|| CrmirrorError::NotFound(format!("owner {external_id}")))
    }

    async fn get(&self, external_id: &str) -> CrmirrorResult<Option<Owner>> {
        let row = sqlx::query(&format!(
            "select {OWNER_COLUMNS} from crm_owners where external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.as_ref().map(map_owner_row))
    }

    async fn list(&self) -> CrmirrorResult<Vec<Owner>> {
        let rows = sqlx::query(&format!(
            "select {OWNER_COLUMNS} from crm_owners
             order by coalesce(display_name_override, upstream_name, email, external_id)"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.iter().map(map_owner_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;
    use chrono::Utc;
    use uuid::Uuid;

    fn upstream(id: &str, name: &str) -> OwnerRecord {
        OwnerRecord {
            external_id: id.to_string(),
            name: Some(name.to_string()),
            email: Some("rep@example.com".to_string()),
            raw: serde_json::json!({ "id": id, "firstName": name }),
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn override_survives_refresh() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let repo = PgOwnerRepository::new(pool);
        let id = format!("owner-{}", Uuid::new_v4());

        repo.upsert_from_upstream(&upstream(&id, "Jon")).await.expect("insert");
        repo.set_display_name_override(&id, Some("Jonathan (EMEA)"))
            .await
            .expect("override");
        let outcome = repo
            .upsert_from_upstream(&upstream(&id, "Jon S."))
            .await
            .expect("refresh");
        assert_eq!(outcome, UpsertOutcome::Updated);

        let owner = repo.get(&id).await.expect("get").expect("present");
        assert_eq!(owner.upstream_name.as_deref(), Some("Jon S."));
        assert_eq!(owner.display_name(), "Jonathan (EMEA)");
    }

    #[tokio::test]
    async fn override_on_unknown_owner_is_not_found() {
        let pool = match test_pool().await {
            Some(p) => p,
            None => return,
        };
        let repo = PgOwnerRepository::new(pool);
        let err = repo
            .set_display_name_override("no-such-owner", Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrmirrorError::NotFound(_)));
    }
}
