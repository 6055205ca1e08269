use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::db_err;
use crate::matches::models::CallContactMatch;
use crate::matches::repositories::MatchRepository;
use crmirror_common::error::CrmirrorResult;

// Postgres caps bind parameters at 65535 per statement; 8 columns per row.
const INSERT_CHUNK: usize = 5_000;

// Advisory lock key shared by every process that rewrites the match table.
const REPLACE_LOCK_KEY: i64 = 0x6372_6d5f_6d61_7463;

#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_match_row(row: &sqlx::postgres::PgRow) -> CallContactMatch {
    CallContactMatch {
        call_id: row.get("call_id"),
        contact_id: row.get("contact_id"),
        owner_id: row.get("owner_id"),
        call_timestamp: row.get("call_timestamp"),
        normalized_phone: row.get("normalized_phone"),
        candidate_count: row.get("candidate_count"),
        ambiguous: row.get("ambiguous"),
        rebuilt_at: row.get("rebuilt_at"),
    }
}

pub(crate) const MATCH_COLUMNS: &str = "call_id, contact_id, owner_id, call_timestamp, \
     normalized_phone, candidate_count, ambiguous, rebuilt_at";

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn replace_all(
        &self,
        matches: &[CallContactMatch],
        rebuilt_at: DateTime<Utc>,
    ) -> CrmirrorResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Serializes rebuilds across the api and worker processes; released at commit.
        sqlx::query("select pg_advisory_xact_lock($1)")
            .bind(REPLACE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // not truncate: it would block concurrent report readers
        sqlx::query("delete from call_contact_matches")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let mut written = 0u64;
        for chunk in matches.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "insert into call_contact_matches \
                 (call_id, contact_id, owner_id, call_timestamp, normalized_phone, \
                  candidate_count, ambiguous, rebuilt_at) ",
            );
            qb.push_values(chunk, |mut b, m| {
                b.push_bind(&m.call_id)
                    .push_bind(&m.contact_id)
                    .push_bind(&m.owner_id)
                    .push_bind(m.call_timestamp)
                    .push_bind(&m.normalized_phone)
                    .push_bind(m.candidate_count)
                    .push_bind(m.ambiguous)
                    .push_bind(rebuilt_at);
            });
            let result = qb.build().execute(&mut *tx).await.map_err(db_err)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(db_err)?;
        tracing::info!(rows = written, "call-contact matches replaced");
        Ok(written)
    }

    async fn list_all(&self) -> CrmirrorResult<Vec<CallContactMatch>> {
        let rows = sqlx::query(&format!(
            "select {MATCH_COLUMNS} from call_contact_matches order by call_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(map_match_row).collect())
    }

    async fn count(&self) -> CrmirrorResult<i64> {
        sqlx::query_scalar("select count(*) from call_contact_matches")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn last_rebuilt_at(&self) -> CrmirrorResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar("select max(rebuilt_at) from call_contact_matches")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}
