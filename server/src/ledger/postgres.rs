use crate::ledger::LedgerStore;
use ::agora_protocol::model::ledger::{
    LedgerFilter, LedgerKey, LedgerKind, LedgerRow, VoteDirection,
};
use ::anyhow::Context;

pub struct PostgresLedgerStore {
    pool: ::sqlx::PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: ::sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(::sqlx::FromRow)]
struct LedgerRowSql {
    actor: String,
    subject: String,
    kind: String,
    vote: Option<i16>,
    active: bool,
    created_on: i64,
    updated_on: i64,
}

fn from_millis(value: i64) -> ::anyhow::Result<::chrono::DateTime<::chrono::Utc>> {
    ::chrono::DateTime::from_timestamp_millis(value)
        .ok_or_else(|| ::anyhow::anyhow!("invalid timestamp {}", value))
}

impl TryFrom<LedgerRowSql> for LedgerRow {
    type Error = ::anyhow::Error;

    fn try_from(row: LedgerRowSql) -> ::anyhow::Result<LedgerRow> {
        Ok(LedgerRow {
            kind: LedgerKind::from_str(&row.kind)?,
            actor: row.actor,
            subject: row.subject,
            vote: row.vote.and_then(VoteDirection::from_i16),
            active: row.active,
            created_on: from_millis(row.created_on)?,
            updated_on: from_millis(row.updated_on)?,
        })
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn upsert(&self, row: &LedgerRow) -> ::anyhow::Result<()> {
        let query = "
            INSERT INTO ledger (
                actor,
                subject,
                kind,
                vote,
                active,
                created_on,
                updated_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (actor, subject, kind)
            DO UPDATE SET
                vote = EXCLUDED.vote,
                active = EXCLUDED.active,
                updated_on = EXCLUDED.updated_on;
        ";

        ::sqlx::query(query)
            .bind(&row.actor)
            .bind(&row.subject)
            .bind(row.kind.as_str())
            .bind(row.vote.map(|x| x.as_i16()))
            .bind(row.active)
            .bind(row.created_on.timestamp_millis())
            .bind(row.updated_on.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("upsert ledger row")?;

        Ok(())
    }

    async fn query(
        &self,
        filter: &LedgerFilter,
        limit: Option<usize>,
    ) -> ::anyhow::Result<Vec<LedgerRow>> {
        let query = "
            SELECT
                actor,
                subject,
                kind,
                vote,
                active,
                created_on,
                updated_on
            FROM
                ledger
            WHERE
                kind = $1
            AND
                ($2::TEXT IS NULL OR actor = $2)
            AND
                ($3::TEXT IS NULL OR subject = $3)
            AND
                ($4::BOOL IS NULL OR active = $4)
            ORDER BY
                updated_on DESC, actor, subject
            LIMIT $5;
        ";

        let limit = limit.map(|x| i64::try_from(x).unwrap_or(i64::MAX));

        let rows = ::sqlx::query_as::<_, LedgerRowSql>(query)
            .bind(filter.kind.as_str())
            .bind(filter.actor.as_deref())
            .bind(filter.subject.as_deref())
            .bind(filter.active)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("query ledger rows")?;

        rows.into_iter().map(LedgerRow::try_from).collect()
    }

    async fn delete(&self, key: &LedgerKey) -> ::anyhow::Result<()> {
        let query = "
            DELETE FROM ledger
            WHERE actor = $1 AND subject = $2 AND kind = $3;
        ";

        ::sqlx::query(query)
            .bind(&key.actor)
            .bind(&key.subject)
            .bind(key.kind.as_str())
            .execute(&self.pool)
            .await
            .context("delete ledger row")?;

        Ok(())
    }
}
