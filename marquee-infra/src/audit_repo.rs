use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_domain::audit::AuditLog;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::booking_repo::StoreError;

#[derive(Debug, Default, Clone)]
pub struct AdminAuditFilter {
    pub kind: Option<String>,
    pub showtime_id: Option<String>,
    pub user_id: Option<String>,
    pub booking_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub skip: i64,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, entry: &AuditLog) -> Result<(), StoreError>;

    async fn find_admin(
        &self,
        filter: &AdminAuditFilter,
    ) -> Result<(Vec<AuditLog>, i64), StoreError>;
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    kind: String,
    showtime_id: Option<String>,
    booking_id: Option<String>,
    user_id: Option<String>,
    seat_ids: Vec<String>,
    request_id: Option<String>,
    payload: serde_json::Value,
    at: DateTime<Utc>,
}

impl From<AuditRow> for AuditLog {
    fn from(row: AuditRow) -> Self {
        AuditLog {
            id: row.id,
            kind: row.kind,
            showtime_id: row.showtime_id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            seat_ids: row.seat_ids,
            request_id: row.request_id,
            payload: row.payload,
            at: row.at,
        }
    }
}

const AUDIT_COLUMNS: &str =
    "id, kind, showtime_id, booking_id, user_id, seat_ids, request_id, payload, at";

#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_audit_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &AdminAuditFilter) {
    if let Some(kind) = &f.kind {
        qb.push(" AND kind = ").push_bind(kind.clone());
    }
    if let Some(showtime_id) = &f.showtime_id {
        qb.push(" AND showtime_id = ").push_bind(showtime_id.clone());
    }
    if let Some(user_id) = &f.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(booking_id) = &f.booking_id {
        qb.push(" AND booking_id = ").push_bind(booking_id.clone());
    }
    if let Some(from) = f.from {
        qb.push(" AND at >= ").push_bind(from);
    }
    if let Some(to) = f.to {
        qb.push(" AND at <= ").push_bind(to);
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn insert(&self, entry: &AuditLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO audit_logs \
             (id, kind, showtime_id, booking_id, user_id, seat_ids, request_id, payload, at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.id)
        .bind(&entry.kind)
        .bind(&entry.showtime_id)
        .bind(&entry.booking_id)
        .bind(&entry.user_id)
        .bind(&entry.seat_ids)
        .bind(&entry.request_id)
        .bind(&entry.payload)
        .bind(entry.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_admin(
        &self,
        filter: &AdminAuditFilter,
    ) -> Result<(Vec<AuditLog>, i64), StoreError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE 1=1");
        push_audit_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let limit = if filter.limit <= 0 || filter.limit > 200 {
            50
        } else {
            filter.limit
        };
        let skip = filter.skip.max(0);

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE 1=1"));
        push_audit_filters(&mut qb, filter);
        qb.push(" ORDER BY at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let rows: Vec<AuditRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok((rows.into_iter().map(AuditLog::from).collect(), total))
    }
}
