use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_domain::booking::{Booking, BookingStatus};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Default, Clone)]
pub struct AdminBookingFilter {
    pub showtime_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub skip: i64,
}

/// Narrow store seam so the orchestrator can be tested against a fake.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_pending(&self, booking: &Booking) -> Result<(), StoreError>;

    /// PENDING -> BOOKED; refuses any other transition.
    async fn mark_booked(
        &self,
        id: Uuid,
        payment_ref: &str,
        booked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// PENDING -> FAILED; a no-op when the record already finalized.
    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError>;

    async fn find_admin(
        &self,
        filter: &AdminBookingFilter,
    ) -> Result<(Vec<Booking>, i64), StoreError>;
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    showtime_id: String,
    user_id: Uuid,
    seat_ids: Vec<String>,
    amount: i64,
    currency: String,
    status: String,
    request_id: String,
    payment_ref: Option<String>,
    booked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = BookingStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown booking status: {}", self.status)))?;
        Ok(Booking {
            id: self.id,
            showtime_id: self.showtime_id,
            user_id: self.user_id,
            seat_ids: self.seat_ids,
            amount: self.amount,
            currency: self.currency,
            status,
            request_id: self.request_id,
            payment_ref: self.payment_ref,
            booked_at: self.booked_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, showtime_id, user_id, seat_ids, amount, currency, status, \
                               request_id, payment_ref, booked_at, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_booking_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &AdminBookingFilter) {
    if let Some(showtime_id) = &f.showtime_id {
        qb.push(" AND showtime_id = ").push_bind(showtime_id.clone());
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(user_id) = f.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(from) = f.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = f.to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn create_pending(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bookings \
             (id, showtime_id, user_id, seat_ids, amount, currency, status, request_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id)
        .bind(&booking.showtime_id)
        .bind(booking.user_id)
        .bind(&booking.seat_ids)
        .bind(booking.amount)
        .bind(&booking.currency)
        .bind(BookingStatus::Pending.as_str())
        .bind(&booking.request_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_booked(
        &self,
        id: Uuid,
        payment_ref: &str,
        booked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, payment_ref = $3, booked_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = $5",
        )
        .bind(id)
        .bind(BookingStatus::Booked.as_str())
        .bind(payment_ref)
        .bind(booked_at)
        .bind(BookingStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("booking {id} is not PENDING")));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(BookingStatus::Failed.as_str())
        .bind(Utc::now())
        .bind(BookingStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_admin(
        &self,
        filter: &AdminBookingFilter,
    ) -> Result<(Vec<Booking>, i64), StoreError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM bookings WHERE 1=1");
        push_booking_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let limit = if filter.limit <= 0 || filter.limit > 100 {
            20
        } else {
            filter.limit
        };
        let skip = filter.skip.max(0);

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1=1"));
        push_booking_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(BookingRow::into_booking)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }
}
