use chrono::{DateTime, Utc};
use marquee_domain::user::{User, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking_repo::StoreError;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    google_id: String,
    email: String,
    name: String,
    picture: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| StoreError::Backend(format!("unknown user role: {}", self.role)))?;
        Ok(User {
            id: self.id,
            google_id: self.google_id,
            email: self.email,
            name: self.name,
            picture: self.picture,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, google_id, email, name, picture, role, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresUserRepo {
    pool: PgPool,
}

impl PostgresUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert keyed by google_id; profile fields refresh on every login,
    /// role only defaults on first insert.
    pub async fn upsert_google_user(
        &self,
        google_id: &str,
        email: &str,
        name: &str,
        picture: &str,
    ) -> Result<User, StoreError> {
        let now = Utc::now();
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, google_id, email, name, picture, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (google_id) DO UPDATE \
             SET email = EXCLUDED.email, name = EXCLUDED.name, picture = EXCLUDED.picture, updated_at = EXCLUDED.updated_at \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(google_id)
        .bind(email)
        .bind(name)
        .bind(picture)
        .bind(UserRole::User.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.into_user()
    }

    pub async fn set_role(&self, id: Uuid, role: UserRole) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(&format!(
            "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        row.into_user()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let row: UserRow =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        row.into_user()
    }
}
