//! PostgreSQL implementation of [`UserStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, UserStore, normalize_phone};
use crate::domain::{CreateUserInput, UpdateUserInput, User, UserId};

/// Row shape shared by every query.
type UserRow = (
    Uuid,
    String,
    String,
    String,
    Option<String>,
    Option<i32>,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str =
    "user_id, first_name, last_name, email, phone, age, status, created_at, updated_at";

/// PostgreSQL-backed user store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Other`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Other(e.to_string()))
    }
}

fn map_row(row: UserRow) -> Result<User, StoreError> {
    let (user_id, first_name, last_name, email, phone, age, status, created_at, updated_at) = row;
    let status = status
        .parse()
        .map_err(|e: crate::domain::UnknownStatus| StoreError::Other(e.to_string()))?;
    Ok(User {
        user_id: UserId::from_uuid(user_id),
        first_name,
        last_name,
        email,
        phone,
        age,
        status,
        created_at,
        updated_at,
    })
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::email_taken(),
        other => StoreError::Other(other.to_string()),
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create(&self, input: &CreateUserInput) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, phone, age, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(normalize_phone(input.phone.as_deref()))
            .bind(input.age)
            .bind(input.status.unwrap_or_default().as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        map_row(row)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(map_row).collect()
    }

    async fn get_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or(StoreError::NotFound)?;

        map_row(row)
    }

    async fn update(&self, id: UserId, changes: &UpdateUserInput) -> Result<User, StoreError> {
        // An empty phone clears the column; NULL leaves it unchanged.
        let sql = format!(
            "UPDATE users SET \
               first_name = COALESCE($2, first_name), \
               last_name = COALESCE($3, last_name), \
               email = COALESCE($4, email), \
               phone = CASE WHEN $5::TEXT IS NULL THEN phone ELSE NULLIF($5, '') END, \
               age = COALESCE($6, age), \
               status = COALESCE($7, status), \
               updated_at = NOW() \
             WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(*id.as_uuid())
            .bind(changes.first_name.as_deref())
            .bind(changes.last_name.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.phone.as_deref())
            .bind(changes.age)
            .bind(changes.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or(StoreError::NotFound)?;

        map_row(row)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
