/// Postgres store backend.
///
/// Runtime-checked sqlx queries over a shared `PgPool`. Uniqueness is
/// enforced by the schema; violations surface through the central
/// `sqlx::Error` conversion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::configuration::DatabaseSettings;
use crate::error::{AccountError, AppError};
use crate::store::{IssuedToken, NewUser, Role, SessionStore, User, UserStore};

pub struct PgStore {
    pool: PgPool,
}

type UserRow = (i64, String, String, String, String);

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to the configured database.
    ///
    /// # Errors
    /// Returns error if the database is unreachable
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&settings.connection_string())
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    /// Returns error if a migration fails to apply
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))
    }

    fn into_user(row: UserRow) -> Result<User, AppError> {
        let (id, username, password_hash, email, role) = row;
        let role = Role::from_str(&role)
            .ok_or_else(|| AppError::Internal(format!("unknown role in store: {}", role)))?;

        Ok(User {
            id,
            username,
            password_hash,
            email,
            role,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, email, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            role: user.role,
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, email, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, email, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::into_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, email, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::into_user).transpose()
    }

    async fn update_password(&self, user_id: i64, new_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::UserNotFound.into());
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, email, role FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::into_user).collect()
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn record(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO issued_tokens (user_id, access_token, refresh_token, active, issued_at)
            VALUES ($1, $2, $3, TRUE, $4)
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: i64,
        access_token: &str,
    ) -> Result<Option<IssuedToken>, AppError> {
        let row: Option<(i64, String, String, bool, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT user_id, access_token, refresh_token, active, issued_at
            FROM issued_tokens
            WHERE user_id = $1 AND access_token = $2 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(user_id, access_token, refresh_token, active, issued_at)| IssuedToken {
                user_id,
                access_token,
                refresh_token,
                active,
                issued_at,
            },
        ))
    }

    async fn revoke(&self, access_token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE issued_tokens SET active = FALSE WHERE access_token = $1")
            .bind(access_token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
