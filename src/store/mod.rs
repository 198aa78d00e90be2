/// Persistence layer.
///
/// `UserStore` and `SessionStore` are the only interfaces the rest of
/// the service talks to; handlers and middleware receive them as
/// explicitly passed handles. `PgStore` backs production, `MemoryStore`
/// backs the integration tests. One store object implements both
/// traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User roles for access gating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "vendor")]
    Vendor,
    #[serde(rename = "customer")]
    Customer,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::Customer => "customer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "vendor" => Some(Role::Vendor),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// User account record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub email: String,
    pub role: Role,
}

/// Fields for a user about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Record of one login or refresh event. The access token string is
/// the primary key; the `active` flag is the sole revocation
/// mechanism.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub active: bool,
    pub issued_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Duplicate username or email is a uniqueness
    /// violation.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn update_password(&self, user_id: i64, new_hash: &str) -> Result<(), AppError>;

    /// All users, id ascending.
    async fn list(&self) -> Result<Vec<User>, AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new issued-token pair with active = true. Rejects a
    /// duplicate access-token key.
    async fn record(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), AppError>;

    /// Lookup by the exact (user id, access token, active) triple.
    async fn find_active(
        &self,
        user_id: i64,
        access_token: &str,
    ) -> Result<Option<IssuedToken>, AppError>;

    /// Set active = false. No-op when the row is absent.
    async fn revoke(&self, access_token: &str) -> Result<(), AppError>;
}
