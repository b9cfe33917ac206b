/// Persistence layer
///
/// The credential store holds users and the issued refresh claims; the
/// medicine store holds each user's medicine list. Every operation is a
/// single atomic statement against the backing store.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{Claims, Identity};
use crate::error::DatabaseError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Stored user record
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub uuid: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub uuid: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Predicate for user lookups
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(Uuid),
    Email(&'a str),
    Username(&'a str),
}

/// One outstanding refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaimRecord {
    pub id: i64,
    pub issuer: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub dosage: String,
    pub types: String,
    pub interval: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub types: String,
    #[serde(default)]
    pub interval: i32,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError>;

    async fn find_user(&self, by: UserLookup<'_>) -> Result<Option<User>, DatabaseError>;

    async fn insert_refresh_claim(
        &self,
        claims: &Claims,
    ) -> Result<RefreshClaimRecord, DatabaseError>;

    async fn count_refresh_claims(&self, issuer: &Identity) -> Result<i64, DatabaseError>;

    /// Delete every refresh claim of `issuer`, returning how many were removed
    async fn delete_refresh_claims(&self, issuer: &Identity) -> Result<u64, DatabaseError>;

    /// Exact match on the `(issuer, issued_at, expires_at)` tuple
    async fn find_refresh_claim(
        &self,
        issuer: &Identity,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Option<RefreshClaimRecord>, DatabaseError>;
}

#[async_trait]
pub trait MedicineStore: Send + Sync {
    async fn list_medicines(&self, owner: &Identity) -> Result<Vec<Medicine>, DatabaseError>;

    async fn insert_medicine(
        &self,
        owner: &Identity,
        medicine: &NewMedicine,
    ) -> Result<Medicine, DatabaseError>;

    /// Returns `false` when no medicine with `id` belongs to `owner`
    async fn delete_medicine(&self, owner: &Identity, id: i64) -> Result<bool, DatabaseError>;
}

/// The stores handed to the HTTP layer
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub medicines: Arc<dyn MedicineStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            credentials: store.clone(),
            medicines: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            credentials: store.clone(),
            medicines: store,
        }
    }
}
