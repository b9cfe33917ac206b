use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CredentialStore, Medicine, MedicineStore, NewMedicine, NewUser, RefreshClaimRecord, User,
    UserLookup,
};
use crate::auth::{Claims, Identity};
use crate::error::DatabaseError;

type UserRow = (Uuid, String, String, String, DateTime<Utc>);
type ClaimRow = (i64, String, i64, i64, String);
type MedicineRow = (i64, String, String, String, String, i32);

fn user_from_row((uuid, email, username, password_hash, created_at): UserRow) -> User {
    User {
        uuid,
        email,
        username,
        password_hash,
        created_at,
    }
}

fn claim_from_row((id, issuer, issued_at, expires_at, subject): ClaimRow) -> RefreshClaimRecord {
    RefreshClaimRecord {
        id,
        issuer,
        issued_at,
        expires_at,
        subject,
    }
}

fn medicine_from_row((id, owner, name, dosage, types, interval): MedicineRow) -> Medicine {
    Medicine {
        id,
        owner,
        name,
        dosage,
        types,
        interval,
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (uuid, email, username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING uuid, email, username, password_hash, created_at
            "#,
        )
        .bind(user.uuid)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user_from_row(row))
    }

    async fn find_user(&self, by: UserLookup<'_>) -> Result<Option<User>, DatabaseError> {
        let row = match by {
            UserLookup::Id(id) => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT uuid, email, username, password_hash, created_at
                    FROM users WHERE uuid = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            UserLookup::Email(email) => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT uuid, email, username, password_hash, created_at
                    FROM users WHERE email = $1
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
            UserLookup::Username(username) => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT uuid, email, username, password_hash, created_at
                    FROM users WHERE username = $1
                    "#,
                )
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(user_from_row))
    }

    async fn insert_refresh_claim(
        &self,
        claims: &Claims,
    ) -> Result<RefreshClaimRecord, DatabaseError> {
        let row = sqlx::query_as::<_, ClaimRow>(
            r#"
            INSERT INTO refresh_claims (issuer, issued_at, expires_at, subject)
            VALUES ($1, $2, $3, $4)
            RETURNING id, issuer, issued_at, expires_at, subject
            "#,
        )
        .bind(&claims.iss)
        .bind(claims.iat)
        .bind(claims.exp)
        .bind(&claims.sub)
        .fetch_one(&self.pool)
        .await?;

        Ok(claim_from_row(row))
    }

    async fn count_refresh_claims(&self, issuer: &Identity) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM refresh_claims WHERE issuer = $1",
        )
        .bind(issuer.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_refresh_claims(&self, issuer: &Identity) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_claims WHERE issuer = $1")
            .bind(issuer.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_refresh_claim(
        &self,
        issuer: &Identity,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Option<RefreshClaimRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT id, issuer, issued_at, expires_at, subject
            FROM refresh_claims
            WHERE issuer = $1 AND issued_at = $2 AND expires_at = $3
            LIMIT 1
            "#,
        )
        .bind(issuer.as_str())
        .bind(issued_at)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(claim_from_row))
    }
}

#[async_trait]
impl MedicineStore for PgStore {
    async fn list_medicines(&self, owner: &Identity) -> Result<Vec<Medicine>, DatabaseError> {
        let rows = sqlx::query_as::<_, MedicineRow>(
            r#"
            SELECT id, owner, name, dosage, types, dose_interval
            FROM medicines
            WHERE owner = $1
            ORDER BY id
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(medicine_from_row).collect())
    }

    async fn insert_medicine(
        &self,
        owner: &Identity,
        medicine: &NewMedicine,
    ) -> Result<Medicine, DatabaseError> {
        let row = sqlx::query_as::<_, MedicineRow>(
            r#"
            INSERT INTO medicines (owner, name, dosage, types, dose_interval, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner, name, dosage, types, dose_interval
            "#,
        )
        .bind(owner.as_str())
        .bind(&medicine.name)
        .bind(&medicine.dosage)
        .bind(&medicine.types)
        .bind(medicine.interval)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(medicine_from_row(row))
    }

    async fn delete_medicine(&self, owner: &Identity, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
