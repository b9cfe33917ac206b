use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::{
    CredentialStore, Medicine, MedicineStore, NewMedicine, NewUser, RefreshClaimRecord, User,
    UserLookup,
};
use crate::auth::{Claims, Identity};
use crate::error::DatabaseError;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    refresh_claims: Vec<RefreshClaimRecord>,
    medicines: Vec<Medicine>,
    next_claim_id: i64,
    next_medicine_id: i64,
}

/// Process-local store used by tests and `store = "memory"` runs
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> DatabaseError {
    DatabaseError::ConnectionPool("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().map_err(poisoned)?;

        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation("users_email_key".to_string()));
        }
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "users_username_key".to_string(),
            ));
        }

        let created = User {
            uuid: user.uuid,
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, by: UserLookup<'_>) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let found = tables.users.iter().find(|u| match by {
            UserLookup::Id(id) => u.uuid == id,
            UserLookup::Email(email) => u.email == email,
            UserLookup::Username(username) => u.username == username,
        });
        Ok(found.cloned())
    }

    async fn insert_refresh_claim(
        &self,
        claims: &Claims,
    ) -> Result<RefreshClaimRecord, DatabaseError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.next_claim_id += 1;

        let record = RefreshClaimRecord {
            id: tables.next_claim_id,
            issuer: claims.iss.clone(),
            issued_at: claims.iat,
            expires_at: claims.exp,
            subject: claims.sub.clone(),
        };
        tables.refresh_claims.push(record.clone());
        Ok(record)
    }

    async fn count_refresh_claims(&self, issuer: &Identity) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let count = tables
            .refresh_claims
            .iter()
            .filter(|c| c.issuer == issuer.as_str())
            .count();
        Ok(count as i64)
    }

    async fn delete_refresh_claims(&self, issuer: &Identity) -> Result<u64, DatabaseError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let before = tables.refresh_claims.len();
        tables.refresh_claims.retain(|c| c.issuer != issuer.as_str());
        Ok((before - tables.refresh_claims.len()) as u64)
    }

    async fn find_refresh_claim(
        &self,
        issuer: &Identity,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Option<RefreshClaimRecord>, DatabaseError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let found = tables.refresh_claims.iter().find(|c| {
            c.issuer == issuer.as_str() && c.issued_at == issued_at && c.expires_at == expires_at
        });
        Ok(found.cloned())
    }
}

#[async_trait]
impl MedicineStore for InMemoryStore {
    async fn list_medicines(&self, owner: &Identity) -> Result<Vec<Medicine>, DatabaseError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .medicines
            .iter()
            .filter(|m| m.owner == owner.as_str())
            .cloned()
            .collect())
    }

    async fn insert_medicine(
        &self,
        owner: &Identity,
        medicine: &NewMedicine,
    ) -> Result<Medicine, DatabaseError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.next_medicine_id += 1;

        let created = Medicine {
            id: tables.next_medicine_id,
            owner: owner.as_str().to_string(),
            name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            types: medicine.types.clone(),
            interval: medicine.interval,
        };
        tables.medicines.push(created.clone());
        Ok(created)
    }

    async fn delete_medicine(&self, owner: &Identity, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let before = tables.medicines.len();
        tables
            .medicines
            .retain(|m| !(m.id == id && m.owner == owner.as_str()));
        Ok(tables.medicines.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKind;
    use uuid::Uuid;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            uuid: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_rejected() {
        let store = InMemoryStore::new();
        store.insert_user(&new_user("a@example.com", "alice")).await.unwrap();

        let dup_email = store.insert_user(&new_user("a@example.com", "other")).await;
        assert!(matches!(dup_email, Err(DatabaseError::UniqueConstraintViolation(_))));

        let dup_username = store.insert_user(&new_user("b@example.com", "alice")).await;
        assert!(matches!(dup_username, Err(DatabaseError::UniqueConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_find_user_by_each_predicate() {
        let store = InMemoryStore::new();
        let user = store.insert_user(&new_user("a@example.com", "alice")).await.unwrap();

        let by_id = store.find_user(UserLookup::Id(user.uuid)).await.unwrap();
        let by_email = store.find_user(UserLookup::Email("a@example.com")).await.unwrap();
        let by_username = store.find_user(UserLookup::Username("alice")).await.unwrap();
        let missing = store.find_user(UserLookup::Username("bob")).await.unwrap();

        assert_eq!(by_id.map(|u| u.uuid), Some(user.uuid));
        assert_eq!(by_email.map(|u| u.uuid), Some(user.uuid));
        assert_eq!(by_username.map(|u| u.uuid), Some(user.uuid));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_refresh_claims_are_scoped_by_issuer() {
        let store = InMemoryStore::new();
        let u1 = Identity::new("u1");
        let u2 = Identity::new("u2");

        let claims = Claims::new(&u1, TokenKind::Refresh, 100, 50);
        store.insert_refresh_claim(&claims).await.unwrap();
        store
            .insert_refresh_claim(&Claims::new(&u2, TokenKind::Refresh, 100, 50))
            .await
            .unwrap();

        assert_eq!(store.count_refresh_claims(&u1).await.unwrap(), 1);
        assert!(store.find_refresh_claim(&u1, 100, 150).await.unwrap().is_some());
        assert!(store.find_refresh_claim(&u1, 100, 151).await.unwrap().is_none());

        assert_eq!(store.delete_refresh_claims(&u1).await.unwrap(), 1);
        assert_eq!(store.count_refresh_claims(&u1).await.unwrap(), 0);
        assert_eq!(store.count_refresh_claims(&u2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_medicine_delete_requires_owner() {
        let store = InMemoryStore::new();
        let owner = Identity::new("u1");
        let medicine = NewMedicine {
            name: "Ibuprofen".to_string(),
            dosage: "200mg".to_string(),
            types: "tablet".to_string(),
            interval: 8,
        };
        let created = store.insert_medicine(&owner, &medicine).await.unwrap();

        assert!(!store.delete_medicine(&Identity::new("u2"), created.id).await.unwrap());
        assert_eq!(store.list_medicines(&owner).await.unwrap().len(), 1);
        assert!(store.delete_medicine(&owner, created.id).await.unwrap());
        assert!(store.list_medicines(&owner).await.unwrap().is_empty());
    }
}
