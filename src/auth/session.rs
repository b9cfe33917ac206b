/// Session Issuing
///
/// Mints the access/refresh token pair handed out at registration and login.
/// Each refresh token is backed by a row in the credential store, and an
/// identity may hold at most `max_refresh_tokens` of them: once the cap is
/// reached, all of the identity's rows are purged before the new one is
/// inserted (reset, not oldest-first eviction).
///
/// The count/delete/insert sequence is three separate statements, so two
/// concurrent logins for one identity may briefly overshoot the cap.

use std::sync::Arc;

use crate::auth::claims::{Claims, Identity, TokenKind};
use crate::auth::jwt::TokenCodec;
use crate::configuration::AuthSettings;
use crate::error::{AppError, ConfigError};
use crate::store::CredentialStore;

/// Token lifetimes and the per-identity refresh cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub max_refresh_tokens: i64,
}

impl From<&AuthSettings> for SessionPolicy {
    fn from(settings: &AuthSettings) -> Self {
        Self {
            access_ttl_secs: settings.access_token_ttl_secs,
            refresh_ttl_secs: settings.refresh_token_ttl_secs,
            max_refresh_tokens: settings.max_refresh_tokens,
        }
    }
}

/// Access and refresh token pair
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues sessions and validates refresh tokens against the credential store
#[derive(Clone)]
pub struct SessionIssuer {
    pub(crate) codec: TokenCodec,
    pub(crate) store: Arc<dyn CredentialStore>,
    policy: SessionPolicy,
}

impl SessionIssuer {
    pub fn new(codec: TokenCodec, store: Arc<dyn CredentialStore>, policy: SessionPolicy) -> Self {
        Self {
            codec,
            store,
            policy,
        }
    }

    /// Build an issuer straight from the auth settings
    ///
    /// # Errors
    /// Returns a configuration error when the signing secret is unusable.
    pub fn from_settings(
        settings: &AuthSettings,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        let codec = TokenCodec::new(settings.secret.as_bytes())?;
        Ok(Self::new(codec, store, SessionPolicy::from(settings)))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub async fn issue_session(&self, identity: &Identity) -> Result<SessionTokens, AppError> {
        self.issue_session_at(identity, chrono::Utc::now().timestamp())
            .await
    }

    /// Mint an access/refresh pair for `identity` as of `now`
    ///
    /// # Errors
    /// Fails as a whole if any store operation fails; no tokens are returned
    /// in that case.
    pub async fn issue_session_at(
        &self,
        identity: &Identity,
        now: i64,
    ) -> Result<SessionTokens, AppError> {
        let access_token = self.issue_access_only_at(identity, now)?;

        let refresh_claims = Claims::new(
            identity,
            TokenKind::Refresh,
            now,
            self.policy.refresh_ttl_secs,
        );

        let outstanding = self.store.count_refresh_claims(identity).await?;
        if outstanding >= self.policy.max_refresh_tokens {
            let purged = self.store.delete_refresh_claims(identity).await?;
            tracing::info!(
                issuer = %identity,
                purged,
                "Refresh token cap reached, existing sessions reset"
            );
        }

        let record = self.store.insert_refresh_claim(&refresh_claims).await?;
        let refresh_token = self.codec.encode(&refresh_claims)?;

        tracing::debug!(issuer = %identity, claim_id = record.id, "Session issued");

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    pub fn issue_access_only(&self, identity: &Identity) -> Result<String, AppError> {
        self.issue_access_only_at(identity, chrono::Utc::now().timestamp())
    }

    /// Mint an access token without touching refresh state
    pub fn issue_access_only_at(&self, identity: &Identity, now: i64) -> Result<String, AppError> {
        let claims = Claims::new(identity, TokenKind::Access, now, self.policy.access_ttl_secs);
        self.codec.encode(&claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::jwt::TokenValidation;
    use crate::error::DatabaseError;
    use crate::store::{InMemoryStore, NewUser, RefreshClaimRecord, User, UserLookup};
    use async_trait::async_trait;

    pub(crate) const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    pub(crate) fn issuer_with_store(store: Arc<dyn CredentialStore>) -> SessionIssuer {
        SessionIssuer::from_settings(&AuthSettings::with_secret(SECRET), store)
            .expect("valid settings")
    }

    #[tokio::test]
    async fn test_access_token_decodes_to_identity() {
        let issuer = issuer_with_store(Arc::new(InMemoryStore::new()));
        let identity = Identity::from(uuid::Uuid::new_v4());

        let tokens = issuer.issue_session(&identity).await.unwrap();

        match issuer.codec().decode(&tokens.access_token) {
            TokenValidation::Valid(claims) => {
                assert_eq!(claims.identity(), identity);
                assert_eq!(claims.kind(), Some(TokenKind::Access));
                assert_eq!(claims.exp - claims.iat, 3600);
            }
            other => panic!("expected valid access token, got {:?}", other),
        }

        match issuer.codec().decode(&tokens.refresh_token) {
            TokenValidation::Valid(claims) => {
                assert_eq!(claims.kind(), Some(TokenKind::Refresh));
                assert_eq!(claims.exp - claims.iat, 10 * 24 * 3600);
            }
            other => panic!("expected valid refresh token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fourth_session_resets_refresh_rows() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer_with_store(store.clone());
        let identity = Identity::new("u1");

        for _ in 0..3 {
            issuer.issue_session(&identity).await.unwrap();
        }
        assert_eq!(store.count_refresh_claims(&identity).await.unwrap(), 3);

        issuer.issue_session(&identity).await.unwrap();
        assert_eq!(store.count_refresh_claims(&identity).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cap_is_per_identity() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer_with_store(store.clone());
        let u1 = Identity::new("u1");
        let u2 = Identity::new("u2");

        for _ in 0..3 {
            issuer.issue_session(&u1).await.unwrap();
        }
        issuer.issue_session(&u2).await.unwrap();

        assert_eq!(store.count_refresh_claims(&u1).await.unwrap(), 3);
        assert_eq!(store.count_refresh_claims(&u2).await.unwrap(), 1);
    }

    #[test]
    fn test_access_only_does_not_touch_store() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer_with_store(store.clone());

        let token = issuer.issue_access_only_at(&Identity::new("u1"), 1_000).unwrap();
        assert!(matches!(
            issuer.codec().decode_kind_at(&token, TokenKind::Access, 1_000),
            TokenValidation::Valid(_)
        ));
    }

    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn insert_user(&self, _: &NewUser) -> Result<User, DatabaseError> {
            Err(DatabaseError::QueryExecution("down".to_string()))
        }

        async fn find_user(&self, _: UserLookup<'_>) -> Result<Option<User>, DatabaseError> {
            Err(DatabaseError::QueryExecution("down".to_string()))
        }

        async fn insert_refresh_claim(
            &self,
            _: &Claims,
        ) -> Result<RefreshClaimRecord, DatabaseError> {
            Err(DatabaseError::QueryExecution("down".to_string()))
        }

        async fn count_refresh_claims(&self, _: &Identity) -> Result<i64, DatabaseError> {
            Ok(0)
        }

        async fn delete_refresh_claims(&self, _: &Identity) -> Result<u64, DatabaseError> {
            Ok(0)
        }

        async fn find_refresh_claim(
            &self,
            _: &Identity,
            _: i64,
            _: i64,
        ) -> Result<Option<RefreshClaimRecord>, DatabaseError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_store_failure_returns_no_tokens() {
        let issuer = issuer_with_store(Arc::new(FailingStore));

        let result = issuer.issue_session(&Identity::new("u1")).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }
}
