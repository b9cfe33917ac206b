/// Refresh Token Validation
///
/// Exchanges a refresh token for a new access token without asking for the
/// password again. A refresh token is honoured only while:
/// - its signature verifies and it is a refresh-kind token
/// - a stored refresh claim matches its (issuer, issued_at, expires_at) exactly
/// - that stored claim has not expired
///
/// The refresh token itself is not rotated on use.

use crate::auth::claims::TokenKind;
use crate::auth::jwt::TokenValidation;
use crate::auth::session::SessionIssuer;
use crate::error::{AppError, TokenError};

impl SessionIssuer {
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        self.refresh_at(refresh_token, chrono::Utc::now().timestamp())
            .await
    }

    /// Validate `refresh_token` as of `now` and mint a fresh access token
    ///
    /// # Errors
    /// Every rejection is a [`TokenError`] that clears the auth cookies;
    /// store failures surface as store errors.
    pub async fn refresh_at(&self, refresh_token: &str, now: i64) -> Result<String, AppError> {
        let validation = self
            .codec
            .decode_kind_at(refresh_token, TokenKind::Refresh, now);
        let (claims, expired) = match validation {
            TokenValidation::Valid(claims) => (claims, false),
            TokenValidation::Expired(claims) => (claims, true),
            TokenValidation::Malformed => {
                tracing::warn!("Malformed refresh token presented");
                return Err(TokenError::Malformed.into());
            }
            TokenValidation::Unrecognized => {
                tracing::warn!("Unrecognized token presented for refresh");
                return Err(TokenError::UnrecognizedKind.into());
            }
        };

        let identity = claims.identity();
        let record = self
            .store
            .find_refresh_claim(&identity, claims.iat, claims.exp)
            .await?;

        let record = match record {
            Some(record) => record,
            None => {
                tracing::warn!(issuer = %identity, "Refresh token has no live claim");
                return Err(TokenError::RefreshRevoked.into());
            }
        };

        if expired || record.expires_at < now {
            tracing::info!(issuer = %identity, "Refresh token expired");
            return Err(TokenError::RefreshExpired.into());
        }

        let access_token = self.issue_access_only_at(&identity, now)?;
        tracing::info!(issuer = %identity, "Access token refreshed");
        Ok(access_token)
    }
}
