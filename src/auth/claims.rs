/// Token Claims
///
/// The payload carried by both access and refresh tokens. The issuer is the
/// user's identity; the subject names which kind of token it is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a user (the user's UUID as a string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<uuid::Uuid> for Identity {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of token a claim set describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn subject(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }

    pub fn from_subject(subject: &str) -> Option<Self> {
        match subject {
            "access_token" => Some(TokenKind::Access),
            "refresh_token" => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

/// Signed claim set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Issuer (identity the token was minted for)
    pub iss: String,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
    /// Subject: `access_token` or `refresh_token`
    pub sub: String,
    /// Not before (Unix timestamp, seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    /// Build claims of `kind` for `identity`, valid for `ttl_seconds` from `now`
    pub fn new(identity: &Identity, kind: TokenKind, now: i64, ttl_seconds: i64) -> Self {
        Self {
            iss: identity.as_str().to_string(),
            iat: now,
            exp: now + ttl_seconds,
            sub: kind.subject().to_string(),
            nbf: None,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.iss.clone())
    }

    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_subject(&self.sub)
    }

    /// Expired, or not yet valid, at `now`
    pub fn is_outside_window(&self, now: i64) -> bool {
        self.exp < now || self.nbf.map_or(false, |nbf| nbf > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let identity = Identity::from(uuid::Uuid::new_v4());
        let claims = Claims::new(&identity, TokenKind::Access, 1_000, 3600);

        assert_eq!(claims.identity(), identity);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 4_600);
        assert_eq!(claims.sub, "access_token");
        assert_eq!(claims.kind(), Some(TokenKind::Access));
    }

    #[test]
    fn test_validity_window() {
        let identity = Identity::new("u1");
        let mut claims = Claims::new(&identity, TokenKind::Refresh, 0, 10);

        assert!(!claims.is_outside_window(10));
        assert!(claims.is_outside_window(11));

        claims.nbf = Some(5);
        assert!(claims.is_outside_window(4));
        assert!(!claims.is_outside_window(5));
    }

    #[test]
    fn test_unknown_subject() {
        let mut claims = Claims::new(&Identity::new("u1"), TokenKind::Access, 0, 10);
        claims.sub = "id_token".to_string();
        assert_eq!(claims.kind(), None);
    }

    #[test]
    fn test_nbf_is_omitted_when_absent() {
        let claims = Claims::new(&Identity::new("u1"), TokenKind::Access, 0, 10);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("nbf").is_none());
    }
}
