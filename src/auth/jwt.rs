/// Token Codec
///
/// Encodes claim sets into HS256-signed JWTs and decodes them back into a
/// tri-state validation outcome. The signing secret is supplied at
/// construction; the codec holds no other state.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenKind};
use crate::error::{AppError, ConfigError};

pub const MIN_SECRET_LENGTH: usize = 32;

/// Outcome of decoding a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValidation {
    /// Signature verifies and the token is inside its validity window.
    Valid(Claims),
    /// Signature verifies but `exp` has passed or `nbf` is still ahead.
    Expired(Claims),
    /// Cannot be parsed, or the signature does not match.
    Malformed,
    /// Rejected for any other reason, including the wrong token kind.
    Unrecognized,
}

impl TokenValidation {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            TokenValidation::Valid(claims) | TokenValidation::Expired(claims) => Some(claims),
            TokenValidation::Malformed | TokenValidation::Unrecognized => None,
        }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec for `secret`
    ///
    /// # Errors
    /// Returns a configuration error if the secret is empty or shorter than
    /// [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired("auth.secret".to_string()));
        }
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }

        // The validity window is checked in `decode_at` so the clock can be
        // supplied by the caller.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "iat".to_string()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Sign `claims` into a compact token string
    ///
    /// # Errors
    /// Signing failures are returned as an internal error for the current
    /// request only.
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    pub fn decode(&self, token: &str) -> TokenValidation {
        self.decode_at(token, chrono::Utc::now().timestamp())
    }

    /// Decode `token`, judging its validity window against `now`
    pub fn decode_at(&self, token: &str, now: i64) -> TokenValidation {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::InvalidToken
                    | ErrorKind::InvalidSignature
                    | ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_)
                    | ErrorKind::MissingRequiredClaim(_) => {
                        tracing::debug!(error = %e, "Malformed token");
                        TokenValidation::Malformed
                    }
                    _ => {
                        tracing::debug!(error = %e, "Unrecognized token");
                        TokenValidation::Unrecognized
                    }
                };
            }
        };

        if claims.is_outside_window(now) {
            TokenValidation::Expired(claims)
        } else {
            TokenValidation::Valid(claims)
        }
    }

    /// Decode `token` and require it to be of `kind`
    pub fn decode_kind_at(&self, token: &str, kind: TokenKind, now: i64) -> TokenValidation {
        let validation = self.decode_at(token, now);
        match validation.claims() {
            Some(claims) if claims.kind() != Some(kind) => TokenValidation::Unrecognized,
            _ => validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Identity;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).expect("valid secret")
    }

    fn access_claims(now: i64) -> Claims {
        Claims::new(&Identity::new("u1"), TokenKind::Access, now, 3600)
    }

    #[test]
    fn test_encode_then_decode_reproduces_claims() {
        let codec = codec();
        let now = chrono::Utc::now().timestamp();
        let mut claims = access_claims(now);
        claims.nbf = Some(now - 5);

        let token = codec.encode(&claims).expect("Failed to encode token");
        assert_eq!(codec.decode_at(&token, now), TokenValidation::Valid(claims));
    }

    #[test]
    fn test_rejects_short_or_empty_secret() {
        assert!(matches!(TokenCodec::new(b""), Err(ConfigError::MissingRequired(_))));
        assert!(matches!(TokenCodec::new(b"short"), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.decode("invalid.token.here"), TokenValidation::Malformed);
        assert_eq!(codec.decode(""), TokenValidation::Malformed);
    }

    #[test]
    fn test_flipped_signature_byte_is_malformed() {
        let codec = codec();
        let token = codec.encode(&access_claims(1_000)).unwrap();

        let signature_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[signature_start] = if bytes[signature_start] == b'A' { b'Z' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(codec.decode_at(&tampered, 1_000), TokenValidation::Malformed);
    }

    #[test]
    fn test_other_secret_is_malformed() {
        let token = codec().encode(&access_claims(1_000)).unwrap();
        let other = TokenCodec::new(b"another-secret-key-at-least-32-characters").unwrap();

        assert_eq!(other.decode_at(&token, 1_000), TokenValidation::Malformed);
    }

    #[test]
    fn test_one_second_past_expiry_is_expired() {
        let codec = codec();
        let claims = access_claims(1_000);
        let token = codec.encode(&claims).unwrap();

        assert_eq!(codec.decode_at(&token, claims.exp), TokenValidation::Valid(claims.clone()));
        assert_eq!(
            codec.decode_at(&token, claims.exp + 1),
            TokenValidation::Expired(claims)
        );
    }

    #[test]
    fn test_not_yet_valid_is_expired() {
        let codec = codec();
        let mut claims = access_claims(1_000);
        claims.nbf = Some(2_000);
        let token = codec.encode(&claims).unwrap();

        assert!(matches!(codec.decode_at(&token, 1_500), TokenValidation::Expired(_)));
    }

    #[test]
    fn test_wrong_algorithm_is_unrecognized() {
        let codec = codec();
        let token = encode(
            &Header::new(Algorithm::HS384),
            &access_claims(1_000),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(codec.decode_at(&token, 1_000), TokenValidation::Unrecognized);
    }

    #[test]
    fn test_wrong_kind_is_unrecognized() {
        let codec = codec();
        let refresh = Claims::new(&Identity::new("u1"), TokenKind::Refresh, 1_000, 60);
        let token = codec.encode(&refresh).unwrap();

        assert_eq!(
            codec.decode_kind_at(&token, TokenKind::Access, 1_000),
            TokenValidation::Unrecognized
        );
        assert_eq!(
            codec.decode_kind_at(&token, TokenKind::Refresh, 1_000),
            TokenValidation::Valid(refresh)
        );
    }
}
