/// Authentication module
///
/// Token encoding/validation, session issuing with the refresh-token cap,
/// refresh-token exchange, password hashing and auth cookies.

mod claims;
pub mod cookies;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::{Claims, Identity, TokenKind};
pub use jwt::{TokenCodec, TokenValidation, MIN_SECRET_LENGTH};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use session::{SessionIssuer, SessionPolicy, SessionTokens};
