/// Authentication Routes
///
/// Registration, login and access-token refresh. Successful registration and
/// login set the `access_token` and `refresh_token` cookies; refresh resets
/// only `access_token`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::cookies::{auth_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::{
    hash_password, validate_password_strength, verify_password, Identity, SessionIssuer,
    SessionTokens,
};
use crate::configuration::AuthSettings;
use crate::error::{AppError, CredentialError, DatabaseError, ErrorContext};
use crate::store::{CredentialStore, NewUser, UserLookup};
use crate::validators::{is_valid_email, is_valid_username};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Legacy `{error, msg}` body
#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub error: bool,
    pub msg: String,
}

impl MessageResponse {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            error: false,
            msg: msg.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

fn with_session_cookies(
    mut builder: actix_web::HttpResponseBuilder,
    tokens: &SessionTokens,
    settings: &AuthSettings,
) -> actix_web::HttpResponseBuilder {
    builder
        .cookie(auth_cookie(
            ACCESS_COOKIE,
            tokens.access_token.clone(),
            settings.access_token_ttl_secs,
            settings.secure_cookies,
        ))
        .cookie(auth_cookie(
            REFRESH_COOKIE,
            tokens.refresh_token.clone(),
            settings.refresh_token_ttl_secs,
            settings.secure_cookies,
        ));
    builder
}

/// POST /api/register
///
/// Register a new user with email, username and password, then open a
/// session for them.
///
/// # Errors
/// - Input errors (bad body, invalid fields) and duplicate email/username
///   come back as `200 {"error": true}`
/// - Store failures come back as a generic 500
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn CredentialStore>,
    sessions: web::Data<SessionIssuer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let RegisterRequest {
        email,
        username,
        password,
    } = form.into_inner();

    let email = is_valid_email(&email)?;
    let username = is_valid_username(&username)?;
    validate_password_strength(&password)?;

    if store.find_user(UserLookup::Email(&email)).await?.is_some() {
        return Err(CredentialError::EmailTaken.into());
    }
    if store.find_user(UserLookup::Username(&username)).await?.is_some() {
        return Err(CredentialError::UsernameTaken.into());
    }

    let cost = settings.password_hash_cost;
    let password_hash = web::block(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

    let user = store
        .insert_user(&NewUser {
            uuid: Uuid::new_v4(),
            email,
            username,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration.
            DatabaseError::UniqueConstraintViolation(constraint)
                if constraint.contains("username") =>
            {
                AppError::from(CredentialError::UsernameTaken)
            }
            DatabaseError::UniqueConstraintViolation(_) => {
                AppError::from(CredentialError::EmailTaken)
            }
            other => context.record(other.into()),
        })?;

    let context = context.with_user_id(user.uuid.to_string());
    let tokens = sessions
        .issue_session(&Identity::from(user.uuid))
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.uuid,
        "User registered successfully"
    );

    Ok(with_session_cookies(HttpResponse::Ok(), &tokens, &settings)
        .json(MessageResponse::ok("User created successfully")))
}

/// POST /api/login
///
/// Authenticate with email and password. Returns both tokens in the body
/// and as cookies.
///
/// Unknown email and wrong password produce the same error message.
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn CredentialStore>,
    sessions: web::Data<SessionIssuer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let LoginRequest { email, password } = form.into_inner();
    let email = email.trim().to_lowercase();

    let user = store
        .find_user(UserLookup::Email(&email))
        .await?
        .ok_or(CredentialError::InvalidCredentials)?;

    let password_hash = user.password_hash.clone();
    let password_valid = web::block(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?;

    if !password_valid {
        return Err(CredentialError::InvalidCredentials.into());
    }

    let context = context.with_user_id(user.uuid.to_string());
    let tokens = sessions
        .issue_session(&Identity::from(user.uuid))
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.uuid,
        "User logged in"
    );

    Ok(with_session_cookies(HttpResponse::Ok(), &tokens, &settings).json(&tokens))
}

/// GET /api/get-access-token
///
/// Exchange the refresh token in the body for a new access token.
///
/// # Errors
/// - 403 with both cookies cleared when the refresh token is malformed,
///   revoked, superseded or expired
pub async fn get_access_token(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionIssuer>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let access_token = sessions.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(
            ACCESS_COOKIE,
            access_token.clone(),
            settings.access_token_ttl_secs,
            settings.secure_cookies,
        ))
        .json(AccessTokenResponse { access_token }))
}
