use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{AppError, CredentialError};
use crate::store::{CredentialStore, UserLookup};

#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub uuid: String,
    pub email: String,
    pub username: String,
    pub created_at: String,
}

/// GET /api/user/info
///
/// Details of the signed-in user. The identity is injected by the session
/// guard.
pub async fn get_user_data(
    identity: web::ReqData<Identity>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = Uuid::parse_str(identity.as_str()).map_err(|_| CredentialError::UserNotFound)?;

    let user = store
        .find_user(UserLookup::Id(user_id))
        .await?
        .ok_or(CredentialError::UserNotFound)?;

    Ok(HttpResponse::Ok().json(UserResponse {
        uuid: user.uuid.to_string(),
        email: user.email,
        username: user.username,
        created_at: user.created_at.to_rfc3339(),
    }))
}
