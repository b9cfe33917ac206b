mod auth;
mod health_check;
mod medicine;
mod user;

pub use auth::{get_access_token, login, register, AccessTokenResponse, MessageResponse};
pub use health_check::health_check;
pub use medicine::{create_medicine, delete_medicine, get_medicines};
pub use user::{get_user_data, UserResponse};
