/// Auth cookies
///
/// `access_token` and `refresh_token` are HTTP-only, secure-flagged cookies
/// whose lifetimes mirror the tokens they carry.

use actix_web::cookie::{time::Duration, Cookie, SameSite};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn auth_cookie(
    name: &'static str,
    value: String,
    ttl_seconds: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl_seconds))
        .finish()
}

/// Cookies that instruct the client to drop both auth cookies
pub fn removal_cookies() -> [Cookie<'static>; 2] {
    [removal(ACCESS_COOKIE), removal(REFRESH_COOKIE)]
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .finish()
}
