/// Session Guard Middleware
///
/// Gates private routes behind a valid access token. The outcome is one of:
/// - admit: the verified identity is stored in the request extensions
/// - 401: token is signed correctly but expired or not yet valid; cookies
///   are kept so the client can call the refresh endpoint
/// - 403: token is malformed, unverifiable, missing, or of an unrecognized
///   kind; both auth cookies are cleared to force a fresh login

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::cookies::ACCESS_COOKIE;
use crate::auth::{Identity, TokenCodec, TokenKind, TokenValidation};
use crate::error::{AppError, TokenError};

/// Decision taken for one request
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Admit(Identity),
    Reject(TokenError),
}

/// Classify `token` for a private route as of `now`
pub fn check(codec: &TokenCodec, token: Option<&str>, now: i64) -> GuardOutcome {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return GuardOutcome::Reject(TokenError::Malformed),
    };

    match codec.decode_kind_at(token, TokenKind::Access, now) {
        TokenValidation::Valid(claims) => GuardOutcome::Admit(claims.identity()),
        TokenValidation::Expired(_) => GuardOutcome::Reject(TokenError::Expired),
        TokenValidation::Malformed => GuardOutcome::Reject(TokenError::Malformed),
        TokenValidation::Unrecognized => GuardOutcome::Reject(TokenError::UnrecognizedKind),
    }
}

/// Pull the access token from `Authorization: Bearer`, an `access_token`
/// header, or the `access_token` cookie, in that order.
pub fn extract_token(req: &ServiceRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let header = || {
        req.headers()
            .get(ACCESS_COOKIE)
            .and_then(|h| h.to_str().ok())
            .map(|t| t.trim().to_string())
    };

    let cookie = || req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string());

    bearer.or_else(header).or_else(cookie)
}

/// Session guard for private scopes
pub struct SessionGuard {
    codec: TokenCodec,
}

impl SessionGuard {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionGuardService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct SessionGuardService<S> {
    service: Rc<S>,
    codec: TokenCodec,
}

impl<S, B> Service<ServiceRequest> for SessionGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = extract_token(&req);
        let now = chrono::Utc::now().timestamp();

        match check(&self.codec, token.as_deref(), now) {
            GuardOutcome::Admit(identity) => {
                tracing::debug!(issuer = %identity, path = %req.path(), "Session admitted");
                req.extensions_mut().insert(identity);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            GuardOutcome::Reject(reason) => {
                tracing::warn!(path = %req.path(), reason = %reason, "Session rejected");
                Box::pin(async move { Err(AppError::Token(reason).into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse};

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    fn token(kind: TokenKind, iat: i64, ttl: i64) -> String {
        codec()
            .encode(&Claims::new(&Identity::new("u1"), kind, iat, ttl))
            .unwrap()
    }

    #[test]
    fn test_valid_token_is_admitted() {
        let t = token(TokenKind::Access, 1_000, 3600);
        assert_eq!(
            check(&codec(), Some(&t), 1_000),
            GuardOutcome::Admit(Identity::new("u1"))
        );
    }

    #[test]
    fn test_one_second_past_expiry_is_unauthorized_not_forbidden() {
        let t = token(TokenKind::Access, 1_000, 3600);
        assert_eq!(
            check(&codec(), Some(&t), 1_000 + 3600 + 1),
            GuardOutcome::Reject(TokenError::Expired)
        );
    }

    #[test]
    fn test_garbage_and_missing_are_malformed() {
        assert_eq!(
            check(&codec(), Some("not-a-token"), 0),
            GuardOutcome::Reject(TokenError::Malformed)
        );
        assert_eq!(check(&codec(), None, 0), GuardOutcome::Reject(TokenError::Malformed));
        assert_eq!(check(&codec(), Some(""), 0), GuardOutcome::Reject(TokenError::Malformed));
    }

    #[test]
    fn test_refresh_token_is_unrecognized_kind() {
        let t = token(TokenKind::Refresh, 1_000, 3600);
        assert_eq!(
            check(&codec(), Some(&t), 1_000),
            GuardOutcome::Reject(TokenError::UnrecognizedKind)
        );
    }

    async fn whoami(identity: web::ReqData<Identity>) -> HttpResponse {
        HttpResponse::Ok().body(identity.into_inner().to_string())
    }

    #[actix_web::test]
    async fn test_middleware_injects_identity() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/private")
                    .wrap(SessionGuard::new(codec()))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let now = chrono::Utc::now().timestamp();
        let req = actix_test::TestRequest::get()
            .uri("/private/whoami")
            .insert_header((
                AUTHORIZATION,
                format!("Bearer {}", token(TokenKind::Access, now, 3600)),
            ))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;

        assert_eq!(body, web::Bytes::from_static(b"u1"));
    }

    #[actix_web::test]
    async fn test_middleware_reads_access_token_cookie() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/private")
                    .wrap(SessionGuard::new(codec()))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let now = chrono::Utc::now().timestamp();
        let req = actix_test::TestRequest::get()
            .uri("/private/whoami")
            .cookie(actix_web::cookie::Cookie::new(
                ACCESS_COOKIE,
                token(TokenKind::Access, now, 3600),
            ))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_middleware_rejections() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/private")
                    .wrap(SessionGuard::new(codec()))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let now = chrono::Utc::now().timestamp();
        let expired = token(TokenKind::Access, now - 7200, 3600);
        let req = actix_test::TestRequest::get()
            .uri("/private/whoami")
            .insert_header((ACCESS_COOKIE, expired))
            .to_request();
        let err = app.call(req).await.err().expect("expired token must be rejected");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.cookies().count(), 0);

        let req = actix_test::TestRequest::get()
            .uri("/private/whoami")
            .insert_header((ACCESS_COOKIE, "garbage"))
            .to_request();
        let err = app.call(req).await.err().expect("garbage token must be rejected");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.cookies().count(), 2);
    }
}
