use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::http::header;
use actix_web::middleware::{Condition, Logger};
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionIssuer;
use crate::configuration::AuthSettings;
use crate::error::{AppError, ValidationError};
use crate::middleware::{RequestLogger, SessionGuard};
use crate::routes::{
    create_medicine, delete_medicine, get_access_token, get_medicines, get_user_data, health_check,
    login, register,
};
use crate::store::Stores;

/// CORS policy for the configured origins. Cookies ride along, so origins
/// are always listed explicitly.
fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allowed_header("access_token")
        .supports_credentials()
        .max_age(3600)
}

pub fn run(
    listener: TcpListener,
    stores: Stores,
    sessions: SessionIssuer,
    auth: AuthSettings,
    allowed_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    let credentials = web::Data::from(stores.credentials);
    let medicines = web::Data::from(stores.medicines);
    let guard_codec = sessions.codec().clone();
    let sessions = web::Data::new(sessions);
    let auth = web::Data::new(auth);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(RequestLogger)
            .wrap(Logger::default())
            .wrap(Condition::new(
                !allowed_origins.is_empty(),
                cors(&allowed_origins),
            ))

            // Shared state
            .app_data(credentials.clone())
            .app_data(medicines.clone())
            .app_data(sessions.clone())
            .app_data(auth.clone())

            // Unreadable bodies and paths answer with the generic input error
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected request body");
                AppError::Input(ValidationError::MalformedBody).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected request path");
                AppError::Input(ValidationError::MalformedBody).into()
            }))

            .service(
                web::scope("/api")
                    // Public routes
                    .route("/health", web::get().to(health_check))
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/get-access-token", web::get().to(get_access_token))

                    // Private routes (require a valid access token)
                    .service(
                        web::scope("/user")
                            .wrap(SessionGuard::new(guard_codec.clone()))
                            .route("/info", web::get().to(get_user_data))
                            .route("/medicine", web::get().to(get_medicines))
                            .route("/medicine", web::post().to(create_medicine))
                            .route("/medicine/{id}", web::delete().to(delete_medicine)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
