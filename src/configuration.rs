use serde::Deserialize;

use crate::error::ConfigError;

/// bcrypt work factor bounds
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub store: StoreBackend,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API with credentials. Empty
    /// disables CORS handling entirely.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

/// Token and session settings
#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    /// HMAC signing secret, at least 32 bytes
    pub secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,
    /// Live refresh tokens allowed per identity before they are all reset
    #[serde(default = "default_max_refresh_tokens")]
    pub max_refresh_tokens: i64,
    #[serde(default = "default_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

impl AuthSettings {
    /// Settings with the standard lifetimes (1h access, 10d refresh, cap 3)
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
            max_refresh_tokens: default_max_refresh_tokens(),
            password_hash_cost: default_hash_cost(),
            secure_cookies: default_secure_cookies(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.max_refresh_tokens < 1 {
            return Err(ConfigError::InvalidValue(
                "auth.max_refresh_tokens must be at least 1".to_string(),
            ));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.password_hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_access_ttl() -> i64 {
    60 * 60
}

fn default_refresh_ttl() -> i64 {
    10 * 24 * 60 * 60
}

fn default_max_refresh_tokens() -> i64 {
    3
}

fn default_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_secure_cookies() -> bool {
    true
}

/// Read `configuration.yaml` (optional) overlaid by `APP__`-prefixed
/// environment variables, e.g. `APP__AUTH__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.auth.validate()?;
    Ok(settings)
}
