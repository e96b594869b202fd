use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Signing and claim settings for issued access tokens.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC-SHA256 signing secret.
    pub secret_key: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Access token lifetime in whole minutes.
    #[serde(default = "default_lifetime_minutes")]
    pub lifetime_minutes: u32,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime_minutes", &self.lifetime_minutes)
            .finish()
    }
}

/// Credentials of the admin account created on first start.
#[derive(Clone, Deserialize)]
pub struct AdminUserConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_username")]
    pub username: String,
}

impl fmt::Debug for AdminUserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminUserConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub token: TokenConfig,
    pub admin: AdminUserConfig,
}

fn default_issuer() -> String {
    "keyloom".into()
}

fn default_audience() -> String {
    "keyloom-api".into()
}

fn default_lifetime_minutes() -> u32 {
    60
}

fn default_admin_username() -> String {
    "admin".into()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.secret_key.len() < 32 {
            return Err(ConfigError::Validation(
                "token.secret_key must be at least 32 bytes".into(),
            ));
        }
        if self.token.issuer.is_empty() || self.token.audience.is_empty() {
            return Err(ConfigError::Validation(
                "token.issuer and token.audience must not be empty".into(),
            ));
        }
        if self.token.lifetime_minutes == 0 {
            return Err(ConfigError::Validation(
                "token.lifetime_minutes must be > 0".into(),
            ));
        }
        if self.admin.email.is_empty() || self.admin.password.is_empty() {
            return Err(ConfigError::Validation(
                "admin.email and admin.password must be set".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// The file is optional. Any environment variable matching the key path separated by
/// double underscores (e.g. `TOKEN__SECRET_KEY`, `ADMIN__EMAIL`) overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

/// Same as [`load_config`] with an explicit config file path.
pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
