//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `JWT_TTL_HOURS` - Access token lifetime (default: 24)
//! - `OTP_TTL_MINUTES` - Role assignment code lifetime (default: 10)
//! - `ADMIN_EMAILS` - Comma separated emails that register as admins
//! - `CURRENCY` - ISO currency code for all prices (default: USD)
//! - `NATS_URL` - Publish domain events when set
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   outgoing mail; when `SMTP_HOST` is unset emails are only logged

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub otp_ttl_minutes: i64,
    /// Lower-cased emails that are granted the admin role at registration
    pub admin_emails: Vec<String>,
    pub currency: String,
    pub nats_url: Option<String>,
    pub email: Option<EmailConfig>,
}

/// Access token signing configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub ttl_hours: i64,
}

/// SMTP configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = parse_env("HOST", "0.0.0.0")?;
        let port = parse_env("PORT", "8083")?;

        let secret = get_required_env("JWT_SECRET")?;
        validate_jwt_secret(&secret)?;
        let jwt = JwtConfig { secret: SecretString::from(secret), ttl_hours: parse_env("JWT_TTL_HOURS", "24")? };
        if jwt.ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar("JWT_TTL_HOURS".into(), "must be positive".into()));
        }

        let otp_ttl_minutes = parse_env("OTP_TTL_MINUTES", "10")?;
        let admin_emails = parse_email_list(&get_env_or_default("ADMIN_EMAILS", ""));
        let currency = get_env_or_default("CURRENCY", "USD").to_uppercase();
        let nats_url = get_optional_env("NATS_URL");
        let email = EmailConfig::from_env()?;

        Ok(Self { database_url, host, port, jwt, otp_ttl_minutes, admin_emails, currency, nats_url, email })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether registering with this email grants the admin role.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InvalidEnvVar(
            "JWT_SECRET".into(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
        ));
    }
    Ok(())
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()).collect()
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_list() {
        assert_eq!(parse_email_list(" Root@Example.com, ,ops@example.com "), vec!["root@example.com", "ops@example.com"]);
        assert!(parse_email_list("").is_empty());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        assert!(validate_jwt_secret("short").is_err());
        assert!(validate_jwt_secret(&"k".repeat(32)).is_ok());
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_username: "mailer".into(),
            smtp_password: SecretString::from("hunter2hunter2".to_string()),
            from_address: "shop@example.com".into(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
