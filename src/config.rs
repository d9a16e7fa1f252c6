use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be a valid number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("EMAIL_HOST, EMAIL_USER and EMAIL_PASS must be set together")]
    IncompleteSmtp,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub razorpay: RazorpayConfig,
    /// `None` when no SMTP relay is configured; emails are then only logged.
    pub smtp: Option<SmtpConfig>,
    /// Operator address for new-order notifications.
    pub admin_email: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let port = |name: &'static str, default: u16| match get(name) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber { name, value }),
            None => Ok(default),
        };

        let smtp = match (get("EMAIL_HOST"), get("EMAIL_USER"), get("EMAIL_PASS")) {
            (Some(host), Some(user), Some(password)) => Some(SmtpConfig {
                host,
                port: port("EMAIL_PORT", 587)?,
                from: get("EMAIL_FROM").unwrap_or_else(|| user.clone()),
                user,
                password,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::IncompleteSmtp),
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: port("PORT", 8080)?,
            jwt_secret: require("JWT_SECRET")?,
            razorpay: RazorpayConfig {
                key_id: require("RAZORPAY_KEY_ID")?,
                key_secret: require("RAZORPAY_KEY_SECRET")?,
                api_base: get("RAZORPAY_API_BASE")
                    .unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
            },
            smtp,
            admin_email: get("ADMIN_EMAIL"),
        })
    }
}
