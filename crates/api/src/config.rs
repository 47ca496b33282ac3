use std::str::FromStr;

use fleetwise_notify::EmailConfig;

use crate::auth::jwt::TokenConfig;

/// Startup configuration failures. Any of these halts the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set and non-empty")]
    Missing(&'static str),

    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the token secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8087`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on a single session store call in milliseconds (default: `5000`).
    pub store_timeout_ms: u64,
    /// Whether the session cookie carries the `Secure` attribute (default: `false`).
    pub cookie_secure: bool,
    /// Token signing configuration (secret, lifetime).
    pub token: TokenConfig,
    /// SMTP settings; `None` disables outbound email.
    pub email: Option<EmailConfig>,
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost,http://localhost:5173,http://localhost:8081";

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                                      |
    /// |------------------------|--------------------------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                                    |
    /// | `PORT`                 | `8087`                                                       |
    /// | `CORS_ORIGINS`         | `http://localhost,http://localhost:5173,http://localhost:8081` |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                                         |
    /// | `STORE_TIMEOUT_MS`     | `5000`                                                       |
    /// | `COOKIE_SECURE`        | `false`                                                      |
    ///
    /// Token settings come from [`TokenConfig::from_env`] and email settings
    /// from [`EmailConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("PORT", 8087u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let store_timeout_ms = env_or("STORE_TIMEOUT_MS", 5000u64)?;
        let cookie_secure = env_or("COOKIE_SECURE", false)?;

        let token = TokenConfig::from_env()?;
        let email = EmailConfig::from_env();
        if email.is_none() {
            tracing::info!("Email service disabled; verification emails will not be sent");
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            store_timeout_ms,
            cookie_secure,
            token,
            email,
        })
    }
}

/// Parse `var` if set, otherwise fall back to `default`.
fn env_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}
