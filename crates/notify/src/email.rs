//! Email delivery via SMTP.
//!
//! [`EmailNotifier`] wraps the `lettre` async SMTP transport to send the
//! account-verification message. Configuration is loaded from environment
//! variables; if the service is not enabled or `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and no notifier is constructed.

use std::sync::Arc;

use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "FleetWise <noreply@fleetwise.local>";

/// Default web application origin used to build links.
const DEFAULT_APP_URL: &str = "http://localhost:5173";

/// Path of the public email verification endpoint.
pub const VERIFY_PATH: &str = "/api/v1/verify";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Origin prefixed to links placed in messages.
    pub app_url: String,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless `EMAIL_SERVICE_ENABLED=true` and `SMTP_HOST` is
    /// set, signalling that email delivery should be skipped.
    ///
    /// | Variable                | Required | Default                               |
    /// |-------------------------|----------|---------------------------------------|
    /// | `EMAIL_SERVICE_ENABLED` | yes      | --                                    |
    /// | `SMTP_HOST`             | yes      | --                                    |
    /// | `SMTP_PORT`             | no       | `587`                                 |
    /// | `SMTP_FROM`             | no       | `FleetWise <noreply@fleetwise.local>` |
    /// | `SMTP_USER`             | no       | --                                    |
    /// | `SMTP_PASSWORD`         | no       | --                                    |
    /// | `APP_URL`               | no       | `http://localhost:5173`               |
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var("EMAIL_SERVICE_ENABLED").ok()?;
        if enabled != "true" {
            tracing::debug!("Email service flag is off; notifications are disabled");
            return None;
        }
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailMessage
// ---------------------------------------------------------------------------

/// A rendered message ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub plain_text: String,
    pub html: String,
}

impl EmailMessage {
    /// Build the "verify your email address" message.
    ///
    /// `token` is a signed token whose subject is the user id; the link points
    /// at the public verification endpoint.
    pub fn verification(to: &str, app_url: &str, token: &str) -> Self {
        let link = format!("{}{VERIFY_PATH}?token={token}", app_url.trim_end_matches('/'));
        Self {
            to: to.to_string(),
            subject: "Verify your email address for FleetWise Application".to_string(),
            plain_text: format!("Please open the following link to verify your email address: {link}"),
            html: format!(
                "<p>Click on the following link to verify your email address:</p>\n<a href=\"{link}\">{link}</a>"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// EmailNotifier
// ---------------------------------------------------------------------------

/// Sends account emails via SMTP.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    /// Create a new notifier with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    /// Send a message and wait for the SMTP server to accept it.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(message.to.parse()?)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.plain_text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(to = %message.to, subject = %message.subject, "Notification email sent");
        Ok(())
    }

    /// Send in a background task. Failures are logged and never surfaced.
    pub fn spawn(self: &Arc<Self>, message: EmailMessage) {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&message).await {
                tracing::warn!(to = %message.to, error = %e, "Failed to send notification email");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
