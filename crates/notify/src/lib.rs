//! Outbound email for FleetWise account flows.
//!
//! - [`EmailConfig`] -- SMTP settings loaded from the environment.
//! - [`EmailNotifier`] -- renders and sends verification / reset messages.
//!
//! Sends are fire-and-forget from the caller's point of view: use
//! [`EmailNotifier::spawn`] so a slow or failing SMTP server never delays
//! or fails an HTTP response.

pub mod email;

pub use email::{EmailConfig, EmailError, EmailMessage, EmailNotifier};
