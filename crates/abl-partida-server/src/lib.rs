//! ABL partida HTTP service: answers tax-record lookups for a coordinate,
//! directly or by email.

pub mod config;
pub mod mail;
pub mod rest;

pub use config::{AppConfig, ConfigError, SmtpConfig};
pub use mail::{MailError, Mailer, SmtpMailer};
pub use rest::{router, AppState};
