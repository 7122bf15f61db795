//! Configuration loaded once from the environment.

use abl_partida::{Branding, DEFAULT_BASE_URL, DEFAULT_NAVIGATION_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// SMTP relay settings. The connection always uses implicit TLS.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub bcc: Option<String>,
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("from", &self.from)
            .field("bcc", &self.bcc)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub branding: Branding,
    pub smtp: SmtpConfig,
    pub base_url: Url,
    pub chrome_path: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub request_timeout: Duration,
    /// `None` leaves concurrently open pages unbounded.
    pub max_open_pages: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let smtp = SmtpConfig {
            host: require("SMTP_HOST")?,
            port: parse_or(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            user: require("SMTP_USER")?,
            pass: require("SMTP_PASS")?,
            from: require("SMTP_FROM")?,
            bcc: get("SMTP_BCC"),
            accept_invalid_certs: parse_flag(get("SMTP_ACCEPT_INVALID_CERTS"), "SMTP_ACCEPT_INVALID_CERTS")?,
        };

        let base_url = match get("CATASTRO_BASE_URL") {
            Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                name: "CATASTRO_BASE_URL",
                reason: e.to_string(),
            })?,
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| ConfigError::Invalid {
                name: "CATASTRO_BASE_URL",
                reason: e.to_string(),
            })?,
        };

        let max_open_pages = match get("MAX_OPEN_PAGES") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_OPEN_PAGES",
                        reason: format!("expected a positive integer, got {raw:?}"),
                    })
                }
                Ok(n) => Some(n),
            },
            None => None,
        };

        Ok(Self {
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            branding: Branding {
                logo_url: get("LOGO_URL").unwrap_or_default(),
                reference_url: get("REFERENCE_URL").unwrap_or_default(),
            },
            smtp,
            base_url,
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
            navigation_timeout: secs_or(
                get("NAVIGATION_TIMEOUT_SECS"),
                "NAVIGATION_TIMEOUT_SECS",
                DEFAULT_NAVIGATION_TIMEOUT,
            )?,
            request_timeout: secs_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            max_open_pages,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn secs_or(raw: Option<String>, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(raw, name, default.as_secs()).map(Duration::from_secs)
}

fn parse_flag(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got {v:?}"),
            }),
        },
    }
}
