use lettre::message::Mailbox;
use std::fmt::Display;

const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP relay settings, read once at process start from the hosting
/// environment and passed into the handler.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    /// Sender mailbox, derived from `SMTP_USER`.
    pub sender: Mailbox,
    /// Fixed destination for every submission, from `EMAIL_TO`.
    pub recipient: Mailbox,
    pub tls_mode: TlsMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// Upgrade the connection via STARTTLS before authenticating. The default.
    StartTls,
    /// Plaintext transport without authentication. Only test harnesses
    /// running a local fake SMTP server should select this.
    None,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp_user = require("SMTP_USER")?;
        let Ok(sender) = smtp_user.parse() else {
            return Err(ConfigError::InvalidVariable("SMTP_USER", smtp_user));
        };
        let recipient_raw = require("EMAIL_TO")?;
        let Ok(recipient) = recipient_raw.parse() else {
            return Err(ConfigError::InvalidVariable("EMAIL_TO", recipient_raw));
        };
        let smtp_port = match std::env::var("SMTP_PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidVariable("SMTP_PORT", value))?,
            Err(_) => DEFAULT_SMTP_PORT,
        };
        let tls_mode = match std::env::var("SMTP_TLS") {
            Ok(value) => match value.as_str() {
                "starttls" => TlsMode::StartTls,
                "none" => TlsMode::None,
                _ => return Err(ConfigError::InvalidVariable("SMTP_TLS", value)),
            },
            Err(_) => TlsMode::StartTls,
        };
        Ok(Self {
            smtp_host: require("SMTP_HOST")?,
            smtp_port,
            smtp_user,
            smtp_password: require("SMTP_PASSWORD")?,
            sender,
            recipient,
            tls_mode,
        })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVariable(key)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(&'static str),
    InvalidVariable(&'static str, String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(key) => {
                write!(f, "Missing environment variable {key}")
            }
            ConfigError::InvalidVariable(key, value) => {
                write!(f, "Invalid value {value:?} for environment variable {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
