//! Configuration types, built from environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default attachment size ceiling: 5 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Media types accepted for the uploaded résumé when none are configured.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Where staged attachments live until dispatch settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingPolicy {
    /// Buffer the upload in memory. No filesystem footprint, nothing to clean up.
    Memory,
    /// Persist the upload under a uniquely named file in `dir`.
    /// The directory is created on first use; deletion of staged files belongs
    /// to the submission processor, not the stager.
    Disk { dir: PathBuf },
}

/// Whether the HTTP response waits for the delivery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Respond only once the transport has accepted or rejected the message.
    Synchronous,
    /// Respond immediately after validation; dispatch runs as a tracked
    /// background task whose outcome is visible only in logs.
    Deferred,
}

/// Intake service configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// SMTP relay hostname.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// Mail account identifier (also the default sender and recipient).
    pub mail_user: String,
    /// Mail account credential.
    pub mail_pass: SecretString,
    /// Where submissions are delivered.
    pub recipient: String,
    /// HTTP listen port.
    pub listen_port: u16,
    /// Attachment size ceiling in bytes.
    pub max_attachment_bytes: u64,
    /// Allowed attachment media types.
    pub allowed_media_types: Vec<String>,
    pub staging: StagingPolicy,
    pub response_policy: ResponsePolicy,
}

impl IntakeConfig {
    /// Build config from environment variables.
    ///
    /// `EMAIL_USER` and `EMAIL_PASS` are required; everything else defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build config from an explicit variable map (separated out so tests can
    /// exercise parsing without touching the process environment).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mail_user = require(vars, "EMAIL_USER")?;
        let mail_pass = SecretString::from(require(vars, "EMAIL_PASS")?);

        let smtp_host = vars
            .get("SMTP_HOST")
            .cloned()
            .unwrap_or_else(|| "smtp.gmail.com".to_string());
        let smtp_port = parse_or(vars, "SMTP_PORT", 587)?;

        let recipient = vars
            .get("INTAKE_RECIPIENT")
            .cloned()
            .unwrap_or_else(|| mail_user.clone());

        let listen_port = parse_or(vars, "PORT", 5000)?;
        let max_attachment_bytes =
            parse_or(vars, "INTAKE_MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES)?;

        let allowed_media_types: Vec<String> = match vars.get("INTAKE_ALLOWED_TYPES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
        };
        if allowed_media_types.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_ALLOWED_TYPES".into(),
                message: "allow-list must not be empty".into(),
            });
        }

        let staging = match vars.get("INTAKE_STAGING_DIR") {
            Some(dir) if !dir.trim().is_empty() => StagingPolicy::Disk {
                dir: PathBuf::from(dir.trim()),
            },
            _ => StagingPolicy::Memory,
        };

        let response_policy = match vars.get("INTAKE_DEFERRED_DELIVERY").map(String::as_str) {
            Some("true") | Some("1") | Some("yes") => ResponsePolicy::Deferred,
            _ => ResponsePolicy::Synchronous,
        };

        Ok(Self {
            smtp_host,
            smtp_port,
            mail_user,
            mail_pass,
            recipient,
            listen_port,
            max_attachment_bytes,
            allowed_media_types,
            staging,
            response_policy,
        })
    }
}

fn require(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an optional variable, erroring on a present-but-unparsable value
/// rather than silently falling back.
fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
    }
}
