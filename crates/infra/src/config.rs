//! Configuration loading and representation.
//!
//! Everything is read from `PADMIGRATE_*` environment variables. Only the
//! endpoints with no sensible local default are required.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use padmigrate_core::DEFAULT_DOMAIN_ID;
use padmigrate_migration::MigrationSettings;
use padmigrate_migration::context::LEGACY_ASSET_PREFIX;

use crate::external::{HttpAssetStoreConfig, SmtpConfig};
use crate::jobs::DispatcherConfig;
use crate::redis::queue::DEFAULT_KEY_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub redis_url: String,
    pub queue_prefix: String,
    pub max_concurrent: usize,
    pub block_timeout: Duration,

    pub mysql_url: String,
    pub mysql_max_connections: u32,

    pub client_id_dir: PathBuf,
    pub client_id_key: String,

    pub api_url: String,
    pub asset_endpoint: String,
    pub asset_public_url: String,
    pub asset_token: Option<String>,
    pub legacy_asset_prefix: String,
    pub http_timeout: Duration,

    pub work_dir: PathBuf,
    pub domain_id: i64,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub mail_from: String,
    pub operator_email: String,
    pub bcc: Option<String>,
    pub login_url: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = MigrationSettings::default();

        let asset_endpoint = env.required("PADMIGRATE_ASSET_ENDPOINT")?;
        let max_concurrent = env.parse("PADMIGRATE_CONCURRENCY", 4usize)?;
        if max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                key: "PADMIGRATE_CONCURRENCY",
                value: "0".to_string(),
                reason: "at least one worker is needed".to_string(),
            });
        }

        Ok(Self {
            redis_url: env.string("PADMIGRATE_REDIS_URL", "redis://127.0.0.1:6379"),
            queue_prefix: env.string("PADMIGRATE_QUEUE_PREFIX", DEFAULT_KEY_PREFIX),
            max_concurrent,
            block_timeout: Duration::from_secs(env.parse("PADMIGRATE_BLOCK_TIMEOUT_SECS", 5)?),

            mysql_url: env.string(
                "PADMIGRATE_MYSQL_URL",
                "mysql://root@127.0.0.1:3306/hackpad_dev",
            ),
            mysql_max_connections: env.parse("PADMIGRATE_MYSQL_MAX_CONNECTIONS", 8)?,

            client_id_dir: PathBuf::from(env.string("PADMIGRATE_CLIENT_ID_DIR", "clientids")),
            client_id_key: env.required("PADMIGRATE_CLIENT_ID_KEY")?,

            api_url: env.required("PADMIGRATE_API_URL")?,
            asset_public_url: env
                .optional("PADMIGRATE_ASSET_PUBLIC_URL")
                .unwrap_or_else(|| asset_endpoint.clone()),
            asset_endpoint,
            asset_token: env.optional("PADMIGRATE_ASSET_TOKEN"),
            legacy_asset_prefix: env.string("PADMIGRATE_LEGACY_ASSET_PREFIX", LEGACY_ASSET_PREFIX),
            http_timeout: Duration::from_secs(env.parse("PADMIGRATE_HTTP_TIMEOUT_SECS", 30)?),

            work_dir: PathBuf::from(env.string("PADMIGRATE_WORK_DIR", "work")),
            domain_id: env.parse("PADMIGRATE_DOMAIN_ID", DEFAULT_DOMAIN_ID)?,

            smtp_host: env.string("PADMIGRATE_SMTP_HOST", "localhost"),
            smtp_port: env.parse("PADMIGRATE_SMTP_PORT", 25)?,
            smtp_user: env.optional("PADMIGRATE_SMTP_USER"),
            smtp_password: env.optional("PADMIGRATE_SMTP_PASSWORD"),
            smtp_starttls: env.flag("PADMIGRATE_SMTP_STARTTLS", false)?,
            mail_from: env.string("PADMIGRATE_MAIL_FROM", &defaults.mail_from),
            operator_email: env.string("PADMIGRATE_OPERATOR_EMAIL", &defaults.operator_email),
            bcc: env.optional("PADMIGRATE_MAIL_BCC"),
            login_url: env.string("PADMIGRATE_LOGIN_URL", &defaults.login_url),
        })
    }

    pub fn migration_settings(&self) -> MigrationSettings {
        MigrationSettings {
            domain_id: self.domain_id,
            legacy_asset_prefix: self.legacy_asset_prefix.clone(),
            mail_from: self.mail_from.clone(),
            operator_email: self.operator_email.clone(),
            bcc: self.bcc.clone(),
            login_url: self.login_url.clone(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_max_concurrent(self.max_concurrent)
            .with_block_timeout(self.block_timeout)
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_user.clone(),
            password: self.smtp_password.clone(),
            starttls: self.smtp_starttls,
            timeout: self.http_timeout,
        }
    }

    pub fn asset_store_config(&self) -> HttpAssetStoreConfig {
        HttpAssetStoreConfig {
            endpoint: self.asset_endpoint.clone(),
            public_url: self.asset_public_url.clone(),
            auth_token: self.asset_token.clone(),
            timeout: self.http_timeout,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(value) => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
