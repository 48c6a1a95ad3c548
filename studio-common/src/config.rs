//! Configuration loading for the booking service
//!
//! Every key resolves independently in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::schedule::BusinessHours;
use crate::{Error, Result};
use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5740;
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_STUDIO_NAME: &str = "Studio";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_FROM_EMAIL: &str = "bookings@localhost";
pub const DEFAULT_FROM_NAME: &str = "Studio Bookings";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// On-disk TOML layout; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub site_url: Option<String>,
    pub studio_name: Option<String>,
    pub admin_emails: Option<Vec<String>>,
    pub admin_notification_email: Option<String>,
    pub cron_secret: Option<String>,
    pub smtp: TomlSmtpConfig,
    pub schedule: TomlScheduleConfig,
    pub logging: TomlLoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlSmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlScheduleConfig {
    pub timezone: Option<String>,
    pub utc_offset_minutes: Option<i32>,
    pub business_start: Option<String>,
    pub business_end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlLoggingConfig {
    pub level: Option<String>,
}

/// SMTP relay settings; `host == None` selects the logging transport
#[derive(Clone, Default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

// Password stays out of logs
impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// IANA zone name handed to calendar providers
    pub timezone: String,
    pub utc_offset_minutes: i32,
    pub business_start: NaiveTime,
    pub business_end: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let defaults = BusinessHours::default();
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            utc_offset_minutes: 0,
            business_start: defaults.start,
            business_end: defaults.end,
        }
    }
}

impl ScheduleConfig {
    /// Offset used for every human-facing date and time
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| BusinessHours::default().utc_offset)
    }

    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours {
            start: self.business_start,
            end: self.business_end,
            utc_offset: self.display_offset(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Fully resolved service configuration
#[derive(Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub site_url: String,
    pub studio_name: String,
    /// Lower-cased admin allowlist
    pub admin_emails: Vec<String>,
    pub admin_notification_email: Option<String>,
    pub cron_secret: Option<String>,
    pub smtp: SmtpConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("site_url", &self.site_url)
            .field("studio_name", &self.studio_name)
            .field("admin_emails", &self.admin_emails)
            .field("admin_notification_email", &self.admin_notification_email)
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "<redacted>"))
            .field("smtp", &self.smtp)
            .field("schedule", &self.schedule)
            .field("logging", &self.logging)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            site_url: DEFAULT_SITE_URL.to_string(),
            studio_name: DEFAULT_STUDIO_NAME.to_string(),
            admin_emails: Vec::new(),
            admin_notification_email: None,
            cron_secret: None,
            smtp: SmtpConfig {
                port: DEFAULT_SMTP_PORT,
                from_email: DEFAULT_FROM_EMAIL.to_string(),
                from_name: DEFAULT_FROM_NAME.to_string(),
                ..SmtpConfig::default()
            },
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI overrides, the process environment
    /// and the TOML file located by [`locate_config_file`]
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let toml = match locate_config_file(overrides.config_file.as_deref()) {
            Some(path) => load_toml_file(&path)?,
            None => {
                debug!("No config file found, using environment and defaults");
                TomlConfig::default()
            }
        };

        Self::from_sources(overrides, &|name| std::env::var(name).ok(), &toml)
    }

    /// Resolve configuration from explicit sources
    ///
    /// `env` looks up one environment variable by name; empty values are
    /// treated as unset.
    pub fn from_sources(
        overrides: &ConfigOverrides,
        env: &dyn Fn(&str) -> Option<String>,
        toml: &TomlConfig,
    ) -> Result<Self> {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| env("STUDIO_DATABASE_PATH").map(PathBuf::from))
            .or_else(|| toml.database_path.clone())
            .unwrap_or(defaults.database_path);

        let host = overrides
            .host
            .clone()
            .or_else(|| env("STUDIO_HOST"))
            .or_else(|| toml.host.clone())
            .unwrap_or(defaults.host);

        let port = match overrides.port {
            Some(port) => port,
            None => match env("STUDIO_PORT") {
                Some(raw) => parse_port("STUDIO_PORT", &raw)?,
                None => toml.port.unwrap_or(defaults.port),
            },
        };

        let site_url = env("STUDIO_SITE_URL")
            .or_else(|| toml.site_url.clone())
            .unwrap_or(defaults.site_url)
            .trim_end_matches('/')
            .to_string();

        let studio_name = env("STUDIO_NAME")
            .or_else(|| toml.studio_name.clone())
            .unwrap_or(defaults.studio_name);

        let admin_emails = match env("STUDIO_ADMIN_EMAILS") {
            Some(raw) => parse_email_list(&raw),
            None => toml
                .admin_emails
                .as_ref()
                .map(|list| parse_email_list(&list.join(",")))
                .unwrap_or_default(),
        };

        let admin_notification_email = env("STUDIO_ADMIN_NOTIFICATION_EMAIL")
            .or_else(|| toml.admin_notification_email.clone())
            .map(|e| e.trim().to_string())
            .or_else(|| admin_emails.first().cloned());

        let cron_secret = env("STUDIO_CRON_SECRET").or_else(|| {
            toml.cron_secret
                .clone()
                .filter(|secret| !secret.trim().is_empty())
        });

        let smtp_port = match env("SMTP_PORT") {
            Some(raw) => parse_port("SMTP_PORT", &raw)?,
            None => toml.smtp.port.unwrap_or(DEFAULT_SMTP_PORT),
        };

        let smtp = SmtpConfig {
            host: env("SMTP_HOST").or_else(|| toml.smtp.host.clone()),
            port: smtp_port,
            username: env("SMTP_USERNAME").or_else(|| toml.smtp.username.clone()),
            password: env("SMTP_PASSWORD").or_else(|| toml.smtp.password.clone()),
            from_email: env("SMTP_FROM_EMAIL")
                .or_else(|| toml.smtp.from_email.clone())
                .unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
            from_name: env("SMTP_FROM_NAME")
                .or_else(|| toml.smtp.from_name.clone())
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
        };

        let utc_offset_minutes = match env("STUDIO_UTC_OFFSET_MINUTES") {
            Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                Error::Config(format!("STUDIO_UTC_OFFSET_MINUTES is not an integer: {}", raw))
            })?,
            None => toml.schedule.utc_offset_minutes.unwrap_or(0),
        };
        if utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::Config(format!(
                "UTC offset out of range: {} minutes",
                utc_offset_minutes
            )));
        }

        let business_start = match &toml.schedule.business_start {
            Some(raw) => parse_clock_time("schedule.business_start", raw)?,
            None => defaults.schedule.business_start,
        };
        let business_end = match &toml.schedule.business_end {
            Some(raw) => parse_clock_time("schedule.business_end", raw)?,
            None => defaults.schedule.business_end,
        };
        if business_end <= business_start {
            return Err(Error::Config(format!(
                "Business hours end ({}) must be after start ({})",
                business_end, business_start
            )));
        }

        let schedule = ScheduleConfig {
            timezone: env("STUDIO_TIMEZONE")
                .or_else(|| toml.schedule.timezone.clone())
                .unwrap_or(defaults.schedule.timezone),
            utc_offset_minutes,
            business_start,
            business_end,
        };

        let logging = LoggingConfig {
            level: overrides
                .log_level
                .clone()
                .or_else(|| toml.logging.level.clone())
                .unwrap_or(defaults.logging.level),
        };

        Ok(Self {
            database_path,
            host,
            port,
            site_url,
            studio_name,
            admin_emails,
            admin_notification_email,
            cron_secret,
            smtp,
            schedule,
            logging,
        })
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Host part of `site_url`, used to qualify calendar UIDs
    pub fn site_domain(&self) -> &str {
        let without_scheme = self
            .site_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.site_url);
        without_scheme
            .split(['/', ':'])
            .next()
            .filter(|h| !h.is_empty())
            .unwrap_or("localhost")
    }
}

/// Find the TOML file to read, if any
///
/// An explicit path (CLI) wins, then `STUDIO_CONFIG`, then the per-user
/// file, then the system-wide file.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("STUDIO_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("studio").join("booking.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/studio/booking.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Read and parse a TOML config file
///
/// A missing file is not an error: it logs a warning and yields an empty
/// config. A file that exists but fails to parse is an error.
pub fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("studio").join("studio.db"))
        .unwrap_or_else(|| PathBuf::from("./studio_data/studio.db"))
}

/// Split a comma-separated email list, trimming and lower-casing entries
pub fn parse_email_list(raw: &str) -> Vec<String> {
    let mut emails: Vec<String> = Vec::new();
    for entry in raw.split(',') {
        let email = entry.trim().to_lowercase();
        if !email.is_empty() && !emails.contains(&email) {
            emails.push(email);
        }
    }
    emails
}

fn parse_port(name: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| Error::Config(format!("{} is not a valid port: {}", name, raw)))
}

fn parse_clock_time(key: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| Error::Config(format!("{} must be HH:MM, got {:?}", key, raw)))
}
