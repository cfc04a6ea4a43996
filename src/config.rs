use chrono_tz::Tz;
use cron::Schedule;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid cron expression.
    InvalidCron { expr: String, source: cron::error::Error },
    /// Unknown IANA timezone name.
    InvalidTimezone(String),
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidCron { expr, source } => {
                write!(f, "invalid cron expression '{}': {}", expr, source)
            }
            Self::InvalidTimezone(name) => write!(f, "unknown timezone '{}'", name),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidCron { source, .. } => Some(source),
            Self::InvalidTimezone(_) => None,
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Path to the SQLite database. Defaults to "meterbot.db".
    database_path: Option<String>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    /// Cron expression (7 fields, with seconds and years) for reminder
    /// checks. Defaults to the top of every hour.
    reminder_cron: Option<String>,
    /// Seconds between receipt delivery checks.
    #[serde(default = "default_receipt_poll_secs")]
    receipt_poll_secs: u64,
    /// IANA timezone the monthly reminders are anchored in.
    timezone: Option<String>,
    /// Local hour of day (0-23) reminders are scheduled at.
    #[serde(default = "default_reminder_hour")]
    reminder_hour: u32,
}

fn default_receipt_poll_secs() -> u64 {
    60
}

fn default_reminder_hour() -> u32 {
    9
}

const DEFAULT_REMINDER_CRON: &str = "0 0 * * * * *";
const DEFAULT_TIMEZONE: &str = "Asia/Phnom_Penh";

pub struct Config {
    pub telegram_bot_token: String,
    pub database_path: PathBuf,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    /// How often to check for due reminders.
    pub reminder_schedule: Schedule,
    /// How often to check for deliverable receipts.
    pub receipt_poll_interval: Duration,
    /// Timezone the monthly reminder dates are computed in.
    pub timezone: Tz,
    /// Local hour of day reminders are scheduled at.
    pub reminder_hour: u32,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        // Validate required fields
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        if file.reminder_hour > 23 {
            return Err(ConfigError::Validation("reminder_hour must be between 0 and 23".into()));
        }
        if file.receipt_poll_secs == 0 {
            return Err(ConfigError::Validation("receipt_poll_secs must be at least 1".into()));
        }

        let cron_expr = file.reminder_cron.unwrap_or_else(|| DEFAULT_REMINDER_CRON.to_string());
        let reminder_schedule = Schedule::from_str(&cron_expr)
            .map_err(|e| ConfigError::InvalidCron { expr: cron_expr, source: e })?;

        let tz_name = file.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name))?;

        let database_path = file
            .database_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("meterbot.db"));
        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            database_path,
            data_dir,
            reminder_schedule,
            receipt_poll_interval: Duration::from_secs(file.receipt_poll_secs),
            timezone,
            reminder_hour: file.reminder_hour,
        })
    }
}
