//! Engine configuration
//!
//! Loaded from a TOML file; a missing file means defaults. The webhook URL
//! can also come from the `TALLY_WEBHOOK_URL` environment variable, which
//! wins over the file.
//!
//! ```toml
//! [schedule]
//! daily_at = "00:00"
//! alert_interval_hours = 6
//!
//! [alerts]
//! suppress_repeats = false
//! notify_timeout_secs = 30
//!
//! [notify]
//! webhook_url = "https://example.com/hook"
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::alerts::AlertConfig;
use crate::error::{Error, Result};
use crate::notify::WEBHOOK_URL_ENV;
use crate::scheduler::ScheduleConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleSection,
    pub alerts: AlertsSection,
    pub notify: NotifySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Local wall-clock time of the daily sweep, "HH:MM" or "HH:MM:SS"
    pub daily_at: String,
    pub alert_interval_hours: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            daily_at: "00:00".to_string(),
            alert_interval_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    pub suppress_repeats: bool,
    pub notify_timeout_secs: u64,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            suppress_repeats: false,
            notify_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// Unset or empty means notifications are skipped
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides (currently just the webhook URL)
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            if !url.is_empty() {
                self.notify.webhook_url = Some(url);
            }
        }
    }

    /// Parsed daily sweep time
    pub fn daily_at(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.schedule.daily_at, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.schedule.daily_at, "%H:%M:%S"))
            .map_err(|_| {
                Error::Config(format!(
                    "schedule.daily_at '{}' is not a valid HH:MM time",
                    self.schedule.daily_at
                ))
            })
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.alerts.notify_timeout_secs)
    }

    /// Scheduler cadence derived from this config
    pub fn schedule_config(&self) -> Result<ScheduleConfig> {
        if self.schedule.alert_interval_hours == 0 {
            return Err(Error::Config(
                "schedule.alert_interval_hours must be at least 1".to_string(),
            ));
        }
        Ok(ScheduleConfig {
            daily_at: self.daily_at()?,
            alert_interval_hours: self.schedule.alert_interval_hours,
        })
    }

    /// Alert sweep tunables derived from this config
    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            suppress_repeats: self.alerts.suppress_repeats,
            notify_timeout: self.notify_timeout(),
        }
    }

    /// Webhook endpoint, if configured
    pub fn webhook_url(&self) -> Option<&str> {
        self.notify
            .webhook_url
            .as_deref()
            .filter(|u| !u.is_empty())
    }
}
