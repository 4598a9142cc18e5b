use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

pub const DEFAULT_ALARMS_KEY: &str = "Alarms List";
pub const DEFAULT_RE_ALERT_INTERVAL_SECS: u64 = 7;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub alarms_key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            alarms_key: DEFAULT_ALARMS_KEY.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
    pub re_alert_interval_secs: u64,
}

impl SchedulerSettings {
    pub fn re_alert_interval(&self) -> Duration {
        Duration::from_secs(self.re_alert_interval_secs.max(1))
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            re_alert_interval_secs: DEFAULT_RE_ALERT_INTERVAL_SECS,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SoundSettings {
    pub assets_dir: PathBuf,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("sounds"),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NotificationSettings {
    pub auto_authorize: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            auto_authorize: true,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClockSettings {
    /// IANA zone name. The host's local zone is used when absent.
    pub timezone: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub scheduler: SchedulerSettings,
    pub sound: SoundSettings,
    pub notifications: NotificationSettings,
    pub clock: ClockSettings,
}
