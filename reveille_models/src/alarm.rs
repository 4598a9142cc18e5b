use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(String);

impl AlarmId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AlarmId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AlarmId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Wall-clock instant an alarm is set for, truncated to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "NaiveDateTime", into = "NaiveDateTime")]
pub struct AlarmTime(NaiveDateTime);

impl AlarmTime {
    pub fn new(inner: NaiveDateTime) -> Self {
        let normalized = inner
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .expect("Will never fail.");
        Self(normalized)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.0.time()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl From<NaiveDateTime> for AlarmTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::new(value)
    }
}

impl From<AlarmTime> for NaiveDateTime {
    fn from(value: AlarmTime) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    #[default]
    Radar,
    Youtube,
}

impl SoundType {
    pub const ALL: [SoundType; 2] = [SoundType::Radar, SoundType::Youtube];

    pub fn display_name(&self) -> &'static str {
        match self {
            SoundType::Radar => "Radar",
            SoundType::Youtube => "YouTube",
        }
    }

    /// Whether the sound comes from the alarm's `sound_url` rather than a bundled asset.
    pub fn uses_custom_source(&self) -> bool {
        matches!(self, SoundType::Youtube)
    }

    pub fn bundled_asset(&self) -> Option<&'static str> {
        match self {
            SoundType::Radar => Some("radar.mp3"),
            SoundType::Youtube => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: AlarmId,
    pub time: AlarmTime,
    pub label: String,
    pub is_active: bool,
    pub sound_type: SoundType,
    #[serde(rename = "soundURL", default, skip_serializing_if = "Option::is_none")]
    pub sound_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAlarm {
    pub time: AlarmTime,
    pub label: String,
    pub sound_type: SoundType,
    pub sound_url: Option<String>,
}

impl NewAlarm {
    pub fn at(time: NaiveDateTime) -> Self {
        Self {
            time: AlarmTime::new(time),
            label: String::new(),
            sound_type: SoundType::default(),
            sound_url: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_sound(mut self, sound_type: SoundType, sound_url: Option<String>) -> Self {
        self.sound_type = sound_type;
        self.sound_url = sound_url;
        self
    }
}

/// Contents of the edit form. Every field is applied, except that an empty
/// label keeps the alarm's current one.
#[derive(Debug, Clone)]
pub struct AlarmEdit {
    pub time: AlarmTime,
    pub label: String,
    pub sound_type: SoundType,
    pub sound_url: Option<String>,
}

impl AlarmEdit {
    pub fn from_alarm(alarm: &Alarm) -> Self {
        Self {
            time: alarm.time,
            label: alarm.label.clone(),
            sound_type: alarm.sound_type,
            sound_url: alarm.sound_url.clone(),
        }
    }
}

pub fn default_label(existing_alarms: usize) -> String {
    format!("Alarm {}", existing_alarms + 1)
}
