use chrono::{Local, NaiveDateTime, Utc};
use reveille_models::chrono_tz::Tz;

/// Source of the current wall-clock time alarms are compared against.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    pub fn local() -> Self {
        Self { timezone: None }
    }

    pub fn in_timezone(timezone: Tz) -> Self {
        Self {
            timezone: Some(timezone),
        }
    }

    pub fn from_zone_name(name: Option<&str>) -> anyhow::Result<Self> {
        match name {
            None => Ok(Self::local()),
            Some(name) => {
                let timezone = name
                    .parse::<Tz>()
                    .map_err(|e| anyhow::anyhow!("Unknown timezone {name:?}: {e}"))?;
                Ok(Self::in_timezone(timezone))
            }
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}
