use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use reveille_models::alarm::AlarmTime;

fn one_day_after(datetime: NaiveDateTime) -> NaiveDateTime {
    datetime
        .checked_add_signed(TimeDelta::days(1))
        .expect("Not realistic to overflow")
}

/// Moves a saved alarm time that is at or before `now` exactly one day forward.
pub fn roll_forward(time: AlarmTime, now: NaiveDateTime) -> AlarmTime {
    if time.datetime() <= now {
        AlarmTime::new(one_day_after(time.datetime()))
    } else {
        time
    }
}

/// The first instant strictly after `now` whose time of day is `time_of_day`.
pub fn next_occurrence(time_of_day: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(time_of_day);
    if today > now {
        today
    } else {
        one_day_after(today)
    }
}

/// When a freshly scheduled alarm rings for the first time: at its saved time
/// if that is still ahead, otherwise at the next matching hour and minute.
pub fn first_fire_at(time: AlarmTime, now: NaiveDateTime) -> NaiveDateTime {
    if time.datetime() > now {
        time.datetime()
    } else {
        next_occurrence(time.time_of_day(), now)
    }
}

pub fn delay_until(target: NaiveDateTime, now: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
