mod re_alert_tests;

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use proptest::test_runner::TestCaseError;
use reveille_models::alarm::{Alarm, AlarmId, AlarmTime, SoundType};

/// Wall-clock time every virtual clock in these tests starts at.
fn origin() -> NaiveDateTime {
    at(2025, 5, 31, 8, 0)
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
}

fn alarm_at(id: &str, hour: u32, minute: u32) -> Alarm {
    Alarm {
        id: AlarmId::from(id),
        time: AlarmTime::new(origin().date().and_hms_opt(hour, minute, 0).unwrap()),
        label: "Wake up".to_owned(),
        is_active: true,
        sound_type: SoundType::Radar,
        sound_url: None,
    }
}

fn tokio_ct(future: impl Future<Output = Result<(), TestCaseError>>) -> Result<(), TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

async fn wait(duration: Duration) {
    tokio::time::sleep(duration + Duration::from_secs(1)).await;
}
