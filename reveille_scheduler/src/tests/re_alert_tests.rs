use std::{path::PathBuf, sync::Arc, time::Duration};

use proptest::prelude::*;
use reveille_models::alarm::{Alarm, AlarmId, AlarmTime};
use test_strategy::proptest;

use super::{alarm_at, at, origin, tokio_ct, wait};
use crate::{
    AlarmLoopState, LocalNotificationCenter, NotificationScheduler, NotificationTrigger,
    SchedulerOptions, SoundPlayer,
    fire_time::{delay_until, first_fire_at},
    notification::{AuthorizationStatus, NotificationService, nag_identifier, primary_identifier},
    sound::SoundSource,
    test_util::{RecordingNotificationService, RecordingSoundPlayer, SoundCall, VirtualClock},
};

const RE_ALERT_INTERVAL: Duration = Duration::from_secs(7);
const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);
const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

struct TestContext {
    pub notifications: Arc<RecordingNotificationService>,
    pub sound: Arc<RecordingSoundPlayer>,
    pub scheduler: NotificationScheduler,
}

impl TestContext {
    fn new() -> Self {
        Self::with_notifications(RecordingNotificationService::authorized())
    }

    fn with_notifications(notifications: RecordingNotificationService) -> Self {
        let notifications = Arc::new(notifications);
        let sound = Arc::new(RecordingSoundPlayer::new());
        let scheduler = NotificationScheduler::new(
            notifications.clone(),
            sound.clone(),
            Arc::new(VirtualClock::starting_at(origin())),
            SchedulerOptions::default(),
        );

        Self {
            notifications,
            sound,
            scheduler,
        }
    }

    /// Schedules `alarm` and waits until it has started ringing.
    async fn ringing(&mut self, alarm: &Alarm) {
        self.scheduler.schedule(alarm).await;
        wait(delay_until(first_fire_at(alarm.time, origin()), origin())).await;
    }
}

fn bundled_radar() -> SoundSource {
    SoundSource::Bundled(PathBuf::from("sounds").join("radar.mp3"))
}

#[tokio::test(start_paused = true)]
async fn scheduling_registers_a_daily_notification() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);

    ctx.scheduler.schedule(&alarm).await;

    let pending = ctx.scheduler.pending_requests();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].identifier, primary_identifier(&alarm.id));
    assert_eq!(pending[0].content.body, "Wake up");
    assert_eq!(
        pending[0].trigger,
        NotificationTrigger::Calendar {
            hour: 8,
            minute: 30,
            repeats: true
        }
    );
    assert_eq!(
        ctx.scheduler.loop_state(&alarm.id),
        Some(AlarmLoopState::Scheduled {
            fire_at: at(2025, 5, 31, 8, 30)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn alarm_rings_at_its_time() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.scheduler.schedule(&alarm).await;

    tokio::time::sleep(THIRTY_MINUTES - Duration::from_secs(1)).await;
    assert_eq!(ctx.sound.play_count(&alarm.id), 0, "Rang before its time");

    wait(Duration::from_secs(1)).await;
    assert_eq!(
        ctx.sound.calls(),
        vec![SoundCall::Play(alarm.id.clone(), bundled_radar())]
    );
    assert_eq!(
        ctx.scheduler.loop_state(&alarm.id),
        Some(AlarmLoopState::Ringing { nags_sent: 0 })
    );
}

#[tokio::test(start_paused = true)]
async fn ringing_alarm_re_alerts_every_interval() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;

    tokio::time::sleep(RE_ALERT_INTERVAL * 3).await;

    assert_eq!(ctx.notifications.nag_count(&alarm.id), 3);
    assert_eq!(
        ctx.scheduler.loop_state(&alarm.id),
        Some(AlarmLoopState::Ringing { nags_sent: 3 })
    );
    assert_eq!(ctx.sound.play_count(&alarm.id), 1, "Re-alerts must not restart playback");
}

#[tokio::test(start_paused = true)]
async fn stopping_silences_and_keeps_the_daily_notification() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;
    ctx.notifications.deliver(&primary_identifier(&alarm.id));
    wait(RE_ALERT_INTERVAL).await;

    let stopped = ctx.scheduler.stop(&alarm.id).await;

    assert!(stopped);
    assert_eq!(ctx.sound.calls().last(), Some(&SoundCall::Stop(alarm.id.clone())));
    assert_eq!(ctx.sound.now_playing(), None);
    assert!(ctx.notifications.delivered_identifiers().is_empty());
    assert_eq!(
        ctx.notifications.pending_identifiers(),
        vec![primary_identifier(&alarm.id)]
    );
    assert_eq!(
        ctx.scheduler.loop_state(&alarm.id),
        Some(AlarmLoopState::Stopped {
            next_fire_at: at(2025, 6, 1, 8, 30)
        })
    );

    let nags = ctx.notifications.nag_count(&alarm.id);
    wait(RE_ALERT_INTERVAL * 3).await;
    assert_eq!(ctx.notifications.nag_count(&alarm.id), nags, "Re-alerts continued after stop");
}

#[tokio::test(start_paused = true)]
async fn stopping_twice_is_a_no_op() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;

    assert!(ctx.scheduler.stop(&alarm.id).await);
    assert!(!ctx.scheduler.stop(&alarm.id).await);

    let stops = ctx
        .sound
        .calls()
        .iter()
        .filter(|call| matches!(call, SoundCall::Stop(_)))
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test(start_paused = true)]
async fn stopping_an_alarm_that_is_not_ringing_returns_false() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.scheduler.schedule(&alarm).await;

    assert!(!ctx.scheduler.stop(&alarm.id).await);
    assert!(!ctx.scheduler.stop(&AlarmId::from("unknown")).await);
}

#[tokio::test(start_paused = true)]
async fn stopped_alarm_rings_again_the_next_day() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;
    ctx.scheduler.stop(&alarm.id).await;

    wait(ONE_DAY).await;

    assert_eq!(ctx.sound.play_count(&alarm.id), 2);
    assert!(ctx.scheduler.loop_state(&alarm.id).unwrap().is_ringing());
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_ringing_alarm_removes_everything() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;
    ctx.notifications.deliver(&primary_identifier(&alarm.id));
    wait(RE_ALERT_INTERVAL).await;

    ctx.scheduler.cancel(&alarm.id).await;

    assert_eq!(ctx.sound.calls().last(), Some(&SoundCall::Stop(alarm.id.clone())));
    assert!(ctx.notifications.pending_identifiers().is_empty());
    assert!(ctx.notifications.delivered_identifiers().is_empty());
    assert!(ctx.scheduler.pending_requests().is_empty());
    assert!(!ctx.scheduler.is_scheduled(&alarm.id));

    let nags = ctx.notifications.nag_count(&alarm.id);
    wait(RE_ALERT_INTERVAL * 3).await;
    assert_eq!(ctx.notifications.nag_count(&alarm.id), nags);
}

#[tokio::test(start_paused = true)]
async fn cancelled_alarm_never_rings() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.scheduler.schedule(&alarm).await;

    ctx.scheduler.cancel(&alarm.id).await;
    ctx.scheduler.cancel(&alarm.id).await;
    wait(THIRTY_MINUTES).await;

    assert!(ctx.sound.calls().is_empty());
    assert!(ctx.notifications.pending_identifiers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unauthorized_alarm_is_not_scheduled() {
    let mut ctx = TestContext::with_notifications(RecordingNotificationService::with_status(
        AuthorizationStatus::NotDetermined,
        false,
    ));
    let alarm = alarm_at("morning", 8, 30);

    ctx.scheduler.schedule(&alarm).await;
    wait(THIRTY_MINUTES).await;

    assert!(!ctx.scheduler.is_scheduled(&alarm.id));
    assert!(ctx.scheduler.pending_requests().is_empty());
    assert!(ctx.sound.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rescheduling_supersedes_the_previous_registration() {
    let mut ctx = TestContext::new();
    let mut alarm = alarm_at("morning", 8, 30);
    ctx.scheduler.schedule(&alarm).await;

    alarm.label = "Gym".to_owned();
    alarm.time = AlarmTime::new(at(2025, 5, 31, 9, 0));
    ctx.scheduler.schedule(&alarm).await;

    let pending = ctx.notifications.pending_identifiers();
    assert_eq!(pending, vec![primary_identifier(&alarm.id)]);
    let request = ctx
        .notifications
        .pending_request(&primary_identifier(&alarm.id))
        .unwrap();
    assert_eq!(request.content.body, "Gym");

    wait(THIRTY_MINUTES).await;
    assert_eq!(ctx.sound.play_count(&alarm.id), 0, "The superseded loop still rang");

    wait(THIRTY_MINUTES).await;
    assert_eq!(ctx.sound.play_count(&alarm.id), 1);
}

#[tokio::test(start_paused = true)]
async fn second_alarm_takes_over_playback() {
    let mut ctx = TestContext::new();
    let first = alarm_at("first", 8, 30);
    let second = alarm_at("second", 8, 31);
    ctx.scheduler.schedule(&first).await;
    ctx.scheduler.schedule(&second).await;

    wait(THIRTY_MINUTES + Duration::from_secs(60)).await;
    assert_eq!(ctx.sound.now_playing(), Some(second.id.clone()));

    assert!(ctx.scheduler.stop(&first.id).await);
    assert_eq!(ctx.sound.now_playing(), Some(second.id.clone()));
    assert!(!ctx.sound.calls().contains(&SoundCall::Stop(first.id.clone())));
}

#[tokio::test(start_paused = true)]
async fn nags_use_their_own_identifier() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;

    wait(RE_ALERT_INTERVAL).await;

    let nag = ctx.notifications.added().into_iter().last().unwrap();
    assert_eq!(nag.identifier, nag_identifier(&alarm.id));
    assert!(!nag.trigger.repeats());
}

#[tokio::test(start_paused = true)]
async fn shutdown_ends_every_loop() {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("morning", 8, 30);
    ctx.ringing(&alarm).await;

    ctx.scheduler.shutdown().await;

    assert!(!ctx.scheduler.is_scheduled(&alarm.id));
    assert_eq!(ctx.sound.now_playing(), None);
}

#[proptest(async = tokio_ct)]
async fn alarm_rings_for_any_time_of_day(
    #[strategy(0..24u32)] hours: u32,
    #[strategy(0..60u32)] minutes: u32,
) {
    let mut ctx = TestContext::new();
    let alarm = alarm_at("any", hours, minutes);

    ctx.ringing(&alarm).await;

    prop_assert_eq!(ctx.sound.play_count(&alarm.id), 1);
    prop_assert!(ctx.scheduler.loop_state(&alarm.id).unwrap().is_ringing());
}

#[tokio::test(start_paused = true)]
async fn cancelling_on_a_re_alert_tick_leaves_nothing_behind() {
    let clock = Arc::new(VirtualClock::starting_at(origin()));
    let (center, mut events) = LocalNotificationCenter::new(clock.clone(), true);
    let center = Arc::new(center);
    center.request_authorization().await.unwrap();
    let mut scheduler = NotificationScheduler::new(
        center.clone(),
        Arc::new(RecordingSoundPlayer::new()),
        clock,
        SchedulerOptions::default(),
    );
    let alarm = alarm_at("morning", 8, 30);

    scheduler.schedule(&alarm).await;
    tokio::time::sleep(THIRTY_MINUTES + RE_ALERT_INTERVAL * 2).await;
    scheduler.cancel(&alarm.id).await;
    while events.try_recv().is_ok() {}

    wait(RE_ALERT_INTERVAL * 3).await;

    assert!(center.pending_requests().await.is_empty());
    assert!(center.delivered_notifications().await.is_empty());
    assert!(events.try_recv().is_err(), "Delivered a notification after cancel");
}
