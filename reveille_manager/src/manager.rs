use std::sync::Arc;

use reveille_models::{
    alarm::{Alarm, AlarmEdit, AlarmId, NewAlarm, default_label},
    chrono::NaiveDateTime,
};
use reveille_scheduler::{
    AlarmLoopState, AuthorizationStatus, Clock, NotificationEvent, NotificationRequest,
    NotificationScheduler,
    fire_time::roll_forward,
    notification::{STOP_ACTION, primary_identifier},
};
use reveille_storage::AlarmRepository;
use tokio::sync::broadcast;

use crate::alert::RingingAlert;

const ALERT_CHANNEL_CAPACITY: usize = 16;

/// Single entry point for every alarm mutation. Keeps the stored alarms, the
/// registered notifications and the ringing loops consistent with each other.
pub struct AlarmManager {
    repository: AlarmRepository,
    scheduler: NotificationScheduler,
    clock: Arc<dyn Clock>,
    authorization: Option<AuthorizationStatus>,
    ringing: Option<RingingAlert>,
    alerts: broadcast::Sender<RingingAlert>,
}

impl AlarmManager {
    pub fn new(
        repository: AlarmRepository,
        scheduler: NotificationScheduler,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            repository,
            scheduler,
            clock,
            authorization: None,
            ringing: None,
            alerts,
        }
    }

    /// Stores and schedules a new active alarm. A time at or before now is
    /// moved to the next day and a blank label gets a numbered default.
    pub async fn create(&mut self, new_alarm: NewAlarm) -> Alarm {
        let now = self.clock.now();
        let label = if new_alarm.label.trim().is_empty() {
            default_label(self.repository.len())
        } else {
            new_alarm.label
        };

        let alarm = Alarm {
            id: AlarmId::generate(),
            time: roll_forward(new_alarm.time, now),
            label,
            is_active: true,
            sound_type: new_alarm.sound_type,
            sound_url: new_alarm.sound_url,
        };
        log::info!(
            "Created alarm {} \"{}\" for {}",
            alarm.id,
            alarm.label,
            alarm.time.datetime()
        );

        self.repository.mutate(|alarms| alarms.push(alarm.clone()));
        self.persist().await;
        self.scheduler.schedule(&alarm).await;

        alarm
    }

    pub async fn update(&mut self, id: &AlarmId, edit: AlarmEdit) -> Option<Alarm> {
        let now = self.clock.now();
        let updated = self.repository.update(id, |alarm| {
            alarm.time = edit.time;
            if !edit.label.trim().is_empty() {
                alarm.label = edit.label;
            }
            alarm.sound_type = edit.sound_type;
            alarm.sound_url = edit.sound_url;
            if alarm.is_active {
                alarm.time = roll_forward(alarm.time, now);
            }
            alarm.clone()
        });

        let Some(alarm) = updated else {
            log::info!("No alarm {id} to update");
            return None;
        };

        self.scheduler.cancel(id).await;
        self.clear_ringing(id);
        if alarm.is_active {
            self.scheduler.schedule(&alarm).await;
        }
        self.persist().await;

        log::info!("Updated alarm {id}");
        Some(alarm)
    }

    /// Returns `false` for an unknown id.
    pub async fn disable(&mut self, id: &AlarmId) -> bool {
        if self.repository.update(id, |alarm| alarm.is_active = false).is_none() {
            log::info!("No alarm {id} to disable");
            return false;
        }

        self.persist().await;
        self.scheduler.cancel(id).await;
        self.clear_ringing(id);

        log::info!("Disabled alarm {id}");
        true
    }

    pub async fn enable(&mut self, id: &AlarmId) -> bool {
        let now = self.clock.now();
        self.enable_at(id, now).await
    }

    /// Activates the alarm as of `now`. Returns `false` for an unknown id or
    /// an alarm that is already active, both of which change nothing.
    pub async fn enable_at(&mut self, id: &AlarmId, now: NaiveDateTime) -> bool {
        match self.repository.get(id) {
            None => {
                log::info!("No alarm {id} to enable");
                return false;
            }
            Some(alarm) if alarm.is_active => {
                log::info!("Alarm {id} is already active");
                return false;
            }
            Some(_) => {}
        }

        let Some(alarm) = self.repository.update(id, |alarm| {
            alarm.is_active = true;
            alarm.time = roll_forward(alarm.time, now);
            alarm.clone()
        }) else {
            return false;
        };

        self.persist().await;
        self.scheduler.schedule(&alarm).await;

        log::info!("Enabled alarm {id} for {}", alarm.time.datetime());
        true
    }

    pub async fn set_active(&mut self, id: &AlarmId, active: bool) -> bool {
        if active {
            self.enable(id).await
        } else {
            self.disable(id).await
        }
    }

    /// Silences the alarm's ringing loop. Returns whether it was ringing.
    pub async fn stop_ringing(&mut self, id: &AlarmId) -> bool {
        let stopped = self.scheduler.stop(id).await;
        self.clear_ringing(id);
        stopped
    }

    /// Surfaces a delivered or answered notification as the ringing alarm.
    /// Events for alarms that are unknown, inactive or no longer ringing are
    /// dropped.
    pub async fn handle_notification_event(&mut self, event: NotificationEvent) {
        let alert = RingingAlert::from(&event);
        if !self.is_ringing(event.request()) {
            log::info!(
                "Ignoring notification {} for alarm {}, it is not ringing",
                event.request().identifier,
                alert.alarm_id
            );
            return;
        }
        log::info!("Alarm {} is ringing: {}", alert.alarm_id, alert.body);

        self.ringing = Some(alert.clone());
        if self.alerts.send(alert.clone()).is_err() {
            log::debug!("No subscribers for ringing alarm {}", alert.alarm_id);
        }

        if let NotificationEvent::Responded {
            action: Some(action),
            ..
        } = &event
        {
            if action == STOP_ACTION {
                self.stop_ringing(&alert.alarm_id).await;
            }
        }
    }

    pub async fn request_authorization(&mut self) -> AuthorizationStatus {
        let status = match self.scheduler.request_authorization().await {
            Ok(status) => status,
            Err(e) => {
                log::error!("Failed to request notification authorization: {e}");
                self.scheduler.authorization_status().await
            }
        };

        if !status.is_authorized() {
            log::warn!("Notifications are not authorized ({status:?}), alarms will not ring");
        }
        self.authorization = Some(status);
        status
    }

    pub async fn refresh_authorization(&mut self) -> AuthorizationStatus {
        let status = self.scheduler.authorization_status().await;
        self.authorization = Some(status);
        status
    }

    pub async fn on_foreground(&mut self) {
        self.refresh_authorization().await;
        self.scheduler.refresh_pending().await;
    }

    /// Re-registers every active alarm, as done once at start-up.
    pub async fn restore(&mut self) {
        let active: Vec<Alarm> = self
            .repository
            .alarms()
            .iter()
            .filter(|alarm| alarm.is_active)
            .cloned()
            .collect();

        log::info!(
            "Restoring {} active alarm(s) out of {}",
            active.len(),
            self.repository.len()
        );
        for alarm in &active {
            self.scheduler.schedule(alarm).await;
        }
    }

    pub async fn shutdown(&mut self) {
        self.scheduler.shutdown().await;
        self.ringing = None;
    }

    pub fn alarms(&self) -> &[Alarm] {
        self.repository.alarms()
    }

    pub fn alarm(&self, id: &AlarmId) -> Option<&Alarm> {
        self.repository.get(id)
    }

    pub fn ringing(&self) -> Option<&RingingAlert> {
        self.ringing.as_ref()
    }

    /// `None` until authorization has been requested or refreshed.
    pub fn authorization(&self) -> Option<AuthorizationStatus> {
        self.authorization
    }

    pub fn pending_requests(&self) -> &[NotificationRequest] {
        self.scheduler.pending_requests()
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RingingAlert> {
        self.alerts.subscribe()
    }

    /// A primary notification may be delivered just before its loop handles
    /// `Fire`, so it is also accepted while the loop is still scheduled.
    fn is_ringing(&self, request: &NotificationRequest) -> bool {
        let id = &request.content.alarm_id;
        if !self.repository.get(id).is_some_and(|alarm| alarm.is_active) {
            return false;
        }

        match self.scheduler.loop_state(id) {
            Some(AlarmLoopState::Ringing { .. }) => true,
            Some(AlarmLoopState::Scheduled { .. }) => request.identifier == primary_identifier(id),
            _ => false,
        }
    }

    fn clear_ringing(&mut self, id: &AlarmId) {
        if self.ringing.as_ref().is_some_and(|alert| &alert.alarm_id == id) {
            self.ringing = None;
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.repository.persist().await {
            log::error!("Failed to persist alarms: {e}");
        }
    }
}
