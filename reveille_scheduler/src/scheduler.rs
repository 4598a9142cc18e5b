use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use reveille_models::{
    alarm::{Alarm, AlarmId},
    settings::{DEFAULT_RE_ALERT_INTERVAL_SECS, Settings},
};
use tokio::sync::watch;

use crate::{
    clock::Clock,
    notification::{
        AuthorizationStatus, NotificationError, NotificationRequest, NotificationService,
        alarm_identifiers,
    },
    re_alert::{AlarmLoopContext, AlarmLoopHandle, AlarmLoopState},
    sound::{SoundPlayer, resolve_sound},
};

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub re_alert_interval: Duration,
    pub assets_dir: PathBuf,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            re_alert_interval: Duration::from_secs(DEFAULT_RE_ALERT_INTERVAL_SECS),
            assets_dir: PathBuf::from("sounds"),
        }
    }
}

impl From<&Settings> for SchedulerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            re_alert_interval: settings.scheduler.re_alert_interval(),
            assets_dir: settings.sound.assets_dir.clone(),
        }
    }
}

/// Keeps exactly one registered notification and one ringing loop per
/// scheduled alarm.
pub struct NotificationScheduler {
    notifications: Arc<dyn NotificationService>,
    sound_player: Arc<dyn SoundPlayer>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    loops: HashMap<AlarmId, AlarmLoopHandle>,
    pending: Vec<NotificationRequest>,
}

impl NotificationScheduler {
    pub fn new(
        notifications: Arc<dyn NotificationService>,
        sound_player: Arc<dyn SoundPlayer>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            notifications,
            sound_player,
            clock,
            options,
            loops: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Registers the alarm's daily notification and arms its ringing loop,
    /// superseding any earlier registration for the same alarm. Failures are
    /// logged and the alarm stays unscheduled.
    pub async fn schedule(&mut self, alarm: &Alarm) {
        if let Some(existing) = self.loops.remove(&alarm.id) {
            log::info!("Superseding ringing loop for alarm {}", alarm.id);
            existing.cancel().await;
        }

        match self.notifications.add(NotificationRequest::primary(alarm)).await {
            Ok(()) => {
                log::info!(
                    "Notification registered for alarm {} daily at {:02}:{:02}",
                    alarm.id,
                    alarm.time.hour(),
                    alarm.time.minute()
                );

                let handle = AlarmLoopHandle::spawn(AlarmLoopContext {
                    alarm: alarm.clone(),
                    sound: resolve_sound(alarm, &self.options.assets_dir),
                    re_alert_interval: self.options.re_alert_interval,
                    notifications: Arc::clone(&self.notifications),
                    sound_player: Arc::clone(&self.sound_player),
                    clock: Arc::clone(&self.clock),
                });
                self.loops.insert(alarm.id.clone(), handle);
            }
            Err(e) => {
                log::error!("Failed to register notification for alarm {}: {e}", alarm.id);
            }
        }

        self.refresh_pending().await;
    }

    /// Ends the alarm's ringing loop, then removes every pending and
    /// delivered notification of the alarm.
    pub async fn cancel(&mut self, alarm_id: &AlarmId) {
        match self.loops.remove(alarm_id) {
            Some(handle) => {
                handle.cancel().await;
                log::info!("Cancelled alarm {alarm_id}");
            }
            None => log::info!("No ringing loop recorded for alarm {alarm_id}, nothing to cancel"),
        }

        let identifiers = alarm_identifiers(alarm_id);
        self.notifications.remove_pending(&identifiers).await;
        self.notifications.remove_delivered(&identifiers).await;

        self.refresh_pending().await;
    }

    /// Silences a ringing alarm. Returns `false` when it was not ringing.
    pub async fn stop(&mut self, alarm_id: &AlarmId) -> bool {
        match self.loops.get(alarm_id) {
            Some(handle) => handle.stop().await,
            None => {
                log::info!("No ringing loop recorded for alarm {alarm_id}, nothing to stop");
                false
            }
        }
    }

    pub fn is_scheduled(&self, alarm_id: &AlarmId) -> bool {
        self.loops.contains_key(alarm_id)
    }

    pub fn loop_state(&self, alarm_id: &AlarmId) -> Option<AlarmLoopState> {
        self.loops.get(alarm_id).map(AlarmLoopHandle::state)
    }

    pub fn watch_loop(&self, alarm_id: &AlarmId) -> Option<watch::Receiver<AlarmLoopState>> {
        self.loops.get(alarm_id).map(AlarmLoopHandle::watch)
    }

    /// Last fetched view of the service's pending requests.
    pub fn pending_requests(&self) -> &[NotificationRequest] {
        &self.pending
    }

    pub async fn refresh_pending(&mut self) {
        self.pending = self.notifications.pending_requests().await;
    }

    pub async fn request_authorization(&self) -> Result<AuthorizationStatus, NotificationError> {
        self.notifications.request_authorization().await
    }

    pub async fn authorization_status(&self) -> AuthorizationStatus {
        self.notifications.authorization_status().await
    }

    pub async fn shutdown(&mut self) {
        let loops: Vec<_> = self.loops.drain().map(|(_, handle)| handle).collect();
        for handle in loops {
            handle.cancel().await;
        }
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        for handle in self.loops.values() {
            handle.abort();
        }
    }
}
