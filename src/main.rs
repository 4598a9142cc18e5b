mod appsettings;

use std::{pin::pin, sync::Arc};

use anyhow::Context;
use reveille_manager::AlarmManager;
use reveille_scheduler::{
    Clock, LocalNotificationCenter, LogSoundPlayer, NotificationScheduler, SchedulerOptions,
    SoundPlayer, SystemClock,
};
use reveille_storage::{AlarmRepository, AlarmStore, FileKeyValueStore};

#[cfg(feature = "audio")]
fn sound_player() -> Arc<dyn SoundPlayer> {
    match reveille_scheduler::sound::RodioSoundPlayer::spawn() {
        Ok(player) => Arc::new(player),
        Err(e) => {
            log::warn!("Audio output unavailable, alarm sounds will only be logged: {e:#}");
            Arc::new(LogSoundPlayer::new())
        }
    }
}

#[cfg(not(feature = "audio"))]
fn sound_player() -> Arc<dyn SoundPlayer> {
    Arc::new(LogSoundPlayer::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = appsettings::load().context("Failed to load settings")?;
    log::debug!("Loaded settings: {settings:?}");

    let clock: Arc<dyn Clock> =
        Arc::new(SystemClock::from_zone_name(settings.clock.timezone.as_deref())?);

    let kv = Arc::new(FileKeyValueStore::new(&settings.storage.data_dir));
    let store = AlarmStore::with_key(kv, settings.storage.alarms_key.clone());
    let repository = AlarmRepository::load(store).await;

    let (notification_center, mut notification_events) =
        LocalNotificationCenter::new(Arc::clone(&clock), settings.notifications.auto_authorize);
    let scheduler = NotificationScheduler::new(
        Arc::new(notification_center),
        sound_player(),
        Arc::clone(&clock),
        SchedulerOptions::from(&settings),
    );

    let mut manager = AlarmManager::new(repository, scheduler, clock);
    let mut alerts = manager.subscribe();

    manager.request_authorization().await;
    manager.restore().await;
    log::info!("Reveille is running with {} alarm(s)", manager.alarms().len());

    let mut shutdown = pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            Some(event) = notification_events.recv() => {
                manager.handle_notification_event(event).await;
            }
            Ok(alert) = alerts.recv() => {
                log::info!("[RINGING] {}: {}", alert.alarm_id, alert.body);
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    log::error!("Failed to listen for the shutdown signal: {e}");
                }
                break;
            }
        }
    }

    log::info!("Shutting down");
    manager.shutdown().await;

    Ok(())
}
