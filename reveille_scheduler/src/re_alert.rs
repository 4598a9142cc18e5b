//! Per-alarm ringing loop.
//!
//! Each scheduled alarm gets one task that owns its timers and reacts to
//! events on a channel:
//!
//! ```text
//! Scheduled --Fire--> Ringing --Nag--> Ringing
//!     ^                  |
//!     |                 Stop
//!     |                  v
//!     +------Fire----- Stopped          (any) --Cancel--> Cancelled
//! ```
//!
//! At most one delayed event is armed at a time. Arming a new one drops the
//! previous one, which cancels it.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDateTime;
use reveille_models::alarm::Alarm;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    clock::Clock,
    delayed_task::DelayedTask,
    fire_time::{delay_until, first_fire_at, next_occurrence},
    notification::{NotificationRequest, NotificationService, nag_identifier, primary_identifier},
    sound::{SoundPlayer, SoundSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmLoopState {
    Scheduled { fire_at: NaiveDateTime },
    Ringing { nags_sent: u32 },
    Stopped { next_fire_at: NaiveDateTime },
    Cancelled,
}

impl AlarmLoopState {
    pub fn is_ringing(&self) -> bool {
        matches!(self, AlarmLoopState::Ringing { .. })
    }
}

#[derive(Debug)]
enum AlarmEvent {
    Fire,
    Nag,
    Stop(oneshot::Sender<bool>),
    Cancel,
}

pub(crate) struct AlarmLoopContext {
    pub(crate) alarm: Alarm,
    pub(crate) sound: SoundSource,
    pub(crate) re_alert_interval: Duration,
    pub(crate) notifications: Arc<dyn NotificationService>,
    pub(crate) sound_player: Arc<dyn SoundPlayer>,
    pub(crate) clock: Arc<dyn Clock>,
}

pub(crate) struct AlarmLoopHandle {
    task: JoinHandle<()>,
    tx: mpsc::Sender<AlarmEvent>,
    state: watch::Receiver<AlarmLoopState>,
}

impl AlarmLoopHandle {
    pub(crate) fn spawn(ctx: AlarmLoopContext) -> Self {
        let fire_at = first_fire_at(ctx.alarm.time, ctx.clock.now());
        let (tx, rx) = mpsc::channel(16);
        let (state_tx, state) = watch::channel(AlarmLoopState::Scheduled { fire_at });

        let task = tokio::spawn(run_alarm_loop(ctx, fire_at, rx, tx.clone(), state_tx));

        Self { task, tx, state }
    }

    pub(crate) fn state(&self) -> AlarmLoopState {
        *self.state.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<AlarmLoopState> {
        self.state.clone()
    }

    /// Returns whether the alarm was ringing and got stopped.
    pub(crate) async fn stop(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(AlarmEvent::Stop(reply_tx)).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub(crate) async fn cancel(self) {
        if self.tx.send(AlarmEvent::Cancel).await.is_ok() {
            let _ = self.task.await;
        } else {
            self.task.abort();
        }
    }

    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

async fn run_alarm_loop(
    ctx: AlarmLoopContext,
    fire_at: NaiveDateTime,
    mut rx: mpsc::Receiver<AlarmEvent>,
    tx: mpsc::Sender<AlarmEvent>,
    state_tx: watch::Sender<AlarmLoopState>,
) {
    let delay = delay_until(fire_at, ctx.clock.now());
    log::info!(
        "[SCHEDULE] Alarm {} fires at {fire_at}, sleeping for {delay:?}",
        ctx.alarm.id
    );

    let mut armed = Some(DelayedTask::send_after(delay, tx.clone(), AlarmEvent::Fire));
    let mut state = AlarmLoopState::Scheduled { fire_at };

    while let Some(event) = rx.recv().await {
        let cancelled = matches!(event, AlarmEvent::Cancel);
        state = handle_event(&ctx, state, event, &tx, &mut armed).await;
        state_tx.send_replace(state);
        if cancelled {
            break;
        }
    }
}

async fn handle_event(
    ctx: &AlarmLoopContext,
    current_state: AlarmLoopState,
    event: AlarmEvent,
    tx: &mpsc::Sender<AlarmEvent>,
    armed: &mut Option<DelayedTask>,
) -> AlarmLoopState {
    let id = &ctx.alarm.id;
    match (current_state, event) {
        (AlarmLoopState::Scheduled { .. } | AlarmLoopState::Stopped { .. }, AlarmEvent::Fire) => {
            if let Err(e) = ctx.sound_player.play_looping(id, &ctx.sound) {
                log::error!("Failed to play {} for alarm {id}: {e:#}", ctx.sound);
            }

            log::info!(
                "[RINGING] Alarm {id} is ringing, re-alerting every {:?}",
                ctx.re_alert_interval
            );

            *armed = Some(DelayedTask::send_after(
                ctx.re_alert_interval,
                tx.clone(),
                AlarmEvent::Nag,
            ));

            AlarmLoopState::Ringing { nags_sent: 0 }
        }
        (AlarmLoopState::Ringing { nags_sent }, AlarmEvent::Nag) => {
            match ctx.notifications.add(NotificationRequest::nag(&ctx.alarm)).await {
                Ok(()) => log::info!("[NAG] Re-alert #{} issued for alarm {id}", nags_sent + 1),
                Err(e) => log::warn!("[NAG] Failed to issue re-alert for alarm {id}: {e}"),
            }

            *armed = Some(DelayedTask::send_after(
                ctx.re_alert_interval,
                tx.clone(),
                AlarmEvent::Nag,
            ));

            AlarmLoopState::Ringing {
                nags_sent: nags_sent + 1,
            }
        }
        (AlarmLoopState::Ringing { .. }, AlarmEvent::Stop(reply)) => {
            armed.take();
            ctx.sound_player.stop(id);

            let nag = [nag_identifier(id)];
            ctx.notifications.remove_pending(&nag).await;
            ctx.notifications
                .remove_delivered(&[primary_identifier(id), nag_identifier(id)])
                .await;

            let now = ctx.clock.now();
            let next_fire_at = next_occurrence(ctx.alarm.time.time_of_day(), now);
            *armed = Some(DelayedTask::send_after(
                delay_until(next_fire_at, now),
                tx.clone(),
                AlarmEvent::Fire,
            ));

            log::info!("[STOP] Alarm {id} stopped, next fire at {next_fire_at}");
            let _ = reply.send(true);

            AlarmLoopState::Stopped { next_fire_at }
        }
        (state, AlarmEvent::Stop(reply)) => {
            log::info!("Alarm {id} is not ringing, nothing to stop. [state = {state:?}]");
            let _ = reply.send(false);
            state
        }
        (state, AlarmEvent::Cancel) => {
            armed.take();
            if state.is_ringing() {
                ctx.sound_player.stop(id);
            }
            log::info!("[CANCEL] Ringing loop for alarm {id} cancelled. [state = {state:?}]");
            AlarmLoopState::Cancelled
        }
        (state, event) => {
            log::warn!(
                "Received unknown state and event combination for alarm. [state = {state:?}, event = {event:?}, alarm_id = {id}]"
            );
            state
        }
    }
}
