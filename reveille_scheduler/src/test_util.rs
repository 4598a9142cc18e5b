//! Doubles for the scheduler's collaborators, shared with downstream crates
//! through the `test-util` feature.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use reveille_models::alarm::AlarmId;
use tokio::time::Instant;

use crate::{
    clock::Clock,
    notification::{
        AuthorizationStatus, NotificationError, NotificationRequest, NotificationService,
        NotificationTrigger, nag_identifier,
    },
    sound::{PlaybackOwner, SoundPlayer, SoundSource},
};

/// A wall clock that advances together with tokio's (possibly paused) clock.
pub struct VirtualClock {
    origin: NaiveDateTime,
    started: Instant,
}

impl VirtualClock {
    pub fn starting_at(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).expect("elapsed time fits in a TimeDelta");
        self.origin + elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundCall {
    Play(AlarmId, SoundSource),
    Stop(AlarmId),
}

#[derive(Default)]
pub struct RecordingSoundPlayer {
    owner: PlaybackOwner,
    calls: Mutex<Vec<SoundCall>>,
}

impl RecordingSoundPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SoundCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn play_count(&self, alarm_id: &AlarmId) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SoundCall::Play(id, _) if id == alarm_id))
            .count()
    }

    fn record(&self, call: SoundCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl SoundPlayer for RecordingSoundPlayer {
    fn play_looping(&self, alarm_id: &AlarmId, source: &SoundSource) -> anyhow::Result<()> {
        self.owner.claim(alarm_id);
        self.record(SoundCall::Play(alarm_id.clone(), source.clone()));
        Ok(())
    }

    fn stop(&self, alarm_id: &AlarmId) -> bool {
        let stopped = self.owner.release(alarm_id);
        if stopped {
            self.record(SoundCall::Stop(alarm_id.clone()));
        }
        stopped
    }

    fn now_playing(&self) -> Option<AlarmId> {
        self.owner.current()
    }
}

#[derive(Default)]
struct Recorded {
    authorization: AuthorizationStatus,
    grant_on_request: bool,
    added: Vec<NotificationRequest>,
    pending: Vec<NotificationRequest>,
    delivered: Vec<NotificationRequest>,
}

/// Notification service without timers: requests stay pending until
/// [`RecordingNotificationService::deliver`] is called, except immediate
/// one-shot requests, which are delivered on `add`.
pub struct RecordingNotificationService {
    state: Mutex<Recorded>,
}

impl RecordingNotificationService {
    pub fn authorized() -> Self {
        Self::with_status(AuthorizationStatus::Authorized, true)
    }

    pub fn with_status(authorization: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            state: Mutex::new(Recorded {
                authorization,
                grant_on_request,
                ..Recorded::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn added(&self) -> Vec<NotificationRequest> {
        self.lock().added.clone()
    }

    pub fn pending_identifiers(&self) -> Vec<String> {
        self.lock()
            .pending
            .iter()
            .map(|request| request.identifier.clone())
            .collect()
    }

    pub fn delivered_identifiers(&self) -> Vec<String> {
        self.lock()
            .delivered
            .iter()
            .map(|request| request.identifier.clone())
            .collect()
    }

    pub fn pending_request(&self, identifier: &str) -> Option<NotificationRequest> {
        self.lock()
            .pending
            .iter()
            .find(|request| request.identifier == identifier)
            .cloned()
    }

    pub fn nag_count(&self, alarm_id: &AlarmId) -> usize {
        let nag = nag_identifier(alarm_id);
        self.lock()
            .added
            .iter()
            .filter(|request| request.identifier == nag)
            .count()
    }

    /// Marks a pending request as delivered, as the platform would when its
    /// trigger fires.
    pub fn deliver(&self, identifier: &str) -> Option<NotificationRequest> {
        let mut state = self.lock();
        let position = state
            .pending
            .iter()
            .position(|request| request.identifier == identifier)?;

        let request = if state.pending[position].trigger.repeats() {
            state.pending[position].clone()
        } else {
            state.pending.remove(position)
        };
        upsert(&mut state.delivered, request.clone());
        Some(request)
    }
}

fn upsert(requests: &mut Vec<NotificationRequest>, request: NotificationRequest) {
    requests.retain(|existing| existing.identifier != request.identifier);
    requests.push(request);
}

fn is_immediate(trigger: &NotificationTrigger) -> bool {
    matches!(
        trigger,
        NotificationTrigger::TimeInterval { interval, repeats: false } if interval.is_zero()
    )
}

#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn request_authorization(&self) -> Result<AuthorizationStatus, NotificationError> {
        let mut state = self.lock();
        if state.grant_on_request {
            state.authorization = AuthorizationStatus::Authorized;
        } else {
            state.authorization = AuthorizationStatus::Denied;
        }
        Ok(state.authorization)
    }

    async fn authorization_status(&self) -> AuthorizationStatus {
        self.lock().authorization
    }

    async fn add(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        let mut state = self.lock();
        if !state.authorization.is_authorized() {
            return Err(NotificationError::NotAuthorized);
        }

        state.added.push(request.clone());
        if is_immediate(&request.trigger) {
            upsert(&mut state.delivered, request);
        } else {
            upsert(&mut state.pending, request);
        }
        Ok(())
    }

    async fn pending_requests(&self) -> Vec<NotificationRequest> {
        self.lock().pending.clone()
    }

    async fn delivered_notifications(&self) -> Vec<NotificationRequest> {
        self.lock().delivered.clone()
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        self.lock()
            .pending
            .retain(|request| !identifiers.contains(&request.identifier));
    }

    async fn remove_delivered(&self, identifiers: &[String]) {
        self.lock()
            .delivered
            .retain(|request| !identifiers.contains(&request.identifier));
    }
}
