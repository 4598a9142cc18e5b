use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    fire_time::{delay_until, next_occurrence},
    notification::{
        AuthorizationStatus, NotificationError, NotificationEvent, NotificationRequest,
        NotificationService, NotificationTrigger,
    },
};

struct PendingEntry {
    request: NotificationRequest,
    generation: u64,
    cancellation_token: CancellationToken,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

#[derive(Default)]
struct CenterState {
    authorization: AuthorizationStatus,
    pending: HashMap<String, PendingEntry>,
    delivered: Vec<NotificationRequest>,
    next_generation: u64,
}

type SharedState = Arc<Mutex<CenterState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, CenterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process notification service. Pending requests are delivered by tokio
/// timers and reported as [`NotificationEvent`]s on the channel returned by
/// [`LocalNotificationCenter::new`].
pub struct LocalNotificationCenter {
    state: SharedState,
    events: mpsc::UnboundedSender<NotificationEvent>,
    clock: Arc<dyn Clock>,
    grant_on_request: bool,
}

impl LocalNotificationCenter {
    pub fn new(
        clock: Arc<dyn Clock>,
        grant_on_request: bool,
    ) -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let center = Self {
            state: Arc::default(),
            events,
            clock,
            grant_on_request,
        };

        (center, rx)
    }

    /// Simulates the user acting on a delivered notification.
    pub fn respond(&self, identifier: &str, action: Option<&str>) -> bool {
        let request = lock(&self.state)
            .delivered
            .iter()
            .find(|request| request.identifier == identifier)
            .cloned();

        match request {
            Some(request) => {
                let _ = self.events.send(NotificationEvent::Responded {
                    request,
                    action: action.map(str::to_owned),
                });
                true
            }
            None => {
                log::warn!("No delivered notification {identifier} to respond to");
                false
            }
        }
    }

    fn arm(&self, request: NotificationRequest, generation: u64) -> CancellationToken {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let clock = Arc::clone(&self.clock);

        tokio::spawn(async move {
            deliver_when_due(
                state,
                events,
                clock,
                request,
                generation,
                task_cancellation_token,
            )
            .await
        });

        cancellation_token
    }
}

fn next_delivery_delay(trigger: &NotificationTrigger, now: NaiveDateTime) -> Option<Duration> {
    match trigger {
        NotificationTrigger::Calendar { hour, minute, .. } => {
            let time_of_day = NaiveTime::from_hms_opt(*hour, *minute, 0)?;
            Some(delay_until(next_occurrence(time_of_day, now), now))
        }
        NotificationTrigger::TimeInterval { interval, .. } => Some(*interval),
    }
}

async fn deliver_when_due(
    state: SharedState,
    events: mpsc::UnboundedSender<NotificationEvent>,
    clock: Arc<dyn Clock>,
    request: NotificationRequest,
    generation: u64,
    cancellation_token: CancellationToken,
) {
    loop {
        let Some(delay) = next_delivery_delay(&request.trigger, clock.now()) else {
            log::warn!(
                "Notification {} has an invalid trigger {:?}, it will never be delivered",
                request.identifier,
                request.trigger
            );
            return;
        };

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let repeats = request.trigger.repeats() && !delay.is_zero();
        {
            let mut state = lock(&state);
            let owns_entry = state
                .pending
                .get(&request.identifier)
                .is_some_and(|entry| entry.generation == generation);
            if !owns_entry {
                log::debug!(
                    "Notification {} was removed or replaced before delivery",
                    request.identifier
                );
                return;
            }

            state
                .delivered
                .retain(|delivered| delivered.identifier != request.identifier);
            state.delivered.push(request.clone());
            if !repeats {
                state.pending.remove(&request.identifier);
            }
        }

        log::info!("Delivered notification {}", request.identifier);
        let _ = events.send(NotificationEvent::WillPresent(request.clone()));

        if !repeats {
            return;
        }
    }
}

#[async_trait]
impl NotificationService for LocalNotificationCenter {
    async fn request_authorization(&self) -> Result<AuthorizationStatus, NotificationError> {
        let status = if self.grant_on_request {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        lock(&self.state).authorization = status;
        log::info!("Notification authorization: {status:?}");
        Ok(status)
    }

    async fn authorization_status(&self) -> AuthorizationStatus {
        lock(&self.state).authorization
    }

    async fn add(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        let mut state = lock(&self.state);
        if !state.authorization.is_authorized() {
            return Err(NotificationError::NotAuthorized);
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let identifier = request.identifier.clone();
        let cancellation_token = self.arm(request.clone(), generation);
        state.pending.insert(
            identifier,
            PendingEntry {
                request,
                generation,
                cancellation_token,
            },
        );

        Ok(())
    }

    async fn pending_requests(&self) -> Vec<NotificationRequest> {
        let mut pending: Vec<_> = lock(&self.state)
            .pending
            .values()
            .map(|entry| entry.request.clone())
            .collect();
        pending.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        pending
    }

    async fn delivered_notifications(&self) -> Vec<NotificationRequest> {
        lock(&self.state).delivered.clone()
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        let mut state = lock(&self.state);
        for identifier in identifiers {
            state.pending.remove(identifier);
        }
    }

    async fn remove_delivered(&self, identifiers: &[String]) {
        lock(&self.state)
            .delivered
            .retain(|delivered| !identifiers.contains(&delivered.identifier));
    }
}
