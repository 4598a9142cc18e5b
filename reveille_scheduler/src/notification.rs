use std::time::Duration;

use async_trait::async_trait;
use reveille_models::alarm::{Alarm, AlarmId};
use thiserror::Error;

pub const NOTIFICATION_TITLE: &str = "Alarm";
pub const ALARM_CATEGORY: &str = "ALARM_CATEGORY";
pub const STOP_ACTION: &str = "STOP_ACTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTrigger {
    /// Fires whenever the wall clock reaches `hour:minute`.
    Calendar { hour: u32, minute: u32, repeats: bool },
    /// Fires `interval` after registration. A zero interval delivers right away.
    TimeInterval { interval: Duration, repeats: bool },
}

impl NotificationTrigger {
    pub fn repeats(&self) -> bool {
        match self {
            NotificationTrigger::Calendar { repeats, .. }
            | NotificationTrigger::TimeInterval { repeats, .. } => *repeats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub category: String,
    pub alarm_id: AlarmId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: NotificationTrigger,
}

impl NotificationRequest {
    /// The daily request that rings the alarm at its hour and minute.
    pub fn primary(alarm: &Alarm) -> Self {
        Self {
            identifier: primary_identifier(&alarm.id),
            content: content_for(alarm),
            trigger: NotificationTrigger::Calendar {
                hour: alarm.time.hour(),
                minute: alarm.time.minute(),
                repeats: true,
            },
        }
    }

    /// One-shot re-alert issued while the alarm keeps ringing.
    pub fn nag(alarm: &Alarm) -> Self {
        Self {
            identifier: nag_identifier(&alarm.id),
            content: content_for(alarm),
            trigger: NotificationTrigger::TimeInterval {
                interval: Duration::ZERO,
                repeats: false,
            },
        }
    }
}

fn content_for(alarm: &Alarm) -> NotificationContent {
    NotificationContent {
        title: NOTIFICATION_TITLE.to_owned(),
        body: alarm.label.clone(),
        category: ALARM_CATEGORY.to_owned(),
        alarm_id: alarm.id.clone(),
    }
}

pub fn primary_identifier(alarm_id: &AlarmId) -> String {
    alarm_id.to_string()
}

pub fn nag_identifier(alarm_id: &AlarmId) -> String {
    format!("{alarm_id}.nag")
}

/// Every request identifier an alarm may have registered.
pub fn alarm_identifiers(alarm_id: &AlarmId) -> Vec<String> {
    vec![primary_identifier(alarm_id), nag_identifier(alarm_id)]
}

/// Callbacks from the notification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A notification was delivered while the application is in the foreground.
    WillPresent(NotificationRequest),
    /// The user interacted with a delivered notification.
    Responded {
        request: NotificationRequest,
        action: Option<String>,
    },
}

impl NotificationEvent {
    pub fn request(&self) -> &NotificationRequest {
        match self {
            NotificationEvent::WillPresent(request)
            | NotificationEvent::Responded { request, .. } => request,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notifications are not authorized")]
    NotAuthorized,

    #[error("Notification request {identifier} was rejected: {reason}")]
    Rejected { identifier: String, reason: String },
}

/// The platform service that owns pending and delivered notifications.
#[async_trait]
pub trait NotificationService: Send + Sync + 'static {
    async fn request_authorization(&self) -> Result<AuthorizationStatus, NotificationError>;
    async fn authorization_status(&self) -> AuthorizationStatus;

    /// Registers `request`, replacing any pending request with the same identifier.
    async fn add(&self, request: NotificationRequest) -> Result<(), NotificationError>;

    async fn pending_requests(&self) -> Vec<NotificationRequest>;
    async fn delivered_notifications(&self) -> Vec<NotificationRequest>;
    async fn remove_pending(&self, identifiers: &[String]);
    async fn remove_delivered(&self, identifiers: &[String]);
}
