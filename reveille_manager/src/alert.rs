use reveille_models::alarm::AlarmId;
use reveille_scheduler::NotificationEvent;

/// An alarm currently ringing, as surfaced to whatever draws the ringing overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingingAlert {
    pub alarm_id: AlarmId,
    pub body: String,
}

impl From<&NotificationEvent> for RingingAlert {
    fn from(event: &NotificationEvent) -> Self {
        let content = &event.request().content;
        Self {
            alarm_id: content.alarm_id.clone(),
            body: content.body.clone(),
        }
    }
}
